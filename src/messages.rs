//! Message contracts.
//!
//! Every message is a tagged action name plus a flat payload, carried as
//! JSON. [`PageRequest`]/[`PageResponse`] is the control-surface contract
//! served by a page filter instance; [`HostRequest`]/[`HostResponse`] is the
//! background process's ingress. Both unions are closed: a new action means a
//! new variant, and every dispatch site matches exhaustively.

use crate::engine::blocklist::RejectedEntry;
use crate::engine::TabId;
use serde::{Deserialize, Serialize};

/// Requests a popup or options surface sends to a page filter instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PageRequest {
    GetCurrentState,
    GetPageBlockCount,
    GetLifetimeBlockCount,
    GetMostBlockedChannel,
    /// `refresh` carries the requester's view of whether the page needs a
    /// reload once enforcement flips off with embeds already removed.
    ToggleEnforcement { refresh: bool },
    AckRefresh,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PageResponse {
    CurrentState {
        state: bool,
        refresh_required: bool,
        base_domain_ignore: bool,
        hostname: String,
    },
    PageBlockCount {
        count: u64,
    },
    LifetimeBlockCount {
        count: u64,
    },
    MostBlockedChannel {
        name: Option<String>,
        count: u64,
    },
    Toggled {
        state: bool,
    },
    RefreshState {
        refresh_required: bool,
    },
}

/// Messages the background process accepts over its native-messaging ingress.
/// The first two are fire-and-forget notifications and get no response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum HostRequest {
    UpdateScriptState {
        hostname: String,
        enabled: bool,
    },
    TabNavigated {
        tab: TabId,
        hostname: String,
    },
    ShouldCancelRequest {
        request_url: String,
        document_url: String,
        tab: TabId,
    },
    AddDomains {
        input: String,
    },
    RemoveDomain {
        domain: String,
    },
    ResetDomains,
    ListDomains,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum HostResponse {
    Decision {
        cancel: bool,
    },
    DomainsChanged {
        added: Vec<String>,
        rejected: Vec<RejectedEntry>,
    },
    Removed {
        removed: bool,
    },
    Domains {
        domains: Vec<String>,
    },
    Error {
        message: String,
    },
}
