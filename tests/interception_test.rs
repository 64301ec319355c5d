use anyhow::{bail, Result};
use async_trait::async_trait;
use embedguard::coordinator::{Coordinator, RequestDecision};
use embedguard::storage::{KeyValueStore, MemoryStore, StoreHandle};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

struct FailingStore;

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<Value>> {
        bail!("storage unavailable")
    }

    async fn set(&self, _key: &str, _value: Value) -> Result<()> {
        bail!("storage unavailable")
    }
}

fn memory_coordinator() -> Coordinator {
    Coordinator::new(StoreHandle::new(Arc::new(MemoryStore::new())))
}

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

async fn decide(coordinator: &Coordinator, target: &str, document: &str) -> RequestDecision {
    coordinator
        .on_before_subresource_request(&url(target), &url(document), -1)
        .await
}

#[tokio::test]
async fn test_blocklisted_target_is_canceled_by_default() {
    // No stored list: the built-in defaults apply, and an unknown page
    // resolves to enabled.
    let coordinator = memory_coordinator();
    let decision = decide(
        &coordinator,
        "https://player.twitch.tv/?channel=somestreamer",
        "https://www.example.com/watch",
    )
    .await;
    assert_eq!(decision, RequestDecision::Cancel);
}

#[tokio::test]
async fn test_unlisted_target_is_allowed() {
    let coordinator = memory_coordinator();
    let decision = decide(
        &coordinator,
        "https://cdn.example.net/embed.js",
        "https://www.example.com/watch",
    )
    .await;
    assert_eq!(decision, RequestDecision::Allow);
}

#[tokio::test]
async fn test_blocklisted_document_always_allows() {
    // Viewing the embed host itself: every target is allowed, including
    // other blocklisted domains.
    let coordinator = memory_coordinator();
    for target in [
        "https://player.twitch.tv/?channel=somestreamer",
        "https://minnit.org/chat",
        "https://cdn.example.net/embed.js",
    ] {
        let decision = decide(&coordinator, target, "https://www.twitch.tv/somestreamer").await;
        assert_eq!(decision, RequestDecision::Allow, "target {target}");
    }
}

#[tokio::test]
async fn test_disabled_base_domain_short_circuits() {
    let coordinator = memory_coordinator();
    coordinator.on_state_update("example.com", false);
    let decision = decide(
        &coordinator,
        "https://player.twitch.tv/?channel=somestreamer",
        "https://www.example.com/watch",
    )
    .await;
    assert_eq!(decision, RequestDecision::Allow);
}

#[tokio::test]
async fn test_full_hostname_report_needs_the_tab_fallback() {
    // Pages report under their full hostname while the request path resolves
    // by base domain; only the tab association makes the report visible.
    let coordinator = memory_coordinator();
    coordinator.on_state_update("www.example.com", false);

    let without_tab = coordinator
        .on_before_subresource_request(
            &url("https://player.twitch.tv/?channel=somestreamer"),
            &url("https://www.example.com/watch"),
            -1,
        )
        .await;
    assert_eq!(without_tab, RequestDecision::Cancel);

    coordinator.on_tab_navigated(7, "www.example.com");
    let with_tab = coordinator
        .on_before_subresource_request(
            &url("https://player.twitch.tv/?channel=somestreamer"),
            &url("https://www.example.com/watch"),
            7,
        )
        .await;
    assert_eq!(with_tab, RequestDecision::Allow);
}

#[tokio::test]
async fn test_store_failure_fails_open() {
    let coordinator = Coordinator::new(StoreHandle::new(Arc::new(FailingStore)));
    let decision = decide(
        &coordinator,
        "https://player.twitch.tv/?channel=somestreamer",
        "https://www.example.com/watch",
    )
    .await;
    assert_eq!(decision, RequestDecision::Allow);
}

#[tokio::test]
async fn test_state_updates_arrive_through_the_handle() {
    let coordinator = memory_coordinator();
    let handle = coordinator.listen();
    handle.state_update("example.com", false);

    let mut seen = None;
    for _ in 0..50 {
        seen = coordinator.state().enabled_for("example.com");
        if seen.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(seen, Some(false));
}
