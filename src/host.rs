//! Native-messaging ingress for the background process.
//!
//! Frames follow the WebExtensions native-messaging format: a 4-byte
//! little-endian length prefix followed by one JSON object. Notifications
//! get no reply; request/response actions get exactly one frame back.

use crate::coordinator::{Coordinator, RequestDecision};
use crate::engine::BlocklistManager;
use crate::messages::{HostRequest, HostResponse};
use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;
use url::Url;

/// Upper bound on an incoming frame; anything larger is a protocol error.
const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Reads one frame. Returns None on clean end-of-stream (browser closed the
/// port).
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Value>>
where
    R: AsyncRead + Unpin,
{
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e).context("failed to read frame length"),
    }
    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_FRAME_LEN {
        bail!("frame of {len} bytes exceeds the {MAX_FRAME_LEN} byte limit");
    }
    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .context("failed to read frame body")?;
    let value = serde_json::from_slice(&body).context("frame body is not valid JSON")?;
    Ok(Some(value))
}

pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serde_json::to_vec(message).context("failed to serialize frame")?;
    writer.write_all(&(body.len() as u32).to_le_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Serves frames until the peer closes the stream. A malformed frame is
/// answered with an error response and does not end the loop; only transport
/// failures do.
pub async fn serve<R, W>(
    coordinator: Coordinator,
    blocklist: BlocklistManager,
    mut reader: R,
    mut writer: W,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    while let Some(value) = read_frame(&mut reader).await? {
        let request: HostRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                warn!("Rejecting unrecognized message: {}", e);
                let response = HostResponse::Error {
                    message: format!("unrecognized message: {e}"),
                };
                write_frame(&mut writer, &response).await?;
                continue;
            }
        };
        if let Some(response) = dispatch(&coordinator, &blocklist, request).await {
            write_frame(&mut writer, &response).await?;
        }
    }
    Ok(())
}

async fn dispatch(
    coordinator: &Coordinator,
    blocklist: &BlocklistManager,
    request: HostRequest,
) -> Option<HostResponse> {
    match request {
        HostRequest::UpdateScriptState { hostname, enabled } => {
            coordinator.on_state_update(&hostname, enabled);
            None
        }
        HostRequest::TabNavigated { tab, hostname } => {
            coordinator.on_tab_navigated(tab, &hostname);
            None
        }
        HostRequest::ShouldCancelRequest {
            request_url,
            document_url,
            tab,
        } => {
            // Unparseable URLs fail open.
            let decision = match (Url::parse(&request_url), Url::parse(&document_url)) {
                (Ok(request_url), Ok(document_url)) => {
                    coordinator
                        .on_before_subresource_request(&request_url, &document_url, tab)
                        .await
                }
                _ => RequestDecision::Allow,
            };
            Some(HostResponse::Decision {
                cancel: decision.cancel(),
            })
        }
        HostRequest::AddDomains { input } => match blocklist.add(&input).await {
            Ok(outcome) => Some(HostResponse::DomainsChanged {
                added: outcome.added,
                rejected: outcome.rejected,
            }),
            Err(e) => Some(HostResponse::Error {
                message: format!("{e:#}"),
            }),
        },
        HostRequest::RemoveDomain { domain } => match blocklist.remove(&domain).await {
            Ok(removed) => Some(HostResponse::Removed { removed }),
            Err(e) => Some(HostResponse::Error {
                message: format!("{e:#}"),
            }),
        },
        HostRequest::ResetDomains => match blocklist.reset().await {
            Ok(()) => Some(HostResponse::Domains {
                domains: blocklist.load().await,
            }),
            Err(e) => Some(HostResponse::Error {
                message: format!("{e:#}"),
            }),
        },
        HostRequest::ListDomains => Some(HostResponse::Domains {
            domains: blocklist.load().await,
        }),
    }
}
