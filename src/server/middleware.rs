//! HTTP middleware for repo-guard
//!
//! This module provides middleware layers for:
//! - Remote host identity resolution
//! - Request/response logging

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::time::Instant;

use super::router::AppState;
use crate::security::{CallOrigin, HostName};

/// Header carrying a hostname resolved by a fronting proxy
pub const REMOTE_HOST_HEADER: &str = "x-remote-host";

/// Standard proxy header carrying the original client address
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Resolved remote identity, attached to each request by
/// [`remote_host_middleware`]
///
/// `None` means the request reached the service without any identity the
/// middleware could read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteHost(pub Option<HostName>);

impl RemoteHost {
    /// Origin to pass to the access filter
    pub fn into_origin(self) -> CallOrigin {
        CallOrigin::Web(self.0)
    }
}

/// Remote host middleware function
///
/// This middleware:
/// 1. Reads the identity from proxy headers when the peer is a trusted proxy
/// 2. Falls back to the socket peer address
/// 3. Adds a [`RemoteHost`] to the request extensions
pub async fn remote_host_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let from_headers = match peer {
        Some(peer) if state.is_trusted_proxy(peer) => identity_from_headers(request.headers()),
        _ => None,
    };

    let identity = match from_headers {
        Some(identity) => identity,
        None => peer.map(HostName::from_ip),
    };

    tracing::debug!(
        peer = ?peer,
        remote = ?identity.as_ref().map(ToString::to_string),
        "Remote host resolved"
    );
    request.extensions_mut().insert(RemoteHost(identity));

    next.run(request).await
}

/// Identity announced by a trusted proxy
///
/// `X-Remote-Host` must be set (not appended to) by the proxy. For
/// `X-Forwarded-For` only the rightmost entry is used, since that is the one
/// the proxy itself appended; it must be an IP address.
///
/// Returns `None` when neither header is present, `Some(None)` when a header
/// is present but unreadable.
pub fn identity_from_headers(headers: &HeaderMap) -> Option<Option<HostName>> {
    if let Some(value) = headers.get(REMOTE_HOST_HEADER) {
        return Some(value.to_str().ok().map(HostName::new));
    }

    let value = headers.get(FORWARDED_FOR_HEADER)?;
    Some(value.to_str().ok().map(|list| {
        let last = list.rsplit(',').next().unwrap_or_default().trim();
        match HostName::new(last) {
            ip @ HostName::Ip(_) => ip,
            _ => HostName::Unresolved(last.to_string()),
        }
    }))
}

/// Logging middleware function
///
/// Logs request and response details including:
/// - Method and path
/// - Status code
/// - Response time
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        path = %uri.path(),
        status = %status.as_u16(),
        duration_ms = %elapsed.as_millis(),
        "Request completed"
    );

    response
}
