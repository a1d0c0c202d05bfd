//! HTTP router for repo-guard
//!
//! This module defines the axum router that handles all HTTP requests.
//! It provides routes for:
//! - Health checks
//! - Access decisions for artifact requests (`auth_request` style)
//! - Administration of protected repositories

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::get,
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;

use super::middleware::{logging_middleware, remote_host_middleware, RemoteHost};
use crate::config::repo_name;
use crate::error::AccessError;
use crate::models::FileDescriptor;
use crate::security::{CallOrigin, IpRange, ProtectedRepoFilter};

/// Header carrying the URI of the request a fronting proxy is authorizing
pub const ORIGINAL_URI_HEADER: &str = "x-original-uri";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Protected repository access filter
    pub filter: Arc<ProtectedRepoFilter>,

    /// Peers whose proxy headers may override the socket peer address.
    /// Empty means proxy headers are ignored.
    pub trusted_proxies: Arc<Vec<IpRange>>,
}

impl AppState {
    pub fn new(filter: Arc<ProtectedRepoFilter>) -> Self {
        Self {
            filter,
            trusted_proxies: Arc::new(Vec::new()),
        }
    }

    /// Believe `X-Remote-Host` / `X-Forwarded-For` from peers in `ranges`
    pub fn with_trusted_proxies(mut self, ranges: Vec<IpRange>) -> Self {
        self.trusted_proxies = Arc::new(ranges);
        self
    }

    /// Whether `peer` is a proxy allowed to announce the remote identity
    pub fn is_trusted_proxy(&self, peer: IpAddr) -> bool {
        self.trusted_proxies
            .iter()
            .any(|range| range.contains_ip(peer))
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Protected repository listing
#[derive(Debug, Serialize, Deserialize)]
pub struct ProtectedReposResponse {
    pub protected_repos: Vec<String>,
    pub white_listed_ip_ranges: Vec<String>,
}

/// Request body for registering a protected repository
#[derive(Debug, Serialize, Deserialize)]
pub struct AddProtectedRepoRequest {
    pub name: String,
}

/// Propagation check response
#[derive(Debug, Serialize, Deserialize)]
pub struct PropagationResponse {
    pub repo: String,
    pub allowed: bool,
}

/// Build the main application router
///
/// # Arguments
///
/// * `state` - Application state containing the access filter
///
/// # Returns
///
/// An axum Router configured with all endpoints
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/auth", get(auth_original_uri_handler))
        .route("/auth/:repo/:arch/:filename", get(auth_handler))
        .route(
            "/api/protected-repos",
            get(api_list_protected_repos_handler).post(api_add_protected_repo_handler),
        )
        .route("/api/propagation/:repo", get(api_propagation_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            remote_host_middleware,
        ))
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}

// =============================================================================
// Health Handler
// =============================================================================

/// Health check endpoint handler
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Access Decision Handler
// =============================================================================

/// Access decision for `repo/arch/filename`
///
/// Answers `204 No Content` when the artifact may be served and
/// `403 Forbidden` when it may not, so a fronting proxy can use this route
/// as an authorization sub-request.
async fn auth_handler(
    State(state): State<AppState>,
    Path((repo, arch, filename)): Path<(String, String, String)>,
    remote: Option<Extension<RemoteHost>>,
) -> Response {
    decide(&state, &FileDescriptor::new(repo, arch, filename), remote)
}

/// Access decision for the URI in `X-Original-URI`
///
/// nginx passes the original request URI this way when `auth_request`
/// points at a fixed location. Answers `400 Bad Request` when the URI is
/// not of the form `/repo/arch/filename`.
async fn auth_original_uri_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    remote: Option<Extension<RemoteHost>>,
) -> Response {
    let uri = headers
        .get(ORIGINAL_URI_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let path = uri.split(['?', '#']).next().unwrap_or_default();

    match FileDescriptor::from_path(path) {
        Ok(descriptor) => decide(&state, &descriptor, remote),
        Err(e) => {
            tracing::warn!(error = %e, "Unusable original URI");
            error_response(StatusCode::BAD_REQUEST, &e.to_string())
        }
    }
}

fn decide(
    state: &AppState,
    descriptor: &FileDescriptor,
    remote: Option<Extension<RemoteHost>>,
) -> Response {
    let origin = match remote {
        Some(Extension(remote)) => remote.into_origin(),
        None => CallOrigin::Web(None),
    };

    match state.filter.is_allowed(descriptor, &origin) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error_response(StatusCode::FORBIDDEN, "Forbidden"),
        Err(e @ AccessError::MissingRemoteIdentity(_)) => {
            tracing::error!(error = %e, "Access decision failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

// =============================================================================
// API Handlers
// =============================================================================

/// List protected repositories and the IP whitelist
async fn api_list_protected_repos_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut protected_repos: Vec<String> = state.filter.protected_repos().into_iter().collect();
    protected_repos.sort();

    Json(ProtectedReposResponse {
        protected_repos,
        white_listed_ip_ranges: state
            .filter
            .white_listed_ip_ranges()
            .iter()
            .map(ToString::to_string)
            .collect(),
    })
}

/// Register a protected repository
///
/// The name is normalized like the configured list, so whitespace is
/// dropped.
async fn api_add_protected_repo_handler(
    State(state): State<AppState>,
    Json(request): Json<AddProtectedRepoRequest>,
) -> Response {
    let name = repo_name(&request.name);
    if name.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Repository name must not be empty");
    }

    let status = if state.filter.add_protected_repo(name.as_str()) {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    (
        status,
        Json(serde_json::json!({ "name": name, "protected": true })),
    )
        .into_response()
}

/// Whether a repository may be propagated
async fn api_propagation_handler(
    State(state): State<AppState>,
    Path(repo): Path<String>,
) -> impl IntoResponse {
    let allowed = state.filter.is_allowed_propagation_repo(&repo);
    Json(PropagationResponse { repo, allowed })
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn create_test_state() -> AppState {
        let filter = ProtectedRepoFilter::new("secret", "10.0.0.0/24").unwrap();
        AppState::new(Arc::new(filter))
    }

    async fn spawn(state: AppState) -> SocketAddr {
        let app = build_router(state).into_make_service_with_connect_info::<SocketAddr>();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        addr
    }

    // Test 1: Health endpoint
    #[tokio::test]
    async fn test_health() {
        let addr = spawn(create_test_state()).await;

        let response = reqwest::get(format!("http://{}/health", addr)).await.unwrap();
        assert_eq!(response.status(), 200);

        let body: HealthResponse = response.json().await.unwrap();
        assert_eq!(body.status, "healthy");
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    }

    // Test 2: Loopback peer is not in the whitelist
    #[tokio::test]
    async fn test_auth_denies_loopback_on_protected_repo() {
        let addr = spawn(create_test_state()).await;

        let response = reqwest::get(format!("http://{}/auth/secret/noarch/tool.rpm", addr))
            .await
            .unwrap();
        assert_eq!(response.status(), 403);
    }

    // Test 3: Unprotected repo and repodata are allowed
    #[tokio::test]
    async fn test_auth_allows_unprotected() {
        let addr = spawn(create_test_state()).await;

        let response = reqwest::get(format!("http://{}/auth/public/noarch/tool.rpm", addr))
            .await
            .unwrap();
        assert_eq!(response.status(), 204);

        let response = reqwest::get(format!("http://{}/auth/secret/repodata/repomd.xml", addr))
            .await
            .unwrap();
        assert_eq!(response.status(), 204);
    }

    // Test 4: Whitelisted loopback range is allowed
    #[tokio::test]
    async fn test_auth_allows_whitelisted_peer() {
        let filter = ProtectedRepoFilter::new("secret", "127.0.0.0/8").unwrap();
        let addr = spawn(AppState::new(Arc::new(filter))).await;

        let response = reqwest::get(format!("http://{}/auth/secret/noarch/tool.rpm", addr))
            .await
            .unwrap();
        assert_eq!(response.status(), 204);
    }

    // Test 5: Without connect info there is no identity
    #[tokio::test]
    async fn test_auth_without_identity_is_server_error() {
        let app = build_router(create_test_state());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let response = reqwest::get(format!("http://{}/auth/secret/noarch/tool.rpm", addr))
            .await
            .unwrap();
        assert_eq!(response.status(), 500);

        // Unprotected repos never need the identity
        let response = reqwest::get(format!("http://{}/auth/public/noarch/tool.rpm", addr))
            .await
            .unwrap();
        assert_eq!(response.status(), 204);
    }

    // Test 6: Add and list protected repos
    #[tokio::test]
    async fn test_add_and_list_protected_repos() {
        let state = create_test_state();
        let filter = Arc::clone(&state.filter);
        let addr = spawn(state).await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("http://{}/api/protected-repos", addr))
            .json(&serde_json::json!({ "name": "fresh" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
        assert!(filter.protected_repos().contains("fresh"));

        let response = client
            .post(format!("http://{}/api/protected-repos", addr))
            .json(&serde_json::json!({ "name": "fresh" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let body: ProtectedReposResponse = client
            .get(format!("http://{}/api/protected-repos", addr))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body.protected_repos, vec!["fresh", "secret"]);
        assert_eq!(body.white_listed_ip_ranges, vec!["10.0.0.0/24"]);
    }

    // Test 7: Blank repository names are rejected
    #[tokio::test]
    async fn test_add_blank_protected_repo() {
        let addr = spawn(create_test_state()).await;

        let response = reqwest::Client::new()
            .post(format!("http://{}/api/protected-repos", addr))
            .json(&serde_json::json!({ "name": "   " }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    }

    // Test 8: Propagation endpoint
    #[tokio::test]
    async fn test_propagation() {
        let addr = spawn(create_test_state()).await;

        let body: PropagationResponse = reqwest::get(format!("http://{}/api/propagation/secret", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body.repo, "secret");
        assert!(!body.allowed);

        let body: PropagationResponse = reqwest::get(format!("http://{}/api/propagation/public", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(body.allowed);
    }

    // Test 9: Admin names are normalized like configured names
    #[tokio::test]
    async fn test_add_protected_repo_normalizes_name() {
        let state = create_test_state();
        let filter = Arc::clone(&state.filter);
        let addr = spawn(state).await;

        let response = reqwest::Client::new()
            .post(format!("http://{}/api/protected-repos", addr))
            .json(&serde_json::json!({ "name": " late repo\t" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["name"], "laterepo");
        assert!(filter.protected_repos().contains("laterepo"));
        assert!(!filter.protected_repos().contains("late repo"));
    }

    // Test 10: Decision for the URI in X-Original-URI
    #[tokio::test]
    async fn test_auth_original_uri() {
        let filter = ProtectedRepoFilter::new("secret", "127.0.0.0/8").unwrap();
        let addr = spawn(AppState::new(Arc::new(filter))).await;
        let client = reqwest::Client::new();

        let response = client
            .get(format!("http://{}/auth", addr))
            .header(ORIGINAL_URI_HEADER, "/secret/noarch/tool.rpm?token=1")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 204);

        let response = client
            .get(format!("http://{}/auth", addr))
            .header(ORIGINAL_URI_HEADER, "/secret/tool.rpm")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);

        let response = client.get(format!("http://{}/auth", addr)).send().await.unwrap();
        assert_eq!(response.status(), 400);
    }

    // Test 11: Trusted proxy ranges
    #[test]
    fn test_is_trusted_proxy() {
        let state = create_test_state();
        assert!(!state.is_trusted_proxy("127.0.0.1".parse().unwrap()));

        let state = state.with_trusted_proxies(vec![IpRange::parse("127.0.0.1").unwrap()]);
        assert!(state.is_trusted_proxy("127.0.0.1".parse().unwrap()));
        assert!(state.is_trusted_proxy("::ffff:127.0.0.1".parse().unwrap()));
        assert!(!state.is_trusted_proxy("127.0.0.2".parse().unwrap()));
    }
}
