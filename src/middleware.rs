//! The tenant gate: every request leaves it carrying a validated
//! `x-tenant` header.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State, rejection::QueryRejection},
    http::{HeaderValue, Request, header::HOST},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use tracing::debug;

use crate::{
    resolver::{DEFAULT_TENANT, resolve},
    state::AppState,
};

/// Header downstream handlers read; they must treat it as already
/// validated.
pub const TENANT_HEADER: &str = "x-tenant";

#[derive(Deserialize)]
pub struct GateQuery {
    /// Development-mode override, ignored on non-local hosts.
    tenant: Option<String>,
}

/// Resolves the candidate tenant, validates it against the allow-list and
/// rewrites the `x-tenant` header. Unknown candidates route to
/// [`DEFAULT_TENANT`]; the gate itself never rejects a request, so a query
/// string that fails to deserialize just means no override.
pub async fn tenant_gate(
    State(state): State<Arc<AppState>>,
    query: Result<Query<GateQuery>, QueryRejection>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let host = request
        .headers()
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let dev_override = query.ok().and_then(|Query(q)| q.tenant);
    let candidate = resolve(host, dev_override.as_deref());

    let effective = if state.tenants.is_allowed(&candidate).await {
        candidate
    } else {
        DEFAULT_TENANT.to_string()
    };

    debug!("Host {host:?} resolved to tenant {effective}");

    let value = HeaderValue::from_str(&effective)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_TENANT));
    request.headers_mut().insert(TENANT_HEADER, value);

    next.run(request).await
}
