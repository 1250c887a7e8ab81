//! Multi-tenant request routing backend.
//!
//! The subdomain of each inbound request selects which tenant's database
//! serves it. The moving parts, in request order:
//!
//! - [`resolver`] derives a candidate tenant from the `Host` header, with a
//!   `?tenant=` override for local development.
//! - [`tenants`] keeps the allow-list of routable tenants behind a two-tier
//!   cache: in-process snapshot, then Redis, then a compiled-in default
//!   list. A dead Redis degrades routing, it never stops it.
//! - [`middleware`] gates every request, stamping the validated tenant into
//!   the `x-tenant` header.
//! - [`database`] hands out one lazily-connected MySQL pool per tenant and
//!   tears them all down on shutdown.
//!
//! Route handlers in [`routes`] (admin allow-list mutations, per-tenant
//! users/posts CRUD) only ever see the already-gated header.

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    middleware::from_fn_with_state,
    routing::{delete, get},
};
use tokio::{
    net::TcpListener,
    signal::{
        ctrl_c,
        unix::{SignalKind, signal},
    },
};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod database;
pub mod error;
pub mod middleware;
pub mod resolver;
pub mod routes;
pub mod state;
pub mod tenants;

use middleware::tenant_gate;
use routes::{
    add_tenant, create_post, create_user, list_posts, list_tenants, list_users, remove_tenant,
};
use state::AppState;

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await;

    info!("Starting server...");

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let app = router(state.clone()).layer(cors);

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    state.databases.disconnect_all().await;

    info!("Server shut down");
}

/// Full application router: every route sits behind the tenant gate.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/tenants", get(list_tenants).post(add_tenant))
        .route("/api/tenants/{tenant}", delete(remove_tenant))
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/posts", get(list_posts).post(create_post))
        .layer(from_fn_with_state(state.clone(), tenant_gate))
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
