//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression,
//! and all endpoint handlers.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use localsphere_core::config::PortalConfig;
use localsphere_core::error::PortalError;

use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // Allow the portal's own origin plus port+1 for a dev front end.
    let port = state.config.general.port;
    let origins: Vec<HeaderValue> = [port, port.saturating_add(1)]
        .into_iter()
        .flat_map(|p| [format!("http://127.0.0.1:{}", p), format!("http://localhost:{}", p)])
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let catalog_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/portal", get(handlers::portal))
        .route("/departments/{id}", get(handlers::department));

    let session_routes = Router::new()
        .route("/sessions", post(handlers::create_session))
        .route(
            "/sessions/{id}",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/sessions/{id}/department", put(handlers::select_department))
        .route("/sessions/{id}/widget", put(handlers::set_widget))
        .route("/sessions/{id}/input", put(handlers::set_input))
        .route("/sessions/{id}/messages", post(handlers::post_message))
        .route("/sessions/{id}/transcript", get(handlers::transcript))
        .route("/sessions/{id}/stream", get(handlers::stream));

    catalog_routes
        .merge(session_routes)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured address.
///
/// Binds to 127.0.0.1 (localhost only) on the port from config and runs
/// the idle-session sweeper alongside the server.
pub async fn start_server(config: &PortalConfig, state: AppState) -> Result<(), PortalError> {
    let addr = format!("127.0.0.1:{}", config.general.port);
    let router = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| {
            PortalError::Config(format!(
                "Failed to bind {} (is another instance running? try LOCALSPHERE_PORT={}): {}",
                addr,
                config.general.port.saturating_add(1),
                e
            ))
        })?;
    tracing::info!(addr = %addr, "API server listening");

    let sweeper = state.spawn_session_sweeper();

    let served = axum::serve(listener, router).await;
    sweeper.abort();
    served?;

    Ok(())
}
