//! LocalSphere API crate - axum HTTP server, route handlers, SSE transcript stream.
//!
//! Serves the portal catalog (brand, department hero pages, carousel) and
//! drives one chat session controller per visitor load.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
