//! Reference backend for the simulation configuration contract.

pub mod error;
pub mod routes;
pub mod storage;

use std::sync::Arc;

pub use routes::build_app;
pub use storage::Storage;

/// Serve the REST API on an already bound listener until it fails.
pub async fn serve(listener: tokio::net::TcpListener, storage: Arc<Storage>) -> std::io::Result<()> {
    axum::serve(listener, build_app(storage)).await
}
