use std::path::PathBuf;

use droneworld_backend::Storage;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let db_path = PathBuf::from(
        std::env::var("DB_PATH").unwrap_or_else(|_| "data/droneworld.redb".to_string()),
    );
    let storage = match Storage::open(&db_path) {
        Ok(storage) => storage,
        Err(e) => {
            tracing::error!(path = %db_path.display(), error = %e, "cannot open database");
            std::process::exit(1);
        }
    };

    let port = std::env::var("PORT").unwrap_or_else(|_| "8000".to_string());
    let addr = format!("0.0.0.0:{}", port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "cannot bind");
            std::process::exit(1);
        }
    };
    tracing::info!("Server running at http://localhost:{}", port);

    if let Err(e) = droneworld_backend::serve(listener, storage).await {
        tracing::error!(error = %e, "server stopped");
        std::process::exit(1);
    }
}
