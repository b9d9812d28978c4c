use std::path::Path;

use droneworld_client::{BackendClient, ClientConfig, SnapshotCache};
use droneworld_shared::config::{ConfigurationRecord, SimulationConfiguration};
use tracing_subscriber::EnvFilter;

fn fail(message: &str) -> ! {
    tracing::error!("{}", message);
    std::process::exit(1);
}

fn read_record(path: &Path) -> ConfigurationRecord {
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|e| fail(&format!("cannot read {}: {}", path.display(), e)));
    serde_json::from_str(&text)
        .unwrap_or_else(|e| fail(&format!("invalid configuration in {}: {}", path.display(), e)))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = ClientConfig::from_env();
    let record = match std::env::args().nth(1) {
        Some(path) => read_record(Path::new(&path)),
        None => match SnapshotCache::new(&settings.cache_dir).load() {
            Ok(Some(record)) => record,
            Ok(None) => fail("usage: droneworld-submit <record.json> (no cached configuration found)"),
            Err(e) => fail(&e.to_string()),
        },
    };

    let config = SimulationConfiguration::from_record(record);
    for (a, b) in config.duplicate_positions() {
        tracing::warn!(%a, %b, "drones share a home position");
    }
    let payload = config
        .into_submission()
        .unwrap_or_else(|e| fail(&e.to_string()));

    let client = BackendClient::new(settings.api_url);
    match client.add_task(&payload).await {
        Ok(receipt) => println!("{}", receipt.task_id),
        Err(e) => fail(&format!("submission failed: {}", e)),
    }
}
