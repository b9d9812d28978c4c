//! Network side of the configuration wizard: the backend client, the
//! synchronizer that mirrors local edits to the backend, and the local
//! snapshot cache.

pub mod api;
pub mod cache;
pub mod session;
pub mod settings;
pub mod sync;

pub use api::{ApiError, BackendClient};
pub use cache::SnapshotCache;
pub use session::WizardSession;
pub use settings::ClientConfig;
pub use sync::{SyncEvent, Synchronizer};
