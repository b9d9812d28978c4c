use std::sync::Arc;

use droneworld_shared::config::{ConfigurationRecord, ConfigurationSnapshot, SimulationConfiguration};
use droneworld_shared::error::SubmissionError;
use droneworld_shared::submission::{to_submission_payload, validate};
use droneworld_shared::viewport::TerrainSampler;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::api::{ApiError, BackendClient, TaskReceipt};
use crate::cache::{CacheError, SnapshotCache};
use crate::sync::{SyncEvent, Synchronizer};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

#[derive(Debug, Error)]
pub enum FinishError {
    #[error(transparent)]
    Validation(#[from] SubmissionError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// One run of the configuration wizard: the aggregate plus the plumbing that
/// keeps the backend and the local cache in step with it.
pub struct WizardSession {
    config: SimulationConfiguration,
    client: Arc<BackendClient>,
    sync: Synchronizer,
    cache: SnapshotCache,
    config_id: Option<String>,
}

impl WizardSession {
    /// Open the wizard, resuming from the saved task when `config_id` is
    /// given, otherwise from the local cache. The backend copy is overwritten
    /// with whatever was opened. Must run inside a tokio runtime.
    pub async fn open(
        client: Arc<BackendClient>,
        cache: SnapshotCache,
        config_id: Option<String>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SyncEvent>), SessionError> {
        let cached = match cache.resume(config_id.as_deref()) {
            Ok(record) => record,
            Err(CacheError::Json(e)) => {
                warn!(error = %e, "ignoring unreadable cached configuration");
                None
            }
            Err(e) => return Err(e.into()),
        };
        let record = match config_id.as_deref() {
            Some(id) => Some(ConfigurationRecord::from(client.fetch_configuration(id).await?)),
            None => cached,
        };

        let resumed = record.is_some();
        let mut config = match record {
            Some(record) => SimulationConfiguration::from_record(record),
            None => SimulationConfiguration::new(),
        };
        config.mark_all_dirty();
        info!(drones = config.drones().len(), resumed, "wizard opened");

        let (sync, events) = Synchronizer::spawn(Arc::clone(&client));
        let mut session = WizardSession {
            config,
            client,
            sync,
            cache,
            config_id,
        };
        session.commit();
        Ok((session, events))
    }

    pub fn config(&self) -> &SimulationConfiguration {
        &self.config
    }

    pub fn snapshot(&self) -> Arc<ConfigurationSnapshot> {
        self.config.snapshot()
    }

    pub fn config_id(&self) -> Option<&str> {
        self.config_id.as_deref()
    }

    /// Apply an edit and push the resulting changes.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut SimulationConfiguration) -> R) -> R {
        let out = f(&mut self.config);
        self.commit();
        out
    }

    /// Hand pending mutations to the synchronizer and refresh the cache.
    /// Sessions opened from a saved task are not cached locally.
    pub fn commit(&mut self) {
        if !self.config.has_pending() {
            return;
        }
        self.sync.flush(&mut self.config);
        if self.config_id.is_none() {
            if let Err(e) = self.cache.save(&self.config.to_record()) {
                warn!(error = %e, "failed to cache configuration");
            }
        }
    }

    /// Resolve the origin height from terrain when the origin is a
    /// user-specified region. Returns whether the height changed.
    pub async fn resolve_origin_height<S: TerrainSampler>(&mut self, sampler: &S) -> bool {
        let origin = &self.config.environment().origin;
        if !origin.needs_terrain_height() {
            return false;
        }
        let (latitude, longitude) = (origin.latitude, origin.longitude);
        match sampler.sample_terrain_height(latitude, longitude).await {
            Some(height) => {
                self.edit(|config| config.set_origin_height(height));
                true
            }
            None => {
                warn!(latitude, longitude, "terrain sample unavailable, keeping origin height");
                false
            }
        }
    }

    /// Validate and submit the configuration. Nothing is sent when fields
    /// are missing. The local cache is dropped once the task is queued.
    pub async fn finish(&mut self) -> Result<TaskReceipt, FinishError> {
        validate(&self.config)?;
        let payload = to_submission_payload(&self.config);
        let receipt = self.client.add_task(&payload).await?;
        if let Err(e) = self.cache.clear() {
            warn!(error = %e, "failed to clear cached configuration");
        }
        info!(task_id = %receipt.task_id, "configuration submitted");
        Ok(receipt)
    }
}
