use std::io::ErrorKind;
use std::path::PathBuf;

use droneworld_shared::config::ConfigurationRecord;
use thiserror::Error;

/// Key the in-progress configuration is cached under.
pub const MAIN_JSON_KEY: &str = "mainJson";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cached configuration is unreadable: {0}")]
    Json(#[from] serde_json::Error),
}

/// Local copy of the configuration being edited, one JSON file per key.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    dir: PathBuf,
    key: String,
}

impl SnapshotCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        SnapshotCache {
            dir: dir.into(),
            key: MAIN_JSON_KEY.to_string(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.key))
    }

    pub fn save(&self, record: &ConfigurationRecord) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_vec_pretty(record)?;
        std::fs::write(self.path(), json)?;
        Ok(())
    }

    pub fn load(&self) -> Result<Option<ConfigurationRecord>, CacheError> {
        match std::fs::read(self.path()) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn clear(&self) -> Result<(), CacheError> {
        match std::fs::remove_file(self.path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// What to resume from when the wizard opens. A server-assigned
    /// configuration id wins: the local copy is dropped and `None` returned.
    pub fn resume(&self, config_id: Option<&str>) -> Result<Option<ConfigurationRecord>, CacheError> {
        if config_id.is_some() {
            self.clear()?;
            return Ok(None);
        }
        self.load()
    }
}
