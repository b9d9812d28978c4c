use std::path::Path;
use std::sync::Arc;

use droneworld_shared::config::ConfigurationRecord;
use droneworld_shared::submission::SubmissionPayload;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const STATE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("simulation");
const TASKS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("tasks");

/// The simulation being edited lives under a single key.
const STATE_KEY: &str = "current";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to open database: {0}")]
    Database(#[from] redb::DatabaseError),
    #[error("transaction failed: {0}")]
    Transaction(#[from] redb::TransactionError),
    #[error("table unavailable: {0}")]
    Table(#[from] redb::TableError),
    #[error("storage failure: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("commit failed: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("corrupt record: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
}

/// A submitted configuration waiting for the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub submitted_at: String,
    pub status: TaskStatus,
    pub payload: SubmissionPayload,
}

pub struct Storage {
    db: Database,
}

impl Storage {
    pub fn open(path: &Path) -> Result<Arc<Self>, StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            write_txn.open_table(STATE_TABLE)?;
            write_txn.open_table(TASKS_TABLE)?;
        }
        write_txn.commit()?;

        tracing::info!(path = %path.display(), "opened simulation database");
        Ok(Arc::new(Storage { db }))
    }

    pub fn load_state(&self) -> Result<ConfigurationRecord, StorageError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(STATE_TABLE)?;
        match table.get(STATE_KEY)? {
            Some(value) => Ok(serde_json::from_slice(value.value())?),
            None => Ok(ConfigurationRecord::default()),
        }
    }

    /// Read-modify-write of the current simulation inside one write
    /// transaction, so concurrent requests never lose each other's edits.
    pub fn update_state<R>(
        &self,
        f: impl FnOnce(&mut ConfigurationRecord) -> R,
    ) -> Result<R, StorageError> {
        let write_txn = self.db.begin_write()?;
        let out = {
            let mut table = write_txn.open_table(STATE_TABLE)?;
            let mut state: ConfigurationRecord = match table.get(STATE_KEY)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => ConfigurationRecord::default(),
            };
            let out = f(&mut state);
            let json = serde_json::to_vec(&state)?;
            table.insert(STATE_KEY, json.as_slice())?;
            out
        };
        write_txn.commit()?;
        Ok(out)
    }

    /// Queue a submission. Task ids are `<timestamp>_Batch_<n>`.
    pub fn add_task(&self, payload: SubmissionPayload) -> Result<TaskRecord, StorageError> {
        let now = chrono::Utc::now();
        let write_txn = self.db.begin_write()?;
        let task = {
            let mut table = write_txn.open_table(TASKS_TABLE)?;
            let batch = table.len()? + 1;
            let task = TaskRecord {
                task_id: format!("{}_Batch_{}", now.format("%Y-%m-%d-%H-%M-%S"), batch),
                submitted_at: now.to_rfc3339(),
                status: TaskStatus::Queued,
                payload,
            };
            let json = serde_json::to_vec(&task)?;
            table.insert(task.task_id.as_str(), json.as_slice())?;
            task
        };
        write_txn.commit()?;
        Ok(task)
    }

    pub fn get_task(&self, id: &str) -> Result<Option<TaskRecord>, StorageError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TASKS_TABLE)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn count_tasks(&self) -> Result<u64, StorageError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TASKS_TABLE)?;
        Ok(table.len()?)
    }
}
