//! Pushes local configuration changes to the backend.
//!
//! Edits are applied locally first. The synchronizer drains the pending
//! mutations, coalesces them into backend calls and hands them to a single
//! worker task, so the UI never waits on the network. Failures are reported
//! as [`SyncEvent::Failed`] and local state is left as is.

use std::collections::HashSet;
use std::sync::Arc;

use droneworld_shared::config::{ConfigurationRecord, Mutation, SimulationConfiguration};
use droneworld_shared::models::{Drone, DroneId, Environment, Monitors};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::{ApiError, BackendClient};

/// A backend call carrying the state to send.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncCall {
    CreateDrone(Drone),
    UpdateDrone(Drone),
    DeleteDrone(DroneId),
    PutEnvironment(Environment),
    PutMonitors(Monitors),
    ReplaceSimulation(ConfigurationRecord),
}

/// Identifies a call in [`SyncEvent`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOp {
    CreateDrone(DroneId),
    UpdateDrone(DroneId),
    DeleteDrone(DroneId),
    PutEnvironment,
    PutMonitors,
    ReplaceSimulation,
}

impl SyncCall {
    pub fn op(&self) -> SyncOp {
        match self {
            SyncCall::CreateDrone(d) => SyncOp::CreateDrone(d.id),
            SyncCall::UpdateDrone(d) => SyncOp::UpdateDrone(d.id),
            SyncCall::DeleteDrone(id) => SyncOp::DeleteDrone(*id),
            SyncCall::PutEnvironment(_) => SyncOp::PutEnvironment,
            SyncCall::PutMonitors(_) => SyncOp::PutMonitors,
            SyncCall::ReplaceSimulation(_) => SyncOp::ReplaceSimulation,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Synced(SyncOp),
    Failed { op: SyncOp, error: String },
}

/// Turn drained mutations into backend calls.
///
/// Calls carry the current state, so repeated updates collapse into one.
/// Environment and monitor replacements are sent once each. A drone both
/// created and removed within the batch never reaches the backend. A full
/// replace carries the whole current state and supersedes the rest of the
/// batch.
pub fn plan(pending: &[Mutation], config: &SimulationConfiguration) -> Vec<SyncCall> {
    if pending.contains(&Mutation::ConfigurationReplaced) {
        return vec![SyncCall::ReplaceSimulation(config.to_record())];
    }

    let added: HashSet<DroneId> = pending
        .iter()
        .filter_map(|m| match m {
            Mutation::DroneAdded(id) => Some(*id),
            _ => None,
        })
        .collect();
    let removed: HashSet<DroneId> = pending
        .iter()
        .filter_map(|m| match m {
            Mutation::DroneRemoved(id) => Some(*id),
            _ => None,
        })
        .collect();

    let mut calls = Vec::new();
    let mut updated = HashSet::new();
    let mut environment_sent = false;
    let mut monitors_sent = false;

    for mutation in pending {
        match *mutation {
            Mutation::DroneAdded(id) => {
                if removed.contains(&id) {
                    continue;
                }
                if let Some(drone) = config.drone(id) {
                    calls.push(SyncCall::CreateDrone(drone.clone()));
                }
            }
            Mutation::DroneUpdated(id) => {
                if added.contains(&id) || removed.contains(&id) || !updated.insert(id) {
                    continue;
                }
                if let Some(drone) = config.drone(id) {
                    calls.push(SyncCall::UpdateDrone(drone.clone()));
                }
            }
            Mutation::DroneRemoved(id) => {
                if !added.contains(&id) {
                    calls.push(SyncCall::DeleteDrone(id));
                }
            }
            Mutation::EnvironmentReplaced => {
                if !environment_sent {
                    environment_sent = true;
                    calls.push(SyncCall::PutEnvironment(config.environment().clone()));
                }
            }
            Mutation::MonitorsReplaced => {
                if !monitors_sent {
                    monitors_sent = true;
                    calls.push(SyncCall::PutMonitors(config.monitors().clone()));
                }
            }
            Mutation::ConfigurationReplaced => {}
        }
    }
    calls
}

async fn execute(client: &BackendClient, call: SyncCall) -> Result<(), ApiError> {
    match call {
        SyncCall::CreateDrone(drone) => client.create_drone(&drone).await.map(|_| ()),
        SyncCall::UpdateDrone(drone) => client.update_drone(&drone).await.map(|_| ()),
        SyncCall::DeleteDrone(id) => client.delete_drone(id).await,
        SyncCall::PutEnvironment(environment) => client.put_environment(&environment).await,
        SyncCall::PutMonitors(monitors) => client.put_monitors(&monitors).await,
        SyncCall::ReplaceSimulation(record) => client.replace_simulation(&record).await,
    }
}

/// Handle to the background sync worker.
#[derive(Debug, Clone)]
pub struct Synchronizer {
    calls: mpsc::UnboundedSender<SyncCall>,
}

impl Synchronizer {
    /// Start the worker on the current tokio runtime. Calls run one at a
    /// time in the order they were queued.
    pub fn spawn(client: Arc<BackendClient>) -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (call_tx, mut call_rx) = mpsc::unbounded_channel::<SyncCall>();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(call) = call_rx.recv().await {
                let op = call.op();
                let event = match execute(&client, call).await {
                    Ok(()) => {
                        debug!(?op, "synced");
                        SyncEvent::Synced(op)
                    }
                    Err(e) => {
                        warn!(?op, error = %e, "backend sync failed");
                        SyncEvent::Failed {
                            op,
                            error: e.to_string(),
                        }
                    }
                };
                // No listener is fine.
                let _ = event_tx.send(event);
            }
        });

        (Synchronizer { calls: call_tx }, event_rx)
    }

    /// Drain the configuration's pending mutations and queue their calls.
    /// Returns how many calls were queued.
    pub fn flush(&self, config: &mut SimulationConfiguration) -> usize {
        let pending = config.take_pending();
        let calls = plan(&pending, config);
        let planned = calls.len();
        let mut queued = 0;
        for call in calls {
            if self.calls.send(call).is_err() {
                warn!(dropped = planned - queued, "sync worker stopped, dropping backend calls");
                break;
            }
            queued += 1;
        }
        queued
    }
}
