use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geo::Rectangle;
use crate::models::{
    Drone, DroneId, DronePatch, Environment, Monitors, Origin, RestrictedZone, Wind, ZoneId,
};

/// A local change the backend has not been told about yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    DroneAdded(DroneId),
    DroneUpdated(DroneId),
    DroneRemoved(DroneId),
    EnvironmentReplaced,
    MonitorsReplaced,
    /// The whole configuration must overwrite the backend copy.
    ConfigurationReplaced,
}

/// Serialized form used by the local cache and for hydration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationRecord {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub drones: Vec<Drone>,
    #[serde(default)]
    pub monitors: Monitors,
}

/// Immutable view published after every mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationSnapshot {
    pub revision: u64,
    pub environment: Environment,
    pub drones: Vec<Drone>,
    pub monitors: Monitors,
}

/// The aggregate root. Every edit goes through its methods, which publish a
/// fresh snapshot and record a pending [`Mutation`].
#[derive(Debug)]
pub struct SimulationConfiguration {
    environment: Environment,
    drones: Vec<Drone>,
    monitors: Monitors,
    next_drone_id: u32,
    next_zone_id: u32,
    revision: u64,
    snapshot: Arc<ConfigurationSnapshot>,
    pending: Vec<Mutation>,
}

impl Default for SimulationConfiguration {
    fn default() -> Self {
        Self::from_parts(Environment::default(), Vec::new(), Monitors::all_disabled())
    }
}

impl SimulationConfiguration {
    /// An empty configuration stamped with the current UTC time of day.
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        let environment = Environment {
            use_geo: true,
            time_of_day: Some(now.format("%H:%M:%S").to_string()),
            time: Some(now.to_rfc3339()),
            ..Environment::default()
        };
        Self::from_parts(environment, Vec::new(), Monitors::all_disabled())
    }

    /// Hydrate from a saved record. Hydration is a load, not an edit, so no
    /// mutations are recorded.
    pub fn from_record(record: ConfigurationRecord) -> Self {
        let ConfigurationRecord {
            mut environment,
            mut drones,
            monitors,
        } = record;

        if !ids_allocatable(drones.iter().map(|d| d.id.0)) {
            debug!("reassigning drone ids on hydration");
            for (i, drone) in drones.iter_mut().enumerate() {
                drone.id = DroneId(i as u32);
            }
        }
        normalize_zones(&mut environment);

        Self::from_parts(environment, drones, monitors)
    }

    fn from_parts(environment: Environment, drones: Vec<Drone>, monitors: Monitors) -> Self {
        let next_drone_id = next_id(drones.iter().map(|d| d.id.0)).unwrap_or(u32::MAX);
        let next_zone_id = next_id(environment.zones.iter().map(|z| z.id.0)).unwrap_or(u32::MAX);
        let snapshot = Arc::new(ConfigurationSnapshot {
            revision: 0,
            environment: environment.clone(),
            drones: drones.clone(),
            monitors: monitors.clone(),
        });
        SimulationConfiguration {
            environment,
            drones,
            monitors,
            next_drone_id,
            next_zone_id,
            revision: 0,
            snapshot,
            pending: Vec::new(),
        }
    }

    pub fn to_record(&self) -> ConfigurationRecord {
        ConfigurationRecord {
            environment: self.environment.clone(),
            drones: self.drones.clone(),
            monitors: self.monitors.clone(),
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn drones(&self) -> &[Drone] {
        &self.drones
    }

    pub fn monitors(&self) -> &Monitors {
        &self.monitors
    }

    pub fn drone(&self, id: DroneId) -> Option<&Drone> {
        self.drones.iter().find(|d| d.id == id)
    }

    pub fn drone_index(&self, id: DroneId) -> Option<usize> {
        self.drones.iter().position(|d| d.id == id)
    }

    pub fn drone_at(&self, index: usize) -> Option<&Drone> {
        self.drones.get(index)
    }

    /// The latest published snapshot. A new `Arc` is handed out after every
    /// mutation, so `Arc::ptr_eq` tells whether anything changed.
    pub fn snapshot(&self) -> Arc<ConfigurationSnapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Drain the mutations recorded since the last call.
    pub fn take_pending(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.pending)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Queue an overwrite of the backend copy with the current state. Used
    /// when a session starts, since the backend may hold another session's
    /// configuration.
    pub fn mark_all_dirty(&mut self) {
        self.pending.push(Mutation::ConfigurationReplaced);
    }

    /// Pairs of drones sharing an identical `(X, Y)` position.
    pub fn duplicate_positions(&self) -> Vec<(DroneId, DroneId)> {
        let mut pairs = Vec::new();
        for (i, a) in self.drones.iter().enumerate() {
            for b in &self.drones[i + 1..] {
                if a.x == b.x && a.y == b.y {
                    pairs.push((a.id, b.id));
                }
            }
        }
        pairs
    }

    fn publish(&mut self, mutation: Mutation) {
        self.revision += 1;
        self.pending.push(mutation);
        self.snapshot = Arc::new(ConfigurationSnapshot {
            revision: self.revision,
            environment: self.environment.clone(),
            drones: self.drones.clone(),
            monitors: self.monitors.clone(),
        });
        debug!(revision = self.revision, ?mutation, "configuration changed");
    }

    /// Append a drone and assign it the next id. Ids are never reused.
    pub fn add_drone(&mut self, mut drone: Drone) -> DroneId {
        let id = DroneId(self.next_drone_id);
        self.next_drone_id = self.next_drone_id.saturating_add(1);
        drone.id = id;
        self.drones.push(drone);
        self.publish(Mutation::DroneAdded(id));
        id
    }

    pub fn update_drone(&mut self, id: DroneId, patch: DronePatch) -> bool {
        let Some(drone) = self.drones.iter_mut().find(|d| d.id == id) else {
            return false;
        };
        patch.apply(drone);
        self.publish(Mutation::DroneUpdated(id));
        true
    }

    /// Out-of-range indexes leave the fleet untouched.
    pub fn update_drone_at(&mut self, index: usize, patch: DronePatch) -> bool {
        match self.drones.get(index).map(|d| d.id) {
            Some(id) => self.update_drone(id, patch),
            None => false,
        }
    }

    pub fn delete_drone(&mut self, id: DroneId) -> bool {
        let Some(index) = self.drone_index(id) else {
            return false;
        };
        self.drones.remove(index);
        self.publish(Mutation::DroneRemoved(id));
        true
    }

    pub fn delete_drone_at(&mut self, index: usize) -> bool {
        match self.drones.get(index).map(|d| d.id) {
            Some(id) => self.delete_drone(id),
            None => false,
        }
    }

    /// Replace the environment block. Zone ids are normalized the same way
    /// as on hydration and an armed zone that no longer exists is disarmed.
    pub fn set_environment(&mut self, mut environment: Environment) {
        normalize_zones(&mut environment);
        let next = next_id(environment.zones.iter().map(|z| z.id.0)).unwrap_or(u32::MAX);
        self.next_zone_id = self.next_zone_id.max(next);
        self.environment = environment;
        self.publish(Mutation::EnvironmentReplaced);
    }

    pub fn set_monitors(&mut self, monitors: Monitors) {
        self.monitors = monitors;
        self.publish(Mutation::MonitorsReplaced);
    }

    fn edit_environment<R>(&mut self, f: impl FnOnce(&mut Environment) -> R) -> R {
        let out = f(&mut self.environment);
        self.publish(Mutation::EnvironmentReplaced);
        out
    }

    pub fn set_origin(&mut self, origin: Origin) {
        self.edit_environment(|env| env.origin = origin);
    }

    /// Move the origin, keeping its name and radius. `image` replaces the
    /// billboard when given.
    pub fn set_origin_location(
        &mut self,
        latitude: f64,
        longitude: f64,
        height: f64,
        image: Option<String>,
    ) {
        self.edit_environment(|env| {
            env.origin.latitude = latitude;
            env.origin.longitude = longitude;
            env.origin.height = height;
            if image.is_some() {
                env.origin.image = image;
            }
        });
    }

    pub fn set_origin_height(&mut self, height: f64) {
        self.edit_environment(|env| env.origin.height = height);
    }

    pub fn set_time_of_day(&mut self, time_of_day: impl Into<String>) {
        let time_of_day = time_of_day.into();
        self.edit_environment(|env| env.time_of_day = Some(time_of_day));
    }

    pub fn set_use_geo(&mut self, use_geo: bool) {
        self.edit_environment(|env| env.use_geo = use_geo);
    }

    /// Toggle fuzzy testing. Turning it off clears the per-dimension flags.
    pub fn set_fuzzy_testing(&mut self, enabled: bool) {
        self.edit_environment(|env| {
            env.enable_fuzzy = enabled;
            if !enabled {
                env.time_of_day_fuzzy = false;
                env.position_fuzzy = false;
                env.wind_fuzzy = false;
            }
        });
    }

    pub fn set_fuzzy_dimensions(&mut self, time_of_day: bool, position: bool, wind: bool) {
        self.edit_environment(|env| {
            env.time_of_day_fuzzy = time_of_day;
            env.position_fuzzy = position;
            env.wind_fuzzy = wind;
        });
    }

    pub fn add_wind(&mut self, wind: Wind) -> usize {
        self.edit_environment(|env| {
            env.wind.push(wind);
            env.wind.len() - 1
        })
    }

    pub fn update_wind_at(&mut self, index: usize, wind: Wind) -> bool {
        if index >= self.environment.wind.len() {
            return false;
        }
        self.edit_environment(|env| env.wind[index] = wind);
        true
    }

    pub fn delete_wind_at(&mut self, index: usize) -> bool {
        if index >= self.environment.wind.len() {
            return false;
        }
        self.edit_environment(|env| {
            env.wind.remove(index);
        });
        true
    }

    pub fn add_zone(&mut self, name: impl Into<String>) -> ZoneId {
        let id = ZoneId(self.next_zone_id);
        self.next_zone_id = self.next_zone_id.saturating_add(1);
        let zone = RestrictedZone::new(id, name);
        self.edit_environment(|env| env.zones.push(zone));
        id
    }

    pub fn rename_zone(&mut self, id: ZoneId, name: impl Into<String>) -> bool {
        if self.environment.zone(id).is_none() {
            return false;
        }
        let name = name.into();
        self.edit_environment(|env| {
            if let Some(zone) = env.zone_mut(id) {
                zone.name = name;
            }
        });
        true
    }

    /// Remove a zone. Removing the armed zone disarms it.
    pub fn delete_zone_at(&mut self, index: usize) -> bool {
        if index >= self.environment.zones.len() {
            return false;
        }
        self.edit_environment(|env| {
            let removed = env.zones.remove(index);
            if env.active_zone == Some(removed.id) {
                env.active_zone = None;
            }
        });
        true
    }

    /// Arm a zone for drawing. Arming replaces any previously armed zone.
    pub fn arm_zone(&mut self, id: ZoneId) -> bool {
        if self.environment.zone(id).is_none() {
            return false;
        }
        self.edit_environment(|env| env.active_zone = Some(id));
        true
    }

    pub fn disarm_zone(&mut self) {
        if self.environment.active_zone.is_some() {
            self.edit_environment(|env| env.active_zone = None);
        }
    }

    /// Write a rectangle and extrusion height into a zone. Derived metrics
    /// are recomputed by the zone itself.
    pub fn set_zone_rectangle(&mut self, id: ZoneId, rect: Rectangle, height: f64) -> bool {
        if self.environment.zone(id).is_none() {
            return false;
        }
        self.edit_environment(|env| {
            if let Some(zone) = env.zone_mut(id) {
                zone.set_rectangle(rect);
                zone.height = height;
            }
        });
        true
    }

    /// End a drawing session on `id`: disarm it and finalize its footprint.
    /// Returns whether the zone kept a non-degenerate rectangle.
    pub fn finalize_zone(&mut self, id: ZoneId) -> bool {
        if self.environment.zone(id).is_none() {
            return false;
        }
        self.edit_environment(|env| {
            env.active_zone = None;
            env.zone_mut(id).is_some_and(|zone| zone.finalize())
        })
    }
}

/// One past the highest id, or `None` when the highest id is `u32::MAX`.
fn next_id(ids: impl Iterator<Item = u32>) -> Option<u32> {
    ids.max().map_or(Some(0), |max| max.checked_add(1))
}

/// Ids are usable as-is when they are unique and leave room for another.
fn ids_allocatable(ids: impl Iterator<Item = u32> + Clone) -> bool {
    let mut seen = HashSet::new();
    ids.clone().all(|id| seen.insert(id)) && next_id(ids).is_some()
}

fn normalize_zones(environment: &mut Environment) {
    if !ids_allocatable(environment.zones.iter().map(|z| z.id.0)) {
        debug!("reassigning zone ids");
        let armed = environment
            .active_zone
            .and_then(|id| environment.zones.iter().position(|z| z.id == id));
        for (i, zone) in environment.zones.iter_mut().enumerate() {
            zone.id = ZoneId(i as u32);
        }
        environment.active_zone = armed.map(|i| ZoneId(i as u32));
    }
    if environment
        .active_zone
        .is_some_and(|id| environment.zone(id).is_none())
    {
        environment.active_zone = None;
    }
}
