use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geo::{self, GeoCoord, GeoPoint, Rectangle};

/// Origin radius in miles used until the user picks one.
pub const DEFAULT_ORIGIN_RADIUS: f64 = 0.3;

/// Billboard shown for the origin until a region icon is dropped.
pub const DEFAULT_ORIGIN_IMAGE: &str = "/images/location.png";

pub const DEFAULT_VEHICLE_TYPE: &str = "SimpleFlight";
pub const DEFAULT_VEHICLE_STATE: &str = "Armed";
pub const DEFAULT_MISSION: &str = "fly_to_points";

/// Stable identifier of a drone within one configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DroneId(pub u32);

impl std::fmt::Display for DroneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier of a restricted zone within one environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(pub u32);

impl std::fmt::Display for ZoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Origin presets offered by the environment panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginKind {
    SpecifyRegion,
    ChicagoOhareAirport,
}

impl OriginKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            OriginKind::SpecifyRegion => "Specify Region",
            OriginKind::ChicagoOhareAirport => "Chicago O'Hare Airport",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "Specify Region" | "SpecifyRegion" => Some(OriginKind::SpecifyRegion),
            "Chicago O'Hare Airport" | "Chicago O’Hare Airport" | "ChicagoOhareAirport" => {
                Some(OriginKind::ChicagoOhareAirport)
            }
            _ => None,
        }
    }

    /// Preset `(latitude, longitude, height)` for this origin.
    pub fn preset(&self) -> (f64, f64, f64) {
        match self {
            OriginKind::SpecifyRegion => (0.0, 0.0, 0.0),
            OriginKind::ChicagoOhareAirport => (41.980381, -87.934524, 200.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Origin {
    pub latitude: f64,
    pub longitude: f64,
    pub height: f64,
    pub name: String,
    pub radius: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Default for Origin {
    fn default() -> Self {
        Origin {
            latitude: 0.0,
            longitude: 0.0,
            height: 0.0,
            name: String::new(),
            radius: DEFAULT_ORIGIN_RADIUS,
            image: Some(DEFAULT_ORIGIN_IMAGE.to_string()),
        }
    }
}

impl Origin {
    /// Build an origin from one of the presets.
    pub fn from_kind(kind: OriginKind) -> Self {
        let (latitude, longitude, height) = kind.preset();
        Origin {
            latitude,
            longitude,
            height,
            name: kind.display_name().to_string(),
            ..Origin::default()
        }
    }

    pub fn kind(&self) -> Option<OriginKind> {
        OriginKind::from_name(&self.name)
    }

    /// Height must come from terrain sampling rather than the preset.
    pub fn needs_terrain_height(&self) -> bool {
        self.kind() == Some(OriginKind::SpecifyRegion)
    }

    pub fn radius_meters(&self) -> f64 {
        self.radius * geo::MILES_TO_METERS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindDirection {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl WindDirection {
    /// Compass bearing the wind blows from, clockwise from north.
    pub fn bearing(&self) -> f64 {
        match self {
            WindDirection::N => 0.0,
            WindDirection::NE => 45.0,
            WindDirection::E => 90.0,
            WindDirection::SE => 135.0,
            WindDirection::S => 180.0,
            WindDirection::SW => 225.0,
            WindDirection::W => 270.0,
            WindDirection::NW => 315.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindType {
    #[serde(rename = "Constant Wind")]
    Constant,
    #[serde(rename = "Turbulent Wind")]
    Turbulent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Wind {
    pub direction: WindDirection,
    pub wind_type: WindType,
    pub velocity: f64,
    #[serde(default)]
    pub fluctuation: f64,
}

/// Metrics derived from a zone rectangle. Never stored independently.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footprint {
    pub length: f64,
    pub width: f64,
    pub center: GeoCoord,
}

impl Footprint {
    pub fn of(rect: &Rectangle) -> Self {
        Footprint {
            length: geo::rectangle_length(rect),
            width: geo::rectangle_width(rect),
            center: geo::rectangle_center(rect),
        }
    }
}

/// A rectangular no-fly region with a height extrusion.
///
/// The rectangle is private: it can only change through [`RestrictedZone::set_rectangle`],
/// which normalizes it and recomputes the footprint in the same step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ZoneRecord", into = "ZoneRecord")]
pub struct RestrictedZone {
    pub id: ZoneId,
    pub name: String,
    pub height: f64,
    rectangle: Option<Rectangle>,
    footprint: Option<Footprint>,
    vertices: Option<[GeoPoint; 4]>,
}

impl RestrictedZone {
    pub fn new(id: ZoneId, name: impl Into<String>) -> Self {
        RestrictedZone {
            id,
            name: name.into(),
            height: 0.0,
            rectangle: None,
            footprint: None,
            vertices: None,
        }
    }

    pub fn rectangle(&self) -> Option<&Rectangle> {
        self.rectangle.as_ref()
    }

    pub fn footprint(&self) -> Option<&Footprint> {
        self.footprint.as_ref()
    }

    pub fn is_drawn(&self) -> bool {
        self.rectangle.is_some()
    }

    /// Replace the rectangle, normalizing the bounds and recomputing the footprint.
    /// Finalized vertices are discarded until the next [`RestrictedZone::finalize`].
    pub fn set_rectangle(&mut self, rect: Rectangle) {
        let rect = geo::make_rectangle(
            GeoPoint::from_radians(rect.south, rect.west),
            GeoPoint::from_radians(rect.north, rect.east),
        );
        self.footprint = Some(Footprint::of(&rect));
        self.rectangle = Some(rect);
        self.vertices = None;
    }

    pub fn clear_rectangle(&mut self) {
        self.rectangle = None;
        self.footprint = None;
        self.vertices = None;
    }

    /// North-south edge length in meters, zero when undrawn.
    pub fn length(&self) -> f64 {
        self.footprint.map(|f| f.length).unwrap_or(0.0)
    }

    /// East-west edge length in meters, zero when undrawn.
    pub fn width(&self) -> f64 {
        self.footprint.map(|f| f.width).unwrap_or(0.0)
    }

    pub fn center(&self) -> Option<GeoCoord> {
        self.footprint.map(|f| f.center)
    }

    /// Corner vertices (SW, SE, NE, NW) at the zone height. Only present once finalized.
    pub fn vertices(&self) -> Option<&[GeoPoint; 4]> {
        self.vertices.as_ref()
    }

    /// Close a drawing session. A zero-area rectangle is discarded and the
    /// zone returns to undrawn. Returns whether the zone kept a rectangle.
    pub fn finalize(&mut self) -> bool {
        match self.rectangle {
            Some(rect) if !rect.is_degenerate() => {
                let height = self.height;
                self.vertices = Some(rect.vertices().map(|v| v.with_height(height)));
                true
            }
            Some(_) => {
                self.clear_rectangle();
                false
            }
            None => false,
        }
    }
}

/// Wire form of a zone. Derived values are written for consumers but
/// recomputed from the rectangle when read back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZoneRecord {
    #[serde(default)]
    id: ZoneId,
    #[serde(default)]
    name: String,
    #[serde(default)]
    height: f64,
    #[serde(default)]
    rectangle: Option<Rectangle>,
    #[serde(default)]
    length: f64,
    #[serde(default)]
    width: f64,
    #[serde(default)]
    center_lat: Option<f64>,
    #[serde(default)]
    center_long: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    vertices: Option<Vec<GeoPoint>>,
}

impl From<ZoneRecord> for RestrictedZone {
    fn from(record: ZoneRecord) -> Self {
        let mut zone = RestrictedZone::new(record.id, record.name);
        zone.height = record.height;
        if let Some(rect) = record.rectangle {
            zone.set_rectangle(rect);
            if record.vertices.is_some() {
                zone.finalize();
            }
        }
        zone
    }
}

impl From<RestrictedZone> for ZoneRecord {
    fn from(zone: RestrictedZone) -> Self {
        ZoneRecord {
            id: zone.id,
            length: zone.length(),
            width: zone.width(),
            center_lat: zone.center().map(|c| c.lat),
            center_long: zone.center().map(|c| c.long),
            vertices: zone.vertices.map(|v| v.to_vec()),
            name: zone.name,
            height: zone.height,
            rectangle: zone.rectangle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    pub name: String,
    #[serde(default)]
    pub param: Vec<serde_json::Value>,
}

impl Default for Mission {
    fn default() -> Self {
        Mission {
            name: DEFAULT_MISSION.to_string(),
            param: Vec::new(),
        }
    }
}

/// A sensor block: a UI display key plus the parameters sent to the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor<T> {
    #[serde(rename = "Key", default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(flatten)]
    pub settings: T,
}

impl<T: Default> Sensor<T> {
    pub fn keyed(key: impl Into<String>) -> Self {
        Sensor {
            key: Some(key.into()),
            settings: T::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Barometer {
    pub enabled: bool,
    pub pressure_factor_sigma: f64,
    pub pressure_factor_tau: f64,
    pub uncorrelated_noise_sigma: f64,
    pub update_latency: f64,
    pub update_frequency: f64,
    pub startup_delay: f64,
}

impl Default for Barometer {
    fn default() -> Self {
        Barometer {
            enabled: true,
            pressure_factor_sigma: 0.001825,
            pressure_factor_tau: 3600.0,
            uncorrelated_noise_sigma: 2.7,
            update_latency: 0.0,
            update_frequency: 50.0,
            startup_delay: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Magnetometer {
    pub enabled: bool,
    pub noise_sigma: f64,
    pub scale_factor: f64,
    pub noise_bias: f64,
    pub update_latency: f64,
    pub update_frequency: f64,
    pub startup_delay: f64,
}

impl Default for Magnetometer {
    fn default() -> Self {
        Magnetometer {
            enabled: true,
            noise_sigma: 0.0001,
            scale_factor: 1.0,
            noise_bias: 0.001,
            update_latency: 0.0,
            update_frequency: 50.0,
            startup_delay: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Gps {
    pub enabled: bool,
    pub eph_time_constant: f64,
    pub epv_time_constant: f64,
    pub eph_initial: f64,
    pub epv_initial: f64,
    pub eph_final: f64,
    pub epv_final: f64,
    pub eph_min3d: f64,
    pub eph_min2d: f64,
    pub update_latency: f64,
    pub update_frequency: f64,
    pub startup_delay: f64,
}

impl Default for Gps {
    fn default() -> Self {
        Gps {
            enabled: true,
            eph_time_constant: 0.9,
            epv_time_constant: 0.9,
            eph_initial: 25.0,
            epv_initial: 25.0,
            eph_final: 0.1,
            epv_final: 0.1,
            eph_min3d: 3.0,
            eph_min2d: 4.0,
            update_latency: 0.2,
            update_frequency: 50.0,
            startup_delay: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Imu {
    pub enabled: bool,
    pub angular_random_walk: f64,
    pub gyro_bias_stability_tau: f64,
    pub gyro_bias_stability: f64,
    pub velocity_random_walk: f64,
    pub accel_bias_stability_tau: f64,
    pub accel_bias_stability: f64,
}

impl Default for Imu {
    fn default() -> Self {
        Imu {
            enabled: true,
            angular_random_walk: 0.3,
            gyro_bias_stability_tau: 500.0,
            gyro_bias_stability: 4.6,
            velocity_random_walk: 0.24,
            accel_bias_stability_tau: 800.0,
            accel_bias_stability: 36.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sensors {
    #[serde(rename = "Barometer", default, skip_serializing_if = "Option::is_none")]
    pub barometer: Option<Sensor<Barometer>>,
    #[serde(rename = "Magnetometer", default, skip_serializing_if = "Option::is_none")]
    pub magnetometer: Option<Sensor<Magnetometer>>,
    #[serde(rename = "GPS", default, skip_serializing_if = "Option::is_none")]
    pub gps: Option<Sensor<Gps>>,
    #[serde(rename = "IMU", default, skip_serializing_if = "Option::is_none")]
    pub imu: Option<Sensor<Imu>>,
}

impl Sensors {
    /// The full default sensor suite with display keys.
    pub fn standard() -> Self {
        Sensors {
            barometer: Some(Sensor::keyed("Barometer")),
            magnetometer: Some(Sensor::keyed("Magnetometer")),
            gps: Some(Sensor::keyed("GPS")),
            imu: Some(Sensor::keyed("IMU")),
        }
    }
}

/// One vehicle in the fleet. `X`/`Y`/`Z` hold latitude, longitude and height.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Drone {
    pub id: DroneId,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "droneName")]
    pub display_name: String,
    #[serde(rename = "VehicleType")]
    pub vehicle_type: String,
    #[serde(rename = "DefaultVehicleState")]
    pub default_vehicle_state: String,
    #[serde(rename = "EnableCollisionPassthrogh")]
    pub enable_collision_passthrough: bool,
    #[serde(rename = "EnableCollisions")]
    pub enable_collisions: bool,
    #[serde(rename = "AllowAPIAlways")]
    pub allow_api_always: bool,
    #[serde(rename = "EnableTrace")]
    pub enable_trace: bool,
    #[serde(rename = "X")]
    pub x: f64,
    #[serde(rename = "Y")]
    pub y: f64,
    #[serde(rename = "Z")]
    pub z: f64,
    #[serde(rename = "Pitch")]
    pub pitch: f64,
    #[serde(rename = "Roll")]
    pub roll: f64,
    #[serde(rename = "Yaw")]
    pub yaw: f64,
    #[serde(rename = "Sensors")]
    pub sensors: Option<Sensors>,
    #[serde(rename = "Mission")]
    pub mission: Mission,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Default for Drone {
    fn default() -> Self {
        Drone {
            id: DroneId::default(),
            name: String::new(),
            display_name: String::new(),
            vehicle_type: DEFAULT_VEHICLE_TYPE.to_string(),
            default_vehicle_state: DEFAULT_VEHICLE_STATE.to_string(),
            enable_collision_passthrough: false,
            enable_collisions: true,
            allow_api_always: true,
            enable_trace: false,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            pitch: 0.0,
            roll: 0.0,
            yaw: 0.0,
            sensors: None,
            mission: Mission::default(),
            color: None,
            image: None,
        }
    }
}

impl Drone {
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Drone {
            display_name: name.clone(),
            name,
            ..Drone::default()
        }
    }

    /// A new drone parked next to the origin, offset north by its slot so
    /// freshly added drones do not share a home position.
    pub fn near_origin(name: impl Into<String>, origin: &Origin, slot: usize) -> Self {
        Drone {
            x: origin.latitude + 0.0001 * slot as f64,
            y: origin.longitude,
            z: origin.height,
            ..Drone::named(name)
        }
    }
}

/// Partial drone update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DronePatch {
    pub name: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub pitch: Option<f64>,
    pub roll: Option<f64>,
    pub yaw: Option<f64>,
    pub sensors: Option<Option<Sensors>>,
    pub mission: Option<Mission>,
}

impl DronePatch {
    pub fn position(x: f64, y: f64, z: f64) -> Self {
        DronePatch {
            x: Some(x),
            y: Some(y),
            z: Some(z),
            ..DronePatch::default()
        }
    }

    pub fn apply(self, drone: &mut Drone) {
        if let Some(name) = self.name {
            drone.display_name = name.clone();
            drone.name = name;
        }
        if let Some(x) = self.x {
            drone.x = x;
        }
        if let Some(y) = self.y {
            drone.y = y;
        }
        if let Some(z) = self.z {
            drone.z = z;
        }
        if let Some(pitch) = self.pitch {
            drone.pitch = pitch;
        }
        if let Some(roll) = self.roll {
            drone.roll = roll;
        }
        if let Some(yaw) = self.yaw {
            drone.yaw = yaw;
        }
        if let Some(sensors) = self.sensors {
            drone.sensors = sensors;
        }
        if let Some(mission) = self.mission {
            drone.mission = mission;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Environment {
    pub name: String,
    pub description: String,
    #[serde(rename = "enableFuzzy")]
    pub enable_fuzzy: bool,
    #[serde(rename = "timeOfDayFuzzy")]
    pub time_of_day_fuzzy: bool,
    #[serde(rename = "positionFuzzy")]
    pub position_fuzzy: bool,
    #[serde(rename = "windFuzzy")]
    pub wind_fuzzy: bool,
    #[serde(rename = "TimeOfDay")]
    pub time_of_day: Option<String>,
    #[serde(rename = "UseGeo")]
    pub use_geo: bool,
    pub time: Option<String>,
    #[serde(rename = "Wind")]
    pub wind: Vec<Wind>,
    #[serde(rename = "Origin")]
    pub origin: Origin,
    #[serde(rename = "sades")]
    pub zones: Vec<RestrictedZone>,
    /// The zone armed for drawing, if any.
    #[serde(rename = "activeSadeZone")]
    pub active_zone: Option<ZoneId>,
}

impl Environment {
    pub fn zone(&self, id: ZoneId) -> Option<&RestrictedZone> {
        self.zones.iter().find(|z| z.id == id)
    }

    pub(crate) fn zone_mut(&mut self, id: ZoneId) -> Option<&mut RestrictedZone> {
        self.zones.iter_mut().find(|z| z.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorKind {
    CircularDeviationMonitor,
    CollisionMonitor,
    UnorderedWaypointMonitor,
    OrderedWaypointMonitor,
    PointDeviationMonitor,
    MinSepDistMonitor,
    LandspaceMonitor,
    NoFlyZoneMonitor,
    DriftMonitor,
    BatteryMonitor,
}

impl MonitorKind {
    pub const ALL: [MonitorKind; 10] = [
        MonitorKind::CircularDeviationMonitor,
        MonitorKind::CollisionMonitor,
        MonitorKind::UnorderedWaypointMonitor,
        MonitorKind::OrderedWaypointMonitor,
        MonitorKind::PointDeviationMonitor,
        MonitorKind::MinSepDistMonitor,
        MonitorKind::LandspaceMonitor,
        MonitorKind::NoFlyZoneMonitor,
        MonitorKind::DriftMonitor,
        MonitorKind::BatteryMonitor,
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorSettings {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub param: Vec<serde_json::Value>,
}

impl MonitorSettings {
    pub fn enabled(param: Vec<serde_json::Value>) -> Self {
        MonitorSettings {
            enable: true,
            param,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Monitors(BTreeMap<MonitorKind, MonitorSettings>);

impl Monitors {
    /// Every known monitor, all disabled.
    pub fn all_disabled() -> Self {
        Monitors(
            MonitorKind::ALL
                .iter()
                .map(|k| (*k, MonitorSettings::default()))
                .collect(),
        )
    }

    pub fn get(&self, kind: MonitorKind) -> Option<&MonitorSettings> {
        self.0.get(&kind)
    }

    pub fn set(&mut self, kind: MonitorKind, settings: MonitorSettings) {
        self.0.insert(kind, settings);
    }

    pub fn iter(&self) -> impl Iterator<Item = (MonitorKind, &MonitorSettings)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }

    pub fn enabled(&self) -> impl Iterator<Item = (MonitorKind, &MonitorSettings)> {
        self.iter().filter(|(_, m)| m.enable)
    }
}
