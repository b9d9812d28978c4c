//! The payload sent to the simulator when the wizard finishes.
//!
//! The submission types mirror the editing models minus everything that only
//! exists for the UI, so a field that must not reach the simulator has no
//! place to go.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigurationRecord, SimulationConfiguration};
use crate::error::SubmissionError;
use crate::geo::Rectangle;
use crate::models::{
    Barometer, Drone, DroneId, Environment, Gps, Imu, Magnetometer, Mission, MonitorKind,
    MonitorSettings, Monitors, Origin, RestrictedZone, Sensor, Sensors, Wind, ZoneId,
};

pub const FUZZY_TARGET: &str = "Wind";
pub const FUZZY_PRECISION: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub environment: SubmissionEnvironment,
    #[serde(rename = "Drones")]
    pub drones: Vec<SubmissionDrone>,
    pub monitors: BTreeMap<MonitorKind, SubmissionMonitor>,
    #[serde(rename = "FuzzyTest", default, skip_serializing_if = "Option::is_none")]
    pub fuzzy_test: Option<FuzzyTest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyTest {
    pub target: String,
    pub precision: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionEnvironment {
    pub name: String,
    pub description: String,
    #[serde(rename = "Origin")]
    pub origin: SubmissionOrigin,
    #[serde(rename = "Wind")]
    pub wind: Vec<Wind>,
    #[serde(rename = "TimeOfDay", default, skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<String>,
    #[serde(rename = "UseGeo")]
    pub use_geo: bool,
    pub sades: Vec<SubmissionZone>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionOrigin {
    pub latitude: f64,
    pub longitude: f64,
    pub height: f64,
    pub name: String,
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionZone {
    pub name: String,
    pub height: f64,
    pub length: f64,
    pub width: f64,
    pub center_lat: f64,
    pub center_long: f64,
    pub rectangle: Rectangle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubmissionDrone {
    pub name: String,
    pub vehicle_type: String,
    pub default_vehicle_state: String,
    pub enable_collision_passthrogh: bool,
    pub enable_collisions: bool,
    #[serde(rename = "AllowAPIAlways")]
    pub allow_api_always: bool,
    pub enable_trace: bool,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub pitch: f64,
    pub roll: f64,
    pub yaw: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensors: Option<SubmissionSensors>,
    pub mission: Mission,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionSensors {
    #[serde(rename = "Barometer", default, skip_serializing_if = "Option::is_none")]
    pub barometer: Option<Barometer>,
    #[serde(rename = "Magnetometer", default, skip_serializing_if = "Option::is_none")]
    pub magnetometer: Option<Magnetometer>,
    #[serde(rename = "GPS", default, skip_serializing_if = "Option::is_none")]
    pub gps: Option<Gps>,
    #[serde(rename = "IMU", default, skip_serializing_if = "Option::is_none")]
    pub imu: Option<Imu>,
}

/// An enabled monitor. Disabled monitors never make it into the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionMonitor {
    #[serde(default)]
    pub param: Vec<serde_json::Value>,
}

impl From<&Drone> for SubmissionDrone {
    fn from(d: &Drone) -> Self {
        SubmissionDrone {
            name: d.name.clone(),
            vehicle_type: d.vehicle_type.clone(),
            default_vehicle_state: d.default_vehicle_state.clone(),
            enable_collision_passthrogh: d.enable_collision_passthrough,
            enable_collisions: d.enable_collisions,
            allow_api_always: d.allow_api_always,
            enable_trace: d.enable_trace,
            x: d.x,
            y: d.y,
            z: d.z,
            pitch: d.pitch,
            roll: d.roll,
            yaw: d.yaw,
            sensors: d.sensors.as_ref().map(SubmissionSensors::from),
            mission: d.mission.clone(),
        }
    }
}

impl From<&Sensors> for SubmissionSensors {
    fn from(s: &Sensors) -> Self {
        SubmissionSensors {
            barometer: s.barometer.as_ref().map(|b| b.settings.clone()),
            magnetometer: s.magnetometer.as_ref().map(|m| m.settings.clone()),
            gps: s.gps.as_ref().map(|g| g.settings.clone()),
            imu: s.imu.as_ref().map(|i| i.settings.clone()),
        }
    }
}

impl SubmissionZone {
    /// `None` for zones that were never drawn.
    fn from_zone(zone: &RestrictedZone) -> Option<Self> {
        let rectangle = *zone.rectangle()?;
        let center = zone.center()?;
        Some(SubmissionZone {
            name: zone.name.clone(),
            height: zone.height,
            length: zone.length(),
            width: zone.width(),
            center_lat: center.lat,
            center_long: center.long,
            rectangle,
        })
    }
}

impl From<&Environment> for SubmissionEnvironment {
    fn from(env: &Environment) -> Self {
        let o = &env.origin;
        SubmissionEnvironment {
            name: env.name.clone(),
            description: env.description.clone(),
            origin: SubmissionOrigin {
                latitude: o.latitude,
                longitude: o.longitude,
                height: o.height,
                name: o.name.clone(),
                radius: o.radius,
            },
            wind: env.wind.clone(),
            time_of_day: env.time_of_day.clone(),
            use_geo: env.use_geo,
            sades: env.zones.iter().filter_map(SubmissionZone::from_zone).collect(),
        }
    }
}

fn enabled_monitors(monitors: &Monitors) -> BTreeMap<MonitorKind, SubmissionMonitor> {
    monitors
        .enabled()
        .map(|(kind, m)| {
            (
                kind,
                SubmissionMonitor {
                    param: m.param.clone(),
                },
            )
        })
        .collect()
}

/// Build the simulator payload from the current configuration. Total and
/// deterministic: the same configuration always yields the same payload.
pub fn to_submission_payload(config: &SimulationConfiguration) -> SubmissionPayload {
    let env = config.environment();
    SubmissionPayload {
        environment: SubmissionEnvironment::from(env),
        drones: config.drones().iter().map(SubmissionDrone::from).collect(),
        monitors: enabled_monitors(config.monitors()),
        fuzzy_test: env.enable_fuzzy.then(|| FuzzyTest {
            target: FUZZY_TARGET.to_string(),
            precision: FUZZY_PRECISION,
        }),
    }
}

/// Check the fields the simulator cannot run without.
pub fn validate(config: &SimulationConfiguration) -> Result<(), SubmissionError> {
    let mut missing = Vec::new();
    if config.environment().origin.name.trim().is_empty() {
        missing.push("environment.Origin.name".to_string());
    }
    if config.drones().is_empty() {
        missing.push("Drones".to_string());
    }
    for (i, drone) in config.drones().iter().enumerate() {
        if drone.name.trim().is_empty() {
            missing.push(format!("Drones[{i}].Name"));
        }
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(SubmissionError::ValidationGap(missing))
    }
}

impl SimulationConfiguration {
    /// Validate and produce the final payload, ending the editing session.
    pub fn into_submission(self) -> Result<SubmissionPayload, SubmissionError> {
        validate(&self)?;
        Ok(to_submission_payload(&self))
    }
}

/// Rebuild an editable record from a saved submission. UI-only fields come
/// back with their defaults and ids are assigned in order.
impl From<SubmissionPayload> for ConfigurationRecord {
    fn from(payload: SubmissionPayload) -> Self {
        let env = payload.environment;
        let zones = env
            .sades
            .into_iter()
            .enumerate()
            .map(|(i, z)| {
                let mut zone = RestrictedZone::new(ZoneId(i as u32), z.name);
                zone.height = z.height;
                zone.set_rectangle(z.rectangle);
                zone.finalize();
                zone
            })
            .collect();
        let environment = Environment {
            name: env.name,
            description: env.description,
            enable_fuzzy: payload.fuzzy_test.is_some(),
            time_of_day: env.time_of_day,
            use_geo: env.use_geo,
            wind: env.wind,
            origin: Origin {
                latitude: env.origin.latitude,
                longitude: env.origin.longitude,
                height: env.origin.height,
                name: env.origin.name,
                radius: env.origin.radius,
                ..Origin::default()
            },
            zones,
            ..Environment::default()
        };

        let drones = payload
            .drones
            .into_iter()
            .enumerate()
            .map(|(i, d)| Drone {
                id: DroneId(i as u32),
                display_name: d.name.clone(),
                name: d.name,
                vehicle_type: d.vehicle_type,
                default_vehicle_state: d.default_vehicle_state,
                enable_collision_passthrough: d.enable_collision_passthrogh,
                enable_collisions: d.enable_collisions,
                allow_api_always: d.allow_api_always,
                enable_trace: d.enable_trace,
                x: d.x,
                y: d.y,
                z: d.z,
                pitch: d.pitch,
                roll: d.roll,
                yaw: d.yaw,
                sensors: d.sensors.map(|s| Sensors {
                    barometer: s.barometer.map(|settings| Sensor {
                        key: Some("Barometer".into()),
                        settings,
                    }),
                    magnetometer: s.magnetometer.map(|settings| Sensor {
                        key: Some("Magnetometer".into()),
                        settings,
                    }),
                    gps: s.gps.map(|settings| Sensor {
                        key: Some("GPS".into()),
                        settings,
                    }),
                    imu: s.imu.map(|settings| Sensor {
                        key: Some("IMU".into()),
                        settings,
                    }),
                }),
                mission: d.mission,
                ..Drone::default()
            })
            .collect();

        let mut monitors = Monitors::all_disabled();
        for (kind, m) in payload.monitors {
            monitors.set(kind, MonitorSettings::enabled(m.param));
        }

        ConfigurationRecord {
            environment,
            drones,
            monitors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{make_rectangle, GeoPoint};
    use crate::models::{OriginKind, Sensors};
    use serde_json::json;

    fn one_drone_one_monitor() -> SimulationConfiguration {
        let mut config = SimulationConfiguration::new();
        config.set_origin(Origin::from_kind(OriginKind::ChicagoOhareAirport));
        let mut drone = Drone::named("Drone 1");
        drone.color = Some("#ff0000".into());
        drone.image = Some("/images/drone-red.png".into());
        config.add_drone(drone);
        let mut monitors = Monitors::all_disabled();
        monitors.set(
            MonitorKind::CollisionMonitor,
            MonitorSettings::enabled(vec![json!(2.5), json!("strict")]),
        );
        config.set_monitors(monitors);
        config
    }

    #[test]
    fn test_payload_strips_ui_fields_and_disabled_monitors() {
        let config = one_drone_one_monitor();
        let payload = serde_json::to_value(to_submission_payload(&config)).unwrap();

        let drone = &payload["Drones"][0];
        assert!(drone.get("id").is_none());
        assert!(drone.get("droneName").is_none());
        assert!(drone.get("color").is_none());
        assert!(drone.get("image").is_none());
        assert!(drone.get("Sensors").is_none());
        assert_eq!(drone["Name"], "Drone 1");

        let monitors = payload["monitors"].as_object().unwrap();
        assert_eq!(monitors.len(), 1);
        let collision = &monitors["collision_monitor"];
        assert!(collision.get("enable").is_none());
        assert_eq!(collision["param"], json!([2.5, "strict"]));
    }

    #[test]
    fn test_payload_drops_fuzzy_scaffolding() {
        let mut config = one_drone_one_monitor();
        config.set_fuzzy_testing(true);
        config.set_fuzzy_dimensions(false, true, true);
        let payload = serde_json::to_value(to_submission_payload(&config)).unwrap();
        let env = &payload["environment"];
        for key in [
            "enableFuzzy",
            "timeOfDayFuzzy",
            "positionFuzzy",
            "windFuzzy",
            "time",
            "activeSadeZone",
        ] {
            assert!(env.get(key).is_none(), "{key} leaked into payload");
        }
        assert!(env["Origin"].get("image").is_none());
        assert_eq!(payload["FuzzyTest"], json!({"target": "Wind", "precision": 5}));
    }

    #[test]
    fn test_no_fuzzy_test_when_disabled() {
        let payload = serde_json::to_value(to_submission_payload(&one_drone_one_monitor())).unwrap();
        assert!(payload.get("FuzzyTest").is_none());
    }

    #[test]
    fn test_sensor_keys_removed_settings_kept() {
        let mut config = one_drone_one_monitor();
        config.add_drone(Drone {
            sensors: Some(Sensors::standard()),
            ..Drone::named("Drone 2")
        });
        let payload = serde_json::to_value(to_submission_payload(&config)).unwrap();
        let sensors = &payload["Drones"][1]["Sensors"];
        for name in ["Barometer", "Magnetometer", "GPS", "IMU"] {
            assert!(sensors[name].get("Key").is_none(), "{name} kept its Key");
            assert_eq!(sensors[name]["Enabled"], true);
        }
    }

    #[test]
    fn test_undrawn_zones_omitted() {
        let mut config = one_drone_one_monitor();
        config.add_zone("Never drawn");
        let drawn = config.add_zone("Drawn");
        config.set_zone_rectangle(
            drawn,
            make_rectangle(
                GeoPoint::from_radians(0.0, 0.0),
                GeoPoint::from_radians(0.001, 0.002),
            ),
            110.0,
        );
        config.finalize_zone(drawn);
        let payload = to_submission_payload(&config);
        assert_eq!(payload.environment.sades.len(), 1);
        let zone = &payload.environment.sades[0];
        assert_eq!(zone.name, "Drawn");
        assert!(zone.length > 0.0 && zone.width > 0.0);
    }

    #[test]
    fn test_payload_is_deterministic() {
        let config = one_drone_one_monitor();
        assert_eq!(to_submission_payload(&config), to_submission_payload(&config));
    }

    #[test]
    fn test_validate_reports_every_gap() {
        let mut config = SimulationConfiguration::new();
        let err = validate(&config).unwrap_err();
        assert_eq!(
            err.missing(),
            &["environment.Origin.name".to_string(), "Drones".to_string()]
        );
        config.set_origin(Origin::from_kind(OriginKind::SpecifyRegion));
        config.add_drone(Drone::default());
        let err = validate(&config).unwrap_err();
        assert_eq!(err.missing(), &["Drones[0].Name".to_string()]);
    }

    #[test]
    fn test_into_submission_validates_first() {
        let config = SimulationConfiguration::new();
        assert!(matches!(
            config.into_submission(),
            Err(SubmissionError::ValidationGap(_))
        ));
        assert!(one_drone_one_monitor().into_submission().is_ok());
    }

    #[test]
    fn test_saved_payload_rehydrates_into_record() {
        let mut config = one_drone_one_monitor();
        config.update_drone_at(0, crate::models::DronePatch::position(41.98, -87.93, 12.0));
        let payload = to_submission_payload(&config);
        let text = serde_json::to_string(&payload).unwrap();
        let back: SubmissionPayload = serde_json::from_str(&text).unwrap();
        let record = ConfigurationRecord::from(back);
        assert_eq!(record.drones.len(), 1);
        assert_eq!(record.drones[0].display_name, "Drone 1");
        assert_eq!(record.drones[0].x, 41.98);
        assert_eq!(record.environment.origin.name, "Chicago O'Hare Airport");
        let collision = record.monitors.get(MonitorKind::CollisionMonitor).unwrap();
        assert!(collision.enable);
        assert!(!record.monitors.get(MonitorKind::BatteryMonitor).unwrap().enable);
    }
}
