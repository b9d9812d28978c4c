//! Pointer and drag-and-drop handling on the map.
//!
//! The engine turns screen-space events into aggregate edits: dropping a
//! drone or the origin icon places it on the ground, and a shift-drag draws
//! the rectangle of the armed restricted zone.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::SimulationConfiguration;
use crate::geo::{make_rectangle, GeoPoint};
use crate::models::{DroneId, DronePatch, Origin, ZoneId};
use crate::viewport::{
    CameraControl, NoopCamera, ScreenPoint, Viewport, DEFAULT_CAMERA_HEIGHT, TOP_DOWN_PITCH,
};

/// Surface height assumed when the drawing ray hits nothing.
pub const DEFAULT_ZONE_SURFACE_HEIGHT: f64 = 100.0;

/// Clearance added above the picked surface for a zone's extrusion.
pub const ZONE_CLEARANCE: f64 = 10.0;

/// What is being dragged. Serialized as the drag data-transfer text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DragPayload {
    Drone {
        id: DroneId,
    },
    Region {
        #[serde(rename = "src", default, skip_serializing_if = "Option::is_none")]
        image: Option<String>,
    },
}

impl DragPayload {
    /// Start dragging the drone shown at `index`. The id is captured now so
    /// the drop still targets the same drone if the list changes meanwhile.
    pub fn drone_at(config: &SimulationConfiguration, index: usize) -> Option<Self> {
        config.drone_at(index).map(|d| DragPayload::Drone { id: d.id })
    }

    pub fn to_transfer_text(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Unreadable transfer data is not ours and is ignored.
    pub fn from_transfer_text(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Left,
    Middle,
    Right,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub position: ScreenPoint,
    pub button: PointerButton,
    pub modifiers: Modifiers,
}

impl PointerEvent {
    pub fn new(x: f64, y: f64) -> Self {
        PointerEvent {
            position: ScreenPoint::new(x, y),
            button: PointerButton::Left,
            modifiers: Modifiers::default(),
        }
    }

    pub fn with_shift(mut self) -> Self {
        self.modifiers.shift = true;
        self
    }

    fn is_draw_gesture(&self) -> bool {
        self.button == PointerButton::Left && self.modifiers.shift
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawState {
    Idle,
    Drawing {
        first_corner: GeoPoint,
        zone: ZoneId,
        height: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    PickMiss,
    UnknownDrone,
    UnknownZone,
    NotArmed,
    NotDrawGesture,
    AlreadyDrawing,
    NotDrawing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Ignored(IgnoreReason),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }
}

pub struct InteractionEngine<V> {
    viewport: V,
    camera: Box<dyn CameraControl>,
    state: DrawState,
}

impl<V: Viewport> InteractionEngine<V> {
    pub fn new(viewport: V, camera: Box<dyn CameraControl>) -> Self {
        InteractionEngine {
            viewport,
            camera,
            state: DrawState::Idle,
        }
    }

    pub fn without_camera(viewport: V) -> Self {
        Self::new(viewport, Box::new(NoopCamera))
    }

    pub fn state(&self) -> DrawState {
        self.state
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.state, DrawState::Drawing { .. })
    }

    /// Place the dragged item on the ground under `at`.
    pub fn drop_payload(
        &mut self,
        config: &mut SimulationConfiguration,
        payload: &DragPayload,
        at: ScreenPoint,
    ) -> Outcome {
        if let DragPayload::Drone { id } = payload {
            if config.drone(*id).is_none() {
                debug!(%id, "drop for unknown drone");
                return Outcome::Ignored(IgnoreReason::UnknownDrone);
            }
        }
        let Some(ground) = self.viewport.pick_ground(at) else {
            trace!(?at, "drop missed the globe");
            return Outcome::Ignored(IgnoreReason::PickMiss);
        };
        let height = self.viewport.pick_surface_height(at).unwrap_or(0.0);
        let latitude = ground.latitude_degrees();
        let longitude = ground.longitude_degrees();

        match payload {
            DragPayload::Drone { id } => {
                config.update_drone(*id, DronePatch::position(latitude, longitude, height));
            }
            DragPayload::Region { image } => {
                config.set_origin_location(latitude, longitude, height, image.clone());
            }
        }
        self.camera.recenter(longitude, latitude, None, None);
        Outcome::Applied
    }

    /// Shift + left press starts drawing the armed zone.
    pub fn pointer_down(
        &mut self,
        config: &mut SimulationConfiguration,
        event: PointerEvent,
    ) -> Outcome {
        if !event.is_draw_gesture() {
            return Outcome::Ignored(IgnoreReason::NotDrawGesture);
        }
        if self.is_drawing() {
            return Outcome::Ignored(IgnoreReason::AlreadyDrawing);
        }
        let Some(zone) = config.environment().active_zone else {
            return Outcome::Ignored(IgnoreReason::NotArmed);
        };
        if config.environment().zone(zone).is_none() {
            return Outcome::Ignored(IgnoreReason::UnknownZone);
        }
        let Some(first_corner) = self.viewport.pick_ground(event.position) else {
            trace!(at = ?event.position, "draw start missed the globe");
            return Outcome::Ignored(IgnoreReason::PickMiss);
        };
        let surface = self
            .viewport
            .pick_surface_height(event.position)
            .unwrap_or(DEFAULT_ZONE_SURFACE_HEIGHT);

        self.camera.set_rotation_enabled(false);
        self.state = DrawState::Drawing {
            first_corner,
            zone,
            height: surface + ZONE_CLEARANCE,
        };
        debug!(%zone, "zone drawing started");
        Outcome::Applied
    }

    /// Stretch the rectangle to the point under the cursor.
    pub fn pointer_move(
        &mut self,
        config: &mut SimulationConfiguration,
        event: PointerEvent,
    ) -> Outcome {
        let DrawState::Drawing {
            first_corner,
            zone,
            height,
        } = self.state
        else {
            return Outcome::Ignored(IgnoreReason::NotDrawing);
        };
        let Some(corner) = self.viewport.pick_ground(event.position) else {
            trace!(at = ?event.position, "draw move missed the globe");
            return Outcome::Ignored(IgnoreReason::PickMiss);
        };
        let rect = make_rectangle(first_corner, corner);
        if config.set_zone_rectangle(zone, rect, height) {
            Outcome::Applied
        } else {
            Outcome::Ignored(IgnoreReason::UnknownZone)
        }
    }

    /// Release ends the drawing session and disarms the zone.
    pub fn pointer_up(
        &mut self,
        config: &mut SimulationConfiguration,
        _event: PointerEvent,
    ) -> Outcome {
        let DrawState::Drawing { zone, .. } = self.state else {
            return Outcome::Ignored(IgnoreReason::NotDrawing);
        };
        self.state = DrawState::Idle;
        self.camera.set_rotation_enabled(true);

        if config.environment().zone(zone).is_none() {
            config.disarm_zone();
            return Outcome::Ignored(IgnoreReason::UnknownZone);
        }
        if config.finalize_zone(zone) {
            debug!(%zone, "zone drawing finished");
        } else {
            debug!(%zone, "zero-area zone discarded");
        }
        Outcome::Applied
    }

    /// The rendering surface is going away. Abandons any drawing session and
    /// leaves the zone as last drawn.
    pub fn detach(&mut self) {
        if self.is_drawing() {
            self.camera.set_rotation_enabled(true);
        }
        self.state = DrawState::Idle;
    }

    /// Fly the camera to a newly chosen origin, top-down.
    pub fn focus_origin(&self, origin: &Origin) {
        self.camera.recenter(
            origin.longitude,
            origin.latitude,
            Some(DEFAULT_CAMERA_HEIGHT),
            Some(TOP_DOWN_PITCH),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo;
    use crate::models::{Drone, Footprint};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct FakeViewport {
        ground: Vec<(ScreenPoint, GeoPoint)>,
        surface: Vec<(ScreenPoint, f64)>,
    }

    impl FakeViewport {
        fn ground(mut self, x: f64, y: f64, point: GeoPoint) -> Self {
            self.ground.push((ScreenPoint::new(x, y), point));
            self
        }

        fn surface(mut self, x: f64, y: f64, height: f64) -> Self {
            self.surface.push((ScreenPoint::new(x, y), height));
            self
        }
    }

    impl Viewport for FakeViewport {
        fn pick_ground(&self, at: ScreenPoint) -> Option<GeoPoint> {
            self.ground.iter().find(|(p, _)| *p == at).map(|(_, g)| *g)
        }

        fn pick_surface_height(&self, at: ScreenPoint) -> Option<f64> {
            self.surface.iter().find(|(p, _)| *p == at).map(|(_, h)| *h)
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum CameraCall {
        Recenter(f64, f64, Option<f64>, Option<f64>),
        Rotation(bool),
    }

    #[derive(Default)]
    struct RecordingCamera {
        calls: RefCell<Vec<CameraCall>>,
    }

    impl CameraControl for RecordingCamera {
        fn recenter(&self, longitude: f64, latitude: f64, altitude: Option<f64>, pitch: Option<f64>) {
            self.calls
                .borrow_mut()
                .push(CameraCall::Recenter(longitude, latitude, altitude, pitch));
        }

        fn set_rotation_enabled(&self, enabled: bool) {
            self.calls.borrow_mut().push(CameraCall::Rotation(enabled));
        }
    }

    fn engine(viewport: FakeViewport) -> (InteractionEngine<FakeViewport>, Rc<RecordingCamera>) {
        let camera = Rc::new(RecordingCamera::default());
        let engine = InteractionEngine::new(viewport, Box::new(Rc::clone(&camera)));
        (engine, camera)
    }

    fn armed_config() -> (SimulationConfiguration, ZoneId) {
        let mut config = SimulationConfiguration::new();
        let zone = config.add_zone("Zone 1");
        config.arm_zone(zone);
        (config, zone)
    }

    fn drawing_viewport() -> FakeViewport {
        FakeViewport::default()
            .ground(0.0, 0.0, GeoPoint::from_radians(0.0, 0.0))
            .ground(10.0, 10.0, GeoPoint::from_radians(0.001, 0.002))
            .ground(20.0, 5.0, GeoPoint::from_radians(-0.003, 0.004))
            .ground(3.0, 30.0, GeoPoint::from_radians(0.002, -0.001))
    }

    #[test]
    fn test_drop_drone_on_picked_ground() {
        let viewport = FakeViewport::default()
            .ground(120.0, 80.0, GeoPoint::from_degrees(41.98, -87.93))
            .surface(120.0, 80.0, 12.0);
        let (mut engine, camera) = engine(viewport);
        let mut config = SimulationConfiguration::new();
        config.add_drone(Drone::named("Drone 1"));

        let payload = DragPayload::drone_at(&config, 0).unwrap();
        let outcome = engine.drop_payload(&mut config, &payload, ScreenPoint::new(120.0, 80.0));
        assert_eq!(outcome, Outcome::Applied);

        let d = config.drone_at(0).unwrap();
        assert!((d.x - 41.98).abs() < 1e-9);
        assert!((d.y - (-87.93)).abs() < 1e-9);
        assert_eq!(d.z, 12.0);
        assert!(matches!(
            camera.calls.borrow()[0],
            CameraCall::Recenter(_, _, None, None)
        ));
    }

    #[test]
    fn test_drop_without_surface_hit_uses_zero_height() {
        let viewport =
            FakeViewport::default().ground(1.0, 1.0, GeoPoint::from_degrees(10.0, 20.0));
        let (mut engine, _) = engine(viewport);
        let mut config = SimulationConfiguration::new();
        let id = config.add_drone(Drone {
            z: 55.0,
            ..Drone::named("D")
        });
        let payload = DragPayload::Drone { id };
        engine.drop_payload(&mut config, &payload, ScreenPoint::new(1.0, 1.0));
        assert_eq!(config.drone(id).unwrap().z, 0.0);
    }

    #[test]
    fn test_drop_pick_miss_changes_nothing() {
        let (mut engine, camera) = engine(FakeViewport::default());
        let mut config = SimulationConfiguration::new();
        config.add_drone(Drone::named("Drone 1"));
        let before = config.snapshot();
        let payload = DragPayload::drone_at(&config, 0).unwrap();
        let outcome = engine.drop_payload(&mut config, &payload, ScreenPoint::new(5.0, 5.0));
        assert_eq!(outcome, Outcome::Ignored(IgnoreReason::PickMiss));
        assert!(std::sync::Arc::ptr_eq(&before, &config.snapshot()));
        assert!(camera.calls.borrow().is_empty());
    }

    #[test]
    fn test_drop_unknown_drone_ignored() {
        let viewport = FakeViewport::default().ground(0.0, 0.0, GeoPoint::from_degrees(1.0, 1.0));
        let (mut engine, _) = engine(viewport);
        let mut config = SimulationConfiguration::new();
        let payload = DragPayload::Drone { id: DroneId(7) };
        let outcome = engine.drop_payload(&mut config, &payload, ScreenPoint::new(0.0, 0.0));
        assert_eq!(outcome, Outcome::Ignored(IgnoreReason::UnknownDrone));
    }

    #[test]
    fn test_drag_payload_survives_reordering() {
        let viewport = FakeViewport::default().ground(0.0, 0.0, GeoPoint::from_degrees(5.0, 6.0));
        let (mut engine, _) = engine(viewport);
        let mut config = SimulationConfiguration::new();
        config.add_drone(Drone::named("A"));
        let b = config.add_drone(Drone::named("B"));
        let payload = DragPayload::drone_at(&config, 1).unwrap();
        config.delete_drone_at(0);
        engine.drop_payload(&mut config, &payload, ScreenPoint::new(0.0, 0.0));
        let moved = config.drone(b).unwrap();
        assert_eq!(moved.name, "B");
        assert!((moved.x - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_drop_region_moves_origin() {
        let viewport = FakeViewport::default()
            .ground(0.0, 0.0, GeoPoint::from_degrees(35.0, 139.0))
            .surface(0.0, 0.0, 40.0);
        let (mut engine, _) = engine(viewport);
        let mut config = SimulationConfiguration::new();
        let payload = DragPayload::Region {
            image: Some("/images/region.png".into()),
        };
        engine.drop_payload(&mut config, &payload, ScreenPoint::new(0.0, 0.0));
        let origin = &config.environment().origin;
        assert!((origin.latitude - 35.0).abs() < 1e-9);
        assert!((origin.longitude - 139.0).abs() < 1e-9);
        assert_eq!(origin.height, 40.0);
        assert_eq!(origin.image.as_deref(), Some("/images/region.png"));
    }

    #[test]
    fn test_transfer_text_format() {
        let payload = DragPayload::Drone { id: DroneId(3) };
        let text = payload.to_transfer_text().unwrap();
        assert_eq!(text, r#"{"type":"drone","id":3}"#);
        assert_eq!(DragPayload::from_transfer_text(&text), Some(payload));
        assert_eq!(
            DragPayload::from_transfer_text(r#"{"type":"region","src":"/a.png"}"#),
            Some(DragPayload::Region {
                image: Some("/a.png".into())
            })
        );
        assert_eq!(DragPayload::from_transfer_text("plain text"), None);
    }

    #[test]
    fn test_draw_reference_rectangle() {
        let (mut engine, camera) = engine(drawing_viewport());
        let (mut config, zone) = armed_config();

        let down = engine.pointer_down(&mut config, PointerEvent::new(0.0, 0.0).with_shift());
        assert_eq!(down, Outcome::Applied);
        let moved = engine.pointer_move(&mut config, PointerEvent::new(10.0, 10.0).with_shift());
        assert_eq!(moved, Outcome::Applied);

        let z = config.environment().zone(zone).unwrap();
        let r = z.rectangle().unwrap();
        assert_eq!((r.west, r.south, r.east, r.north), (0.0, 0.0, 0.002, 0.001));
        assert!((z.length() - geo::EARTH_RADIUS_M * 0.001).abs() < 1e-6);
        assert!((z.width() - geo::EARTH_RADIUS_M * 0.002).abs() < 1e-6);
        // no surface under the start point
        assert_eq!(z.height, DEFAULT_ZONE_SURFACE_HEIGHT + ZONE_CLEARANCE);

        engine.pointer_up(&mut config, PointerEvent::new(10.0, 10.0));
        assert_eq!(engine.state(), DrawState::Idle);
        assert_eq!(config.environment().active_zone, None);
        assert!(config.environment().zone(zone).unwrap().vertices().is_some());
        assert_eq!(
            *camera.calls.borrow(),
            vec![CameraCall::Rotation(false), CameraCall::Rotation(true)]
        );
    }

    #[test]
    fn test_zone_height_follows_picked_surface() {
        let (mut engine, _) = engine(drawing_viewport().surface(0.0, 0.0, 250.0));
        let (mut config, zone) = armed_config();
        engine.pointer_down(&mut config, PointerEvent::new(0.0, 0.0).with_shift());
        engine.pointer_move(&mut config, PointerEvent::new(10.0, 10.0));
        assert_eq!(config.environment().zone(zone).unwrap().height, 260.0);
    }

    #[test]
    fn test_derived_fields_match_after_move_sequence() {
        let (mut engine, _) = engine(drawing_viewport());
        let (mut config, zone) = armed_config();
        engine.pointer_down(&mut config, PointerEvent::new(0.0, 0.0).with_shift());
        for (x, y) in [(10.0, 10.0), (20.0, 5.0), (99.0, 99.0), (3.0, 30.0), (10.0, 10.0)] {
            engine.pointer_move(&mut config, PointerEvent::new(x, y));
            let z = config.environment().zone(zone).unwrap();
            let fresh = Footprint::of(z.rectangle().unwrap());
            assert_eq!(z.footprint(), Some(&fresh));
            let snap = config.snapshot();
            assert_eq!(snap.environment.zone(zone), Some(z));
        }
    }

    #[test]
    fn test_move_pick_miss_leaves_zone_untouched() {
        let (mut engine, _) = engine(drawing_viewport());
        let (mut config, zone) = armed_config();
        engine.pointer_down(&mut config, PointerEvent::new(0.0, 0.0).with_shift());
        engine.pointer_move(&mut config, PointerEvent::new(10.0, 10.0));
        let before = config.snapshot();
        let outcome = engine.pointer_move(&mut config, PointerEvent::new(77.0, 77.0));
        assert_eq!(outcome, Outcome::Ignored(IgnoreReason::PickMiss));
        assert!(std::sync::Arc::ptr_eq(&before, &config.snapshot()));
        assert!(config.environment().zone(zone).unwrap().is_drawn());
    }

    #[test]
    fn test_second_draw_start_is_ignored() {
        let (mut engine, camera) = engine(drawing_viewport());
        let (mut config, zone) = armed_config();
        engine.pointer_down(&mut config, PointerEvent::new(0.0, 0.0).with_shift());
        let state = engine.state();
        let again = engine.pointer_down(&mut config, PointerEvent::new(10.0, 10.0).with_shift());
        assert_eq!(again, Outcome::Ignored(IgnoreReason::AlreadyDrawing));
        assert_eq!(engine.state(), state);
        assert_eq!(camera.calls.borrow().len(), 1);
        assert!(matches!(state, DrawState::Drawing { zone: z, .. } if z == zone));
    }

    #[test]
    fn test_draw_requires_armed_zone_and_gesture() {
        let (mut engine, camera) = engine(drawing_viewport());
        let mut config = SimulationConfiguration::new();
        config.add_zone("Unarmed");
        assert_eq!(
            engine.pointer_down(&mut config, PointerEvent::new(0.0, 0.0).with_shift()),
            Outcome::Ignored(IgnoreReason::NotArmed)
        );
        let (mut armed, _) = armed_config();
        assert_eq!(
            engine.pointer_down(&mut armed, PointerEvent::new(0.0, 0.0)),
            Outcome::Ignored(IgnoreReason::NotDrawGesture)
        );
        let right = PointerEvent {
            button: PointerButton::Right,
            ..PointerEvent::new(0.0, 0.0).with_shift()
        };
        assert_eq!(
            engine.pointer_down(&mut armed, right),
            Outcome::Ignored(IgnoreReason::NotDrawGesture)
        );
        assert_eq!(engine.state(), DrawState::Idle);
        assert!(camera.calls.borrow().is_empty());
    }

    #[test]
    fn test_draw_start_pick_miss_stays_idle() {
        let (mut engine, camera) = engine(drawing_viewport());
        let (mut config, _) = armed_config();
        let outcome = engine.pointer_down(&mut config, PointerEvent::new(50.0, 50.0).with_shift());
        assert_eq!(outcome, Outcome::Ignored(IgnoreReason::PickMiss));
        assert_eq!(engine.state(), DrawState::Idle);
        assert!(camera.calls.borrow().is_empty());
    }

    #[test]
    fn test_move_and_up_outside_drawing_are_ignored() {
        let (mut engine, _) = engine(drawing_viewport());
        let (mut config, _) = armed_config();
        assert_eq!(
            engine.pointer_move(&mut config, PointerEvent::new(10.0, 10.0)),
            Outcome::Ignored(IgnoreReason::NotDrawing)
        );
        assert_eq!(
            engine.pointer_up(&mut config, PointerEvent::new(10.0, 10.0)),
            Outcome::Ignored(IgnoreReason::NotDrawing)
        );
    }

    #[test]
    fn test_click_without_drag_discards_zone() {
        let (mut engine, _) = engine(drawing_viewport());
        let (mut config, zone) = armed_config();
        engine.pointer_down(&mut config, PointerEvent::new(0.0, 0.0).with_shift());
        engine.pointer_move(&mut config, PointerEvent::new(0.0, 0.0));
        engine.pointer_up(&mut config, PointerEvent::new(0.0, 0.0));
        assert!(!config.environment().zone(zone).unwrap().is_drawn());
        assert_eq!(config.environment().active_zone, None);
    }

    #[test]
    fn test_detach_mid_draw_keeps_last_rectangle() {
        let (mut engine, camera) = engine(drawing_viewport());
        let (mut config, zone) = armed_config();
        engine.pointer_down(&mut config, PointerEvent::new(0.0, 0.0).with_shift());
        engine.pointer_move(&mut config, PointerEvent::new(10.0, 10.0));
        engine.detach();
        assert_eq!(engine.state(), DrawState::Idle);
        assert_eq!(camera.calls.borrow().last(), Some(&CameraCall::Rotation(true)));
        assert!(config.environment().zone(zone).unwrap().is_drawn());
        // detaching again is harmless
        engine.detach();
        assert_eq!(camera.calls.borrow().len(), 2);
    }

    #[test]
    fn test_focus_origin_is_top_down() {
        let (engine, camera) = engine(FakeViewport::default());
        let origin = Origin::from_kind(crate::models::OriginKind::ChicagoOhareAirport);
        engine.focus_origin(&origin);
        assert_eq!(
            camera.calls.borrow()[0],
            CameraCall::Recenter(
                -87.934524,
                41.980381,
                Some(DEFAULT_CAMERA_HEIGHT),
                Some(TOP_DOWN_PITCH)
            )
        );
    }

    #[test]
    fn test_engine_without_camera() {
        let mut engine = InteractionEngine::without_camera(drawing_viewport());
        let (mut config, _) = armed_config();
        assert!(engine
            .pointer_down(&mut config, PointerEvent::new(0.0, 0.0).with_shift())
            .is_applied());
        engine.detach();
        assert!(!engine.is_drawing());
    }
}
