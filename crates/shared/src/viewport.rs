//! Bridge to the 3D rendering surface.
//!
//! The core never renders anything. The surface hands back geographic picks
//! for screen positions and accepts camera requests.

use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// Camera altitude in meters used when focusing a new origin.
pub const DEFAULT_CAMERA_HEIGHT: f64 = 5000.0;

/// Straight-down camera pitch.
pub const TOP_DOWN_PITCH: f64 = -std::f64::consts::FRAC_PI_2;

/// A position on screen in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        ScreenPoint { x, y }
    }
}

pub trait Viewport {
    /// Ground position under a screen point, `None` when the ray hits nothing.
    fn pick_ground(&self, at: ScreenPoint) -> Option<GeoPoint>;

    /// Height of whatever surface (terrain or building) is under the point.
    fn pick_surface_height(&self, at: ScreenPoint) -> Option<f64>;
}

impl<V: Viewport + ?Sized> Viewport for &V {
    fn pick_ground(&self, at: ScreenPoint) -> Option<GeoPoint> {
        (**self).pick_ground(at)
    }

    fn pick_surface_height(&self, at: ScreenPoint) -> Option<f64> {
        (**self).pick_surface_height(at)
    }
}

/// Terrain height lookup, latitude and longitude in degrees.
pub trait TerrainSampler {
    fn sample_terrain_height(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> impl Future<Output = Option<f64>> + Send;
}

pub trait CameraControl {
    /// Re-center on a position in degrees. `None` keeps the current
    /// altitude or pitch.
    fn recenter(&self, longitude: f64, latitude: f64, altitude: Option<f64>, pitch: Option<f64>);

    fn set_rotation_enabled(&self, enabled: bool);
}

/// Camera used when no rendering surface is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCamera;

impl CameraControl for NoopCamera {
    fn recenter(&self, _: f64, _: f64, _: Option<f64>, _: Option<f64>) {}

    fn set_rotation_enabled(&self, _: bool) {}
}

impl<C: CameraControl + ?Sized> CameraControl for Rc<C> {
    fn recenter(&self, longitude: f64, latitude: f64, altitude: Option<f64>, pitch: Option<f64>) {
        (**self).recenter(longitude, latitude, altitude, pitch)
    }

    fn set_rotation_enabled(&self, enabled: bool) {
        (**self).set_rotation_enabled(enabled)
    }
}

impl<C: CameraControl + ?Sized> CameraControl for Arc<C> {
    fn recenter(&self, longitude: f64, latitude: f64, altitude: Option<f64>, pitch: Option<f64>) {
        (**self).recenter(longitude, latitude, altitude, pitch)
    }

    fn set_rotation_enabled(&self, enabled: bool) {
        (**self).set_rotation_enabled(enabled)
    }
}
