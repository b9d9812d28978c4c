use serde::{Deserialize, Serialize};

/// Mean Earth radius used for great-circle distances, in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// The origin radius is entered in miles; the map draws it in meters.
pub const MILES_TO_METERS: f64 = 1609.34;

/// A geographic position. Latitude and longitude are stored in radians,
/// height in meters above the ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub height: f64,
}

impl GeoPoint {
    pub fn from_radians(latitude: f64, longitude: f64) -> Self {
        GeoPoint {
            latitude,
            longitude,
            height: 0.0,
        }
    }

    pub fn from_degrees(latitude: f64, longitude: f64) -> Self {
        Self::from_radians(latitude.to_radians(), longitude.to_radians())
    }

    pub fn with_height(self, height: f64) -> Self {
        GeoPoint { height, ..self }
    }

    pub fn latitude_degrees(&self) -> f64 {
        self.latitude.to_degrees()
    }

    pub fn longitude_degrees(&self) -> f64 {
        self.longitude.to_degrees()
    }
}

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoord {
    pub lat: f64,
    pub long: f64,
}

/// An axis-aligned geographic rectangle with bounds in radians.
///
/// Rectangles built through [`make_rectangle`] are normalized so that
/// `west <= east` and `south <= north`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Rectangle {
    /// True when the rectangle has no area (a point or a line).
    pub fn is_degenerate(&self) -> bool {
        self.west == self.east || self.south == self.north
    }

    /// Footprint corners in drawing order: SW, SE, NE, NW.
    pub fn vertices(&self) -> [GeoPoint; 4] {
        [
            GeoPoint::from_radians(self.south, self.west),
            GeoPoint::from_radians(self.south, self.east),
            GeoPoint::from_radians(self.north, self.east),
            GeoPoint::from_radians(self.north, self.west),
        ]
    }
}

/// Build the normalized rectangle spanned by two arbitrary corners.
pub fn make_rectangle(a: GeoPoint, b: GeoPoint) -> Rectangle {
    Rectangle {
        west: a.longitude.min(b.longitude),
        south: a.latitude.min(b.latitude),
        east: a.longitude.max(b.longitude),
        north: a.latitude.max(b.latitude),
    }
}

/// Great-circle distance in meters on a spherical Earth.
pub fn haversine_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let dlat = b.latitude - a.latitude;
    let dlon = b.longitude - a.longitude;
    let h = (dlat / 2.0).sin().powi(2)
        + a.latitude.cos() * b.latitude.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Length of the north-south edge along the western side, in meters.
pub fn rectangle_length(rect: &Rectangle) -> f64 {
    haversine_distance(
        GeoPoint::from_radians(rect.south, rect.west),
        GeoPoint::from_radians(rect.north, rect.west),
    )
}

/// Length of the east-west edge along the southern side, in meters.
pub fn rectangle_width(rect: &Rectangle) -> f64 {
    haversine_distance(
        GeoPoint::from_radians(rect.south, rect.west),
        GeoPoint::from_radians(rect.south, rect.east),
    )
}

/// Midpoint of the radian bounds, converted to degrees.
pub fn rectangle_center(rect: &Rectangle) -> GeoCoord {
    GeoCoord {
        lat: ((rect.north + rect.south) / 2.0).to_degrees(),
        long: ((rect.east + rect.west) / 2.0).to_degrees(),
    }
}
