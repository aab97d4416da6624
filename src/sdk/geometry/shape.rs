use serde::{Deserialize, Serialize};

/// A `(latitude, longitude)` pair in decimal degrees.
pub type LatLon = (f64, f64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapePoint {
    pub lat: f64,
    pub lon: f64,
    pub sequence: u32,
    /// `shape_dist_traveled` from the feed. Transformations drop it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dist_traveled: Option<f64>,
}

impl ShapePoint {
    pub fn new(lat: f64, lon: f64, sequence: u32) -> Self {
        Self {
            lat,
            lon,
            sequence,
            dist_traveled: None,
        }
    }

    pub fn lat_lon(&self) -> LatLon {
        (self.lat, self.lon)
    }
}

/// The geometry of a route variant: an ordered list of points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub shape_id: String,
    pub points: Vec<ShapePoint>,
}

impl Shape {
    pub fn new(shape_id: impl Into<String>) -> Self {
        Self {
            shape_id: shape_id.into(),
            points: Vec::new(),
        }
    }

    /// Builds a shape from raw coordinates, numbering them from 0.
    pub fn from_coords(shape_id: impl Into<String>, coords: &[LatLon]) -> Self {
        Self {
            shape_id: shape_id.into(),
            points: resequence(coords),
        }
    }

    pub fn add_point(&mut self, point: ShapePoint) {
        self.points.push(point);
    }

    /// Orders points by their feed sequence number. Ties keep input order.
    pub fn sort_points(&mut self) {
        self.points.sort_by_key(|p| p.sequence);
    }

    pub fn coords(&self) -> Vec<LatLon> {
        self.points.iter().map(ShapePoint::lat_lon).collect()
    }

    pub fn coordinate_count(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points as `(lon, lat, altitude)`, the axis order KML expects.
    pub fn kml_coordinates(&self) -> Vec<(f64, f64, f64)> {
        self.points.iter().map(|p| (p.lon, p.lat, 0.0)).collect()
    }
}

pub fn resequence(coords: &[LatLon]) -> Vec<ShapePoint> {
    coords
        .iter()
        .enumerate()
        .map(|(idx, &(lat, lon))| ShapePoint::new(lat, lon, idx as u32))
        .collect()
}
