use super::distance::distance_meters;
use super::shape::{LatLon, Shape};
use crate::sdk::config::ConfigError;

/// Inserts evenly spaced points so no gap exceeds `interval_meters`.
///
/// Interpolation is planar on the degree values. That is close enough to the
/// geodesic for intervals far below the earth's radius.
#[derive(Debug, Clone, Copy)]
pub struct PathDensifier {
    interval_meters: f64,
}

impl PathDensifier {
    pub fn new(interval_meters: f64) -> Result<Self, ConfigError> {
        if !interval_meters.is_finite() || interval_meters <= 0.0 {
            return Err(ConfigError::InvalidInterval(interval_meters));
        }
        log::info!("Initialized PathDensifier with {}m intervals", interval_meters);
        Ok(Self { interval_meters })
    }

    pub fn interval_meters(&self) -> f64 {
        self.interval_meters
    }

    pub fn densify(&self, shape: &Shape) -> Shape {
        if shape.coordinate_count() < 2 {
            return shape.clone();
        }

        log::debug!(
            "Densifying shape {} ({} points) at {}m intervals",
            shape.shape_id,
            shape.coordinate_count(),
            self.interval_meters
        );

        let mut coords: Vec<LatLon> = Vec::with_capacity(shape.coordinate_count());
        for pair in shape.points.windows(2) {
            let (p1, p2) = (pair[0].lat_lon(), pair[1].lat_lon());
            coords.push(p1);

            let d = distance_meters(p1, p2);
            if d > self.interval_meters {
                let n = (d / self.interval_meters).floor() as usize;
                coords.extend((1..=n).map(|k| interpolate(p1, p2, k as f64 / (n + 1) as f64)));
            }
        }
        if let Some(last) = shape.points.last() {
            coords.push(last.lat_lon());
        }

        let dense = Shape::from_coords(format!("{}_dense", shape.shape_id), &coords);
        log::debug!(
            "Densified shape {} from {} to {} points",
            shape.shape_id,
            shape.coordinate_count(),
            dense.coordinate_count()
        );
        dense
    }
}

fn interpolate(a: LatLon, b: LatLon, fraction: f64) -> LatLon {
    (a.0 + fraction * (b.0 - a.0), a.1 + fraction * (b.1 - a.1))
}
