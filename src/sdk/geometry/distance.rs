use geo::{Distance, Geodesic, Point};

use super::shape::{LatLon, Shape};

/// Geodesic distance in meters between two `(lat, lon)` points on the WGS84 ellipsoid.
pub fn distance_meters(a: LatLon, b: LatLon) -> f64 {
    // geo points are (x = lon, y = lat)
    Geodesic.distance(Point::new(a.1, a.0), Point::new(b.1, b.0))
}

/// Total length of a shape in meters. Zero for shapes with fewer than two points.
pub fn path_distance(shape: &Shape) -> f64 {
    shape
        .points
        .windows(2)
        .map(|pair| distance_meters(pair[0].lat_lon(), pair[1].lat_lon()))
        .sum()
}
