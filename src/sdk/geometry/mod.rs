pub mod densify;
pub mod distance;
pub mod shape;

pub use densify::PathDensifier;
pub use distance::{distance_meters, path_distance};
pub use shape::{resequence, LatLon, Shape, ShapePoint};
