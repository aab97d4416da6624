pub mod config;
pub mod feed;
pub mod geometry;
pub mod kml;
pub mod pipeline;
pub mod snapping;
pub mod util;
