pub mod error;
pub mod writer;

pub use error::KmlError;
pub use writer::{AltitudeMode, KmlWriter, SplitMode};
