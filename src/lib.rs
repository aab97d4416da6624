pub mod sdk;

pub use sdk::config::{api_key_from_env, ConfigError, SnapConfig};
pub use sdk::feed::{Feed, FeedError, FeedReader, Route};
pub use sdk::geometry::{distance_meters, path_distance, PathDensifier, Shape};
pub use sdk::kml::{KmlWriter, SplitMode};
pub use sdk::pipeline::{Pipeline, PipelineReport};
pub use sdk::snapping::{ProviderKind, RoadSnapper, SnapCache};
