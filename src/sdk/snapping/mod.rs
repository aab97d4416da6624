pub mod cache;
pub mod chunk;
pub mod error;
pub mod provider;
pub mod service;
pub mod snapper;

pub use cache::SnapCache;
pub use error::SnapError;
pub use provider::{ProviderKind, ProviderProfile};
pub use service::{HttpTransport, MatchRequest, MatchService, MatchedChunk, Transport};
pub use snapper::RoadSnapper;
