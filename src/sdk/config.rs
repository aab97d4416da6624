use std::{env, path::PathBuf};

use thiserror::Error;

use crate::sdk::snapping::provider::ProviderKind;

pub const API_KEY_ENV: &str = "GTFS2KML_SNAP_API_KEY";
pub const MAPBOX_TOKEN_ENV: &str = "MAPBOX_ACCESS_TOKEN";
pub const GOOGLE_KEY_ENV: &str = "GOOGLE_MAPS_API_KEY";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Densify interval must be a positive number of meters, got {0}")]
    InvalidInterval(f64),

    #[error("Unknown snap provider: {0} (expected osrm, mapbox or google)")]
    UnknownProvider(String),
}

/// Everything needed to build a [`RoadSnapper`](crate::sdk::snapping::RoadSnapper).
#[derive(Debug, Clone, Default)]
pub struct SnapConfig {
    pub provider: ProviderKind,
    pub api_key: Option<String>,
    pub cache_dir: Option<PathBuf>,
    /// Replaces the provider's default endpoint, e.g. a public OSRM server.
    pub base_url: Option<String>,
    /// Overrides the provider's chunk size. Must stay within its request ceiling.
    pub chunk_size: Option<usize>,
}

impl SnapConfig {
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            ..Self::default()
        }
    }

    /// Fills in a missing API key from the environment.
    pub fn with_env_fallback(mut self) -> Self {
        if self.api_key.is_none() {
            self.api_key = api_key_from_env(self.provider);
        }
        self
    }
}

/// Looks up an API key for `provider`, trying the generic variable first.
pub fn api_key_from_env(provider: ProviderKind) -> Option<String> {
    let vendor_var = match provider {
        ProviderKind::Osrm => None,
        ProviderKind::Mapbox => Some(MAPBOX_TOKEN_ENV),
        ProviderKind::Google => Some(GOOGLE_KEY_ENV),
    };
    std::iter::once(API_KEY_ENV)
        .chain(vendor_var)
        .find_map(|var| env::var(var).ok().filter(|v| !v.trim().is_empty()))
}
