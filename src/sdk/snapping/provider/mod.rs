pub mod google;
pub mod mapbox;
pub mod osrm;
pub mod types;

use std::fmt;
use std::str::FromStr;

use crate::sdk::config::ConfigError;

use super::service::MatchService;
pub use google::GoogleMatcher;
pub use mapbox::MapboxMatcher;
pub use osrm::OsrmMatcher;

/// The map-matching services a snapper can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum)]
pub enum ProviderKind {
    /// OSRM match service, no key needed. Defaults to a local server.
    #[default]
    Osrm,
    /// Mapbox Map Matching API.
    Mapbox,
    /// Google Roads API.
    Google,
}

/// Fixed per-provider limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProviderProfile {
    pub base_url: &'static str,
    pub max_points: usize,
    pub chunk_size: usize,
    /// Requests per second.
    pub rate_limit: u32,
    pub overlap: usize,
    pub requires_key: bool,
    /// Matches scoring below this fall back to the raw coordinates.
    pub min_confidence: Option<f64>,
}

const OSRM_PROFILE: ProviderProfile = ProviderProfile {
    base_url: "http://localhost:5000",
    max_points: 100,
    chunk_size: 6,
    rate_limit: 1000,
    overlap: 2,
    requires_key: false,
    min_confidence: Some(0.75),
};

const MAPBOX_PROFILE: ProviderProfile = ProviderProfile {
    base_url: "https://api.mapbox.com/matching/v5/mapbox/driving",
    max_points: 100,
    chunk_size: 10,
    rate_limit: 10,
    overlap: 5,
    requires_key: true,
    min_confidence: None,
};

const GOOGLE_PROFILE: ProviderProfile = ProviderProfile {
    base_url: "https://roads.googleapis.com/v1/snapToRoads",
    max_points: 100,
    chunk_size: 10,
    rate_limit: 10,
    overlap: 5,
    requires_key: true,
    min_confidence: None,
};

static OSRM: OsrmMatcher = OsrmMatcher;
static MAPBOX: MapboxMatcher = MapboxMatcher;
static GOOGLE: GoogleMatcher = GoogleMatcher;

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [ProviderKind::Osrm, ProviderKind::Mapbox, ProviderKind::Google];

    pub fn profile(self) -> &'static ProviderProfile {
        match self {
            ProviderKind::Osrm => &OSRM_PROFILE,
            ProviderKind::Mapbox => &MAPBOX_PROFILE,
            ProviderKind::Google => &GOOGLE_PROFILE,
        }
    }

    pub fn service(self) -> &'static dyn MatchService {
        match self {
            ProviderKind::Osrm => &OSRM,
            ProviderKind::Mapbox => &MAPBOX,
            ProviderKind::Google => &GOOGLE,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ProviderKind::Osrm => "osrm",
            ProviderKind::Mapbox => "mapbox",
            ProviderKind::Google => "google",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ConfigError::UnknownProvider(s.to_string()))
    }
}

/// `lon,lat;lon,lat;...`, the path segment OSRM and Mapbox both take.
pub(crate) fn lon_lat_path(coords: &[(f64, f64)]) -> String {
    coords
        .iter()
        .map(|(lat, lon)| format!("{},{}", lon, lat))
        .collect::<Vec<_>>()
        .join(";")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_names() {
        assert_eq!("OSRM".parse::<ProviderKind>(), Ok(ProviderKind::Osrm));
        assert_eq!(" mapbox ".parse::<ProviderKind>(), Ok(ProviderKind::Mapbox));
        assert_eq!("google".parse::<ProviderKind>(), Ok(ProviderKind::Google));
        assert!("here".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_profiles_leave_room_to_advance() {
        for kind in ProviderKind::ALL {
            let profile = kind.profile();
            assert!(profile.chunk_size > profile.overlap, "{kind}");
            assert!(profile.chunk_size <= profile.max_points, "{kind}");
        }
    }

    #[test]
    fn test_lon_lat_path_swaps_axes() {
        assert_eq!(lon_lat_path(&[(1.5, 103.8), (1.6, 103.9)]), "103.8,1.5;103.9,1.6");
    }
}
