use super::lon_lat_path;
use super::types::MatchResponse;
use crate::sdk::geometry::LatLon;
use crate::sdk::snapping::error::SnapError;
use crate::sdk::snapping::service::{MatchRequest, MatchService, MatchedChunk};

pub struct OsrmMatcher;

impl MatchService for OsrmMatcher {
    fn build_request(&self, base_url: &str, coords: &[LatLon], _api_key: Option<&str>) -> MatchRequest {
        MatchRequest {
            url: format!(
                "{}/match/v1/driving/{}",
                base_url.trim_end_matches('/'),
                lon_lat_path(coords)
            ),
            query: vec![
                ("overview", "full".to_string()),
                ("geometries", "geojson".to_string()),
                ("annotations", "false".to_string()),
            ],
        }
    }

    fn parse_response(&self, body: &str) -> Result<MatchedChunk, SnapError> {
        let response: MatchResponse = serde_json::from_str(body)?;

        if response.code.as_deref() != Some("Ok") {
            return Err(SnapError::NoMatch(format!(
                "OSRM code {:?}: {}",
                response.code,
                response.message.unwrap_or_default()
            )));
        }

        let matching = response
            .matchings
            .first()
            .ok_or_else(|| SnapError::NoMatch("OSRM returned no matchings".to_string()))?;

        Ok(MatchedChunk {
            coords: matching.geometry.to_lat_lon(),
            // a missing score counts as no confidence at all
            confidence: Some(matching.confidence.unwrap_or(0.0)),
        })
    }
}
