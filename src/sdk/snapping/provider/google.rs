use super::types::SnapToRoadsResponse;
use crate::sdk::geometry::LatLon;
use crate::sdk::snapping::error::SnapError;
use crate::sdk::snapping::service::{MatchRequest, MatchService, MatchedChunk};

pub struct GoogleMatcher;

impl MatchService for GoogleMatcher {
    fn build_request(&self, base_url: &str, coords: &[LatLon], api_key: Option<&str>) -> MatchRequest {
        // Roads API wants lat,lon pairs joined by pipes
        let path = coords
            .iter()
            .map(|(lat, lon)| format!("{},{}", lat, lon))
            .collect::<Vec<_>>()
            .join("|");

        MatchRequest {
            url: base_url.to_string(),
            query: vec![
                ("path", path),
                ("key", api_key.unwrap_or_default().to_string()),
                ("interpolate", "true".to_string()),
            ],
        }
    }

    fn parse_response(&self, body: &str) -> Result<MatchedChunk, SnapError> {
        let response: SnapToRoadsResponse = serde_json::from_str(body)?;

        let points = response
            .snapped_points
            .filter(|points| !points.is_empty())
            .ok_or_else(|| SnapError::NoMatch("Google Roads returned no snapped points".to_string()))?;

        Ok(MatchedChunk {
            coords: points
                .iter()
                .map(|p| (p.location.latitude, p.location.longitude))
                .collect(),
            confidence: None,
        })
    }
}
