use super::lon_lat_path;
use super::types::MatchResponse;
use crate::sdk::geometry::LatLon;
use crate::sdk::snapping::error::SnapError;
use crate::sdk::snapping::service::{MatchRequest, MatchService, MatchedChunk};

pub struct MapboxMatcher;

impl MatchService for MapboxMatcher {
    fn build_request(&self, base_url: &str, coords: &[LatLon], api_key: Option<&str>) -> MatchRequest {
        MatchRequest {
            url: format!("{}/{}", base_url.trim_end_matches('/'), lon_lat_path(coords)),
            query: vec![
                ("access_token", api_key.unwrap_or_default().to_string()),
                ("geometries", "geojson".to_string()),
                ("overview", "full".to_string()),
            ],
        }
    }

    fn parse_response(&self, body: &str) -> Result<MatchedChunk, SnapError> {
        let response: MatchResponse = serde_json::from_str(body)?;

        let matching = response.matchings.first().ok_or_else(|| {
            SnapError::NoMatch(format!(
                "Mapbox returned no matchings: {}",
                response.message.unwrap_or_default()
            ))
        })?;

        // Mapbox reports a confidence too, but it is not used for gating
        Ok(MatchedChunk {
            coords: matching.geometry.to_lat_lon(),
            confidence: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_carries_access_token() {
        let req = MapboxMatcher.build_request(
            "https://api.mapbox.com/matching/v5/mapbox/driving",
            &[(45.5, -73.6), (45.6, -73.5)],
            Some("pk.test"),
        );
        assert_eq!(
            req.url,
            "https://api.mapbox.com/matching/v5/mapbox/driving/-73.6,45.5;-73.5,45.6"
        );
        assert!(req.query.contains(&("access_token", "pk.test".to_string())));
    }

    #[test]
    fn test_parse_ignores_confidence() {
        let body = r#"{"code":"Ok","matchings":[{"confidence":0.1,"geometry":{"coordinates":[[-73.6,45.5]]}}]}"#;
        let matched = MapboxMatcher.parse_response(body).unwrap();
        assert_eq!(matched.coords, vec![(45.5, -73.6)]);
        assert_eq!(matched.confidence, None);
    }

    #[test]
    fn test_parse_no_matchings() {
        let body = r#"{"code":"NoMatch","matchings":[]}"#;
        assert!(matches!(MapboxMatcher.parse_response(body), Err(SnapError::NoMatch(_))));
    }
}
