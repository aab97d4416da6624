use std::thread;
use std::time::Duration;

use super::cache::{snapped_id, SnapCache};
use super::chunk::{chunk_windows, stitch};
use super::error::SnapError;
use super::provider::{ProviderKind, ProviderProfile};
use super::service::{HttpTransport, MatchRequest, MatchService, Transport};
use crate::sdk::config::SnapConfig;
use crate::sdk::geometry::{LatLon, Shape};
use crate::sdk::util::rate_limit::{self, Limiter};

/// Pauses before the 2nd and 3rd attempt of a transiently failing call.
const RETRY_BACKOFF: [Duration; 2] = [Duration::from_millis(250), Duration::from_millis(500)];

/// Snaps shapes to the road network through one map-matching provider.
///
/// A failed or low-confidence match never loses points: the affected chunk
/// keeps its raw coordinates.
pub struct RoadSnapper {
    kind: ProviderKind,
    profile: ProviderProfile,
    base_url: String,
    api_key: Option<String>,
    service: &'static dyn MatchService,
    transport: Box<dyn Transport>,
    limiter: Limiter,
    cache: Option<SnapCache>,
}

impl RoadSnapper {
    pub fn new(config: SnapConfig) -> Result<Self, SnapError> {
        let transport = HttpTransport::new()?;
        Self::with_transport(config, Box::new(transport))
    }

    pub fn with_transport(config: SnapConfig, transport: Box<dyn Transport>) -> Result<Self, SnapError> {
        let kind = config.provider;
        let mut profile = *kind.profile();

        let api_key = config.api_key.filter(|key| !key.trim().is_empty());
        if profile.requires_key && api_key.is_none() {
            return Err(SnapError::MissingApiKey(kind));
        }

        if let Some(chunk_size) = config.chunk_size {
            if chunk_size <= profile.overlap || chunk_size > profile.max_points {
                return Err(SnapError::InvalidConfig(format!(
                    "chunk size for {} must be in {}..={}, got {}",
                    kind,
                    profile.overlap + 1,
                    profile.max_points,
                    chunk_size
                )));
            }
            profile.chunk_size = chunk_size;
        }

        log::info!("Initialized RoadSnapper with provider: {}", kind);
        Ok(Self {
            kind,
            profile,
            base_url: config.base_url.unwrap_or_else(|| profile.base_url.to_string()),
            api_key,
            service: kind.service(),
            transport,
            limiter: rate_limit::limiter_for(kind),
            cache: config.cache_dir.map(SnapCache::new),
        })
    }

    pub fn provider(&self) -> ProviderKind {
        self.kind
    }

    pub fn profile(&self) -> &ProviderProfile {
        &self.profile
    }

    /// Returns a new `<id>_snapped` shape. Cache hits skip the network entirely.
    ///
    /// Only shapes with at least one matched chunk are cached; a shape that fell
    /// back to raw coordinates everywhere is retried on the next run.
    pub fn snap(&self, shape: &Shape) -> Shape {
        log::info!(
            "Snapping shape {} with {} points",
            shape.shape_id,
            shape.coordinate_count()
        );
        let Some(cache) = &self.cache else {
            return self.snap_uncached(shape).0;
        };

        cache
            .get_or_compute(&shape.shape_id, || match self.snap_uncached(shape) {
                (snapped, 0) => Err(snapped),
                (snapped, _) => Ok(snapped),
            })
            .unwrap_or_else(|fallback| {
                log::warn!(
                    "No chunk of shape {} matched, not caching the raw fallback",
                    shape.shape_id
                );
                fallback
            })
    }

    // Snapped shape plus the number of chunks the provider matched.
    fn snap_uncached(&self, shape: &Shape) -> (Shape, usize) {
        let (snapped, matched) = self.snap_tracked(&shape.coords());
        log::info!("Snapped shape {} to {} points", shape.shape_id, snapped.len());
        (Shape::from_coords(snapped_id(&shape.shape_id), &snapped), matched)
    }

    /// Snaps raw `(lat, lon)` coordinates, chunking long inputs.
    pub fn snap_coords(&self, coords: &[LatLon]) -> Vec<LatLon> {
        self.snap_tracked(coords).0
    }

    fn snap_tracked(&self, coords: &[LatLon]) -> (Vec<LatLon>, usize) {
        let ProviderProfile {
            chunk_size, overlap, ..
        } = self.profile;

        if coords.is_empty() {
            return (Vec::new(), 0);
        }
        if coords.len() <= chunk_size {
            let (snapped, ok) = self.snap_chunk(coords);
            return (snapped, usize::from(ok));
        }

        log::info!(
            "Route has {} points, splitting into chunks of {}",
            coords.len(),
            chunk_size
        );

        let windows = chunk_windows(coords.len(), chunk_size, overlap);
        let mut combined: Vec<LatLon> = Vec::with_capacity(coords.len());
        let mut matched = 0;
        for (idx, window) in windows.iter().enumerate() {
            log::debug!(
                "Processing chunk: points {} to {} ({} points)",
                window.start,
                window.end,
                window.len()
            );
            let (snapped, ok) = self.snap_chunk(&coords[window.clone()]);
            matched += usize::from(ok);
            if idx == 0 {
                combined.extend(snapped);
            } else {
                stitch(&mut combined, &snapped, overlap);
            }
        }

        log::info!(
            "Combined {} snapped points from {} chunks ({} matched)",
            combined.len(),
            windows.len(),
            matched
        );
        (combined, matched)
    }

    // The matched chunk, or the raw coordinates and `false` on failure.
    fn snap_chunk(&self, coords: &[LatLon]) -> (Vec<LatLon>, bool) {
        match self.match_chunk(coords) {
            Ok(matched) => (matched, true),
            Err(e) => {
                log::warn!(
                    "{} snapping failed for {} points, using original coordinates: {}",
                    self.kind,
                    coords.len(),
                    e
                );
                (coords.to_vec(), false)
            }
        }
    }

    fn match_chunk(&self, coords: &[LatLon]) -> Result<Vec<LatLon>, SnapError> {
        log::debug!("Making {} request with {} points", self.kind, coords.len());
        let request = self
            .service
            .build_request(&self.base_url, coords, self.api_key.as_deref());
        let body = self.send_with_retry(&request)?;
        let matched = self.service.parse_response(&body)?;

        if let (Some(threshold), Some(confidence)) = (self.profile.min_confidence, matched.confidence) {
            log::debug!("{} match confidence: {:.3}", self.kind, confidence);
            if confidence < threshold {
                return Err(SnapError::LowConfidence {
                    confidence,
                    threshold,
                });
            }
        }
        if matched.coords.is_empty() {
            return Err(SnapError::NoMatch("empty geometry".to_string()));
        }
        Ok(matched.coords)
    }

    fn send_with_retry(&self, request: &MatchRequest) -> Result<String, SnapError> {
        let mut attempt = 0;
        loop {
            rate_limit::wait(&self.limiter);
            match self.transport.get(request) {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempt < RETRY_BACKOFF.len() => {
                    log::warn!(
                        "{} request failed ({}), retrying in {:?}",
                        self.kind,
                        e,
                        RETRY_BACKOFF[attempt]
                    );
                    thread::sleep(RETRY_BACKOFF[attempt]);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Responder = Box<dyn Fn(&MatchRequest, usize) -> Result<String, SnapError> + Send + Sync>;

    struct FakeTransport {
        calls: Mutex<Vec<MatchRequest>>,
        respond: Responder,
    }

    impl FakeTransport {
        fn new(respond: impl Fn(&MatchRequest, usize) -> Result<String, SnapError> + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                respond: Box::new(respond),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl Transport for FakeTransport {
        fn get(&self, request: &MatchRequest) -> Result<String, SnapError> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(request.clone());
            (self.respond)(request, calls.len())
        }
    }

    fn osrm_body(confidence: f64, lon_lat: &[(f64, f64)]) -> String {
        let coords: Vec<[f64; 2]> = lon_lat.iter().map(|&(lon, lat)| [lon, lat]).collect();
        serde_json::json!({
            "code": "Ok",
            "matchings": [{ "confidence": confidence, "geometry": { "coordinates": coords } }]
        })
        .to_string()
    }

    fn square(n: usize) -> Shape {
        let coords: Vec<LatLon> = (0..n).map(|i| (45.0 + i as f64 * 0.001, -73.0)).collect();
        Shape::from_coords("shape_1", &coords)
    }

    fn osrm_snapper(transport: Arc<FakeTransport>) -> RoadSnapper {
        RoadSnapper::with_transport(SnapConfig::new(ProviderKind::Osrm), Box::new(transport)).unwrap()
    }

    #[test]
    fn test_key_required_providers_fail_fast() {
        for kind in [ProviderKind::Mapbox, ProviderKind::Google] {
            let transport = FakeTransport::new(|_, _| Ok(String::new()));
            let result = RoadSnapper::with_transport(SnapConfig::new(kind), Box::new(transport));
            assert!(matches!(result, Err(SnapError::MissingApiKey(k)) if k == kind));
        }
    }

    #[test]
    fn test_osrm_needs_no_key() {
        let transport = FakeTransport::new(|_, _| Ok(String::new()));
        assert!(RoadSnapper::with_transport(SnapConfig::new(ProviderKind::Osrm), Box::new(transport)).is_ok());
    }

    #[test]
    fn test_chunk_size_override_is_validated() {
        let make = |chunk_size| {
            let config = SnapConfig {
                chunk_size: Some(chunk_size),
                ..SnapConfig::new(ProviderKind::Osrm)
            };
            RoadSnapper::with_transport(config, Box::new(FakeTransport::new(|_, _| Ok(String::new()))))
        };
        assert!(matches!(make(2), Err(SnapError::InvalidConfig(_))));
        assert!(matches!(make(101), Err(SnapError::InvalidConfig(_))));
        assert_eq!(make(20).unwrap().profile().chunk_size, 20);
    }

    #[test]
    fn test_short_shape_is_one_call() {
        let transport = FakeTransport::new(|_, _| Ok(osrm_body(0.9, &[(-73.5, 45.5), (-73.4, 45.6)])));
        let snapper = osrm_snapper(transport.clone());

        let out = snapper.snap(&square(6));

        assert_eq!(transport.call_count(), 1);
        assert_eq!(out.shape_id, "shape_1_snapped");
        assert_eq!(out.coords(), vec![(45.5, -73.5), (45.6, -73.4)]);
    }

    #[test]
    fn test_high_confidence_returns_matched_geometry() {
        let transport = FakeTransport::new(|_, _| Ok(osrm_body(0.9, &[(1.0, 2.0)])));
        let out = osrm_snapper(transport).snap(&square(3));
        assert_eq!(out.coords(), vec![(2.0, 1.0)]);
    }

    #[test]
    fn test_low_confidence_falls_back_to_original() {
        let transport = FakeTransport::new(|_, _| Ok(osrm_body(0.5, &[(1.0, 2.0)])));
        let shape = square(3);
        let out = osrm_snapper(transport).snap(&shape);
        assert_eq!(out.coords(), shape.coords());
    }

    #[test]
    fn test_permanent_failure_falls_back_without_retry() {
        let transport = FakeTransport::new(|_, _| {
            Err(SnapError::Status {
                status: 400,
                body: "bad request".into(),
            })
        });
        let snapper = osrm_snapper(transport.clone());
        let shape = square(4);

        let out = snapper.snap(&shape);

        assert_eq!(transport.call_count(), 1);
        assert_eq!(out.coords(), shape.coords());
        let sequences: Vec<u32> = out.points.iter().map(|p| p.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_transient_failure_is_retried() {
        let transport = FakeTransport::new(|_, n| {
            if n < 3 {
                Err(SnapError::Status {
                    status: 503,
                    body: String::new(),
                })
            } else {
                Ok(osrm_body(0.99, &[(5.0, 6.0)]))
            }
        });
        let out = osrm_snapper(transport.clone()).snap(&square(2));

        assert_eq!(transport.call_count(), 3);
        assert_eq!(out.coords(), vec![(6.0, 5.0)]);
    }

    #[test]
    fn test_chunked_stitch_drops_half_overlap_per_later_window() {
        // every window matches to 4 distinct points
        let transport = FakeTransport::new(|_, n| {
            let base = n as f64 * 10.0;
            Ok(osrm_body(
                0.95,
                &[(base, 0.0), (base + 1.0, 0.0), (base + 2.0, 0.0), (base + 3.0, 0.0)],
            ))
        });
        let snapper = osrm_snapper(transport.clone());

        // 11 points, chunk 6, overlap 2 -> windows 0..6, 4..10, 8..11
        let out = snapper.snap(&square(11));

        assert_eq!(transport.call_count(), 3);
        assert_eq!(out.coordinate_count(), 3 * 4 - 2 * (2 / 2));
        for w in out.points.windows(2) {
            assert_ne!(w[0].lat_lon(), w[1].lat_lon());
        }
    }

    #[test]
    fn test_failed_chunk_keeps_its_own_points_only() {
        // second window fails, the others match
        let transport = FakeTransport::new(|_, n| {
            if n == 2 {
                Ok(r#"{"code":"NoMatch"}"#.to_string())
            } else {
                Ok(osrm_body(0.9, &[(100.0 + n as f64, 0.0), (101.0 + n as f64, 0.0)]))
            }
        });
        let shape = square(11);
        let out = osrm_snapper(transport).snap(&shape);

        let raw = shape.coords();
        let coords = out.coords();
        // window 4..10 fell back: raw points 5..=9 follow the first window's result
        assert_eq!(&coords[2..7], &raw[5..10]);
        for w in coords.windows(2) {
            assert_ne!(w[0], w[1]);
        }
    }

    #[test]
    fn test_empty_shape_makes_no_calls() {
        let transport = FakeTransport::new(|_, _| Ok(String::new()));
        let out = osrm_snapper(transport.clone()).snap(&Shape::new("empty"));
        assert_eq!(transport.call_count(), 0);
        assert!(out.is_empty());
        assert_eq!(out.shape_id, "empty_snapped");
    }

    #[test]
    fn test_cache_hit_skips_network() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FakeTransport::new(|_, _| Ok(osrm_body(0.9, &[(7.0, 8.0)])));
        let config = SnapConfig {
            cache_dir: Some(dir.path().to_path_buf()),
            ..SnapConfig::new(ProviderKind::Osrm)
        };
        let snapper = RoadSnapper::with_transport(config, Box::new(transport.clone())).unwrap();

        let first = snapper.snap(&square(3));
        let second = snapper.snap(&square(3));

        assert_eq!(transport.call_count(), 1);
        assert_eq!(first, second);
        assert!(dir.path().join("shape_1_snapped.json").exists());
    }

    #[test]
    fn test_raw_fallback_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let config = SnapConfig {
            cache_dir: Some(dir.path().to_path_buf()),
            ..SnapConfig::new(ProviderKind::Osrm)
        };
        let shape = Shape::from_coords("outage", &[(10.0, 10.0), (10.1, 10.1)]);

        let down = FakeTransport::new(|_, _| {
            Err(SnapError::Status {
                status: 400,
                body: "InvalidQuery".into(),
            })
        });
        let out = RoadSnapper::with_transport(config.clone(), Box::new(down))
            .unwrap()
            .snap(&shape);
        assert_eq!(out.coords(), shape.coords());
        assert_eq!(out.shape_id, "outage_snapped");
        assert!(!dir.path().join("outage_snapped.json").exists());

        let up = FakeTransport::new(|_, _| Ok(osrm_body(0.9, &[(10.5, 10.2), (10.6, 10.3)])));
        let out = RoadSnapper::with_transport(config, Box::new(up.clone()))
            .unwrap()
            .snap(&shape);
        assert_eq!(up.call_count(), 1);
        assert_eq!(out.coords(), vec![(10.2, 10.5), (10.3, 10.6)]);
        assert!(dir.path().join("outage_snapped.json").exists());
    }

    #[test]
    fn test_distinct_ids_do_not_share_a_cache_entry() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FakeTransport::new(|_, n| {
            Ok(osrm_body(0.9, &[(n as f64, 50.0), (n as f64 + 1.0, 50.0)]))
        });
        let config = SnapConfig {
            cache_dir: Some(dir.path().to_path_buf()),
            ..SnapConfig::new(ProviderKind::Osrm)
        };
        let snapper = RoadSnapper::with_transport(config, Box::new(transport.clone())).unwrap();

        let a = snapper.snap(&Shape::from_coords("a/b", &[(50.0, 1.0), (50.0, 2.0)]));
        let b = snapper.snap(&Shape::from_coords("a_b", &[(60.0, 5.0), (60.0, 6.0)]));

        assert_eq!(transport.call_count(), 2);
        assert_eq!(a.shape_id, "a/b_snapped");
        assert_eq!(b.shape_id, "a_b_snapped");
        assert_eq!(b.coords(), vec![(50.0, 2.0), (50.0, 3.0)]);
        assert_ne!(a.coords(), b.coords());
    }

    #[test]
    fn test_google_sends_key_and_path() {
        let transport = FakeTransport::new(|_, _| {
            Ok(r#"{"snappedPoints":[{"location":{"latitude":1.0,"longitude":2.0}}]}"#.to_string())
        });
        let config = SnapConfig {
            api_key: Some("k".into()),
            ..SnapConfig::new(ProviderKind::Google)
        };
        let snapper = RoadSnapper::with_transport(config, Box::new(transport.clone())).unwrap();

        let out = snapper.snap(&Shape::from_coords("g", &[(1.5, 103.8), (1.6, 103.9)]));

        assert_eq!(out.coords(), vec![(1.0, 2.0)]);
        let calls = transport.calls.lock().unwrap();
        assert!(calls[0].query.contains(&("key", "k".to_string())));
        assert!(calls[0].query.contains(&("path", "1.5,103.8|1.6,103.9".to_string())));
    }
}
