use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::sdk::geometry::{resequence, LatLon, Shape};

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    shape_id: String,
    points: Vec<CachedPoint>,
}

#[derive(Serialize, Deserialize)]
struct CachedPoint {
    lat: f64,
    lon: f64,
    seq: u32,
}

/// Id given to the snapped version of `original_id`.
pub fn snapped_id(original_id: &str) -> String {
    format!("{}_snapped", original_id)
}

/// On-disk store of snapped shapes, one JSON file per original shape id.
///
/// Entries never expire. Delete the directory to invalidate them.
#[derive(Debug, Clone)]
pub struct SnapCache {
    dir: PathBuf,
}

impl SnapCache {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        let dir = dir.into();
        if let Err(e) = fs::create_dir_all(&dir) {
            log::warn!("Could not create cache directory {}: {}", dir.display(), e);
        }
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Safe bytes are kept, every other byte becomes `%XX`, so distinct ids
    /// never share a file.
    pub fn entry_path(&self, original_id: &str) -> PathBuf {
        let mut name = String::with_capacity(original_id.len());
        for byte in original_id.bytes() {
            if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-') {
                name.push(byte as char);
            } else {
                name.push_str(&format!("%{:02X}", byte));
            }
        }
        self.dir.join(format!("{}_snapped.json", name))
    }

    /// The cached shape for `original_id`. Corrupt entries count as misses.
    pub fn load(&self, original_id: &str) -> Option<Shape> {
        let path = self.entry_path(original_id);
        if !path.exists() {
            return None;
        }

        let entry: CacheEntry = match fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|data| serde_json::from_str(&data).map_err(|e| e.to_string()))
        {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Failed to load cache for {}: {}", original_id, e);
                return None;
            }
        };

        let expected = snapped_id(original_id);
        if entry.shape_id != expected {
            log::warn!(
                "Cache entry {} holds {}, expected {}; ignoring it",
                path.display(),
                entry.shape_id,
                expected
            );
            return None;
        }

        let mut points = entry.points;
        points.sort_by_key(|p| p.seq);
        let coords: Vec<LatLon> = points.iter().map(|p| (p.lat, p.lon)).collect();
        Some(Shape {
            shape_id: entry.shape_id,
            points: resequence(&coords),
        })
    }

    /// Writes `shape` under `original_id`. Failures are logged, never returned.
    pub fn store(&self, original_id: &str, shape: &Shape) {
        let path = self.entry_path(original_id);
        if let Err(e) = self.write_entry(&path, shape) {
            log::warn!("Failed to cache shape {}: {}", original_id, e);
            return;
        }
        log::debug!("Cached snapped shape to {}", path.display());
    }

    fn write_entry(&self, path: &Path, shape: &Shape) -> anyhow::Result<()> {
        let entry = CacheEntry {
            shape_id: shape.shape_id.clone(),
            points: shape
                .points
                .iter()
                .map(|p| CachedPoint {
                    lat: p.lat,
                    lon: p.lon,
                    seq: p.sequence,
                })
                .collect(),
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string(&entry)?)?;
        Ok(())
    }

    /// Cached value for `original_id`, or the producer's result, stored on success.
    pub fn get_or_compute<E, F>(&self, original_id: &str, produce: F) -> Result<Shape, E>
    where
        F: FnOnce() -> Result<Shape, E>,
    {
        if let Some(cached) = self.load(original_id) {
            log::info!("Loaded shape {} from cache", original_id);
            return Ok(cached);
        }
        let shape = produce()?;
        self.store(original_id, &shape);
        Ok(shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(original_id: &str) -> Shape {
        Shape::from_coords(snapped_id(original_id), &[(1.5, 103.8), (1.6, 103.9), (1.7, 104.0)])
    }

    #[test]
    fn test_store_then_load_round_trips_points() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SnapCache::new(dir.path());

        cache.store("route_1", &sample("route_1"));
        let loaded = cache.load("route_1").unwrap();

        assert_eq!(loaded.shape_id, "route_1_snapped");
        assert_eq!(loaded.coords(), sample("route_1").coords());
    }

    #[test]
    fn test_missing_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SnapCache::new(dir.path());
        assert!(cache.load("nope").is_none());
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SnapCache::new(dir.path());
        fs::write(cache.entry_path("bad"), "{not json").unwrap();
        assert!(cache.load("bad").is_none());
    }

    #[test]
    fn test_creates_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let cache = SnapCache::new(&nested);
        cache.store("x", &sample("x"));
        assert!(nested.join("x_snapped.json").exists());
    }

    #[test]
    fn test_store_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "").unwrap();
        // a file where the directory should be
        let cache = SnapCache::new(&blocker);
        cache.store("x", &sample("x"));
        assert!(cache.load("x").is_none());
    }

    #[test]
    fn test_ids_are_encoded_into_file_names() {
        let cache = SnapCache::new(tempfile::tempdir().unwrap().path());
        let path = cache.entry_path("a/b c");
        assert_eq!(path.file_name().unwrap(), "a%2Fb%20c_snapped.json");
        assert_eq!(cache.entry_path("route-1.x_y").file_name().unwrap(), "route-1.x_y_snapped.json");
    }

    #[test]
    fn test_similar_ids_get_distinct_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SnapCache::new(dir.path());
        let ids = ["a/b", "a b", "a_b", "a%2Fb"];

        let paths: std::collections::HashSet<PathBuf> = ids.iter().map(|id| cache.entry_path(id)).collect();
        assert_eq!(paths.len(), ids.len());

        cache.store("a/b", &sample("a/b"));
        assert!(cache.load("a_b").is_none());
        assert!(cache.load("a b").is_none());
        assert_eq!(cache.load("a/b").unwrap().shape_id, "a/b_snapped");
    }

    #[test]
    fn test_entry_for_another_id_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SnapCache::new(dir.path());
        cache.store("other", &sample("other"));
        fs::copy(cache.entry_path("other"), cache.entry_path("mine")).unwrap();

        assert!(cache.load("mine").is_none());
        assert!(cache.load("other").is_some());
    }

    #[test]
    fn test_get_or_compute_skips_producer_on_hit() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SnapCache::new(dir.path());
        cache.store("s", &sample("s"));

        let result: Result<Shape, ()> = cache.get_or_compute("s", || panic!("producer ran on a hit"));
        assert_eq!(result.unwrap().coords(), sample("s").coords());
    }

    #[test]
    fn test_get_or_compute_stores_only_successes() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SnapCache::new(dir.path());

        let failed: Result<Shape, &str> = cache.get_or_compute("s", || Err("boom"));
        assert_eq!(failed.unwrap_err(), "boom");
        assert!(cache.load("s").is_none());

        let produced: Result<Shape, &str> = cache.get_or_compute("s", || Ok(sample("s")));
        assert!(produced.is_ok());
        assert_eq!(cache.load("s").unwrap().coords(), sample("s").coords());
    }
}
