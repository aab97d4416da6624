use serde::Deserialize;

// --- Response bodies of the map-matching services ---

/// OSRM `match` service and Mapbox Map Matching share this layout.
#[derive(Deserialize, Debug)]
pub struct MatchResponse {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub matchings: Vec<Matching>,
}

#[derive(Deserialize, Debug)]
pub struct Matching {
    #[serde(default)]
    pub confidence: Option<f64>,
    pub geometry: LineGeometry,
}

/// GeoJSON LineString, `[lon, lat]` pairs.
#[derive(Deserialize, Debug)]
pub struct LineGeometry {
    pub coordinates: Vec<[f64; 2]>,
}

impl LineGeometry {
    pub fn to_lat_lon(&self) -> Vec<(f64, f64)> {
        self.coordinates.iter().map(|[lon, lat]| (*lat, *lon)).collect()
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SnapToRoadsResponse {
    #[serde(default)]
    pub snapped_points: Option<Vec<SnappedPoint>>,
}

#[derive(Deserialize, Debug)]
pub struct SnappedPoint {
    pub location: LatLng,
}

#[derive(Deserialize, Debug)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}
