use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fs::File,
    path::{Path, PathBuf},
};

use csv::{ReaderBuilder, Trim};
use serde::{de::DeserializeOwned, Deserialize};

use super::error::FeedError;
use super::models::{Feed, Route, Stop, Trip, DEFAULT_ROUTE_COLOR, DEFAULT_ROUTE_TEXT_COLOR};
use crate::sdk::geometry::{Shape, ShapePoint};

pub const REQUIRED_FILES: [&str; 3] = ["routes.txt", "trips.txt", "stops.txt"];

// --- Raw rows as they appear in the feed files ---

#[derive(Deserialize)]
struct RouteRow {
    route_id: String,
    #[serde(default)]
    agency_id: Option<String>,
    #[serde(default)]
    route_short_name: Option<String>,
    #[serde(default)]
    route_long_name: Option<String>,
    #[serde(default)]
    route_desc: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    route_type: Option<u16>,
    #[serde(default)]
    route_url: Option<String>,
    #[serde(default)]
    route_color: Option<String>,
    #[serde(default)]
    route_text_color: Option<String>,
}

#[derive(Deserialize)]
struct StopRow {
    stop_id: String,
    #[serde(default)]
    stop_code: Option<String>,
    #[serde(default)]
    stop_name: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    stop_lat: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    stop_lon: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    location_type: Option<u8>,
    #[serde(default)]
    parent_station: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    wheelchair_boarding: Option<u8>,
}

#[derive(Deserialize)]
struct ShapeRow {
    shape_id: String,
    shape_pt_lat: f64,
    shape_pt_lon: f64,
    shape_pt_sequence: u32,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    shape_dist_traveled: Option<f64>,
}

#[derive(Deserialize)]
struct TripRow {
    route_id: String,
    service_id: String,
    trip_id: String,
    #[serde(default)]
    trip_headsign: Option<String>,
    #[serde(default)]
    trip_short_name: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    direction_id: Option<u8>,
    #[serde(default)]
    block_id: Option<String>,
    #[serde(default)]
    shape_id: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    wheelchair_accessible: Option<u8>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    bikes_allowed: Option<u8>,
}

#[derive(Deserialize)]
struct StopTimeRow {
    trip_id: String,
    stop_id: String,
}

/// Reads a GTFS directory into a [`Feed`].
#[derive(Debug, Clone)]
pub struct FeedReader {
    dir: PathBuf,
}

impl FeedReader {
    /// Checks the directory and the files every feed must have.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, FeedError> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(FeedError::DirectoryNotFound(dir));
        }

        let missing: Vec<String> = REQUIRED_FILES
            .iter()
            .filter(|name| !dir.join(name).exists())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(FeedError::MissingFiles(missing));
        }

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Parses the feed. An empty or absent filter keeps every route.
    pub fn read(&self, route_filter: Option<&BTreeSet<String>>) -> Result<Feed, FeedError> {
        log::info!("Parsing GTFS feed from {}", self.dir.display());
        let route_filter = route_filter.filter(|f| !f.is_empty());

        let mut feed = Feed {
            routes: self.read_routes(route_filter)?,
            stops: self.read_stops()?,
            shapes: self.read_shapes()?,
            ..Feed::default()
        };
        self.link_trips(&mut feed)?;
        self.link_stops(&mut feed)?;

        log::info!("Parsed {} routes", feed.routes.len());
        Ok(feed)
    }

    fn has_file(&self, name: &str) -> bool {
        self.dir.join(name).exists()
    }

    fn for_each_row<T, F>(&self, name: &str, mut f: F) -> Result<(), FeedError>
    where
        T: DeserializeOwned,
        F: FnMut(T),
    {
        let path = self.dir.join(name);
        log::debug!("Parsing {}", path.display());
        let file = File::open(&path).map_err(|source| FeedError::Io {
            file: name.to_string(),
            source,
        })?;
        let mut rdr = ReaderBuilder::new().trim(Trim::All).flexible(true).from_reader(file);
        for result in rdr.deserialize::<T>() {
            let row = result.map_err(|source| FeedError::Csv {
                file: name.to_string(),
                source,
            })?;
            f(row);
        }
        Ok(())
    }

    fn read_routes(&self, route_filter: Option<&BTreeSet<String>>) -> Result<Vec<Route>, FeedError> {
        let mut routes = Vec::new();
        self.for_each_row("routes.txt", |row: RouteRow| {
            if route_filter.is_some_and(|f| !f.contains(&row.route_id)) {
                return;
            }
            routes.push(Route {
                route_type: row.route_type.unwrap_or(3),
                agency_id: row.agency_id,
                description: row.route_desc,
                url: row.route_url,
                color: row.route_color.unwrap_or_else(|| DEFAULT_ROUTE_COLOR.to_string()),
                text_color: row
                    .route_text_color
                    .unwrap_or_else(|| DEFAULT_ROUTE_TEXT_COLOR.to_string()),
                ..Route::new(
                    row.route_id,
                    row.route_short_name.unwrap_or_default(),
                    row.route_long_name.unwrap_or_default(),
                )
            });
        })?;
        log::debug!("Loaded {} routes", routes.len());
        Ok(routes)
    }

    fn read_stops(&self) -> Result<HashMap<String, Stop>, FeedError> {
        let mut stops = HashMap::new();
        self.for_each_row("stops.txt", |row: StopRow| {
            // stations, entrances and nodes are not boarding points
            let location_type = row.location_type.unwrap_or(0);
            if location_type != 0 {
                return;
            }
            let (Some(lat), Some(lon)) = (row.stop_lat, row.stop_lon) else {
                log::warn!("Stop {} has no coordinates, skipping", row.stop_id);
                return;
            };
            stops.insert(
                row.stop_id.clone(),
                Stop {
                    stop_id: row.stop_id,
                    name: row.stop_name.unwrap_or_default(),
                    lat,
                    lon,
                    code: row.stop_code,
                    location_type,
                    parent_station: row.parent_station,
                    wheelchair_boarding: row.wheelchair_boarding,
                },
            );
        })?;
        log::debug!("Loaded {} stops", stops.len());
        Ok(stops)
    }

    fn read_shapes(&self) -> Result<BTreeMap<String, Shape>, FeedError> {
        let mut shapes: BTreeMap<String, Shape> = BTreeMap::new();
        if !self.has_file("shapes.txt") {
            log::warn!("shapes.txt not found - routes will not have geometry");
            return Ok(shapes);
        }

        self.for_each_row("shapes.txt", |row: ShapeRow| {
            shapes
                .entry(row.shape_id.clone())
                .or_insert_with(|| Shape::new(row.shape_id))
                .add_point(ShapePoint {
                    lat: row.shape_pt_lat,
                    lon: row.shape_pt_lon,
                    sequence: row.shape_pt_sequence,
                    dist_traveled: row.shape_dist_traveled,
                });
        })?;
        for shape in shapes.values_mut() {
            shape.sort_points();
        }
        log::debug!("Loaded {} shapes", shapes.len());
        Ok(shapes)
    }

    fn link_trips(&self, feed: &mut Feed) -> Result<(), FeedError> {
        let index: HashMap<String, usize> = feed
            .routes
            .iter()
            .enumerate()
            .map(|(idx, r)| (r.route_id.clone(), idx))
            .collect();

        let Feed {
            routes,
            trips,
            shapes,
            ..
        } = feed;
        self.for_each_row("trips.txt", |row: TripRow| {
            let Some(&idx) = index.get(&row.route_id) else {
                return;
            };
            let route = &mut routes[idx];
            route.add_trip(&row.trip_id);
            if let Some(shape_id) = row.shape_id.as_deref().filter(|id| shapes.contains_key(*id)) {
                route.add_shape(shape_id);
            }

            trips.insert(
                row.trip_id.clone(),
                Trip {
                    trip_id: row.trip_id,
                    route_id: row.route_id,
                    service_id: row.service_id,
                    headsign: row.trip_headsign,
                    short_name: row.trip_short_name,
                    direction_id: row.direction_id,
                    block_id: row.block_id,
                    shape_id: row.shape_id,
                    wheelchair_accessible: row.wheelchair_accessible,
                    bikes_allowed: row.bikes_allowed,
                },
            );
        })?;
        log::debug!("Loaded {} trips", trips.len());
        Ok(())
    }

    fn link_stops(&self, feed: &mut Feed) -> Result<(), FeedError> {
        if !self.has_file("stop_times.txt") {
            log::warn!("stop_times.txt not found - stops will not be linked to routes");
            return Ok(());
        }

        let index: HashMap<String, usize> = feed
            .routes
            .iter()
            .enumerate()
            .map(|(idx, r)| (r.route_id.clone(), idx))
            .collect();

        let Feed {
            routes,
            trips,
            stops,
            ..
        } = feed;
        self.for_each_row("stop_times.txt", |row: StopTimeRow| {
            let Some(&idx) = trips.get(&row.trip_id).and_then(|t| index.get(&t.route_id)) else {
                return;
            };
            if stops.contains_key(&row.stop_id) {
                routes[idx].add_stop(&row.stop_id);
            }
        })?;
        log::debug!("Linked stops to routes");
        Ok(())
    }
}
