use std::collections::{BTreeMap, HashMap};

use crate::sdk::geometry::Shape;

pub const DEFAULT_ROUTE_COLOR: &str = "FFFFFF";
pub const DEFAULT_ROUTE_TEXT_COLOR: &str = "000000";

#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub stop_id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub code: Option<String>,
    pub location_type: u8,
    pub parent_station: Option<String>,
    pub wheelchair_boarding: Option<u8>,
}

impl Stop {
    pub fn coordinates(&self) -> (f64, f64) {
        (self.lat, self.lon)
    }

    pub fn kml_coordinates(&self) -> (f64, f64, f64) {
        (self.lon, self.lat, 0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trip {
    pub trip_id: String,
    pub route_id: String,
    pub service_id: String,
    pub headsign: Option<String>,
    pub short_name: Option<String>,
    pub direction_id: Option<u8>,
    pub block_id: Option<String>,
    pub shape_id: Option<String>,
    pub wheelchair_accessible: Option<u8>,
    pub bikes_allowed: Option<u8>,
}

/// A transit route plus the ids of everything linked to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub route_id: String,
    pub short_name: String,
    pub long_name: String,
    pub route_type: u16,
    pub agency_id: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    /// `RRGGBB`
    pub color: String,
    pub text_color: String,

    pub trip_ids: Vec<String>,
    /// Unique, in the order trips first reference them.
    pub shape_ids: Vec<String>,
    /// Unique, in the order stop times first reference them.
    pub stop_ids: Vec<String>,
}

impl Route {
    pub fn new(route_id: impl Into<String>, short_name: impl Into<String>, long_name: impl Into<String>) -> Self {
        Self {
            route_id: route_id.into(),
            short_name: short_name.into(),
            long_name: long_name.into(),
            route_type: 3,
            agency_id: None,
            description: None,
            url: None,
            color: DEFAULT_ROUTE_COLOR.to_string(),
            text_color: DEFAULT_ROUTE_TEXT_COLOR.to_string(),
            trip_ids: Vec::new(),
            shape_ids: Vec::new(),
            stop_ids: Vec::new(),
        }
    }

    pub fn display_name(&self) -> &str {
        if self.short_name.is_empty() {
            &self.long_name
        } else {
            &self.short_name
        }
    }

    /// A filesystem-safe stem: spaces become `_`, anything but alphanumerics,
    /// `_` and `-` is dropped, at most 100 characters.
    pub fn safe_filename(&self) -> String {
        let name: String = self
            .display_name()
            .replace(' ', "_")
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
            .take(100)
            .collect();
        if name.is_empty() {
            format!("route_{}", self.route_id)
        } else {
            name
        }
    }

    /// GTFS `RRGGBB` as KML `aabbggrr`, fully opaque. Invalid colors become white.
    pub fn kml_color(&self) -> String {
        let padded = format!("{:0>6}", self.color.trim().to_ascii_lowercase());
        let color = if padded.len() == 6 && padded.chars().all(|c| c.is_ascii_hexdigit()) {
            padded
        } else {
            DEFAULT_ROUTE_COLOR.to_ascii_lowercase()
        };
        let (r, g, b) = (&color[0..2], &color[2..4], &color[4..6]);
        format!("ff{}{}{}", b, g, r)
    }

    pub fn add_trip(&mut self, trip_id: &str) {
        self.trip_ids.push(trip_id.to_string());
    }

    pub fn add_shape(&mut self, shape_id: &str) {
        if !self.shape_ids.iter().any(|id| id == shape_id) {
            self.shape_ids.push(shape_id.to_string());
        }
    }

    pub fn add_stop(&mut self, stop_id: &str) {
        if !self.stop_ids.iter().any(|id| id == stop_id) {
            self.stop_ids.push(stop_id.to_string());
        }
    }

    pub fn has_shapes(&self) -> bool {
        !self.shape_ids.is_empty()
    }

    pub fn has_stops(&self) -> bool {
        !self.stop_ids.is_empty()
    }
}

/// A parsed feed. Routes keep file order.
#[derive(Debug, Clone, Default)]
pub struct Feed {
    pub routes: Vec<Route>,
    pub stops: HashMap<String, Stop>,
    pub trips: HashMap<String, Trip>,
    pub shapes: BTreeMap<String, Shape>,
}

impl Feed {
    pub fn route(&self, route_id: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.route_id == route_id)
    }

    pub fn shapes_for<'a>(&'a self, route: &'a Route) -> impl Iterator<Item = &'a Shape> + 'a {
        route.shape_ids.iter().filter_map(move |id| self.shapes.get(id))
    }

    pub fn stops_for<'a>(&'a self, route: &'a Route) -> impl Iterator<Item = &'a Stop> + 'a {
        route.stop_ids.iter().filter_map(move |id| self.stops.get(id))
    }

    pub fn routes_with_shapes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter().filter(|r| r.has_shapes())
    }
}
