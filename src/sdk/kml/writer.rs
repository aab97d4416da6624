use std::{
    fmt,
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Writer,
};

use super::error::KmlError;
use crate::sdk::feed::{Feed, Route};

const KML_NS: &str = "http://www.opengis.net/kml/2.2";
const STOP_ICON: &str = "http://maps.google.com/mapfiles/kml/pushpin/ylw-pushpin.png";
const STOP_ICON_SCALE: f64 = 0.8;
pub const ALL_ROUTES_FILE: &str = "all_routes.kml";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AltitudeMode {
    #[default]
    ClampToGround,
    RelativeToGround,
    Absolute,
}

impl AltitudeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AltitudeMode::ClampToGround => "clampToGround",
            AltitudeMode::RelativeToGround => "relativeToGround",
            AltitudeMode::Absolute => "absolute",
        }
    }
}

impl fmt::Display for AltitudeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How routes are spread over output files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SplitMode {
    /// One file per route.
    #[default]
    Route,
    /// Every route in a single `all_routes.kml`.
    All,
}

/// Renders routes, their shapes and stops as KML documents.
#[derive(Debug, Clone)]
pub struct KmlWriter {
    pub line_width: u32,
    pub include_stops: bool,
    pub altitude_mode: AltitudeMode,
}

impl Default for KmlWriter {
    fn default() -> Self {
        Self {
            line_width: 4,
            include_stops: true,
            altitude_mode: AltitudeMode::default(),
        }
    }
}

type Xml<W> = Writer<W>;

impl KmlWriter {
    pub fn write_route(&self, route: &Route, feed: &Feed, path: &Path) -> Result<(), KmlError> {
        log::info!("Generating KML for route {}", route.display_name());
        self.save(path, |out| self.render_route(route, feed, out))?;
        log::info!("Saved KML to {}", path.display());
        Ok(())
    }

    pub fn write_all(&self, routes: &[&Route], feed: &Feed, path: &Path) -> Result<(), KmlError> {
        log::info!("Generating combined KML for {} routes", routes.len());
        self.save(path, |out| self.render_all(routes, feed, out))?;
        log::info!("Saved combined KML to {}", path.display());
        Ok(())
    }

    /// Writes `routes` into `out_dir` and returns the files created.
    pub fn write_batch(
        &self,
        routes: &[&Route],
        feed: &Feed,
        out_dir: &Path,
        split: SplitMode,
    ) -> Result<Vec<PathBuf>, KmlError> {
        fs::create_dir_all(out_dir)?;

        match split {
            SplitMode::Route => {
                log::info!("Generating {} KML files (one per route)", routes.len());
                let mut written = Vec::with_capacity(routes.len());
                for route in routes {
                    let path = out_dir.join(format!("{}.kml", route.safe_filename()));
                    self.write_route(route, feed, &path)?;
                    written.push(path);
                }
                Ok(written)
            }
            SplitMode::All => {
                let path = out_dir.join(ALL_ROUTES_FILE);
                self.write_all(routes, feed, &path)?;
                Ok(vec![path])
            }
        }
    }

    pub fn render_route<W: Write>(&self, route: &Route, feed: &Feed, out: W) -> Result<W, KmlError> {
        let mut xml = open_document(out)?;
        text_element(&mut xml, "name", &format!("Route {}", route.display_name()))?;
        if let Some(desc) = route.description.as_deref().filter(|d| !d.is_empty()) {
            text_element(&mut xml, "description", desc)?;
        }

        self.write_paths(&mut xml, route, feed, "Route Paths")?;
        self.write_stops(&mut xml, route, feed, "Stops")?;
        close_document(xml)
    }

    pub fn render_all<W: Write>(&self, routes: &[&Route], feed: &Feed, out: W) -> Result<W, KmlError> {
        let mut xml = open_document(out)?;
        text_element(&mut xml, "name", "All Routes")?;

        for route in routes {
            start(&mut xml, "Folder")?;
            text_element(&mut xml, "name", &format!("Route {}", route.display_name()))?;
            if let Some(desc) = route.description.as_deref().filter(|d| !d.is_empty()) {
                text_element(&mut xml, "description", desc)?;
            }
            self.write_paths(&mut xml, route, feed, "Paths")?;
            self.write_stops(&mut xml, route, feed, "Stops")?;
            end(&mut xml, "Folder")?;
        }
        close_document(xml)
    }

    fn save<F>(&self, path: &Path, render: F) -> Result<(), KmlError>
    where
        F: FnOnce(BufWriter<File>) -> Result<BufWriter<File>, KmlError>,
    {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        render(BufWriter::new(file))?.flush()?;
        Ok(())
    }

    fn write_paths<W: Write>(
        &self,
        xml: &mut Xml<W>,
        route: &Route,
        feed: &Feed,
        folder: &str,
    ) -> Result<(), KmlError> {
        let shapes: Vec<_> = feed.shapes_for(route).collect();
        if shapes.is_empty() {
            return Ok(());
        }

        start(xml, "Folder")?;
        text_element(xml, "name", folder)?;
        let color = route.kml_color();
        let width = self.line_width.to_string();

        for (idx, shape) in shapes.iter().enumerate() {
            if shape.is_empty() {
                log::warn!("Shape {} has no coordinates", shape.shape_id);
                continue;
            }
            let name = if shapes.len() > 1 {
                format!("{} - Variant {}", route.display_name(), idx + 1)
            } else {
                route.display_name().to_string()
            };

            start(xml, "Placemark")?;
            text_element(xml, "name", &name)?;
            start(xml, "Style")?;
            start(xml, "LineStyle")?;
            text_element(xml, "color", &color)?;
            text_element(xml, "width", &width)?;
            end(xml, "LineStyle")?;
            end(xml, "Style")?;
            start(xml, "LineString")?;
            text_element(xml, "altitudeMode", self.altitude_mode.as_str())?;
            text_element(xml, "coordinates", &format_coordinates(&shape.kml_coordinates()))?;
            end(xml, "LineString")?;
            end(xml, "Placemark")?;

            log::debug!(
                "Added shape {} with {} points",
                shape.shape_id,
                shape.coordinate_count()
            );
        }
        end(xml, "Folder")
    }

    fn write_stops<W: Write>(
        &self,
        xml: &mut Xml<W>,
        route: &Route,
        feed: &Feed,
        folder: &str,
    ) -> Result<(), KmlError> {
        if !self.include_stops {
            return Ok(());
        }
        let stops: Vec<_> = feed.stops_for(route).collect();
        if stops.is_empty() {
            return Ok(());
        }

        start(xml, "Folder")?;
        text_element(xml, "name", folder)?;

        // one style per route, referenced by every stop
        let style_id = stop_style_id(route);
        xml.write_event(Event::Start(
            BytesStart::new("Style").with_attributes([("id", style_id.as_str())]),
        ))?;
        start(xml, "IconStyle")?;
        text_element(xml, "color", &route.kml_color())?;
        text_element(xml, "scale", &STOP_ICON_SCALE.to_string())?;
        start(xml, "Icon")?;
        text_element(xml, "href", STOP_ICON)?;
        end(xml, "Icon")?;
        end(xml, "IconStyle")?;
        end(xml, "Style")?;

        let style_url = format!("#{style_id}");
        for stop in &stops {
            let mut description = format!("Stop ID: {}", stop.stop_id);
            if let Some(code) = stop.code.as_deref().filter(|c| !c.is_empty()) {
                description.push_str(&format!("\nStop Code: {code}"));
            }

            start(xml, "Placemark")?;
            text_element(xml, "name", &stop.name)?;
            text_element(xml, "description", &description)?;
            text_element(xml, "styleUrl", &style_url)?;
            start(xml, "Point")?;
            text_element(xml, "coordinates", &format_coordinates(&[stop.kml_coordinates()]))?;
            end(xml, "Point")?;
            end(xml, "Placemark")?;
        }
        log::debug!("Added {} stops", stops.len());
        end(xml, "Folder")
    }
}

fn stop_style_id(route: &Route) -> String {
    let id: String = route
        .route_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("stop-style-{id}")
}

/// `lon,lat,alt` triples separated by spaces.
pub fn format_coordinates(coords: &[(f64, f64, f64)]) -> String {
    coords
        .iter()
        .map(|(lon, lat, alt)| format!("{lon},{lat},{alt}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn open_document<W: Write>(out: W) -> Result<Xml<W>, KmlError> {
    let mut xml = Writer::new_with_indent(out, b' ', 2);
    xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    xml.write_event(Event::Start(
        BytesStart::new("kml").with_attributes([("xmlns", KML_NS)]),
    ))?;
    start(&mut xml, "Document")?;
    Ok(xml)
}

fn close_document<W: Write>(mut xml: Xml<W>) -> Result<W, KmlError> {
    end(&mut xml, "Document")?;
    end(&mut xml, "kml")?;
    Ok(xml.into_inner())
}

fn start<W: Write>(xml: &mut Xml<W>, tag: &str) -> Result<(), KmlError> {
    xml.write_event(Event::Start(BytesStart::new(tag)))?;
    Ok(())
}

fn end<W: Write>(xml: &mut Xml<W>, tag: &str) -> Result<(), KmlError> {
    xml.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn text_element<W: Write>(xml: &mut Xml<W>, tag: &str, text: &str) -> Result<(), KmlError> {
    start(xml, tag)?;
    xml.write_event(Event::Text(BytesText::new(text)))?;
    end(xml, tag)
}
