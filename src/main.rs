use std::{collections::BTreeSet, path::PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use gtfs2kml::sdk::{
    config::{SnapConfig, API_KEY_ENV},
    feed::{FeedReader, Route},
    geometry::PathDensifier,
    kml::{KmlWriter, SplitMode},
    pipeline::Pipeline,
    snapping::{ProviderKind, RoadSnapper},
    util::log::init_logging,
};

/// Convert a GTFS feed into KML files for Google Earth and friends
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory holding the unpacked GTFS feed
    gtfs_dir: PathBuf,

    /// Where to write the KML files
    output_dir: PathBuf,

    /// Only convert this route_id (repeatable)
    #[arg(long = "route", value_name = "ROUTE_ID")]
    routes: Vec<String>,

    /// Leave stop markers out of the output
    #[arg(long)]
    no_stops: bool,

    /// One file per route, or everything in all_routes.kml
    #[arg(long, value_enum, default_value_t = SplitMode::Route)]
    split_by: SplitMode,

    /// Line width in pixels
    #[arg(long, default_value_t = 4)]
    line_width: u32,

    /// Debug logging and a list of the generated files
    #[arg(short, long)]
    verbose: bool,

    /// Snap route paths to roads through a map-matching service
    #[arg(long)]
    snap_to_roads: bool,

    /// Map-matching provider
    #[arg(long, value_enum, default_value_t = ProviderKind::Osrm)]
    snap_provider: ProviderKind,

    /// API key for Mapbox or Google
    #[arg(long, env = API_KEY_ENV, hide_env_values = true)]
    snap_api_key: Option<String>,

    /// Use this endpoint instead of the provider's default
    #[arg(long, env = "GTFS2KML_SNAP_BASE_URL")]
    snap_base_url: Option<String>,

    /// Cache snapped shapes here between runs
    #[arg(long, value_name = "DIR")]
    snap_cache_dir: Option<PathBuf>,

    /// Insert points so consecutive points are at most this many meters apart
    #[arg(long, value_name = "METERS")]
    densify_points: Option<f64>,

    /// Densify before snapping instead of after
    #[arg(long)]
    densify_first: bool,

    /// Shapes processed in parallel (0 = one per CPU)
    #[arg(long, default_value_t = 0)]
    jobs: usize,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let route_filter: BTreeSet<String> = cli.routes.iter().cloned().collect();
    if !route_filter.is_empty() {
        log::info!(
            "Filtering for routes: {}",
            route_filter.iter().cloned().collect::<Vec<_>>().join(", ")
        );
    }

    // --- 1. Read the feed ---
    let reader = FeedReader::open(&cli.gtfs_dir)
        .with_context(|| format!("Cannot read GTFS feed in {}", cli.gtfs_dir.display()))?;
    let mut feed = reader.read(Some(&route_filter))?;
    if feed.routes.is_empty() {
        bail!("No routes found matching criteria");
    }
    log::info!("Successfully parsed {} routes", feed.routes.len());

    if feed.routes_with_shapes().next().is_none() {
        log::warn!(
            "No routes have shape data! KML files will only contain stops. \
             Check if shapes.txt exists in GTFS feed."
        );
    }

    // --- 2. Post-process geometry ---
    let mut pipeline = Pipeline::new()
        .densify_first(cli.densify_first)
        .with_jobs(cli.jobs);
    if cli.snap_to_roads {
        log::info!("Applying road snapping with provider: {}", cli.snap_provider);
        let config = SnapConfig {
            api_key: cli.snap_api_key.clone(),
            cache_dir: cli.snap_cache_dir.clone(),
            base_url: cli.snap_base_url.clone(),
            ..SnapConfig::new(cli.snap_provider)
        }
        .with_env_fallback();
        let snapper = RoadSnapper::new(config).context("Cannot set up road snapping")?;
        pipeline = pipeline.with_snapper(snapper);
    }
    if let Some(interval) = cli.densify_points {
        log::info!("Densifying paths at {}m intervals", interval);
        pipeline = pipeline.with_densifier(PathDensifier::new(interval)?);
    }
    pipeline.run(&mut feed)?;

    // --- 3. Write KML ---
    log::info!("Generating KML files in {}", cli.output_dir.display());
    let writer = KmlWriter {
        line_width: cli.line_width,
        include_stops: !cli.no_stops,
        ..KmlWriter::default()
    };
    let routes: Vec<&Route> = feed.routes.iter().collect();
    let written = writer
        .write_batch(&routes, &feed, &cli.output_dir, cli.split_by)
        .with_context(|| format!("Cannot write KML to {}", cli.output_dir.display()))?;

    log::info!("Successfully generated {} KML file(s)", written.len());
    println!(
        "\nSuccess! Generated {} KML file(s) in {}",
        written.len(),
        cli.output_dir.display()
    );
    if cli.verbose {
        println!("\nGenerated files:");
        for path in &written {
            println!("  - {}", path.display());
        }
    }

    Ok(())
}
