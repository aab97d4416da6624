use std::collections::BTreeSet;

use rayon::prelude::*;
use thiserror::Error;

use crate::sdk::{
    feed::Feed,
    geometry::{path_distance, PathDensifier, Shape},
    snapping::RoadSnapper,
};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Totals over every shape a run touched. Distances are in meters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PipelineReport {
    pub shapes: usize,
    pub points_before: usize,
    pub points_after: usize,
    pub distance_before: f64,
    pub distance_after: f64,
}

impl PipelineReport {
    fn record(&mut self, before: &Shape, after: &Shape) {
        self.shapes += 1;
        self.points_before += before.coordinate_count();
        self.points_after += after.coordinate_count();
        self.distance_before += path_distance(before);
        self.distance_after += path_distance(after);
    }
}

/// Post-processes route geometry: snap, densify, or both.
#[derive(Default)]
pub struct Pipeline {
    snapper: Option<RoadSnapper>,
    densifier: Option<PathDensifier>,
    densify_first: bool,
    jobs: usize,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapper(mut self, snapper: RoadSnapper) -> Self {
        self.snapper = Some(snapper);
        self
    }

    pub fn with_densifier(mut self, densifier: PathDensifier) -> Self {
        self.densifier = Some(densifier);
        self
    }

    /// Densify before snapping instead of after.
    pub fn densify_first(mut self, yes: bool) -> Self {
        self.densify_first = yes;
        self
    }

    /// Worker threads for `run`; 0 lets rayon decide.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn is_noop(&self) -> bool {
        self.snapper.is_none() && self.densifier.is_none()
    }

    /// Applies the configured stages to one shape. Never fails.
    pub fn process(&self, shape: &Shape) -> Shape {
        let snap = |s: Shape| match &self.snapper {
            Some(snapper) => snapper.snap(&s),
            None => s,
        };
        let densify = |s: Shape| match &self.densifier {
            Some(densifier) => densifier.densify(&s),
            None => s,
        };

        if self.densify_first {
            snap(densify(shape.clone()))
        } else {
            densify(snap(shape.clone()))
        }
    }

    /// Replaces every shape referenced by a route with its processed form.
    pub fn run(&self, feed: &mut Feed) -> Result<PipelineReport, PipelineError> {
        let mut report = PipelineReport::default();
        if self.is_noop() {
            return Ok(report);
        }

        let ids: BTreeSet<&String> = feed
            .routes
            .iter()
            .flat_map(|r| r.shape_ids.iter())
            .filter(|id| feed.shapes.contains_key(*id))
            .collect();
        log::info!("Processing {} shapes", ids.len());

        let pool = rayon::ThreadPoolBuilder::new().num_threads(self.jobs).build()?;
        let processed: Vec<(String, Shape)> = pool.install(|| {
            ids.par_iter()
                .filter_map(|id| feed.shapes.get(*id).map(|shape| ((*id).clone(), shape)))
                .map(|(id, shape)| {
                    let out = self.process(shape);
                    (id, out)
                })
                .collect()
        });

        for (id, shape) in processed {
            if let Some(before) = feed.shapes.get(&id) {
                report.record(before, &shape);
            }
            feed.shapes.insert(id, shape);
        }

        log::info!(
            "Processed {} shapes: {} -> {} points, {:.0} m -> {:.0} m",
            report.shapes,
            report.points_before,
            report.points_after,
            report.distance_before,
            report.distance_after
        );
        Ok(report)
    }
}
