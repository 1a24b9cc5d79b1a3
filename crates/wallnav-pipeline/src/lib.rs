//! wallnav-pipeline — point set in, walls, occupancy grid and routes out.
//!
//! Stages run in a fixed order: preprocess, ground removal, wall extraction,
//! rasterization. Each is exposed on its own so callers can time or inspect
//! them; [`Pipeline::run`] chains all of them.

mod config;
mod report;

pub use config::{ConfigError, MapParams, MapSource, PipelineConfig};
pub use report::{RouteReport, WallReport, WallSummary};

use log::info;
use rand::rngs::StdRng;
use wallnav_core::{NavError, PointSet, Result};
use wallnav_grid::OccupancyGrid;
use wallnav_plan::Path;
use wallnav_seg::{GroundSplit, WallExtraction};

/// Ground and wall partition of a preprocessed point set.
#[derive(Clone, Debug)]
pub struct Segmentation {
    pub ground: GroundSplit,
    pub walls: WallExtraction,
}

impl Segmentation {
    /// Union of all accepted wall inliers, ascending.
    pub fn wall_indices(&self) -> Vec<usize> {
        let mut all: Vec<usize> = self.walls.walls.iter().flat_map(|w| w.indices.iter().copied()).collect();
        all.sort_unstable();
        all.dedup();
        all
    }
}

#[derive(Clone, Debug)]
pub struct PipelineOutput {
    /// the preprocessed points; every index in the output refers to this set
    pub cloud: PointSet,
    pub segmentation: Segmentation,
    pub grid: OccupancyGrid,
}

/// A planned route with its world-space rendering.
#[derive(Clone, Debug)]
pub struct Route {
    pub path: Path,
    pub waypoints: Vec<[f32; 2]>,
    pub length: f64,
}

pub struct Pipeline {
    config: PipelineConfig,
    rng: StdRng,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let rng = wallnav_seg::rng_from_seed(config.seed);
        Ok(Self { config, rng })
    }

    pub fn config(&self) -> &PipelineConfig { &self.config }

    pub fn preprocess(&self, cloud: &PointSet) -> Result<PointSet> {
        let out = wallnav_filters::preprocess(cloud, &self.config.preprocess)?;
        info!("preprocess: {} -> {} points", cloud.len(), out.len());
        Ok(out)
    }

    /// Ground removal followed by wall extraction on what is left.
    pub fn segment(&mut self, cloud: &PointSet) -> Result<Segmentation> {
        let up = self.config.up_axis;
        let all: Vec<usize> = (0..cloud.len()).collect();
        let ground = wallnav_seg::remove_ground(cloud, &all, up, &self.config.ground, &mut self.rng)?;
        let walls = wallnav_seg::extract_walls(cloud, &ground.remaining, up, &self.config.walls, &mut self.rng)?;
        Ok(Segmentation { ground, walls })
    }

    /// Indices that become obstacles, per the map source and height band.
    pub fn obstacle_indices(&self, cloud: &PointSet, seg: &Segmentation) -> Vec<usize> {
        let base = match self.config.map.source {
            MapSource::Walls => seg.wall_indices(),
            MapSource::NonGround => seg.ground.remaining.clone(),
        };
        match self.config.map.height_band {
            Some([lo, hi]) => wallnav_filters::height_band(cloud, &base, self.config.up_axis, lo, hi),
            None => base,
        }
    }

    pub fn rasterize(&self, cloud: &PointSet, seg: &Segmentation) -> Result<OccupancyGrid> {
        let obstacles = self.obstacle_indices(cloud, seg);
        if obstacles.is_empty() {
            return Err(NavError::EmptyInput);
        }
        let rp = &self.config.raster;
        let pts = wallnav_grid::project(cloud, &obstacles, self.config.up_axis);
        let grid = wallnav_grid::rasterize(&pts, rp.cell_size, rp.margin_cells)?;
        let grid = if rp.inflate_radius > 0.0 { grid.inflate(rp.inflate_radius)? } else { grid };
        info!(
            "map: {}x{} cells @ {} ({} occupied from {} points)",
            grid.width(), grid.height(), grid.cell_size(), grid.occupied_count(), obstacles.len()
        );
        Ok(grid)
    }

    pub fn run(&mut self, cloud: &PointSet) -> Result<PipelineOutput> {
        let cloud = self.preprocess(cloud)?;
        let segmentation = self.segment(&cloud)?;
        let grid = self.rasterize(&cloud, &segmentation)?;
        Ok(PipelineOutput { cloud, segmentation, grid })
    }

    /// Route between two world points on `grid`.
    pub fn route(&self, grid: &OccupancyGrid, start: [f32; 2], goal: [f32; 2]) -> Result<Route> {
        let path = wallnav_plan::plan_world(grid, start, goal, &self.config.planner)?;
        let waypoints = path.world_points(grid);
        let length = path.world_length(grid);
        info!("route: {} cells, {:.3} world units", path.len(), length);
        Ok(Route { path, waypoints, length })
    }
}
