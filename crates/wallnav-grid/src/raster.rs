use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use wallnav_core::{Axis, NavError, PointSet, Result};

use crate::{check_cell_size, CellState, OccupancyGrid};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterParams {
    pub cell_size: f32,
    /// free cells added on every side of the points' bounding box
    pub margin_cells: usize,
    /// obstacle inflation radius in world units, 0 disables
    pub inflate_radius: f32,
}

impl Default for RasterParams {
    fn default() -> Self {
        Self { cell_size: 0.05, margin_cells: 5, inflate_radius: 0.0 }
    }
}

impl RasterParams {
    pub fn validate(&self) -> Result<()> {
        check_cell_size(self.cell_size)?;
        if !(self.inflate_radius >= 0.0) || !self.inflate_radius.is_finite() {
            return Err(NavError::InvalidConfig(format!(
                "inflate_radius must be >= 0, got {}", self.inflate_radius
            )));
        }
        Ok(())
    }
}

/// Drop the up coordinate of the selected points.
pub fn project(cloud: &PointSet, indices: &[usize], up: Axis) -> Vec<[f32; 2]> {
    indices.iter().map(|&i| up.project(cloud.point(i))).collect()
}

/// Occupancy grid over `points`: a cell is occupied iff some point falls in it.
///
/// Per axis the grid spans `floor(extent / cell_size) + 1 + 2·margin` cells,
/// starting at `bbox.min - margin·cell_size`, so the point at the bbox
/// maximum still lands inside.
pub fn rasterize(points: &[[f32; 2]], cell_size: f32, margin: usize) -> Result<OccupancyGrid> {
    check_cell_size(cell_size)?;
    if points.is_empty() { return Err(NavError::EmptyInput); }
    if !points.iter().flatten().all(|v| v.is_finite()) {
        return Err(NavError::InvalidConfig("non-finite point coordinate".into()));
    }

    let mut min = [f32::INFINITY; 2];
    let mut max = [f32::NEG_INFINITY; 2];
    for p in points {
        for a in 0..2 {
            min[a] = min[a].min(p[a]);
            max[a] = max[a].max(p[a]);
        }
    }

    let cs = cell_size as f64;
    let span = |a: usize| ((max[a] as f64 - min[a] as f64) / cs).floor() as usize + 1 + 2 * margin;
    let (width, height) = (span(0), span(1));
    let origin = [
        (min[0] as f64 - margin as f64 * cs) as f32,
        (min[1] as f64 - margin as f64 * cs) as f32,
    ];
    let mut grid = OccupancyGrid::new(width, height, cell_size, origin)?;

    // index by floor division; clamping absorbs rounding at the borders
    let cells: Vec<(usize, usize)> = points
        .par_iter()
        .map(|p| {
            let c = ((p[0] as f64 - origin[0] as f64) / cs).floor().max(0.0) as usize;
            let r = ((p[1] as f64 - origin[1] as f64) / cs).floor().max(0.0) as usize;
            (c.min(width - 1), r.min(height - 1))
        })
        .collect();
    for cell in cells {
        grid.set(cell, CellState::Occupied);
    }

    debug!(
        "rasterize: {} points -> {}x{} grid @ {} ({} occupied)",
        points.len(), width, height, cell_size, grid.occupied_count()
    );
    Ok(grid)
}
