//! Serializable summaries of pipeline results.

use serde::Serialize;
use wallnav_core::Axis;
use wallnav_grid::Cell;
use wallnav_seg::StopReason;

use crate::{Route, Segmentation};

#[derive(Clone, Debug, Serialize)]
pub struct WallSummary {
    pub inliers: usize,
    pub normal: [f32; 3],
    pub d: f32,
    pub length: f32,
    pub width: f32,
    pub height: f32,
    pub min: [f32; 3],
    pub max: [f32; 3],
}

#[derive(Clone, Debug, Serialize)]
pub struct WallReport {
    pub up_axis: Axis,
    pub ground_points: usize,
    pub ground_normal: Option<[f32; 3]>,
    pub walls: Vec<WallSummary>,
    pub rejected: usize,
    pub iterations: usize,
    pub stop: StopReason,
    pub unassigned_points: usize,
}

impl WallReport {
    pub fn new(seg: &Segmentation, up_axis: Axis) -> Self {
        let walls = seg
            .walls
            .walls
            .iter()
            .map(|w| WallSummary {
                inliers: w.indices.len(),
                normal: w.plane.normal,
                d: w.plane.d,
                length: w.dims.length,
                width: w.dims.width,
                height: w.dims.height,
                min: w.aabb.min,
                max: w.aabb.max,
            })
            .collect();
        Self {
            up_axis,
            ground_points: seg.ground.ground.len(),
            ground_normal: seg.ground.plane.map(|p| p.normal),
            walls,
            rejected: seg.walls.rejected,
            iterations: seg.walls.iterations,
            stop: seg.walls.stop,
            unassigned_points: seg.walls.remaining.len(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RouteReport {
    pub start: [f32; 2],
    pub goal: [f32; 2],
    pub cells: Vec<Cell>,
    pub waypoints: Vec<[f32; 2]>,
    /// world units
    pub length: f64,
}

impl RouteReport {
    pub fn new(route: &Route, start: [f32; 2], goal: [f32; 2]) -> Self {
        Self {
            start,
            goal,
            cells: route.path.cells.clone(),
            waypoints: route.waypoints.clone(),
            length: route.length,
        }
    }
}
