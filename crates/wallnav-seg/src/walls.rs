//! Iterative wall extraction.
//!
//! Each pass fits one plane to the remaining points, classifies it, and
//! removes its inliers whether or not it was kept. Every pass therefore
//! shrinks the working set by at least `sample_size` points, and the loop is
//! additionally capped by `max_outer_iterations`.

use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};
use wallnav_core::{Aabb, Axis, NavError, Plane, PointSet, Result};

use crate::ground::subtract_sorted;
use crate::ransac::{segment_plane, RansacParams};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WallParams {
    pub ransac: RansacParams,
    /// a wall's |n·up| must not exceed this (0 = perfectly vertical)
    pub max_alignment: f32,
    /// minimum extent along up, in world units
    pub min_height: f32,
    pub max_outer_iterations: usize,
    /// stop once fewer points than this remain
    pub min_remaining_points: usize,
    /// same floor as a fraction of the initial working set; the larger wins
    pub min_remaining_fraction: f32,
}

impl Default for WallParams {
    fn default() -> Self {
        Self {
            ransac: RansacParams::default(),
            max_alignment: 0.2,
            min_height: 2.0,
            max_outer_iterations: 100,
            min_remaining_points: 10_000,
            min_remaining_fraction: 0.0,
        }
    }
}

impl WallParams {
    pub fn validate(&self) -> Result<()> {
        self.ransac.validate()?;
        if !(0.0..=1.0).contains(&self.max_alignment) {
            return Err(NavError::InvalidConfig(format!(
                "wall max_alignment must be in [0, 1], got {}", self.max_alignment
            )));
        }
        if !(0.0..=1.0).contains(&self.min_remaining_fraction) {
            return Err(NavError::InvalidConfig(format!(
                "min_remaining_fraction must be in [0, 1], got {}", self.min_remaining_fraction
            )));
        }
        if !self.min_height.is_finite() {
            return Err(NavError::InvalidConfig("min_height must be finite".into()));
        }
        Ok(())
    }

    fn stop_floor(&self, initial: usize) -> usize {
        let frac = (self.min_remaining_fraction as f64 * initial as f64).ceil() as usize;
        self.min_remaining_points.max(frac)
    }
}

/// Extents of a candidate's bounding box: the two horizontal axes in
/// ascending axis order, then up.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WallDims {
    pub length: f32,
    pub width: f32,
    pub height: f32,
}

impl WallDims {
    pub fn from_aabb(bb: &Aabb, up: Axis) -> Self {
        let (a, b) = up.horizontal();
        Self { length: bb.extent_along(a), width: bb.extent_along(b), height: bb.extent_along(up) }
    }
}

#[derive(Clone, Debug)]
pub struct WallCandidate {
    /// ascending indices into the segmented point set
    pub indices: Vec<usize>,
    pub plane: Plane,
    pub aabb: Aabb,
    pub dims: WallDims,
}

impl WallCandidate {
    fn build(cloud: &PointSet, indices: Vec<usize>, plane: Plane, up: Axis) -> Option<Self> {
        let aabb = cloud.aabb_of(&indices)?;
        let dims = WallDims::from_aabb(&aabb, up);
        Some(Self { indices, plane, aabb, dims })
    }

    /// Wall iff nearly vertical and at least `min_height` tall.
    pub fn is_wall(&self, up: Axis, params: &WallParams) -> bool {
        self.plane.alignment(up) <= params.max_alignment && self.dims.height >= params.min_height
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// fewer points left than the configured floor
    TooFewPoints,
    /// RANSAC found no further plane
    NoConsensus,
    /// `max_outer_iterations` passes done
    IterationLimit,
}

#[derive(Clone, Debug)]
pub struct WallExtraction {
    pub walls: Vec<WallCandidate>,
    /// candidates fitted but not classified as walls
    pub rejected: usize,
    /// ascending; points claimed by no candidate
    pub remaining: Vec<usize>,
    pub iterations: usize,
    pub stop: StopReason,
}

pub fn extract_walls<R: Rng + ?Sized>(
    cloud: &PointSet,
    working: &[usize],
    up: Axis,
    params: &WallParams,
    rng: &mut R,
) -> Result<WallExtraction> {
    params.validate()?;
    let mut remaining = working.to_vec();
    remaining.sort_unstable();
    remaining.dedup();
    let floor = params.stop_floor(remaining.len());

    let mut walls = Vec::new();
    let mut rejected = 0;
    let mut iterations = 0;
    let stop = loop {
        if iterations >= params.max_outer_iterations { break StopReason::IterationLimit; }
        if remaining.len() < floor { break StopReason::TooFewPoints; }

        let fit = match segment_plane(cloud, &remaining, &params.ransac, rng) {
            Ok(fit) => fit,
            Err(NavError::NoConsensus { .. }) => break StopReason::NoConsensus,
            Err(NavError::EmptyInput | NavError::InsufficientPoints { .. }) => break StopReason::TooFewPoints,
            Err(e) => return Err(e),
        };
        iterations += 1;

        remaining = subtract_sorted(&remaining, &fit.inliers);
        let Some(candidate) = WallCandidate::build(cloud, fit.inliers, fit.plane, up) else {
            continue;
        };
        let keep = candidate.is_wall(up, params);
        debug!(
            "walls: pass {}: {} inliers, |n·up|={:.3}, {:.2} x {:.2} x {:.2} -> {}",
            iterations,
            candidate.indices.len(),
            candidate.plane.alignment(up),
            candidate.dims.length,
            candidate.dims.width,
            candidate.dims.height,
            if keep { "wall" } else { "rejected" }
        );
        if keep { walls.push(candidate); } else { rejected += 1; }
    };

    info!(
        "walls: {} accepted, {} rejected in {} passes ({:?}), {} points left",
        walls.len(), rejected, iterations, stop, remaining.len()
    );
    Ok(WallExtraction { walls, rejected, remaining, iterations, stop })
}
