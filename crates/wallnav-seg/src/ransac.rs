//! RANSAC plane fit over an index subset of a point set.
//!
//! Hypotheses are drawn sequentially from the caller's RNG and scored in
//! parallel; the winner is the largest inlier count, lowest iteration index
//! on ties, so the result does not depend on thread scheduling.

use log::debug;
use nalgebra::{Matrix3, Vector3};
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use wallnav_core::{NavError, Plane, PointSet, Result, COLLINEAR_EPS};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacParams {
    /// max |n·p + d| for a point to count as an inlier
    pub distance_threshold: f32,
    /// points per hypothesis (3 = exact plane, more = least-squares fit)
    pub sample_size: usize,
    pub max_iterations: usize,
    /// smallest inlier count accepted as a plane; never below `sample_size`
    pub min_inliers: usize,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self { distance_threshold: 0.02, sample_size: 3, max_iterations: 1000, min_inliers: 3 }
    }
}

impl RansacParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.distance_threshold > 0.0) || !self.distance_threshold.is_finite() {
            return Err(NavError::InvalidConfig(format!(
                "distance_threshold must be positive, got {}", self.distance_threshold
            )));
        }
        if self.sample_size < 3 {
            return Err(NavError::InvalidConfig(format!(
                "sample_size must be at least 3, got {}", self.sample_size
            )));
        }
        if self.max_iterations == 0 {
            return Err(NavError::InvalidConfig("max_iterations must be at least 1".into()));
        }
        Ok(())
    }

    fn inlier_floor(&self) -> usize { self.min_inliers.max(self.sample_size) }
}

/// Best plane found and the indices (into the point set) that support it.
#[derive(Clone, Debug)]
pub struct PlaneFit {
    pub plane: Plane,
    /// ascending, a subset of the candidate indices
    pub inliers: Vec<usize>,
    /// iteration that produced the winning hypothesis
    pub iteration: usize,
    pub degenerate_samples: usize,
}

/// Fit one plane to the points at `candidates`.
pub fn segment_plane<R: Rng + ?Sized>(
    cloud: &PointSet,
    candidates: &[usize],
    params: &RansacParams,
    rng: &mut R,
) -> Result<PlaneFit> {
    params.validate()?;
    let n = candidates.len();
    if n == 0 { return Err(NavError::EmptyInput); }
    let s = params.sample_size;
    if n < s { return Err(NavError::InsufficientPoints { needed: s, got: n }); }

    let mut samples = Vec::with_capacity(params.max_iterations * s);
    for _ in 0..params.max_iterations {
        let picked = rand::seq::index::sample(rng, n, s);
        samples.extend(picked.iter().map(|j| candidates[j]));
    }

    let thr = params.distance_threshold;
    let scored: Vec<Option<(Plane, usize)>> = samples
        .par_chunks(s)
        .map(|sample| {
            let plane = fit_sample(cloud, sample)?;
            let count = candidates
                .iter()
                .filter(|&&j| plane.distance(cloud.point(j)) <= thr)
                .count();
            Some((plane, count))
        })
        .collect();

    let degenerate_samples = scored.iter().filter(|s| s.is_none()).count();
    let mut best: Option<(usize, Plane, usize)> = None;
    for (it, hyp) in scored.into_iter().enumerate() {
        let Some((plane, count)) = hyp else { continue };
        // strict `>`: the earliest hypothesis wins exact ties
        if best.as_ref().map_or(true, |b| count > b.2) {
            best = Some((it, plane, count));
        }
    }

    let floor = params.inlier_floor();
    let best_inliers = best.as_ref().map_or(0, |b| b.2);
    let (iteration, plane) = match best {
        Some((it, plane, count)) if count >= floor => (it, plane),
        _ => {
            debug!(
                "segment_plane: no consensus over {} points ({} degenerate samples, best {})",
                n, degenerate_samples, best_inliers
            );
            return Err(NavError::NoConsensus {
                iterations: params.max_iterations,
                best_inliers,
                min_inliers: floor,
            });
        }
    };

    let mut inliers: Vec<usize> = candidates
        .par_iter()
        .copied()
        .filter(|&j| plane.distance(cloud.point(j)) <= thr)
        .collect();
    inliers.sort_unstable();

    debug!(
        "segment_plane: {}/{} inliers, normal=({:.3},{:.3},{:.3}) d={:.3}, iteration {}, {} degenerate",
        inliers.len(), n, plane.normal[0], plane.normal[1], plane.normal[2], plane.d,
        iteration, degenerate_samples
    );
    Ok(PlaneFit { plane, inliers, iteration, degenerate_samples })
}

/// Plane through a minimal sample, least squares for larger ones.
/// `None` marks a degenerate (collinear or coincident) sample.
fn fit_sample(cloud: &PointSet, sample: &[usize]) -> Option<Plane> {
    if let [a, b, c] = *sample {
        return Plane::from_points(cloud.point(a), cloud.point(b), cloud.point(c));
    }
    fit_least_squares(cloud, sample)
}

/// PCA fit: the normal is the eigenvector of the smallest covariance eigenvalue.
fn fit_least_squares(cloud: &PointSet, sample: &[usize]) -> Option<Plane> {
    let mut mean = Vector3::<f32>::zeros();
    for &i in sample {
        mean += Vector3::from(cloud.point(i));
    }
    mean /= sample.len() as f32;

    let mut cov = Matrix3::<f32>::zeros();
    for &i in sample {
        let v = Vector3::from(cloud.point(i)) - mean;
        cov += v * v.transpose();
    }

    let eig = cov.symmetric_eigen();
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eig.eigenvalues[a].total_cmp(&eig.eigenvalues[b]));
    let (mid, max) = (eig.eigenvalues[order[1]], eig.eigenvalues[order[2]]);
    // all points on a line (or one spot): the two largest spreads are not both present
    if !(max > f32::MIN_POSITIVE) || mid / max < COLLINEAR_EPS * COLLINEAR_EPS {
        return None;
    }
    let n = eig.eigenvectors.column(order[0]).normalize();
    Some(Plane { normal: [n.x, n.y, n.z], d: -n.dot(&mean) })
}
