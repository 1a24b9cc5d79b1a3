//! Ground removal: the dominant near-horizontal plane.

use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use wallnav_core::{Axis, NavError, Plane, PointSet, Result};

use crate::ransac::{segment_plane, RansacParams};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundParams {
    /// coarser than the wall threshold: floors are broad and slightly uneven
    pub ransac: RansacParams,
    /// ground needs |n·up| above this
    pub min_alignment: f32,
    /// planes tried before giving up; non-horizontal ones are set aside
    pub max_attempts: usize,
}

impl Default for GroundParams {
    fn default() -> Self {
        Self {
            ransac: RansacParams { distance_threshold: 0.13, ..RansacParams::default() },
            min_alignment: 0.9,
            max_attempts: 3,
        }
    }
}

/// Partition of the candidate indices into ground and everything else.
#[derive(Clone, Debug)]
pub struct GroundSplit {
    /// `None` when no sufficiently horizontal plane was found
    pub plane: Option<Plane>,
    pub ground: Vec<usize>,
    /// ascending; the working set for wall extraction
    pub remaining: Vec<usize>,
    pub attempts: usize,
}

pub fn remove_ground<R: Rng + ?Sized>(
    cloud: &PointSet,
    candidates: &[usize],
    up: Axis,
    params: &GroundParams,
    rng: &mut R,
) -> Result<GroundSplit> {
    if !(0.0..=1.0).contains(&params.min_alignment) {
        return Err(NavError::InvalidConfig(format!(
            "ground min_alignment must be in [0, 1], got {}", params.min_alignment
        )));
    }
    let mut working: Vec<usize> = candidates.to_vec();
    working.sort_unstable();

    for attempt in 1..=params.max_attempts.max(1) {
        let fit = match segment_plane(cloud, &working, &params.ransac, rng) {
            Ok(fit) => fit,
            // the first pass reports why nothing could be fit at all
            Err(e) if attempt == 1 => return Err(e),
            Err(e) => {
                debug!("remove_ground: attempt {attempt} stopped: {e}");
                break;
            }
        };
        let alignment = fit.plane.alignment(up);
        if alignment > params.min_alignment {
            let remaining = subtract_sorted(candidates, &fit.inliers);
            info!(
                "ground: {} points (|n·up|={:.3}), {} remaining",
                fit.inliers.len(), alignment, remaining.len()
            );
            return Ok(GroundSplit { plane: Some(fit.plane), ground: fit.inliers, remaining, attempts: attempt });
        }
        debug!(
            "remove_ground: attempt {attempt}: plane with {} inliers is not horizontal (|n·up|={:.3})",
            fit.inliers.len(), alignment
        );
        working = subtract_sorted(&working, &fit.inliers);
    }

    warn!("no horizontal ground plane found; keeping all {} points", candidates.len());
    let mut remaining = candidates.to_vec();
    remaining.sort_unstable();
    Ok(GroundSplit { plane: None, ground: Vec::new(), remaining, attempts: params.max_attempts.max(1) })
}

/// `a \ b` for index lists; `b` must be ascending. Output is ascending.
pub(crate) fn subtract_sorted(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut out: Vec<usize> = a.iter().copied().filter(|i| b.binary_search(i).is_err()).collect();
    out.sort_unstable();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn floor_and_wall() -> PointSet {
        let mut c = PointSet::default();
        // 30x30 floor at z=0
        for i in 0..30 {
            for j in 0..30 {
                c.push(i as f32 * 0.1, j as f32 * 0.1, 0.0);
            }
        }
        // 10x20 wall at x=3
        for j in 0..10 {
            for k in 1..21 {
                c.push(3.0, j as f32 * 0.3, k as f32 * 0.12);
            }
        }
        c
    }

    #[test]
    fn floor_is_split_off() {
        let cloud = floor_and_wall();
        let all: Vec<usize> = (0..cloud.len()).collect();
        let params = GroundParams {
            ransac: RansacParams { distance_threshold: 0.05, max_iterations: 200, ..Default::default() },
            ..Default::default()
        };
        let split = remove_ground(&cloud, &all, Axis::Z, &params, &mut StdRng::seed_from_u64(4)).unwrap();
        assert!(split.plane.unwrap().alignment(Axis::Z) > 0.99);
        assert_eq!(split.ground.len(), 900);
        assert_eq!(split.remaining, (900..1100).collect::<Vec<_>>());
    }

    #[test]
    fn larger_wall_is_set_aside_for_the_floor() {
        let mut c = PointSet::default();
        // 20x20 floor at z=0, then a 30x40 wall at x=3
        for i in 0..20 {
            for j in 0..20 {
                c.push(i as f32 * 0.1, j as f32 * 0.1, 0.0);
            }
        }
        for j in 0..30 {
            for k in 1..41 {
                c.push(3.0, j as f32 * 0.1, k as f32 * 0.1);
            }
        }
        let all: Vec<usize> = (0..c.len()).collect();
        let params = GroundParams {
            ransac: RansacParams { distance_threshold: 0.05, max_iterations: 200, ..Default::default() },
            ..Default::default()
        };
        let split = remove_ground(&c, &all, Axis::Z, &params, &mut StdRng::seed_from_u64(8)).unwrap();
        assert_eq!(split.attempts, 2);
        assert_eq!(split.ground, (0..400).collect::<Vec<_>>());
        assert_eq!(split.remaining, (400..1600).collect::<Vec<_>>());

        let once = GroundParams { max_attempts: 1, ..params };
        let split = remove_ground(&c, &all, Axis::Z, &once, &mut StdRng::seed_from_u64(8)).unwrap();
        assert!(split.plane.is_none());
        assert_eq!(split.remaining, all);
    }

    #[test]
    fn vertical_only_scene_has_no_ground() {
        let cloud = floor_and_wall();
        let wall: Vec<usize> = (900..1100).collect();
        let params = GroundParams { max_attempts: 2, ..Default::default() };
        let split = remove_ground(&cloud, &wall, Axis::Z, &params, &mut StdRng::seed_from_u64(4)).unwrap();
        assert!(split.plane.is_none());
        assert!(split.ground.is_empty());
        assert_eq!(split.remaining, wall);
    }

    #[test]
    fn up_axis_changes_what_counts_as_ground() {
        let cloud = floor_and_wall();
        let wall: Vec<usize> = (900..1100).collect();
        let params = GroundParams {
            ransac: RansacParams { distance_threshold: 0.05, max_iterations: 100, ..Default::default() },
            ..Default::default()
        };
        let split = remove_ground(&cloud, &wall, Axis::X, &params, &mut StdRng::seed_from_u64(4)).unwrap();
        assert_eq!(split.ground.len(), 200);
        assert!(split.remaining.is_empty());
    }

    #[test]
    fn empty_candidates_fail() {
        let cloud = floor_and_wall();
        let err = remove_ground(&cloud, &[], Axis::Z, &GroundParams::default(), &mut StdRng::seed_from_u64(1))
            .unwrap_err();
        assert_eq!(err, NavError::EmptyInput);
    }
}
