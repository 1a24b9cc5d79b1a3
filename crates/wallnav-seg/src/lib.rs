//! wallnav-seg — RANSAC plane segmentation: ground removal and wall extraction.

pub mod ground;
pub mod ransac;
pub mod walls;

pub use ground::{remove_ground, GroundParams, GroundSplit};
pub use ransac::{segment_plane, PlaneFit, RansacParams};
pub use walls::{extract_walls, StopReason, WallCandidate, WallDims, WallExtraction, WallParams};

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Seeded RNG for reproducible runs; OS entropy when `seed` is `None`.
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}
