//! Pipeline configuration, loaded from YAML.
//!
//! Every section is optional; missing keys take their defaults.
//!
//! ```yaml
//! up_axis: z
//! seed: 42
//! preprocess:
//!   voxel_size: 0.05
//!   outliers: { k: 20, std_ratio: 2.0 }
//! ground:
//!   ransac: { distance_threshold: 0.13, max_iterations: 1000 }
//!   min_alignment: 0.9
//! walls:
//!   ransac: { distance_threshold: 0.02 }
//!   min_height: 2.0
//!   min_remaining_points: 10000
//! map:
//!   source: walls
//!   height_band: [0.94, 3.0]
//! raster:
//!   cell_size: 0.05
//!   margin_cells: 5
//!   inflate_radius: 0.2
//! planner:
//!   max_expansions: 5000000
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use wallnav_core::{Axis, NavError, Result};
use wallnav_filters::PreprocessParams;
use wallnav_grid::RasterParams;
use wallnav_plan::PlannerParams;
use wallnav_seg::{GroundParams, WallParams};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("read {}: {source}", .path.display())]
    Io { path: PathBuf, source: std::io::Error },

    #[error("parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error(transparent)]
    Invalid(#[from] NavError),
}

/// Which points become obstacles in the 2-D map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapSource {
    /// inliers of accepted walls only
    #[default]
    Walls,
    /// every point not on the ground plane
    NonGround,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapParams {
    pub source: MapSource,
    /// keep only obstacle points with `min <= up <= max`
    pub height_band: Option<[f32; 2]>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub up_axis: Axis,
    /// RNG seed for RANSAC; `None` draws from OS entropy
    pub seed: Option<u64>,
    pub preprocess: PreprocessParams,
    pub ground: GroundParams,
    pub walls: WallParams,
    pub map: MapParams,
    pub raster: RasterParams,
    pub planner: PlannerParams,
}

impl PipelineConfig {
    pub fn load(path: &Path) -> std::result::Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_yaml(&text)
    }

    /// Parse and validate.
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> std::result::Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(v) = self.preprocess.voxel_size {
            if !(v > 0.0) || !v.is_finite() {
                return Err(NavError::InvalidConfig(format!("voxel_size must be positive, got {v}")));
            }
        }
        if let Some(sor) = self.preprocess.outliers {
            if !(sor.std_ratio >= 0.0) || !sor.std_ratio.is_finite() {
                return Err(NavError::InvalidConfig(format!(
                    "outlier std_ratio must be >= 0, got {}", sor.std_ratio
                )));
            }
        }
        self.ground.ransac.validate()?;
        if !(0.0..=1.0).contains(&self.ground.min_alignment) {
            return Err(NavError::InvalidConfig(format!(
                "ground min_alignment must be in [0, 1], got {}", self.ground.min_alignment
            )));
        }
        self.walls.validate()?;
        if let Some([lo, hi]) = self.map.height_band {
            if !(lo <= hi) {
                return Err(NavError::InvalidConfig(format!("height_band [{lo}, {hi}] is empty")));
            }
        }
        self.raster.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let c = PipelineConfig::from_yaml("{}").unwrap();
        assert_eq!(c, PipelineConfig::default());
        assert_eq!(c.up_axis, Axis::Z);
        assert_eq!(c.ground.ransac.distance_threshold, 0.13);
        assert_eq!(c.walls.ransac.distance_threshold, 0.02);
        assert_eq!(c.walls.min_remaining_points, 10_000);
        assert_eq!(c.raster.cell_size, 0.05);
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let yaml = "up_axis: y\nseed: 7\nwalls:\n  min_height: 2.59\n  ransac:\n    max_iterations: 50\nmap:\n  source: non_ground\n  height_band: [0.94, 3.0]\n";
        let c = PipelineConfig::from_yaml(yaml).unwrap();
        assert_eq!(c.up_axis, Axis::Y);
        assert_eq!(c.seed, Some(7));
        assert_eq!(c.walls.min_height, 2.59);
        assert_eq!(c.walls.ransac.max_iterations, 50);
        assert_eq!(c.walls.ransac.distance_threshold, 0.02);
        assert_eq!(c.walls.max_outer_iterations, 100);
        assert_eq!(c.map.source, MapSource::NonGround);
        assert_eq!(c.map.height_band, Some([0.94, 3.0]));
    }

    #[test]
    fn yaml_round_trip() {
        let mut c = PipelineConfig::default();
        c.seed = Some(3);
        c.planner.forbid_corner_cutting = true;
        let back = PipelineConfig::from_yaml(&c.to_yaml().unwrap()).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn invalid_values_are_rejected() {
        for yaml in [
            "raster: { cell_size: 0 }",
            "walls: { max_alignment: 2.0 }",
            "ground: { ransac: { sample_size: 2 } }",
            "map: { height_band: [3.0, 1.0] }",
            "preprocess: { voxel_size: -0.1 }",
        ] {
            assert!(matches!(PipelineConfig::from_yaml(yaml), Err(ConfigError::Invalid(_))), "{yaml}");
        }
        assert!(matches!(PipelineConfig::from_yaml("up_axis: w"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file() {
        let err = PipelineConfig::load(Path::new("/nonexistent/wallnav.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
