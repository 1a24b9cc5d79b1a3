//! wallnav-filters — statistical outlier removal, voxel grid, height band.

use hashbrown::HashMap;
use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use wallnav_core::{Axis, NavError, PointSet, Result};
use wallnav_nn::{GridIndex, NeighborIndex3};

/// Statistical Outlier Removal settings (kNN µ±σ).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SorParams {
    /// neighbors per point
    pub k: usize,
    /// points with mean kNN distance above µ + std_ratio·σ are dropped
    pub std_ratio: f32,
}

impl Default for SorParams {
    fn default() -> Self { Self { k: 20, std_ratio: 2.0 } }
}

/// Preprocessing stage: outlier removal, then voxel downsampling.
/// Either step is skipped when set to `None`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessParams {
    pub outliers: Option<SorParams>,
    pub voxel_size: Option<f32>,
}

impl Default for PreprocessParams {
    fn default() -> Self { Self { outliers: Some(SorParams::default()), voxel_size: Some(0.05) } }
}

pub fn preprocess(input: &PointSet, params: &PreprocessParams) -> Result<PointSet> {
    if input.is_empty() { return Err(NavError::EmptyInput); }
    let cleaned = match params.outliers {
        Some(sor) => statistical_outlier(input, sor.k, sor.std_ratio)?,
        None => input.clone(),
    };
    match params.voxel_size {
        Some(v) => voxel_downsample(&cleaned, v),
        None => Ok(cleaned),
    }
}

/// Voxel grid downsample (centroid). Grid size in same units as input.
/// Output is ordered by voxel key, so it does not depend on hash order.
pub fn voxel_downsample(input: &PointSet, voxel: f32) -> Result<PointSet> {
    if !(voxel > 0.0) || !voxel.is_finite() {
        return Err(NavError::InvalidConfig(format!("voxel size must be positive, got {voxel}")));
    }
    if input.is_empty() { return Err(NavError::EmptyInput); }
    let inv = 1.0 / voxel;
    let keys = input.aligned_attr_keys();

    // per voxel: coordinate sums, then one sum per aligned attribute column
    let mut bins: HashMap<[i32; 3], (f64, f64, f64, u32, Vec<f64>)> = HashMap::new();
    for i in 0..input.len() {
        let key = [
            (input.x[i] * inv).floor() as i32,
            (input.y[i] * inv).floor() as i32,
            (input.z[i] * inv).floor() as i32,
        ];
        let e = bins.entry(key).or_insert_with(|| (0.0, 0.0, 0.0, 0, vec![0.0; keys.len()]));
        e.0 += input.x[i] as f64;
        e.1 += input.y[i] as f64;
        e.2 += input.z[i] as f64;
        e.3 += 1;
        for (slot, k) in e.4.iter_mut().zip(&keys) {
            *slot += input.attrs_f32[k][i] as f64;
        }
    }

    let mut bins: Vec<_> = bins.into_iter().collect();
    bins.sort_unstable_by_key(|(k, _)| *k);

    let mut out = PointSet::default();
    for k in &keys { out.attrs_f32.insert(k.clone(), Vec::with_capacity(bins.len())); }
    out.reserve(bins.len());
    for (_k, (sx, sy, sz, cnt, attrs)) in bins {
        let invc = 1.0 / (cnt as f64);
        out.push((sx * invc) as f32, (sy * invc) as f32, (sz * invc) as f32);
        for (k, s) in keys.iter().zip(attrs) {
            if let Some(col) = out.attrs_f32.get_mut(k) { col.push((s * invc) as f32); }
        }
    }
    debug!("voxel_downsample: {} -> {} (voxel={})", input.len(), out.len(), voxel);
    Ok(out)
}

/// Statistical Outlier Removal (kNN µ±σ).
///
/// Never empties the set: if every point would be dropped (non-finite
/// statistics), the input is returned unchanged.
pub fn statistical_outlier(input: &PointSet, k: usize, std_ratio: f32) -> Result<PointSet> {
    if input.is_empty() { return Err(NavError::EmptyInput); }
    if k == 0 || input.len() < 2 { return Ok(input.clone()); }

    let index = GridIndex::build(input.into(), estimate_radius(input));
    let means: Vec<f64> = (0..input.len())
        .into_par_iter()
        .map(|i| {
            let neigh = index.knn(i, k);
            let sum: f64 = neigh.iter().map(|n| (n.dist2 as f64).sqrt()).sum();
            sum / neigh.len().max(1) as f64
        })
        .collect();

    let n = means.len() as f64;
    let m = means.iter().sum::<f64>() / n;
    let var = means.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / n;
    let thresh = m + std_ratio as f64 * var.sqrt();

    let keep: Vec<usize> = (0..input.len()).filter(|&i| means[i] <= thresh).collect();
    if keep.is_empty() {
        warn!("statistical_outlier: threshold {thresh} rejects every point; keeping input");
        return Ok(input.clone());
    }
    debug!(
        "statistical_outlier: {} -> {} (k={}, std_ratio={}, cell={:.4})",
        input.len(), keep.len(), k, std_ratio, index.cell()
    );
    Ok(input.select(&keep))
}

/// Of `indices`, the points whose `up` coordinate lies in `[min, max]`.
pub fn height_band(input: &PointSet, indices: &[usize], up: Axis, min: f32, max: f32) -> Vec<usize> {
    indices
        .iter()
        .copied()
        .filter(|&i| {
            let h = input.coord(i, up);
            h >= min && h <= max
        })
        .collect()
}

/// Grid cell for kNN: bounding-box diagonal over the cube root of the count.
fn estimate_radius(c: &PointSet) -> f32 {
    let Some(bb) = c.aabb() else { return 0.1 };
    let [dx, dy, dz] = bb.extent();
    let diag = (dx * dx + dy * dy + dz * dz).sqrt();
    (diag / (c.len() as f32).cbrt()).max(1e-3)
}
