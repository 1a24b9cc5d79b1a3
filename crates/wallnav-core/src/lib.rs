//! wallnav-core — core data model and shared math/types.

use std::collections::HashMap;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

mod error;

pub use error::{NavError, NoPathReason, Result};

/// Structure-of-Arrays point set.
/// Keep hot columns (x,y,z) tight; put optional columns in a name→column map.
#[derive(Default, Clone, Debug, Serialize, Deserialize)]
pub struct PointSet {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub z: Vec<f32>,

    /// Optional attributes (same length as x/y/z).
    /// Common keys: "red","green","blue","intensity".
    pub attrs_f32: HashMap<String, Vec<f32>>,
}

pub const COLOR_KEYS: [&str; 3] = ["red", "green", "blue"];

impl PointSet {
    pub fn len(&self) -> usize { self.x.len() }
    pub fn is_empty(&self) -> bool { self.x.is_empty() }
    pub fn push(&mut self, px: f32, py: f32, pz: f32) {
        self.x.push(px); self.y.push(py); self.z.push(pz);
    }
    pub fn reserve(&mut self, n: usize) {
        self.x.reserve(n); self.y.reserve(n); self.z.reserve(n);
        for v in self.attrs_f32.values_mut() { v.reserve(n); }
    }

    pub fn from_points(points: &[[f32; 3]]) -> Self {
        let mut out = Self::default();
        out.reserve(points.len());
        for p in points { out.push(p[0], p[1], p[2]); }
        out
    }

    #[inline]
    pub fn point(&self, i: usize) -> [f32; 3] { [self.x[i], self.y[i], self.z[i]] }

    #[inline]
    pub fn coord(&self, i: usize, axis: Axis) -> f32 {
        match axis { Axis::X => self.x[i], Axis::Y => self.y[i], Axis::Z => self.z[i] }
    }

    /// Attribute keys whose column is aligned with the coordinates.
    pub fn aligned_attr_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.attrs_f32
            .iter()
            .filter_map(|(k, v)| if v.len() == self.len() { Some(k.clone()) } else { None })
            .collect();
        keys.sort();
        keys
    }

    pub fn has_color(&self) -> bool {
        COLOR_KEYS.iter().all(|k| self.attrs_f32.get(*k).is_some_and(|c| c.len() == self.len()))
    }

    /// Copy of the points at `indices`, in that order, with aligned attributes.
    pub fn select(&self, indices: &[usize]) -> PointSet {
        let keys = self.aligned_attr_keys();
        let mut out = PointSet::default();
        out.reserve(indices.len());
        for k in &keys {
            out.attrs_f32.insert(k.clone(), Vec::with_capacity(indices.len()));
        }
        for &i in indices {
            out.push(self.x[i], self.y[i], self.z[i]);
            for k in &keys {
                if let (Some(dst), Some(src)) = (out.attrs_f32.get_mut(k), self.attrs_f32.get(k)) {
                    dst.push(src[i]);
                }
            }
        }
        out
    }

    /// Ascending indices of every point not listed in `indices`.
    pub fn complement(&self, indices: &[usize]) -> Vec<usize> {
        let mut taken = vec![false; self.len()];
        for &i in indices {
            if i < taken.len() { taken[i] = true; }
        }
        (0..self.len()).filter(|&i| !taken[i]).collect()
    }

    pub fn aabb(&self) -> Option<Aabb> {
        Aabb::from_points((0..self.len()).map(|i| self.point(i)))
    }

    pub fn aabb_of(&self, indices: &[usize]) -> Option<Aabb> {
        Aabb::from_points(indices.iter().map(|&i| self.point(i)))
    }
}

/// Zero-copy view into a PointSet (slice-of-SoA).
#[derive(Copy, Clone)]
pub struct PointView<'a> {
    pub x: &'a [f32],
    pub y: &'a [f32],
    pub z: &'a [f32],
}

impl<'a> From<&'a PointSet> for PointView<'a> {
    fn from(c: &'a PointSet) -> Self { Self { x: &c.x, y: &c.y, z: &c.z } }
}

impl PointView<'_> {
    pub fn len(&self) -> usize { self.x.len() }
    pub fn is_empty(&self) -> bool { self.x.is_empty() }
    #[inline]
    pub fn point(&self, i: usize) -> [f32; 3] { [self.x[i], self.y[i], self.z[i]] }
}

/// World axis. One of them is designated "up" for a whole pipeline run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    #[default]
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self { Axis::X => 0, Axis::Y => 1, Axis::Z => 2 }
    }

    /// The two remaining axes, in ascending order. They span the map plane.
    pub fn horizontal(self) -> (Axis, Axis) {
        match self {
            Axis::X => (Axis::Y, Axis::Z),
            Axis::Y => (Axis::X, Axis::Z),
            Axis::Z => (Axis::X, Axis::Y),
        }
    }

    /// Drop this axis from a 3-D point.
    #[inline]
    pub fn project(self, p: [f32; 3]) -> [f32; 2] {
        let (a, b) = self.horizontal();
        [p[a.index()], p[b.index()]]
    }
}

/// Axis-aligned bounding box.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb { pub min: [f32; 3], pub max: [f32; 3] }

impl Aabb {
    pub fn from_points<I: IntoIterator<Item = [f32; 3]>>(points: I) -> Option<Aabb> {
        let mut it = points.into_iter();
        let first = it.next()?;
        let mut bb = Aabb { min: first, max: first };
        for p in it {
            for k in 0..3 {
                bb.min[k] = bb.min[k].min(p[k]);
                bb.max[k] = bb.max[k].max(p[k]);
            }
        }
        Some(bb)
    }

    pub fn contains(&self, p: [f32; 3]) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }

    pub fn extent(&self) -> [f32; 3] {
        [self.max[0] - self.min[0], self.max[1] - self.min[1], self.max[2] - self.min[2]]
    }

    pub fn extent_along(&self, axis: Axis) -> f32 {
        self.extent()[axis.index()]
    }
}

/// Plane `n·p + d = 0` with `|n| = 1`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub normal: [f32; 3],
    pub d: f32,
}

/// Below this |e1 × e2| / (|e1||e2|) a 3-point sample is treated as collinear.
pub const COLLINEAR_EPS: f32 = 1e-5;

impl Plane {
    /// Plane through three points, or `None` when they are (nearly) collinear
    /// or coincident.
    pub fn from_points(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> Option<Plane> {
        let a = Vector3::from(a);
        let e1 = Vector3::from(b) - a;
        let e2 = Vector3::from(c) - a;
        let scale = e1.norm() * e2.norm();
        if !(scale > f32::MIN_POSITIVE) { return None; }
        let n = e1.cross(&e2);
        let len = n.norm();
        if !(len / scale > COLLINEAR_EPS) { return None; }
        let n = n / len;
        Some(Plane { normal: [n.x, n.y, n.z], d: -n.dot(&a) })
    }

    #[inline]
    pub fn signed_distance(&self, p: [f32; 3]) -> f32 {
        self.normal[0] * p[0] + self.normal[1] * p[1] + self.normal[2] * p[2] + self.d
    }

    #[inline]
    pub fn distance(&self, p: [f32; 3]) -> f32 { self.signed_distance(p).abs() }

    /// |n · up|: 1 for a horizontal plane, 0 for a vertical one.
    #[inline]
    pub fn alignment(&self, up: Axis) -> f32 { self.normal[up.index()].abs() }

    /// Angle between the two planes' normals, ignoring orientation (radians).
    pub fn angle_to(&self, other: &Plane) -> f32 {
        let dot: f32 = (0..3).map(|k| self.normal[k] * other.normal[k]).sum();
        dot.abs().min(1.0).acos()
    }
}
