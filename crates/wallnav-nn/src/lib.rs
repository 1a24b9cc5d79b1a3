//! wallnav-nn — neighbor indices for 3D (uniform grid hash).

use hashbrown::hash_map::Entry;
use hashbrown::HashMap;
use smallvec::SmallVec;
use wallnav_core::PointView;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Neighbor { pub idx: usize, pub dist2: f32 }

/// Trait for geometry-first neighborhood queries.
pub trait NeighborIndex3 {
    /// The `k` nearest other points of point `i`, ascending by distance
    /// (ties by index).
    fn knn(&self, i: usize, k: usize) -> SmallVec<[Neighbor; 64]>;
}

/// Uniform grid hash, cell size = r.
pub struct GridIndex<'a> {
    pts: PointView<'a>,
    cell: f32,
    buckets: HashMap<[i32; 3], Vec<usize>>,
    key_min: [i32; 3],
    key_max: [i32; 3],
}

impl<'a> GridIndex<'a> {
    pub fn build(pts: PointView<'a>, cell: f32) -> Self {
        let cell = cell.max(1e-12);
        let inv = 1.0 / cell;
        let mut buckets: HashMap<[i32; 3], Vec<usize>> = HashMap::new();
        let mut key_min = [i32::MAX; 3];
        let mut key_max = [i32::MIN; 3];
        for i in 0..pts.len() {
            let key = key_for(pts.point(i), inv);
            for k in 0..3 {
                key_min[k] = key_min[k].min(key[k]);
                key_max[k] = key_max[k].max(key[k]);
            }
            match buckets.entry(key) {
                Entry::Vacant(v) => { v.insert(vec![i]); }
                Entry::Occupied(mut o) => o.get_mut().push(i),
            }
        }
        Self { pts, cell, buckets, key_min, key_max }
    }

    pub fn cell(&self) -> f32 { self.cell }

    fn key_of(&self, i: usize) -> [i32; 3] {
        key_for(self.pts.point(i), 1.0 / self.cell)
    }

    /// Largest Chebyshev ring around `key` that can still hold points.
    fn max_layer(&self, key: [i32; 3]) -> i32 {
        (0..3)
            .map(|k| (key[k] - self.key_min[k]).max(self.key_max[k] - key[k]))
            .max()
            .unwrap_or(0)
            .max(0)
    }

    fn push_bucket(&self, i: usize, p: [f32; 3], key: [i32; 3], out: &mut SmallVec<[Neighbor; 64]>) {
        if let Some(bin) = self.buckets.get(&key) {
            for &j in bin {
                if j == i { continue; }
                out.push(Neighbor { idx: j, dist2: dist2(p, self.pts.point(j)) });
            }
        }
    }

    fn brute_force(&self, i: usize, k: usize) -> SmallVec<[Neighbor; 64]> {
        let p = self.pts.point(i);
        let mut out: SmallVec<[Neighbor; 64]> = (0..self.pts.len())
            .filter(|&j| j != i)
            .map(|j| Neighbor { idx: j, dist2: dist2(p, self.pts.point(j)) })
            .collect();
        sort_truncate(&mut out, k);
        out
    }
}

impl NeighborIndex3 for GridIndex<'_> {
    fn knn(&self, i: usize, k: usize) -> SmallVec<[Neighbor; 64]> {
        if k == 0 || self.pts.len() < 2 { return SmallVec::new(); }
        let p = self.pts.point(i);
        let base = self.key_of(i);
        let max_layer = self.max_layer(base);
        let mut out: SmallVec<[Neighbor; 64]> = SmallVec::new();

        // Expand one Chebyshev shell at a time. Anything outside shell L is at
        // least L cells away, so once the k-th candidate is closer we are done.
        for layer in 0..=max_layer {
            let side = (2 * layer as usize + 1).pow(3);
            if side > 8 * self.buckets.len() {
                // sparse neighborhood: scanning rings costs more than a full pass
                return self.brute_force(i, k);
            }
            for dx in -layer..=layer {
                for dy in -layer..=layer {
                    for dz in -layer..=layer {
                        if dx.abs().max(dy.abs()).max(dz.abs()) != layer { continue; }
                        self.push_bucket(i, p, [base[0] + dx, base[1] + dy, base[2] + dz], &mut out);
                    }
                }
            }
            if out.len() >= k {
                sort_truncate(&mut out, k);
                let reach = layer as f32 * self.cell;
                if out[k - 1].dist2 < reach * reach { break; }
            }
        }
        sort_truncate(&mut out, k);
        out
    }
}

#[inline]
fn key_for(p: [f32; 3], inv: f32) -> [i32; 3] {
    [
        (p[0] * inv).floor() as i32,
        (p[1] * inv).floor() as i32,
        (p[2] * inv).floor() as i32,
    ]
}

#[inline]
fn dist2(a: [f32; 3], b: [f32; 3]) -> f32 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

fn sort_truncate(out: &mut SmallVec<[Neighbor; 64]>, k: usize) {
    out.sort_by(|a, b| a.dist2.total_cmp(&b.dist2).then(a.idx.cmp(&b.idx)));
    out.truncate(k);
}
