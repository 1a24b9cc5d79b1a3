//! wallnav-grid — 2-D occupancy grid, rasterizer, inflation and PGM export.

mod raster;

pub use raster::{project, rasterize, RasterParams};

use log::debug;
use serde::{Deserialize, Serialize};
use std::io::Write;
use wallnav_core::{NavError, Result};

/// Grid cell as (column, row).
pub type Cell = (usize, usize);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellState {
    #[default]
    Free,
    Occupied,
}

/// Row-major occupancy grid. Cell `(c, r)` covers
/// `[origin + (c, r)·cell_size, origin + (c+1, r+1)·cell_size)` in world units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OccupancyGrid {
    width: usize,
    height: usize,
    cell_size: f32,
    origin: [f32; 2],
    cells: Vec<CellState>,
}

impl OccupancyGrid {
    /// All-free grid.
    pub fn new(width: usize, height: usize, cell_size: f32, origin: [f32; 2]) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(NavError::InvalidConfig(format!("grid must be non-empty, got {width}x{height}")));
        }
        check_cell_size(cell_size)?;
        if !origin.iter().all(|v| v.is_finite()) {
            return Err(NavError::InvalidConfig("grid origin must be finite".into()));
        }
        Ok(Self { width, height, cell_size, origin, cells: vec![CellState::Free; width * height] })
    }

    pub fn width(&self) -> usize { self.width }
    pub fn height(&self) -> usize { self.height }
    pub fn cell_size(&self) -> f32 { self.cell_size }
    pub fn origin(&self) -> [f32; 2] { self.origin }

    #[inline]
    fn index(&self, (c, r): Cell) -> Option<usize> {
        (c < self.width && r < self.height).then(|| r * self.width + c)
    }

    pub fn in_bounds(&self, cell: Cell) -> bool { self.index(cell).is_some() }

    pub fn get(&self, cell: Cell) -> Option<CellState> {
        self.index(cell).map(|i| self.cells[i])
    }

    /// Out-of-bounds cells are never free.
    pub fn is_free(&self, cell: Cell) -> bool {
        self.get(cell) == Some(CellState::Free)
    }

    /// Returns false if `cell` is outside the grid.
    pub fn set(&mut self, cell: Cell, state: CellState) -> bool {
        match self.index(cell) {
            Some(i) => { self.cells[i] = state; true }
            None => false,
        }
    }

    /// Occupied cells in row-major order.
    pub fn occupied_cells(&self) -> Vec<Cell> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == CellState::Occupied)
            .map(|(i, _)| (i % self.width, i / self.width))
            .collect()
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|s| **s == CellState::Occupied).count()
    }

    /// World-space `(min, max)` corners covered by the grid.
    pub fn world_bounds(&self) -> ([f32; 2], [f32; 2]) {
        let max = [
            self.origin[0] + self.width as f32 * self.cell_size,
            self.origin[1] + self.height as f32 * self.cell_size,
        ];
        (self.origin, max)
    }

    /// Cell containing a world point, by floor division. `None` outside the grid
    /// or for non-finite input.
    pub fn world_to_cell(&self, p: [f32; 2]) -> Option<Cell> {
        if !p.iter().all(|v| v.is_finite()) { return None; }
        let c = ((p[0] as f64 - self.origin[0] as f64) / self.cell_size as f64).floor();
        let r = ((p[1] as f64 - self.origin[1] as f64) / self.cell_size as f64).floor();
        if c < 0.0 || r < 0.0 { return None; }
        let cell = (c as usize, r as usize);
        self.in_bounds(cell).then_some(cell)
    }

    /// `origin + index·cell_size`: the cell's minimum corner.
    pub fn cell_to_world(&self, (c, r): Cell) -> [f32; 2] {
        [
            self.origin[0] + c as f32 * self.cell_size,
            self.origin[1] + r as f32 * self.cell_size,
        ]
    }

    /// Copy of the grid with every occupied cell grown into a disc of
    /// `radius` world units (rounded up to whole cells).
    pub fn inflate(&self, radius: f32) -> Result<OccupancyGrid> {
        if !(radius >= 0.0) || !radius.is_finite() {
            return Err(NavError::InvalidConfig(format!("inflation radius must be >= 0, got {radius}")));
        }
        let r = (radius / self.cell_size).ceil() as i64;
        let mut out = self.clone();
        if r == 0 { return Ok(out); }

        for (cx, cy) in self.occupied_cells() {
            for dy in -r..=r {
                for dx in -r..=r {
                    if dx * dx + dy * dy > r * r { continue; }
                    let (nx, ny) = (cx as i64 + dx, cy as i64 + dy);
                    if nx >= 0 && ny >= 0 {
                        out.set((nx as usize, ny as usize), CellState::Occupied);
                    }
                }
            }
        }
        debug!(
            "inflate: radius {radius} ({r} cells), occupied {} -> {}",
            self.occupied_count(), out.occupied_count()
        );
        Ok(out)
    }

    /// Binary PGM (P5): occupied black, free white, `path` cells grey.
    /// Row 0 is written last so +y points up in the image.
    pub fn write_pgm<W: Write>(&self, mut w: W, path: &[Cell]) -> std::io::Result<()> {
        const FREE: u8 = 255;
        const OCCUPIED: u8 = 0;
        const PATH: u8 = 128;

        let mut px: Vec<u8> = self
            .cells
            .iter()
            .map(|s| if *s == CellState::Occupied { OCCUPIED } else { FREE })
            .collect();
        for &cell in path {
            if let Some(i) = self.index(cell) { px[i] = PATH; }
        }

        write!(w, "P5\n{} {}\n255\n", self.width, self.height)?;
        for row in px.chunks(self.width).rev() {
            w.write_all(row)?;
        }
        w.flush()
    }
}

pub(crate) fn check_cell_size(cell_size: f32) -> Result<()> {
    if !(cell_size > 0.0) || !cell_size.is_finite() {
        return Err(NavError::InvalidConfig(format!("cell_size must be positive, got {cell_size}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn world_cell_mapping() {
        let g = OccupancyGrid::new(10, 5, 0.5, [-1.0, 2.0]).unwrap();
        assert_eq!(g.world_to_cell([-1.0, 2.0]), Some((0, 0)));
        assert_eq!(g.world_to_cell([0.74, 2.6]), Some((3, 1)));
        assert_eq!(g.world_to_cell([-1.01, 2.0]), None);
        assert_eq!(g.world_to_cell([4.0, 2.0]), None);
        assert_eq!(g.world_to_cell([f32::NAN, 2.0]), None);
        let w = g.cell_to_world((3, 1));
        assert_relative_eq!(w[0], 0.5);
        assert_relative_eq!(w[1], 2.5);
        assert_eq!(g.world_to_cell(w), Some((3, 1)));
        let (lo, hi) = g.world_bounds();
        assert_eq!(lo, [-1.0, 2.0]);
        assert_relative_eq!(hi[0], 4.0);
        assert_relative_eq!(hi[1], 4.5);
    }

    #[test]
    fn out_of_bounds_is_not_free() {
        let mut g = OccupancyGrid::new(3, 3, 1.0, [0.0, 0.0]).unwrap();
        assert!(g.is_free((2, 2)));
        assert!(!g.is_free((3, 0)));
        assert!(!g.set((0, 3), CellState::Occupied));
        assert!(g.set((1, 2), CellState::Occupied));
        assert_eq!(g.get((1, 2)), Some(CellState::Occupied));
        assert_eq!(g.occupied_cells(), vec![(1, 2)]);
    }

    #[test]
    fn inflate_grows_a_disc() {
        let mut g = OccupancyGrid::new(9, 9, 0.1, [0.0, 0.0]).unwrap();
        g.set((4, 4), CellState::Occupied);
        let inflated = g.inflate(0.2).unwrap();
        // r = 2 cells: 13 cells within dx²+dy² ≤ 4
        assert_eq!(inflated.occupied_count(), 13);
        assert!(!inflated.is_free((4, 6)));
        assert!(inflated.is_free((6, 6)));
        assert_eq!(g.inflate(0.0).unwrap(), g);
        assert!(g.inflate(-1.0).is_err());
    }

    #[test]
    fn inflate_clips_at_edges() {
        let mut g = OccupancyGrid::new(4, 4, 1.0, [0.0, 0.0]).unwrap();
        g.set((0, 0), CellState::Occupied);
        let inflated = g.inflate(1.0).unwrap();
        assert_eq!(inflated.occupied_cells(), vec![(0, 0), (1, 0), (0, 1)]);
    }

    #[test]
    fn pgm_layout() {
        let mut g = OccupancyGrid::new(3, 2, 1.0, [0.0, 0.0]).unwrap();
        g.set((0, 0), CellState::Occupied);
        let mut buf = Vec::new();
        g.write_pgm(&mut buf, &[(2, 1)]).unwrap();
        let header = b"P5\n3 2\n255\n";
        assert_eq!(&buf[..header.len()], header);
        // top image row is grid row 1
        assert_eq!(&buf[header.len()..], &[255, 255, 128, 0, 255, 255]);
    }

    #[test]
    fn rejects_bad_dimensions() {
        assert!(OccupancyGrid::new(0, 3, 1.0, [0.0, 0.0]).is_err());
        assert!(OccupancyGrid::new(3, 3, 0.0, [0.0, 0.0]).is_err());
        assert!(OccupancyGrid::new(3, 3, 1.0, [f32::INFINITY, 0.0]).is_err());
    }
}
