//! wallnav-plan — A* over an occupancy grid.
//!
//! 8-connected, unit axis steps and √2 diagonals, Euclidean heuristic, all in
//! cell units. The frontier is ordered by `f`, then `h`, then insertion order.
//! There is no closed set: a cell is pushed again whenever a strictly lower
//! `g` reaches it, and outdated heap entries are skipped when popped.

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::f64::consts::SQRT_2;
use std::time::{Duration, Instant};
use wallnav_core::{NavError, NoPathReason, Result};
use wallnav_grid::{Cell, OccupancyGrid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerParams {
    /// cap on popped (non-stale) nodes; `None` = grid size bounds the search
    pub max_expansions: Option<usize>,
    /// wall-clock budget in milliseconds
    pub timeout_ms: Option<u64>,
    /// disallow diagonal moves that squeeze between two occupied cells' corners
    pub forbid_corner_cutting: bool,
}

impl Default for PlannerParams {
    fn default() -> Self {
        Self { max_expansions: Some(5_000_000), timeout_ms: None, forbid_corner_cutting: false }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Path {
    /// start first, goal last
    pub cells: Vec<Cell>,
    /// in cell units
    pub cost: f64,
}

impl Path {
    pub fn len(&self) -> usize { self.cells.len() }
    pub fn is_empty(&self) -> bool { self.cells.is_empty() }

    pub fn world_points(&self, grid: &OccupancyGrid) -> Vec<[f32; 2]> {
        self.cells.iter().map(|&c| grid.cell_to_world(c)).collect()
    }

    pub fn world_length(&self, grid: &OccupancyGrid) -> f64 {
        self.cost * grid.cell_size() as f64
    }
}

#[derive(Clone, Copy, Debug)]
struct Node {
    f: f64,
    h: f64,
    g: f64,
    seq: u64,
    cell: Cell,
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed: BinaryHeap is a max-heap
        other.f.total_cmp(&self.f)
            .then_with(|| other.h.total_cmp(&self.h))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}

impl Eq for Node {}

const STEPS: [(i64, i64); 8] = [(1, 0), (-1, 0), (0, 1), (0, -1), (1, 1), (1, -1), (-1, 1), (-1, -1)];

#[inline]
fn heuristic(a: Cell, b: Cell) -> f64 {
    let dx = a.0 as f64 - b.0 as f64;
    let dy = a.1 as f64 - b.1 as f64;
    (dx * dx + dy * dy).sqrt()
}

/// Shortest 8-connected route between two free cells.
pub fn plan(grid: &OccupancyGrid, start: Cell, goal: Cell, params: &PlannerParams) -> Result<Path> {
    let no_path = |r| Err(NavError::NoPath(r));
    if !grid.in_bounds(start) { return no_path(NoPathReason::StartOutOfBounds); }
    if !grid.in_bounds(goal) { return no_path(NoPathReason::GoalOutOfBounds); }
    if !grid.is_free(start) { return no_path(NoPathReason::StartOccupied); }
    if !grid.is_free(goal) { return no_path(NoPathReason::GoalOccupied); }
    if start == goal {
        return Ok(Path { cells: vec![start], cost: 0.0 });
    }

    let w = grid.width();
    let idx = |(c, r): Cell| r * w + c;
    let n = w * grid.height();
    let mut g_score = vec![f64::INFINITY; n];
    let mut came_from = vec![usize::MAX; n];

    let deadline = params.timeout_ms.map(|ms| Instant::now() + Duration::from_millis(ms));
    let max_expansions = params.max_expansions.unwrap_or(usize::MAX);

    let mut open = BinaryHeap::new();
    let mut seq = 0u64;
    let h0 = heuristic(start, goal);
    g_score[idx(start)] = 0.0;
    open.push(Node { f: h0, h: h0, g: 0.0, seq, cell: start });

    let mut expansions = 0usize;
    while let Some(node) = open.pop() {
        if node.g > g_score[idx(node.cell)] { continue; } // superseded entry

        if node.cell == goal {
            debug!("plan: reached goal after {expansions} expansions, cost {:.3}", node.g);
            return Ok(Path { cells: reconstruct(&came_from, w, start, goal), cost: node.g });
        }

        expansions += 1;
        if expansions > max_expansions {
            debug!("plan: expansion budget {max_expansions} exhausted");
            return no_path(NoPathReason::BudgetExceeded);
        }
        if let Some(deadline) = deadline {
            if expansions % 1024 == 0 && Instant::now() >= deadline {
                debug!("plan: timed out after {expansions} expansions");
                return no_path(NoPathReason::BudgetExceeded);
            }
        }
        trace!("expand {:?} g={:.3} f={:.3}", node.cell, node.g, node.f);

        let (cx, cy) = (node.cell.0 as i64, node.cell.1 as i64);
        for (dx, dy) in STEPS {
            let (nx, ny) = (cx + dx, cy + dy);
            if nx < 0 || ny < 0 { continue; }
            let next = (nx as usize, ny as usize);
            if !grid.is_free(next) { continue; }

            let diagonal = dx != 0 && dy != 0;
            if diagonal
                && params.forbid_corner_cutting
                && !(grid.is_free((nx as usize, cy as usize)) && grid.is_free((cx as usize, ny as usize)))
            {
                continue;
            }

            let tentative = node.g + if diagonal { SQRT_2 } else { 1.0 };
            let j = idx(next);
            if tentative < g_score[j] {
                g_score[j] = tentative;
                came_from[j] = idx(node.cell);
                let h = heuristic(next, goal);
                seq += 1;
                open.push(Node { f: tentative + h, h, g: tentative, seq, cell: next });
            }
        }
    }

    debug!("plan: frontier exhausted after {expansions} expansions");
    no_path(NoPathReason::Exhausted)
}

/// [`plan`] between world coordinates, mapped through the grid's cell lookup.
pub fn plan_world(
    grid: &OccupancyGrid,
    start: [f32; 2],
    goal: [f32; 2],
    params: &PlannerParams,
) -> Result<Path> {
    let s = grid.world_to_cell(start).ok_or(NavError::NoPath(NoPathReason::StartOutOfBounds))?;
    let g = grid.world_to_cell(goal).ok_or(NavError::NoPath(NoPathReason::GoalOutOfBounds))?;
    plan(grid, s, g, params)
}

fn reconstruct(came_from: &[usize], width: usize, start: Cell, goal: Cell) -> Vec<Cell> {
    let start_i = start.1 * width + start.0;
    let mut cells = vec![goal];
    let mut cur = goal.1 * width + goal.0;
    while cur != start_i {
        cur = came_from[cur];
        cells.push((cur % width, cur / width));
    }
    cells.reverse();
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use wallnav_grid::CellState;

    fn free_grid(w: usize, h: usize) -> OccupancyGrid {
        OccupancyGrid::new(w, h, 1.0, [0.0, 0.0]).unwrap()
    }

    fn assert_connected(path: &Path, grid: &OccupancyGrid) {
        for c in &path.cells {
            assert!(grid.is_free(*c), "{c:?} is not free");
        }
        for pair in path.cells.windows(2) {
            let dx = pair[0].0.abs_diff(pair[1].0);
            let dy = pair[0].1.abs_diff(pair[1].1);
            assert!(dx <= 1 && dy <= 1 && (dx, dy) != (0, 0));
        }
    }

    #[test]
    fn diagonal_then_straight() {
        let g = free_grid(10, 10);
        let p = plan(&g, (0, 0), (3, 4), &PlannerParams::default()).unwrap();
        assert_eq!(p.len(), 5);
        assert_relative_eq!(p.cost, 3.0 * SQRT_2 + 1.0, epsilon = 1e-12);
        assert_eq!(p.cells.first(), Some(&(0, 0)));
        assert_eq!(p.cells.last(), Some(&(3, 4)));
        assert_connected(&p, &g);
    }

    #[test]
    fn start_equals_goal() {
        let g = free_grid(3, 3);
        let p = plan(&g, (1, 1), (1, 1), &PlannerParams::default()).unwrap();
        assert_eq!(p.cells, vec![(1, 1)]);
        assert_eq!(p.cost, 0.0);
    }

    #[test]
    fn enclosed_goal_has_no_path() {
        let mut g = free_grid(9, 9);
        for dx in 0..3 {
            for dy in 0..3 {
                if (dx, dy) != (1, 1) {
                    g.set((5 + dx, 5 + dy), CellState::Occupied);
                }
            }
        }
        let err = plan(&g, (0, 0), (6, 6), &PlannerParams::default()).unwrap_err();
        assert_eq!(err, NavError::NoPath(NoPathReason::Exhausted));
    }

    #[test]
    fn bad_endpoints_fail_immediately() {
        let mut g = free_grid(4, 4);
        g.set((2, 2), CellState::Occupied);
        let p = PlannerParams::default();
        assert_eq!(plan(&g, (4, 0), (1, 1), &p).unwrap_err(), NavError::NoPath(NoPathReason::StartOutOfBounds));
        assert_eq!(plan(&g, (0, 0), (0, 9), &p).unwrap_err(), NavError::NoPath(NoPathReason::GoalOutOfBounds));
        assert_eq!(plan(&g, (2, 2), (0, 0), &p).unwrap_err(), NavError::NoPath(NoPathReason::StartOccupied));
        assert_eq!(plan(&g, (0, 0), (2, 2), &p).unwrap_err(), NavError::NoPath(NoPathReason::GoalOccupied));
    }

    #[test]
    fn routes_around_a_wall() {
        let mut g = free_grid(20, 20);
        for y in 0..15 {
            g.set((10, y), CellState::Occupied);
        }
        let p = plan(&g, (5, 5), (15, 5), &PlannerParams::default()).unwrap();
        assert_connected(&p, &g);
        assert!(p.cells.iter().any(|c| c.1 >= 15));
        // (5,5) -> (10,15) -> (15,5), each leg 5 diagonals and 5 straight steps
        assert_relative_eq!(p.cost, 10.0 * SQRT_2 + 10.0, epsilon = 1e-9);
    }

    /// Plain O(n²) Dijkstra; `None` when `goal` is unreachable.
    fn dijkstra_cost(grid: &OccupancyGrid, start: Cell, goal: Cell) -> Option<f64> {
        let (w, h) = (grid.width(), grid.height());
        let mut dist = vec![f64::INFINITY; w * h];
        let mut done = vec![false; w * h];
        dist[start.1 * w + start.0] = 0.0;
        loop {
            let u = (0..w * h)
                .filter(|&i| !done[i] && dist[i].is_finite())
                .min_by(|&a, &b| dist[a].total_cmp(&dist[b]))?;
            if u == goal.1 * w + goal.0 {
                return Some(dist[u]);
            }
            done[u] = true;
            let (ux, uy) = ((u % w) as i64, (u / w) as i64);
            for (dx, dy) in STEPS {
                let (nx, ny) = (ux + dx, uy + dy);
                if nx < 0 || ny < 0 || !grid.is_free((nx as usize, ny as usize)) { continue; }
                let v = ny as usize * w + nx as usize;
                let step = if dx != 0 && dy != 0 { SQRT_2 } else { 1.0 };
                if dist[u] + step < dist[v] {
                    dist[v] = dist[u] + step;
                }
            }
        }
    }

    #[test]
    fn cost_matches_dijkstra_on_random_grids() {
        let mut rng = StdRng::seed_from_u64(11);
        let (w, h) = (15, 12);
        for _ in 0..300 {
            let mut g = free_grid(w, h);
            for x in 0..w {
                for y in 0..h {
                    if rng.gen_bool(0.3) {
                        g.set((x, y), CellState::Occupied);
                    }
                }
            }
            let start = (rng.gen_range(0..w), rng.gen_range(0..h));
            let goal = (rng.gen_range(0..w), rng.gen_range(0..h));
            g.set(start, CellState::Free);
            g.set(goal, CellState::Free);

            match (plan(&g, start, goal, &PlannerParams::default()), dijkstra_cost(&g, start, goal)) {
                (Ok(p), Some(best)) => {
                    assert_relative_eq!(p.cost, best, epsilon = 1e-9);
                    assert_eq!(p.cells.first(), Some(&start));
                    assert_eq!(p.cells.last(), Some(&goal));
                    assert_connected(&p, &g);
                }
                (Err(e), None) => assert_eq!(e, NavError::NoPath(NoPathReason::Exhausted)),
                (got, want) => panic!("{start:?} -> {goal:?}: planner {got:?}, dijkstra {want:?}"),
            }
        }
    }

    #[test]
    fn corner_cutting_toggle() {
        // two occupied cells touching diagonally
        let mut g = free_grid(2, 2);
        g.set((1, 0), CellState::Occupied);
        g.set((0, 1), CellState::Occupied);
        let p = plan(&g, (0, 0), (1, 1), &PlannerParams::default()).unwrap();
        assert_eq!(p.cells, vec![(0, 0), (1, 1)]);
        let strict = PlannerParams { forbid_corner_cutting: true, ..Default::default() };
        assert_eq!(
            plan(&g, (0, 0), (1, 1), &strict).unwrap_err(),
            NavError::NoPath(NoPathReason::Exhausted)
        );
    }

    #[test]
    fn expansion_budget_is_enforced() {
        let g = free_grid(50, 50);
        let p = PlannerParams { max_expansions: Some(3), ..Default::default() };
        assert_eq!(
            plan(&g, (0, 0), (49, 49), &p).unwrap_err(),
            NavError::NoPath(NoPathReason::BudgetExceeded)
        );
    }

    #[test]
    fn timeout_is_enforced() {
        // goal walled in, so only the clock can end the search early
        let mut g = free_grid(200, 200);
        for x in 180..200 {
            g.set((x, 180), CellState::Occupied);
        }
        for y in 180..200 {
            g.set((180, y), CellState::Occupied);
        }
        let p = PlannerParams { max_expansions: None, timeout_ms: Some(0), ..Default::default() };
        assert_eq!(
            plan(&g, (0, 0), (199, 199), &p).unwrap_err(),
            NavError::NoPath(NoPathReason::BudgetExceeded)
        );
    }

    #[test]
    fn world_endpoints() {
        let g = OccupancyGrid::new(10, 10, 0.5, [-2.0, -2.0]).unwrap();
        let p = plan_world(&g, [-2.0, -2.0], [-0.4, -2.0], &PlannerParams::default()).unwrap();
        assert_eq!(p.cells.last(), Some(&(3, 0)));
        assert_relative_eq!(p.world_length(&g), 1.5);
        assert_eq!(p.world_points(&g)[1], [-1.5, -2.0]);
        assert_eq!(
            plan_world(&g, [10.0, 0.0], [0.0, 0.0], &PlannerParams::default()).unwrap_err(),
            NavError::NoPath(NoPathReason::StartOutOfBounds)
        );
    }

    #[test]
    fn same_grid_same_path() {
        let mut g = free_grid(30, 30);
        for x in 5..25 {
            g.set((x, 15), CellState::Occupied);
        }
        let a = plan(&g, (15, 2), (15, 28), &PlannerParams::default()).unwrap();
        let b = plan(&g, (15, 2), (15, 28), &PlannerParams::default()).unwrap();
        assert_eq!(a, b);
    }
}
