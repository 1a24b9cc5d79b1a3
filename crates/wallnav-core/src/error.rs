//! Error types shared by every pipeline stage.

use thiserror::Error;

/// Why the planner returned without a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoPathReason {
    StartOutOfBounds,
    GoalOutOfBounds,
    StartOccupied,
    GoalOccupied,
    /// Frontier ran dry before the goal was reached.
    Exhausted,
    /// Expansion count or wall-clock budget ran out.
    BudgetExceeded,
}

impl std::fmt::Display for NoPathReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NoPathReason::StartOutOfBounds => "start is outside the grid",
            NoPathReason::GoalOutOfBounds => "goal is outside the grid",
            NoPathReason::StartOccupied => "start cell is occupied",
            NoPathReason::GoalOccupied => "goal cell is occupied",
            NoPathReason::Exhausted => "search space exhausted",
            NoPathReason::BudgetExceeded => "search budget exceeded",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NavError {
    #[error("no points to process")]
    EmptyInput,

    #[error("need at least {needed} points, got {got}")]
    InsufficientPoints { needed: usize, got: usize },

    #[error("no plane reached {min_inliers} inliers in {iterations} iterations (best: {best_inliers})")]
    NoConsensus { iterations: usize, best_inliers: usize, min_inliers: usize },

    #[error("no path: {0}")]
    NoPath(NoPathReason),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl NavError {
    pub fn is_no_path(&self) -> bool { matches!(self, NavError::NoPath(_)) }
}

pub type Result<T> = std::result::Result<T, NavError>;
