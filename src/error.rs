//! # Errors
//!
//! Error kinds raised while building and solving frontier problems.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, FrontierError>;

/// Errors produced by the frontier engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrontierError {
  /// Degenerate sample, singular covariance, empty asset set or malformed parameters.
  #[error("invalid input: {0}")]
  InvalidInput(String),

  /// The target return cannot be attained, or the instance is over-constrained.
  #[error("infeasible target: {0}")]
  InfeasibleTarget(String),

  /// The conic solver reported unboundedness or a numerical breakdown.
  #[error("solver failure: {0}")]
  SolverFailure(String),

  /// The nonlinear root finder stopped without a root.
  #[error("no convergence after {evaluations} evaluations (residual: {residual:.2e}): {reason}")]
  NonConvergence {
    /// Residual evaluations spent.
    evaluations: usize,
    /// Euclidean norm of the final residual.
    residual: f64,
    /// Why the candidate was rejected.
    reason: String,
  },
}

impl FrontierError {
  pub(crate) fn invalid(reason: impl Into<String>) -> Self {
    Self::InvalidInput(reason.into())
  }

  /// Whether the error is local to one sweep point and should be recorded as a gap.
  pub fn is_point_failure(&self) -> bool {
    matches!(self, Self::InfeasibleTarget(_) | Self::SolverFailure(_))
  }
}
