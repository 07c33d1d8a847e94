//! # Frontier Sweep
//!
//! $$
//! \rho^\*(\mu_p)=\min_{\mathbf w}\ \rho(\mathbf w)\quad\text{s.t.}\quad
//! \mathbf 1^\top\mathbf w=1,\ \mu^\top\mathbf w=\mu_p,\ \mathbf w\ge 0
//! $$
//!
//! Traces a risk-return frontier by solving one independent problem per target return.

use impl_new_derive::ImplNew;
use ndarray::Array1;
use rayon::prelude::*;

use super::data::ReturnStatistics;
use super::measure::RiskMeasure;
use super::problem::PortfolioProblem;
use super::solver::ConicSolver;
use super::types::FrontierCurve;
use super::types::FrontierPoint;
use super::types::SweepFailure;
use crate::error::FrontierError;
use crate::error::Result;

/// Tail levels swept by [`FrontierSweep::run_by_alpha`] when none are given.
pub const DEFAULT_SHORTFALL_LEVELS: [f64; 4] = [0.05, 0.10, 0.25, 0.50];

#[derive(ImplNew, Clone, Copy, Debug)]
pub struct FrontierConfig {
  /// Number of evenly spaced targets in a default ladder.
  pub points: usize,
  /// Forbid short sales; also enforces the attainable range `[min mu, max mu]`.
  pub long_only: bool,
  /// Keep the optimal weights of every point.
  pub record_weights: bool,
  /// Solve points on the rayon pool.
  pub parallel: bool,
}

impl Default for FrontierConfig {
  fn default() -> Self {
    Self {
      points: 250,
      long_only: true,
      record_weights: true,
      parallel: false,
    }
  }
}

/// Evenly spaced targets over `[min mu, max mu]`.
pub fn target_ladder(stats: &ReturnStatistics, points: usize) -> Result<Vec<f64>> {
  let (lo, hi) = stats.return_range();
  match points {
    0 => Err(FrontierError::invalid("target ladder needs at least one point")),
    1 => Ok(vec![lo]),
    _ if hi <= lo => Err(FrontierError::invalid(format!(
      "all assets share the expected return {lo}; no range to sweep"
    ))),
    _ => Ok(Array1::linspace(lo, hi, points).to_vec()),
  }
}

fn validate_targets(targets: &[f64]) -> Result<()> {
  if targets.is_empty() {
    return Err(FrontierError::invalid("no target returns"));
  }
  if targets.iter().any(|t| !t.is_finite()) {
    return Err(FrontierError::invalid("target returns must be finite"));
  }
  if targets.windows(2).any(|w| w[1] <= w[0]) {
    return Err(FrontierError::invalid("target returns must be strictly increasing"));
  }
  Ok(())
}

/// Sweep driver over one statistics set and one solver.
#[derive(Clone, Copy)]
pub struct FrontierSweep<'a, S: ConicSolver> {
  stats: &'a ReturnStatistics,
  solver: &'a S,
  config: FrontierConfig,
}

impl<'a, S: ConicSolver> FrontierSweep<'a, S> {
  /// Sweep driver over `stats` using `solver`.
  pub fn new(stats: &'a ReturnStatistics, solver: &'a S, config: FrontierConfig) -> Self {
    Self {
      stats,
      solver,
      config,
    }
  }

  /// Borrow sweep configuration.
  pub fn config(&self) -> &FrontierConfig {
    &self.config
  }

  /// Fresh instance for one target: measure formulation plus the common constraints.
  pub fn problem(&self, measure: &RiskMeasure, target: f64) -> Result<PortfolioProblem> {
    if self.config.long_only {
      let (lo, hi) = self.stats.return_range();
      let slack = 1e-12 * lo.abs().max(hi.abs()).max(1.0);
      if !(target >= lo - slack && target <= hi + slack) {
        return Err(FrontierError::InfeasibleTarget(format!(
          "target return {target} outside attainable range [{lo}, {hi}]"
        )));
      }
    }

    let problem = measure
      .formulate(self.stats)?
      .with_full_investment()
      .with_target_return(self.stats.mean().view(), target);

    Ok(if self.config.long_only {
      problem.with_long_only()
    } else {
      problem
    })
  }

  /// Build, solve and discard one instance.
  pub fn solve_point(&self, measure: &RiskMeasure, target: f64) -> Result<FrontierPoint> {
    let problem = self.problem(measure, target)?;
    let solution = self.solver.solve(&problem)?;
    if solution.inaccurate {
      tracing::warn!(
        measure = %measure,
        target_return = target,
        "frontier point solved to reduced accuracy"
      );
    }
    tracing::debug!(
      measure = %measure,
      target_return = target,
      objective = solution.objective,
      violation = problem.max_violation(&solution.x),
      inaccurate = solution.inaccurate,
      "solved frontier point"
    );

    Ok(FrontierPoint {
      target_return: target,
      risk: Some(solution.objective),
      weights: self
        .config
        .record_weights
        .then(|| solution.weights(&problem)),
      inaccurate: solution.inaccurate,
    })
  }

  /// Sweep `targets` in order. Infeasible or failed points become gaps; invalid setup aborts.
  pub fn run(&self, measure: &RiskMeasure, targets: &[f64]) -> Result<FrontierCurve> {
    measure.validate(self.stats)?;
    validate_targets(targets)?;

    let outcomes: Vec<(usize, f64, Result<FrontierPoint>)> = if self.config.parallel {
      targets
        .par_iter()
        .enumerate()
        .map(|(index, &target)| (index, target, self.solve_point(measure, target)))
        .collect()
    } else {
      targets
        .iter()
        .enumerate()
        .map(|(index, &target)| (index, target, self.solve_point(measure, target)))
        .collect()
    };

    let mut points = Vec::with_capacity(targets.len());
    let mut failures = Vec::new();
    for (index, target, outcome) in outcomes {
      match outcome {
        Ok(point) => points.push(point),
        Err(error) if error.is_point_failure() => {
          tracing::warn!(
            measure = %measure,
            target_return = target,
            error = %error,
            "recording frontier gap"
          );
          points.push(FrontierPoint::gap(target));
          failures.push(SweepFailure {
            index,
            target_return: target,
            error,
          });
        }
        Err(error) => return Err(error),
      }
    }

    tracing::info!(
      measure = %measure,
      points = points.len(),
      failures = failures.len(),
      "frontier sweep finished"
    );
    Ok(FrontierCurve::new(measure.clone(), points, failures))
  }

  /// Sweep the default ladder of `config.points` targets.
  pub fn run_default(&self, measure: &RiskMeasure) -> Result<FrontierCurve> {
    let targets = target_ladder(self.stats, self.config.points)?;
    self.run(measure, &targets)
  }

  /// One expected-shortfall frontier per tail level.
  pub fn run_by_alpha(&self, alphas: &[f64], targets: &[f64]) -> Result<Vec<FrontierCurve>> {
    let measures: Vec<RiskMeasure> = alphas
      .iter()
      .map(|&alpha| RiskMeasure::expected_shortfall(alpha))
      .collect();
    for measure in &measures {
      measure.validate(self.stats)?;
    }

    if self.config.parallel {
      measures.par_iter().map(|m| self.run(m, targets)).collect()
    } else {
      measures.iter().map(|m| self.run(m, targets)).collect()
    }
  }
}
