//! # Portfolio Engine
//!
//! $$
//! \mathcal F_\rho=\{\rho^\*(\mu_p):\ \mu_p\in[\min\mu,\max\mu]\}
//! $$
//!
//! High-level orchestration API over frontier sweeps, risk parity and tracking backtests.

use ndarray::Array1;

use super::allocation::AllocationSet;
use super::closed_form::ClosedFormFrontier;
use super::data::ReturnSeries;
use super::data::ReturnStatistics;
use super::frontier::FrontierConfig;
use super::frontier::FrontierSweep;
use super::measure::RiskMeasure;
use super::risk_parity::RiskParityConfig;
use super::risk_parity::RiskParitySolution;
use super::risk_parity::solve_risk_parity;
use super::solver::ClarabelSolver;
use super::solver::ConicSolver;
use super::solver::SolverSettings;
use super::tracking::RollingTrackingConfig;
use super::tracking::TrackingBacktest;
use super::tracking::rolling_tracking;
use super::types::FrontierCurve;
use crate::error::Result;

/// Runtime configuration for [`PortfolioEngine`].
#[derive(Clone, Copy, Debug, Default)]
pub struct PortfolioEngineConfig {
  /// Settings of the default conic solver.
  pub solver: SolverSettings,
  pub frontier: FrontierConfig,
  pub risk_parity: RiskParityConfig,
  pub tracking: RollingTrackingConfig,
}

/// Single entry-point engine for frontier workflows.
#[derive(Clone, Debug)]
pub struct PortfolioEngine<S: ConicSolver = ClarabelSolver> {
  config: PortfolioEngineConfig,
  solver: S,
}

impl PortfolioEngine<ClarabelSolver> {
  /// Construct a new engine backed by Clarabel.
  pub fn new(config: PortfolioEngineConfig) -> Self {
    Self {
      solver: ClarabelSolver::new(config.solver),
      config,
    }
  }
}

impl Default for PortfolioEngine<ClarabelSolver> {
  fn default() -> Self {
    Self::new(PortfolioEngineConfig::default())
  }
}

impl<S: ConicSolver> PortfolioEngine<S> {
  /// Construct an engine around another solver; `config.solver` is then unused.
  pub fn with_solver(config: PortfolioEngineConfig, solver: S) -> Self {
    Self { config, solver }
  }

  /// Borrow engine configuration.
  pub fn config(&self) -> &PortfolioEngineConfig {
    &self.config
  }

  /// Borrow the conic solver.
  pub fn solver(&self) -> &S {
    &self.solver
  }

  fn sweep<'a>(&'a self, stats: &'a ReturnStatistics) -> FrontierSweep<'a, S> {
    FrontierSweep::new(stats, &self.solver, self.config.frontier)
  }

  /// Sweep `measure` over explicit targets.
  pub fn frontier(
    &self,
    stats: &ReturnStatistics,
    measure: &RiskMeasure,
    targets: &[f64],
  ) -> Result<FrontierCurve> {
    self.sweep(stats).run(measure, targets)
  }

  /// Sweep `measure` over `frontier.points` evenly spaced targets in `[min mu, max mu]`.
  pub fn frontier_default(&self, stats: &ReturnStatistics, measure: &RiskMeasure) -> Result<FrontierCurve> {
    self.sweep(stats).run_default(measure)
  }

  /// One expected-shortfall curve per `alpha`.
  pub fn frontier_by_alpha(
    &self,
    stats: &ReturnStatistics,
    alphas: &[f64],
    targets: &[f64],
  ) -> Result<Vec<FrontierCurve>> {
    self.sweep(stats).run_by_alpha(alphas, targets)
  }

  /// Analytic mean-variance frontier with short sales.
  pub fn closed_form(&self, stats: &ReturnStatistics) -> Result<ClosedFormFrontier> {
    ClosedFormFrontier::from_statistics(stats)
  }

  /// Equal risk contribution weights.
  pub fn risk_parity(&self, stats: &ReturnStatistics) -> Result<RiskParitySolution> {
    solve_risk_parity(stats.covariance(), &self.config.risk_parity)
  }

  /// Rolling minimum tracking-error backtest against `benchmark`.
  pub fn rolling_tracking(&self, series: &ReturnSeries, benchmark: &Array1<f64>) -> Result<TrackingBacktest> {
    rolling_tracking(series, benchmark, &self.solver, &self.config.tracking)
  }

  /// Equal weight, minimum variance, maximum diversification and risk parity side by side.
  pub fn allocations(&self, stats: &ReturnStatistics) -> Result<AllocationSet> {
    AllocationSet::compute(stats, &self.config.risk_parity)
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;

  use super::*;
  use crate::error::FrontierError;
  use crate::portfolio::data::noisy_equal_weight_benchmark;
  use crate::portfolio::textbook;
  use crate::portfolio::frontier::DEFAULT_SHORTFALL_LEVELS;

  fn engine(points: usize) -> PortfolioEngine {
    PortfolioEngine::new(PortfolioEngineConfig {
      frontier: FrontierConfig {
        points,
        ..FrontierConfig::default()
      },
      tracking: RollingTrackingConfig {
        window: 112,
        ..RollingTrackingConfig::default()
      },
      ..PortfolioEngineConfig::default()
    })
  }

  #[test]
  fn engine_runs_frontier_pipeline() -> anyhow::Result<()> {
    let engine = engine(12);
    let series = textbook::simulated_series();
    let stats = series.statistics();

    let curve = engine.frontier_default(&stats, &RiskMeasure::Variance)?;
    assert_eq!(curve.len(), 12);
    let (lo, hi) = stats.return_range();
    assert_eq!(curve.targets()[0], lo);
    assert_relative_eq!(curve.targets()[11], hi, max_relative = 1e-12);

    let mid = 0.5 * (lo + hi);
    let curves = engine.frontier_by_alpha(&stats, &DEFAULT_SHORTFALL_LEVELS, &[mid])?;
    assert_eq!(curves.len(), DEFAULT_SHORTFALL_LEVELS.len());

    let benchmark = noisy_equal_weight_benchmark(&series, 3.0, 8888)?;
    let backtest = engine.rolling_tracking(&series, &benchmark)?;
    assert_eq!(backtest.len(), 8);
    Ok(())
  }

  #[test]
  fn engine_closed_form_and_allocations() -> anyhow::Result<()> {
    let engine: PortfolioEngine = PortfolioEngine::default();
    let stats = ReturnStatistics::from_moments(textbook::five_asset_mu(), textbook::five_asset_cov())?;

    let exact = engine.closed_form(&stats)?;
    let rp = engine.risk_parity(&stats)?;
    let set = engine.allocations(&stats)?;
    assert_relative_eq!(set.minimum_variance.volatility, exact.gmv_volatility(), max_relative = 1e-10);
    for (a, b) in set.risk_parity.weights.iter().zip(&rp.weights) {
      assert_relative_eq!(*a, *b, max_relative = 1e-12);
    }
    Ok(())
  }

  #[test]
  fn engine_rejects_sample_measures_without_returns() -> anyhow::Result<()> {
    let engine = engine(10);
    let stats = ReturnStatistics::from_moments(textbook::five_asset_mu(), textbook::five_asset_cov())?;

    assert!(matches!(
      engine.frontier_default(&stats, &RiskMeasure::MeanAbsoluteDeviation),
      Err(FrontierError::InvalidInput(_))
    ));
    Ok(())
  }
}
