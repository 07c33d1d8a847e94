//! # Rolling Tracking
//!
//! $$
//! \mathbf w_s=\arg\min_{\mathbf w}\ \frac1W\sum_{t=s}^{s+W-1}\big(b_t-\mathbf r_t^\top\mathbf w\big)^2,
//! \qquad \hat r_{s+W}=\mathbf r_{s+W}^\top\mathbf w_s
//! $$
//!
//! Index replication backtest: refit the minimum tracking-error portfolio on each window and
//! hold it for one period out of sample.

use impl_new_derive::ImplNew;
use ndarray::Array1;
use ndarray::s;
use rayon::prelude::*;

use super::data::ReturnSeries;
use super::measure::tracking_error_problem;
use super::solver::ConicSolver;
use crate::error::FrontierError;
use crate::error::Result;

#[derive(ImplNew, Clone, Copy, Debug)]
pub struct RollingTrackingConfig {
  /// Estimation window length in periods.
  pub window: usize,
  pub long_only: bool,
  /// Solve windows on the rayon pool.
  pub parallel: bool,
}

impl Default for RollingTrackingConfig {
  fn default() -> Self {
    Self {
      window: 96,
      long_only: true,
      parallel: false,
    }
  }
}

/// One refit and its out-of-sample period.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackingWindow {
  pub start: usize,
  /// Period the fitted weights are held over, `start + window`.
  pub holding_period: usize,
  /// `None` when the window could not be solved.
  pub realised_return: Option<f64>,
  pub benchmark_return: f64,
  pub weights: Option<Vec<f64>>,
  /// Minimized in-sample mean squared tracking difference.
  pub in_sample: Option<f64>,
  /// Solved to the solver's relaxed tolerances only.
  pub inaccurate: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WindowFailure {
  pub start: usize,
  pub error: FrontierError,
}

#[derive(Clone, Debug)]
pub struct TrackingBacktest {
  window: usize,
  windows: Vec<TrackingWindow>,
  failures: Vec<WindowFailure>,
}

impl TrackingBacktest {
  /// Estimation window length.
  pub fn window(&self) -> usize {
    self.window
  }

  /// Every window in start order, gaps included.
  pub fn windows(&self) -> &[TrackingWindow] {
    &self.windows
  }

  /// Failed windows with their errors.
  pub fn failures(&self) -> &[WindowFailure] {
    &self.failures
  }

  /// Starts of windows solved to reduced accuracy.
  pub fn inaccurate(&self) -> Vec<usize> {
    self
      .windows
      .iter()
      .filter(|w| w.inaccurate)
      .map(|w| w.start)
      .collect()
  }

  /// Number of windows.
  pub fn len(&self) -> usize {
    self.windows.len()
  }

  /// Whether there are no windows.
  pub fn is_empty(&self) -> bool {
    self.windows.is_empty()
  }

  /// One-period-ahead portfolio returns, `NaN` at gaps.
  pub fn realised_returns(&self) -> Vec<f64> {
    self
      .windows
      .iter()
      .map(|w| w.realised_return.unwrap_or(f64::NAN))
      .collect()
  }

  /// Benchmark return over each holding period.
  pub fn benchmark_returns(&self) -> Vec<f64> {
    self.windows.iter().map(|w| w.benchmark_return).collect()
  }

  /// Realised minus benchmark, `NaN` at gaps.
  pub fn active_returns(&self) -> Vec<f64> {
    self
      .windows
      .iter()
      .map(|w| w.realised_return.map_or(f64::NAN, |r| r - w.benchmark_return))
      .collect()
  }

  /// Population standard deviation of the active returns over solved windows.
  pub fn realised_tracking_error(&self) -> Option<f64> {
    let active: Vec<f64> = self
      .active_returns()
      .into_iter()
      .filter(|a| !a.is_nan())
      .collect();
    if active.is_empty() {
      return None;
    }

    let n = active.len() as f64;
    let mean = active.iter().sum::<f64>() / n;
    Some((active.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / n).sqrt())
  }
}

/// Refit over every window `[s, s + W)` with `s + W < T` and hold for period `s + W`.
pub fn rolling_tracking<S: ConicSolver>(
  series: &ReturnSeries,
  benchmark: &Array1<f64>,
  solver: &S,
  config: &RollingTrackingConfig,
) -> Result<TrackingBacktest> {
  let periods = series.periods();
  let w = config.window;
  if benchmark.len() != periods {
    return Err(FrontierError::invalid(format!(
      "benchmark has {} periods, returns have {periods}",
      benchmark.len()
    )));
  }
  if benchmark.iter().any(|b| !b.is_finite()) {
    return Err(FrontierError::invalid("benchmark returns must be finite"));
  }
  if w == 0 || w >= periods {
    return Err(FrontierError::invalid(format!(
      "window {w} must lie in [1, {periods}) for {periods} periods"
    )));
  }

  let solve = |start: usize| -> (usize, Result<TrackingWindow>) {
    (start, solve_window(series, benchmark, solver, config, start))
  };
  let starts = 0..periods - w;
  let outcomes: Vec<(usize, Result<TrackingWindow>)> = if config.parallel {
    starts.into_par_iter().map(solve).collect()
  } else {
    starts.map(solve).collect()
  };

  let mut windows = Vec::with_capacity(outcomes.len());
  let mut failures = Vec::new();
  for (start, outcome) in outcomes {
    match outcome {
      Ok(window) => windows.push(window),
      Err(error) if error.is_point_failure() => {
        tracing::warn!(start, error = %error, "recording tracking gap");
        windows.push(TrackingWindow {
          start,
          holding_period: start + w,
          realised_return: None,
          benchmark_return: benchmark[start + w],
          weights: None,
          in_sample: None,
          inaccurate: false,
        });
        failures.push(WindowFailure { start, error });
      }
      Err(error) => return Err(error),
    }
  }

  tracing::info!(
    window = w,
    windows = windows.len(),
    failures = failures.len(),
    "rolling tracking finished"
  );
  Ok(TrackingBacktest {
    window: w,
    windows,
    failures,
  })
}

fn solve_window<S: ConicSolver>(
  series: &ReturnSeries,
  benchmark: &Array1<f64>,
  solver: &S,
  config: &RollingTrackingConfig,
  start: usize,
) -> Result<TrackingWindow> {
  let w = config.window;
  let holding_period = start + w;
  let problem = tracking_error_problem(
    series.window(start, w),
    benchmark.slice(s![start..holding_period]),
  )
  .with_full_investment();
  let problem = if config.long_only {
    problem.with_long_only()
  } else {
    problem
  };

  let solution = solver.solve(&problem)?;
  let weights = solution.weights(&problem);
  let realised = series
    .period(holding_period)
    .iter()
    .zip(&weights)
    .map(|(r, w)| r * w)
    .sum::<f64>();
  if solution.inaccurate {
    tracing::warn!(start, "tracking window solved to reduced accuracy");
  }
  tracing::debug!(start, realised, in_sample = solution.objective, "solved tracking window");

  Ok(TrackingWindow {
    start,
    holding_period,
    realised_return: Some(realised),
    benchmark_return: benchmark[holding_period],
    weights: Some(weights),
    in_sample: Some(solution.objective),
    inaccurate: solution.inaccurate,
  })
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::Axis;
  use tracing_test::traced_test;

  use super::*;
  use crate::portfolio::data::noisy_equal_weight_benchmark;
  use crate::portfolio::textbook;
  use crate::portfolio::problem::PortfolioProblem;
  use crate::portfolio::solver::ClarabelSolver;
  use crate::portfolio::solver::ProblemSolution;

  #[test]
  fn replicable_benchmark_is_tracked_exactly() -> anyhow::Result<()> {
    let series = textbook::simulated_series();
    let benchmark = series.values().mean_axis(Axis(1)).unwrap();
    let solver = ClarabelSolver::default();
    let config = RollingTrackingConfig {
      window: 100,
      ..RollingTrackingConfig::default()
    };
    let bt = rolling_tracking(&series, &benchmark, &solver, &config)?;

    assert_eq!(bt.len(), 20);
    assert!(bt.failures().is_empty());
    assert_eq!(bt.windows()[0].holding_period, 100);
    for w in bt.windows() {
      for &wi in w.weights.as_ref().unwrap() {
        assert_abs_diff_eq!(wi, 0.2, epsilon = 1e-3);
      }
    }
    for a in bt.active_returns() {
      assert_abs_diff_eq!(a, 0.0, epsilon = 1e-2);
    }
    assert!(bt.realised_tracking_error().unwrap() < 1e-2);
    Ok(())
  }

  #[traced_test]
  #[test]
  fn noisy_index_backtest() -> anyhow::Result<()> {
    let series = textbook::simulated_series();
    let benchmark = noisy_equal_weight_benchmark(&series, 3.0, 8888)?;
    let solver = ClarabelSolver::default();
    let bt = rolling_tracking(&series, &benchmark, &solver, &RollingTrackingConfig::default())?;

    assert_eq!(bt.len(), 24);
    assert_eq!(bt.benchmark_returns()[0], benchmark[96]);
    for w in bt.windows() {
      let weights = w.weights.as_ref().unwrap();
      assert_abs_diff_eq!(weights.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
      assert!(weights.iter().all(|&x| x >= -1e-6));
      assert!(w.in_sample.unwrap() >= 0.0);
    }
    assert!(bt.realised_tracking_error().unwrap() > 0.0);
    assert!(logs_contain("rolling tracking finished"));
    Ok(())
  }

  #[test]
  fn parallel_windows_match_sequential() -> anyhow::Result<()> {
    let series = textbook::simulated_series();
    let benchmark = noisy_equal_weight_benchmark(&series, 3.0, 8888)?;
    let solver = ClarabelSolver::default();
    let config = RollingTrackingConfig {
      window: 110,
      ..RollingTrackingConfig::default()
    };
    let a = rolling_tracking(&series, &benchmark, &solver, &config)?;
    let b = rolling_tracking(
      &series,
      &benchmark,
      &solver,
      &RollingTrackingConfig {
        parallel: true,
        ..config
      },
    )?;

    assert_eq!(a.windows(), b.windows());
    Ok(())
  }

  struct RelaxedSolver(ClarabelSolver);

  impl ConicSolver for RelaxedSolver {
    fn solve(&self, problem: &PortfolioProblem) -> Result<ProblemSolution> {
      let mut solution = self.0.solve(problem)?;
      solution.inaccurate = true;
      Ok(solution)
    }
  }

  #[test]
  fn reduced_accuracy_windows_are_flagged() -> anyhow::Result<()> {
    let series = textbook::simulated_series();
    let benchmark = noisy_equal_weight_benchmark(&series, 3.0, 8888)?;
    let config = RollingTrackingConfig {
      window: 116,
      ..RollingTrackingConfig::default()
    };

    let exact = rolling_tracking(&series, &benchmark, &ClarabelSolver::default(), &config)?;
    assert!(exact.inaccurate().is_empty());

    let relaxed = rolling_tracking(&series, &benchmark, &RelaxedSolver(ClarabelSolver::default()), &config)?;
    assert!(relaxed.failures().is_empty());
    assert_eq!(relaxed.inaccurate(), vec![0, 1, 2, 3]);
    assert!(relaxed.windows().iter().all(|w| w.realised_return.is_some()));
    Ok(())
  }

  #[test]
  fn invalid_setup_is_rejected() {
    let series = textbook::simulated_series();
    let solver = ClarabelSolver::default();
    let benchmark = Array1::zeros(series.periods());
    let window = |window| RollingTrackingConfig {
      window,
      ..RollingTrackingConfig::default()
    };

    for w in [0, 120, 200] {
      assert!(matches!(
        rolling_tracking(&series, &benchmark, &solver, &window(w)),
        Err(FrontierError::InvalidInput(_))
      ));
    }
    assert!(matches!(
      rolling_tracking(&series, &Array1::zeros(10), &solver, &window(5)),
      Err(FrontierError::InvalidInput(_))
    ));
  }

  #[test]
  fn summary_skips_gaps() {
    let window = |start, realised: Option<f64>, benchmark_return| TrackingWindow {
      start,
      holding_period: start + 2,
      realised_return: realised,
      benchmark_return,
      weights: None,
      in_sample: None,
      inaccurate: false,
    };
    let bt = TrackingBacktest {
      window: 2,
      windows: vec![window(0, Some(1.0), 0.0), window(1, None, 0.5), window(2, Some(2.0), 3.0)],
      failures: vec![WindowFailure {
        start: 1,
        error: FrontierError::SolverFailure("stalled".into()),
      }],
    };

    let active = bt.active_returns();
    assert_eq!(active[0], 1.0);
    assert!(active[1].is_nan());
    assert_eq!(active[2], -1.0);
    assert_abs_diff_eq!(bt.realised_tracking_error().unwrap(), 1.0, epsilon = 1e-12);
  }
}
