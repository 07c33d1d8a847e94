//! # Risk Measures
//!
//! $$
//! \mathrm{ES}_\alpha(\mathbf w)=\min_{v}\Big\{-v+\frac{1}{\alpha T}\sum_{t=1}^T\big(v-\mathbf r_t^\top\mathbf w\big)^+\Big\}
//! $$
//!
//! Risk formulations of a long-only frontier. Each variant emits its auxiliary variables,
//! the objective that *is* the risk value and the constraints linking them to the weights.
//! Budget, return and sign constraints are appended by the caller.

use std::fmt::Display;

use ndarray::Array1;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use ndarray::Axis;

use super::data::ReturnStatistics;
use super::problem::PortfolioProblem;
use crate::error::FrontierError;
use crate::error::Result;

/// Supported risk measures.
#[derive(Clone, Debug, PartialEq)]
pub enum RiskMeasure {
  /// Portfolio variance `w' Sigma w`.
  Variance,
  /// Mean absolute deviation of the portfolio return around its mean.
  MeanAbsoluteDeviation,
  /// Expected shortfall (CVaR) at tail probability `alpha`.
  ExpectedShortfall { alpha: f64 },
  /// Downside second moment around the mean.
  Semivariance,
  /// Mean squared difference to a benchmark return series.
  TrackingError { benchmark: Array1<f64> },
}

impl RiskMeasure {
  /// Expected shortfall at tail probability `alpha`.
  pub fn expected_shortfall(alpha: f64) -> Self {
    Self::ExpectedShortfall { alpha }
  }

  /// Tracking error against a benchmark return series.
  pub fn tracking_error(benchmark: Array1<f64>) -> Self {
    Self::TrackingError { benchmark }
  }

  /// Check parameters against the statistics they will be formulated on.
  pub fn validate(&self, stats: &ReturnStatistics) -> Result<()> {
    match self {
      Self::Variance => Ok(()),
      Self::MeanAbsoluteDeviation | Self::Semivariance => stats.returns().map(|_| ()),
      Self::ExpectedShortfall { alpha } => {
        if !(alpha.is_finite() && *alpha > 0.0 && *alpha < 1.0) {
          return Err(FrontierError::invalid(format!(
            "shortfall level must lie in (0, 1), got {alpha}"
          )));
        }
        stats.returns().map(|_| ())
      }
      Self::TrackingError { benchmark } => {
        let periods = stats.returns()?.nrows();
        if benchmark.len() != periods {
          return Err(FrontierError::invalid(format!(
            "benchmark has {} periods, returns have {periods}",
            benchmark.len()
          )));
        }
        if benchmark.iter().any(|b| !b.is_finite()) {
          return Err(FrontierError::invalid("benchmark contains non-finite values"));
        }
        Ok(())
      }
    }
  }

  /// Measure-specific part of the optimization instance.
  pub fn formulate(&self, stats: &ReturnStatistics) -> Result<PortfolioProblem> {
    self.validate(stats)?;

    let problem = match self {
      Self::Variance => variance_problem(stats),
      Self::MeanAbsoluteDeviation => mad_problem(stats.centered_deviation()?.view()),
      Self::ExpectedShortfall { alpha } => shortfall_problem(stats.returns()?.view(), *alpha),
      Self::Semivariance => semivariance_problem(stats.centered_deviation()?.view()),
      Self::TrackingError { benchmark } => {
        tracking_error_problem(stats.returns()?.view(), benchmark.view())
      }
    };

    Ok(problem)
  }

  /// Convert a minimized objective into reporting units.
  ///
  /// Quadratic measures report their square root (standard deviation, semideviation,
  /// root-mean-square tracking error).
  pub fn display_risk(&self, objective: f64) -> f64 {
    match self {
      Self::Variance | Self::Semivariance | Self::TrackingError { .. } => objective.max(0.0).sqrt(),
      Self::MeanAbsoluteDeviation | Self::ExpectedShortfall { .. } => objective,
    }
  }

  /// Risk of holding each asset alone, in reporting units.
  pub fn asset_risks(&self, stats: &ReturnStatistics) -> Result<Array1<f64>> {
    self.validate(stats)?;

    match self {
      Self::Variance => Ok(stats.stdev()),
      Self::MeanAbsoluteDeviation => {
        let centered = stats.centered_deviation()?;
        Ok(centered.mapv(f64::abs).sum_axis(Axis(0)) / centered.nrows() as f64)
      }
      Self::ExpectedShortfall { alpha } => {
        let returns = stats.returns()?;
        Ok(returns.columns().into_iter().map(|col| tail_loss(col, *alpha)).collect())
      }
      Self::Semivariance => {
        let centered = stats.centered_deviation()?;
        let periods = centered.nrows() as f64;
        Ok(
          centered
            .columns()
            .into_iter()
            .map(|col| (col.iter().filter(|&&c| c < 0.0).map(|c| c * c).sum::<f64>() / periods).sqrt())
            .collect(),
        )
      }
      Self::TrackingError { benchmark } => {
        let returns = stats.returns()?;
        let periods = returns.nrows() as f64;
        Ok(
          returns
            .columns()
            .into_iter()
            .map(|col| {
              let ss: f64 = col.iter().zip(benchmark).map(|(r, b)| (b - r).powi(2)).sum();
              (ss / periods).sqrt()
            })
            .collect(),
        )
      }
    }
  }
}

impl Display for RiskMeasure {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      RiskMeasure::Variance => write!(f, "Variance"),
      RiskMeasure::MeanAbsoluteDeviation => write!(f, "Mean absolute deviation"),
      RiskMeasure::ExpectedShortfall { alpha } => write!(f, "Expected shortfall (alpha={alpha:.2})"),
      RiskMeasure::Semivariance => write!(f, "Semivariance"),
      RiskMeasure::TrackingError { .. } => write!(f, "Tracking error"),
    }
  }
}

fn variance_problem(stats: &ReturnStatistics) -> PortfolioProblem {
  let cov = stats.covariance();
  let n = stats.assets();
  let mut problem = PortfolioProblem::new(n);
  for i in 0..n {
    problem.add_quadratic(i, i, cov[[i, i]]);
    for j in (i + 1)..n {
      problem.add_quadratic(i, j, 2.0 * cov[[i, j]]);
    }
  }
  problem
}

/// `(R - mu)/T w = d`, minimize `|d|_1` through the epigraph `u >= |d|`.
fn mad_problem(centered: ArrayView2<'_, f64>) -> PortfolioProblem {
  let (periods, n) = centered.dim();
  let scale = 1.0 / periods as f64;
  let mut problem = PortfolioProblem::new(n);
  let d = problem.add_variables(periods);
  let u = problem.add_variables(periods);

  for (t, row) in centered.rows().into_iter().enumerate() {
    let (dt, ut) = (d.start + t, u.start + t);
    let mut coeffs = scaled_row(row, scale);
    coeffs.push((dt, -1.0));
    problem.add_equality(coeffs, 0.0);
    problem.add_at_least(vec![(ut, 1.0), (dt, -1.0)], 0.0);
    problem.add_at_least(vec![(ut, 1.0), (dt, 1.0)], 0.0);
    problem.add_linear(ut, 1.0);
  }
  problem
}

/// Rockafellar-Uryasev linearization: `R/T w - v/T + d >= 0`, `d >= 0`,
/// minimize `sum(d)/alpha - v`.
fn shortfall_problem(returns: ArrayView2<'_, f64>, alpha: f64) -> PortfolioProblem {
  let (periods, n) = returns.dim();
  let scale = 1.0 / periods as f64;
  let mut problem = PortfolioProblem::new(n);
  let d = problem.add_variables(periods);
  let var = problem.add_variables(1).start;

  for (t, row) in returns.rows().into_iter().enumerate() {
    let dt = d.start + t;
    let mut coeffs = scaled_row(row, scale);
    coeffs.push((var, -scale));
    coeffs.push((dt, 1.0));
    problem.add_at_least(coeffs, 0.0);
    problem.add_linear(dt, 1.0 / alpha);
  }
  problem.add_nonnegative(d);
  problem.add_linear(var, -1.0);
  problem
}

/// `(R - mu)/sqrt(T) w + d >= 0`, `d >= 0`, minimize `|d|_2^2`.
fn semivariance_problem(centered: ArrayView2<'_, f64>) -> PortfolioProblem {
  let (periods, n) = centered.dim();
  let scale = 1.0 / (periods as f64).sqrt();
  let mut problem = PortfolioProblem::new(n);
  let d = problem.add_variables(periods);

  for (t, row) in centered.rows().into_iter().enumerate() {
    let dt = d.start + t;
    let mut coeffs = scaled_row(row, scale);
    coeffs.push((dt, 1.0));
    problem.add_at_least(coeffs, 0.0);
    problem.add_quadratic(dt, dt, 1.0);
  }
  problem.add_nonnegative(d);
  problem
}

/// `b/sqrt(W) - R/sqrt(W) w = e` over a window of `W` periods, minimize `|e|_2^2`.
pub(crate) fn tracking_error_problem(
  returns: ArrayView2<'_, f64>,
  benchmark: ArrayView1<'_, f64>,
) -> PortfolioProblem {
  let (periods, n) = returns.dim();
  let scale = 1.0 / (periods as f64).sqrt();
  let mut problem = PortfolioProblem::new(n);
  let e = problem.add_variables(periods);

  for (t, row) in returns.rows().into_iter().enumerate() {
    let et = e.start + t;
    let mut coeffs = scaled_row(row, scale);
    coeffs.push((et, 1.0));
    problem.add_equality(coeffs, benchmark[t] * scale);
    problem.add_quadratic(et, et, 1.0);
  }
  problem
}

fn scaled_row(row: ArrayView1<'_, f64>, scale: f64) -> Vec<(usize, f64)> {
  row.iter().enumerate().map(|(i, &v)| (i, v * scale)).collect()
}

/// Mean loss over observations at or below the empirical `alpha`-quantile.
fn tail_loss(returns: ArrayView1<'_, f64>, alpha: f64) -> f64 {
  let mut sorted = returns.to_vec();
  sorted.sort_by(|a, b| a.total_cmp(b));

  let pos = alpha * (sorted.len() - 1) as f64;
  let lo = pos.floor() as usize;
  let hi = pos.ceil() as usize;
  let quantile = sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo]);

  let tail: Vec<f64> = sorted.iter().copied().filter(|&r| r <= quantile).collect();
  -tail.iter().sum::<f64>() / tail.len() as f64
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use approx::assert_relative_eq;
  use ndarray::Array2;
  use ndarray::array;

  use super::*;
  use crate::portfolio::data::ReturnSeries;
  use crate::portfolio::textbook;
  use crate::portfolio::solver::ClarabelSolver;
  use crate::portfolio::solver::ConicSolver;

  fn single_asset(values: &[f64]) -> ReturnStatistics {
    let returns = Array2::from_shape_vec((values.len(), 1), values.to_vec()).unwrap();
    ReturnSeries::new(returns).unwrap().statistics()
  }

  fn minimum(measure: &RiskMeasure, stats: &ReturnStatistics) -> f64 {
    let problem = measure.formulate(stats).unwrap().with_full_investment();
    ClarabelSolver::default().solve(&problem).unwrap().objective
  }

  #[test]
  fn variance_objective_is_quadratic_form() {
    let stats =
      ReturnStatistics::from_moments(textbook::five_asset_mu(), textbook::five_asset_cov()).unwrap();
    let problem = RiskMeasure::Variance.formulate(&stats).unwrap();
    let w = array![0.1, 0.2, 0.3, 0.25, 0.15];
    let expected = w.dot(&stats.covariance().dot(&w));
    assert_relative_eq!(problem.objective(w.as_slice().unwrap()), expected, max_relative = 1e-12);
  }

  #[test]
  fn mad_of_single_asset() {
    // deviations 0, 2, -2, 0
    let stats = single_asset(&[1.0, 3.0, -1.0, 1.0]);
    let measure = RiskMeasure::MeanAbsoluteDeviation;
    assert_abs_diff_eq!(minimum(&measure, &stats), 1.0, epsilon = 1e-6);
    assert_relative_eq!(measure.asset_risks(&stats).unwrap()[0], 1.0);
  }

  #[test]
  fn shortfall_linearization_matches_tail_mean() {
    let stats = single_asset(&[-5.0, -4.0, -3.0, -2.0, -1.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    let measure = RiskMeasure::expected_shortfall(0.2);
    assert_abs_diff_eq!(minimum(&measure, &stats), 4.5, epsilon = 1e-6);
    assert_relative_eq!(measure.asset_risks(&stats).unwrap()[0], 4.5);
  }

  #[test]
  fn semivariance_penalizes_downside_only() {
    let stats = single_asset(&[-2.0, 0.0, 2.0, 0.0]);
    let measure = RiskMeasure::Semivariance;
    let objective = minimum(&measure, &stats);
    assert_abs_diff_eq!(objective, 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(measure.display_risk(objective), 1.0, epsilon = 1e-6);
    assert_relative_eq!(measure.asset_risks(&stats).unwrap()[0], 1.0);
  }

  #[test]
  fn tracking_error_replicates_a_held_asset() {
    let series = textbook::simulated_series();
    let benchmark = series.values().column(2).to_owned();
    let stats = series.statistics();
    let problem = RiskMeasure::tracking_error(benchmark)
      .formulate(&stats)
      .unwrap()
      .with_full_investment()
      .with_long_only();

    let sol = ClarabelSolver::default().solve(&problem).unwrap();
    assert_abs_diff_eq!(sol.objective, 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(sol.x[2], 1.0, epsilon = 1e-4);
  }

  #[test]
  fn invalid_parameters_are_rejected() {
    let stats = textbook::simulated_series().statistics();
    for alpha in [0.0, 1.0, -0.1, f64::NAN] {
      assert!(matches!(
        RiskMeasure::expected_shortfall(alpha).formulate(&stats),
        Err(FrontierError::InvalidInput(_))
      ));
    }
    assert!(matches!(
      RiskMeasure::tracking_error(Array1::zeros(3)).formulate(&stats),
      Err(FrontierError::InvalidInput(_))
    ));

    let moments =
      ReturnStatistics::from_moments(textbook::five_asset_mu(), textbook::five_asset_cov()).unwrap();
    assert!(RiskMeasure::Variance.formulate(&moments).is_ok());
    assert!(RiskMeasure::MeanAbsoluteDeviation.formulate(&moments).is_err());
    assert!(RiskMeasure::Semivariance.asset_risks(&moments).is_err());
  }

  #[test]
  fn display_units() {
    assert_relative_eq!(RiskMeasure::Variance.display_risk(4.0), 2.0);
    assert_relative_eq!(RiskMeasure::expected_shortfall(0.05).display_risk(4.0), 4.0);
    assert_eq!(
      RiskMeasure::expected_shortfall(0.05).to_string(),
      "Expected shortfall (alpha=0.05)"
    );
  }
}
