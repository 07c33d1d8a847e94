//! # Risk Parity
//!
//! $$
//! \Sigma\mathbf w-\lambda\,\mathbf w^{-1}=\mathbf 0,\qquad \mathbf 1^\top\mathbf w=1
//! $$
//!
//! Equal risk contributions `w_i (Sigma w)_i = lambda`, found as a root of the augmented
//! system in `(w, lambda)` with Levenberg-Marquardt.

use impl_new_derive::ImplNew;
use levenberg_marquardt::LeastSquaresProblem;
use levenberg_marquardt::LevenbergMarquardt;
use nalgebra::DMatrix;
use nalgebra::DVector;
use nalgebra::Dyn;
use nalgebra::Owned;
use ndarray::Array1;
use ndarray::Array2;

use super::data::to_dmatrix;
use super::data::validate_covariance;
use crate::error::FrontierError;
use crate::error::Result;

/// What to do with a root that has short positions.
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
pub enum NegativeWeightPolicy {
  /// Return it as an unconstrained risk-parity solution.
  #[default]
  Accept,
  /// Report it as [`FrontierError::NonConvergence`].
  Reject,
}

#[derive(ImplNew, Clone, Copy, Debug)]
pub struct RiskParityConfig {
  /// Evaluation budget in units of `(N + 1)` residual evaluations.
  pub patience: usize,
  /// Residual norm accepted as a root, relative to `max(1, max |Sigma_ij|)`.
  pub tolerance: f64,
  pub negative_weights: NegativeWeightPolicy,
}

impl Default for RiskParityConfig {
  fn default() -> Self {
    Self {
      patience: 200,
      tolerance: 1e-8,
      negative_weights: NegativeWeightPolicy::Accept,
    }
  }
}

#[derive(Clone, Debug)]
pub struct RiskParitySolution {
  pub weights: Vec<f64>,
  /// Common per-asset contribution `lambda`.
  pub contribution: f64,
  pub residual_norm: f64,
  pub evaluations: usize,
}

impl RiskParitySolution {
  /// Per-asset contributions of the solved weights.
  pub fn risk_contributions(&self, covariance: &Array2<f64>) -> Array1<f64> {
    risk_contributions(covariance, &self.weights)
  }
}

/// `w_i (Sigma w)_i` for every asset; they sum to the portfolio variance.
pub fn risk_contributions(covariance: &Array2<f64>, weights: &[f64]) -> Array1<f64> {
  let w = Array1::from(weights.to_vec());
  &w * &covariance.dot(&w)
}

/// `[Sigma w - lambda / w ; sum(w) - 1]`.
pub fn risk_parity_residual(covariance: &Array2<f64>, weights: &[f64], contribution: f64) -> Array1<f64> {
  let n = weights.len();
  let w = Array1::from(weights.to_vec());
  let sigma_w = covariance.dot(&w);

  let mut residual = Array1::zeros(n + 1);
  for i in 0..n {
    residual[i] = sigma_w[i] - contribution / w[i];
  }
  residual[n] = w.sum() - 1.0;
  residual
}

#[derive(Clone)]
struct RiskParityProblem {
  cov: DMatrix<f64>,
  /// `(w_1, .., w_N, lambda)`
  params: DVector<f64>,
}

impl LeastSquaresProblem<f64, Dyn, Dyn> for RiskParityProblem {
  type JacobianStorage = Owned<f64, Dyn, Dyn>;
  type ParameterStorage = Owned<f64, Dyn>;
  type ResidualStorage = Owned<f64, Dyn>;

  fn set_params(&mut self, params: &DVector<f64>) {
    self.params.copy_from(params);
  }

  fn params(&self) -> DVector<f64> {
    self.params.clone()
  }

  fn residuals(&self) -> Option<DVector<f64>> {
    let n = self.cov.nrows();
    let w = self.params.rows(0, n);
    let lambda = self.params[n];
    if w.iter().any(|&wi| wi == 0.0) {
      return None;
    }

    let sigma_w = &self.cov * w;
    let mut r = DVector::zeros(n + 1);
    for i in 0..n {
      r[i] = sigma_w[i] - lambda / w[i];
    }
    r[n] = w.sum() - 1.0;
    Some(r)
  }

  fn jacobian(&self) -> Option<DMatrix<f64>> {
    let n = self.cov.nrows();
    let lambda = self.params[n];
    let mut jac = DMatrix::zeros(n + 1, n + 1);

    for i in 0..n {
      let wi = self.params[i];
      if wi == 0.0 {
        return None;
      }
      for j in 0..n {
        jac[(i, j)] = self.cov[(i, j)];
      }
      jac[(i, i)] += lambda / (wi * wi);
      jac[(i, n)] = -1.0 / wi;
      jac[(n, i)] = 1.0;
    }
    Some(jac)
  }
}

/// Solve for equal risk contributions, starting from `1/N` weights and `lambda = 0`.
pub fn solve_risk_parity(covariance: &Array2<f64>, config: &RiskParityConfig) -> Result<RiskParitySolution> {
  validate_covariance(covariance)?;
  if config.patience == 0 {
    return Err(FrontierError::invalid("risk parity patience must be positive"));
  }
  if !(config.tolerance.is_finite() && config.tolerance > 0.0) {
    return Err(FrontierError::invalid(format!(
      "risk parity tolerance must be positive, got {}",
      config.tolerance
    )));
  }

  let n = covariance.nrows();
  let mut x0 = DVector::from_element(n + 1, 1.0 / n as f64);
  x0[n] = 0.0;
  let problem = RiskParityProblem {
    cov: to_dmatrix(covariance),
    params: x0,
  };

  let (solved, report) = LevenbergMarquardt::new()
    .with_patience(config.patience)
    .minimize(problem);
  tracing::debug!(
    termination = ?report.termination,
    evaluations = report.number_of_evaluations,
    "risk parity root finder stopped"
  );

  let weights: Vec<f64> = solved.params.rows(0, n).iter().copied().collect();
  let contribution = solved.params[n];
  let residual_norm = if weights.iter().all(|w| w.is_finite() && *w != 0.0) && contribution.is_finite() {
    risk_parity_residual(covariance, &weights, contribution)
      .mapv(|r| r * r)
      .sum()
      .sqrt()
  } else {
    f64::INFINITY
  };

  let scale = covariance.iter().fold(1.0_f64, |m, v| m.max(v.abs()));
  let solution = RiskParitySolution {
    weights,
    contribution,
    residual_norm,
    evaluations: report.number_of_evaluations,
  };
  accept(
    solution,
    report.termination.was_successful(),
    config.tolerance * scale,
    config.negative_weights,
    &report.termination,
  )
}

fn accept(
  solution: RiskParitySolution,
  converged: bool,
  threshold: f64,
  policy: NegativeWeightPolicy,
  termination: &impl std::fmt::Debug,
) -> Result<RiskParitySolution> {
  let fail = |reason: String| FrontierError::NonConvergence {
    evaluations: solution.evaluations,
    residual: solution.residual_norm,
    reason,
  };

  if !converged {
    return Err(fail(format!("{termination:?}")));
  }
  if !(solution.residual_norm <= threshold) {
    return Err(fail(format!("residual above {threshold:.2e} ({termination:?})")));
  }
  if policy == NegativeWeightPolicy::Reject && solution.weights.iter().any(|&w| w < -1e-12) {
    return Err(fail("root has negative weights".into()));
  }
  Ok(solution)
}
