//! # Benchmark Allocations
//!
//! $$
//! \mathbf w_{mv}=\frac{\Sigma^{-1}\iota}{\iota^\top\Sigma^{-1}\iota},\qquad
//! \mathbf w_{md}=\frac{\Sigma^{-1}\mathbf s}{\iota^\top\Sigma^{-1}\mathbf s}
//! $$
//!
//! Heuristic allocations compared against risk parity.

use nalgebra::DVector;
use ndarray::Array1;

use super::data::ReturnStatistics;
use super::data::to_dmatrix;
use super::risk_parity::RiskParityConfig;
use super::risk_parity::risk_contributions;
use super::risk_parity::solve_risk_parity;
use crate::error::FrontierError;
use crate::error::Result;

/// Weights with their moments and risk decomposition.
#[derive(Clone, Debug)]
pub struct Allocation {
  pub weights: Vec<f64>,
  pub expected_return: f64,
  pub volatility: f64,
  /// `w_i (Sigma w)_i`, summing to the portfolio variance.
  pub risk_contributions: Array1<f64>,
}

impl Allocation {
  /// Return, volatility and risk contributions of fixed weights.
  pub fn evaluate(stats: &ReturnStatistics, weights: Vec<f64>) -> Self {
    let w = Array1::from(weights.clone());
    let contributions = risk_contributions(stats.covariance(), &weights);
    Self {
      expected_return: w.dot(stats.mean()),
      volatility: contributions.sum().max(0.0).sqrt(),
      risk_contributions: contributions,
      weights,
    }
  }

  /// Contributions as fractions of the portfolio variance.
  pub fn risk_shares(&self) -> Array1<f64> {
    let total = self.risk_contributions.sum();
    if total > 0.0 {
      &self.risk_contributions / total
    } else {
      Array1::from_elem(self.risk_contributions.len(), f64::NAN)
    }
  }
}

/// `1/N` in every asset.
pub fn equal_weight(assets: usize) -> Vec<f64> {
  vec![1.0 / assets as f64; assets]
}

/// `Sigma^{-1} iota`, normalised to full investment.
pub fn minimum_variance_weights(stats: &ReturnStatistics) -> Result<Vec<f64>> {
  let iota = DVector::from_element(stats.assets(), 1.0);
  normalised_solve(stats, iota)
}

/// `Sigma^{-1} s` with `s` the asset volatilities, normalised to full investment.
pub fn maximum_diversification_weights(stats: &ReturnStatistics) -> Result<Vec<f64>> {
  let s = DVector::from_iterator(stats.assets(), stats.stdev().iter().copied());
  normalised_solve(stats, s)
}

fn normalised_solve(stats: &ReturnStatistics, rhs: DVector<f64>) -> Result<Vec<f64>> {
  let chol = to_dmatrix(stats.covariance())
    .cholesky()
    .ok_or_else(|| FrontierError::invalid("covariance is singular or not positive definite"))?;
  let x = chol.solve(&rhs);
  let total = x.sum();
  if !(total.abs() > 1e-300) {
    return Err(FrontierError::invalid("allocation weights cannot be normalised"));
  }
  Ok(x.iter().map(|v| v / total).collect())
}

/// The four allocations side by side.
#[derive(Clone, Debug)]
pub struct AllocationSet {
  pub equal_weight: Allocation,
  pub minimum_variance: Allocation,
  pub maximum_diversification: Allocation,
  pub risk_parity: Allocation,
}

impl AllocationSet {
  /// All four allocations for one statistics set.
  pub fn compute(stats: &ReturnStatistics, parity: &RiskParityConfig) -> Result<Self> {
    let rp = solve_risk_parity(stats.covariance(), parity)?;
    Ok(Self {
      equal_weight: Allocation::evaluate(stats, equal_weight(stats.assets())),
      minimum_variance: Allocation::evaluate(stats, minimum_variance_weights(stats)?),
      maximum_diversification: Allocation::evaluate(stats, maximum_diversification_weights(stats)?),
      risk_parity: Allocation::evaluate(stats, rp.weights),
    })
  }

  /// Allocations with their display names, in a fixed order.
  pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Allocation)> {
    [
      ("equal weight", &self.equal_weight),
      ("minimum variance", &self.minimum_variance),
      ("maximum diversification", &self.maximum_diversification),
      ("risk parity", &self.risk_parity),
    ]
    .into_iter()
  }
}
