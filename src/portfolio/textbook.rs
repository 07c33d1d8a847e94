//! # Textbook Inputs
//!
//! $$
//! \Sigma_{ij}=\sigma_i\sigma_j\rho_{ij}
//! $$
//!
//! The five-asset example used throughout: expected returns, volatilities and correlations
//! in percent per period.

use ndarray::Array1;
use ndarray::Array2;
use ndarray::array;

#[cfg(test)]
use super::data::ReturnSeries;
#[cfg(test)]
use super::data::simulate_returns;

/// Expected returns.
pub fn five_asset_mu() -> Array1<f64> {
  array![1.0, 3.0, 1.5, 6.0, 4.5]
}

/// Volatilities.
pub fn five_asset_stdev() -> Array1<f64> {
  array![5.0, 10.0, 7.5, 15.0, 11.0]
}

/// Correlation matrix.
pub fn five_asset_corr() -> Array2<f64> {
  array![
    [1.00, 0.25, 0.18, 0.10, 0.25],
    [0.25, 1.00, 0.36, 0.20, 0.20],
    [0.18, 0.36, 1.00, 0.25, 0.36],
    [0.10, 0.20, 0.25, 1.00, 0.45],
    [0.25, 0.20, 0.36, 0.45, 1.00],
  ]
}

/// Covariance `diag(s) C diag(s)`.
pub fn five_asset_cov() -> Array2<f64> {
  let s = five_asset_stdev();
  let corr = five_asset_corr();
  Array2::from_shape_fn((5, 5), |(i, j)| s[i] * s[j] * corr[[i, j]])
}

/// 120 monthly draws from the five-asset moments.
#[cfg(test)]
pub(crate) fn simulated_series() -> ReturnSeries {
  simulate_returns(&five_asset_mu(), &five_asset_cov(), 120, 9999).unwrap()
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;

  use super::*;
  use crate::portfolio::data::covariance_from_correlation;

  #[test]
  fn covariance_matches_correlation_helper() {
    let helper = covariance_from_correlation(&five_asset_stdev(), &five_asset_corr()).unwrap();
    for (a, b) in five_asset_cov().iter().zip(helper.iter()) {
      assert_relative_eq!(*a, *b, max_relative = 1e-15);
    }
  }
}
