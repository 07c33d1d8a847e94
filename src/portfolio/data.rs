//! # Portfolio Data
//!
//! $$
//! \bar{\mathbf r}=\frac1T\sum_{t=1}^T \mathbf r_t,\qquad
//! \Sigma=\frac1T (R-\mathbf 1\bar{\mathbf r}^\top)^\top(R-\mathbf 1\bar{\mathbf r}^\top)
//! $$
//!
//! Return panels, their moment statistics and helpers to construct inputs.

use nalgebra::DMatrix;
use nalgebra::DVector;
use nalgebra::SymmetricEigen;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use ndarray::Axis;
use ndarray::s;
use ndarray_rand::RandomExt;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::Normal;
use rand_distr::StandardNormal;

use crate::error::FrontierError;
use crate::error::Result;

const SYMMETRY_TOL: f64 = 1e-9;
/// Smallest eigenvalue accepted, relative to the largest absolute entry.
const PSD_TOL: f64 = 1e-10;

/// Historical percentage returns, `T` periods (rows) by `N` assets (columns).
#[derive(Clone, Debug)]
pub struct ReturnSeries {
  returns: Array2<f64>,
}

impl ReturnSeries {
  /// Wrap a `T x N` panel. Requires `T >= 2`, `N >= 1` and finite entries.
  pub fn new(returns: Array2<f64>) -> Result<Self> {
    let (periods, assets) = returns.dim();
    if assets == 0 {
      return Err(FrontierError::invalid("return panel has no assets"));
    }
    if periods < 2 {
      return Err(FrontierError::invalid(format!(
        "return panel needs at least 2 periods, got {periods}"
      )));
    }
    if returns.iter().any(|r| !r.is_finite()) {
      return Err(FrontierError::invalid("return panel contains non-finite values"));
    }

    Ok(Self { returns })
  }

  /// Build a panel from row-major period records.
  pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
    let assets = rows.first().map(|r| r.len()).unwrap_or(0);
    if rows.iter().any(|r| r.len() != assets) {
      return Err(FrontierError::invalid("ragged return rows"));
    }

    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    let returns = Array2::from_shape_vec((rows.len(), assets), flat)
      .map_err(|e| FrontierError::invalid(e.to_string()))?;
    Self::new(returns)
  }

  /// Number of periods `T`.
  pub fn periods(&self) -> usize {
    self.returns.nrows()
  }

  /// Number of assets `N`.
  pub fn assets(&self) -> usize {
    self.returns.ncols()
  }

  /// The raw `T x N` panel.
  pub fn values(&self) -> &Array2<f64> {
    &self.returns
  }

  /// Returns of all assets in period `t`.
  pub fn period(&self, t: usize) -> ArrayView1<'_, f64> {
    self.returns.row(t)
  }

  /// `len` consecutive periods starting at `start`.
  pub fn window(&self, start: usize, len: usize) -> ArrayView2<'_, f64> {
    self.returns.slice(s![start..start + len, ..])
  }

  /// Sample moments of the panel.
  pub fn statistics(&self) -> ReturnStatistics {
    ReturnStatistics::from_series(self)
  }
}

#[derive(Clone, Debug)]
struct Sample {
  returns: Array2<f64>,
  centered: Array2<f64>,
}

/// Mean, population covariance and centered deviations of a return sample.
///
/// Centered deviations are stored unscaled (`R - mu`); each risk measure applies its own
/// `1/T` or `1/sqrt(T)` factor.
#[derive(Clone, Debug)]
pub struct ReturnStatistics {
  mean: Array1<f64>,
  covariance: Array2<f64>,
  sample: Option<Sample>,
}

impl ReturnStatistics {
  /// Sample mean, population covariance and centered deviations.
  pub fn from_series(series: &ReturnSeries) -> Self {
    let returns = series.values().clone();
    let periods = returns.nrows() as f64;
    let mean = returns.sum_axis(Axis(0)) / periods;
    let centered = &returns - &mean;
    let covariance = centered.t().dot(&centered) / periods;

    Self {
      mean,
      covariance,
      sample: Some(Sample { returns, centered }),
    }
  }

  /// Statistics given directly as moments, without a return sample.
  pub fn from_moments(mean: Array1<f64>, covariance: Array2<f64>) -> Result<Self> {
    let n = mean.len();
    if n == 0 {
      return Err(FrontierError::invalid("empty asset set"));
    }
    if covariance.dim() != (n, n) {
      return Err(FrontierError::invalid(format!(
        "covariance is {:?}, expected ({n}, {n})",
        covariance.dim()
      )));
    }
    if mean.iter().any(|v| !v.is_finite()) {
      return Err(FrontierError::invalid("expected returns contain non-finite values"));
    }
    validate_covariance(&covariance)?;

    Ok(Self {
      mean,
      covariance,
      sample: None,
    })
  }

  /// Number of assets `N`.
  pub fn assets(&self) -> usize {
    self.mean.len()
  }

  /// Number of periods in the underlying sample, if there is one.
  pub fn periods(&self) -> Option<usize> {
    self.sample.as_ref().map(|s| s.returns.nrows())
  }

  /// Expected returns.
  pub fn mean(&self) -> &Array1<f64> {
    &self.mean
  }

  /// Covariance matrix.
  pub fn covariance(&self) -> &Array2<f64> {
    &self.covariance
  }

  /// Asset standard deviations, `sqrt(diag(Sigma))`.
  pub fn stdev(&self) -> Array1<f64> {
    self.covariance.diag().mapv(|v| v.max(0.0).sqrt())
  }

  /// Return sample; `InvalidInput` for moments-only statistics.
  pub fn returns(&self) -> Result<&Array2<f64>> {
    self
      .sample
      .as_ref()
      .map(|s| &s.returns)
      .ok_or_else(|| FrontierError::invalid("risk measure needs a return sample, got moments only"))
  }

  /// Unscaled deviations `R - mu`; `InvalidInput` for moments-only statistics.
  pub fn centered_deviation(&self) -> Result<&Array2<f64>> {
    self
      .sample
      .as_ref()
      .map(|s| &s.centered)
      .ok_or_else(|| FrontierError::invalid("risk measure needs a return sample, got moments only"))
  }

  /// Lowest and highest asset mean: the attainable long-only return range.
  pub fn return_range(&self) -> (f64, f64) {
    self
      .mean
      .iter()
      .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &m| (lo.min(m), hi.max(m)))
  }
}

/// Square, finite, symmetric and positive semi-definite.
pub(crate) fn validate_covariance(covariance: &Array2<f64>) -> Result<()> {
  let (rows, cols) = covariance.dim();
  if rows == 0 || rows != cols {
    return Err(FrontierError::invalid(format!(
      "covariance must be square and non-empty, got {rows}x{cols}"
    )));
  }
  if covariance.iter().any(|v| !v.is_finite()) {
    return Err(FrontierError::invalid("covariance contains non-finite values"));
  }

  let scale = covariance.iter().fold(1.0_f64, |m, v| m.max(v.abs()));
  for i in 0..rows {
    if covariance[[i, i]] < 0.0 {
      return Err(FrontierError::invalid(format!("negative variance for asset {i}")));
    }
    for j in (i + 1)..rows {
      if (covariance[[i, j]] - covariance[[j, i]]).abs() > SYMMETRY_TOL * scale {
        return Err(FrontierError::invalid("covariance is not symmetric"));
      }
    }
  }

  let min_eigenvalue = SymmetricEigen::new(to_dmatrix(covariance)).eigenvalues.min();
  if min_eigenvalue < -PSD_TOL * scale {
    return Err(FrontierError::invalid(format!(
      "covariance is not positive semi-definite, smallest eigenvalue {min_eigenvalue:.3e}"
    )));
  }
  Ok(())
}

/// Build a covariance matrix `diag(s) C diag(s)` from volatilities and correlations.
pub fn covariance_from_correlation(stdev: &Array1<f64>, corr: &Array2<f64>) -> Result<Array2<f64>> {
  let n = stdev.len();
  if corr.dim() != (n, n) {
    return Err(FrontierError::invalid(format!(
      "correlation is {:?}, expected ({n}, {n})",
      corr.dim()
    )));
  }
  if stdev.iter().any(|s| !s.is_finite() || *s < 0.0) {
    return Err(FrontierError::invalid("volatilities must be finite and non-negative"));
  }
  for i in 0..n {
    if (corr[[i, i]] - 1.0).abs() > SYMMETRY_TOL {
      return Err(FrontierError::invalid("correlation diagonal must be one"));
    }
  }
  if corr.iter().any(|c| !c.is_finite() || c.abs() > 1.0) {
    return Err(FrontierError::invalid("correlations must lie in [-1, 1]"));
  }

  Ok(Array2::from_shape_fn((n, n), |(i, j)| stdev[i] * stdev[j] * corr[[i, j]]))
}

/// Draw a seeded multivariate normal panel with the given moments.
pub fn simulate_returns(
  mean: &Array1<f64>,
  covariance: &Array2<f64>,
  periods: usize,
  seed: u64,
) -> Result<ReturnSeries> {
  ReturnStatistics::from_moments(mean.clone(), covariance.clone())?;
  let n = mean.len();
  let chol = to_dmatrix(covariance)
    .cholesky()
    .ok_or_else(|| FrontierError::invalid("covariance is not positive definite"))?;
  let l = chol.l();
  let l = Array2::from_shape_fn((n, n), |(i, j)| l[(i, j)]);

  let mut rng = StdRng::seed_from_u64(seed);
  let z = Array2::<f64>::random_using((periods, n), StandardNormal, &mut rng);
  ReturnSeries::new(z.dot(&l.t()) + mean)
}

/// Equally weighted portfolio return plus Gaussian noise: a synthetic index to track.
pub fn noisy_equal_weight_benchmark(
  series: &ReturnSeries,
  noise_scale: f64,
  seed: u64,
) -> Result<Array1<f64>> {
  let noise = Normal::new(0.0, noise_scale)
    .map_err(|e| FrontierError::invalid(format!("noise scale {noise_scale}: {e}")))?;
  let mut rng = StdRng::seed_from_u64(seed);
  let eps = Array1::<f64>::random_using(series.periods(), noise, &mut rng);
  let equal_weight = series.values().sum_axis(Axis(1)) / series.assets() as f64;

  Ok(equal_weight + eps)
}

pub(crate) fn to_dmatrix(a: &Array2<f64>) -> DMatrix<f64> {
  DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

pub(crate) fn to_dvector(a: &Array1<f64>) -> DVector<f64> {
  DVector::from_iterator(a.len(), a.iter().copied())
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use approx::assert_relative_eq;
  use ndarray::array;

  use super::*;
  use crate::portfolio::textbook;

  #[test]
  fn statistics_use_population_convention() {
    let series = ReturnSeries::from_rows(&[
      vec![1.0, 2.0],
      vec![3.0, -2.0],
      vec![-1.0, 0.0],
      vec![1.0, 4.0],
    ])
    .unwrap();
    let stats = series.statistics();

    assert_relative_eq!(stats.mean()[0], 1.0);
    assert_relative_eq!(stats.mean()[1], 1.0);
    // deviations col 0: 0, 2, -2, 0 -> 8 / 4
    assert_relative_eq!(stats.covariance()[[0, 0]], 2.0);
    assert_relative_eq!(stats.covariance()[[0, 1]], stats.covariance()[[1, 0]]);
    assert_eq!(stats.periods(), Some(4));
  }

  #[test]
  fn centered_columns_sum_to_zero() {
    let stats = textbook::simulated_series().statistics();
    let centered = stats.centered_deviation().unwrap();
    for col in centered.columns() {
      assert_abs_diff_eq!(col.sum(), 0.0, epsilon = 1e-9);
    }

    let gram = centered.t().dot(centered) / stats.periods().unwrap() as f64;
    for (a, b) in gram.iter().zip(stats.covariance().iter()) {
      assert_relative_eq!(*a, *b, max_relative = 1e-12);
    }
  }

  #[test]
  fn degenerate_panels_are_rejected() {
    assert!(matches!(
      ReturnSeries::from_rows(&[vec![1.0, 2.0]]),
      Err(FrontierError::InvalidInput(_))
    ));
    assert!(matches!(
      ReturnSeries::new(Array2::zeros((5, 0))),
      Err(FrontierError::InvalidInput(_))
    ));
    assert!(ReturnSeries::from_rows(&[vec![1.0, f64::NAN], vec![0.0, 0.0]]).is_err());
    assert!(ReturnSeries::from_rows(&[vec![1.0, 2.0], vec![0.0]]).is_err());
  }

  #[test]
  fn moments_only_statistics_have_no_sample() {
    let stats =
      ReturnStatistics::from_moments(textbook::five_asset_mu(), textbook::five_asset_cov()).unwrap();
    assert!(stats.periods().is_none());
    assert!(matches!(stats.returns(), Err(FrontierError::InvalidInput(_))));
    assert_eq!(stats.return_range(), (1.0, 6.0));
    assert_relative_eq!(stats.stdev()[3], 15.0, max_relative = 1e-12);
  }

  #[test]
  fn moments_must_be_square_and_symmetric() {
    let mu = array![1.0, 2.0];
    assert!(ReturnStatistics::from_moments(mu.clone(), Array2::eye(3)).is_err());
    assert!(ReturnStatistics::from_moments(mu.clone(), array![[1.0, 0.5], [0.1, 1.0]]).is_err());
    assert!(ReturnStatistics::from_moments(Array1::zeros(0), Array2::zeros((0, 0))).is_err());
    assert!(ReturnStatistics::from_moments(mu, array![[1.0, 0.5], [0.5, 1.0]]).is_ok());
  }

  #[test]
  fn indefinite_covariance_is_rejected() {
    let mu = array![1.0, 2.0, 3.0];
    // eigenvalues 3, 1, -1
    let indefinite = array![[1.0, 2.0, 0.0], [2.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
    match ReturnStatistics::from_moments(mu.clone(), indefinite) {
      Err(FrontierError::InvalidInput(msg)) => assert!(msg.contains("positive semi-definite")),
      other => panic!("unexpected {other:?}"),
    }

    // rank-deficient but PSD: two perfectly correlated assets
    let singular = array![[1.0, 1.0, 0.0], [1.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
    assert!(ReturnStatistics::from_moments(mu, singular).is_ok());

    let corr = array![[1.0, 0.9, -0.9], [0.9, 1.0, 0.9], [-0.9, 0.9, 1.0]];
    let cov = covariance_from_correlation(&array![0.1, 0.2, 0.3], &corr).unwrap();
    assert!(matches!(
      ReturnStatistics::from_moments(array![1.0, 2.0, 3.0], cov),
      Err(FrontierError::InvalidInput(_))
    ));
  }

  #[test]
  fn covariance_scales_correlation() {
    let cov = covariance_from_correlation(&array![0.2, 0.3], &array![[1.0, 0.5], [0.5, 1.0]]).unwrap();
    assert_relative_eq!(cov[[0, 0]], 0.04, max_relative = 1e-12);
    assert_relative_eq!(cov[[1, 1]], 0.09, max_relative = 1e-12);
    assert_relative_eq!(cov[[0, 1]], 0.03, max_relative = 1e-12);

    assert!(covariance_from_correlation(&array![0.2, 0.3], &array![[1.0, 1.5], [1.5, 1.0]]).is_err());
    assert!(covariance_from_correlation(&array![0.2], &array![[1.0, 0.0], [0.0, 1.0]]).is_err());
  }

  #[test]
  fn simulation_is_seeded_and_matches_moments() {
    let mu = textbook::five_asset_mu();
    let cov = textbook::five_asset_cov();
    let a = simulate_returns(&mu, &cov, 120, 9999).unwrap();
    let b = simulate_returns(&mu, &cov, 120, 9999).unwrap();
    assert_eq!(a.values(), b.values());
    assert_eq!(a.values().dim(), (120, 5));

    let large = simulate_returns(&mu, &cov, 50_000, 1).unwrap().statistics();
    for i in 0..5 {
      assert_abs_diff_eq!(large.mean()[i], mu[i], epsilon = 0.5);
      assert_relative_eq!(large.covariance()[[i, i]], cov[[i, i]], max_relative = 0.05);
    }
  }

  #[test]
  fn benchmark_without_noise_is_equal_weight() {
    let series = textbook::simulated_series();
    let bench = noisy_equal_weight_benchmark(&series, 0.0, 8888).unwrap();
    let expected = series.period(7).sum() / series.assets() as f64;
    assert_relative_eq!(bench[7], expected, max_relative = 1e-12);
    assert!(noisy_equal_weight_benchmark(&series, -1.0, 8888).is_err());
  }
}
