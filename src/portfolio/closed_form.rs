//! # Closed-Form Frontier
//!
//! $$
//! \mu_p=\frac{A\pm\sqrt{|C\sigma_p^2-1|\,D}}{C},\qquad
//! A=\mu^\top\Sigma^{-1}\iota,\ B=\mu^\top\Sigma^{-1}\mu,\ C=\iota^\top\Sigma^{-1}\iota,\ D=BC-A^2
//! $$
//!
//! Mean-variance frontier with short sales allowed, solved analytically.

use nalgebra::DVector;
use ndarray::Array1;
use ndarray::Array2;

use super::data::ReturnStatistics;
use super::data::to_dmatrix;
use super::data::to_dvector;
use super::measure::RiskMeasure;
use super::types::FrontierCurve;
use super::types::FrontierPoint;
use crate::error::FrontierError;
use crate::error::Result;

/// Scalars of the two-fund representation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrontierCoefficients {
  pub a: f64,
  pub b: f64,
  pub c: f64,
  pub d: f64,
}

/// One point of the volatility-indexed frontier.
#[derive(Clone, Copy, Debug)]
pub struct VolatilityPoint {
  pub volatility: f64,
  /// Upper (efficient) branch.
  pub efficient: f64,
  /// Lower (inefficient) branch.
  pub inefficient: f64,
}

#[derive(Clone, Debug)]
pub struct ClosedFormFrontier {
  coefficients: FrontierCoefficients,
  /// `Sigma^{-1} mu`
  inv_mu: DVector<f64>,
  /// `Sigma^{-1} iota`
  inv_iota: DVector<f64>,
  max_stdev: f64,
}

impl ClosedFormFrontier {
  /// Requires `Sigma` positive definite and `mu` not proportional to `iota` (`D > 0`).
  pub fn new(mean: &Array1<f64>, covariance: &Array2<f64>) -> Result<Self> {
    let stats = ReturnStatistics::from_moments(mean.clone(), covariance.clone())?;
    Self::from_statistics(&stats)
  }

  /// Closed form from the mean and covariance of `stats`.
  pub fn from_statistics(stats: &ReturnStatistics) -> Result<Self> {
    let n = stats.assets();
    let chol = to_dmatrix(stats.covariance())
      .cholesky()
      .ok_or_else(|| FrontierError::invalid("covariance is singular or not positive definite"))?;

    let mu = to_dvector(stats.mean());
    let iota = DVector::from_element(n, 1.0);
    let inv_mu = chol.solve(&mu);
    let inv_iota = chol.solve(&iota);

    let a = mu.dot(&inv_iota);
    let b = mu.dot(&inv_mu);
    let c = iota.dot(&inv_iota);
    let d = b * c - a * a;
    if !(d > 1e-12 * (b * c).abs().max(f64::MIN_POSITIVE)) {
      return Err(FrontierError::invalid(format!(
        "degenerate frontier (D = {d:.3e}): expected returns are proportional to the unit vector"
      )));
    }

    let max_stdev = stats.stdev().fold(0.0_f64, |m, &s| m.max(s));

    Ok(Self {
      coefficients: FrontierCoefficients { a, b, c, d },
      inv_mu,
      inv_iota,
      max_stdev,
    })
  }

  /// Frontier constants A, B, C and D.
  pub fn coefficients(&self) -> FrontierCoefficients {
    self.coefficients
  }

  /// Expected return of the global minimum-variance portfolio, `A / C`.
  pub fn gmv_return(&self) -> f64 {
    self.coefficients.a / self.coefficients.c
  }

  /// Variance of the global minimum-variance portfolio, `1 / C`.
  pub fn gmv_variance(&self) -> f64 {
    1.0 / self.coefficients.c
  }

  /// Volatility of the global minimum-variance portfolio.
  pub fn gmv_volatility(&self) -> f64 {
    self.gmv_variance().sqrt()
  }

  /// Weights of the global minimum-variance portfolio.
  pub fn gmv_weights(&self) -> Vec<f64> {
    (&self.inv_iota / self.coefficients.c).iter().copied().collect()
  }

  /// Minimum variance attainable at `target`: `(C/D)(mu_p - A/C)^2 + 1/C`.
  pub fn variance(&self, target: f64) -> f64 {
    let FrontierCoefficients { a, c, d, .. } = self.coefficients;
    (c / d) * (target - a / c).powi(2) + 1.0 / c
  }

  /// Frontier volatility at `target`.
  pub fn volatility(&self, target: f64) -> f64 {
    self.variance(target).sqrt()
  }

  /// Frontier portfolio for `target`, a combination of `Sigma^{-1} mu` and `Sigma^{-1} iota`.
  pub fn weights(&self, target: f64) -> Vec<f64> {
    let FrontierCoefficients { a, b, c, d } = self.coefficients;
    let w = &self.inv_mu * ((c * target - a) / d) + &self.inv_iota * ((b - a * target) / d);
    w.iter().copied().collect()
  }

  /// Efficient and inefficient expected returns at volatility `sigma >= sigma_gmv`.
  pub fn frontier_returns(&self, sigma: f64) -> Result<(f64, f64)> {
    let gmv = self.gmv_volatility();
    if !sigma.is_finite() || sigma < gmv * (1.0 - 1e-12) {
      return Err(FrontierError::InfeasibleTarget(format!(
        "volatility {sigma} is below the global minimum {gmv}"
      )));
    }

    let FrontierCoefficients { a, c, d, .. } = self.coefficients;
    let spread = ((c * sigma * sigma - 1.0).abs() * d).sqrt();
    Ok(((a + spread) / c, (a - spread) / c))
  }

  /// Frontier sampled at `points` volatilities from `sigma_gmv` to `1.05 * max(sigma_i)`.
  pub fn volatility_curve(&self, points: usize) -> Result<Vec<VolatilityPoint>> {
    if points < 2 {
      return Err(FrontierError::invalid("volatility curve needs at least 2 points"));
    }

    let lo = self.gmv_volatility();
    let hi = (1.05 * self.max_stdev).max(lo);
    Array1::linspace(lo, hi, points)
      .iter()
      .map(|&volatility| {
        let (efficient, inefficient) = self.frontier_returns(volatility)?;
        Ok(VolatilityPoint {
          volatility,
          efficient,
          inefficient,
        })
      })
      .collect()
  }

  /// Analytic counterpart of a variance sweep; risk is the variance at each target.
  pub fn sweep(&self, targets: &[f64], record_weights: bool) -> FrontierCurve {
    let points = targets
      .iter()
      .map(|&target_return| FrontierPoint {
        target_return,
        risk: Some(self.variance(target_return)),
        weights: record_weights.then(|| self.weights(target_return)),
        inaccurate: false,
      })
      .collect();

    FrontierCurve::new(RiskMeasure::Variance, points, Vec::new())
  }
}
