//! # Portfolio Types
//!
//! $$
//! \mathcal F=\{(\mu_p,\ \rho^\*(\mu_p),\ \mathbf w^\*(\mu_p))\}
//! $$
//!
//! Frontier curves and their points, as handed to reporting and plotting code.

use ndarray::Array2;

use super::measure::RiskMeasure;
use crate::error::FrontierError;

/// One sweep point. `risk` is `None` when the point could not be solved.
#[derive(Clone, Debug, PartialEq)]
pub struct FrontierPoint {
  pub target_return: f64,
  /// Minimized objective of the risk measure.
  pub risk: Option<f64>,
  pub weights: Option<Vec<f64>>,
  /// Solved to the solver's relaxed tolerances only.
  pub inaccurate: bool,
}

impl FrontierPoint {
  pub(crate) fn gap(target_return: f64) -> Self {
    Self {
      target_return,
      risk: None,
      weights: None,
      inaccurate: false,
    }
  }

  /// Whether the point could not be solved.
  pub fn is_gap(&self) -> bool {
    self.risk.is_none()
  }
}

/// A point that failed and why.
#[derive(Clone, Debug, PartialEq)]
pub struct SweepFailure {
  pub index: usize,
  pub target_return: f64,
  pub error: FrontierError,
}

/// Frontier traced by a sweep, ordered by increasing target return.
#[derive(Clone, Debug)]
pub struct FrontierCurve {
  measure: RiskMeasure,
  points: Vec<FrontierPoint>,
  failures: Vec<SweepFailure>,
}

impl FrontierCurve {
  pub(crate) fn new(
    measure: RiskMeasure,
    points: Vec<FrontierPoint>,
    failures: Vec<SweepFailure>,
  ) -> Self {
    Self {
      measure,
      points,
      failures,
    }
  }

  /// Risk measure the curve was traced for.
  pub fn measure(&self) -> &RiskMeasure {
    &self.measure
  }

  /// Every point in target order, gaps included.
  pub fn points(&self) -> &[FrontierPoint] {
    &self.points
  }

  /// Failed points with their errors.
  pub fn failures(&self) -> &[SweepFailure] {
    &self.failures
  }

  /// Indices of points solved to reduced accuracy.
  pub fn inaccurate(&self) -> Vec<usize> {
    self
      .points
      .iter()
      .enumerate()
      .filter(|(_, p)| p.inaccurate)
      .map(|(i, _)| i)
      .collect()
  }

  /// Number of points, gaps included.
  pub fn len(&self) -> usize {
    self.points.len()
  }

  /// Whether the curve has no points.
  pub fn is_empty(&self) -> bool {
    self.points.is_empty()
  }

  /// No gaps.
  pub fn is_complete(&self) -> bool {
    self.failures.is_empty()
  }

  /// Target returns in sweep order.
  pub fn targets(&self) -> Vec<f64> {
    self.points.iter().map(|p| p.target_return).collect()
  }

  /// Objective values, `NaN` at gaps.
  pub fn risks(&self) -> Vec<f64> {
    self.points.iter().map(|p| p.risk.unwrap_or(f64::NAN)).collect()
  }

  /// Risks in reporting units, `NaN` at gaps.
  pub fn display_risks(&self) -> Vec<f64> {
    self
      .points
      .iter()
      .map(|p| p.risk.map_or(f64::NAN, |r| self.measure.display_risk(r)))
      .collect()
  }

  /// Points x assets weight matrix; rows without recorded weights are `NaN`.
  pub fn weight_matrix(&self) -> Array2<f64> {
    let assets = self
      .points
      .iter()
      .find_map(|p| p.weights.as_ref().map(Vec::len))
      .unwrap_or(0);

    Array2::from_shape_fn((self.points.len(), assets), |(i, j)| {
      self.points[i]
        .weights
        .as_ref()
        .map_or(f64::NAN, |w| w[j])
    })
  }

  /// Solved point of lowest risk.
  pub fn min_risk_point(&self) -> Option<&FrontierPoint> {
    self
      .points
      .iter()
      .filter(|p| p.risk.is_some())
      .min_by(|a, b| a.risk.unwrap_or(f64::INFINITY).total_cmp(&b.risk.unwrap_or(f64::INFINITY)))
  }
}
