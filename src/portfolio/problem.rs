//! # Portfolio Problem
//!
//! $$
//! \min_{\mathbf x}\ \tfrac12\mathbf x^\top P\mathbf x+\mathbf q^\top\mathbf x
//! \quad\text{s.t.}\quad A_{eq}\mathbf x=\mathbf b_{eq},\ A_{ge}\mathbf x\ge\mathbf b_{ge}
//! $$
//!
//! One optimization instance: the portfolio weights `w` occupy the first `N` variables,
//! auxiliary variables of the risk measure follow. Instances are immutable once built and
//! are never shared between sweep points.

use std::collections::BTreeMap;
use std::ops::Range;

use ndarray::ArrayView1;

/// Sparse linear row `sum_j a_j x_j` compared against `rhs`.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearRow {
  pub coeffs: Vec<(usize, f64)>,
  pub rhs: f64,
}

#[derive(Clone, Debug)]
pub struct PortfolioProblem {
  assets: usize,
  variables: usize,
  /// Upper-triangular entries of `P`, keyed by `(col, row)` so iteration is column-major.
  quadratic: BTreeMap<(usize, usize), f64>,
  linear: Vec<f64>,
  equalities: Vec<LinearRow>,
  lower_bounds: Vec<LinearRow>,
}

impl PortfolioProblem {
  /// Empty problem over `assets` weights and a zero objective.
  pub fn new(assets: usize) -> Self {
    Self {
      assets,
      variables: assets,
      quadratic: BTreeMap::new(),
      linear: vec![0.0; assets],
      equalities: Vec::new(),
      lower_bounds: Vec::new(),
    }
  }

  /// Number of portfolio weights `N`.
  pub fn assets(&self) -> usize {
    self.assets
  }

  /// Total number of variables, weights plus auxiliaries.
  pub fn variables(&self) -> usize {
    self.variables
  }

  /// Index range of the weight vector.
  pub fn weights(&self) -> Range<usize> {
    0..self.assets
  }

  /// Append `count` free variables and return their index range.
  pub fn add_variables(&mut self, count: usize) -> Range<usize> {
    let start = self.variables;
    self.variables += count;
    self.linear.resize(self.variables, 0.0);
    start..self.variables
  }

  /// Add `coeff * x_i * x_j` to the objective.
  pub fn add_quadratic(&mut self, i: usize, j: usize, coeff: f64) {
    debug_assert!(i < self.variables && j < self.variables);
    let (row, col) = if i <= j { (i, j) } else { (j, i) };
    // P carries a factor 2 on the diagonal because the objective is 1/2 x'Px.
    let entry = if row == col { 2.0 * coeff } else { coeff };
    *self.quadratic.entry((col, row)).or_insert(0.0) += entry;
  }

  /// Add `coeff * x_i` to the objective.
  pub fn add_linear(&mut self, i: usize, coeff: f64) {
    self.linear[i] += coeff;
  }

  /// `sum a_j x_j = rhs`.
  pub fn add_equality(&mut self, coeffs: Vec<(usize, f64)>, rhs: f64) {
    self.equalities.push(LinearRow { coeffs, rhs });
  }

  /// `sum a_j x_j >= rhs`.
  pub fn add_at_least(&mut self, coeffs: Vec<(usize, f64)>, rhs: f64) {
    self.lower_bounds.push(LinearRow { coeffs, rhs });
  }

  /// `x_i >= 0` for every `i` in `range`.
  pub fn add_nonnegative(&mut self, range: Range<usize>) {
    for i in range {
      self.add_at_least(vec![(i, 1.0)], 0.0);
    }
  }

  /// Full investment, `sum w = 1`.
  pub fn with_full_investment(mut self) -> Self {
    let coeffs = self.weights().map(|i| (i, 1.0)).collect();
    self.add_equality(coeffs, 1.0);
    self
  }

  /// Return matching, `w' mu = target`.
  pub fn with_target_return(mut self, mean: ArrayView1<'_, f64>, target: f64) -> Self {
    let coeffs = mean.iter().enumerate().map(|(i, &m)| (i, m)).collect();
    self.add_equality(coeffs, target);
    self
  }

  /// No short sales, `w >= 0`.
  pub fn with_long_only(mut self) -> Self {
    self.add_nonnegative(self.weights());
    self
  }

  /// Upper-triangular entries `(row, col, value)` of `P`, column-major.
  pub fn quadratic_terms(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
    self.quadratic.iter().map(|(&(col, row), &v)| (row, col, v))
  }

  /// Linear objective coefficients `q`.
  pub fn linear_terms(&self) -> &[f64] {
    &self.linear
  }

  /// Equality rows.
  pub fn equalities(&self) -> &[LinearRow] {
    &self.equalities
  }

  /// `>=` rows.
  pub fn lower_bounds(&self) -> &[LinearRow] {
    &self.lower_bounds
  }

  /// Objective value at `x`.
  pub fn objective(&self, x: &[f64]) -> f64 {
    let quad: f64 = self
      .quadratic_terms()
      .map(|(i, j, p)| if i == j { 0.5 * p * x[i] * x[i] } else { p * x[i] * x[j] })
      .sum();
    let lin: f64 = self.linear.iter().zip(x).map(|(q, xi)| q * xi).sum();
    quad + lin
  }

  /// Largest violation of any constraint at `x`.
  pub fn max_violation(&self, x: &[f64]) -> f64 {
    let eval = |row: &LinearRow| row.coeffs.iter().map(|&(j, a)| a * x[j]).sum::<f64>() - row.rhs;
    let eq = self.equalities.iter().map(|r| eval(r).abs());
    let ge = self.lower_bounds.iter().map(|r| (-eval(r)).max(0.0));
    eq.chain(ge).fold(0.0, f64::max)
  }
}
