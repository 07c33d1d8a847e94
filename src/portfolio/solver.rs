//! # Conic Solver
//!
//! $$
//! \min\ \tfrac12\mathbf x^\top P\mathbf x+\mathbf q^\top\mathbf x
//! \quad\text{s.t.}\quad A\mathbf x+\mathbf s=\mathbf b,\ \mathbf s\in\{0\}^{m_1}\times\mathbb R_+^{m_2}
//! $$
//!
//! Solver seam for [`PortfolioProblem`] and its interior-point backend.

use std::collections::BTreeMap;

use clarabel::algebra::CscMatrix;
use clarabel::solver::*;
use impl_new_derive::ImplNew;

use super::problem::PortfolioProblem;
use crate::error::FrontierError;
use crate::error::Result;

/// Optimal assignment of a [`PortfolioProblem`].
#[derive(Clone, Debug)]
pub struct ProblemSolution {
  /// Full variable vector; weights first.
  pub x: Vec<f64>,
  /// Objective evaluated at `x`.
  pub objective: f64,
  /// Reached only the relaxed stopping tolerances.
  pub inaccurate: bool,
}

impl ProblemSolution {
  /// The weight block of `x`.
  pub fn weights(&self, problem: &PortfolioProblem) -> Vec<f64> {
    self.x[problem.weights()].to_vec()
  }
}

/// Anything that can solve a linear/quadratic [`PortfolioProblem`].
///
/// Implementations must be stateless across calls: sweeps call `solve` from several
/// threads at once with independent problems.
pub trait ConicSolver: Send + Sync {
  /// Solve one instance; infeasibility and numerical failure map to point errors.
  fn solve(&self, problem: &PortfolioProblem) -> Result<ProblemSolution>;
}

/// Interior-point settings forwarded to the backend.
#[derive(ImplNew, Clone, Copy, Debug)]
pub struct SolverSettings {
  pub max_iter: u32,
  pub tol_gap_abs: f64,
  pub tol_gap_rel: f64,
  pub tol_feas: f64,
  pub verbose: bool,
}

impl Default for SolverSettings {
  fn default() -> Self {
    Self {
      max_iter: 200,
      tol_gap_abs: 1e-8,
      tol_gap_rel: 1e-8,
      tol_feas: 1e-8,
      verbose: false,
    }
  }
}

/// [`ConicSolver`] backed by Clarabel.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClarabelSolver {
  settings: SolverSettings,
}

impl ClarabelSolver {
  /// Solver with the given interior-point settings.
  pub fn new(settings: SolverSettings) -> Self {
    Self { settings }
  }

  /// Borrow solver settings.
  pub fn settings(&self) -> &SolverSettings {
    &self.settings
  }

  fn backend_settings(&self) -> DefaultSettings<f64> {
    DefaultSettings {
      max_iter: self.settings.max_iter,
      tol_gap_abs: self.settings.tol_gap_abs,
      tol_gap_rel: self.settings.tol_gap_rel,
      tol_feas: self.settings.tol_feas,
      verbose: self.settings.verbose,
      ..DefaultSettings::default()
    }
  }
}

impl ConicSolver for ClarabelSolver {
  fn solve(&self, problem: &PortfolioProblem) -> Result<ProblemSolution> {
    let n = problem.variables();
    let p = csc_from_triplets(n, n, problem.quadratic_terms());
    let q = problem.linear_terms().to_vec();

    let n_eq = problem.equalities().len();
    let n_ge = problem.lower_bounds().len();
    let mut triplets = Vec::new();
    let mut b = Vec::with_capacity(n_eq + n_ge);

    for (row, eq) in problem.equalities().iter().enumerate() {
      triplets.extend(eq.coeffs.iter().map(|&(j, a)| (row, j, a)));
      b.push(eq.rhs);
    }
    // a'x >= rhs  <=>  -a'x + s = -rhs, s >= 0
    for (k, ge) in problem.lower_bounds().iter().enumerate() {
      let row = n_eq + k;
      triplets.extend(ge.coeffs.iter().map(|&(j, a)| (row, j, -a)));
      b.push(-ge.rhs);
    }
    let a = csc_from_triplets(n_eq + n_ge, n, triplets);

    let mut cones = Vec::with_capacity(2);
    if n_eq > 0 {
      cones.push(ZeroConeT(n_eq));
    }
    if n_ge > 0 {
      cones.push(NonnegativeConeT(n_ge));
    }

    let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, self.backend_settings());
    solver.solve();

    let inaccurate = match solver.solution.status {
      SolverStatus::Solved => false,
      SolverStatus::AlmostSolved => {
        tracing::debug!("solver reached reduced accuracy only");
        true
      }
      SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
        return Err(FrontierError::InfeasibleTarget(
          "solver certified primal infeasibility".into(),
        ));
      }
      SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
        return Err(FrontierError::SolverFailure("problem is unbounded".into()));
      }
      status => {
        return Err(FrontierError::SolverFailure(format!("solver stopped with {status:?}")));
      }
    };

    let x = solver.solution.x.clone();
    if x.iter().any(|v| !v.is_finite()) {
      return Err(FrontierError::SolverFailure("solution contains non-finite values".into()));
    }
    let objective = problem.objective(&x);

    Ok(ProblemSolution {
      x,
      objective,
      inaccurate,
    })
  }
}

fn csc_from_triplets(
  rows: usize,
  cols: usize,
  triplets: impl IntoIterator<Item = (usize, usize, f64)>,
) -> CscMatrix<f64> {
  let mut entries: BTreeMap<(usize, usize), f64> = BTreeMap::new();
  for (r, c, v) in triplets {
    *entries.entry((c, r)).or_insert(0.0) += v;
  }

  let mut colptr = vec![0usize; cols + 1];
  let mut rowval = Vec::with_capacity(entries.len());
  let mut nzval = Vec::with_capacity(entries.len());
  for (&(c, r), &v) in &entries {
    if v == 0.0 {
      continue;
    }
    colptr[c + 1] += 1;
    rowval.push(r);
    nzval.push(v);
  }
  for c in 0..cols {
    colptr[c + 1] += colptr[c];
  }

  CscMatrix::new(rows, cols, colptr, rowval, nzval)
}
