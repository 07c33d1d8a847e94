//! # Portfolio
//!
//! $$
//! \min_{\mathbf w}\ \rho(\mathbf w)\quad\text{s.t.}\quad \mathbf 1^\top\mathbf w=1,\ \mu^\top\mathbf w=\mu_p
//! $$
//!
//! Risk-return frontiers for a family of risk measures, risk parity and index tracking.

pub mod allocation;
pub mod closed_form;
pub mod data;
pub mod engine;
pub mod frontier;
pub mod measure;
pub mod problem;
pub mod risk_parity;
pub mod solver;
pub mod textbook;
pub mod tracking;
pub mod types;

pub use allocation::Allocation;
pub use allocation::AllocationSet;
pub use allocation::equal_weight;
pub use allocation::maximum_diversification_weights;
pub use allocation::minimum_variance_weights;
pub use closed_form::ClosedFormFrontier;
pub use closed_form::FrontierCoefficients;
pub use closed_form::VolatilityPoint;
pub use data::ReturnSeries;
pub use data::ReturnStatistics;
pub use data::covariance_from_correlation;
pub use data::noisy_equal_weight_benchmark;
pub use data::simulate_returns;
pub use engine::PortfolioEngine;
pub use engine::PortfolioEngineConfig;
pub use frontier::DEFAULT_SHORTFALL_LEVELS;
pub use frontier::FrontierConfig;
pub use frontier::FrontierSweep;
pub use frontier::target_ladder;
pub use measure::RiskMeasure;
pub use problem::PortfolioProblem;
pub use risk_parity::NegativeWeightPolicy;
pub use risk_parity::RiskParityConfig;
pub use risk_parity::RiskParitySolution;
pub use risk_parity::risk_contributions;
pub use risk_parity::risk_parity_residual;
pub use risk_parity::solve_risk_parity;
pub use solver::ClarabelSolver;
pub use solver::ConicSolver;
pub use solver::ProblemSolution;
pub use solver::SolverSettings;
pub use tracking::RollingTrackingConfig;
pub use tracking::TrackingBacktest;
pub use tracking::TrackingWindow;
pub use tracking::rolling_tracking;
pub use types::FrontierCurve;
pub use types::FrontierPoint;
pub use types::SweepFailure;
