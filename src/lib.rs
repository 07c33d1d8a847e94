//! # frontier-rs
//!
//! Long-only risk-return frontiers under several risk measures, solved as convex programs.
//!
//! ## Modules
//!
//! | Module          | Description                                                                        |
//! |-----------------|------------------------------------------------------------------------------------|
//! | [`portfolio`]   | Return statistics, risk measures, frontier sweeps, risk parity and index tracking. |
//! | [`error`]       | The crate error type.                                                              |
//!
//! ## Parallelism
//!
//! Sweep points, shortfall levels and rolling windows are independent problems. Setting the
//! `parallel` flag of [`portfolio::FrontierConfig`] or [`portfolio::RollingTrackingConfig`]
//! solves them on the `rayon` pool.

pub mod error;
pub mod portfolio;

pub use error::FrontierError;
pub use error::Result;
pub use portfolio::PortfolioEngine;
pub use portfolio::PortfolioEngineConfig;
