use frontier_rs::portfolio::DEFAULT_SHORTFALL_LEVELS;
use frontier_rs::portfolio::FrontierConfig;
use frontier_rs::portfolio::FrontierCurve;
use frontier_rs::portfolio::PortfolioEngine;
use frontier_rs::portfolio::PortfolioEngineConfig;
use frontier_rs::portfolio::ReturnStatistics;
use frontier_rs::portfolio::RiskMeasure;
use frontier_rs::portfolio::noisy_equal_weight_benchmark;
use frontier_rs::portfolio::simulate_returns;
use frontier_rs::portfolio::textbook;
use ndarray::Axis;
use prettytable::Table;
use prettytable::row;
use tracing_subscriber::EnvFilter;

const SIMULATION_SEED: u64 = 9999;
const BENCHMARK_SEED: u64 = 8888;

fn main() -> anyhow::Result<()> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt().with_env_filter(filter).init();

  let mu = textbook::five_asset_mu();
  let cov = textbook::five_asset_cov();
  let moments = ReturnStatistics::from_moments(mu.clone(), cov.clone())?;

  let engine = PortfolioEngine::new(PortfolioEngineConfig {
    frontier: FrontierConfig {
      points: 25,
      parallel: true,
      ..FrontierConfig::default()
    },
    ..PortfolioEngineConfig::default()
  });

  let exact = engine.closed_form(&moments)?;
  let k = exact.coefficients();
  println!("A = {:.4}  B = {:.4}  C = {:.6}  D = {:.4}", k.a, k.b, k.c, k.d);
  println!(
    "global minimum variance: return {:.4}, volatility {:.4}",
    exact.gmv_return(),
    exact.gmv_volatility()
  );

  let mut table = Table::new();
  table.add_row(row!["volatility", "efficient", "inefficient"]);
  for p in exact.volatility_curve(8)? {
    table.add_row(row![
      format!("{:.4}", p.volatility),
      format!("{:.4}", p.efficient),
      format!("{:.4}", p.inefficient)
    ]);
  }
  table.printstd();

  let series = simulate_returns(&mu, &cov, 120, SIMULATION_SEED)?;
  let stats = series.statistics();
  let index = series.values().mean_axis(Axis(1)).unwrap_or_else(|| mu.clone());
  let measures = [
    RiskMeasure::Variance,
    RiskMeasure::MeanAbsoluteDeviation,
    RiskMeasure::expected_shortfall(0.05),
    RiskMeasure::Semivariance,
    RiskMeasure::tracking_error(index),
  ];

  let mut table = Table::new();
  table.add_row(row!["measure", "points", "gaps", "min risk", "at return", "single assets"]);
  for measure in &measures {
    let curve = engine.frontier_default(&stats, measure)?;
    table.add_row(summary_row(&curve, &stats)?);
  }
  let (lo, hi) = stats.return_range();
  for curve in engine.frontier_by_alpha(&stats, &DEFAULT_SHORTFALL_LEVELS, &[0.5 * (lo + hi)])? {
    table.add_row(summary_row(&curve, &stats)?);
  }
  table.printstd();

  let mut table = Table::new();
  table.add_row(row!["allocation", "weights", "return", "volatility"]);
  for (name, a) in engine.allocations(&moments)?.iter() {
    let weights: Vec<String> = a.weights.iter().map(|w| format!("{w:.3}")).collect();
    table.add_row(row![
      name,
      weights.join(" "),
      format!("{:.4}", a.expected_return),
      format!("{:.4}", a.volatility)
    ]);
  }
  table.printstd();

  let benchmark = noisy_equal_weight_benchmark(&series, 3.0, BENCHMARK_SEED)?;
  let backtest = engine.rolling_tracking(&series, &benchmark)?;
  println!(
    "rolling tracking: {} windows of {}, {} gaps, realised tracking error {:.4}",
    backtest.len(),
    backtest.window(),
    backtest.failures().len(),
    backtest.realised_tracking_error().unwrap_or(f64::NAN)
  );

  Ok(())
}

fn summary_row(curve: &FrontierCurve, stats: &ReturnStatistics) -> anyhow::Result<prettytable::Row> {
  let measure = curve.measure();
  let (risk, at) = curve
    .min_risk_point()
    .and_then(|p| p.risk.map(|r| (measure.display_risk(r), p.target_return)))
    .unwrap_or((f64::NAN, f64::NAN));
  let assets: Vec<String> = measure
    .asset_risks(stats)?
    .iter()
    .map(|r| format!("{r:.2}"))
    .collect();

  Ok(row![
    measure.to_string(),
    curve.len(),
    curve.failures().len(),
    format!("{risk:.4}"),
    format!("{at:.4}"),
    assets.join(" ")
  ])
}
