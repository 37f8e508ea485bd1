//! Stress run entry point.

use std::process::ExitCode;

use stress::Config;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Run
    tracing::info!(
        workers = config.workers,
        iterations = config.iterations,
        skus = config.skus,
        max_attempts = config.retry.max_attempts,
        base_backoff = ?config.retry.base_backoff,
        "starting stress run"
    );
    let report = match stress::run(&config).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "stress run aborted");
            return ExitCode::FAILURE;
        }
    };

    // 4. Report
    println!("initial units:       {}", report.initial_units);
    println!("reserved:            {}", report.succeeded);
    println!("failed:              {}", report.failed_total());
    for (code, count) in &report.failed {
        println!("  {code:<18} {count}");
    }
    println!("remaining available: {}", report.remaining_available);
    println!("ledger entries:      {}", report.ledger_entries);
    println!("elapsed:             {:?}", report.elapsed);
    println!();
    println!("{}", metrics_handle.render());

    if report.is_consistent() {
        ExitCode::SUCCESS
    } else {
        tracing::error!("stock and ledger disagree with the committed reservations");
        ExitCode::FAILURE
    }
}
