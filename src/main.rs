//! txdash - streaming transaction dashboard engine
//!
//! Demo driver: runs the generation and analytics pipelines under the
//! coordinator and logs the published dashboard view until interrupted.

use anyhow::Result;
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use txdash_core::{Config, Coordinator};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    init_tracing();

    let config = Config::from_env()?;
    info!(
        total = config.total_transactions,
        batch = config.batch_size,
        chunk = config.chunk_size,
        "🚀 txdash engine starting"
    );

    let handle = Coordinator::spawn(config);
    let mut view = handle.view();

    loop {
        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = view.borrow_and_update();
                info!(
                    records = view.total_records,
                    visible = view.visible_records,
                    avg = view.summary.average_transaction,
                    high_risk = view.risk.as_ref().map(|r| r.high_risk_count),
                    analyzing = view.analyzing,
                    "dashboard view"
                );
            }
            _ = tokio::signal::ctrl_c() => {
                info!("⏹️ interrupt received, shutting down");
                handle.shutdown().await?;
                break;
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "txdash_core=debug,txdash=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
