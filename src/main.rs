use anyhow::Context;
use clap::Parser;
use cyclestate::{Cycle, CycleStore, RecordData, StoreConfig};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const ACTIVITY_TYPE: i32 = 1;

#[derive(Parser, Debug)]
#[command(name = "cyclestate", about = "Cyclical per-user state cache demo")]
struct Cli {
    /// User whose daily record is exercised
    #[arg(long, default_value_t = 12345)]
    user: i64,

    /// Keep the background sweeper running for this many seconds
    #[arg(long, default_value_t = 0)]
    run_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let store = CycleStore::with_config(
        StoreConfig::new()
            .sweep_interval(Duration::from_secs(1))
            .cold_threshold(Duration::from_secs(2)),
    );

    store
        .register_creator(Cycle::Daily, ACTIVITY_TYPE, |user| {
            Some(RecordData::new(user).expires_in(86_400))
        })
        .context("registering daily creator")?;
    store
        .register_storer(Cycle::Daily, ACTIVITY_TYPE, |cycle, type_key, data| {
            let payload = serde_json::to_string(&data.attributes)?;
            info!(%cycle, type_key, user = data.user_id, %payload, "stored record");
            Ok(())
        })
        .context("registering daily storer")?;

    let user = cli.user;
    let credited = store.increase_int(Cycle::Daily, ACTIVITY_TYPE, user, "score", 10, |_| true);
    let overdrawn = store.decrease_int(Cycle::Daily, ACTIVITY_TYPE, user, "score", 15);
    let spent = store.decrease_int(Cycle::Daily, ACTIVITY_TYPE, user, "score", 5);
    info!(credited, overdrawn, spent, "score updates applied");

    let score = store.attribute(Cycle::Daily, ACTIVITY_TYPE, user, "score");
    info!(user, score = ?score, "current score");

    if cli.run_secs > 0 {
        let worker = store.spawn_sweeper();
        tokio::time::sleep(Duration::from_secs(cli.run_secs)).await;
        worker.stop().await.context("stopping sweeper")?;
    }

    let report = store.flush_all().context("flushing store")?;
    let stats = store.stats().context("collecting stats")?;
    info!(
        stored = report.stored,
        failed = report.failed,
        records = stats.records,
        "shutdown flush finished"
    );
    Ok(())
}
