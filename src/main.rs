use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use whalewatch::config::Config;
use whalewatch::scheduler::Scheduler;
use whalewatch::shutdown;

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "whalewatch=info,alert=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let cfg = Config::from_env();
    cfg.validate().context("invalid configuration")?;
    info!(
        symbols = ?cfg.symbols,
        liquidations = cfg.enable_liquidations,
        ws_base = %cfg.ws_base,
        csv = %cfg.liq_csv_path,
        "starting whalewatch"
    );

    let scheduler = Scheduler::from_config(cfg).context("failed to open liquidation store")?;
    let (trigger, shutdown) = shutdown::channel();
    let run = tokio::spawn(scheduler.run(shutdown));

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => {
            warn!(error = %e, "failed to listen for ctrl-c, running until killed");
            std::future::pending::<()>().await;
        }
    }
    trigger.trigger();

    let report = run.await.context("scheduler task panicked")?;
    for feed in &report.feeds {
        info!(
            feed = %feed.feed,
            frames = feed.frames,
            connects = feed.connects,
            failures = feed.failures,
            trades = feed.pipeline.trades,
            liquidations = feed.pipeline.liquidations,
            parse_errors = feed.pipeline.parse_errors,
            future_trades = feed.pipeline.future_trades,
            "feed summary"
        );
    }
    Ok(())
}
