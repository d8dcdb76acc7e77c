//! End-to-end runs of the scheduler against scripted feeds.

mod common;

use std::sync::Arc;

use tempfile::TempDir;
use tokio::time::{sleep, timeout, Duration};

use common::{liq_frame, trade_frame, End, ScriptedSource, Session};
use whalewatch::alert::AlertKind;
use whalewatch::classify::AlertTier;
use whalewatch::config::Config;
use whalewatch::error::FeedError;
use whalewatch::feed::FeedDescriptor;
use whalewatch::scheduler::Scheduler;
use whalewatch::shutdown;
use whalewatch::sink::MemoryAlertSink;
use whalewatch::storage::{CsvStore, LIQUIDATION_COLUMNS};

const BASE: &str = "ws://feeds.test";

fn config(dir: &TempDir) -> Config {
    Config {
        symbols: vec!["btcusdt".to_string()],
        ws_base: BASE.to_string(),
        liq_ws_base: BASE.to_string(),
        backoff_secs: 5,
        flush_ms: 100,
        liq_csv_path: dir.path().join("liq.csv").display().to_string(),
        ..Config::default()
    }
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    timeout(Duration::from_secs(120), async {
        while !cond() {
            sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("condition not reached");
}

#[tokio::test(start_paused = true)]
async fn trades_and_liquidations_flow_through_reconnects() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&dir);

    let btc = FeedDescriptor::agg_trade(BASE, "btcusdt").uri;
    let liq = FeedDescriptor::liquidations(BASE).uri;

    let source = Arc::new(ScriptedSource::default());
    source.script(
        &btc,
        vec![
            Session::Refuse("connection refused"),
            Session::Frames(
                vec![
                    Ok(trade_frame("BTCUSDT", "3000", "1", 1_000, false)),
                    Ok("{not json".to_string()),
                    Ok(trade_frame("BTCUSDT", "3000", "1", 1_500, false)),
                    Err(FeedError::Stream("reset by peer".into())),
                ],
                End::Close,
            ),
            // Late trade for the already-flushed bucket.
            Session::Frames(vec![Ok(trade_frame("BTCUSDT", "1", "1", 1_000, false))], End::Hang),
        ],
    );
    source.script(
        &liq,
        vec![Session::Frames(
            vec![
                Ok(liq_frame("ETHUSDT", "BUY", "0.01", "2000")),
                Ok(liq_frame("BTCUSDT", "SELL", "0.1", "60000")),
            ],
            End::Hang,
        )],
    );

    let alerts = Arc::new(MemoryAlertSink::new());
    let store = Arc::new(CsvStore::open(&cfg.liq_csv_path).unwrap());
    let scheduler = Scheduler::new(cfg.clone(), source.clone(), alerts.clone(), store);
    let engine = scheduler.engine();

    let (trigger, shutdown) = shutdown::channel();
    let run = tokio::spawn(scheduler.run(shutdown));

    // aggregate 6000 + liquidation 6000
    wait_until(|| alerts.len() >= 2).await;
    // the late trade lands after the 5s backoff and is flushed silently
    sleep(Duration::from_secs(12)).await;
    wait_until(|| engine.is_empty()).await;

    trigger.trigger();
    let report = timeout(Duration::from_secs(5), run).await.unwrap().unwrap();

    let got = alerts.snapshot();
    assert_eq!(got.len(), 2, "alerts: {:?}", got);

    let aggr: Vec<_> = got.iter().filter(|a| a.kind == AlertKind::Aggregate).collect();
    assert_eq!(aggr.len(), 1);
    assert_eq!(aggr[0].symbol, "BTC");
    assert_eq!(aggr[0].notional, 6_000.0);
    assert_eq!(aggr[0].tier, AlertTier::Notable);
    assert_eq!(aggr[0].time_ms, 1_000);

    let liqs: Vec<_> = got.iter().filter(|a| a.kind == AlertKind::Liquidation).collect();
    assert_eq!(liqs.len(), 1);
    assert_eq!(liqs[0].tier, AlertTier::ExtraLarge);

    let body = std::fs::read_to_string(&cfg.liq_csv_path).unwrap();
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], LIQUIDATION_COLUMNS.join(","));
    assert!(lines[1].starts_with("ETH,BUY,LIMIT,IOC,0.01,2000,2000,FILLED"));
    assert!(lines[2].starts_with("BTC,SELL,"));

    assert_eq!(report.feeds.len(), 2);
    let btc_report = report.feeds.iter().find(|f| f.feed == "btcusdt@aggTrade").unwrap();
    assert_eq!(btc_report.pipeline.trades, 3);
    assert_eq!(btc_report.pipeline.parse_errors, 1);
    assert_eq!(btc_report.connects, 2);
    assert_eq!(btc_report.failures, 2);
    let liq_report = report.feeds.iter().find(|f| f.feed == "!forceOrder@arr").unwrap();
    assert_eq!(liq_report.pipeline.liquidations, 2);
    assert_eq!(report.aggregate_alerts, 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_every_task_while_feeds_are_down() {
    let dir = TempDir::new().unwrap();
    let cfg = Config {
        symbols: vec!["btcusdt".into(), "ethusdt".into(), "solusdt".into()],
        ..config(&dir)
    };
    let source = Arc::new(ScriptedSource::default());
    for d in cfg.feeds() {
        source.script(&d.uri, (0..100).map(|_| Session::Refuse("down")).collect());
    }

    let alerts = Arc::new(MemoryAlertSink::new());
    let store = Arc::new(CsvStore::open(&cfg.liq_csv_path).unwrap());
    let scheduler = Scheduler::new(cfg, source, alerts.clone(), store);
    let (trigger, shutdown) = shutdown::channel();
    let run = tokio::spawn(scheduler.run(shutdown));

    sleep(Duration::from_secs(30)).await;
    trigger.trigger();
    let report = timeout(Duration::from_secs(5), run).await.unwrap().unwrap();

    assert_eq!(report.feeds.len(), 4);
    for feed in &report.feeds {
        assert_eq!(feed.connects, 0);
        // one attempt at t=0 then one every 5s
        assert!(feed.attempts >= 6, "{}: {} attempts", feed.feed, feed.attempts);
    }
    assert!(alerts.is_empty());
}
