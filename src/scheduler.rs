//! Task wiring: one connector task per configured feed plus one flush task,
//! all sharing a single [`Aggregator`].

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

use crate::aggregate::Aggregator;
use crate::alert::Alert;
use crate::config::Config;
use crate::error::PersistenceError;
use crate::feed::connector::{Connector, FrameSource, WsSource};
use crate::feed::normalize::Normalizer;
use crate::pipeline::{Pipeline, PipelineStats};
use crate::shutdown::Shutdown;
use crate::sink::{AlertSink, TracingAlertSink};
use crate::storage::{CsvStore, PersistenceSink};

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedReport {
    pub feed: String,
    pub pipeline: PipelineStats,
    pub attempts: u64,
    pub connects: u64,
    pub failures: u64,
    pub frames: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub feeds: Vec<FeedReport>,
    pub aggregate_alerts: u64,
}

enum TaskOutput {
    Feed(FeedReport),
    Flush(u64),
}

/// Emits an aggregate alert for every bucket matured at `now_ms`.
pub fn flush_matured(engine: &Aggregator, alerts: &dyn AlertSink, now_ms: i64) -> usize {
    let matured = engine.flush_at(now_ms);
    for agg in &matured {
        alerts.emit(&Alert::aggregate(agg));
    }
    matured.len()
}

async fn flush_loop(
    engine: Arc<Aggregator>,
    alerts: Arc<dyn AlertSink>,
    every: Duration,
    mut shutdown: Shutdown,
) -> u64 {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // first tick completes immediately
    ticker.tick().await;

    let mut emitted = 0u64;
    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            _ = ticker.tick() => {
                emitted += flush_matured(&engine, alerts.as_ref(), now_ms()) as u64;
            }
        }
    }
    emitted
}

pub struct Scheduler {
    config: Config,
    source: Arc<dyn FrameSource>,
    engine: Arc<Aggregator>,
    alerts: Arc<dyn AlertSink>,
    store: Arc<dyn PersistenceSink>,
}

impl Scheduler {
    pub fn new(
        config: Config,
        source: Arc<dyn FrameSource>,
        alerts: Arc<dyn AlertSink>,
        store: Arc<dyn PersistenceSink>,
    ) -> Self {
        let engine = Arc::new(Aggregator::new(config.bucket_ms, config.thresholds.aggregate));
        Self {
            config,
            source,
            engine,
            alerts,
            store,
        }
    }

    /// Websocket transport, tracing alerts and the configured CSV store.
    pub fn from_config(config: Config) -> Result<Self, PersistenceError> {
        let store = CsvStore::open(&config.liq_csv_path)?;
        Ok(Self::new(
            config,
            Arc::new(WsSource),
            Arc::new(TracingAlertSink),
            Arc::new(store),
        ))
    }

    pub fn engine(&self) -> Arc<Aggregator> {
        self.engine.clone()
    }

    /// Runs every feed until `shutdown` fires. Buckets that have not matured
    /// by then are dropped without alerting.
    pub async fn run(self, shutdown: Shutdown) -> RunReport {
        let template = Pipeline::new(
            Normalizer::new(self.config.quote_suffix.clone()),
            self.config.thresholds,
            self.engine.clone(),
            self.alerts.clone(),
            self.store.clone(),
        );
        let policy = self.config.reconnect_policy();
        let mut tasks = JoinSet::new();

        for descriptor in self.config.feeds() {
            let mut pipeline = template.for_feed(&descriptor.name);
            let connector = Connector::new(descriptor, self.source.clone(), policy.clone());
            let shutdown = shutdown.clone();
            tasks.spawn(async move {
                connector.run(&mut pipeline, shutdown).await;
                let stats = connector.stats();
                TaskOutput::Feed(FeedReport {
                    feed: connector.descriptor().name.clone(),
                    pipeline: pipeline.stats(),
                    attempts: stats.attempts(),
                    connects: stats.connects(),
                    failures: stats.failures(),
                    frames: stats.frames(),
                })
            });
        }

        tasks.spawn({
            let engine = self.engine.clone();
            let alerts = self.alerts.clone();
            let every = self.config.flush_interval();
            let shutdown = shutdown.clone();
            async move { TaskOutput::Flush(flush_loop(engine, alerts, every, shutdown).await) }
        });

        info!(feeds = tasks.len() - 1, "scheduler started");

        let mut report = RunReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(TaskOutput::Feed(feed)) => report.feeds.push(feed),
                Ok(TaskOutput::Flush(n)) => report.aggregate_alerts = n,
                Err(e) => error!(error = %e, "scheduler task failed"),
            }
        }
        report.feeds.sort_by(|a, b| a.feed.cmp(&b.feed));

        info!(
            dropped_buckets = self.engine.len(),
            aggregate_alerts = report.aggregate_alerts,
            "scheduler stopped"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::TimeBucket;
    use crate::classify::{AlertTier, Thresholds};
    use crate::feed::events::Side;
    use crate::sink::MemoryAlertSink;

    #[test]
    fn test_flush_matured_emits_aggregate_alerts() {
        let engine = Aggregator::new(1_000, Thresholds::new(5_000.0, 50_000.0));
        let alerts = MemoryAlertSink::new();
        engine.add_notional("BTC", TimeBucket(1_000), Side::Buy, 3_000.0);
        engine.add_notional("BTC", TimeBucket(1_000), Side::Buy, 3_000.0);
        engine.add_notional("BTC", TimeBucket(2_000), Side::Buy, 9_000.0);

        assert_eq!(flush_matured(&engine, &alerts, 2_500), 1);
        let got = alerts.snapshot();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].notional, 6_000.0);
        assert_eq!(got[0].tier, AlertTier::Notable);
        assert_eq!(got[0].time_ms, 1_000);
        assert_eq!(engine.len(), 1);
    }
}
