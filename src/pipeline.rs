//! Per-feed event handling: decode, classify, accumulate, persist.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::aggregate::Aggregator;
use crate::alert::Alert;
use crate::classify::{AlertTier, Context, ThresholdTable};
use crate::feed::connector::FrameHandler;
use crate::feed::events::{FeedEvent, LiquidationEvent, TradeEvent};
use crate::feed::normalize::Normalizer;
use crate::sink::AlertSink;
use crate::scheduler::now_ms;
use crate::storage::{LiquidationRecord, PersistenceSink};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub trades: u64,
    pub liquidations: u64,
    pub alerts: u64,
    pub parse_errors: u64,
    pub persist_errors: u64,
    /// Trades stamped too far ahead of the local clock to aggregate.
    pub future_trades: u64,
}

/// Handles every frame of one feed. Cheap to clone; all clones share the
/// same engine and sinks.
#[derive(Clone)]
pub struct Pipeline {
    feed: String,
    normalizer: Normalizer,
    thresholds: ThresholdTable,
    engine: Arc<Aggregator>,
    alerts: Arc<dyn AlertSink>,
    store: Arc<dyn PersistenceSink>,
    stats: PipelineStats,
}

impl Pipeline {
    pub fn new(
        normalizer: Normalizer,
        thresholds: ThresholdTable,
        engine: Arc<Aggregator>,
        alerts: Arc<dyn AlertSink>,
        store: Arc<dyn PersistenceSink>,
    ) -> Self {
        Self {
            feed: String::new(),
            normalizer,
            thresholds,
            engine,
            alerts,
            store,
            stats: PipelineStats::default(),
        }
    }

    /// Copy of this pipeline labelled for `feed`, with fresh counters.
    pub fn for_feed(&self, feed: &str) -> Self {
        Self {
            feed: feed.to_string(),
            stats: PipelineStats::default(),
            ..self.clone()
        }
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    fn emit(&mut self, alert: Alert) {
        self.stats.alerts += 1;
        self.alerts.emit(&alert);
    }

    pub fn on_event(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Trade(trade) => self.on_trade(&trade),
            FeedEvent::Liquidation(liq) => self.on_liquidation(&liq),
        }
    }

    /// Instant classification, then accumulation.
    pub fn on_trade(&mut self, trade: &TradeEvent) {
        self.stats.trades += 1;
        debug!(
            feed = %self.feed,
            symbol = %trade.symbol,
            side = %trade.side,
            price = trade.price,
            qty = trade.quantity,
            notional = trade.notional,
            "trade"
        );
        let tier = self.thresholds.classify(trade.notional, Context::Instant);
        if tier > AlertTier::None {
            self.emit(Alert::instant(trade, tier));
        }
        if self.engine.accepts(trade.trade_time_ms, now_ms()) {
            self.engine.add(trade);
        } else {
            self.stats.future_trades += 1;
            warn!(
                feed = %self.feed,
                symbol = %trade.symbol,
                trade_time_ms = trade.trade_time_ms,
                "trade stamped ahead of local clock, not aggregated"
            );
        }
    }

    /// Every liquidation is persisted; only classified ones alert.
    pub fn on_liquidation(&mut self, liq: &LiquidationEvent) {
        self.stats.liquidations += 1;
        if let Err(e) = self.store.append(&LiquidationRecord::from_event(liq)) {
            self.stats.persist_errors += 1;
            error!(feed = %self.feed, symbol = %liq.symbol, error = %e, "failed to persist liquidation");
        }
        let tier = self.thresholds.classify(liq.notional, Context::Liquidation);
        if tier > AlertTier::None {
            self.emit(Alert::liquidation(liq, tier));
        }
    }
}

impl FrameHandler for Pipeline {
    fn on_frame(&mut self, frame: &str) {
        match self.normalizer.decode(frame) {
            Ok(event) => self.on_event(event),
            Err(e) => {
                self.stats.parse_errors += 1;
                debug!(feed = %self.feed, error = %e, "dropping malformed frame");
            }
        }
    }
}
