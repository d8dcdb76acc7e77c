//! Time-bucketed trade accumulation.
//!
//! Trades are summed per (symbol, bucket, side). A bucket matures once the
//! wall clock has moved past it; `flush` then removes it in the same critical
//! section that decides it is mature, so a concurrent `add` for that key
//! either lands in the flushed total or starts a fresh accumulator.
//!
//! Callers check [`Aggregator::accepts`] before adding: a trade stamped more
//! than `max_lead_ms` ahead of the local clock would open a bucket no flush
//! reaches for that long, so it is not accumulated.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::classify::{AlertTier, Thresholds};
use crate::feed::events::{Side, TradeEvent};

/// Epoch-millisecond start of a fixed-width time slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeBucket(pub i64);

impl TimeBucket {
    pub fn start_ms(&self) -> i64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey {
    pub symbol: String,
    pub bucket: TimeBucket,
    pub side: Side,
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    total: f64,
    trades: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateAlert {
    pub key: BucketKey,
    pub total: f64,
    pub trades: u32,
    pub tier: AlertTier,
}

pub const DEFAULT_MAX_LEAD_MS: i64 = 60_000;

#[derive(Debug)]
pub struct Aggregator {
    bucket_ms: i64,
    max_lead_ms: i64,
    thresholds: Thresholds,
    buckets: Mutex<HashMap<BucketKey, Accumulator>>,
}

impl Aggregator {
    /// `bucket_ms` values below 1 are treated as 1.
    pub fn new(bucket_ms: i64, thresholds: Thresholds) -> Self {
        Self {
            bucket_ms: bucket_ms.max(1),
            max_lead_ms: DEFAULT_MAX_LEAD_MS,
            thresholds,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_max_lead(mut self, max_lead_ms: i64) -> Self {
        self.max_lead_ms = max_lead_ms.max(0);
        self
    }

    pub fn bucket_ms(&self) -> i64 {
        self.bucket_ms
    }

    /// Whether a trade stamped `ts_ms` may be accumulated at local time
    /// `now_ms`.
    pub fn accepts(&self, ts_ms: i64, now_ms: i64) -> bool {
        ts_ms <= now_ms.saturating_add(self.max_lead_ms)
    }

    pub fn bucket_of(&self, ts_ms: i64) -> TimeBucket {
        TimeBucket(ts_ms.div_euclid(self.bucket_ms) * self.bucket_ms)
    }

    /// Folds a trade into its bucket. Returns the bucket's running total.
    pub fn add(&self, trade: &TradeEvent) -> f64 {
        let bucket = self.bucket_of(trade.trade_time_ms);
        self.add_notional(&trade.symbol, bucket, trade.side, trade.notional)
    }

    pub fn add_notional(&self, symbol: &str, bucket: TimeBucket, side: Side, notional: f64) -> f64 {
        let key = BucketKey {
            symbol: symbol.to_string(),
            bucket,
            side,
        };
        let mut buckets = self.buckets.lock();
        let acc = buckets.entry(key).or_default();
        acc.total += notional;
        acc.trades += 1;
        acc.total
    }

    /// Removes every bucket strictly earlier than `now` and returns the ones
    /// whose total classifies above [`AlertTier::None`], ordered by bucket.
    pub fn flush(&self, now: TimeBucket) -> Vec<AggregateAlert> {
        let mut out = Vec::new();
        {
            let mut buckets = self.buckets.lock();
            buckets.retain(|key, acc| {
                if key.bucket >= now {
                    return true;
                }
                let tier = self.thresholds.tier(acc.total);
                if tier > AlertTier::None {
                    out.push(AggregateAlert {
                        key: key.clone(),
                        total: acc.total,
                        trades: acc.trades,
                        tier,
                    });
                }
                false
            });
        }
        out.sort_by(|a, b| a.key.cmp(&b.key));
        out
    }

    pub fn flush_at(&self, now_ms: i64) -> Vec<AggregateAlert> {
        self.flush(self.bucket_of(now_ms))
    }

    pub fn total(&self, key: &BucketKey) -> Option<f64> {
        self.buckets.lock().get(key).map(|acc| acc.total)
    }

    pub fn len(&self) -> usize {
        self.buckets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn engine() -> Aggregator {
        Aggregator::new(1_000, Thresholds::new(5_000.0, 50_000.0))
    }

    #[test]
    fn test_accepts_bounded_lead() {
        let e = engine();
        let now = 1_700_000_000_000;
        assert!(e.accepts(now - 3_600_000, now));
        assert!(e.accepts(now + DEFAULT_MAX_LEAD_MS, now));
        assert!(!e.accepts(now + DEFAULT_MAX_LEAD_MS + 1, now));
        assert!(!e.accepts(i64::MAX, now));

        let strict = engine().with_max_lead(0);
        assert!(strict.accepts(now, now));
        assert!(!strict.accepts(now + 1, now));
        assert!(engine().accepts(i64::MAX, i64::MAX));
    }

    fn key(symbol: &str, bucket: i64, side: Side) -> BucketKey {
        BucketKey {
            symbol: symbol.to_string(),
            bucket: TimeBucket(bucket),
            side,
        }
    }

    #[test]
    fn test_accumulates_and_flushes_once() {
        let agg = engine();
        let t = TimeBucket(10_000);
        agg.add_notional("BTC", t, Side::Buy, 3_000.0);
        assert_eq!(agg.add_notional("BTC", t, Side::Buy, 3_000.0), 6_000.0);

        let alerts = agg.flush(TimeBucket(11_000));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].key, key("BTC", 10_000, Side::Buy));
        assert_eq!(alerts[0].total, 6_000.0);
        assert_eq!(alerts[0].trades, 2);
        assert_eq!(alerts[0].tier, AlertTier::Notable);
        assert!(agg.is_empty());

        // A late trade for the same bucket starts over.
        assert_eq!(agg.add_notional("BTC", t, Side::Buy, 1.0), 1.0);
        assert!(agg.flush(TimeBucket(11_000)).is_empty());
    }

    #[test]
    fn test_immature_buckets_survive_flush() {
        let agg = engine();
        agg.add_notional("BTC", TimeBucket(10_000), Side::Buy, 9_000.0);

        assert!(agg.flush(TimeBucket(10_000)).is_empty());
        assert!(agg.flush(TimeBucket(9_000)).is_empty());
        assert_eq!(agg.total(&key("BTC", 10_000, Side::Buy)), Some(9_000.0));

        let alerts = agg.flush(TimeBucket(11_000));
        assert_eq!(alerts.len(), 1);
        assert!(agg.is_empty());
    }

    #[test]
    fn test_below_threshold_dropped_silently() {
        let agg = engine();
        agg.add_notional("ETH", TimeBucket(0), Side::Sell, 5_000.0);
        agg.add_notional("ETH", TimeBucket(0), Side::Buy, 100.0);
        assert!(agg.flush(TimeBucket(1_000)).is_empty());
        assert_eq!(agg.len(), 0);
    }

    #[test]
    fn test_keys_are_independent() {
        let agg = engine();
        agg.add_notional("BTC", TimeBucket(0), Side::Buy, 6_000.0);
        agg.add_notional("BTC", TimeBucket(0), Side::Sell, 60_000.0);
        agg.add_notional("ETH", TimeBucket(0), Side::Buy, 7_000.0);
        agg.add_notional("BTC", TimeBucket(1_000), Side::Buy, 8_000.0);
        assert_eq!(agg.len(), 4);

        let alerts = agg.flush(TimeBucket(1_000));
        assert_eq!(alerts.len(), 3);
        let sell = alerts.iter().find(|a| a.key.side == Side::Sell).unwrap();
        assert_eq!(sell.tier, AlertTier::ExtraLarge);
        assert_eq!(agg.len(), 1);
    }

    #[test]
    fn test_add_uses_trade_time_bucket() {
        let agg = engine();
        let trade = TradeEvent::new("SOL".to_string(), 100.0, 60.0, 1_700_000_000_999, false);
        agg.add(&trade);
        let trade = TradeEvent::new("SOL".to_string(), 100.0, 1.0, 1_700_000_000_001, false);
        assert_eq!(agg.add(&trade), 6_100.0);
        assert_eq!(
            agg.total(&key("SOL", 1_700_000_000_000, Side::Buy)),
            Some(6_100.0)
        );
        assert!(agg.flush_at(1_700_000_000_500).is_empty());
        assert_eq!(agg.flush_at(1_700_000_001_000).len(), 1);
    }

    #[test]
    fn test_bucket_of_negative_and_wide() {
        let agg = Aggregator::new(60_000, Thresholds::new(1.0, 2.0));
        assert_eq!(agg.bucket_of(59_999), TimeBucket(0));
        assert_eq!(agg.bucket_of(60_000), TimeBucket(60_000));
        assert_eq!(agg.bucket_of(-1), TimeBucket(-60_000));
        assert_eq!(Aggregator::new(0, Thresholds::new(1.0, 2.0)).bucket_ms(), 1);
    }

    #[test]
    fn test_concurrent_adds_are_not_lost() {
        let agg = Arc::new(engine());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let agg = agg.clone();
                std::thread::spawn(move || {
                    let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
                    for _ in 0..1_000 {
                        agg.add_notional("BTC", TimeBucket(0), side, 10.0);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let alerts = agg.flush(TimeBucket(1_000));
        assert_eq!(alerts.len(), 2);
        for a in alerts {
            assert_eq!(a.total, 40_000.0);
            assert_eq!(a.trades, 4_000);
        }
    }
}
