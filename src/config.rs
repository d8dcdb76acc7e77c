use tokio::time::Duration;

use crate::classify::{ThresholdTable, Thresholds};
use crate::error::ConfigError;
use crate::feed::retry::ReconnectPolicy;
use crate::feed::FeedDescriptor;

pub const DEFAULT_SYMBOLS: [&str; 5] = ["btcusdt", "ethusdt", "solusdt", "bnbusdt", "dogeusdt"];
pub const DEFAULT_WS_BASE: &str = "wss://stream.binance.us:9443";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub symbols: Vec<String>,
    pub ws_base: String,
    pub liq_ws_base: String,
    pub enable_liquidations: bool,
    pub thresholds: ThresholdTable,
    pub backoff_secs: u64,
    pub connect_timeout_secs: u64,
    pub flush_ms: u64,
    pub bucket_ms: i64,
    pub liq_csv_path: String,
    pub quote_suffix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            ws_base: DEFAULT_WS_BASE.to_string(),
            liq_ws_base: DEFAULT_WS_BASE.to_string(),
            enable_liquidations: true,
            thresholds: ThresholdTable::default(),
            backoff_secs: 5,
            connect_timeout_secs: 10,
            flush_ms: 1_000,
            bucket_ms: 1_000,
            liq_csv_path: "liquidations-binance.csv".to_string(),
            quote_suffix: "USDT".to_string(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        let t = d.thresholds;
        let ws_base = std::env::var("WS_BASE").unwrap_or(d.ws_base);
        Self {
            symbols: std::env::var("SYMBOLS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_lowercase())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(d.symbols),
            liq_ws_base: std::env::var("LIQ_WS_BASE").unwrap_or_else(|_| ws_base.clone()),
            ws_base,
            enable_liquidations: env_bool("ENABLE_LIQUIDATIONS", d.enable_liquidations),
            thresholds: ThresholdTable {
                instant: Thresholds::new(
                    env_parse("INSTANT_NOTABLE", t.instant.notable),
                    env_parse("INSTANT_EXTRA_LARGE", t.instant.extra_large),
                ),
                aggregate: Thresholds::new(
                    env_parse("AGGR_NOTABLE", t.aggregate.notable),
                    env_parse("AGGR_EXTRA_LARGE", t.aggregate.extra_large),
                ),
                liquidation: Thresholds::new(
                    env_parse("LIQ_NOTABLE", t.liquidation.notable),
                    env_parse("LIQ_EXTRA_LARGE", t.liquidation.extra_large),
                ),
            },
            backoff_secs: env_parse("BACKOFF_SECS", d.backoff_secs),
            connect_timeout_secs: env_parse("CONNECT_TIMEOUT_SECS", d.connect_timeout_secs),
            flush_ms: env_parse("FLUSH_MS", d.flush_ms),
            bucket_ms: env_parse("BUCKET_MS", d.bucket_ms),
            liq_csv_path: std::env::var("LIQ_CSV_PATH").unwrap_or(d.liq_csv_path),
            quote_suffix: std::env::var("QUOTE_SUFFIX").unwrap_or(d.quote_suffix),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() && !self.enable_liquidations {
            return Err(ConfigError::NoSymbols);
        }
        if self.backoff_secs == 0 {
            return Err(ConfigError::NonPositive("BACKOFF_SECS"));
        }
        if self.flush_ms == 0 {
            return Err(ConfigError::NonPositive("FLUSH_MS"));
        }
        if self.bucket_ms <= 0 {
            return Err(ConfigError::NonPositive("BUCKET_MS"));
        }
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::NonPositive("CONNECT_TIMEOUT_SECS"));
        }
        for (context, t) in [
            ("instant", self.thresholds.instant),
            ("aggregate", self.thresholds.aggregate),
            ("liquidation", self.thresholds.liquidation),
        ] {
            if !(t.notable.is_finite() && t.extra_large.is_finite()) {
                return Err(ConfigError::NonFiniteThreshold {
                    context,
                    notable: t.notable,
                    extra_large: t.extra_large,
                });
            }
            if t.notable > t.extra_large {
                return Err(ConfigError::InvertedThresholds {
                    context,
                    notable: t.notable,
                    extra_large: t.extra_large,
                });
            }
        }
        for base in [&self.ws_base, &self.liq_ws_base] {
            let url = url::Url::parse(base).map_err(|e| ConfigError::InvalidUri {
                uri: base.clone(),
                reason: e.to_string(),
            })?;
            if !matches!(url.scheme(), "ws" | "wss") {
                return Err(ConfigError::InvalidUri {
                    uri: base.clone(),
                    reason: format!("unsupported scheme {}", url.scheme()),
                });
            }
        }
        Ok(())
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            backoff: Duration::from_secs(self.backoff_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_ms)
    }

    /// One descriptor per tracked symbol, plus the liquidation feed.
    pub fn feeds(&self) -> Vec<FeedDescriptor> {
        let mut feeds: Vec<FeedDescriptor> = self
            .symbols
            .iter()
            .map(|s| FeedDescriptor::agg_trade(&self.ws_base, s))
            .collect();
        if self.enable_liquidations {
            feeds.push(FeedDescriptor::liquidations(&self.liq_ws_base));
        }
        feeds
    }
}
