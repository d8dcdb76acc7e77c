//! Alerts and their presentation metadata.
//!
//! The tier comes from [`crate::classify`]; everything here is derived from
//! tier and side only and never feeds back into classification.

use chrono::{DateTime, Utc};

use crate::aggregate::AggregateAlert;
use crate::classify::AlertTier;
use crate::feed::events::{LiquidationEvent, Side, TradeEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Instant,
    Aggregate,
    Liquidation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayUnit {
    Raw,
    Thousands,
    Millions,
}

impl DisplayUnit {
    pub fn scale(&self, usd: f64) -> f64 {
        match self {
            DisplayUnit::Raw => usd,
            DisplayUnit::Thousands => usd / 1_000.0,
            DisplayUnit::Millions => usd / 1_000_000.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayUnit::Raw => "raw",
            DisplayUnit::Thousands => "thousands",
            DisplayUnit::Millions => "millions",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Blue,
    Magenta,
    Green,
    Red,
}

impl Color {
    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Blue => "blue",
            Color::Magenta => "magenta",
            Color::Green => "green",
            Color::Red => "red",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Emphasis {
    pub bold: bool,
    pub blink: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presentation {
    pub unit: DisplayUnit,
    pub background: Color,
    pub emphasis: Emphasis,
}

impl Presentation {
    /// Instant and aggregated trades: thousands, blue buys, magenta sells,
    /// blinking once extra large.
    pub fn for_trade(side: Side, tier: AlertTier) -> Self {
        Self {
            unit: DisplayUnit::Thousands,
            background: match side {
                Side::Buy => Color::Blue,
                Side::Sell => Color::Magenta,
            },
            emphasis: Emphasis {
                bold: true,
                blink: tier == AlertTier::ExtraLarge,
            },
        }
    }

    /// A SELL forced order closes a long. Notable prints green/red in raw
    /// dollars, extra large prints blue/magenta in millions.
    pub fn for_liquidation(side: Side, tier: AlertTier) -> Self {
        let extra_large = tier == AlertTier::ExtraLarge;
        let background = match (side, extra_large) {
            (Side::Sell, false) => Color::Green,
            (Side::Buy, false) => Color::Red,
            (Side::Sell, true) => Color::Blue,
            (Side::Buy, true) => Color::Magenta,
        };
        Self {
            unit: if extra_large {
                DisplayUnit::Millions
            } else {
                DisplayUnit::Raw
            },
            background,
            emphasis: Emphasis {
                bold: true,
                blink: false,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub kind: AlertKind,
    pub symbol: String,
    pub side: Side,
    pub tier: AlertTier,
    /// USD notional, unscaled.
    pub notional: f64,
    /// Trade time or bucket start, epoch ms.
    pub time_ms: i64,
    pub presentation: Presentation,
}

impl Alert {
    pub fn instant(trade: &TradeEvent, tier: AlertTier) -> Self {
        Self {
            kind: AlertKind::Instant,
            symbol: trade.symbol.clone(),
            side: trade.side,
            tier,
            notional: trade.notional,
            time_ms: trade.trade_time_ms,
            presentation: Presentation::for_trade(trade.side, tier),
        }
    }

    pub fn aggregate(agg: &AggregateAlert) -> Self {
        Self {
            kind: AlertKind::Aggregate,
            symbol: agg.key.symbol.clone(),
            side: agg.key.side,
            tier: agg.tier,
            notional: agg.total,
            time_ms: agg.key.bucket.start_ms(),
            presentation: Presentation::for_trade(agg.key.side, agg.tier),
        }
    }

    pub fn liquidation(ev: &LiquidationEvent, tier: AlertTier) -> Self {
        Self {
            kind: AlertKind::Liquidation,
            symbol: ev.symbol.clone(),
            side: ev.side,
            tier,
            notional: ev.notional,
            time_ms: ev.trade_time_ms,
            presentation: Presentation::for_liquidation(ev.side, tier),
        }
    }

    pub fn label(&self) -> &'static str {
        match (self.kind, self.side) {
            (AlertKind::Instant, Side::Buy) => "INSTANT BUY",
            (AlertKind::Instant, Side::Sell) => "INSTANT SELL",
            (AlertKind::Aggregate, Side::Buy) => "AGGR BUY",
            (AlertKind::Aggregate, Side::Sell) => "AGGR SELL",
            (AlertKind::Liquidation, Side::Sell) => "L LIQ",
            (AlertKind::Liquidation, Side::Buy) => "S LIQ",
        }
    }

    pub fn display_value(&self) -> f64 {
        self.presentation.unit.scale(self.notional)
    }

    /// One-line rendering, e.g. `AGGR SELL ETH 14:03:22 $61.20k`.
    pub fn line(&self) -> String {
        let time = DateTime::<Utc>::from_timestamp_millis(self.time_ms)
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| self.time_ms.to_string());
        let value = self.display_value();
        let amount = match self.presentation.unit {
            DisplayUnit::Raw => format!("${}", group_thousands(value)),
            DisplayUnit::Thousands => format!("${:.2}k", value),
            DisplayUnit::Millions => format!("${:.3}m", value),
        };
        format!("{} {} {} {}", self.label(), self.symbol, time, amount)
    }
}

/// Whole dollars with comma separators.
fn group_thousands(v: f64) -> String {
    let rounded = v.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
