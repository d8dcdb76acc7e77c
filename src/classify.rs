//! Notional → alert tier classification.
//!
//! Pure numeric logic only. Display units, colours and emphasis are derived
//! from the resulting tier in [`crate::alert`].

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AlertTier {
    None,
    Notable,
    ExtraLarge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Context {
    /// A single trade, classified on receipt.
    Instant,
    /// A matured (symbol, bucket, side) total.
    Aggregate,
    /// A forced liquidation order.
    Liquidation,
}

impl Context {
    pub fn as_str(&self) -> &'static str {
        match self {
            Context::Instant => "instant",
            Context::Aggregate => "aggregate",
            Context::Liquidation => "liquidation",
        }
    }
}

/// Strict greater-than threshold pair for one context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub notable: f64,
    pub extra_large: f64,
}

impl Thresholds {
    pub const fn new(notable: f64, extra_large: f64) -> Self {
        Self { notable, extra_large }
    }

    pub fn tier(&self, notional: f64) -> AlertTier {
        if notional > self.extra_large {
            AlertTier::ExtraLarge
        } else if notional > self.notable {
            AlertTier::Notable
        } else {
            AlertTier::None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdTable {
    pub instant: Thresholds,
    pub aggregate: Thresholds,
    pub liquidation: Thresholds,
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self {
            instant: Thresholds::new(5_000.0, 50_000.0),
            aggregate: Thresholds::new(5_000.0, 50_000.0),
            liquidation: Thresholds::new(1_000.0, 5_000.0),
        }
    }
}

impl ThresholdTable {
    pub fn for_context(&self, context: Context) -> Thresholds {
        match context {
            Context::Instant => self.instant,
            Context::Aggregate => self.aggregate,
            Context::Liquidation => self.liquidation,
        }
    }

    pub fn classify(&self, notional: f64, context: Context) -> AlertTier {
        self.for_context(context).tier(notional)
    }
}
