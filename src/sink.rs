use parking_lot::Mutex;
use tracing::{info, warn};

use crate::alert::Alert;
use crate::classify::AlertTier;

/// Consumer of classified alerts. Implementations must not block.
pub trait AlertSink: Send + Sync {
    fn emit(&self, alert: &Alert);
}

/// Writes each alert as a structured `tracing` event under the `alert`
/// target, carrying the presentation metadata as fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn emit(&self, alert: &Alert) {
        let p = &alert.presentation;
        let line = alert.line();
        match alert.tier {
            AlertTier::ExtraLarge => warn!(
                target: "alert",
                symbol = %alert.symbol,
                side = %alert.side,
                tier = ?alert.tier,
                notional = alert.notional,
                unit = p.unit.as_str(),
                color = p.background.as_str(),
                bold = p.emphasis.bold,
                blink = p.emphasis.blink,
                "{}",
                line
            ),
            _ => info!(
                target: "alert",
                symbol = %alert.symbol,
                side = %alert.side,
                tier = ?alert.tier,
                notional = alert.notional,
                unit = p.unit.as_str(),
                color = p.background.as_str(),
                bold = p.emphasis.bold,
                blink = p.emphasis.blink,
                "{}",
                line
            ),
        }
    }
}

/// Keeps every alert in memory.
#[derive(Debug, Default)]
pub struct MemoryAlertSink {
    alerts: Mutex<Vec<Alert>>,
}

impl MemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Alert> {
        self.alerts.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.alerts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.lock().is_empty()
    }
}

impl AlertSink for MemoryAlertSink {
    fn emit(&self, alert: &Alert) {
        self.alerts.lock().push(alert.clone());
    }
}
