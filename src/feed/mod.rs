pub mod connector;
pub mod events;
pub mod normalize;
pub mod retry;
pub mod state;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedKind {
    /// Aggregated trades for one symbol (exchange spelling, e.g. `btcusdt`).
    AggTrade { symbol: String },
    /// Market-wide forced liquidation orders.
    Liquidation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDescriptor {
    pub name: String,
    pub uri: String,
    pub kind: FeedKind,
}

impl FeedDescriptor {
    pub fn agg_trade(base: &str, symbol: &str) -> Self {
        let symbol = symbol.to_lowercase();
        let name = format!("{}@aggTrade", symbol);
        Self {
            uri: format!("{}/ws/{}", base.trim_end_matches('/'), name),
            name,
            kind: FeedKind::AggTrade { symbol },
        }
    }

    pub fn liquidations(base: &str) -> Self {
        let name = "!forceOrder@arr".to_string();
        Self {
            uri: format!("{}/ws/{}", base.trim_end_matches('/'), name),
            name,
            kind: FeedKind::Liquidation,
        }
    }
}
