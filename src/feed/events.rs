use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Aggressor side of an aggregated trade. A buyer-maker print means the
    /// seller crossed the spread.
    pub fn from_buyer_maker(is_buyer_maker: bool) -> Self {
        if is_buyer_maker {
            Side::Sell
        } else {
            Side::Buy
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BUY" | "buy" | "Buy" => Some(Side::Buy),
            "SELL" | "sell" | "Sell" => Some(Side::Sell),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeEvent {
    pub symbol: String,
    pub side: Side,
    pub price: f64,
    pub quantity: f64,
    pub notional: f64,
    /// Exchange trade time, epoch ms.
    pub trade_time_ms: i64,
    pub is_buyer_maker: bool,
}

impl TradeEvent {
    pub fn new(symbol: String, price: f64, quantity: f64, trade_time_ms: i64, is_buyer_maker: bool) -> Self {
        Self {
            symbol,
            side: Side::from_buyer_maker(is_buyer_maker),
            price,
            quantity,
            notional: price * quantity,
            trade_time_ms,
            is_buyer_maker,
        }
    }
}

/// Numeric liquidation fields exactly as the exchange sent them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReceivedFields {
    pub original_quantity: String,
    pub price: String,
    pub average_price: String,
    pub last_filled_quantity: String,
    pub filled_accumulated_quantity: String,
    pub trade_time: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiquidationEvent {
    pub symbol: String,
    pub side: Side,
    pub order_type: String,
    pub time_in_force: String,
    pub original_quantity: f64,
    pub price: f64,
    pub average_price: f64,
    pub order_status: String,
    pub last_filled_quantity: f64,
    pub filled_accumulated_quantity: f64,
    pub trade_time_ms: i64,
    /// filled_accumulated_quantity × price
    pub notional: f64,
    pub received: ReceivedFields,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Trade(TradeEvent),
    Liquidation(LiquidationEvent),
}
