//! Raw frame decoding for the Binance aggTrade and forceOrder streams.

use serde::Deserialize;
use serde_json::Value;

use super::events::{FeedEvent, LiquidationEvent, ReceivedFields, Side, TradeEvent};
use crate::error::ParseError;

/// Binance sends most numbers as JSON strings; accept either.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Num {
    Text(String),
    Number(serde_json::Number),
}

impl Num {
    fn raw(&self) -> String {
        match self {
            Num::Text(s) => s.clone(),
            Num::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WsAggTrade {
    #[serde(rename = "s")]
    symbol: Option<String>,
    #[serde(rename = "p")]
    price: Option<Num>,
    #[serde(rename = "q")]
    qty: Option<Num>,
    #[serde(rename = "T")]
    trade_time: Option<Num>,
    #[serde(rename = "m")]
    is_buyer_maker: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct WsForceOrder {
    #[serde(rename = "o")]
    order: Option<WsLiqOrder>,
}

#[derive(Debug, Deserialize)]
struct WsLiqOrder {
    #[serde(rename = "s")]
    symbol: Option<String>,
    #[serde(rename = "S")]
    side: Option<String>,
    #[serde(rename = "o")]
    order_type: Option<String>,
    #[serde(rename = "f")]
    time_in_force: Option<String>,
    #[serde(rename = "q")]
    original_qty: Option<Num>,
    #[serde(rename = "p")]
    price: Option<Num>,
    #[serde(rename = "ap")]
    avg_price: Option<Num>,
    #[serde(rename = "X")]
    order_status: Option<String>,
    #[serde(rename = "l")]
    last_filled_qty: Option<Num>,
    #[serde(rename = "z")]
    filled_accumulated_qty: Option<Num>,
    #[serde(rename = "T")]
    trade_time: Option<Num>,
}

fn required<T>(field: &'static str, v: Option<T>) -> Result<T, ParseError> {
    v.ok_or(ParseError::MissingField(field))
}

/// Returns the parsed value and the text it was parsed from. Prices and
/// quantities are never negative.
fn number(field: &'static str, v: Option<Num>) -> Result<(f64, String), ParseError> {
    let raw = required(field, v)?.raw();
    match raw.trim().parse::<f64>() {
        Ok(x) if x.is_finite() && x >= 0.0 => Ok((x, raw)),
        _ => Err(ParseError::InvalidNumber { field, value: raw }),
    }
}

fn millis(field: &'static str, v: Option<Num>) -> Result<(i64, String), ParseError> {
    let raw = required(field, v)?.raw();
    match raw.trim().parse::<i64>() {
        Ok(ms) => Ok((ms, raw)),
        Err(_) => Err(ParseError::InvalidNumber { field, value: raw }),
    }
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    quote_suffix: String,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new("USDT")
    }
}

impl Normalizer {
    pub fn new(quote_suffix: impl Into<String>) -> Self {
        Self {
            quote_suffix: quote_suffix.into().to_uppercase(),
        }
    }

    /// Upper-cases and strips the quote currency, e.g. `btcusdt` → `BTC`.
    pub fn display_symbol(&self, symbol: &str) -> String {
        let upper = symbol.to_uppercase();
        match upper.strip_suffix(self.quote_suffix.as_str()) {
            Some(base) if !base.is_empty() => base.to_string(),
            _ => upper,
        }
    }

    pub fn decode(&self, raw: &str) -> Result<FeedEvent, ParseError> {
        let mut value: Value = serde_json::from_str(raw)?;

        // Combined-stream envelope: {"stream": "...", "data": {...}}
        if value.get("stream").is_some() {
            if let Some(data) = value.get_mut("data").map(Value::take) {
                value = data;
            }
        }

        let event_type = value
            .get("e")
            .and_then(Value::as_str)
            .ok_or(ParseError::MissingField("e"))?
            .to_string();

        match event_type.as_str() {
            "aggTrade" => self.decode_trade(value).map(FeedEvent::Trade),
            "forceOrder" => self.decode_liquidation(value).map(FeedEvent::Liquidation),
            other => Err(ParseError::UnknownEvent(other.to_string())),
        }
    }

    fn decode_trade(&self, value: Value) -> Result<TradeEvent, ParseError> {
        let msg: WsAggTrade = serde_json::from_value(value)?;
        let symbol = self.display_symbol(&required("s", msg.symbol)?);
        let (price, _) = number("p", msg.price)?;
        let (qty, _) = number("q", msg.qty)?;
        let (trade_time_ms, _) = millis("T", msg.trade_time)?;
        let is_buyer_maker = required("m", msg.is_buyer_maker)?;
        Ok(TradeEvent::new(symbol, price, qty, trade_time_ms, is_buyer_maker))
    }

    fn decode_liquidation(&self, value: Value) -> Result<LiquidationEvent, ParseError> {
        let msg: WsForceOrder = serde_json::from_value(value)?;
        let o = required("o", msg.order)?;

        let symbol = self.display_symbol(&required("s", o.symbol)?);
        let side_raw = required("S", o.side)?;
        let side = Side::parse(&side_raw).ok_or_else(|| ParseError::InvalidSide(side_raw.clone()))?;
        let (original_quantity, original_quantity_raw) = number("q", o.original_qty)?;
        let (price, price_raw) = number("p", o.price)?;
        let (average_price, average_price_raw) = number("ap", o.avg_price)?;
        let (last_filled_quantity, last_filled_raw) = number("l", o.last_filled_qty)?;
        let (filled_accumulated_quantity, filled_accumulated_raw) =
            number("z", o.filled_accumulated_qty)?;
        let (trade_time_ms, trade_time_raw) = millis("T", o.trade_time)?;

        Ok(LiquidationEvent {
            symbol,
            side,
            order_type: required("o", o.order_type)?,
            time_in_force: required("f", o.time_in_force)?,
            original_quantity,
            price,
            average_price,
            order_status: required("X", o.order_status)?,
            last_filled_quantity,
            filled_accumulated_quantity,
            trade_time_ms,
            notional: filled_accumulated_quantity * price,
            received: ReceivedFields {
                original_quantity: original_quantity_raw,
                price: price_raw,
                average_price: average_price_raw,
                last_filled_quantity: last_filled_raw,
                filled_accumulated_quantity: filled_accumulated_raw,
                trade_time: trade_time_raw,
            },
        })
    }
}
