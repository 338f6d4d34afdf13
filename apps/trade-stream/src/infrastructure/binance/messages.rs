//! Binance Message Types
//!
//! Wire types for the Binance spot API.
//!
//! # Aggregated Trade Event
//!
//! ```json
//! {
//!   "e": "aggTrade", "E": 1672515782136, "s": "BNBBTC", "a": 12345,
//!   "p": "0.001", "q": "100", "f": 100, "l": 105, "T": 1672515782136,
//!   "m": true, "M": true
//! }
//! ```
//!
//! On a combined stream connection every event is wrapped in an envelope:
//! `{"stream": "bnbbtc@aggTrade", "data": { ... }}`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Event type of aggregated trade messages.
pub const AGG_TRADE_EVENT: &str = "aggTrade";

/// Symbol status for symbols open for trading.
pub const TRADING_STATUS: &str = "TRADING";

// =============================================================================
// Stream Messages
// =============================================================================

/// Aggregated trade event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggTradeMessage {
    /// Event type, always "aggTrade".
    #[serde(rename = "e")]
    pub event_type: String,

    /// Event time in milliseconds.
    #[serde(rename = "E")]
    pub event_time: i64,

    /// Symbol.
    #[serde(rename = "s")]
    pub symbol: String,

    /// Aggregate trade ID.
    #[serde(rename = "a")]
    pub aggregate_id: u64,

    /// Price, sent as a decimal string.
    #[serde(rename = "p", with = "rust_decimal::serde::str")]
    pub price: Decimal,

    /// Quantity, sent as a decimal string.
    #[serde(rename = "q", with = "rust_decimal::serde::str")]
    pub quantity: Decimal,

    /// First trade ID.
    #[serde(rename = "f")]
    pub first_trade_id: u64,

    /// Last trade ID.
    #[serde(rename = "l")]
    pub last_trade_id: u64,

    /// Trade time in milliseconds.
    #[serde(rename = "T")]
    pub trade_time: i64,

    /// Is the buyer the market maker?
    #[serde(rename = "m")]
    pub buyer_is_maker: bool,

    /// Ignored by this service.
    #[serde(rename = "M", default)]
    pub best_match: bool,
}

/// Combined stream envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamEnvelope<T> {
    /// Stream name (e.g., "btcusdt@aggTrade").
    pub stream: String,
    /// Wrapped event.
    pub data: T,
}

// =============================================================================
// REST Messages
// =============================================================================

/// Response of `GET /api/v3/exchangeInfo`. Only the fields used here.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfoResponse {
    /// Listed symbols.
    pub symbols: Vec<SymbolInfo>,
}

/// A listed symbol.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    /// Symbol (e.g., "ETHBTC").
    pub symbol: String,
    /// Trading status (e.g., "TRADING", "BREAK").
    pub status: String,
    /// Base asset (e.g., "ETH").
    #[serde(default)]
    pub base_asset: String,
    /// Quote asset (e.g., "BTC").
    #[serde(default)]
    pub quote_asset: String,
}

impl SymbolInfo {
    /// Whether the symbol is open for trading.
    #[must_use]
    pub fn is_trading(&self) -> bool {
        self.status == TRADING_STATUS
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    const AGG_TRADE_JSON: &str = r#"{"e":"aggTrade","E":1672515782136,"s":"BNBBTC","a":12345,"p":"0.001","q":"100","f":100,"l":105,"T":1672515782136,"m":true,"M":true}"#;

    #[test]
    fn deserialize_agg_trade() {
        let msg: AggTradeMessage = serde_json::from_str(AGG_TRADE_JSON).unwrap();
        assert_eq!(msg.event_type, AGG_TRADE_EVENT);
        assert_eq!(msg.symbol, "BNBBTC");
        assert_eq!(msg.aggregate_id, 12345);
        assert_eq!(msg.price, Decimal::from_str("0.001").unwrap());
        assert_eq!(msg.quantity, Decimal::from(100));
        assert_eq!(msg.first_trade_id, 100);
        assert_eq!(msg.last_trade_id, 105);
        assert!(msg.buyer_is_maker);
    }

    #[test]
    fn deserialize_envelope() {
        let json = format!(r#"{{"stream":"bnbbtc@aggTrade","data":{AGG_TRADE_JSON}}}"#);
        let envelope: StreamEnvelope<AggTradeMessage> = serde_json::from_str(&json).unwrap();
        assert_eq!(envelope.stream, "bnbbtc@aggTrade");
        assert_eq!(envelope.data.symbol, "BNBBTC");
    }

    #[test]
    fn deserialize_exchange_info() {
        let json = r#"{
            "timezone": "UTC",
            "serverTime": 1565246363776,
            "symbols": [
                {"symbol": "ETHBTC", "status": "TRADING", "baseAsset": "ETH", "quoteAsset": "BTC"},
                {"symbol": "LUNABTC", "status": "BREAK", "baseAsset": "LUNA", "quoteAsset": "BTC"}
            ]
        }"#;

        let info: ExchangeInfoResponse = serde_json::from_str(json).unwrap();
        assert_eq!(info.symbols.len(), 2);
        assert!(info.symbols[0].is_trading());
        assert!(!info.symbols[1].is_trading());
        assert_eq!(info.symbols[0].quote_asset, "BTC");
    }
}
