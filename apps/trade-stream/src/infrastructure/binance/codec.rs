//! Aggregated Trade Decoder
//!
//! Decodes Binance aggTrade payloads into `AggTrade`. Accepts both the
//! combined stream envelope and the bare event object, so payloads cached
//! from either connection style replay the same way.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::messages::{AGG_TRADE_EVENT, AggTradeMessage};
use crate::application::ports::{DecodeError, TradeDecoder};
use crate::domain::trade::AggTrade;

/// Either shape a payload can take.
#[derive(Deserialize)]
#[serde(untagged)]
enum Payload {
    Envelope { data: AggTradeMessage },
    Bare(AggTradeMessage),
}

/// JSON decoder for Binance aggTrade events.
#[derive(Debug, Default, Clone, Copy)]
pub struct BinanceTradeDecoder;

impl BinanceTradeDecoder {
    /// Create a new decoder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Convert a wire message into the domain type.
    ///
    /// # Errors
    ///
    /// Returns an error for other event types or out-of-range timestamps.
    pub fn to_trade(message: AggTradeMessage) -> Result<AggTrade, DecodeError> {
        if message.event_type != AGG_TRADE_EVENT {
            return Err(DecodeError::UnexpectedEvent(message.event_type));
        }

        Ok(AggTrade {
            trade_time: millis_to_datetime("T", message.trade_time)?,
            event_time: millis_to_datetime("E", message.event_time)?,
            symbol: message.symbol,
            aggregate_id: message.aggregate_id,
            price: message.price,
            quantity: message.quantity,
            first_trade_id: message.first_trade_id,
            last_trade_id: message.last_trade_id,
            buyer_is_maker: message.buyer_is_maker,
        })
    }
}

impl TradeDecoder for BinanceTradeDecoder {
    fn decode(&self, payload: &[u8]) -> Result<AggTrade, DecodeError> {
        let message = match serde_json::from_slice::<Payload>(payload) {
            Ok(Payload::Envelope { data } | Payload::Bare(data)) => data,
            // Re-parse as the bare event for a precise error message.
            Err(_) => serde_json::from_slice::<AggTradeMessage>(payload)?,
        };
        Self::to_trade(message)
    }
}

fn millis_to_datetime(field: &'static str, millis: i64) -> Result<DateTime<Utc>, DecodeError> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| DecodeError::InvalidField {
        field,
        message: format!("timestamp {millis} out of range"),
    })
}
