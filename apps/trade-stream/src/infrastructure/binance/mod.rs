//! Binance Spot Adapters
//!
//! - `BinanceSymbolDiscovery`: REST symbol discovery
//! - `BinanceFeedClient`: combined stream WebSocket connections
//! - `BinanceTradeDecoder`: aggTrade JSON decoding

pub mod codec;
pub mod discovery;
pub mod feed;
pub mod messages;

pub use codec::BinanceTradeDecoder;
pub use discovery::BinanceSymbolDiscovery;
pub use feed::{BinanceFeedClient, BinanceFeedConnection, MAX_STREAMS_PER_CONNECTION};
