//! Binance Combined Stream Client
//!
//! Opens one WebSocket connection carrying every requested stream:
//! `{base}/stream?streams=btcusdt@aggTrade/ethbtc@aggTrade/...`
//!
//! The server pings every few minutes and drops connections that do not
//! answer; pings are answered inline while reading. A close frame is reported
//! as a read error so the caller reconnects. Sets larger than
//! `MAX_STREAMS_PER_CONNECTION` are refused before dialing.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::application::ports::{FeedClientPort, FeedConnection, FeedError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Most streams Binance accepts on one combined stream connection.
pub const MAX_STREAMS_PER_CONNECTION: usize = 1024;

/// Factory for combined stream connections.
#[derive(Debug, Clone)]
pub struct BinanceFeedClient {
    base_url: String,
}

impl BinanceFeedClient {
    /// Create a client for the stream endpoint at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Combined stream URL for `streams`.
    #[must_use]
    pub fn stream_url(&self, streams: &[String]) -> String {
        format!("{}/stream?streams={}", self.base_url, streams.join("/"))
    }
}

#[async_trait]
impl FeedClientPort for BinanceFeedClient {
    async fn connect(&self, streams: &[String]) -> Result<Box<dyn FeedConnection>, FeedError> {
        if streams.len() > MAX_STREAMS_PER_CONNECTION {
            tracing::warn!(
                streams = streams.len(),
                limit = MAX_STREAMS_PER_CONNECTION,
                "Too many streams for one connection, set TRADE_STREAM_QUOTE_ASSET to narrow discovery"
            );
            return Err(FeedError::ConnectionFailed {
                message: format!(
                    "{} streams exceed the per-connection limit of {MAX_STREAMS_PER_CONNECTION}",
                    streams.len()
                ),
            });
        }

        let url = self.stream_url(streams);
        tracing::debug!(streams = streams.len(), "Connecting to Binance combined stream");

        let (ws, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| FeedError::ConnectionFailed {
                message: e.to_string(),
            })?;

        Ok(Box::new(BinanceFeedConnection { ws }))
    }
}

/// An open combined stream connection.
pub struct BinanceFeedConnection {
    ws: WsStream,
}

impl std::fmt::Debug for BinanceFeedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceFeedConnection").finish_non_exhaustive()
    }
}

#[async_trait]
impl FeedConnection for BinanceFeedConnection {
    async fn read_next(&mut self) -> Result<Vec<u8>, FeedError> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.as_str().as_bytes().to_vec()),
                Some(Ok(Message::Binary(data))) => return Ok(data.to_vec()),
                Some(Ok(Message::Ping(data))) => {
                    self.ws
                        .send(Message::Pong(data))
                        .await
                        .map_err(|e| FeedError::ReadFailed {
                            message: format!("failed to answer ping: {e}"),
                        })?;
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "Server sent close frame");
                    return Err(FeedError::ConnectionClosed);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    return Err(FeedError::ReadFailed {
                        message: e.to_string(),
                    });
                }
                None => return Err(FeedError::ConnectionClosed),
            }
        }
    }
}
