//! Binance Symbol Discovery
//!
//! Lists tradable symbols from `GET /api/v3/exchangeInfo`.

use std::time::Duration;

use async_trait::async_trait;

use super::messages::ExchangeInfoResponse;
use crate::application::ports::{DiscoveryError, SymbolDiscoveryPort};

const EXCHANGE_INFO_PATH: &str = "/api/v3/exchangeInfo";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// REST client for symbol discovery.
#[derive(Debug, Clone)]
pub struct BinanceSymbolDiscovery {
    http_client: reqwest::Client,
    base_url: String,
    quote_asset: Option<String>,
}

impl BinanceSymbolDiscovery {
    /// Create a discovery client for the REST API at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, quote_asset: Option<String>) -> Result<Self, DiscoveryError> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DiscoveryError::RequestFailed {
                message: e.to_string(),
            })?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            quote_asset,
        })
    }

    fn select_symbols(&self, response: ExchangeInfoResponse) -> Vec<String> {
        response
            .symbols
            .into_iter()
            .filter(|info| info.is_trading())
            .filter(|info| {
                self.quote_asset
                    .as_deref()
                    .is_none_or(|quote| info.quote_asset.eq_ignore_ascii_case(quote))
            })
            .map(|info| info.symbol)
            .collect()
    }
}

#[async_trait]
impl SymbolDiscoveryPort for BinanceSymbolDiscovery {
    async fn list_tradable_symbols(&self) -> Result<Vec<String>, DiscoveryError> {
        let url = format!("{}{EXCHANGE_INFO_PATH}", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| DiscoveryError::RequestFailed {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DiscoveryError::RequestFailed {
                message: format!("HTTP {status}: {body}"),
            });
        }

        let info: ExchangeInfoResponse =
            response
                .json()
                .await
                .map_err(|e| DiscoveryError::InvalidResponse {
                    message: e.to_string(),
                })?;

        let listed = info.symbols.len();
        let symbols = self.select_symbols(info);
        tracing::debug!(listed, tradable = symbols.len(), "Fetched exchange info");
        Ok(symbols)
    }
}
