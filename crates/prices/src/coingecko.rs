//! CoinGecko-compatible quote provider.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::{prelude::FromPrimitive, Decimal};
use serde::Deserialize;
use tracing::warn;

use crate::{PriceError, QuoteFetcher};

/// Quote fetcher for the CoinGecko `simple/price` API.
pub struct CoinGecko {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct Quote {
    usd: Option<f64>,
}

impl CoinGecko {
    /// Create a new fetcher from price provider configuration.
    pub fn new(config: &common::config::Price) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_owned(),
        }
    }
}

#[async_trait]
impl QuoteFetcher for CoinGecko {
    async fn fetch(&self, asset_ids: &[String]) -> Result<HashMap<String, Decimal>, PriceError> {
        let response: HashMap<String, Quote> = self
            .http
            .get(format!("{}/simple/price", self.base_url))
            .query(&[
                ("ids", asset_ids.join(",")),
                ("vs_currencies", String::from("usd")),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .into_iter()
            .filter_map(|(asset_id, quote)| {
                // Non-finite quotes are dropped the same way missing ones are.
                let price = quote.usd.and_then(Decimal::from_f64);

                if price.is_none() {
                    warn!(%asset_id, "provider returned no usable quote");
                }

                price.map(|price| (asset_id, price))
            })
            .collect())
    }
}
