//! # Price cache
//!
//! TTL-bounded store of USD quotes for external asset ids, backed by the
//! `price_quotes` table. Cache misses are batched into one upstream call
//! against a CoinGecko-compatible API; concurrent callers coalesce on a
//! single in-flight fetch.
//!
//! An asset id absent from the returned map means "price unknown" - the
//! caller decides what that implies (the reconciliation worker treats
//! USD-denominated rules as indeterminate).

mod coingecko;

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use db::{
    price_quote, sea_query::OnConflict, ActiveValue, ColumnTrait, DatabaseConnection, DbErr,
    Duration, EntityTrait, QueryFilter,
};
use derive_more::{Display, Error, From};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::debug;

pub use coingecko::CoinGecko;

/// Errors that may occur during a price lookup.
#[derive(Debug, Display, Error, From)]
pub enum PriceError {
    /// Database-related error.
    DatabaseError(DbErr),

    /// Upstream quote provider failure.
    HttpError(reqwest::Error),
}

/// Upstream quote provider.
#[async_trait]
pub trait QuoteFetcher: Send + Sync {
    /// Fetch current USD quotes for the requested asset ids.
    ///
    /// Ids the provider does not know may be absent from the result.
    async fn fetch(&self, asset_ids: &[String]) -> Result<HashMap<String, Decimal>, PriceError>;
}

/// USD price lookup seam consumed by the reconciliation worker.
#[async_trait]
pub trait PriceLookup: Send + Sync {
    /// Resolve USD prices for a set of asset ids.
    ///
    /// Ids with no known price are absent from the returned map.
    async fn usd_prices(
        &self,
        asset_ids: &BTreeSet<String>,
    ) -> Result<HashMap<String, Decimal>, PriceError>;
}

/// TTL-bounded price cache with single-flight upstream fetches.
pub struct PriceCache<F> {
    db: DatabaseConnection,
    fetcher: F,
    ttl: Duration,

    /// Serializes upstream fetches so concurrent misses coalesce.
    fetch_gate: Mutex<()>,
}

impl<F: QuoteFetcher> PriceCache<F> {
    /// Create a new cache with the provided quote TTL.
    pub fn new(db: DatabaseConnection, fetcher: F, ttl: Duration) -> Self {
        Self {
            db,
            fetcher,
            ttl,
            fetch_gate: Mutex::new(()),
        }
    }

    /// Load quotes for the requested ids that are still within TTL.
    async fn fresh_quotes(
        &self,
        asset_ids: &BTreeSet<String>,
    ) -> Result<HashMap<String, Decimal>, PriceError> {
        let oldest_usable = db::now() - self.ttl;

        let quotes = price_quote::Entity::find()
            .filter(price_quote::Column::AssetId.is_in(asset_ids.iter().cloned()))
            .all(&self.db)
            .await?;

        Ok(quotes
            .into_iter()
            .filter(|quote| quote.fetched_at >= oldest_usable)
            .map(|quote| (quote.asset_id, quote.price_usd))
            .collect())
    }

    /// Fetch quotes for the provided ids and upsert them into the cache.
    async fn fetch_and_store(
        &self,
        missing: Vec<String>,
    ) -> Result<HashMap<String, Decimal>, PriceError> {
        let fetched = self.fetcher.fetch(&missing).await?;

        for (asset_id, price_usd) in &fetched {
            price_quote::Entity::insert(price_quote::ActiveModel {
                asset_id: ActiveValue::Set(asset_id.clone()),
                price_usd: ActiveValue::Set(*price_usd),
                fetched_at: ActiveValue::Set(db::now()),
            })
            .on_conflict(
                OnConflict::column(price_quote::Column::AssetId)
                    .update_columns([
                        price_quote::Column::PriceUsd,
                        price_quote::Column::FetchedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        }

        Ok(fetched)
    }
}

#[async_trait]
impl<F: QuoteFetcher> PriceLookup for PriceCache<F> {
    async fn usd_prices(
        &self,
        asset_ids: &BTreeSet<String>,
    ) -> Result<HashMap<String, Decimal>, PriceError> {
        if asset_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut prices = self.fresh_quotes(asset_ids).await?;

        if prices.len() == asset_ids.len() {
            return Ok(prices);
        }

        let _flight = self.fetch_gate.lock().await;

        // Another flight may have filled the cache while this caller
        // waited on the gate.
        prices = self.fresh_quotes(asset_ids).await?;

        let missing: Vec<String> = asset_ids
            .iter()
            .filter(|id| !prices.contains_key(*id))
            .cloned()
            .collect();

        if missing.is_empty() {
            return Ok(prices);
        }

        debug!(count = missing.len(), "fetching quotes from upstream");

        prices.extend(self.fetch_and_store(missing).await?);

        Ok(prices)
    }
}
