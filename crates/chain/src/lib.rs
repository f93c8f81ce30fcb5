//! # Chain holdings adapter
//!
//! This crate fetches a point-in-time view of a wallet's relevant on-chain
//! holdings: SPL token balances aggregated per mint and NFT counts grouped
//! by verified collection.
//!
//! Token balances come from the Solana JSON-RPC endpoint, NFT data from a
//! DAS-compatible asset indexer. Every upstream call retries on a bounded
//! backoff schedule; exhaustion surfaces as [`UpstreamUnavailable`], which
//! callers are expected to treat as fail-open.

mod backoff;
mod das;
mod rpc;

use std::collections::HashMap;

use async_trait::async_trait;
use derive_more::{Display, Error, From};
use rust_decimal::Decimal;

pub use backoff::UpstreamUnavailable;

/// Which holdings slices a snapshot should include.
///
/// Callers that only evaluate token rules can skip the indexer round-trips
/// entirely, and vice versa.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SnapshotSlices {
    pub include_tokens: bool,
    pub include_nfts: bool,
}

impl SnapshotSlices {
    /// A snapshot request that touches no upstream at all.
    pub fn empty() -> Self {
        Self {
            include_tokens: false,
            include_nfts: false,
        }
    }
}

/// Point-in-time view of a wallet's relevant holdings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletSnapshot {
    /// Base58 wallet public key this snapshot belongs to.
    pub wallet: String,

    /// UI-scaled token balance per mint, duplicate accounts summed.
    pub token_balances_by_mint: HashMap<String, Decimal>,

    /// Count of owned NFTs per verified collection address.
    pub nft_counts_by_verified_collection: HashMap<String, u64>,
}

/// Errors that may occur during a single upstream call.
#[derive(Debug, Display, Error, From)]
pub enum CallError {
    /// Transport-level failure.
    HttpError(reqwest::Error),

    /// Upstream returned a JSON-RPC error object.
    #[display(fmt = "rpc error {}: {}", code, message)]
    RpcError {
        code: i64,
        #[error(not(source))]
        message: String,
    },

    /// Upstream response did not match the expected shape.
    MalformedResponse(serde_json::Error),

    /// Upstream returned a token amount that is not a valid decimal.
    InvalidAmount(rust_decimal::Error),
}

/// Source of wallet holdings snapshots.
///
/// The reconciliation worker only sees this seam, which keeps role sync
/// testable without a chain endpoint.
#[async_trait]
pub trait HoldingsProvider: Send + Sync {
    /// Fetch the requested holdings slices for a wallet.
    async fn snapshot(
        &self,
        wallet: &str,
        slices: SnapshotSlices,
    ) -> Result<WalletSnapshot, UpstreamUnavailable>;
}

/// Holdings provider backed by Solana JSON-RPC and a DAS indexer.
pub struct ChainClient {
    http: reqwest::Client,
    rpc_url: String,
    das_url: String,
}

impl ChainClient {
    /// Create a new client from chain endpoint configuration.
    pub fn new(config: &common::config::Chain) -> Self {
        Self {
            http: reqwest::Client::new(),
            rpc_url: config.rpc_url.clone(),
            das_url: config.das_url.clone(),
        }
    }
}

#[async_trait]
impl HoldingsProvider for ChainClient {
    async fn snapshot(
        &self,
        wallet: &str,
        slices: SnapshotSlices,
    ) -> Result<WalletSnapshot, UpstreamUnavailable> {
        let mut snapshot = WalletSnapshot {
            wallet: wallet.to_owned(),
            ..Default::default()
        };

        if slices.include_tokens {
            snapshot.token_balances_by_mint = backoff::with_retries("getTokenAccountsByOwner", || {
                rpc::token_balances(&self.http, &self.rpc_url, wallet)
            })
            .await?;
        }

        if slices.include_nfts {
            snapshot.nft_counts_by_verified_collection =
                das::verified_collection_counts(&self.http, &self.das_url, wallet).await?;
        }

        Ok(snapshot)
    }
}
