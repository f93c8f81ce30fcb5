//! DAS indexer queries for NFT holdings by verified collection.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::json;

use crate::{backoff, rpc, UpstreamUnavailable};

/// Page size requested from the indexer. Iteration stops at the
/// first page shorter than this.
const PAGE_LIMIT: usize = 1000;

#[derive(Deserialize)]
struct AssetPage {
    #[serde(default)]
    items: Vec<Asset>,
}

#[derive(Deserialize)]
struct Asset {
    #[serde(default)]
    grouping: Vec<Grouping>,
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Grouping {
    group_key: String,
    group_value: Option<String>,
    verified: Option<bool>,
    collection_verified: Option<bool>,
}

#[derive(Deserialize)]
struct Content {
    metadata: Option<ContentMetadata>,
}

#[derive(Deserialize)]
struct ContentMetadata {
    collection: Option<MetadataCollection>,
}

#[derive(Deserialize)]
struct MetadataCollection {
    key: Option<String>,
    verified: Option<bool>,
}

/// Collection address an asset verifiably belongs to, if any.
///
/// Indexers disagree on where the verification flag lives: either a
/// `collection` grouping entry carries `verified`/`collection_verified`,
/// or the flag sits in the content metadata. Assets without a verified
/// collection key are skipped.
fn verified_collection(asset: &Asset) -> Option<&str> {
    let grouped = asset
        .grouping
        .iter()
        .filter(|group| group.group_key == "collection")
        .find(|group| {
            group
                .verified
                .or(group.collection_verified)
                .unwrap_or(false)
        })
        .and_then(|group| group.group_value.as_deref())
        .filter(|value| !value.is_empty());

    grouped.or_else(|| {
        let collection = asset.content.as_ref()?.metadata.as_ref()?.collection.as_ref()?;

        if collection.verified == Some(true) {
            collection.key.as_deref().filter(|key| !key.is_empty())
        } else {
            None
        }
    })
}

/// Count owned NFTs per verified collection, paging through the indexer.
pub(crate) async fn verified_collection_counts(
    http: &reqwest::Client,
    url: &str,
    wallet: &str,
) -> Result<HashMap<String, u64>, UpstreamUnavailable> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    let mut page = 1u64;

    loop {
        let response: AssetPage = backoff::with_retries("getAssetsByOwner", || {
            rpc::call(
                http,
                url,
                "getAssetsByOwner",
                json!({
                    "ownerAddress": wallet,
                    "page": page,
                    "limit": PAGE_LIMIT,
                }),
            )
        })
        .await?;

        let item_count = response.items.len();

        for asset in &response.items {
            if let Some(collection) = verified_collection(asset) {
                *counts.entry(collection.to_owned()).or_default() += 1;
            }
        }

        if item_count < PAGE_LIMIT {
            return Ok(counts);
        }

        page += 1;
    }
}
