//! Solana JSON-RPC queries for SPL token balances.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;

use crate::CallError;

/// SPL token program id.
const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

#[derive(Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Issue a single JSON-RPC call and unwrap the response envelope.
pub(crate) async fn call<P: Serialize, T: DeserializeOwned>(
    http: &reqwest::Client,
    url: &str,
    method: &str,
    params: P,
) -> Result<T, CallError> {
    let envelope: RpcEnvelope<T> = http
        .post(url)
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    if let Some(error) = envelope.error {
        return Err(CallError::RpcError {
            code: error.code,
            message: error.message,
        });
    }

    envelope.result.ok_or(CallError::RpcError {
        code: 0,
        message: String::from("response carries neither result nor error"),
    })
}

#[derive(Deserialize)]
struct TokenAccountsResponse {
    value: Vec<TokenAccount>,
}

#[derive(Deserialize)]
struct TokenAccount {
    account: Account,
}

#[derive(Deserialize)]
struct Account {
    data: AccountData,
}

#[derive(Deserialize)]
struct AccountData {
    parsed: ParsedData,
}

#[derive(Deserialize)]
struct ParsedData {
    info: TokenInfo,
}

#[derive(Deserialize)]
struct TokenInfo {
    mint: String,
    #[serde(rename = "tokenAmount")]
    token_amount: TokenAmount,
}

#[derive(Deserialize)]
struct TokenAmount {
    #[serde(rename = "uiAmountString")]
    ui_amount_string: String,
}

/// Fetch UI-scaled token balances aggregated per mint.
///
/// A wallet may own several token accounts for the same mint;
/// their balances are summed. Zero-balance accounts are kept.
pub(crate) async fn token_balances(
    http: &reqwest::Client,
    url: &str,
    wallet: &str,
) -> Result<HashMap<String, Decimal>, CallError> {
    let response: TokenAccountsResponse = call(
        http,
        url,
        "getTokenAccountsByOwner",
        json!([
            wallet,
            { "programId": TOKEN_PROGRAM_ID },
            { "encoding": "jsonParsed" },
        ]),
    )
    .await?;

    aggregate_balances(response.value)
}

fn aggregate_balances(accounts: Vec<TokenAccount>) -> Result<HashMap<String, Decimal>, CallError> {
    let mut balances: HashMap<String, Decimal> = HashMap::new();

    for account in accounts {
        let info = account.account.data.parsed.info;
        let amount: Decimal = info.token_amount.ui_amount_string.parse()?;

        *balances.entry(info.mint).or_default() += amount;
    }

    Ok(balances)
}
