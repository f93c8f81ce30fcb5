use std::net::SocketAddr;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

#[cfg(feature = "logging")]
use tracing_subscriber::filter::LevelFilter;

/// Database configuration.
#[derive(Deserialize)]
pub struct Database {
    /// Database URL string.
    pub url: String,

    /// Run pending migrations on startup.
    #[serde(default)]
    pub auto_migrate: bool,
}

/// HTTP server configuration.
#[derive(Deserialize)]
pub struct Server {
    /// Address, that HTTP server will listen on.
    pub address: SocketAddr,
}

/// Implementation of [`serde`]'s deserializer for [`FromStr`] types.
#[cfg(feature = "logging")]
fn deserialize_from_str<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error,
    D: serde::de::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    std::str::FromStr::from_str(&s).map_err(serde::de::Error::custom)
}

/// Logging configuration.
#[cfg(feature = "logging")]
#[derive(Deserialize)]
pub struct Logging {
    /// Log level.
    #[serde(deserialize_with = "deserialize_from_str")]
    pub level: LevelFilter,
}

#[cfg(feature = "logging")]
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
        }
    }
}

/// Discord bot credentials.
#[derive(Deserialize)]
pub struct Discord {
    /// Bot token used for REST calls against the Discord API.
    pub bot_token: String,
}

/// Chain data source configuration.
#[derive(Deserialize)]
pub struct Chain {
    /// Solana JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// DAS-compatible asset indexer endpoint URL.
    pub das_url: String,
}

/// Wallet verification configuration.
#[derive(Deserialize)]
pub struct Verification {
    /// Public base URL of the signing page, used to build deep links.
    pub public_base_url: String,

    /// Symmetric secret for verify token signing. At least 32 characters.
    pub hmac_secret: String,

    /// Shared secret for internal API routes. At least 16 characters.
    pub internal_secret: String,

    /// Verification session lifetime, in minutes.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_minutes: u64,
}

/// Reconciliation worker configuration.
#[derive(Deserialize)]
pub struct Worker {
    /// Count of per-member checks running concurrently within one guild.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Cron expression for scheduled reconciliation cycles.
    ///
    /// Six-field form with a leading seconds component.
    #[serde(default = "default_cron")]
    pub cron: String,

    /// Days of audit log history to retain.
    #[serde(default = "default_audit_retention")]
    pub audit_retention_days: u32,
}

impl Default for Worker {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            cron: default_cron(),
            audit_retention_days: default_audit_retention(),
        }
    }
}

/// Price provider configuration.
#[derive(Deserialize)]
pub struct Price {
    /// Base URL of a CoinGecko-compatible price API.
    #[serde(default = "default_price_base_url")]
    pub base_url: String,

    /// Cached quote lifetime, in seconds.
    #[serde(default = "default_price_ttl")]
    pub ttl_seconds: u64,
}

impl Default for Price {
    fn default() -> Self {
        Self {
            base_url: default_price_base_url(),
            ttl_seconds: default_price_ttl(),
        }
    }
}

// Default values used for worker, verification and price configuration.
// These match the documented deployment defaults.
fn default_session_ttl() -> u64 {
    10
}

fn default_concurrency() -> usize {
    20
}

fn default_cron() -> String {
    String::from("0 0 */12 * * *")
}

fn default_audit_retention() -> u32 {
    90
}

fn default_price_base_url() -> String {
    String::from("https://api.coingecko.com/api/v3")
}

fn default_price_ttl() -> u64 {
    60
}

/// General configuration.
#[derive(Deserialize)]
pub struct Config {
    /// General database configuration.
    pub database: Database,

    /// HTTP server configuration.
    #[serde(default)]
    pub server: Option<Server>,

    /// Logging configuration.
    #[cfg(feature = "logging")]
    #[serde(default)]
    pub logging: Logging,

    /// Discord credentials.
    pub discord: Discord,

    /// Chain data source configuration.
    pub chain: Chain,

    /// Wallet verification configuration.
    pub verification: Verification,

    /// Reconciliation worker configuration.
    #[serde(default)]
    pub worker: Worker,

    /// Price provider configuration.
    #[serde(default)]
    pub price: Price,
}

impl Config {
    /// Create new config using default configuration file or environment variables.
    ///
    /// See [`Env`] for more details on how to use environment variables configuration.
    ///
    /// [`Env`]: figment::providers::Env
    pub fn new() -> Result<Self, figment::Error> {
        // Keys themselves contain underscores (e.g. `hmac_secret`), so
        // sections are separated with a double underscore:
        // `CONFIG_VERIFICATION__HMAC_SECRET`.
        let config: Self = Figment::new()
            .merge(Toml::file("Config.toml"))
            .merge(Env::prefixed("CONFIG_").split("__"))
            .extract()?;

        config.validate()?;

        Ok(config)
    }

    /// Reject configurations with secrets too short to provide
    /// the expected security margin.
    fn validate(&self) -> Result<(), figment::Error> {
        if self.verification.hmac_secret.len() < 32 {
            return Err(figment::Error::from(String::from(
                "verification.hmac_secret must be at least 32 characters",
            )));
        }

        if self.verification.internal_secret.len() < 16 {
            return Err(figment::Error::from(String::from(
                "verification.internal_secret must be at least 16 characters",
            )));
        }

        Ok(())
    }

    /// Create new config suitable for running unit tests.
    #[cfg(feature = "test-utils")]
    pub fn for_tests() -> Self {
        Self {
            database: Database {
                url: String::from("sqlite::memory:"),
                auto_migrate: true,
            },
            server: Some(Server {
                address: "127.0.0.1:3000".parse().unwrap(),
            }),
            #[cfg(feature = "logging")]
            logging: Logging::default(),
            discord: Discord {
                bot_token: String::from("test-bot-token"),
            },
            chain: Chain {
                rpc_url: String::from("http://127.0.0.1:8899"),
                das_url: String::from("http://127.0.0.1:8900"),
            },
            verification: Verification {
                public_base_url: String::from("http://127.0.0.1:3000"),
                hmac_secret: String::from("test-hmac-secret-0123456789abcdef"),
                internal_secret: String::from("test-internal-secret"),
                session_ttl_minutes: default_session_ttl(),
            },
            worker: Worker::default(),
            price: Price::default(),
        }
    }
}
