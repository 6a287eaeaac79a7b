//! Ledger client configuration.
//!
//! Configures the target network, the wallet endpoint, the deployed
//! contract address and client timing. Defaults target a local Hardhat
//! node. Override via environment variables or explicit construction.

use std::time::Duration;

use credledger_core::Address;
use serde_json::Value;
use url::Url;

use crate::retry::RetryPolicy;

/// Chain id of the default network (Hardhat, `0x7A69`).
pub const DEFAULT_CHAIN_ID: u64 = 31337;

/// Address the contract lands at on a fresh Hardhat node.
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// Native currency descriptor sent with `wallet_addEthereumChain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// The network the client requires the wallet to be on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub chain_name: String,
    pub rpc_url: Url,
    pub native_currency: NativeCurrency,
}

impl NetworkConfig {
    /// Hardhat's local development network.
    pub fn hardhat_local() -> Result<Self, ConfigError> {
        Ok(Self {
            chain_id: DEFAULT_CHAIN_ID,
            chain_name: "Hardhat Local".to_string(),
            rpc_url: parse_url("rpc_url", DEFAULT_RPC_URL)?,
            native_currency: NativeCurrency {
                name: "ETH".to_string(),
                symbol: "ETH".to_string(),
                decimals: 18,
            },
        })
    }

    /// `0x`-prefixed chain id as wallets expect it.
    pub fn chain_id_hex(&self) -> String {
        format!("{:#x}", self.chain_id)
    }

    /// Parameters for `wallet_addEthereumChain`.
    pub fn add_chain_params(&self) -> Value {
        serde_json::json!([{
            "chainId": self.chain_id_hex(),
            "chainName": self.chain_name,
            "nativeCurrency": {
                "name": self.native_currency.name,
                "symbol": self.native_currency.symbol,
                "decimals": self.native_currency.decimals,
            },
            "rpcUrls": [self.rpc_url.as_str()],
        }])
    }
}

/// Full client configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// The network the wallet must be on.
    pub network: NetworkConfig,
    /// JSON-RPC endpoint of the wallet / signer.
    pub wallet_url: Url,
    /// Deployed credential contract.
    pub contract_address: Address,
    /// Per-request HTTP timeout in seconds.
    pub timeout_secs: u64,
    /// Interval between receipt and event polls.
    pub poll_interval: Duration,
    /// Upper bound on waiting for a transaction to be included. `None` waits forever.
    pub confirmation_timeout: Option<Duration>,
    /// Upper bound on wallet prompts. `None` waits forever.
    pub prompt_timeout: Option<Duration>,
    /// Backoff for read-only requests.
    pub retry: RetryPolicy,
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `CREDLEDGER_RPC_URL` (default: `http://127.0.0.1:8545`)
    /// - `CREDLEDGER_WALLET_URL` (default: the RPC URL)
    /// - `CREDLEDGER_CONTRACT_ADDRESS` (default: `0x5fbdb2315678afecb367f032d93f642f64180aa3`)
    /// - `CREDLEDGER_CHAIN_ID` (default: 31337)
    /// - `CREDLEDGER_CHAIN_NAME` (default: `Hardhat Local`)
    /// - `CREDLEDGER_TIMEOUT_SECS` (default: 30)
    /// - `CREDLEDGER_POLL_INTERVAL_MS` (default: 1000)
    /// - `CREDLEDGER_CONFIRMATION_TIMEOUT_SECS` (default: unbounded)
    /// - `CREDLEDGER_PROMPT_TIMEOUT_SECS` (default: unbounded)
    /// - `CREDLEDGER_MAX_RETRIES` (default: 3)
    /// - `CREDLEDGER_RETRY_BASE_MS` (default: 200)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut network = NetworkConfig::hardhat_local()?;
        network.rpc_url = env_url("CREDLEDGER_RPC_URL", DEFAULT_RPC_URL)?;
        if let Some(chain_id) = env_number("CREDLEDGER_CHAIN_ID")? {
            network.chain_id = chain_id;
        }
        if let Ok(name) = std::env::var("CREDLEDGER_CHAIN_NAME") {
            network.chain_name = name;
        }

        let wallet_url = match std::env::var("CREDLEDGER_WALLET_URL") {
            Ok(raw) => parse_url("CREDLEDGER_WALLET_URL", &raw)?,
            Err(_) => network.rpc_url.clone(),
        };

        let raw_contract = std::env::var("CREDLEDGER_CONTRACT_ADDRESS")
            .unwrap_or_else(|_| DEFAULT_CONTRACT_ADDRESS.to_string());
        let contract_address = Address::parse(&raw_contract).map_err(|e| {
            ConfigError::InvalidAddress("CREDLEDGER_CONTRACT_ADDRESS".to_string(), e.to_string())
        })?;

        Ok(Self {
            network,
            wallet_url,
            contract_address,
            timeout_secs: env_number("CREDLEDGER_TIMEOUT_SECS")?.unwrap_or(30),
            poll_interval: Duration::from_millis(
                env_number("CREDLEDGER_POLL_INTERVAL_MS")?.unwrap_or(1000),
            ),
            confirmation_timeout: env_number("CREDLEDGER_CONFIRMATION_TIMEOUT_SECS")?
                .map(Duration::from_secs),
            prompt_timeout: env_number("CREDLEDGER_PROMPT_TIMEOUT_SECS")?.map(Duration::from_secs),
            retry: env_retry_policy()?,
        })
    }

    /// Configuration pointing wallet and RPC at one local mock endpoint (for testing).
    pub fn local_mock(endpoint: &str) -> Result<Self, ConfigError> {
        let url = parse_url("endpoint", endpoint)?;
        let mut network = NetworkConfig::hardhat_local()?;
        network.rpc_url = url.clone();
        let contract_address = Address::parse(DEFAULT_CONTRACT_ADDRESS)
            .map_err(|e| ConfigError::InvalidAddress("contract".to_string(), e.to_string()))?;
        Ok(Self {
            network,
            wallet_url: url,
            contract_address,
            timeout_secs: 5,
            poll_interval: Duration::from_millis(10),
            confirmation_timeout: Some(Duration::from_secs(5)),
            prompt_timeout: Some(Duration::from_secs(5)),
            retry: RetryPolicy {
                max_retries: 3,
                base_delay: Duration::from_millis(10),
            },
        })
    }

    /// The HTTP timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn parse_url(var: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    parse_url(var, &raw)
}

fn env_retry_policy() -> Result<RetryPolicy, ConfigError> {
    let default = RetryPolicy::default();
    let max_retries = match env_number("CREDLEDGER_MAX_RETRIES")? {
        Some(n) => u32::try_from(n).map_err(|_| {
            ConfigError::InvalidNumber("CREDLEDGER_MAX_RETRIES".to_string(), n.to_string())
        })?,
        None => default.max_retries,
    };
    let base_delay = env_number("CREDLEDGER_RETRY_BASE_MS")?
        .map(Duration::from_millis)
        .unwrap_or(default.base_delay);
    Ok(RetryPolicy {
        max_retries,
        base_delay,
    })
}

fn env_number(var: &str) -> Result<Option<u64>, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber(var.to_string(), raw)),
        Err(_) => Ok(None),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid address for {0}: {1}")]
    InvalidAddress(String, String),
    #[error("invalid number for {0}: {1:?}")]
    InvalidNumber(String, String),
}
