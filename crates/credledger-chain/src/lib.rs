//! # credledger-chain: Ledger Access
//!
//! Everything that talks to the credential contract:
//!
//! - [`connector`]: wallet session establishment and network switching.
//! - [`gateway`]: the typed contract surface over a session.
//! - [`memory`]: an in-process ledger enforcing the same rules.
//! - [`offline`]: a ledger that only knows its account, used when the
//!   wallet is unreachable.
//! - [`ledger`]: the [`CredentialLedger`] trait both implement.
//!
//! ## Crate Policy
//!
//! - Depends on `credledger-core` for identifiers and records only.
//! - Reads and receipt polls retry unreachable endpoints and transient
//!   HTTP statuses under a [`RetryPolicy`].
//!   Prompts and transaction submissions are sent exactly once.
//! - No `.unwrap()` outside tests.

pub mod abi;
pub mod config;
pub mod connector;
pub mod contract;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod memory;
pub mod offline;
pub mod provider;
pub(crate) mod retry;

pub use config::{ConfigError, LedgerConfig, NativeCurrency, NetworkConfig};
pub use connector::{ChainConnector, Session, Signer};
pub use error::{ChainError, ConnectError};
pub use gateway::ContractGateway;
pub use ledger::{CredentialLedger, CredentialVerified, EventCursor, TxReceipt};
pub use memory::{MemoryLedger, MemoryLedgerHandle};
pub use offline::OfflineLedger;
pub use provider::{HttpProvider, ProviderError, WalletProvider};
pub use retry::RetryPolicy;
