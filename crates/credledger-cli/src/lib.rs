//! # credledger-cli: Terminal Client
//!
//! Provides the `credledger` command-line interface over the projection
//! engine: connect a wallet, show role views, and submit actions.
//!
//! ## Subcommands
//!
//! - `credledger connect`: Connect the wallet and print the account.
//! - `credledger request` / `approve` / `share` / `verify`: Submit an
//!   action, wait for confirmation and print the refreshed view.
//! - `credledger show <view>`: Refresh and print one view.
//! - `credledger watch <view>`: Re-print a view on every verification.
//!
//! `show` and `watch` still print the last saved views of the previously
//! connected account when the wallet cannot be reached, and exit with
//! status 2.
//!
//! ```bash
//! credledger show pending-approvals
//! credledger approve --id 3 --notes "transcript checked"
//! credledger share --credential-id 3 --with 0x3c44... --document-type "Academic Certificate"
//! ```

pub mod client;
pub mod commands;
pub mod render;

pub use client::Client;
