//! `show` and `watch` when the wallet endpoint cannot be reached.
//!
//! | Situation | Test |
//! |-----------|------|
//! | saved view of the last connected account | `dead_wallet_shows_saved_view` |
//! | account remembered but view never saved | `dead_wallet_without_saved_view_shows_empty_banner` |
//! | first run, nothing remembered | `dead_wallet_without_remembered_account_fails` |
//! | successful connect remembers the account | `connect_remembers_account` |
//! | watch cannot subscribe offline | `dead_wallet_watch_returns_after_first_print` |

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use credledger_chain::{LedgerConfig, MemoryLedger};
use credledger_cli::client::{last_account, LAST_ACCOUNT_KEY};
use credledger_cli::commands::{
    run_request, run_show, run_watch, RequestArgs, ShowArgs, EXIT_STALE,
};
use credledger_cli::Client;
use credledger_core::Address;
use credledger_projection::{FileStore, SnapshotStore, ViewKind};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DEAD_WALLET: &str = "http://127.0.0.1:1";
const ACCOUNT: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

fn addr(byte: u8) -> Address {
    Address::from_bytes([byte; 20])
}

fn remember(dir: &Path, account: Address) {
    let store = FileStore::open(dir).unwrap();
    store
        .put(LAST_ACCOUNT_KEY, &serde_json::to_string(&account).unwrap())
        .unwrap();
}

/// Save the holder's my-requests view by running a request against an
/// in-memory ledger with the same cache directory.
async fn save_my_requests(dir: &Path) {
    let ledger = MemoryLedger::new();
    let client = Client::new(
        Arc::new(ledger.connect_as(addr(1))),
        Arc::new(FileStore::open(dir).unwrap()),
        Duration::from_millis(10),
        None,
    );
    let request = RequestArgs {
        credential_type: "Diploma".into(),
        enrollment: "EN-77".into(),
        verifier: addr(2).to_hex(),
    };
    run_request(&client, &request, &mut Vec::new()).await.unwrap();
}

fn show(view: ViewKind) -> ShowArgs {
    ShowArgs { view, json: false }
}

#[tokio::test]
async fn dead_wallet_shows_saved_view() {
    let dir = tempfile::tempdir().unwrap();
    save_my_requests(dir.path()).await;
    remember(dir.path(), addr(1));

    let config = LedgerConfig::local_mock(DEAD_WALLET).unwrap();
    let client = Client::connect_or_offline(&config, dir.path()).await.unwrap();
    assert_eq!(client.engine.account(), addr(1));

    let mut out = Vec::new();
    let code = run_show(&client, &show(ViewKind::MyRequests), &mut out)
        .await
        .unwrap();
    let printed = String::from_utf8(out).unwrap();

    assert_eq!(code, EXIT_STALE);
    assert!(printed.contains("EN-77"));
    assert!(printed.contains("last saved copy"));
}

#[tokio::test]
async fn dead_wallet_without_saved_view_shows_empty_banner() {
    let dir = tempfile::tempdir().unwrap();
    remember(dir.path(), addr(1));

    let config = LedgerConfig::local_mock(DEAD_WALLET).unwrap();
    let client = Client::connect_or_offline(&config, dir.path()).await.unwrap();

    let mut out = Vec::new();
    let code = run_show(&client, &show(ViewKind::PendingApprovals), &mut out)
        .await
        .unwrap();
    let printed = String::from_utf8(out).unwrap();

    assert_eq!(code, EXIT_STALE);
    assert!(printed.contains("no saved copy"));
}

#[tokio::test]
async fn dead_wallet_without_remembered_account_fails() {
    let dir = tempfile::tempdir().unwrap();
    save_my_requests(dir.path()).await;

    let config = LedgerConfig::local_mock(DEAD_WALLET).unwrap();
    assert!(Client::connect_or_offline(&config, dir.path()).await.is_err());
    assert!(Client::connect(&config, dir.path()).await.is_err());
}

#[tokio::test]
async fn dead_wallet_watch_returns_after_first_print() {
    let dir = tempfile::tempdir().unwrap();
    save_my_requests(dir.path()).await;
    remember(dir.path(), addr(1));

    let config = LedgerConfig::local_mock(DEAD_WALLET).unwrap();
    let client = Client::connect_or_offline(&config, dir.path()).await.unwrap();

    let mut out = Vec::new();
    let code = run_watch(
        &client,
        ViewKind::MyRequests,
        std::future::pending::<()>(),
        &mut out,
    )
    .await
    .unwrap();

    assert_eq!(code, EXIT_STALE);
    assert!(String::from_utf8(out).unwrap().contains("EN-77"));
}

fn rpc_result(value: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": value }))
}

#[tokio::test]
async fn connect_remembers_account() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_requestAccounts" })))
        .respond_with(rpc_result(json!([ACCOUNT])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_chainId" })))
        .respond_with(rpc_result(json!("0x7a69")))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = LedgerConfig::local_mock(&server.uri()).unwrap();
    let client = Client::connect(&config, dir.path()).await.unwrap();
    let account = Address::parse(ACCOUNT).unwrap();
    assert_eq!(client.engine.account(), account);

    let store = FileStore::open(dir.path()).unwrap();
    assert_eq!(last_account(&store), Some(account));

    drop(server);
    let offline = LedgerConfig::local_mock(DEAD_WALLET).unwrap();
    let client = Client::connect_or_offline(&offline, dir.path()).await.unwrap();
    assert_eq!(client.engine.account(), account);
}
