//! # Subcommand Handlers
//!
//! Each handler drives one operation against a [`Client`] and writes
//! human-readable output. Handlers return the process exit code:
//! `0` on success, `2` when a view could only be shown from its fallback.
//! Failed actions are returned as errors carrying the user-facing message.

use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use credledger_chain::NetworkConfig;
use credledger_core::DocumentType;
use credledger_projection::{
    watch_verifications, ActionError, ActionOutcome, ProjectionEngine, SnapshotOrigin, ViewKind,
};

use crate::client::Client;
use crate::render::render;

/// Exit code when the ledger could not be read and a fallback was shown.
pub const EXIT_STALE: u8 = 2;

/// Arguments for `credledger request`.
#[derive(Args, Debug)]
pub struct RequestArgs {
    /// Kind of credential, e.g. "Degree".
    #[arg(long = "type")]
    pub credential_type: String,
    /// Enrollment or reference number known to the verifier.
    #[arg(long)]
    pub enrollment: String,
    /// Address of the verifier asked to approve.
    #[arg(long)]
    pub verifier: String,
}

/// Arguments for `credledger approve`.
#[derive(Args, Debug)]
pub struct ApproveArgs {
    /// Request id from the pending-approvals view.
    #[arg(long)]
    pub id: u64,
    /// Notes stored with the approval.
    #[arg(long, default_value = "")]
    pub notes: String,
}

/// Arguments for `credledger share`.
#[derive(Args, Debug)]
pub struct ShareArgs {
    /// Id of the approved request to share.
    #[arg(long)]
    pub credential_id: u64,
    /// Recipient address.
    #[arg(long = "with")]
    pub recipient: String,
    /// One of the predefined document types, or "Other".
    #[arg(long)]
    pub document_type: String,
    /// Free-text document type, required with "Other".
    #[arg(long)]
    pub custom_type: Option<String>,
}

/// Arguments for `credledger show`.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// my-requests, pending-approvals, shared-with-me or shared-by-me.
    pub view: ViewKind,
    /// Print the view model as JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `credledger verify`.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Share id from the shared-with-me view.
    #[arg(long)]
    pub share_id: u64,
}

/// Print the connected account and network.
pub fn run_connect(client: &Client, network: &NetworkConfig, out: &mut impl Write) -> Result<u8> {
    writeln!(out, "Connected as {}", client.engine.account())?;
    writeln!(
        out,
        "Network: {} (chain id {}, {})",
        network.chain_name,
        network.chain_id,
        network.chain_id_hex()
    )?;
    Ok(0)
}

pub async fn run_request(client: &Client, args: &RequestArgs, out: &mut impl Write) -> Result<u8> {
    let outcome = client
        .actions
        .request_credential(&args.credential_type, &args.enrollment, &args.verifier)
        .await
        .map_err(action_failure)?;
    report(client, "Credential requested", &outcome, ViewKind::MyRequests, out)
}

/// Approve a request. The pending-approvals view is refreshed first so the
/// request can be checked against current ledger state.
pub async fn run_approve(client: &Client, args: &ApproveArgs, out: &mut impl Write) -> Result<u8> {
    if let Err(err) = client.engine.refresh(ViewKind::PendingApprovals).await {
        tracing::warn!(error = %err, "could not refresh pending approvals before approving");
    }
    let outcome = client
        .actions
        .approve_credential(args.id, &args.notes)
        .await
        .map_err(action_failure)?;
    report(client, "Credential approved", &outcome, ViewKind::PendingApprovals, out)
}

pub async fn run_share(client: &Client, args: &ShareArgs, out: &mut impl Write) -> Result<u8> {
    let document_type = DocumentType::from_choice(&args.document_type, args.custom_type.as_deref())
        .map_err(|e| action_failure(e.into()))?;
    let outcome = client
        .actions
        .share_credential(args.credential_id, &args.recipient, &document_type)
        .await
        .map_err(action_failure)?;
    report(client, "Credential shared", &outcome, ViewKind::SharedByMe, out)
}

pub async fn run_verify(client: &Client, args: &VerifyArgs, out: &mut impl Write) -> Result<u8> {
    let outcome = client
        .actions
        .verify_shared_credential(args.share_id)
        .await
        .map_err(action_failure)?;
    report(client, "Shared credential verified", &outcome, ViewKind::SharedWithMe, out)
}

/// Refresh the view and print it, falling back to the cached copy.
pub async fn run_show(client: &Client, args: &ShowArgs, out: &mut impl Write) -> Result<u8> {
    refresh_for_display(client, args.view).await;
    if !args.json {
        return print_view(&client.engine, args.view, out);
    }
    let Some(snapshot) = client.engine.snapshot(args.view) else {
        return Ok(EXIT_STALE);
    };
    serde_json::to_writer_pretty(&mut *out, &*snapshot.model)?;
    writeln!(out)?;
    Ok(exit_code(snapshot.origin))
}

async fn refresh_for_display(client: &Client, kind: ViewKind) {
    if let Err(err) = client.engine.refresh(kind).await {
        tracing::warn!(error = %err, "showing fallback");
    }
}

/// Print `kind`, then re-print it after every verification event until
/// `shutdown` completes.
///
/// When only a fallback could be printed and the ledger cannot be watched
/// either, returns [`EXIT_STALE`] right away.
pub async fn run_watch(
    client: &Client,
    kind: ViewKind,
    shutdown: impl Future<Output = ()>,
    out: &mut impl Write,
) -> Result<u8> {
    refresh_for_display(client, kind).await;
    let mut code = print_view(&client.engine, kind, out)?;
    out.flush()?;

    let started =
        watch_verifications(Arc::clone(&client.engine), vec![kind], client.poll_interval).await;
    let mut subscription = match started {
        Ok(subscription) => subscription,
        Err(err) if code == EXIT_STALE => {
            tracing::warn!(error = %err, "ledger unreachable, not watching for verifications");
            return Ok(code);
        }
        Err(err) => {
            return Err(anyhow::Error::new(err).context("could not start watching for verifications"))
        }
    };

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            generation = subscription.changed() => {
                if generation.is_none() {
                    break;
                }
                writeln!(out)?;
                code = print_view(&client.engine, kind, out)?;
                out.flush()?;
            }
        }
    }
    subscription.cancel();
    Ok(code)
}

fn report(
    client: &Client,
    headline: &str,
    outcome: &ActionOutcome,
    kind: ViewKind,
    out: &mut impl Write,
) -> Result<u8> {
    writeln!(
        out,
        "{headline} in block {} (tx {})",
        outcome.receipt.block_number,
        outcome.receipt.tx_hash.to_hex()
    )?;
    if let Err(err) = &outcome.refreshed {
        tracing::warn!(error = %err, "view not refreshed after action");
    }
    writeln!(out)?;
    print_view(&client.engine, kind, out)
}

fn print_view(engine: &ProjectionEngine, kind: ViewKind, out: &mut impl Write) -> Result<u8> {
    let Some(snapshot) = engine.snapshot(kind) else {
        writeln!(out, "{kind}: not loaded")?;
        return Ok(EXIT_STALE);
    };
    write!(out, "{}", render(&snapshot.model, snapshot.origin))?;
    Ok(exit_code(snapshot.origin))
}

fn exit_code(origin: SnapshotOrigin) -> u8 {
    match origin {
        SnapshotOrigin::Ledger => 0,
        SnapshotOrigin::Cache | SnapshotOrigin::Empty => EXIT_STALE,
    }
}

fn action_failure(err: ActionError) -> anyhow::Error {
    let message = err.user_message();
    anyhow::Error::new(err).context(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use credledger_chain::MemoryLedger;
    use credledger_core::Address;
    use credledger_projection::MemoryStore;

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    fn client(ledger: &MemoryLedger, store: &MemoryStore, byte: u8) -> Client {
        Client::new(
            Arc::new(ledger.connect_as(addr(byte))),
            Arc::new(store.clone()),
            Duration::from_millis(10),
            Some(Duration::from_secs(5)),
        )
    }

    fn text(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn request_approve_share_verify() {
        let ledger = MemoryLedger::new();
        let store = MemoryStore::new();
        let holder = client(&ledger, &store, 1);
        let issuer = client(&ledger, &store, 2);
        let employer = client(&ledger, &store, 3);

        let mut out = Vec::new();
        let request = RequestArgs {
            credential_type: "Degree".into(),
            enrollment: "EN123".into(),
            verifier: addr(2).to_hex(),
        };
        assert_eq!(run_request(&holder, &request, &mut out).await.unwrap(), 0);
        let printed = text(out);
        assert!(printed.starts_with("Credential requested in block 1"));
        assert!(printed.contains("[ ] pending"));

        // Approve without a prior `show`: the handler refreshes first.
        let mut out = Vec::new();
        let approve = ApproveArgs {
            id: 1,
            notes: "ok".into(),
        };
        assert_eq!(run_approve(&issuer, &approve, &mut out).await.unwrap(), 0);
        assert!(text(out).contains("[x] approved"));

        let mut out = Vec::new();
        let share = ShareArgs {
            credential_id: 1,
            recipient: addr(3).to_hex(),
            document_type: "Academic Certificate".into(),
            custom_type: None,
        };
        assert_eq!(run_share(&holder, &share, &mut out).await.unwrap(), 0);
        assert!(text(out).contains("[ ] unverified"));

        let mut out = Vec::new();
        let verify = VerifyArgs { share_id: 1 };
        assert_eq!(run_verify(&employer, &verify, &mut out).await.unwrap(), 0);
        assert!(text(out).contains("[x] verified"));
    }

    #[tokio::test]
    async fn blank_custom_type_fails_with_user_message() {
        let ledger = MemoryLedger::new();
        let holder = client(&ledger, &MemoryStore::new(), 1);
        let share = ShareArgs {
            credential_id: 1,
            recipient: addr(3).to_hex(),
            document_type: "Other".into(),
            custom_type: Some(" ".into()),
        };
        let err = run_share(&holder, &share, &mut Vec::new()).await.unwrap_err();
        assert!(err.to_string().starts_with("Please fix the form"));
        assert_eq!(ledger.block_number(), 0);
    }

    #[tokio::test]
    async fn show_marks_cached_fallback() {
        let ledger = MemoryLedger::new();
        let store = MemoryStore::new();
        let holder = client(&ledger, &store, 1);
        run_request(
            &holder,
            &RequestArgs {
                credential_type: "Degree".into(),
                enrollment: "EN9".into(),
                verifier: addr(2).to_hex(),
            },
            &mut Vec::new(),
        )
        .await
        .unwrap();

        ledger.set_unavailable(true);
        let later = client(&ledger, &store, 1);
        let mut out = Vec::new();
        let show = ShowArgs {
            view: ViewKind::MyRequests,
            json: false,
        };
        let code = run_show(&later, &show, &mut out).await.unwrap();
        assert_eq!(code, EXIT_STALE);
        let printed = text(out);
        assert!(printed.starts_with('!'));
        assert!(printed.contains("EN9"));
    }

    #[tokio::test]
    async fn show_json_emits_view_model() {
        let ledger = MemoryLedger::new();
        let holder = client(&ledger, &MemoryStore::new(), 1);
        let mut out = Vec::new();
        let show = ShowArgs {
            view: ViewKind::SharedWithMe,
            json: true,
        };
        assert_eq!(run_show(&holder, &show, &mut out).await.unwrap(), 0);
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["rows"]["source"], "shares");
        assert_eq!(value["rows"]["items"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn watch_stops_on_shutdown() {
        let ledger = MemoryLedger::new();
        let holder = client(&ledger, &MemoryStore::new(), 1);
        let mut out = Vec::new();
        let code = run_watch(
            &holder,
            ViewKind::SharedByMe,
            tokio::time::sleep(Duration::from_millis(30)),
            &mut out,
        )
        .await
        .unwrap();
        assert_eq!(code, 0);
        assert!(text(out).contains("nothing to show"));
    }

    #[test]
    fn connect_prints_account_and_network() {
        let ledger = MemoryLedger::new();
        let holder = client(&ledger, &MemoryStore::new(), 1);
        let network = NetworkConfig::hardhat_local().unwrap();
        let mut out = Vec::new();
        run_connect(&holder, &network, &mut out).unwrap();
        let printed = text(out);
        assert!(printed.contains(&addr(1).to_hex()));
        assert!(printed.contains("chain id 31337, 0x7a69"));
    }
}
