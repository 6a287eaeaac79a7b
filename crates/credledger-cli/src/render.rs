//! # View Rendering
//!
//! Pure functions from a [`ViewModel`] to terminal text. Rendering never
//! touches the ledger and tolerates any model the engine can produce,
//! including empty and cached ones.

use chrono::{DateTime, Utc};
use credledger_core::{CredentialId, CredentialRequest};
use credledger_projection::{ShareRow, SnapshotOrigin, ViewKind, ViewModel};

/// Shown in place of a credential id the ledger has not assigned yet.
pub const NOT_ASSIGNED: &str = "not assigned";

const CACHE_BANNER: &str =
    "! Ledger unreachable: showing the last saved copy of this view. It may be out of date.";
const EMPTY_BANNER: &str = "! Ledger unreachable and no saved copy exists.";

/// Human-readable view title.
pub fn title(kind: ViewKind) -> &'static str {
    match kind {
        ViewKind::MyRequests => "My credential requests",
        ViewKind::PendingApprovals => "Requests awaiting my approval",
        ViewKind::SharedWithMe => "Credentials shared with me",
        ViewKind::SharedByMe => "Credentials I have shared",
    }
}

/// Render `model` as a titled table. `origin` adds a banner when the rows
/// did not come from the ledger.
pub fn render(model: &ViewModel, origin: SnapshotOrigin) -> String {
    let mut out = String::new();
    match origin {
        SnapshotOrigin::Ledger => {}
        SnapshotOrigin::Cache => {
            out.push_str(CACHE_BANNER);
            out.push('\n');
        }
        SnapshotOrigin::Empty => {
            out.push_str(EMPTY_BANNER);
            out.push('\n');
        }
    }
    out.push_str(&format!(
        "{} ({}, {} row{})\n",
        title(model.kind),
        model.account.abbreviated(),
        model.len(),
        if model.len() == 1 { "" } else { "s" }
    ));

    if model.is_empty() {
        out.push_str("  nothing to show\n");
        return out;
    }

    let table = match model.kind {
        ViewKind::MyRequests | ViewKind::PendingApprovals => request_table(model),
        ViewKind::SharedWithMe | ViewKind::SharedByMe => share_table(model),
    };
    out.push_str(&table.render());
    out
}

fn request_table(model: &ViewModel) -> Table {
    let counterpart = if model.kind == ViewKind::MyRequests {
        "VERIFIER"
    } else {
        "REQUESTER"
    };
    let mut table = Table::new(&[
        "ID",
        "TYPE",
        "ENROLLMENT",
        counterpart,
        "STATUS",
        "CREDENTIAL ID",
        "NOTES",
    ]);
    for request in model.requests() {
        let party = if model.kind == ViewKind::MyRequests {
            request.verifier_id
        } else {
            request.requester
        };
        table.push(vec![
            request.id.to_string(),
            request.credential_type.clone(),
            request.enrollment_number.clone(),
            party.abbreviated(),
            request_status(request).to_string(),
            credential_id(&request.credential_id),
            request.verifier_notes.clone(),
        ]);
    }
    table
}

fn share_table(model: &ViewModel) -> Table {
    let counterpart = if model.kind == ViewKind::SharedWithMe {
        "SHARED BY"
    } else {
        "SHARED WITH"
    };
    let mut table = Table::new(&[
        "SHARE",
        "CREDENTIAL",
        "TYPE",
        "ENROLLMENT",
        counterpart,
        "ISSUER",
        "SHARED AT",
        "STATUS",
        "CREDENTIAL ID",
    ]);
    for row in model.shares() {
        let party = if model.kind == ViewKind::SharedWithMe {
            row.share.shared_by
        } else {
            row.share.shared_with
        };
        table.push(vec![
            row.share.share_id.to_string(),
            row.share.original_credential_id.to_string(),
            row.credential_type.clone(),
            row.enrollment_number.clone(),
            party.abbreviated(),
            row.issuer.abbreviated(),
            timestamp(row.share.share_timestamp),
            share_status(row).to_string(),
            credential_id(&row.credential_id),
        ]);
    }
    table
}

fn request_status(request: &CredentialRequest) -> &'static str {
    if request.approved {
        "[x] approved"
    } else {
        "[ ] pending"
    }
}

fn share_status(row: &ShareRow) -> &'static str {
    if row.share.verified {
        "[x] verified"
    } else {
        "[ ] unverified"
    }
}

/// Short form of an assigned id, or [`NOT_ASSIGNED`].
pub fn credential_id(id: &CredentialId) -> String {
    if id.is_assigned() {
        id.short()
    } else {
        NOT_ASSIGNED.to_string()
    }
}

/// Ledger seconds as a UTC timestamp. Out-of-range values are shown raw.
pub fn timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}

/// Left-aligned plain-text table.
struct Table {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn new(header: &[&str]) -> Self {
        Self {
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn render(&self) -> String {
        let mut widths: Vec<usize> = self.header.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let mut out = String::new();
        for line in std::iter::once(&self.header).chain(&self.rows) {
            let cells: Vec<String> = line
                .iter()
                .zip(&widths)
                .map(|(cell, width)| {
                    let pad = width - cell.chars().count();
                    format!("{cell}{}", " ".repeat(pad))
                })
                .collect();
            out.push_str("  ");
            out.push_str(cells.join("  ").trim_end());
            out.push('\n');
        }
        out
    }
}
