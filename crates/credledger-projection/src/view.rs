//! # View Models
//!
//! The four role-filtered views and the row types they hold. View models
//! are derived and disposable: every refresh rebuilds them from the ledger.

use std::fmt;
use std::str::FromStr;

use credledger_core::{Address, CredentialId, CredentialRequest, RequestId, SharedCredential};
use serde::{Deserialize, Serialize};

/// Which slice of the ledger a view shows, relative to the viewing account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewKind {
    /// Requests I made (`requester == me`).
    MyRequests,
    /// Requests naming me as verifier (`verifierId == me`).
    PendingApprovals,
    /// Shares addressed to me (`sharedWith == me`).
    SharedWithMe,
    /// Shares I made (`sharedBy == me`).
    SharedByMe,
}

/// The ledger collection a view is scanned from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSource {
    Requests,
    Shares,
}

impl ViewKind {
    pub const ALL: [ViewKind; 4] = [
        ViewKind::MyRequests,
        ViewKind::PendingApprovals,
        ViewKind::SharedWithMe,
        ViewKind::SharedByMe,
    ];

    pub fn source(self) -> RecordSource {
        match self {
            Self::MyRequests | Self::PendingApprovals => RecordSource::Requests,
            Self::SharedWithMe | Self::SharedByMe => RecordSource::Shares,
        }
    }

    /// Kebab-case name used on the command line.
    pub fn label(self) -> &'static str {
        match self {
            Self::MyRequests => "my-requests",
            Self::PendingApprovals => "pending-approvals",
            Self::SharedWithMe => "shared-with-me",
            Self::SharedByMe => "shared-by-me",
        }
    }

    fn cache_prefix(self) -> &'static str {
        match self {
            Self::MyRequests => "myRequests",
            Self::PendingApprovals => "pendingApprovals",
            Self::SharedWithMe => "sharedCredentials",
            Self::SharedByMe => "sharedByMe",
        }
    }

    /// Key of the persisted snapshot of this view for `account`.
    pub fn cache_key(self, account: &Address) -> String {
        format!("{}-{}", self.cache_prefix(), account.to_hex())
    }

    /// Whether `request` belongs in this view for `account`.
    pub fn keeps_request(self, request: &CredentialRequest, account: &Address) -> bool {
        match self {
            Self::MyRequests => request.requester == *account,
            Self::PendingApprovals => request.verifier_id == *account,
            Self::SharedWithMe | Self::SharedByMe => false,
        }
    }

    /// Whether `share` belongs in this view for `account`.
    pub fn keeps_share(self, share: &SharedCredential, account: &Address) -> bool {
        match self {
            Self::SharedWithMe => share.shared_with == *account,
            Self::SharedByMe => share.shared_by == *account,
            Self::MyRequests | Self::PendingApprovals => false,
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ViewKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.label() == s)
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(|k| k.label()).collect();
                format!("unknown view {s:?}, expected one of: {}", known.join(", "))
            })
    }
}

/// A share together with the display fields of the credential it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRow {
    #[serde(flatten)]
    pub share: SharedCredential,
    pub credential_type: String,
    pub enrollment_number: String,
    /// The verifier that approved the original credential.
    pub issuer: Address,
    pub credential_id: CredentialId,
    pub verifier_notes: String,
}

impl ShareRow {
    /// Join `share` with `original`, the credential its
    /// `original_credential_id` refers to.
    pub fn new(share: SharedCredential, original: &CredentialRequest) -> Self {
        Self {
            share,
            credential_type: original.credential_type.clone(),
            enrollment_number: original.enrollment_number.clone(),
            issuer: original.verifier_id,
            credential_id: original.credential_id,
            verifier_notes: original.verifier_notes.clone(),
        }
    }
}

/// Rows of a view, typed by the collection they come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "items", rename_all = "camelCase")]
pub enum ViewRows {
    Requests(Vec<CredentialRequest>),
    Shares(Vec<ShareRow>),
}

/// A complete, role-filtered snapshot of one view, in ascending id order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewModel {
    pub kind: ViewKind,
    pub account: Address,
    pub rows: ViewRows,
}

impl ViewModel {
    /// A view with no rows.
    pub fn empty(kind: ViewKind, account: Address) -> Self {
        let rows = match kind.source() {
            RecordSource::Requests => ViewRows::Requests(Vec::new()),
            RecordSource::Shares => ViewRows::Shares(Vec::new()),
        };
        Self {
            kind,
            account,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        match &self.rows {
            ViewRows::Requests(rows) => rows.len(),
            ViewRows::Shares(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Request rows; empty for share views.
    pub fn requests(&self) -> &[CredentialRequest] {
        match &self.rows {
            ViewRows::Requests(rows) => rows,
            ViewRows::Shares(_) => &[],
        }
    }

    /// Share rows; empty for request views.
    pub fn shares(&self) -> &[ShareRow] {
        match &self.rows {
            ViewRows::Shares(rows) => rows,
            ViewRows::Requests(_) => &[],
        }
    }

    /// The request with `id`, if this view holds it.
    pub fn request(&self, id: RequestId) -> Option<&CredentialRequest> {
        self.requests().iter().find(|r| r.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credledger_core::ShareId;

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    fn request(id: u64, requester: u8, verifier: u8) -> CredentialRequest {
        CredentialRequest {
            id: RequestId::new(id).unwrap(),
            credential_type: "Degree".into(),
            enrollment_number: "EN123".into(),
            requester: addr(requester),
            verifier_id: addr(verifier),
            approved: false,
            credential_id: CredentialId::UNASSIGNED,
            verifier_notes: String::new(),
        }
    }

    #[test]
    fn cache_keys_use_lowercase_address() {
        let account = Address::parse("0xABCDEF0123456789ABCDEF0123456789ABCDEF01").unwrap();
        assert_eq!(
            ViewKind::SharedWithMe.cache_key(&account),
            "sharedCredentials-0xabcdef0123456789abcdef0123456789abcdef01"
        );
        assert!(ViewKind::MyRequests.cache_key(&account).starts_with("myRequests-"));
    }

    #[test]
    fn request_filters_follow_role() {
        let req = request(1, 1, 2);
        assert!(ViewKind::MyRequests.keeps_request(&req, &addr(1)));
        assert!(!ViewKind::MyRequests.keeps_request(&req, &addr(2)));
        assert!(ViewKind::PendingApprovals.keeps_request(&req, &addr(2)));
        assert!(!ViewKind::SharedWithMe.keeps_request(&req, &addr(1)));
    }

    #[test]
    fn views_only_keep_records_visible_to_the_account() {
        for kind in ViewKind::ALL {
            for (requester, counterparty, account) in
                [(1, 2, 1), (1, 2, 2), (1, 2, 3), (1, 1, 1), (2, 1, 3)]
            {
                let req = request(1, requester, counterparty);
                if kind.keeps_request(&req, &addr(account)) {
                    assert!(req.is_visible_to(&addr(account)), "{kind} {account}");
                }
                let share = SharedCredential {
                    share_id: ShareId::new(1).unwrap(),
                    original_credential_id: req.id,
                    shared_by: addr(requester),
                    shared_with: addr(counterparty),
                    verified: false,
                    share_timestamp: 0,
                };
                if kind.keeps_share(&share, &addr(account)) {
                    assert!(share.is_visible_to(&addr(account)), "{kind} {account}");
                }
            }
        }
    }

    #[test]
    fn labels_round_trip_through_from_str() {
        for kind in ViewKind::ALL {
            assert_eq!(kind.label().parse::<ViewKind>().unwrap(), kind);
        }
        assert!("everything".parse::<ViewKind>().is_err());
    }

    #[test]
    fn share_row_joins_original_fields() {
        let mut original = request(1, 1, 2);
        original.approved = true;
        original.credential_id = CredentialId::from_bytes([7; 32]);
        original.verifier_notes = "looks good".into();
        let share = SharedCredential {
            share_id: ShareId::new(1).unwrap(),
            original_credential_id: original.id,
            shared_by: addr(1),
            shared_with: addr(3),
            verified: false,
            share_timestamp: 1_700_000_036,
        };
        let row = ShareRow::new(share, &original);
        assert_eq!(row.issuer, addr(2));
        assert_eq!(row.credential_type, "Degree");
        assert!(row.credential_id.is_assigned());
    }

    #[test]
    fn view_model_json_shape() {
        let model = ViewModel {
            kind: ViewKind::MyRequests,
            account: addr(1),
            rows: ViewRows::Requests(vec![request(1, 1, 2)]),
        };
        let json = serde_json::to_value(&model).unwrap();
        assert_eq!(json["kind"], "myRequests");
        assert_eq!(json["rows"]["source"], "requests");
        assert_eq!(json["rows"]["items"][0]["enrollmentNumber"], "EN123");
        let back: ViewModel = serde_json::from_value(json).unwrap();
        assert_eq!(back, model);
    }

    #[test]
    fn empty_model_matches_source() {
        let model = ViewModel::empty(ViewKind::SharedByMe, addr(1));
        assert!(model.is_empty());
        assert!(matches!(model.rows, ViewRows::Shares(_)));
    }
}
