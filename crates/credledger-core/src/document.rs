//! # Document Types
//!
//! The kinds of document a holder can label a share with. The client offers
//! a closed list plus an "Other" escape; the ledger stores free text.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Document type attached to a share.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    AcademicCertificate,
    EmploymentVerification,
    IdentityDocument,
    ProfessionalLicense,
    MedicalRecord,
    FinancialDocument,
    /// Free-text type; must be non-blank to be submitted.
    Other(String),
}

impl DocumentType {
    /// Labels of the predefined choices, in display order, ending with "Other".
    pub const CHOICES: [&'static str; 7] = [
        "Academic Certificate",
        "Employment Verification",
        "Identity Document",
        "Professional License",
        "Medical Record",
        "Financial Document",
        "Other",
    ];

    /// Resolve a menu choice plus optional custom text into a document type.
    ///
    /// `custom` is only consulted when `choice` is "Other".
    pub fn from_choice(choice: &str, custom: Option<&str>) -> Result<Self, ValidationError> {
        match choice.trim() {
            "" => Err(ValidationError::EmptyField {
                field: "document type",
            }),
            "Other" => Ok(Self::Other(custom.unwrap_or_default().to_string())),
            other => other.parse(),
        }
    }

    /// The free-text value sent to the ledger.
    ///
    /// Fails when `Other` carries a blank custom value.
    pub fn ledger_value(&self) -> Result<String, ValidationError> {
        match self {
            Self::Other(custom) => {
                let custom = custom.trim();
                if custom.is_empty() {
                    Err(ValidationError::CustomDocumentTypeRequired)
                } else {
                    Ok(custom.to_string())
                }
            }
            preset => Ok(preset.to_string()),
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AcademicCertificate => write!(f, "Academic Certificate"),
            Self::EmploymentVerification => write!(f, "Employment Verification"),
            Self::IdentityDocument => write!(f, "Identity Document"),
            Self::ProfessionalLicense => write!(f, "Professional License"),
            Self::MedicalRecord => write!(f, "Medical Record"),
            Self::FinancialDocument => write!(f, "Financial Document"),
            Self::Other(custom) => write!(f, "{custom}"),
        }
    }
}

/// Parses a predefined label; anything else becomes `Other(label)`.
impl FromStr for DocumentType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "Academic Certificate" => Self::AcademicCertificate,
            "Employment Verification" => Self::EmploymentVerification,
            "Identity Document" => Self::IdentityDocument,
            "Professional License" => Self::ProfessionalLicense,
            "Medical Record" => Self::MedicalRecord,
            "Financial Document" => Self::FinancialDocument,
            "" => {
                return Err(ValidationError::EmptyField {
                    field: "document type",
                })
            }
            "Other" => Self::Other(String::new()),
            custom => Self::Other(custom.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_round_trip_through_labels() {
        for label in &DocumentType::CHOICES[..6] {
            let doc: DocumentType = label.parse().unwrap();
            assert!(!matches!(doc, DocumentType::Other(_)), "{label}");
            assert_eq!(doc.ledger_value().unwrap(), *label);
        }
    }

    #[test]
    fn other_requires_custom_value() {
        let doc = DocumentType::from_choice("Other", Some("   ")).unwrap();
        assert_eq!(
            doc.ledger_value().unwrap_err(),
            ValidationError::CustomDocumentTypeRequired
        );
        let doc = DocumentType::from_choice("Other", None).unwrap();
        assert!(doc.ledger_value().is_err());
    }

    #[test]
    fn other_uses_trimmed_custom_value() {
        let doc = DocumentType::from_choice("Other", Some(" Reference Letter ")).unwrap();
        assert_eq!(doc.ledger_value().unwrap(), "Reference Letter");
    }

    #[test]
    fn custom_choice_ignores_custom_field_for_presets() {
        let doc = DocumentType::from_choice("Medical Record", Some("ignored")).unwrap();
        assert_eq!(doc, DocumentType::MedicalRecord);
    }

    #[test]
    fn blank_choice_is_rejected() {
        assert!(DocumentType::from_choice("  ", None).is_err());
    }
}
