//! Case and case-update models.
//!
//! The session/persistence core treats cases as mostly opaque; the fields
//! that matter to it are the lifecycle status, `updated_at`, and the stored
//! file references the retention sweep must delete.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Received,
    InReview,
    Resolved,
    Closed,
}

impl CaseStatus {
    /// `closed` is terminal: only closed cases are purge-eligible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CaseStatus::Closed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Received => "received",
            CaseStatus::InReview => "in_review",
            CaseStatus::Resolved => "resolved",
            CaseStatus::Closed => "closed",
        }
    }
}

/// Metadata for an uploaded file; the bytes live in the file store under
/// `stored_name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub stored_name: String,
    pub original_name: String,
    pub size: u64,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub category: Option<String>,
    pub detail: String,
    pub status: CaseStatus,
    pub full_name: Option<String>,
    pub contact_email: Option<String>,
    pub attachments: Vec<Attachment>,
    pub receipt_file: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Case {
    pub fn new(owner_id: Uuid, detail: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            category: None,
            detail,
            status: CaseStatus::Received,
            full_name: None,
            contact_email: None,
            attachments: Vec::new(),
            receipt_file: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// All stored file names referenced by this case.
    pub fn stored_files(&self) -> Vec<&str> {
        self.attachments
            .iter()
            .map(|a| a.stored_name.as_str())
            .chain(self.receipt_file.as_deref())
            .collect()
    }
}

/// Append-only history entry for a case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseUpdate {
    pub id: Uuid,
    pub case_id: Uuid,
    pub author_id: Option<Uuid>,
    pub message: String,
    pub status: Option<CaseStatus>,
    pub created_at: DateTime<Utc>,
}

impl CaseUpdate {
    pub fn new(
        case_id: Uuid,
        author_id: Option<Uuid>,
        message: String,
        status: Option<CaseStatus>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            case_id,
            author_id,
            message,
            status,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_closed_is_terminal() {
        assert!(CaseStatus::Closed.is_terminal());
        assert!(!CaseStatus::Received.is_terminal());
        assert!(!CaseStatus::InReview.is_terminal());
        assert!(!CaseStatus::Resolved.is_terminal());
    }

    #[test]
    fn stored_files_includes_receipt() {
        let mut case = Case::new(Uuid::new_v4(), "detail".to_string());
        case.attachments.push(Attachment {
            stored_name: "abc".to_string(),
            original_name: "report.pdf".to_string(),
            size: 10,
            content_type: None,
        });
        case.receipt_file = Some("receipt-1".to_string());
        assert_eq!(case.stored_files(), vec!["abc", "receipt-1"]);
    }
}
