//! Document domain model.
//!
//! Field names mirror the `documents` table columns so rows deserialize
//! straight off the wire.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use milvault_core::{ApiError, CategoryId, DocumentId, UserId};

/// Largest accepted upload, in bytes (100 MiB).
pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Mime types the vault accepts.
pub const ALLOWED_FILE_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "text/plain",
    "image/jpeg",
    "image/png",
    "image/gif",
];

/// Security classification, stored as the screaming-case wire names.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Classification {
    #[default]
    #[serde(rename = "UNCLASSIFIED")]
    Unclassified,
    #[serde(rename = "CONFIDENTIAL")]
    Confidential,
    #[serde(rename = "SECRET")]
    Secret,
    #[serde(rename = "TOP_SECRET")]
    TopSecret,
}

impl Classification {
    pub const ALL: [Classification; 4] = [
        Classification::Unclassified,
        Classification::Confidential,
        Classification::Secret,
        Classification::TopSecret,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Unclassified => "UNCLASSIFIED",
            Classification::Confidential => "CONFIDENTIAL",
            Classification::Secret => "SECRET",
            Classification::TopSecret => "TOP_SECRET",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Classification {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UNCLASSIFIED" => Ok(Classification::Unclassified),
            "CONFIDENTIAL" => Ok(Classification::Confidential),
            "SECRET" => Ok(Classification::Secret),
            "TOP_SECRET" | "TOP SECRET" => Ok(Classification::TopSecret),
            other => Err(ApiError::validation(
                "classification",
                format!("unknown classification: {other}"),
            )),
        }
    }
}

/// A stored document row, with its category embedded when the query asked
/// for it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub file_path: String,
    pub file_size: u64,
    pub file_type: String,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub category: Option<DocumentCategory>,
    #[serde(default)]
    pub classification: Classification,
    #[serde(rename = "is_encrypted", default)]
    pub encrypted: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(rename = "user_id")]
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Expired documents stay listed; rendering decides what to do with
    /// them.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DocumentCategory {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Sort column for document listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentSort {
    Title,
    #[default]
    CreatedAt,
    FileSize,
    Classification,
}

impl DocumentSort {
    pub fn column(self) -> &'static str {
        match self {
            DocumentSort::Title => "title",
            DocumentSort::CreatedAt => "created_at",
            DocumentSort::FileSize => "file_size",
            DocumentSort::Classification => "classification",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn is_ascending(self) -> bool {
        matches!(self, SortOrder::Ascending)
    }
}

/// Listing filter. Everything unset means "no constraint".
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    /// Case-insensitive substring match on the title.
    pub search: Option<String>,
    pub file_type: Option<String>,
    pub category_id: Option<CategoryId>,
    pub classification: Option<Classification>,
    pub encrypted: Option<bool>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub sort_by: DocumentSort,
    pub sort_order: SortOrder,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Everything needed to store a new document.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    /// Defaults to the file name when unset.
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub classification: Classification,
    pub encrypted: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl DocumentUpload {
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
            title: None,
            description: None,
            category_id: None,
            classification: Classification::default(),
            encrypted: false,
            expires_at: None,
        }
    }
}

/// Replace anything outside `[A-Za-z0-9.-]` so the name is safe as a
/// storage path segment.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_uses_the_wire_names() {
        assert_eq!(
            serde_json::to_string(&Classification::TopSecret).unwrap(),
            "\"TOP_SECRET\""
        );
        assert_eq!(
            serde_json::from_str::<Classification>("\"CONFIDENTIAL\"").unwrap(),
            Classification::Confidential
        );
        assert_eq!(Classification::default(), Classification::Unclassified);
        assert_eq!(
            "top secret".parse::<Classification>().unwrap(),
            Classification::TopSecret
        );
        assert_eq!(
            "secret".parse::<Classification>().unwrap(),
            Classification::Secret
        );
        assert!("ultra".parse::<Classification>().is_err());
    }

    #[test]
    fn classifications_order_by_sensitivity() {
        let mut all = Classification::ALL;
        all.sort();
        assert_eq!(all[0], Classification::Unclassified);
        assert_eq!(all[3], Classification::TopSecret);
        assert!(Classification::Secret < Classification::TopSecret);
    }

    #[test]
    fn sort_variants_name_real_columns() {
        assert_eq!(DocumentSort::default().column(), "created_at");
        assert_eq!(DocumentSort::FileSize.column(), "file_size");
        assert!(SortOrder::default().is_ascending());
    }

    #[test]
    fn file_names_sanitize_to_storage_safe_segments() {
        assert_eq!(
            sanitize_file_name("war plan (v2).pdf"),
            "war_plan__v2_.pdf"
        );
        assert_eq!(sanitize_file_name("already-safe.txt"), "already-safe.txt");
        assert_eq!(sanitize_file_name("säkerhet.pdf"), "s_kerhet.pdf");
    }

    #[test]
    fn rows_deserialize_with_missing_optionals() {
        let row = serde_json::json!({
            "id": "0192c7a1-2f43-7cc1-9f6e-0242ac120010",
            "title": "Operation brief",
            "file_path": "u-1/abc_brief.pdf",
            "file_size": 2048,
            "file_type": "application/pdf",
            "user_id": "0192c7a1-2f43-7cc1-9f6e-0242ac120002",
            "created_at": "2025-06-01T10:00:00Z",
            "updated_at": "2025-06-01T10:00:00Z"
        });

        let doc: Document = serde_json::from_value(row).unwrap();
        assert_eq!(doc.classification, Classification::Unclassified);
        assert!(!doc.encrypted);
        assert!(doc.category.is_none());
        assert!(!doc.is_expired(Utc::now()));
    }
}
