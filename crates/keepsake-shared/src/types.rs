//! Wire and domain types shared by the store and the HTTP server.
//!
//! Everything that crosses the HTTP boundary serializes with camelCase field
//! names, matching what the front end sends and expects.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::GUEST_UPLOAD_CATEGORY;

// ---------------------------------------------------------------------------
// Photo status
// ---------------------------------------------------------------------------

/// Moderation state of a guest photo.
///
/// Transitions are one-way: `Pending -> Approved`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PhotoStatus {
    Pending,
    Approved,
}

impl PhotoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoStatus::Pending => "pending",
            PhotoStatus::Approved => "approved",
        }
    }

    /// Initial status for a freshly uploaded photo.
    pub fn initial(require_approval: bool) -> Self {
        if require_approval {
            PhotoStatus::Pending
        } else {
            PhotoStatus::Approved
        }
    }
}

impl fmt::Display for PhotoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhotoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PhotoStatus::Pending),
            "approved" => Ok(PhotoStatus::Approved),
            other => Err(format!("unknown photo status: {other}")),
        }
    }
}

/// Status filter accepted by the admin listing.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    Pending,
    Approved,
    #[default]
    All,
}

impl StatusFilter {
    pub fn as_status(&self) -> Option<PhotoStatus> {
        match self {
            StatusFilter::Pending => Some(PhotoStatus::Pending),
            StatusFilter::Approved => Some(PhotoStatus::Approved),
            StatusFilter::All => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Photo record
// ---------------------------------------------------------------------------

/// A guest photo that made it through the upload pipeline.
///
/// `approved_at` is set if and only if `status` is [`PhotoStatus::Approved`];
/// use [`PhotoRecord::approve`] rather than mutating the fields directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRecord {
    pub id: String,
    /// Storage key inside the blob store.
    pub file_name: String,
    /// File name as supplied by the guest.
    pub original_name: String,
    pub uploader_name: String,
    pub uploader_email: Option<String>,
    pub uploader_message: Option<String>,
    pub storage_url: String,
    pub content_type: String,
    pub size_bytes: u64,
    /// Whether the stored bytes are the re-encoded web version.
    pub optimized: bool,
    pub status: PhotoStatus,
    pub uploaded_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub category: String,
}

/// Everything the pipeline knows about a file once its bytes are stored.
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub file_name: String,
    pub original_name: String,
    pub storage_url: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub optimized: bool,
}

impl PhotoRecord {
    /// Build a record with a fresh id and a status decided by `require_approval`.
    pub fn create(
        photo: NewPhoto,
        uploader: &UploaderInfo,
        require_approval: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let status = PhotoStatus::initial(require_approval);
        Self {
            id: Uuid::new_v4().to_string(),
            file_name: photo.file_name,
            original_name: photo.original_name,
            uploader_name: uploader.name.clone(),
            uploader_email: uploader.email.clone(),
            uploader_message: uploader.message.clone(),
            storage_url: photo.storage_url,
            content_type: photo.content_type,
            size_bytes: photo.size_bytes,
            optimized: photo.optimized,
            status,
            uploaded_at: now,
            approved_at: (status == PhotoStatus::Approved).then_some(now),
            approved_by: None,
            category: GUEST_UPLOAD_CATEGORY.to_string(),
        }
    }

    /// Move a pending record to approved. Returns `false` (and leaves the
    /// record untouched) if it was already approved.
    pub fn approve(&mut self, admin_name: Option<String>, now: DateTime<Utc>) -> bool {
        if self.status == PhotoStatus::Approved {
            return false;
        }
        self.status = PhotoStatus::Approved;
        self.approved_at = Some(now);
        self.approved_by = admin_name;
        true
    }
}

// ---------------------------------------------------------------------------
// Upload request
// ---------------------------------------------------------------------------

/// Identity of the guest submitting a batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploaderInfo {
    pub name: String,
    pub email: Option<String>,
    pub message: Option<String>,
}

/// One file as received from the multipart form.
#[derive(Debug, Clone)]
pub struct RawFile {
    pub bytes: Vec<u8>,
    pub original_name: String,
    pub content_type: String,
}

/// Per-file result of the upload pipeline.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum UploadOutcome {
    Stored(PhotoRecord),
    Failed { error: String, file: String },
}

impl UploadOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, UploadOutcome::Stored(_))
    }

    pub fn record(&self) -> Option<&PhotoRecord> {
        match self {
            UploadOutcome::Stored(record) => Some(record),
            UploadOutcome::Failed { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Guestbook
// ---------------------------------------------------------------------------

/// A guestbook message as echoed back to the visitor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GuestbookEntry {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub message: String,
    pub photo: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl GuestbookEntry {
    pub fn new(
        name: String,
        email: Option<String>,
        message: String,
        photo: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            email,
            message,
            photo,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_photo() -> NewPhoto {
        NewPhoto {
            file_name: "guest-uploads/Ana_1.jpg".into(),
            original_name: "beach.jpg".into(),
            storage_url: "http://localhost/media/guest-uploads/Ana_1.jpg".into(),
            content_type: "image/jpeg".into(),
            size_bytes: 42,
            optimized: true,
        }
    }

    fn uploader() -> UploaderInfo {
        UploaderInfo {
            name: "Ana".into(),
            email: Some("ana@example.com".into()),
            message: None,
        }
    }

    #[test]
    fn test_pending_record_has_no_approval_time() {
        let record = PhotoRecord::create(new_photo(), &uploader(), true, Utc::now());
        assert_eq!(record.status, PhotoStatus::Pending);
        assert!(record.approved_at.is_none());
        assert_eq!(record.category, GUEST_UPLOAD_CATEGORY);
    }

    #[test]
    fn test_auto_approved_record_has_approval_time() {
        let record = PhotoRecord::create(new_photo(), &uploader(), false, Utc::now());
        assert_eq!(record.status, PhotoStatus::Approved);
        assert!(record.approved_at.is_some());
    }

    #[test]
    fn test_approve_is_one_way() {
        let mut record = PhotoRecord::create(new_photo(), &uploader(), true, Utc::now());
        assert!(record.approve(Some("Sam".into()), Utc::now()));
        let approved_at = record.approved_at;
        assert!(approved_at.is_some());

        assert!(!record.approve(Some("Other".into()), Utc::now()));
        assert_eq!(record.approved_at, approved_at);
        assert_eq!(record.approved_by.as_deref(), Some("Sam"));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("pending".parse::<PhotoStatus>().unwrap(), PhotoStatus::Pending);
        assert!("rejected".parse::<PhotoStatus>().is_err());
    }

    #[test]
    fn test_failed_outcome_shape() {
        let outcome = UploadOutcome::Failed {
            error: "nope".into(),
            file: "virus.exe".into(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json, serde_json::json!({ "error": "nope", "file": "virus.exe" }));
    }
}
