//! The photo repository seam.
//!
//! Handlers and the upload pipeline only talk to [`PhotoRepository`]; which
//! backend sits behind it is a startup decision. [`MemoryPhotoRepository`]
//! serves tests and zero-config development, [`SqlitePhotoRepository`] is the
//! durable one.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use keepsake_shared::{PhotoRecord, PhotoStatus};

use crate::database::Database;
use crate::error::{Result, StoreError};

/// Persistence for guest photo records.
pub trait PhotoRepository: Send + Sync {
    /// Insert a new record. Fails with [`StoreError::Duplicate`] if the id is taken.
    fn save(&self, record: &PhotoRecord) -> Result<()>;

    fn find_by_id(&self, id: &str) -> Result<Option<PhotoRecord>>;

    /// Newest first. `None` returns every record.
    fn find_by_status(&self, status: Option<PhotoStatus>) -> Result<Vec<PhotoRecord>>;

    /// Apply a status change and return the resulting record.
    ///
    /// Setting the status a record already has is a no-op. The only real
    /// transition is `pending -> approved`; anything else is
    /// [`StoreError::InvalidTransition`].
    fn update_status(
        &self,
        id: &str,
        status: PhotoStatus,
        changed_by: Option<&str>,
    ) -> Result<PhotoRecord>;
}

/// Apply `status` to `record` in place. Returns whether anything changed.
fn transition(record: &mut PhotoRecord, status: PhotoStatus, changed_by: Option<&str>) -> Result<bool> {
    match (record.status, status) {
        (from, to) if from == to => Ok(false),
        (PhotoStatus::Pending, PhotoStatus::Approved) => {
            Ok(record.approve(changed_by.map(str::to_string), Utc::now()))
        }
        (from, to) => Err(StoreError::InvalidTransition {
            id: record.id.clone(),
            from: from.to_string(),
            to: to.to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryPhotoRepository {
    records: Mutex<Vec<PhotoRecord>>,
}

impl MemoryPhotoRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PhotoRepository for MemoryPhotoRepository {
    fn save(&self, record: &PhotoRecord) -> Result<()> {
        let mut records = self.records.lock().map_err(|_| StoreError::LockPoisoned)?;
        if records.iter().any(|r| r.id == record.id) {
            return Err(StoreError::Duplicate(record.id.clone()));
        }
        records.push(record.clone());
        Ok(())
    }

    fn find_by_id(&self, id: &str) -> Result<Option<PhotoRecord>> {
        let records = self.records.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    fn find_by_status(&self, status: Option<PhotoStatus>) -> Result<Vec<PhotoRecord>> {
        let records = self.records.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut found: Vec<PhotoRecord> = records
            .iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(found)
    }

    fn update_status(
        &self,
        id: &str,
        status: PhotoStatus,
        changed_by: Option<&str>,
    ) -> Result<PhotoRecord> {
        let mut records = self.records.lock().map_err(|_| StoreError::LockPoisoned)?;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        transition(record, status, changed_by)?;
        Ok(record.clone())
    }
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

/// [`PhotoRepository`] over a SQLite file. The connection is shared behind a
/// mutex, so calls are serialized.
pub struct SqlitePhotoRepository {
    db: Mutex<Database>,
}

impl SqlitePhotoRepository {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::from_database(Database::open_at(path)?))
    }

    pub fn from_database(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }
}

impl PhotoRepository for SqlitePhotoRepository {
    fn save(&self, record: &PhotoRecord) -> Result<()> {
        let db = self.db.lock().map_err(|_| StoreError::LockPoisoned)?;
        db.insert_photo(record)
    }

    fn find_by_id(&self, id: &str) -> Result<Option<PhotoRecord>> {
        let db = self.db.lock().map_err(|_| StoreError::LockPoisoned)?;
        db.get_photo(id)
    }

    fn find_by_status(&self, status: Option<PhotoStatus>) -> Result<Vec<PhotoRecord>> {
        let db = self.db.lock().map_err(|_| StoreError::LockPoisoned)?;
        db.list_photos(status)
    }

    fn update_status(
        &self,
        id: &str,
        status: PhotoStatus,
        changed_by: Option<&str>,
    ) -> Result<PhotoRecord> {
        let db = self.db.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut record = db
            .get_photo(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if transition(&mut record, status, changed_by)? {
            db.update_photo_approval(&record)?;
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keepsake_shared::{NewPhoto, UploaderInfo};

    fn record(name: &str) -> PhotoRecord {
        PhotoRecord::create(
            NewPhoto {
                file_name: format!("guest-uploads/{name}_1.jpg"),
                original_name: "a.jpg".into(),
                storage_url: "http://localhost/media/a.jpg".into(),
                content_type: "image/jpeg".into(),
                size_bytes: 10,
                optimized: false,
            },
            &UploaderInfo {
                name: name.into(),
                ..UploaderInfo::default()
            },
            true,
            Utc::now(),
        )
    }

    // Same assertions against both backends.
    fn exercise(repo: &dyn PhotoRepository) {
        let a = record("Ana");
        let b = record("Ben");
        repo.save(&a).unwrap();
        repo.save(&b).unwrap();
        assert!(matches!(repo.save(&a), Err(StoreError::Duplicate(_))));

        assert_eq!(repo.find_by_status(Some(PhotoStatus::Pending)).unwrap().len(), 2);
        assert!(repo.find_by_status(Some(PhotoStatus::Approved)).unwrap().is_empty());

        let approved = repo
            .update_status(&a.id, PhotoStatus::Approved, Some("Sam"))
            .unwrap();
        assert_eq!(approved.status, PhotoStatus::Approved);
        assert!(approved.approved_at.is_some());
        assert_eq!(approved.approved_by.as_deref(), Some("Sam"));

        // Re-approving keeps the original approval.
        let again = repo
            .update_status(&a.id, PhotoStatus::Approved, Some("Other"))
            .unwrap();
        assert_eq!(again.approved_at, approved.approved_at);
        assert_eq!(again.approved_by.as_deref(), Some("Sam"));

        assert!(matches!(
            repo.update_status(&a.id, PhotoStatus::Pending, None),
            Err(StoreError::InvalidTransition { .. })
        ));
        assert!(matches!(
            repo.update_status("missing", PhotoStatus::Approved, None),
            Err(StoreError::NotFound(_))
        ));

        let stored = repo.find_by_id(&a.id).unwrap().unwrap();
        assert_eq!(stored.status, PhotoStatus::Approved);
        assert_eq!(repo.find_by_status(None).unwrap().len(), 2);
    }

    #[test]
    fn test_memory_repository() {
        exercise(&MemoryPhotoRepository::new());
    }

    #[test]
    fn test_sqlite_repository() {
        exercise(&SqlitePhotoRepository::from_database(
            Database::open_in_memory().unwrap(),
        ));
    }

    #[test]
    fn test_sqlite_repository_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photos.db");
        let photo = record("Ana");

        {
            let repo = SqlitePhotoRepository::open(&path).unwrap();
            repo.save(&photo).unwrap();
        }

        let repo = SqlitePhotoRepository::open(&path).unwrap();
        let loaded = repo.find_by_id(&photo.id).unwrap().unwrap();
        assert_eq!(loaded, photo);
    }
}
