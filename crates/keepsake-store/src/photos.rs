use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use keepsake_shared::{PhotoRecord, PhotoStatus};

use crate::database::Database;
use crate::error::{Result, StoreError};

const PHOTO_COLUMNS: &str = "id, file_name, original_name, uploader_name, uploader_email,
     uploader_message, storage_url, content_type, size_bytes, optimized, status,
     uploaded_at, approved_at, approved_by, category";

impl Database {
    pub fn insert_photo(&self, photo: &PhotoRecord) -> Result<()> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO photos ({PHOTO_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
                ),
                params![
                    photo.id,
                    photo.file_name,
                    photo.original_name,
                    photo.uploader_name,
                    photo.uploader_email,
                    photo.uploader_message,
                    photo.storage_url,
                    photo.content_type,
                    photo.size_bytes as i64,
                    photo.optimized as i32,
                    photo.status.as_str(),
                    photo.uploaded_at.to_rfc3339(),
                    photo.approved_at.map(|t| t.to_rfc3339()),
                    photo.approved_by,
                    photo.category,
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    StoreError::Duplicate(photo.id.clone())
                }
                other => StoreError::Sqlite(other),
            })?;
        Ok(())
    }

    pub fn get_photo(&self, id: &str) -> Result<Option<PhotoRecord>> {
        let photo = self
            .conn()
            .query_row(
                &format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE id = ?1"),
                params![id],
                row_to_photo,
            )
            .optional()?;
        Ok(photo)
    }

    /// Newest first. `None` lists every status.
    pub fn list_photos(&self, status: Option<PhotoStatus>) -> Result<Vec<PhotoRecord>> {
        let mut photos = Vec::new();
        match status {
            Some(status) => {
                let mut stmt = self.conn().prepare(&format!(
                    "SELECT {PHOTO_COLUMNS} FROM photos
                     WHERE status = ?1
                     ORDER BY uploaded_at DESC"
                ))?;
                for row in stmt.query_map(params![status.as_str()], row_to_photo)? {
                    photos.push(row?);
                }
            }
            None => {
                let mut stmt = self.conn().prepare(&format!(
                    "SELECT {PHOTO_COLUMNS} FROM photos ORDER BY uploaded_at DESC"
                ))?;
                for row in stmt.query_map([], row_to_photo)? {
                    photos.push(row?);
                }
            }
        }
        Ok(photos)
    }

    pub fn update_photo_approval(&self, photo: &PhotoRecord) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE photos SET status = ?1, approved_at = ?2, approved_by = ?3 WHERE id = ?4",
            params![
                photo.status.as_str(),
                photo.approved_at.map(|t| t.to_rfc3339()),
                photo.approved_by,
                photo.id,
            ],
        )?;
        Ok(affected > 0)
    }
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn row_to_photo(row: &rusqlite::Row<'_>) -> rusqlite::Result<PhotoRecord> {
    let size_bytes: i64 = row.get(8)?;
    let optimized: i32 = row.get(9)?;
    let status_str: String = row.get(10)?;
    let uploaded_str: String = row.get(11)?;
    let approved_str: Option<String> = row.get(12)?;

    let status = status_str.parse::<PhotoStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            10,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        )
    })?;

    Ok(PhotoRecord {
        id: row.get(0)?,
        file_name: row.get(1)?,
        original_name: row.get(2)?,
        uploader_name: row.get(3)?,
        uploader_email: row.get(4)?,
        uploader_message: row.get(5)?,
        storage_url: row.get(6)?,
        content_type: row.get(7)?,
        size_bytes: size_bytes.max(0) as u64,
        optimized: optimized != 0,
        status,
        uploaded_at: parse_timestamp(11, &uploaded_str)?,
        approved_at: approved_str
            .as_deref()
            .map(|s| parse_timestamp(12, s))
            .transpose()?,
        approved_by: row.get(13)?,
        category: row.get(14)?,
    })
}
