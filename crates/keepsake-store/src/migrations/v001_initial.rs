//! v001 -- Initial schema creation.
//!
//! Creates the `photos` table holding guest upload records.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS photos (
    id               TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    file_name        TEXT NOT NULL,               -- blob-store key
    original_name    TEXT NOT NULL,
    uploader_name    TEXT NOT NULL,
    uploader_email   TEXT,
    uploader_message TEXT,
    storage_url      TEXT NOT NULL,
    content_type     TEXT NOT NULL,
    size_bytes       INTEGER NOT NULL,
    optimized        INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1
    status           TEXT NOT NULL,               -- 'pending' | 'approved'
    uploaded_at      TEXT NOT NULL,               -- RFC-3339
    approved_at      TEXT,                        -- set iff status = 'approved'
    approved_by      TEXT,
    category         TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_photos_status_uploaded
    ON photos(status, uploaded_at DESC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
