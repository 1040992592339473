//! Guest photo upload pipeline.
//!
//! Each file in a batch goes through validate -> optimize -> name -> store
//! bytes -> save record, one at a time and in input order. A failure in any
//! step becomes that file's error entry; the rest of the batch carries on.
//! After the batch, an optional thank-you email is dispatched on its own task.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use keepsake_shared::constants::UPLOAD_TYPE_GUEST_PHOTO;
use keepsake_shared::policy::storage_key;
use keepsake_shared::{
    optimize_for_web, NewPhoto, OptimizeError, PhotoRecord, RawFile, UploadError, UploadOutcome,
    UploadPolicy, UploaderInfo,
};
use keepsake_store::{PhotoRepository, StoreError};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::blob_store::{BlobError, BlobStore, PutOptions};
use crate::mailer::Mailer;
use crate::templates::EmailTemplates;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Rejected(#[from] UploadError),

    #[error("Failed to store file: {0}")]
    Storage(#[from] BlobError),

    #[error("Failed to save photo record: {0}")]
    Record(#[from] StoreError),

    #[error("Record task failed: {0}")]
    Task(String),
}

/// Outcome of one `process_upload` call.
#[derive(Debug)]
pub struct UploadBatch {
    /// One entry per input file, in input order.
    pub results: Vec<UploadOutcome>,
    /// The thank-you email task, if the uploader left an address. Resolves to
    /// whether the email went out.
    pub notification: Option<JoinHandle<bool>>,
}

impl UploadBatch {
    pub fn stored_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_stored()).count()
    }
}

pub struct UploadPipeline {
    policy: UploadPolicy,
    require_approval: bool,
    blob_store: Arc<dyn BlobStore>,
    repository: Arc<dyn PhotoRepository>,
    mailer: Arc<dyn Mailer>,
    templates: EmailTemplates,
}

impl UploadPipeline {
    pub fn new(
        policy: UploadPolicy,
        require_approval: bool,
        blob_store: Arc<dyn BlobStore>,
        repository: Arc<dyn PhotoRepository>,
        mailer: Arc<dyn Mailer>,
        templates: EmailTemplates,
    ) -> Self {
        Self {
            policy,
            require_approval,
            blob_store,
            repository,
            mailer,
            templates,
        }
    }

    pub fn require_approval(&self) -> bool {
        self.require_approval
    }

    /// Process a batch. Never fails as a whole.
    ///
    /// Callers are expected to have checked that `uploader.name` is non-blank
    /// and `files` is non-empty.
    pub async fn process_upload(&self, files: Vec<RawFile>, uploader: &UploaderInfo) -> UploadBatch {
        let file_count = files.len();
        let mut results = Vec::with_capacity(file_count);
        let mut last_millis = None;

        for file in files {
            let original_name = file.original_name.clone();
            match self.process_file(file, uploader, &mut last_millis).await {
                Ok(record) => {
                    info!(
                        photo_id = %record.id,
                        key = %record.file_name,
                        status = %record.status,
                        optimized = record.optimized,
                        "Guest photo stored"
                    );
                    results.push(UploadOutcome::Stored(record));
                }
                Err(e) => {
                    warn!(file = %original_name, error = %e, "Guest photo rejected");
                    results.push(UploadOutcome::Failed {
                        error: e.to_string(),
                        file: original_name,
                    });
                }
            }
        }

        let notification = uploader
            .email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .map(|email| self.spawn_thank_you(&uploader.name, email, file_count));

        UploadBatch {
            results,
            notification,
        }
    }

    async fn process_file(
        &self,
        file: RawFile,
        uploader: &UploaderInfo,
        last_millis: &mut Option<i64>,
    ) -> Result<PhotoRecord, PipelineError> {
        let extension = self.policy.validate(&file)?;

        let RawFile {
            bytes,
            original_name,
            content_type,
        } = file;
        let (bytes, optimized) = optimize_or_original(bytes, &original_name).await;

        let now = Utc::now();
        let millis = next_key_millis(last_millis, now.timestamp_millis());
        let key = storage_key(&uploader.name, millis, &extension);
        let options = PutOptions {
            content_type: content_type.clone(),
            metadata: BTreeMap::from([
                ("uploadType".to_string(), UPLOAD_TYPE_GUEST_PHOTO.to_string()),
                ("uploadedAt".to_string(), now.to_rfc3339()),
                ("uploaderName".to_string(), uploader.name.clone()),
                ("originalName".to_string(), original_name.clone()),
            ]),
        };
        let stored = self.blob_store.put(&bytes, &key, options).await?;

        let record = PhotoRecord::create(
            NewPhoto {
                file_name: stored.key.clone(),
                original_name,
                storage_url: stored.url,
                content_type,
                size_bytes: bytes.len() as u64,
                optimized,
            },
            uploader,
            self.require_approval,
            now,
        );

        // A record that cannot be saved must not leave its blob behind.
        if let Err(e) = self.save_record(&record).await {
            if let Err(cleanup) = self.blob_store.delete(&stored.key).await {
                warn!(key = %stored.key, error = %cleanup, "Failed to remove orphaned blob");
            }
            return Err(e);
        }

        Ok(record)
    }

    async fn save_record(&self, record: &PhotoRecord) -> Result<(), PipelineError> {
        let repository = Arc::clone(&self.repository);
        let record = record.clone();
        tokio::task::spawn_blocking(move || repository.save(&record))
            .await
            .map_err(|e| PipelineError::Task(e.to_string()))?
            .map_err(PipelineError::from)
    }

    fn spawn_thank_you(&self, name: &str, email: &str, file_count: usize) -> JoinHandle<bool> {
        let mailer = Arc::clone(&self.mailer);
        let message = self.templates.upload_thank_you(name, email, file_count);

        tokio::spawn(async move {
            match mailer.send(&message).await {
                Ok(()) => {
                    info!(target: "keepsake::notify", to = %message.to, "Upload thank-you sent");
                    true
                }
                Err(e) => {
                    warn!(
                        target: "keepsake::notify",
                        to = %message.to,
                        error = %e,
                        "Upload thank-you failed"
                    );
                    false
                }
            }
        })
    }
}

/// Millisecond stamp for the next key in a batch. Strictly increasing within
/// the batch so two files never share a key.
fn next_key_millis(last: &mut Option<i64>, now_millis: i64) -> i64 {
    let millis = match *last {
        Some(prev) if prev >= now_millis => prev + 1,
        _ => now_millis,
    };
    *last = Some(millis);
    millis
}

/// Re-encode on the blocking pool; on any failure (including a panic inside
/// the decoder) hand back the original bytes.
async fn optimize_or_original(bytes: Vec<u8>, original_name: &str) -> (Vec<u8>, bool) {
    let shared = Arc::new(bytes);
    let input = Arc::clone(&shared);

    let result = tokio::task::spawn_blocking(move || optimize_for_web(&input))
        .await
        .map_err(|e| OptimizeError::Task(e.to_string()))
        .and_then(|r| r);

    match result {
        Ok(optimized) => {
            debug!(
                file = %original_name,
                width = optimized.width,
                height = optimized.height,
                before = shared.len(),
                after = optimized.bytes.len(),
                "Optimized image"
            );
            (optimized.bytes, true)
        }
        Err(e) => {
            debug!(file = %original_name, error = %e, "Optimization skipped, keeping original bytes");
            let original = Arc::try_unwrap(shared).unwrap_or_else(|arc| arc.as_ref().clone());
            (original, false)
        }
    }
}
