use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        multipart::MultipartError,
        rejection::{JsonRejection, QueryRejection},
        ConnectInfo, DefaultBodyLimit, Multipart, Path, Query, Request, State,
    },
    http::{header, HeaderMap, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use keepsake_shared::{
    GuestbookEntry, PhotoRecord, PhotoStatus, RawFile, StatusFilter, UploadOutcome, UploaderInfo,
};
use keepsake_store::PhotoRepository;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use subtle::ConstantTimeEq;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::analytics::{Analytics, DailyReport, UploadSummary};
use crate::blob_store::{BlobError, BlobStore};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::mailer::Mailer;
use crate::pipeline::UploadPipeline;
use crate::templates::{AnniversaryData, EmailTemplates};
use crate::visitor::visitor_context;

const DEFAULT_POPULAR_LIMIT: usize = 10;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub analytics: Arc<Analytics>,
    pub repository: Arc<dyn PhotoRepository>,
    pub blob_store: Arc<dyn BlobStore>,
    pub mailer: Arc<dyn Mailer>,
    pub templates: EmailTemplates,
    pub pipeline: Arc<UploadPipeline>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        blob_store: Arc<dyn BlobStore>,
        repository: Arc<dyn PhotoRepository>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let templates = EmailTemplates::new(config.email_from.clone(), config.site_name.clone());
        let pipeline = UploadPipeline::new(
            config.upload_policy.clone(),
            config.require_approval,
            Arc::clone(&blob_store),
            Arc::clone(&repository),
            Arc::clone(&mailer),
            templates.clone(),
        );

        Self {
            analytics: Arc::new(Analytics::new(config.popularity_threshold)),
            config: Arc::new(config),
            repository,
            blob_store,
            mailer,
            templates,
            pipeline: Arc::new(pipeline),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let upload_limit = state.config.upload_body_limit();

    let admin = Router::new()
        .route("/guest-uploads", get(list_guest_uploads))
        .route("/approve-photo/:photo_id", post(approve_photo))
        .route("/send-anniversary-email", post(send_anniversary_email))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/health", get(health_check))
        .route("/guestbook", post(submit_guestbook))
        .route(
            "/upload",
            post(upload_photos).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/analytics/popular-photos", get(popular_photos))
        .route("/analytics/engagement", get(engagement_summary))
        .route("/analytics/daily", get(daily_report))
        .route("/track-view", post(track_view))
        .route("/media/*key", get(serve_media))
        .merge(admin)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ─── Guestbook ───

#[derive(Deserialize)]
struct GuestbookRequest {
    #[serde(default)]
    name: String,
    email: Option<String>,
    #[serde(default)]
    message: String,
    photo: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GuestbookResponse {
    success: bool,
    message: String,
    entry: GuestbookEntry,
    email_sent: bool,
}

async fn submit_guestbook(
    State(state): State<AppState>,
    payload: Result<Json<GuestbookRequest>, JsonRejection>,
) -> Result<Json<GuestbookResponse>, ServerError> {
    let Json(req) = payload?;
    let name = req.name.trim();
    let message = req.message.trim();
    if name.is_empty() || message.is_empty() {
        return Err(ServerError::BadRequest("Name and message are required".into()));
    }

    let entry = GuestbookEntry::new(
        name.to_string(),
        non_blank(req.email),
        message.to_string(),
        non_blank(req.photo),
    );
    let analytics = state.analytics.record_guestbook_entry(&entry).await;
    info!(entry_id = %entry.id, sentiment = ?analytics.sentiment, "Guestbook entry received");

    let email_sent = match entry.email.as_deref() {
        Some(to) => {
            let email = state.templates.guestbook_thank_you(&entry, to);
            match state.mailer.send(&email).await {
                Ok(()) => {
                    info!(target: "keepsake::notify", to = %to, "Guestbook thank-you sent");
                    true
                }
                Err(e) => {
                    warn!(target: "keepsake::notify", to = %to, error = %e, "Guestbook thank-you failed");
                    false
                }
            }
        }
        None => false,
    };

    Ok(Json(GuestbookResponse {
        success: true,
        message: "Thank you for signing our guestbook!".into(),
        entry,
        email_sent,
    }))
}

// ─── Uploads ───

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    success: bool,
    message: String,
    results: Vec<UploadOutcome>,
    requires_approval: bool,
}

async fn upload_photos(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ServerError> {
    let max_files = state.config.max_files_per_upload;
    let mut files = Vec::new();
    let mut uploader = UploaderInfo::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "photos" => {
                if files.len() >= max_files {
                    return Err(ServerError::BadRequest(format!(
                        "Too many files (max {max_files} per upload)"
                    )));
                }
                let original_name = field.file_name().unwrap_or("").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                let file = RawFile {
                    bytes: bytes.to_vec(),
                    original_name,
                    content_type,
                };
                state
                    .config
                    .upload_policy
                    .validate(&file)
                    .map_err(|e| ServerError::BadRequest(format!("{}: {e}", file.original_name)))?;
                files.push(file);
            }
            "uploaderName" => {
                uploader.name = field.text().await.map_err(multipart_error)?.trim().to_string();
            }
            "uploaderEmail" => {
                uploader.email = non_blank(Some(field.text().await.map_err(multipart_error)?));
            }
            "uploaderMessage" => {
                uploader.message = non_blank(Some(field.text().await.map_err(multipart_error)?));
            }
            _ => {}
        }
    }

    if uploader.name.is_empty() {
        return Err(ServerError::BadRequest("Uploader name is required".into()));
    }
    if files.is_empty() {
        return Err(ServerError::BadRequest("No photos provided".into()));
    }

    let total = files.len();
    let batch = state.pipeline.process_upload(files, &uploader).await;
    let stored = batch.stored_count();

    state
        .analytics
        .record_photo_upload(UploadSummary {
            uploader_name: uploader.name.clone(),
            file_count: total,
            has_message: uploader.message.is_some(),
        })
        .await;

    info!(uploader = %uploader.name, total, stored, "Upload batch processed");

    Ok(Json(UploadResponse {
        success: true,
        message: format!("{stored} of {total} photos uploaded successfully"),
        results: batch.results,
        requires_approval: state.pipeline.require_approval(),
    }))
}

fn multipart_error(e: MultipartError) -> ServerError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServerError::PayloadTooLarge(e.body_text())
    } else {
        ServerError::BadRequest(format!("Multipart error: {}", e.body_text()))
    }
}

async fn serve_media(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, ServerError> {
    let object = state.blob_store.get(&key).await.map_err(|e| match e {
        BlobError::NotFound(key) => ServerError::NotFound(format!("No media at {key}")),
        other => other.into(),
    })?;
    Ok(([(header::CONTENT_TYPE, object.content_type)], object.bytes).into_response())
}

// ─── Analytics ───

#[derive(Deserialize)]
struct PopularQuery {
    limit: Option<usize>,
}

async fn popular_photos(
    State(state): State<AppState>,
    query: Result<Query<PopularQuery>, QueryRejection>,
) -> Result<Json<Value>, ServerError> {
    let Query(query) = query?;
    let photos = state
        .analytics
        .popular_photos(query.limit.unwrap_or(DEFAULT_POPULAR_LIMIT))
        .await;
    Ok(Json(json!({
        "success": true,
        "threshold": state.analytics.popularity_threshold(),
        "photos": photos,
    })))
}

async fn engagement_summary(State(state): State<AppState>) -> Json<Value> {
    let summary = state.analytics.engagement_summary().await;
    Json(json!({ "success": true, "summary": summary }))
}

#[derive(Deserialize)]
struct DailyQuery {
    date: Option<String>,
}

async fn daily_report(
    State(state): State<AppState>,
    query: Result<Query<DailyQuery>, QueryRejection>,
) -> Result<Json<Value>, ServerError> {
    let Query(query) = query?;
    let body = match state.analytics.daily_report(query.date.as_deref()).await? {
        DailyReport::NoData { date } => json!({
            "success": true,
            "date": date,
            "hasData": false,
        }),
        DailyReport::Report(report) => json!({
            "success": true,
            "date": report.date,
            "hasData": true,
            "report": report,
        }),
    };
    Ok(Json(body))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackViewRequest {
    #[serde(default)]
    photo_id: String,
}

async fn track_view(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<TrackViewRequest>, JsonRejection>,
) -> Result<Json<Value>, ServerError> {
    let Json(req) = payload?;
    let photo_id = req.photo_id.trim();
    if photo_id.is_empty() {
        return Err(ServerError::BadRequest("photoId is required".into()));
    }

    let visitor = visitor_context(&headers, connect.map(|ConnectInfo(addr)| addr));
    let recorded = state.analytics.record_photo_view(photo_id, visitor).await;

    Ok(Json(json!({ "success": true, "viewCount": recorded.view_count })))
}

// ─── Admin ───

async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    verify_admin_key(request.headers(), state.config.admin_key.as_deref())?;
    Ok(next.run(request).await)
}

fn verify_admin_key(headers: &HeaderMap, expected: Option<&str>) -> Result<(), ServerError> {
    let Some(expected) = expected else {
        return Err(ServerError::Unauthorized);
    };

    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    // Slices of different length compare unequal.
    if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        Err(ServerError::Unauthorized)
    }
}

#[derive(Deserialize)]
struct ListQuery {
    #[serde(default)]
    status: StatusFilter,
}

#[derive(Serialize)]
struct PhotoListResponse {
    success: bool,
    count: usize,
    photos: Vec<PhotoRecord>,
}

async fn list_guest_uploads(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<PhotoListResponse>, ServerError> {
    let Query(query) = query?;
    let status = query.status.as_status();
    let photos = with_repository(&state, move |repo| repo.find_by_status(status)).await?;
    Ok(Json(PhotoListResponse {
        success: true,
        count: photos.len(),
        photos,
    }))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ApproveRequest {
    admin_name: Option<String>,
}

async fn approve_photo(
    State(state): State<AppState>,
    Path(photo_id): Path<String>,
    body: Option<Json<ApproveRequest>>,
) -> Result<Json<Value>, ServerError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let admin_name = non_blank(req.admin_name);

    let photo = with_repository(&state, move |repo| {
        repo.update_status(&photo_id, PhotoStatus::Approved, admin_name.as_deref())
    })
    .await?;

    info!(photo_id = %photo.id, approved_by = ?photo.approved_by, "Photo approved");
    Ok(Json(json!({
        "success": true,
        "message": "Photo approved",
        "photo": photo,
    })))
}

#[derive(Deserialize)]
struct Recipient {
    email: String,
    name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnniversaryRequest {
    #[serde(default)]
    recipients: Vec<Recipient>,
    #[serde(default)]
    anniversary_data: AnniversaryData,
}

#[derive(Serialize)]
struct RecipientResult {
    email: String,
    success: bool,
}

#[derive(Serialize)]
struct AnniversaryResponse {
    success: bool,
    sent: usize,
    failed: usize,
    results: Vec<RecipientResult>,
}

async fn send_anniversary_email(
    State(state): State<AppState>,
    payload: Result<Json<AnniversaryRequest>, JsonRejection>,
) -> Result<Json<AnniversaryResponse>, ServerError> {
    let Json(req) = payload?;
    if req.recipients.is_empty() {
        return Err(ServerError::BadRequest("At least one recipient is required".into()));
    }

    let mut results = Vec::with_capacity(req.recipients.len());
    for recipient in &req.recipients {
        let email = state.templates.anniversary(
            recipient.name.as_deref(),
            &recipient.email,
            &req.anniversary_data,
        );
        let success = match state.mailer.send(&email).await {
            Ok(()) => true,
            Err(e) => {
                warn!(target: "keepsake::notify", to = %recipient.email, error = %e, "Anniversary email failed");
                false
            }
        };
        results.push(RecipientResult {
            email: recipient.email.clone(),
            success,
        });
    }

    let sent = results.iter().filter(|r| r.success).count();
    let failed = results.len() - sent;
    info!(target: "keepsake::notify", sent, failed, years = req.anniversary_data.years, "Anniversary emails dispatched");

    Ok(Json(AnniversaryResponse {
        success: true,
        sent,
        failed,
        results,
    }))
}

/// Run a repository call on the blocking pool; the SQLite backend does file I/O.
async fn with_repository<T, F>(state: &AppState, f: F) -> Result<T, ServerError>
where
    F: FnOnce(&dyn PhotoRepository) -> keepsake_store::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let repository = Arc::clone(&state.repository);
    tokio::task::spawn_blocking(move || f(repository.as_ref()))
        .await
        .map_err(|e| ServerError::Internal(format!("Repository task failed: {e}")))?
        .map_err(ServerError::from)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
