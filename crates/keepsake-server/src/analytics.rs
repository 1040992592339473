//! In-process engagement analytics.
//!
//! [`Analytics`] folds photo views, guestbook entries, and upload batches into
//! in-memory maps and derives aggregates on read. Nothing is persisted: state
//! lives as long as the process (or until [`Analytics::reset`]) and grows
//! without bound.
//!
//! Every mutation takes the write lock once, so appending a view and bumping
//! the day bucket happen together.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use keepsake_shared::{GuestbookEntry, Sentiment};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// IP recorded when a request carries no usable client address.
pub const UNKNOWN_VISITOR: &str = "unknown";

/// Recency bonus at the moment of the last view; decays by one point per day.
const MAX_RECENCY_SCORE: f64 = 10.0;

/// Number of day buckets in the engagement trend.
const TREND_DAYS: usize = 7;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Who is looking at a photo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitorContext {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewEvent {
    pub timestamp: DateTime<Utc>,
    pub visitor_ip: String,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub session_id: Option<String>,
}

/// Result of recording a single view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewRecorded {
    pub view_count: usize,
    /// True only for the view that carried the photo across the threshold.
    pub became_popular: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GuestbookAnalytics {
    pub entry_id: String,
    pub name: String,
    pub has_email: bool,
    pub has_photo: bool,
    pub message_length: usize,
    pub sentiment: Sentiment,
    pub timestamp: DateTime<Utc>,
}

/// One upload batch as reported by the upload route.
#[derive(Debug, Clone)]
pub struct UploadSummary {
    pub uploader_name: String,
    pub file_count: usize,
    pub has_message: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadAnalytics {
    pub uploader_name: String,
    pub file_count: usize,
    pub has_message: bool,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Derived views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoPopularity {
    pub photo_id: String,
    pub view_count: usize,
    pub unique_viewers: usize,
    pub last_viewed: DateTime<Utc>,
    pub score: f64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SentimentTally {
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestbookStats {
    pub total_entries: usize,
    pub average_message_length: f64,
    pub entries_with_photos: usize,
    pub entries_with_email: usize,
    pub sentiment: SentimentTally,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStats {
    pub total_uploads: usize,
    pub total_photos: usize,
    pub unique_uploaders: usize,
    pub average_photos_per_upload: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DayActivity {
    pub date: NaiveDate,
    pub views: u64,
    pub unique_visitors: usize,
    pub guestbook_entries: u64,
    pub photo_uploads: u64,
    pub total_activity: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallStats {
    pub total_views: usize,
    pub photos_viewed: usize,
    pub most_active_day: Option<DayActivity>,
    pub engagement_trend: Vec<DayActivity>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementSummary {
    pub guestbook: GuestbookStats,
    pub photo_uploads: UploadStats,
    pub overall: OverallStats,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DayReport {
    pub date: NaiveDate,
    pub views: u64,
    pub unique_visitors: usize,
    pub guestbook_entries: u64,
    pub photo_uploads: u64,
    pub engagement_score: u64,
}

/// Either the day's numbers or an explicit "nothing happened that day".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DailyReport {
    NoData { date: NaiveDate },
    Report(DayReport),
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct DayBucket {
    view_count: u64,
    unique_visitors: HashSet<String>,
    guestbook_entries: u64,
    photo_uploads: u64,
}

impl DayBucket {
    fn activity(&self, date: NaiveDate) -> DayActivity {
        DayActivity {
            date,
            views: self.view_count,
            unique_visitors: self.unique_visitors.len(),
            guestbook_entries: self.guestbook_entries,
            photo_uploads: self.photo_uploads,
            total_activity: self.view_count + self.guestbook_entries + self.photo_uploads,
        }
    }
}

#[derive(Debug, Default)]
struct AnalyticsState {
    photo_views: HashMap<String, Vec<ViewEvent>>,
    daily_stats: BTreeMap<NaiveDate, DayBucket>,
    guestbook: Vec<GuestbookAnalytics>,
    photo_uploads: Vec<UploadAnalytics>,
}

impl AnalyticsState {
    fn day(&mut self, at: DateTime<Utc>) -> &mut DayBucket {
        self.daily_stats.entry(at.date_naive()).or_default()
    }
}

/// Process-local analytics store. Construct once and share behind an `Arc`.
#[derive(Debug)]
pub struct Analytics {
    popularity_threshold: usize,
    state: RwLock<AnalyticsState>,
}

impl Analytics {
    pub fn new(popularity_threshold: usize) -> Self {
        Self {
            popularity_threshold,
            state: RwLock::new(AnalyticsState::default()),
        }
    }

    pub fn popularity_threshold(&self) -> usize {
        self.popularity_threshold
    }

    /// Drop every recorded event.
    pub async fn reset(&self) {
        *self.state.write().await = AnalyticsState::default();
    }

    // -- Recording ----------------------------------------------------------

    pub async fn record_photo_view(&self, photo_id: &str, visitor: VisitorContext) -> ViewRecorded {
        self.record_photo_view_at(photo_id, visitor, Utc::now()).await
    }

    pub async fn record_photo_view_at(
        &self,
        photo_id: &str,
        visitor: VisitorContext,
        at: DateTime<Utc>,
    ) -> ViewRecorded {
        let visitor_ip = visitor
            .ip
            .filter(|ip| !ip.is_empty())
            .unwrap_or_else(|| UNKNOWN_VISITOR.to_string());

        let mut state = self.state.write().await;

        let views = state.photo_views.entry(photo_id.to_string()).or_default();
        let before = views.len();
        views.push(ViewEvent {
            timestamp: at,
            visitor_ip: visitor_ip.clone(),
            user_agent: visitor.user_agent,
            referrer: visitor.referrer,
            session_id: visitor.session_id,
        });
        let after = views.len();

        let day = state.day(at);
        day.view_count += 1;
        day.unique_visitors.insert(visitor_ip);

        let became_popular = before < self.popularity_threshold && self.popularity_threshold <= after;
        if became_popular {
            info!(
                target: "keepsake::analytics",
                photo_id = %photo_id,
                views = after,
                threshold = self.popularity_threshold,
                "Photo became popular"
            );
        }

        ViewRecorded {
            view_count: after,
            became_popular,
        }
    }

    pub async fn record_guestbook_entry(&self, entry: &GuestbookEntry) -> GuestbookAnalytics {
        let record = GuestbookAnalytics {
            entry_id: entry.id.clone(),
            name: entry.name.clone(),
            has_email: entry.email.is_some(),
            has_photo: entry.photo.is_some(),
            message_length: entry.message.chars().count(),
            sentiment: Sentiment::classify(&entry.message),
            timestamp: entry.created_at,
        };

        let mut state = self.state.write().await;
        state.guestbook.push(record.clone());
        state.day(record.timestamp).guestbook_entries += 1;

        debug!(entry_id = %record.entry_id, sentiment = ?record.sentiment, "Guestbook entry recorded");
        record
    }

    pub async fn record_photo_upload(&self, summary: UploadSummary) -> UploadAnalytics {
        self.record_photo_upload_at(summary, Utc::now()).await
    }

    pub async fn record_photo_upload_at(
        &self,
        summary: UploadSummary,
        at: DateTime<Utc>,
    ) -> UploadAnalytics {
        let record = UploadAnalytics {
            uploader_name: summary.uploader_name,
            file_count: summary.file_count,
            has_message: summary.has_message,
            timestamp: at,
        };

        let mut state = self.state.write().await;
        state.photo_uploads.push(record.clone());
        state.day(at).photo_uploads += record.file_count as u64;

        debug!(uploader = %record.uploader_name, files = record.file_count, "Photo upload recorded");
        record
    }

    // -- Queries ------------------------------------------------------------

    pub async fn photo_view_count(&self, photo_id: &str) -> usize {
        let state = self.state.read().await;
        state.photo_views.get(photo_id).map_or(0, Vec::len)
    }

    pub async fn popular_photos(&self, limit: usize) -> Vec<PhotoPopularity> {
        self.popular_photos_at(limit, Utc::now()).await
    }

    /// Photos at or above the threshold, best score first.
    ///
    /// `score = 2 * unique viewers + total views + recency`, where recency
    /// falls linearly from 10 at the last view to 0 ten days later.
    pub async fn popular_photos_at(&self, limit: usize, now: DateTime<Utc>) -> Vec<PhotoPopularity> {
        let state = self.state.read().await;

        let mut popular: Vec<PhotoPopularity> = state
            .photo_views
            .iter()
            .filter(|(_, views)| views.len() >= self.popularity_threshold)
            .filter_map(|(photo_id, views)| {
                let last_viewed = views.iter().map(|v| v.timestamp).max()?;
                let unique_viewers = views
                    .iter()
                    .map(|v| v.visitor_ip.as_str())
                    .collect::<HashSet<_>>()
                    .len();
                let hours_since = (now - last_viewed).num_seconds().max(0) as f64 / 3600.0;
                let recency = (MAX_RECENCY_SCORE - hours_since / 24.0).max(0.0);

                Some(PhotoPopularity {
                    photo_id: photo_id.clone(),
                    view_count: views.len(),
                    unique_viewers,
                    last_viewed,
                    score: 2.0 * unique_viewers as f64 + views.len() as f64 + recency,
                })
            })
            .collect();

        popular.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.photo_id.cmp(&b.photo_id))
        });
        popular.truncate(limit);
        popular
    }

    /// Recomputed from the raw logs on every call.
    pub async fn engagement_summary(&self) -> EngagementSummary {
        let state = self.state.read().await;

        let mut sentiment = SentimentTally::default();
        for entry in &state.guestbook {
            match entry.sentiment {
                Sentiment::Positive => sentiment.positive += 1,
                Sentiment::Neutral => sentiment.neutral += 1,
                Sentiment::Negative => sentiment.negative += 1,
            }
        }
        let total_entries = state.guestbook.len();
        let guestbook = GuestbookStats {
            total_entries,
            average_message_length: average(
                state.guestbook.iter().map(|e| e.message_length).sum(),
                total_entries,
            ),
            entries_with_photos: state.guestbook.iter().filter(|e| e.has_photo).count(),
            entries_with_email: state.guestbook.iter().filter(|e| e.has_email).count(),
            sentiment,
        };

        let total_uploads = state.photo_uploads.len();
        let total_photos: usize = state.photo_uploads.iter().map(|u| u.file_count).sum();
        let photo_uploads = UploadStats {
            total_uploads,
            total_photos,
            unique_uploaders: state
                .photo_uploads
                .iter()
                .map(|u| u.uploader_name.as_str())
                .collect::<HashSet<_>>()
                .len(),
            average_photos_per_upload: average(total_photos, total_uploads),
        };

        let days: Vec<DayActivity> = state
            .daily_stats
            .iter()
            .map(|(date, bucket)| bucket.activity(*date))
            .collect();

        // Earliest day wins a tie.
        let mut most_active_day: Option<&DayActivity> = None;
        for day in &days {
            if most_active_day.map_or(true, |best| day.total_activity > best.total_activity) {
                most_active_day = Some(day);
            }
        }

        let overall = OverallStats {
            total_views: state.photo_views.values().map(Vec::len).sum(),
            photos_viewed: state.photo_views.len(),
            most_active_day: most_active_day.cloned(),
            engagement_trend: days[days.len().saturating_sub(TREND_DAYS)..].to_vec(),
        };

        EngagementSummary {
            guestbook,
            photo_uploads,
            overall,
        }
    }

    /// Report for an ISO date (`YYYY-MM-DD`), or today (UTC) when `None`.
    pub async fn daily_report(&self, date: Option<&str>) -> Result<DailyReport, AnalyticsError> {
        let date = match date {
            Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .map_err(|_| AnalyticsError::InvalidDate(raw.to_string()))?,
            None => Utc::now().date_naive(),
        };
        Ok(self.daily_report_for(date).await)
    }

    pub async fn daily_report_for(&self, date: NaiveDate) -> DailyReport {
        let state = self.state.read().await;
        let Some(bucket) = state.daily_stats.get(&date) else {
            return DailyReport::NoData { date };
        };

        let unique_visitors = bucket.unique_visitors.len();
        DailyReport::Report(DayReport {
            date,
            views: bucket.view_count,
            unique_visitors,
            guestbook_entries: bucket.guestbook_entries,
            photo_uploads: bucket.photo_uploads,
            engagement_score: bucket.view_count
                + bucket.guestbook_entries * 5
                + bucket.photo_uploads * 3
                + unique_visitors as u64 * 2,
        })
    }
}

fn average(total: usize, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}
