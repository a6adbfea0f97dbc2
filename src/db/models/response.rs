use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AttentionSide, EventRef, Response, VideoId};

/// One answer to a real video, keyed by the originating event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
    pub event_ref: EventRef,
    pub video_id: VideoId,
    pub response: Response,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttentionRecord {
    pub side: AttentionSide,
    pub response: Response,
    pub passed: bool,
    /// Rated-video count when the probe was shown.
    pub rated_count: u32,
    pub created_at: DateTime<Utc>,
}

/// Row of the end-of-study review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryEntry {
    pub video_id: VideoId,
    pub title: Option<String>,
    pub response: Response,
    pub created_at: DateTime<Utc>,
}
