use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::VideoId;

pub const MAX_DESCRIPTION_CHARS: usize = 1200;
const TRUNCATED_DESCRIPTION_CHARS: usize = 1195;

/// Enrichment data for one video, as returned by a metadata source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub video_id: VideoId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Seconds.
    #[serde(default)]
    pub duration_secs: Option<f64>,
    #[serde(default)]
    pub publish_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub view_count: Option<u64>,
    #[serde(default)]
    pub like_count: Option<u64>,
    #[serde(default)]
    pub comment_count: Option<u64>,
    #[serde(default)]
    pub favorite_count: Option<u64>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub channel_title: Option<String>,
    #[serde(default)]
    pub channel_icon: Option<String>,
}

impl VideoMetadata {
    pub fn new(video_id: VideoId, title: impl Into<String>) -> Self {
        let thumbnail = Some(default_thumbnail(&video_id));
        Self {
            video_id,
            title: title.into(),
            description: None,
            duration_secs: None,
            publish_time: None,
            view_count: None,
            like_count: None,
            comment_count: None,
            favorite_count: None,
            category_id: None,
            thumbnail,
            channel_id: None,
            channel_title: None,
            channel_icon: None,
        }
    }

    /// Cuts over-long descriptions to fit the cache column.
    pub fn with_clipped_description(mut self) -> Self {
        if let Some(description) = self.description.as_mut() {
            if description.chars().count() > MAX_DESCRIPTION_CHARS {
                let clipped: String = description.chars().take(TRUNCATED_DESCRIPTION_CHARS).collect();
                *description = format!("{clipped}...");
            }
        }
        self
    }
}

pub fn default_thumbnail(video_id: &VideoId) -> String {
    format!("https://img.youtube.com/vi/{video_id}/hqdefault.jpg")
}
