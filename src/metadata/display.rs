//! Human-readable labels for video cards.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::types::VideoMetadata;

const MINUTE: i64 = 60;
const HOUR: i64 = 3_600;
const DAY: i64 = 86_400;
const WEEK: i64 = 604_800;
const MONTH: i64 = 2_592_000;
const YEAR: i64 = 31_536_000;

/// "3 days ago" style age relative to `now`.
pub fn display_age(published: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - published).num_seconds().max(0);
    match secs {
        s if s < MINUTE => format!("{s} seconds ago"),
        s if s < HOUR => format!("{} minutes ago", s / MINUTE),
        s if s < DAY => format!("{} hours ago", s / HOUR),
        s if s < WEEK => format!("{} days ago", s / DAY),
        s if s < MONTH => format!("{} weeks ago", s / WEEK),
        s if s < YEAR => format!("{} months ago", s / MONTH),
        s => format!("{} years ago", s / YEAR),
    }
}

pub fn display_views(view_count: Option<u64>) -> String {
    match view_count {
        None => String::new(),
        Some(n) if n < 1_000 => n.to_string(),
        Some(n) if n < 1_000_000 => format!("{}K", n / 1_000),
        Some(n) => format!("{}.{}M", n / 1_000_000, n % 1_000_000 / 100_000),
    }
}

pub fn display_duration(duration_secs: f64) -> String {
    let total = duration_secs.max(0.0) as u64;
    let hours = total / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

/// A video ready to show to a participant.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoCard {
    pub title: String,
    pub channel_title: String,
    pub watched_at: String,
    pub display_age: String,
    pub display_views: String,
    pub display_duration: String,
    pub thumbnail: Option<String>,
}

impl VideoCard {
    pub fn build(meta: &VideoMetadata, watched_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            title: meta.title.clone(),
            channel_title: meta.channel_title.clone().unwrap_or_default(),
            watched_at: watched_at.format("%-I:%M %p").to_string(),
            display_age: meta
                .publish_time
                .map(|published| display_age(published, now))
                .unwrap_or_default(),
            display_views: display_views(meta.view_count),
            display_duration: meta.duration_secs.map(display_duration).unwrap_or_default(),
            thumbnail: meta.thumbnail.clone(),
        }
    }
}
