//! Watch event data model.
//!
//! A single entry of a participant's watch history: when a video was
//! watched and which one.

use std::fmt;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const VIDEO_ID_LEN: usize = 11;

/// YouTube video identifier. Always 11 characters from `[A-Za-z0-9_-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VideoId(String);

impl VideoId {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.len() != VIDEO_ID_LEN {
            bail!("video id '{raw}' must be {VIDEO_ID_LEN} characters, got {}", raw.len());
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            bail!("video id '{raw}' contains characters outside [A-Za-z0-9_-]");
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for VideoId {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<VideoId> for String {
    fn from(id: VideoId) -> Self {
        id.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchEvent {
    pub watched_at: DateTime<Utc>,
    pub video_id: VideoId,
}

impl WatchEvent {
    pub fn new(watched_at: DateTime<Utc>, video_id: VideoId) -> Self {
        Self {
            watched_at,
            video_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_ids() {
        let id = VideoId::parse("dQw4w9WgXcQ").unwrap();
        assert_eq!(id.as_str(), "dQw4w9WgXcQ");
        assert!(VideoId::parse("a-b_c-d_e-f").is_ok());
    }

    #[test]
    fn rejects_wrong_length_or_charset() {
        assert!(VideoId::parse("short").is_err());
        assert!(VideoId::parse("dQw4w9WgXcQx").is_err());
        assert!(VideoId::parse("dQw4w9WgX?Q").is_err());
    }

    #[test]
    fn deserialization_validates() {
        let ok: Result<VideoId, _> = serde_json::from_str("\"dQw4w9WgXcQ\"");
        assert!(ok.is_ok());
        let bad: Result<VideoId, _> = serde_json::from_str("\"nope\"");
        assert!(bad.is_err());
    }
}
