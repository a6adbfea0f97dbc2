//! Viewing session data models.
//!
//! A viewing session is a maximal run of watch events with no internal
//! gap above the configured threshold. Sessions are produced once by the
//! segmenter and are read-only afterwards.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::WatchEvent;

/// Zero-based chronological index of a session within one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one event of the segmented history. Responses are keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRef {
    pub session_id: SessionId,
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSession {
    pub id: SessionId,
    /// Non-empty, chronological.
    pub events: Vec<WatchEvent>,
}

impl ViewSession {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.events.first().map(|e| e.watched_at)
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.events.last().map(|e| e.watched_at)
    }

    pub fn event_ref(&self, position: usize) -> EventRef {
        EventRef {
            session_id: self.id,
            position: position as u32,
        }
    }
}
