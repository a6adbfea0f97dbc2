//! Upload data model.
//!
//! One row per watch-history file a participant submitted. Every other
//! table hangs off the upload id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Upload {
    pub id: String,
    pub participant_id: String,
    /// Hours; `Some(0.0)` is a real offset, `None` means the participant gave none.
    pub tz_offset_hours: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub completed: bool,
    pub updated_at: Option<DateTime<Utc>>,
}
