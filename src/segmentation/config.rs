use anyhow::{bail, Result};
use chrono::{DateTime, Duration, Utc};

/// Configuration for the segmentation algorithm.
#[derive(Debug, Clone)]
pub struct SegmentationConfig {
    /// A gap strictly greater than this starts a new session.
    pub session_gap: Duration,
}

impl SegmentationConfig {
    pub fn new(session_gap: Duration) -> Result<Self> {
        if session_gap <= Duration::zero() {
            bail!(
                "session gap must be positive, got {}s",
                session_gap.num_seconds()
            );
        }
        Ok(Self { session_gap })
    }

    pub fn from_minutes(minutes: u32) -> Result<Self> {
        Self::new(Duration::minutes(i64::from(minutes)))
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            session_gap: Duration::minutes(30),
        }
    }
}

/// Eligibility rules a session must meet to be drawn for presentation.
#[derive(Debug, Clone, Default)]
pub struct EligibilityRules {
    /// The session's last event must be at or after this instant. `None` disables the check.
    pub recency_cutoff: Option<DateTime<Utc>>,
    pub min_videos_per_session: usize,
}
