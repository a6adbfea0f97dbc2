use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db::models::{AttentionRecord, ResponseRecord},
    metadata::VideoMetadata,
    models::{AttentionSide, EventRef, SessionId, ViewSession, WatchEvent},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum WalkthroughPhase {
    #[default]
    AwaitingFirstSession,
    PresentingSession,
    RatingVideo,
    AttentionCheck,
    SessionExhausted,
    Summary,
    Terminated,
}

/// How a participant's run ended. These are results shown to the
/// participant, not errors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    InsufficientSessions,
    InsufficientVideos,
    InsufficientData,
    PartialSuccess,
    Complete,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::InsufficientSessions => "INSUFFICIENT_SESSIONS",
            Outcome::InsufficientVideos => "INSUFFICIENT_VIDEOS",
            Outcome::InsufficientData => "INSUFFICIENT_DATA",
            Outcome::PartialSuccess => "PARTIAL_SUCCESS",
            Outcome::Complete => "COMPLETE",
        }
    }

    /// Whether the run collected enough ratings to proceed to the summary.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::PartialSuccess | Outcome::Complete)
    }

    pub fn message(&self) -> &'static str {
        match self {
            Outcome::InsufficientSessions => {
                "Not enough sessions in recent history. Make sure you uploaded the correct file."
            }
            Outcome::InsufficientVideos => {
                "Not enough videos in history file. Make sure you uploaded the correct file."
            }
            Outcome::InsufficientData => {
                "No more sessions to show. You have not completed rating enough videos to qualify."
            }
            Outcome::PartialSuccess => {
                "No more sessions to show. You rated enough videos, thank you!"
            }
            Outcome::Complete => "You rated all the videos we needed, thank you!",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitItem {
    pub event_ref: EventRef,
    pub event: WatchEvent,
    pub metadata: VideoMetadata,
}

/// A drawn session after enrichment and truncation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationUnit {
    pub session_id: SessionId,
    /// 1-based order in which units were shown to the participant.
    pub position: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Length of the underlying session before enrichment and truncation.
    pub session_len: usize,
    pub items: Vec<UnitItem>,
}

impl PresentationUnit {
    /// `None` for an empty session, which the segmenter never produces.
    pub fn build(session: &ViewSession, position: u32, items: Vec<UnitItem>) -> Option<Self> {
        Some(Self {
            session_id: session.id,
            position,
            started_at: session.start_time()?,
            ended_at: session.end_time()?,
            session_len: session.len(),
            items,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn day_label(&self) -> String {
        self.started_at.format("%B %d, %Y").to_string()
    }

    pub fn time_range_label(&self) -> String {
        format!(
            "{} - {}",
            self.started_at.format("%-I:%M %p"),
            self.ended_at.format("%-I:%M %p")
        )
    }
}

/// Per-participant walkthrough state. Passed into and returned from every
/// controller operation; storing it between requests is the caller's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantProgress {
    pub phase: WalkthroughPhase,
    /// Eligible sessions not yet drawn. Only ever shrinks.
    pub remaining_sessions: Vec<SessionId>,
    /// Every session drawn so far, in draw order, including discarded ones.
    pub drawn_sessions: Vec<SessionId>,
    /// Non-skip responses so far. Only ever grows.
    pub rated_count: u32,
    pub attention_checks_completed: u8,
    pub current_unit: Option<PresentationUnit>,
    pub current_video_index: usize,
    pub units_presented: u32,
    pub outcome: Option<Outcome>,
}

impl ParticipantProgress {
    pub fn new(eligible: Vec<SessionId>) -> Self {
        Self {
            phase: WalkthroughPhase::AwaitingFirstSession,
            remaining_sessions: eligible,
            drawn_sessions: Vec::new(),
            rated_count: 0,
            attention_checks_completed: 0,
            current_unit: None,
            current_video_index: 0,
            units_presented: 0,
            outcome: None,
        }
    }

    pub fn current_item(&self) -> Option<&UnitItem> {
        self.current_unit
            .as_ref()
            .and_then(|unit| unit.items.get(self.current_video_index))
    }
}

/// The synthetic probe shown in place of a real video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttentionProbe {
    pub side: AttentionSide,
    pub stimulus: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressInfo {
    pub rated: u32,
    /// Shown as the denominator: the minimum total, or the rated count once it exceeds it.
    pub target: u32,
    pub percent: f64,
}

impl ProgressInfo {
    pub fn new(rated: u32, min_total_videos: u32) -> Self {
        let percent = if min_total_videos == 0 {
            100.0
        } else {
            (f64::from(rated) / f64::from(min_total_videos) * 100.0).min(100.0)
        };
        Self {
            rated,
            target: rated.max(min_total_videos),
            percent,
        }
    }
}

/// What the participant should be shown next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Step {
    /// Overview of a freshly drawn unit.
    Session { unit: PresentationUnit },
    Video {
        unit_position: u32,
        index: usize,
        item: UnitItem,
        progress: ProgressInfo,
    },
    AttentionCheck {
        probe: AttentionProbe,
        progress: ProgressInfo,
    },
    Finished { outcome: Outcome },
}

/// Records a transition produced for the response sink.
#[derive(Debug, Clone, PartialEq)]
pub enum StudyRecord {
    UnitSelected(PresentationUnit),
    Rating(ResponseRecord),
    AttentionCheck(AttentionRecord),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub progress: ParticipantProgress,
    pub step: Step,
    pub records: Vec<StudyRecord>,
}

/// Result of the startup precondition checks.
#[derive(Debug, Clone, PartialEq)]
pub enum Startup {
    Ready(ParticipantProgress),
    Rejected(Outcome),
}
