use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use rand::Rng;
use tokio::time;

use crate::{
    config::StudyConfig,
    db::models::{AttentionRecord, ResponseRecord},
    metadata::MetadataLookup,
    models::{AttentionSide, Response, SessionId, ViewSession},
    segmentation::{filter_eligible, projected_total},
};

use super::state::{
    AttentionProbe, Outcome, ParticipantProgress, PresentationUnit, ProgressInfo, Startup, Step,
    StudyRecord, Transition, UnitItem, WalkthroughPhase,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Drives one participant through their sampled sessions.
///
/// The controller holds only immutable inputs (config and segmented
/// history). Every operation takes the participant's progress by value and
/// hands back the next progress, the step to show, and the records to
/// append, so callers can persist progress between requests.
pub struct Walkthrough {
    config: StudyConfig,
    sessions: Vec<ViewSession>,
    left_time: u32,
    right_time: u32,
}

impl Walkthrough {
    /// `sessions` must be segmenter output: ids equal to their index,
    /// non-empty, chronological.
    pub fn new(config: StudyConfig, sessions: Vec<ViewSession>) -> Result<Self> {
        config.validate().context("invalid study config")?;
        check_sessions(&sessions)?;

        let left_time = config.attention_time(AttentionSide::Left);
        let right_time = config.attention_time(AttentionSide::Right);

        Ok(Self {
            config,
            sessions,
            left_time,
            right_time,
        })
    }

    pub fn config(&self) -> &StudyConfig {
        &self.config
    }

    pub fn sessions(&self) -> &[ViewSession] {
        &self.sessions
    }

    pub fn attention_thresholds(&self) -> (u32, u32) {
        (self.left_time, self.right_time)
    }

    pub fn eligible_sessions(&self) -> Vec<SessionId> {
        filter_eligible(&self.sessions, &self.config.eligibility())
    }

    /// Startup precondition checks. Nothing is drawn here.
    pub fn start(&self) -> Startup {
        let eligible = self.eligible_sessions();

        if eligible.is_empty() {
            log_info!("No eligible sessions among {}", self.sessions.len());
            return Startup::Rejected(Outcome::InsufficientData);
        }
        if eligible.len() < self.config.min_num_sessions {
            log_info!(
                "Only {} eligible sessions, need {}",
                eligible.len(),
                self.config.min_num_sessions
            );
            return Startup::Rejected(Outcome::InsufficientSessions);
        }

        let projected = projected_total(
            &self.sessions,
            &eligible,
            self.config.max_videos_per_session,
        );
        if projected < self.config.min_total_videos as usize {
            log_info!(
                "Only {} videos projected, need {}",
                projected,
                self.config.min_total_videos
            );
            return Startup::Rejected(Outcome::InsufficientVideos);
        }

        log_info!(
            "Walkthrough ready: {} eligible sessions, {} projected videos",
            eligible.len(),
            projected
        );
        Startup::Ready(ParticipantProgress::new(eligible))
    }

    /// What to show now. Repeating the call without answering shows the
    /// same video or probe again.
    pub async fn next_step<L, R>(
        &self,
        progress: ParticipantProgress,
        lookup: &L,
        rng: &mut R,
    ) -> Result<Transition>
    where
        L: MetadataLookup,
        R: Rng + ?Sized,
    {
        Ok(self.advance(progress, Vec::new(), lookup, rng).await)
    }

    /// Records a response to the current video and moves on.
    pub async fn rate_video<L, R>(
        &self,
        mut progress: ParticipantProgress,
        response: Response,
        lookup: &L,
        rng: &mut R,
    ) -> Result<Transition>
    where
        L: MetadataLookup,
        R: Rng + ?Sized,
    {
        if progress.phase != WalkthroughPhase::RatingVideo {
            bail!("no video is awaiting a response (phase {:?})", progress.phase);
        }
        let item = progress
            .current_item()
            .cloned()
            .context("rating phase without a current video")?;

        let records = vec![StudyRecord::Rating(ResponseRecord {
            event_ref: item.event_ref,
            video_id: item.event.video_id.clone(),
            response,
            created_at: Utc::now(),
        })];

        if response.counts_as_rating() {
            progress.rated_count += 1;
        }
        log_debug!(
            "Recorded {} for video {} ({} rated)",
            response.as_str(),
            item.event.video_id,
            progress.rated_count
        );

        progress.current_video_index += 1;
        let unit_done = progress
            .current_unit
            .as_ref()
            .map_or(true, |unit| progress.current_video_index >= unit.len());
        if unit_done {
            progress.current_unit = None;
            progress.current_video_index = 0;
        }

        Ok(self.advance(progress, records, lookup, rng).await)
    }

    /// Scores the pending attention check and moves on.
    pub async fn answer_attention_check<L, R>(
        &self,
        mut progress: ParticipantProgress,
        response: Response,
        lookup: &L,
        rng: &mut R,
    ) -> Result<Transition>
    where
        L: MetadataLookup,
        R: Rng + ?Sized,
    {
        if progress.phase != WalkthroughPhase::AttentionCheck {
            bail!("no attention check is pending (phase {:?})", progress.phase);
        }
        let side = self
            .pending_attention(&progress)
            .context("attention phase without a due check")?;

        let passed = self.attention_passed(side, response);
        log_info!(
            "{} attention check at {} rated: {}",
            side.as_str(),
            progress.rated_count,
            if passed { "passed" } else { "failed" }
        );

        let records = vec![StudyRecord::AttentionCheck(AttentionRecord {
            side,
            response,
            passed,
            rated_count: progress.rated_count,
            created_at: Utc::now(),
        })];
        progress.attention_checks_completed += 1;

        Ok(self.advance(progress, records, lookup, rng).await)
    }

    /// Leaves the summary. Runs that never reached the summary cannot be finished.
    pub fn finish(&self, mut progress: ParticipantProgress) -> Result<ParticipantProgress> {
        match progress.phase {
            WalkthroughPhase::Summary => {
                progress.phase = WalkthroughPhase::Terminated;
                Ok(progress)
            }
            WalkthroughPhase::Terminated => Ok(progress),
            phase => bail!("cannot finish a walkthrough in phase {phase:?}"),
        }
    }

    /// Scores a probe response against the configured truth table.
    pub fn attention_passed(&self, side: AttentionSide, response: Response) -> bool {
        self.config.attention.probe(side).expected == response
    }

    /// The attention check that must be shown before anything else, if any.
    pub fn pending_attention(&self, progress: &ParticipantProgress) -> Option<AttentionSide> {
        match progress.attention_checks_completed {
            0 if progress.rated_count == self.left_time => Some(AttentionSide::Left),
            1 if progress.rated_count == self.right_time => Some(AttentionSide::Right),
            _ => None,
        }
    }

    async fn advance<L, R>(
        &self,
        mut progress: ParticipantProgress,
        mut records: Vec<StudyRecord>,
        lookup: &L,
        rng: &mut R,
    ) -> Transition
    where
        L: MetadataLookup,
        R: Rng + ?Sized,
    {
        if let Some(outcome) = progress.outcome {
            return Transition {
                progress,
                step: Step::Finished { outcome },
                records,
            };
        }

        if progress.rated_count >= self.config.max_total_videos {
            return self.conclude(progress, Outcome::Complete, records);
        }

        if let Some(side) = self.pending_attention(&progress) {
            progress.phase = WalkthroughPhase::AttentionCheck;
            let probe = AttentionProbe {
                side,
                stimulus: self.config.attention.probe(side).stimulus.clone(),
            };
            let info = self.progress_info(&progress);
            return Transition {
                progress,
                step: Step::AttentionCheck {
                    probe,
                    progress: info,
                },
                records,
            };
        }

        let current = progress
            .current_unit
            .as_ref()
            .zip(progress.current_item())
            .map(|(unit, item)| (unit.position, item.clone()));
        if let Some((unit_position, item)) = current {
            let step = Step::Video {
                unit_position,
                index: progress.current_video_index,
                item,
                progress: self.progress_info(&progress),
            };
            progress.phase = WalkthroughPhase::RatingVideo;
            return Transition {
                progress,
                step,
                records,
            };
        }

        progress.current_unit = None;
        progress.current_video_index = 0;

        match self.draw_next_unit(&mut progress, lookup, rng).await {
            Some(unit) => {
                progress.phase = WalkthroughPhase::PresentingSession;
                progress.current_unit = Some(unit.clone());
                records.push(StudyRecord::UnitSelected(unit.clone()));
                Transition {
                    progress,
                    step: Step::Session { unit },
                    records,
                }
            }
            None => {
                progress.phase = WalkthroughPhase::SessionExhausted;
                let outcome = if progress.rated_count < self.config.min_total_videos {
                    Outcome::InsufficientData
                } else {
                    Outcome::PartialSuccess
                };
                self.conclude(progress, outcome, records)
            }
        }
    }

    fn conclude(
        &self,
        mut progress: ParticipantProgress,
        outcome: Outcome,
        records: Vec<StudyRecord>,
    ) -> Transition {
        log_info!(
            "Walkthrough finished with {} after {} rated videos",
            outcome.as_str(),
            progress.rated_count
        );
        progress.outcome = Some(outcome);
        progress.current_unit = None;
        progress.current_video_index = 0;
        progress.phase = if outcome.is_success() {
            WalkthroughPhase::Summary
        } else {
            WalkthroughPhase::Terminated
        };
        Transition {
            progress,
            step: Step::Finished { outcome },
            records,
        }
    }

    /// Draws sessions without replacement until one yields a usable unit.
    ///
    /// Each drawn session is consumed whether or not it fills a unit, so the
    /// loop ends at the latest when the remaining set is empty.
    async fn draw_next_unit<L, R>(
        &self,
        progress: &mut ParticipantProgress,
        lookup: &L,
        rng: &mut R,
    ) -> Option<PresentationUnit>
    where
        L: MetadataLookup,
        R: Rng + ?Sized,
    {
        while !progress.remaining_sessions.is_empty() {
            let pick = rng.gen_range(0..progress.remaining_sessions.len());
            let session_id = progress.remaining_sessions.remove(pick);
            progress.drawn_sessions.push(session_id);

            let Some(session) = self.sessions.get(session_id.0 as usize) else {
                log_warn!("Drawn session {} is not part of this history", session_id);
                continue;
            };

            let items = self.enrich_session(session, lookup).await;
            if items.len() < self.config.min_videos_per_session {
                log_info!(
                    "Discarding session {}: {} of {} videos enriched, need {}",
                    session_id,
                    items.len(),
                    session.len(),
                    self.config.min_videos_per_session
                );
                continue;
            }

            let Some(unit) = PresentationUnit::build(session, progress.units_presented + 1, items)
            else {
                continue;
            };
            progress.units_presented += 1;
            log_info!(
                "Presenting session {} as unit {} with {} videos",
                session_id,
                unit.position,
                unit.len()
            );
            return Some(unit);
        }

        None
    }

    /// Enriches events in order, dropping failures, until the unit is full.
    async fn enrich_session<L: MetadataLookup>(
        &self,
        session: &ViewSession,
        lookup: &L,
    ) -> Vec<UnitItem> {
        let limit = self.config.max_videos_per_session;
        let timeout: Duration = self.config.enrichment_timeout();
        let mut items = Vec::with_capacity(limit.min(session.len()));

        for (position, event) in session.events.iter().enumerate() {
            if items.len() >= limit {
                break;
            }

            match time::timeout(timeout, lookup.lookup(&event.video_id)).await {
                Ok(Ok(Some(metadata))) => items.push(UnitItem {
                    event_ref: session.event_ref(position),
                    event: event.clone(),
                    metadata,
                }),
                Ok(Ok(None)) => log_warn!("Video {} not found, dropping it", event.video_id),
                Ok(Err(err)) => {
                    log_warn!("Metadata lookup failed for {}: {err:?}", event.video_id)
                }
                Err(_) => log_warn!(
                    "Metadata lookup for {} timed out (> {}ms)",
                    event.video_id,
                    timeout.as_millis()
                ),
            }
        }

        items
    }

    fn progress_info(&self, progress: &ParticipantProgress) -> ProgressInfo {
        ProgressInfo::new(progress.rated_count, self.config.min_total_videos)
    }
}

fn check_sessions(sessions: &[ViewSession]) -> Result<()> {
    let mut previous_end = None;
    for (index, session) in sessions.iter().enumerate() {
        if session.id.0 as usize != index {
            bail!("session at index {index} has id {}", session.id);
        }
        if session.is_empty() {
            bail!("session {} is empty", session.id);
        }
        if session
            .events
            .windows(2)
            .any(|pair| pair[1].watched_at < pair[0].watched_at)
        {
            bail!("session {} is not in chronological order", session.id);
        }
        if let (Some(prev), Some(start)) = (previous_end, session.start_time()) {
            if start < prev {
                bail!("session {} starts before the previous session ends", session.id);
            }
        }
        previous_end = session.end_time();
    }
    Ok(())
}
