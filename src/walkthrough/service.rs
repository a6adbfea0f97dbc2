use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex},
};

use anyhow::{Context, Result};
use chrono::Utc;
use rand::{rngs::StdRng, SeedableRng};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{
    config::StudyConfig,
    db::{AttentionRecord, Database, SummaryEntry, Upload},
    history::{parse_takeout, IngestStats},
    metadata::MetadataLookup,
    models::Response,
    segmentation::segment_history,
};

use super::{
    controller::Walkthrough,
    state::{Outcome, ParticipantProgress, Startup, Step, Transition, WalkthroughPhase},
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Result of accepting a watch-history upload.
#[derive(Debug, Clone)]
pub struct Ingested {
    pub upload: Upload,
    pub stats: IngestStats,
    pub session_count: usize,
    /// Set when the history cannot support a walkthrough at all.
    pub rejection: Option<Outcome>,
}

/// Persistent front of the walkthrough.
///
/// Each call loads the upload's progress, applies exactly one controller
/// transition, then appends its records and stores the new progress in a
/// single database transaction. Calls for the same upload are serialised
/// by a per-upload lock; different uploads proceed independently.
pub struct StudyService<L> {
    db: Database,
    config: StudyConfig,
    lookup: L,
    /// Seeds one child RNG per transition. Held only while forking.
    rng: StdMutex<StdRng>,
    uploads: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<L: MetadataLookup> StudyService<L> {
    pub fn new(db: Database, config: StudyConfig, lookup: L) -> Result<Self> {
        Self::with_rng(db, config, lookup, StdRng::from_entropy())
    }

    /// Reproducible draws for the same seed and history.
    pub fn with_seed(db: Database, config: StudyConfig, lookup: L, seed: u64) -> Result<Self> {
        Self::with_rng(db, config, lookup, StdRng::seed_from_u64(seed))
    }

    fn with_rng(db: Database, config: StudyConfig, lookup: L, rng: StdRng) -> Result<Self> {
        config.validate().context("invalid study config")?;
        Ok(Self {
            db,
            config,
            lookup,
            rng: StdMutex::new(rng),
            uploads: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &StudyConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    async fn lock_upload(&self, upload_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut uploads = self.uploads.lock().await;
            uploads.retain(|_, lock| Arc::strong_count(lock) > 1);
            uploads.entry(upload_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    fn fork_rng(&self) -> Result<StdRng> {
        let mut master = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        StdRng::from_rng(&mut *master).context("failed to seed transition RNG")
    }

    /// Parses and segments a Takeout export, stores it under a fresh
    /// upload id and runs the startup checks.
    pub async fn ingest_upload(
        &self,
        participant_id: &str,
        history_json: &str,
        tz_offset_hours: Option<f64>,
    ) -> Result<Ingested> {
        let parsed = parse_takeout(history_json, tz_offset_hours)?;
        let segmentation = self.config.segmentation()?;
        let event_count = parsed.events.len();
        let sessions = segment_history(parsed.events, &segmentation);

        let upload = Upload {
            id: Uuid::new_v4().to_string(),
            participant_id: participant_id.to_string(),
            tz_offset_hours,
            created_at: Utc::now(),
            completed: false,
            updated_at: None,
        };
        self.db.insert_upload(&upload).await?;
        self.db
            .insert_sessions(&upload.id, &sessions)
            .await
            .with_context(|| format!("failed to store sessions for upload {}", upload.id))?;

        let session_count = sessions.len();
        let walkthrough = Walkthrough::new(self.config.clone(), sessions)?;
        let (progress, rejection) = match walkthrough.start() {
            Startup::Ready(progress) => (progress, None),
            Startup::Rejected(outcome) => {
                let mut progress = ParticipantProgress::new(Vec::new());
                progress.outcome = Some(outcome);
                progress.phase = WalkthroughPhase::Terminated;
                (progress, Some(outcome))
            }
        };
        self.db.save_progress(&upload.id, &progress, Utc::now()).await?;

        log_info!(
            "Upload {} for participant {}: {} events in {} sessions{}",
            upload.id,
            participant_id,
            event_count,
            session_count,
            rejection.map_or(String::new(), |outcome| format!(", rejected: {}", outcome.as_str()))
        );

        Ok(Ingested {
            upload,
            stats: parsed.stats,
            session_count,
            rejection,
        })
    }

    pub async fn progress(&self, upload_id: &str) -> Result<ParticipantProgress> {
        self.db
            .load_progress(upload_id)
            .await?
            .with_context(|| format!("no walkthrough stored for upload {upload_id}"))
    }

    pub async fn next_step(&self, upload_id: &str) -> Result<Step> {
        let _guard = self.lock_upload(upload_id).await;
        let mut rng = self.fork_rng()?;
        let (walkthrough, progress) = self.load(upload_id).await?;
        let transition = walkthrough
            .next_step(progress, &self.lookup, &mut rng)
            .await?;
        self.commit(upload_id, transition).await
    }

    pub async fn rate_video(&self, upload_id: &str, response: Response) -> Result<Step> {
        let _guard = self.lock_upload(upload_id).await;
        let mut rng = self.fork_rng()?;
        let (walkthrough, progress) = self.load(upload_id).await?;
        let transition = walkthrough
            .rate_video(progress, response, &self.lookup, &mut rng)
            .await?;
        self.commit(upload_id, transition).await
    }

    pub async fn answer_attention_check(&self, upload_id: &str, response: Response) -> Result<Step> {
        let _guard = self.lock_upload(upload_id).await;
        let mut rng = self.fork_rng()?;
        let (walkthrough, progress) = self.load(upload_id).await?;
        let transition = walkthrough
            .answer_attention_check(progress, response, &self.lookup, &mut rng)
            .await?;
        self.commit(upload_id, transition).await
    }

    /// Every recorded response in the order it was given. Reaching the
    /// summary marks the upload completed.
    pub async fn summary(&self, upload_id: &str) -> Result<Vec<SummaryEntry>> {
        let progress = self.progress(upload_id).await?;
        let entries = self.db.get_response_summary(upload_id).await?;
        if progress.outcome.is_some_and(|outcome| outcome.is_success()) {
            self.db.mark_upload_completed(upload_id, Utc::now()).await?;
        }
        Ok(entries)
    }

    pub async fn attention_checks(&self, upload_id: &str) -> Result<Vec<AttentionRecord>> {
        self.db.get_attention_checks(upload_id).await
    }

    /// Leaves the summary and ends the walkthrough.
    pub async fn finish(&self, upload_id: &str) -> Result<ParticipantProgress> {
        let _guard = self.lock_upload(upload_id).await;
        let (walkthrough, progress) = self.load(upload_id).await?;
        let progress = walkthrough.finish(progress)?;
        self.db.save_progress(upload_id, &progress, Utc::now()).await?;
        Ok(progress)
    }

    async fn load(&self, upload_id: &str) -> Result<(Walkthrough, ParticipantProgress)> {
        let progress = self.progress(upload_id).await?;
        let sessions = self.db.get_sessions(upload_id).await?;
        let walkthrough = Walkthrough::new(self.config.clone(), sessions)
            .with_context(|| format!("stored history for upload {upload_id} is unusable"))?;
        Ok((walkthrough, progress))
    }

    async fn commit(&self, upload_id: &str, transition: Transition) -> Result<Step> {
        let Transition {
            progress,
            step,
            records,
        } = transition;

        self.db
            .commit_transition(upload_id, &records, &progress, Utc::now())
            .await?;

        log_debug!(
            "Upload {}: {} records appended, phase {:?}",
            upload_id,
            records.len(),
            progress.phase
        );
        Ok(step)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::metadata::CatalogLookup;

    fn service(dir: &tempfile::TempDir) -> StudyService<CatalogLookup> {
        let db = Database::new(dir.path().join("study.db")).unwrap();
        StudyService::with_seed(db, StudyConfig::default(), CatalogLookup::default(), 4).unwrap()
    }

    #[tokio::test]
    async fn uploads_lock_independently() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(&dir);
        let wait = Duration::from_millis(50);

        let held = service.lock_upload("a").await;
        assert!(timeout(wait, service.lock_upload("b")).await.is_ok());
        assert!(timeout(wait, service.lock_upload("a")).await.is_err());

        drop(held);
        assert!(timeout(wait, service.lock_upload("a")).await.is_ok());
    }

    #[tokio::test]
    async fn idle_locks_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(&dir);
        for id in ["a", "b", "c"] {
            drop(service.lock_upload(id).await);
        }
        let _held = service.lock_upload("d").await;
        assert_eq!(service.uploads.lock().await.len(), 1);
    }

    #[test]
    fn forked_rngs_follow_the_seed() {
        use rand::Rng;

        let dir = tempfile::tempdir().unwrap();
        let (one, two) = (service(&dir), service(&dir));
        let draw = |s: &StudyService<CatalogLookup>| s.fork_rng().unwrap().gen::<u64>();
        assert_eq!(draw(&one), draw(&two));
        assert_ne!(draw(&one), draw(&one));
    }
}
