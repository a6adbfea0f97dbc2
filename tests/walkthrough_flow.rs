use std::collections::HashSet;

use chrono::{Duration, TimeZone, Utc};
use regretwalk_lib::{
    metadata::{CachedLookup, CatalogLookup, MetadataLookup, VideoMetadata},
    models::{Response, VideoId},
    walkthrough::{Outcome, Step, StudyService, WalkthroughPhase},
    Database, StudyConfig,
};
use serde_json::json;
use tempfile::TempDir;

fn video_id(session: usize, position: usize) -> String {
    format!("v{session:04}x{position:05}")
}

/// Takeout export, newest first, with one ad and one non-watch record mixed in.
fn takeout(sessions: usize, per_session: usize) -> String {
    let base = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    let mut records = Vec::new();
    for s in 0..sessions {
        for p in 0..per_session {
            let at = base + Duration::hours(3 * s as i64) + Duration::minutes(2 * p as i64);
            records.push(json!({
                "header": "YouTube",
                "title": format!("Watched video {s}/{p}"),
                "titleUrl": format!("https://www.youtube.com/watch?v={}", video_id(s, p)),
                "time": at.to_rfc3339(),
            }));
        }
    }
    records.push(json!({
        "header": "YouTube",
        "title": "Watched an ad",
        "titleUrl": "https://www.youtube.com/watch?v=AAAAAAAAAAA",
        "time": base.to_rfc3339(),
        "details": [{"name": "From Google Ads"}],
    }));
    records.push(json!({
        "header": "YouTube",
        "title": "Visited YouTube Music",
        "time": base.to_rfc3339(),
    }));
    records.reverse();
    serde_json::to_string(&records).unwrap()
}

fn catalog(sessions: usize, per_session: usize, missing: &[String]) -> CatalogLookup {
    let videos = (0..sessions)
        .flat_map(|s| (0..per_session).map(move |p| video_id(s, p)))
        .filter(|id| !missing.contains(id))
        .map(|id| {
            let title = format!("Title of {id}");
            VideoMetadata::new(VideoId::parse(&id).unwrap(), title)
        });
    CatalogLookup::new(videos)
}

fn study_config() -> StudyConfig {
    StudyConfig {
        min_num_sessions: 4,
        min_videos_per_session: 3,
        max_videos_per_session: 5,
        min_total_videos: 20,
        max_total_videos: 25,
        enrichment_timeout_ms: 1_000,
        ..StudyConfig::default()
    }
}

fn open_db(dir: &TempDir) -> Database {
    Database::new(dir.path().join("study.db")).unwrap()
}

/// Passes every attention check and rates every video `rating`.
async fn drive<L: MetadataLookup>(
    service: &StudyService<L>,
    upload_id: &str,
    rating: Response,
    mut budget: usize,
) -> (Step, usize) {
    let mut rated = 0;
    let mut step = service.next_step(upload_id).await.unwrap();
    while budget > 0 {
        step = match step {
            Step::Session { .. } => service.next_step(upload_id).await.unwrap(),
            Step::Video { .. } => {
                rated += 1;
                budget -= 1;
                service.rate_video(upload_id, rating).await.unwrap()
            }
            Step::AttentionCheck { probe, .. } => {
                let answer = service.config().attention.probe(probe.side).expected;
                service
                    .answer_attention_check(upload_id, answer)
                    .await
                    .unwrap()
            }
            finished @ Step::Finished { .. } => return (finished, rated),
        };
    }
    (step, rated)
}

#[tokio::test]
async fn full_walkthrough_is_persisted_and_summarised() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let missing = vec![video_id(2, 1)];
    let lookup = CachedLookup::new(db.clone(), catalog(6, 5, &missing));
    let service = StudyService::with_seed(db.clone(), study_config(), lookup, 17).unwrap();

    let ingested = service
        .ingest_upload("participant-1", &takeout(6, 5), Some(0.0))
        .await
        .unwrap();
    assert_eq!(ingested.rejection, None);
    assert_eq!(ingested.session_count, 6);
    assert_eq!(ingested.stats.total_records, 32);
    assert_eq!(ingested.stats.dropped_ads, 1);
    assert_eq!(ingested.stats.dropped_not_watch, 1);
    let upload_id = ingested.upload.id.clone();

    let (step, rated) = drive(&service, &upload_id, Response::NoRegret, usize::MAX).await;
    assert_eq!(
        step,
        Step::Finished {
            outcome: Outcome::Complete
        }
    );
    assert_eq!(rated, 25);

    let progress = service.progress(&upload_id).await.unwrap();
    assert_eq!(progress.rated_count, 25);
    assert_eq!(progress.phase, WalkthroughPhase::Summary);
    let drawn: HashSet<_> = progress.drawn_sessions.iter().collect();
    assert_eq!(drawn.len(), progress.drawn_sessions.len());

    let checks = service.attention_checks(&upload_id).await.unwrap();
    assert_eq!(checks.len(), 2);
    assert!(checks.iter().all(|check| check.passed));
    assert_eq!(
        checks.iter().map(|c| c.rated_count).collect::<Vec<_>>(),
        vec![6, 14]
    );

    let summary = service.summary(&upload_id).await.unwrap();
    assert_eq!(summary.len(), 25);
    assert!(summary.iter().all(|entry| entry.response == Response::NoRegret));
    assert!(summary.iter().all(|entry| entry.title.is_some()));
    assert!(summary
        .iter()
        .all(|entry| entry.video_id.as_str() != missing[0]));

    let done = service.finish(&upload_id).await.unwrap();
    assert_eq!(done.phase, WalkthroughPhase::Terminated);
    let upload = db.get_upload(&upload_id).await.unwrap();
    assert!(upload.completed);
    assert_eq!(upload.participant_id, "participant-1");
}

#[tokio::test]
async fn progress_survives_a_restart() {
    let dir = TempDir::new().unwrap();
    let upload_id;
    let paused;
    {
        let db = open_db(&dir);
        let service =
            StudyService::with_seed(db, study_config(), catalog(6, 5, &[]), 5).unwrap();
        upload_id = service
            .ingest_upload("participant-2", &takeout(6, 5), None)
            .await
            .unwrap()
            .upload
            .id;
        let (step, rated) = drive(&service, &upload_id, Response::Regret, 3).await;
        assert_eq!(rated, 3);
        paused = step;
    }

    let db = open_db(&dir);
    let service = StudyService::with_seed(db, study_config(), catalog(6, 5, &[]), 99).unwrap();
    let resumed = service.next_step(&upload_id).await.unwrap();
    assert_eq!(resumed, paused);

    let progress = service.progress(&upload_id).await.unwrap();
    assert_eq!(progress.rated_count, 3);
    assert_eq!(progress.units_presented, 1);
}

#[tokio::test]
async fn thin_history_is_rejected_at_upload() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let service = StudyService::with_seed(db, study_config(), catalog(2, 5, &[]), 1).unwrap();

    let ingested = service
        .ingest_upload("participant-3", &takeout(2, 5), None)
        .await
        .unwrap();
    assert_eq!(ingested.rejection, Some(Outcome::InsufficientSessions));

    let upload_id = ingested.upload.id;
    assert_eq!(
        service.next_step(&upload_id).await.unwrap(),
        Step::Finished {
            outcome: Outcome::InsufficientSessions
        }
    );
    assert!(service
        .rate_video(&upload_id, Response::Regret)
        .await
        .is_err());
    assert!(service.summary(&upload_id).await.unwrap().is_empty());
    assert!(service.finish(&upload_id).await.is_ok());
}

#[tokio::test]
async fn out_of_phase_answers_leave_no_trace() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let service =
        StudyService::with_seed(db.clone(), study_config(), catalog(6, 5, &[]), 3).unwrap();
    let upload_id = service
        .ingest_upload("participant-4", &takeout(6, 5), None)
        .await
        .unwrap()
        .upload
        .id;

    let overview = service.next_step(&upload_id).await.unwrap();
    assert!(matches!(overview, Step::Session { .. }));
    assert!(service
        .answer_attention_check(&upload_id, Response::Regret)
        .await
        .is_err());
    assert!(service.summary(&upload_id).await.unwrap().is_empty());
    assert_eq!(db.count_selected_items(&upload_id).await.unwrap(), 5);
}

async fn responses_for(db: &Database, upload_id: &str) -> i64 {
    let upload_id = upload_id.to_string();
    db.execute(move |conn| {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM responses WHERE upload_id = ?1",
            [upload_id],
            |row| row.get(0),
        )?)
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn failed_progress_write_rolls_back_the_response() {
    let dir = TempDir::new().unwrap();
    let service =
        StudyService::with_seed(open_db(&dir), study_config(), catalog(6, 5, &[]), 8).unwrap();
    let upload_id = service
        .ingest_upload("participant-5", &takeout(6, 5), None)
        .await
        .unwrap()
        .upload
        .id;
    service.next_step(&upload_id).await.unwrap();
    let video = service.next_step(&upload_id).await.unwrap();
    assert!(matches!(video, Step::Video { index: 0, .. }));

    let db = service.database().clone();
    db.execute(|conn| {
        conn.execute_batch(
            "CREATE TRIGGER progress_write_fails BEFORE UPDATE ON participant_progress
             BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
        )?;
        Ok(())
    })
    .await
    .unwrap();

    assert!(service.rate_video(&upload_id, Response::Regret).await.is_err());
    assert_eq!(responses_for(&db, &upload_id).await, 0);
    assert_eq!(service.progress(&upload_id).await.unwrap().rated_count, 0);

    db.execute(|conn| {
        conn.execute_batch("DROP TRIGGER progress_write_fails;")?;
        Ok(())
    })
    .await
    .unwrap();

    // the retry rates the same video exactly once
    assert_eq!(service.next_step(&upload_id).await.unwrap(), video);
    service
        .rate_video(&upload_id, Response::NoRegret)
        .await
        .unwrap();
    assert_eq!(responses_for(&db, &upload_id).await, 1);
    assert_eq!(service.progress(&upload_id).await.unwrap().rated_count, 1);
    let summary = service.summary(&upload_id).await.unwrap();
    assert_eq!(summary[0].response, Response::NoRegret);
}

#[tokio::test]
async fn participants_do_not_wait_on_each_other() {
    let dir = TempDir::new().unwrap();
    let service =
        StudyService::with_seed(open_db(&dir), study_config(), catalog(6, 5, &[]), 21).unwrap();
    let first = service
        .ingest_upload("participant-6", &takeout(6, 5), None)
        .await
        .unwrap()
        .upload
        .id;
    let second = service
        .ingest_upload("participant-7", &takeout(6, 5), None)
        .await
        .unwrap()
        .upload
        .id;

    let (a, b) = tokio::join!(service.next_step(&first), service.next_step(&second));
    assert!(matches!(a.unwrap(), Step::Session { .. }));
    assert!(matches!(b.unwrap(), Step::Session { .. }));
    assert_eq!(service.progress(&first).await.unwrap().units_presented, 1);
    assert_eq!(service.progress(&second).await.unwrap().units_presented, 1);
}
