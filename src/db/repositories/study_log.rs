use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::{
    db::{
        connection::Database,
        models::{AttentionRecord, ResponseRecord},
    },
    walkthrough::{ParticipantProgress, PresentationUnit, StudyRecord},
};

/// Append-side writes of a walkthrough, usable inside a caller's transaction.
pub struct StudyLog<'a> {
    conn: &'a Connection,
}

impl<'a> StudyLog<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn append(&self, upload_id: &str, record: &StudyRecord) -> Result<()> {
        match record {
            StudyRecord::UnitSelected(unit) => self.insert_selected_unit(upload_id, unit),
            StudyRecord::Rating(rating) => self.insert_response(upload_id, rating),
            StudyRecord::AttentionCheck(check) => self.insert_attention_check(upload_id, check),
        }
    }

    pub fn insert_selected_unit(&self, upload_id: &str, unit: &PresentationUnit) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO selected_items (upload_id, unit_position, session_num, position)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for item in &unit.items {
            stmt.execute(params![
                upload_id,
                unit.position,
                item.event_ref.session_id.0,
                item.event_ref.position,
            ])?;
        }
        Ok(())
    }

    pub fn insert_response(&self, upload_id: &str, record: &ResponseRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO responses (upload_id, session_num, position, video_id, response, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                upload_id,
                record.event_ref.session_id.0,
                record.event_ref.position,
                record.video_id.as_str(),
                record.response.as_str(),
                record.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn insert_attention_check(&self, upload_id: &str, record: &AttentionRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO attention_checks (upload_id, side, response, passed, rated_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                upload_id,
                record.side.as_str(),
                record.response.as_str(),
                record.passed as i64,
                record.rated_count,
                record.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn save_progress(
        &self,
        upload_id: &str,
        progress: &ParticipantProgress,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let state_json =
            serde_json::to_string(progress).context("failed to serialize participant progress")?;
        self.conn.execute(
            "INSERT INTO participant_progress (upload_id, state_json, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(upload_id) DO UPDATE SET
                state_json = excluded.state_json,
                updated_at = excluded.updated_at",
            params![upload_id, state_json, updated_at.to_rfc3339()],
        )?;
        Ok(())
    }
}

impl Database {
    /// Appends every record of one transition and stores the progress it
    /// produced. Either all of it lands or none of it does.
    pub async fn commit_transition(
        &self,
        upload_id: &str,
        records: &[StudyRecord],
        progress: &ParticipantProgress,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let upload_id = upload_id.to_string();
        let records = records.to_vec();
        let progress = progress.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            {
                let log = StudyLog::new(&tx);
                for record in &records {
                    log.append(&upload_id, record)?;
                }
                log.save_progress(&upload_id, &progress, updated_at)?;
            }
            tx.commit()
                .with_context(|| format!("failed to commit transition for upload {upload_id}"))?;
            Ok(())
        })
        .await
    }
}
