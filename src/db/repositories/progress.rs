use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::{db::connection::Database, walkthrough::ParticipantProgress};

use super::study_log::StudyLog;

impl Database {
    pub async fn save_progress(
        &self,
        upload_id: &str,
        progress: &ParticipantProgress,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let upload_id = upload_id.to_string();
        let progress = progress.clone();
        self.execute(move |conn| StudyLog::new(conn).save_progress(&upload_id, &progress, updated_at))
            .await
    }

    pub async fn load_progress(&self, upload_id: &str) -> Result<Option<ParticipantProgress>> {
        let upload_id = upload_id.to_string();
        self.execute(move |conn| {
            let state_json: Option<String> = conn
                .query_row(
                    "SELECT state_json FROM participant_progress WHERE upload_id = ?1",
                    params![upload_id],
                    |row| row.get(0),
                )
                .optional()?;

            state_json
                .map(|json| {
                    serde_json::from_str(&json).with_context(|| {
                        format!("failed to deserialize progress for upload {upload_id}")
                    })
                })
                .transpose()
        })
        .await
    }
}
