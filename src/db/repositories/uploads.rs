use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_optional_datetime},
    models::Upload,
};

fn row_to_upload(row: &Row) -> Result<Upload> {
    let created_at: String = row.get("created_at")?;
    let updated_at: Option<String> = row.get("updated_at")?;
    let completed: i64 = row.get("completed")?;

    Ok(Upload {
        id: row.get("id")?,
        participant_id: row.get("participant_id")?,
        tz_offset_hours: row.get("tz_offset_hours")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        completed: completed != 0,
        updated_at: parse_optional_datetime(updated_at, "updated_at")?,
    })
}

impl Database {
    pub async fn insert_upload(&self, upload: &Upload) -> Result<()> {
        let record = upload.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO uploads (id, participant_id, tz_offset_hours, created_at, completed, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.id,
                    record.participant_id,
                    record.tz_offset_hours,
                    record.created_at.to_rfc3339(),
                    record.completed as i64,
                    record.updated_at.map(|dt| dt.to_rfc3339()),
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_upload(&self, upload_id: &str) -> Result<Upload> {
        let upload_id = upload_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, participant_id, tz_offset_hours, created_at, completed, updated_at
                 FROM uploads
                 WHERE id = ?1",
            )?;

            let upload = stmt
                .query_row(params![upload_id], |row| Ok(row_to_upload(row)))
                .optional()?
                .ok_or_else(|| anyhow!("upload {upload_id} not found"))??;
            Ok(upload)
        })
        .await
    }

    pub async fn mark_upload_completed(
        &self,
        upload_id: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let upload_id = upload_id.to_string();
        self.execute(move |conn| {
            let changed = conn.execute(
                "UPDATE uploads
                 SET completed = 1,
                     updated_at = ?1
                 WHERE id = ?2",
                params![updated_at.to_rfc3339(), upload_id],
            )?;
            if changed == 0 {
                return Err(anyhow!("upload {upload_id} not found"));
            }
            Ok(())
        })
        .await
    }
}
