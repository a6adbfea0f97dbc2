use anyhow::Result;
use rusqlite::params;

use crate::{
    db::{
        connection::Database,
        helpers::{parse_datetime, to_u32},
        models::{AttentionRecord, SummaryEntry},
    },
    models::{AttentionSide, Response, VideoId},
};

impl Database {
    pub async fn get_attention_checks(&self, upload_id: &str) -> Result<Vec<AttentionRecord>> {
        let upload_id = upload_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT side, response, passed, rated_count, created_at
                 FROM attention_checks
                 WHERE upload_id = ?1
                 ORDER BY id ASC",
            )?;

            let mut rows = stmt.query(params![upload_id])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(AttentionRecord {
                    side: row.get::<_, String>(0)?.parse::<AttentionSide>()?,
                    response: row.get::<_, String>(1)?.parse::<Response>()?,
                    passed: row.get::<_, i64>(2)? != 0,
                    rated_count: to_u32(row.get::<_, i64>(3)?, "rated_count")?,
                    created_at: parse_datetime(&row.get::<_, String>(4)?, "created_at")?,
                });
            }

            Ok(records)
        })
        .await
    }

    /// Every recorded video response of an upload, oldest first, with the
    /// cached title when one is known.
    pub async fn get_response_summary(&self, upload_id: &str) -> Result<Vec<SummaryEntry>> {
        let upload_id = upload_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT r.video_id, v.title, r.response, r.created_at
                 FROM responses r
                 LEFT JOIN videos v ON v.video_id = r.video_id
                 WHERE r.upload_id = ?1
                 ORDER BY r.created_at ASC, r.id ASC",
            )?;

            let mut rows = stmt.query(params![upload_id])?;
            let mut entries = Vec::new();
            while let Some(row) = rows.next()? {
                entries.push(SummaryEntry {
                    video_id: VideoId::parse(&row.get::<_, String>(0)?)?,
                    title: row.get(1)?,
                    response: row.get::<_, String>(2)?.parse::<Response>()?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?, "created_at")?,
                });
            }

            Ok(entries)
        })
        .await
    }

    pub async fn count_selected_items(&self, upload_id: &str) -> Result<u64> {
        let upload_id = upload_id.to_string();
        self.execute(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM selected_items WHERE upload_id = ?1",
                params![upload_id],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }
}
