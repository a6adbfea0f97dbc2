use anyhow::Result;
use rusqlite::params;

use crate::{
    db::{
        connection::Database,
        helpers::{parse_datetime, to_u32},
    },
    models::{SessionId, VideoId, ViewSession, WatchEvent},
};

impl Database {
    /// Batch insert the segmented history of an upload.
    pub async fn insert_sessions(&self, upload_id: &str, sessions: &[ViewSession]) -> Result<()> {
        let upload_id = upload_id.to_string();
        let sessions = sessions.to_vec();
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            {
                let mut stmt = tx.prepare(
                    "INSERT INTO watch_events (upload_id, session_num, position, video_id, watched_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for session in &sessions {
                    for (position, event) in session.events.iter().enumerate() {
                        stmt.execute(params![
                            upload_id,
                            session.id.0,
                            position as i64,
                            event.video_id.as_str(),
                            event.watched_at.to_rfc3339(),
                        ])?;
                    }
                }
            }

            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Load the segmented history of an upload, sessions and events in order.
    pub async fn get_sessions(&self, upload_id: &str) -> Result<Vec<ViewSession>> {
        let upload_id = upload_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT session_num, video_id, watched_at
                 FROM watch_events
                 WHERE upload_id = ?1
                 ORDER BY session_num ASC, position ASC",
            )?;

            let mut rows = stmt.query(params![upload_id])?;
            let mut sessions: Vec<ViewSession> = Vec::new();
            while let Some(row) = rows.next()? {
                let session_id = SessionId(to_u32(row.get::<_, i64>(0)?, "session_num")?);
                let video_id = VideoId::parse(&row.get::<_, String>(1)?)?;
                let watched_at = parse_datetime(&row.get::<_, String>(2)?, "watched_at")?;
                let event = WatchEvent::new(watched_at, video_id);

                match sessions.last_mut() {
                    Some(session) if session.id == session_id => session.events.push(event),
                    _ => sessions.push(ViewSession {
                        id: session_id,
                        events: vec![event],
                    }),
                }
            }

            Ok(sessions)
        })
        .await
    }
}
