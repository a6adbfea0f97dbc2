use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::{
    db::{
        connection::Database,
        helpers::{parse_optional_datetime, to_i64, to_u64},
    },
    metadata::VideoMetadata,
    models::VideoId,
};

fn optional_count(value: Option<i64>, field: &str) -> Result<Option<u64>> {
    value.map(|v| to_u64(v, field)).transpose()
}

fn row_to_video(row: &Row) -> Result<VideoMetadata> {
    let video_id: String = row.get("video_id")?;
    let publish_time: Option<String> = row.get("publish_time")?;

    Ok(VideoMetadata {
        video_id: VideoId::parse(&video_id)?,
        title: row.get("title")?,
        description: row.get("description")?,
        duration_secs: row.get("duration_secs")?,
        publish_time: parse_optional_datetime(publish_time, "publish_time")?,
        view_count: optional_count(row.get("view_count")?, "view_count")?,
        like_count: optional_count(row.get("like_count")?, "like_count")?,
        comment_count: optional_count(row.get("comment_count")?, "comment_count")?,
        favorite_count: optional_count(row.get("favorite_count")?, "favorite_count")?,
        category_id: row.get("category_id")?,
        thumbnail: row.get("thumbnail")?,
        channel_id: row.get("channel_id")?,
        channel_title: row.get("channel_title")?,
        channel_icon: row.get("channel_icon")?,
    })
}

impl Database {
    pub async fn get_video(&self, video_id: &VideoId) -> Result<Option<VideoMetadata>> {
        let video_id = video_id.as_str().to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT video_id, title, description, duration_secs, publish_time, view_count,
                        like_count, comment_count, favorite_count, category_id, thumbnail,
                        channel_id, channel_title, channel_icon
                 FROM videos
                 WHERE video_id = ?1",
            )?;

            let video = stmt
                .query_row(params![video_id], |row| Ok(row_to_video(row)))
                .optional()?;
            video.transpose()
        })
        .await
    }

    /// Insert or replace cached metadata for a video.
    pub async fn upsert_video(&self, video: &VideoMetadata, fetched_at: DateTime<Utc>) -> Result<()> {
        let record = video.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO videos (
                    video_id, title, description, duration_secs, publish_time, view_count,
                    like_count, comment_count, favorite_count, category_id, thumbnail,
                    channel_id, channel_title, channel_icon, fetched_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                 ON CONFLICT(video_id) DO UPDATE SET
                    title = excluded.title,
                    description = excluded.description,
                    duration_secs = excluded.duration_secs,
                    publish_time = excluded.publish_time,
                    view_count = excluded.view_count,
                    like_count = excluded.like_count,
                    comment_count = excluded.comment_count,
                    favorite_count = excluded.favorite_count,
                    category_id = excluded.category_id,
                    thumbnail = excluded.thumbnail,
                    channel_id = excluded.channel_id,
                    channel_title = excluded.channel_title,
                    channel_icon = excluded.channel_icon,
                    fetched_at = excluded.fetched_at",
                params![
                    record.video_id.as_str(),
                    record.title,
                    record.description,
                    record.duration_secs,
                    record.publish_time.map(|dt| dt.to_rfc3339()),
                    record.view_count.map(to_i64).transpose()?,
                    record.like_count.map(to_i64).transpose()?,
                    record.comment_count.map(to_i64).transpose()?,
                    record.favorite_count.map(to_i64).transpose()?,
                    record.category_id,
                    record.thumbnail,
                    record.channel_id,
                    record.channel_title,
                    record.channel_icon,
                    fetched_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }
}
