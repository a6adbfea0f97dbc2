use anyhow::Result;
use chrono::Utc;

use crate::{db::Database, models::VideoId};

use super::{lookup::MetadataLookup, types::VideoMetadata};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Read-through cache over the `videos` table.
///
/// Hits never reach the inner source. Misses that the source answers are
/// stored before being returned; a failed store is logged and the
/// metadata is still returned.
pub struct CachedLookup<S> {
    db: Database,
    source: S,
}

impl<S: MetadataLookup> CachedLookup<S> {
    pub fn new(db: Database, source: S) -> Self {
        Self { db, source }
    }
}

impl<S: MetadataLookup> MetadataLookup for CachedLookup<S> {
    async fn lookup(&self, video_id: &VideoId) -> Result<Option<VideoMetadata>> {
        if let Some(cached) = self.db.get_video(video_id).await? {
            log_debug!("Video {} served from cache", video_id);
            return Ok(Some(cached));
        }

        let Some(fetched) = self.source.lookup(video_id).await? else {
            return Ok(None);
        };
        let fetched = fetched.with_clipped_description();

        if let Err(err) = self.db.upsert_video(&fetched, Utc::now()).await {
            log_warn!("Failed to cache metadata for video {}: {err:?}", video_id);
        } else {
            log_debug!("Video {} fetched and cached", video_id);
        }

        Ok(Some(fetched))
    }
}
