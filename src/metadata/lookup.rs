use std::{collections::HashMap, future::Future, path::Path, sync::Arc};

use anyhow::{Context, Result};

use crate::models::VideoId;

use super::types::VideoMetadata;

/// Source of video enrichment data.
///
/// `Ok(None)` means the source does not know the video. Callers treat
/// errors and `None` the same way: the video is dropped, nothing else is
/// affected.
pub trait MetadataLookup: Send + Sync {
    fn lookup(
        &self,
        video_id: &VideoId,
    ) -> impl Future<Output = Result<Option<VideoMetadata>>> + Send;
}

impl<T: MetadataLookup> MetadataLookup for Arc<T> {
    fn lookup(
        &self,
        video_id: &VideoId,
    ) -> impl Future<Output = Result<Option<VideoMetadata>>> + Send {
        T::lookup(self.as_ref(), video_id)
    }
}

/// Offline metadata source backed by a JSON array of [`VideoMetadata`].
#[derive(Debug, Clone, Default)]
pub struct CatalogLookup {
    videos: HashMap<VideoId, VideoMetadata>,
}

impl CatalogLookup {
    pub fn new(videos: impl IntoIterator<Item = VideoMetadata>) -> Self {
        Self {
            videos: videos
                .into_iter()
                .map(|meta| (meta.video_id.clone(), meta))
                .collect(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let videos: Vec<VideoMetadata> =
            serde_json::from_str(json).context("failed to parse video catalog")?;
        Ok(Self::new(videos))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read video catalog from {}", path.display()))?;
        Self::from_json_str(&contents)
    }

    pub fn len(&self) -> usize {
        self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }
}

impl MetadataLookup for CatalogLookup {
    async fn lookup(&self, video_id: &VideoId) -> Result<Option<VideoMetadata>> {
        Ok(self.videos.get(video_id).cloned())
    }
}
