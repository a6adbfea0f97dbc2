use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock, time::Duration};

use crate::{
    models::{AttentionSide, Response},
    segmentation::{EligibilityRules, SegmentationConfig},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttentionProbeConfig {
    /// Image shown as the probe.
    pub stimulus: String,
    /// Fraction of `min_total_videos` at which the probe fires.
    pub relative_time: f64,
    /// The response that passes this probe.
    pub expected: Response,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttentionConfig {
    pub left: AttentionProbeConfig,
    pub right: AttentionProbeConfig,
}

impl AttentionConfig {
    pub fn probe(&self, side: AttentionSide) -> &AttentionProbeConfig {
        match side {
            AttentionSide::Left => &self.left,
            AttentionSide::Right => &self.right,
        }
    }
}

impl Default for AttentionConfig {
    fn default() -> Self {
        Self {
            left: AttentionProbeConfig {
                stimulus: "static/attention_left.png".into(),
                relative_time: 0.3,
                expected: Response::Regret,
            },
            right: AttentionProbeConfig {
                stimulus: "static/attention_right.png".into(),
                relative_time: 0.7,
                expected: Response::NoRegret,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudyConfig {
    pub session_gap_minutes: u32,
    pub min_num_sessions: usize,
    pub min_videos_per_session: usize,
    pub max_videos_per_session: usize,
    pub min_total_videos: u32,
    pub max_total_videos: u32,
    /// Sessions ending before this instant are never shown. `None` disables the cutoff.
    pub recency_cutoff: Option<DateTime<Utc>>,
    pub enrichment_timeout_ms: u64,
    pub attention: AttentionConfig,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            session_gap_minutes: 30,
            min_num_sessions: 4,
            min_videos_per_session: 3,
            max_videos_per_session: 10,
            min_total_videos: 40,
            max_total_videos: 60,
            recency_cutoff: None,
            enrichment_timeout_ms: 5_000,
            attention: AttentionConfig::default(),
        }
    }
}

impl StudyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.session_gap_minutes == 0 {
            bail!("sessionGapMinutes must be greater than zero");
        }
        if self.min_num_sessions == 0 {
            bail!("minNumSessions must be greater than zero");
        }
        if self.min_videos_per_session == 0 {
            bail!("minVideosPerSession must be greater than zero");
        }
        if self.min_videos_per_session > self.max_videos_per_session {
            bail!(
                "minVideosPerSession ({}) exceeds maxVideosPerSession ({})",
                self.min_videos_per_session,
                self.max_videos_per_session
            );
        }
        if self.min_total_videos == 0 {
            bail!("minTotalVideos must be greater than zero");
        }
        if self.min_total_videos > self.max_total_videos {
            bail!(
                "minTotalVideos ({}) exceeds maxTotalVideos ({})",
                self.min_total_videos,
                self.max_total_videos
            );
        }
        if self.enrichment_timeout_ms == 0 {
            bail!("enrichmentTimeoutMs must be greater than zero");
        }
        for side in [AttentionSide::Left, AttentionSide::Right] {
            let probe = self.attention.probe(side);
            if !(0.0..=1.0).contains(&probe.relative_time) {
                bail!(
                    "{} attention relativeTime {} is outside [0, 1]",
                    side.as_str(),
                    probe.relative_time
                );
            }
            if probe.stimulus.trim().is_empty() {
                bail!("{} attention stimulus is empty", side.as_str());
            }
        }
        if self.attention.left.relative_time > self.attention.right.relative_time {
            bail!("LEFT attention check must not come after the RIGHT one");
        }
        Ok(())
    }

    pub fn segmentation(&self) -> Result<SegmentationConfig> {
        SegmentationConfig::from_minutes(self.session_gap_minutes)
    }

    pub fn eligibility(&self) -> EligibilityRules {
        EligibilityRules {
            recency_cutoff: self.recency_cutoff,
            min_videos_per_session: self.min_videos_per_session,
        }
    }

    /// Rated-video count at which the given attention check fires, rounded down.
    pub fn attention_time(&self, side: AttentionSide) -> u32 {
        let fraction = self.attention.probe(side).relative_time;
        (fraction * f64::from(self.min_total_videos)).floor() as u32
    }

    pub fn enrichment_timeout(&self) -> Duration {
        Duration::from_millis(self.enrichment_timeout_ms)
    }
}

pub struct ConfigStore {
    path: PathBuf,
    data: RwLock<StudyConfig>,
}

impl ConfigStore {
    /// Loads the config at `path`, falling back to defaults when the file
    /// does not exist. A present but invalid file is an error.
    pub fn load(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            read_config(&path)?
        } else {
            StudyConfig::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn config(&self) -> StudyConfig {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update(&self, config: StudyConfig) -> Result<()> {
        config.validate()?;
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.persist(&config)?;
        *guard = config;
        Ok(())
    }

    pub fn reload(&self) -> Result<()> {
        let data = read_config(&self.path)?;
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = data;
        Ok(())
    }

    fn persist(&self, data: &StudyConfig) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write config to {}", self.path.display()))
    }
}

fn read_config(path: &std::path::Path) -> Result<StudyConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: StudyConfig = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse config at {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config at {}", path.display()))?;
    Ok(config)
}
