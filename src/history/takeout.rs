//! Google Takeout watch-history parsing.
//!
//! The export is a JSON array of activity records. Only plain video
//! watches survive: ads (records with `details`), non-watch URLs and
//! malformed ids are dropped and counted.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::models::{VideoId, WatchEvent};

const ENABLE_LOGS: bool = true;

use crate::log_info;

const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

/// Widest real-world UTC offset, either side.
const MAX_TZ_OFFSET_HOURS: f64 = 14.0;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TakeoutRecord {
    time: DateTime<Utc>,
    title_url: Option<String>,
    #[serde(default)]
    details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub total_records: usize,
    pub dropped_not_watch: usize,
    pub dropped_ads: usize,
    pub dropped_bad_id: usize,
}

#[derive(Debug, Clone)]
pub struct ParsedHistory {
    pub events: Vec<WatchEvent>,
    pub stats: IngestStats,
}

/// Extracts the `v` query value of a watch URL.
pub fn parse_watch_url(url: &str) -> Option<&str> {
    let rest = url.strip_prefix(WATCH_URL_PREFIX)?;
    let id = rest.split('&').next().unwrap_or(rest);
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

fn offset_from_hours(hours: f64) -> Result<Duration> {
    if !hours.is_finite() || hours.abs() > MAX_TZ_OFFSET_HOURS {
        bail!("timezone offset {hours}h is outside ±{MAX_TZ_OFFSET_HOURS}h");
    }
    Ok(Duration::seconds((hours * 3600.0).round() as i64))
}

/// Parses a Takeout export. `tz_offset_hours` shifts every timestamp; zero
/// is a real offset and is applied like any other.
pub fn parse_takeout(json: &str, tz_offset_hours: Option<f64>) -> Result<ParsedHistory> {
    let records: Vec<TakeoutRecord> =
        serde_json::from_str(json).context("failed to parse watch history JSON")?;

    let offset = tz_offset_hours.map(offset_from_hours).transpose()?;

    let mut stats = IngestStats {
        total_records: records.len(),
        ..IngestStats::default()
    };
    let mut events = Vec::with_capacity(records.len());

    for record in records {
        let Some(raw_id) = record.title_url.as_deref().and_then(parse_watch_url) else {
            stats.dropped_not_watch += 1;
            continue;
        };
        if record.details.is_some() {
            stats.dropped_ads += 1;
            continue;
        }
        let Ok(video_id) = VideoId::parse(raw_id) else {
            stats.dropped_bad_id += 1;
            continue;
        };

        let watched_at = match offset {
            Some(delta) => record.time.checked_add_signed(delta).with_context(|| {
                format!("watch time {} cannot be shifted by {delta}", record.time)
            })?,
            None => record.time,
        };
        events.push(WatchEvent::new(watched_at, video_id));
    }

    log_info!(
        "Parsed {} watch events from {} records ({} non-watch, {} ads, {} bad ids)",
        events.len(),
        stats.total_records,
        stats.dropped_not_watch,
        stats.dropped_ads,
        stats.dropped_bad_id
    );

    Ok(ParsedHistory { events, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE: &str = r#"[
        {"header": "YouTube", "title": "Watched a video",
         "titleUrl": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
         "time": "2024-02-10T20:15:00.123Z"},
        {"header": "YouTube", "title": "Watched an ad",
         "titleUrl": "https://www.youtube.com/watch?v=AAAAAAAAAAA",
         "time": "2024-02-10T20:14:00Z",
         "details": [{"name": "From Google Ads"}]},
        {"header": "YouTube", "title": "Visited a channel",
         "titleUrl": "https://www.youtube.com/channel/UC123",
         "time": "2024-02-10T20:13:00Z"},
        {"header": "YouTube", "title": "Removed video",
         "time": "2024-02-10T20:12:00Z"},
        {"header": "YouTube", "title": "Broken id",
         "titleUrl": "https://www.youtube.com/watch?v=abc",
         "time": "2024-02-10T20:11:00Z"},
        {"header": "YouTube", "title": "With timestamp",
         "titleUrl": "https://www.youtube.com/watch?v=9bZkp7q19f0&t=42s",
         "time": "2024-02-10T19:00:00Z"}
    ]"#;

    #[test]
    fn extracts_watch_ids() {
        assert_eq!(
            parse_watch_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(parse_watch_url("https://www.youtube.com/watch?v="), None);
        assert_eq!(parse_watch_url("https://music.youtube.com/watch?v=x"), None);
    }

    #[test]
    fn keeps_only_valid_watches() {
        let parsed = parse_takeout(SAMPLE, None).unwrap();
        let ids: Vec<&str> = parsed.events.iter().map(|e| e.video_id.as_str()).collect();
        assert_eq!(ids, vec!["dQw4w9WgXcQ", "9bZkp7q19f0"]);
        assert_eq!(
            parsed.stats,
            IngestStats {
                total_records: 6,
                dropped_not_watch: 2,
                dropped_ads: 1,
                dropped_bad_id: 1,
            }
        );
    }

    #[test]
    fn applies_timezone_offset() {
        let parsed = parse_takeout(SAMPLE, Some(-5.0)).unwrap();
        assert_eq!(
            parsed.events[1].watched_at,
            Utc.with_ymd_and_hms(2024, 2, 10, 14, 0, 0).unwrap()
        );
    }

    #[test]
    fn zero_offset_is_not_absent() {
        let shifted = parse_takeout(SAMPLE, Some(0.0)).unwrap();
        let plain = parse_takeout(SAMPLE, None).unwrap();
        assert_eq!(shifted.events, plain.events);
    }

    #[test]
    fn rejects_unusable_offsets() {
        for hours in [1e12, -14.5, f64::NAN, f64::INFINITY] {
            assert!(parse_takeout(SAMPLE, Some(hours)).is_err(), "offset {hours}");
        }
        assert!(parse_takeout(SAMPLE, Some(14.0)).is_ok());
        assert!(parse_takeout(SAMPLE, Some(-12.0)).is_ok());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(parse_takeout("{not json", None).is_err());
    }
}
