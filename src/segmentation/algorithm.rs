use crate::models::{SessionId, ViewSession, WatchEvent};
use crate::segmentation::config::SegmentationConfig;

/// Main segmentation function: splits a watch history into viewing sessions.
///
/// Events are stable-sorted by timestamp first, so ties keep their input
/// order. The output partitions the sorted input: concatenating the
/// sessions gives back exactly the sorted events.
pub fn segment_history(
    mut events: Vec<WatchEvent>,
    config: &SegmentationConfig,
) -> Vec<ViewSession> {
    if events.is_empty() {
        return Vec::new();
    }

    events.sort_by_key(|e| e.watched_at);

    let mut sessions = Vec::new();
    let mut current: Option<Vec<WatchEvent>> = None;

    for event in events {
        match &mut current {
            Some(group) if within_gap(group, &event, config) => {
                group.push(event);
            }
            _ => {
                if let Some(group) = current.take() {
                    sessions.push(close_session(sessions.len(), group));
                }
                current = Some(vec![event]);
            }
        }
    }

    // Push final group
    if let Some(group) = current {
        sessions.push(close_session(sessions.len(), group));
    }

    sessions
}

fn within_gap(group: &[WatchEvent], next: &WatchEvent, config: &SegmentationConfig) -> bool {
    match group.last() {
        Some(last) => next.watched_at - last.watched_at <= config.session_gap,
        None => true,
    }
}

fn close_session(index: usize, events: Vec<WatchEvent>) -> ViewSession {
    ViewSession {
        id: SessionId(index as u32),
        events,
    }
}
