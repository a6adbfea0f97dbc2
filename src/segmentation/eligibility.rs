use crate::models::{SessionId, ViewSession};
use crate::segmentation::config::EligibilityRules;

pub fn is_eligible(session: &ViewSession, rules: &EligibilityRules) -> bool {
    if session.len() < rules.min_videos_per_session {
        return false;
    }
    match (rules.recency_cutoff, session.end_time()) {
        (Some(cutoff), Some(last)) => last >= cutoff,
        (None, Some(_)) => true,
        (_, None) => false,
    }
}

/// Ids of the sessions meeting the eligibility rules, in chronological order.
pub fn filter_eligible(sessions: &[ViewSession], rules: &EligibilityRules) -> Vec<SessionId> {
    sessions
        .iter()
        .filter(|s| is_eligible(s, rules))
        .map(|s| s.id)
        .collect()
}

/// Upper bound on how many videos the given sessions can yield once each is
/// truncated to `max_videos_per_session`.
pub fn projected_total(
    sessions: &[ViewSession],
    eligible: &[SessionId],
    max_videos_per_session: usize,
) -> usize {
    sessions
        .iter()
        .filter(|s| eligible.contains(&s.id))
        .map(|s| s.len().min(max_videos_per_session))
        .sum()
}
