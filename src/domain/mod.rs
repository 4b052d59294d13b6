//! Content-domain rules shared by handlers and stores.
//!
//! The publish state machine lives here as pure functions over primitives so
//! it stays testable without any store in the picture.

use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Blog publication state. Serialized lowercase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BlogStatus {
    #[default]
    Draft,
    Published,
}

impl BlogStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            _ => None,
        }
    }
}

/// Timestamp effects of one status transition. `None` means leave the field
/// as it is; neither timestamp is ever cleared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransitionEffects {
    pub set_published_at: Option<i64>,
    pub set_last_edited: Option<i64>,
}

/// Applies the publish state machine to one update.
///
/// Entering `Published` for the first time stamps `published_at`. A content
/// change while already published stamps `last_edited`. Returning to `Draft`
/// keeps `published_at` so a later re-publish is not treated as the first.
#[must_use]
pub fn transition_effects(
    current: BlogStatus,
    next: BlogStatus,
    published_before: bool,
    content_changed: bool,
    now: i64,
) -> TransitionEffects {
    let mut effects = TransitionEffects::default();

    if next == BlogStatus::Published && !published_before {
        effects.set_published_at = Some(now);
    }

    if current == BlogStatus::Published && next == BlogStatus::Published && content_changed {
        effects.set_last_edited = Some(now);
    }

    effects
}

/// Name shown next to authored content: the real name only when the author
/// opted in, the username otherwise.
#[must_use]
pub fn display_name(
    first_name: &str,
    last_name: &str,
    username: &str,
    display_real_name: bool,
) -> String {
    if display_real_name {
        format!("{first_name} {last_name}")
    } else {
        username.to_string()
    }
}

pub const SHORT_ID_LEN: usize = 8;

/// Random alphanumeric short id for blog URLs. Uniqueness is enforced by
/// the store; callers retry on collision.
#[must_use]
pub fn generate_short_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SHORT_ID_LEN)
        .map(char::from)
        .collect()
}

/// Current unix time in seconds.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_first_publish_sets_published_at() {
        let effects =
            transition_effects(BlogStatus::Draft, BlogStatus::Published, false, true, NOW);
        assert_eq!(effects.set_published_at, Some(NOW));
        assert_eq!(effects.set_last_edited, None);
    }

    #[test]
    fn test_republish_keeps_original_published_at() {
        // Draft again, then back to published: stamped once, not twice.
        let effects =
            transition_effects(BlogStatus::Draft, BlogStatus::Published, true, true, NOW);
        assert_eq!(effects.set_published_at, None);
        assert_eq!(effects.set_last_edited, None);
    }

    #[test]
    fn test_edit_while_published_sets_last_edited() {
        let effects =
            transition_effects(BlogStatus::Published, BlogStatus::Published, true, true, NOW);
        assert_eq!(effects.set_published_at, None);
        assert_eq!(effects.set_last_edited, Some(NOW));
    }

    #[test]
    fn test_published_without_content_change_untouched() {
        let effects =
            transition_effects(BlogStatus::Published, BlogStatus::Published, true, false, NOW);
        assert_eq!(effects, TransitionEffects::default());
    }

    #[test]
    fn test_unpublish_clears_nothing() {
        let effects =
            transition_effects(BlogStatus::Published, BlogStatus::Draft, true, true, NOW);
        assert_eq!(effects, TransitionEffects::default());
    }

    #[test]
    fn test_draft_edits_leave_timestamps_alone() {
        let effects = transition_effects(BlogStatus::Draft, BlogStatus::Draft, false, true, NOW);
        assert_eq!(effects, TransitionEffects::default());
    }

    #[test]
    fn test_display_name_honors_preference() {
        assert_eq!(display_name("Ada", "Lovelace", "ada82", true), "Ada Lovelace");
        assert_eq!(display_name("Ada", "Lovelace", "ada82", false), "ada82");
    }

    #[test]
    fn test_short_id_shape() {
        let id = generate_short_id();
        assert_eq!(id.len(), SHORT_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(generate_short_id(), generate_short_id());
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!(BlogStatus::parse("draft"), Some(BlogStatus::Draft));
        assert_eq!(BlogStatus::parse("published"), Some(BlogStatus::Published));
        assert_eq!(BlogStatus::parse("Published"), None);
        assert_eq!(BlogStatus::Published.as_str(), "published");
    }

    #[test]
    fn test_unix_now_is_recent() {
        // 2023-11-14 in unix seconds; anything earlier means a broken clock.
        assert!(unix_now() > 1_700_000_000);
    }
}
