use serde::{Deserialize, Serialize};
use strum::Display;

pub mod config;

pub use config::{ConfigIncomplete, MonitorConfig, ReadyConfig};

pub const TWITCH_WEB_ROOT: &str = "https://www.twitch.tv/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    Live,
    Other,
}

impl StreamType {
    /// Map the Helix `type` field; anything but `"live"` (including the empty
    /// string Helix uses for errored streams) is `Other`.
    pub fn from_api(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("live") {
            Self::Live
        } else {
            Self::Other
        }
    }
}

/// Result of a single streaming-status query. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStatus {
    pub is_live: bool,
    pub stream_type: StreamType,
}

impl StreamStatus {
    pub const fn live() -> Self {
        Self {
            is_live: true,
            stream_type: StreamType::Live,
        }
    }

    pub const fn offline() -> Self {
        Self {
            is_live: false,
            stream_type: StreamType::Other,
        }
    }

    /// Build from the `type` field of the first Helix stream entry, if any.
    pub fn from_first_stream_type(stream_type: Option<&str>) -> Self {
        match stream_type.map(StreamType::from_api) {
            Some(StreamType::Live) => Self::live(),
            _ => Self::offline(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum LiveState {
    #[strum(serialize = "NOT_LIVE")]
    NotLive,
    #[strum(serialize = "LIVE")]
    Live,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Transition {
    #[strum(serialize = "went live")]
    WentLive,
    #[strum(serialize = "went offline")]
    WentOffline,
    #[strum(serialize = "unchanged")]
    Unchanged,
}

impl LiveState {
    pub const fn from_flag(is_live: bool) -> Self {
        if is_live {
            Self::Live
        } else {
            Self::NotLive
        }
    }

    pub const fn is_live(self) -> bool {
        matches!(self, Self::Live)
    }

    /// Debounced transition for one poll result. Only `NotLive -> Live`
    /// yields `WentLive`; repeated live polls stay `Unchanged`.
    pub const fn advance(self, stream_is_live: bool) -> (Self, Transition) {
        match (self, stream_is_live) {
            (Self::NotLive, true) => (Self::Live, Transition::WentLive),
            (Self::Live, false) => (Self::NotLive, Transition::WentOffline),
            (state, _) => (state, Transition::Unchanged),
        }
    }
}

pub fn channel_url(login: &str) -> String {
    format!("{TWITCH_WEB_ROOT}{login}")
}

/// Normalize user input into a Twitch login name.
///
/// Accepts a bare login (`Foo`), or a channel URL (`https://www.twitch.tv/foo`,
/// `twitch.tv/foo/`). Logins are 1..=25 ASCII alphanumerics or underscores.
pub fn normalize_login(input: &str) -> Option<String> {
    let mut s = input.trim();
    for prefix in ["https://", "http://"] {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest;
        }
    }
    for prefix in ["www.twitch.tv/", "m.twitch.tv/", "twitch.tv/"] {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest;
            break;
        }
    }
    let s = s.split(['/', '?', '#']).next().unwrap_or_default();

    if s.is_empty() || s.len() > 25 {
        return None;
    }
    if !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Some(s.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_notifications(initial: LiveState, polls: &[bool]) -> usize {
        let mut state = initial;
        let mut sent = 0;
        for &live in polls {
            let (next, transition) = state.advance(live);
            if transition == Transition::WentLive {
                sent += 1;
            }
            state = next;
        }
        sent
    }

    #[test]
    fn one_notification_per_contiguous_live_run() {
        let polls = [true, true, true, false, true];
        assert_eq!(count_notifications(LiveState::NotLive, &polls), 2);
    }

    #[test]
    fn repeated_live_polls_are_idempotent() {
        assert_eq!(count_notifications(LiveState::Live, &[true; 10]), 0);
        assert_eq!(count_notifications(LiveState::NotLive, &[true; 10]), 1);
    }

    #[test]
    fn going_offline_is_silent() {
        let (state, transition) = LiveState::Live.advance(false);
        assert_eq!(state, LiveState::NotLive);
        assert_eq!(transition, Transition::WentOffline);

        let (state, transition) = LiveState::NotLive.advance(false);
        assert_eq!(state, LiveState::NotLive);
        assert_eq!(transition, Transition::Unchanged);
    }

    #[test]
    fn only_live_type_counts_as_live() {
        assert_eq!(StreamStatus::from_first_stream_type(Some("live")), StreamStatus::live());
        assert_eq!(StreamStatus::from_first_stream_type(Some("")), StreamStatus::offline());
        assert_eq!(StreamStatus::from_first_stream_type(None), StreamStatus::offline());
        assert_eq!(StreamType::from_api("LIVE"), StreamType::Live);
    }

    #[test]
    fn stream_status_serializes_type_lowercase() {
        let json = serde_json::to_string(&StreamStatus::live()).unwrap();
        assert_eq!(json, r#"{"is_live":true,"stream_type":"live"}"#);
    }

    #[test]
    fn normalize_login_accepts_names_and_urls() {
        assert_eq!(normalize_login("  Foo_Bar "), Some("foo_bar".to_string()));
        assert_eq!(normalize_login("https://www.twitch.tv/Foo"), Some("foo".to_string()));
        assert_eq!(normalize_login("twitch.tv/foo/videos"), Some("foo".to_string()));
        assert_eq!(normalize_login("http://m.twitch.tv/foo?x=1"), Some("foo".to_string()));
    }

    #[test]
    fn normalize_login_rejects_garbage() {
        assert_eq!(normalize_login(""), None);
        assert_eq!(normalize_login("https://www.twitch.tv/"), None);
        assert_eq!(normalize_login("foo bar"), None);
        assert_eq!(normalize_login(&"a".repeat(26)), None);
    }

    #[test]
    fn channel_url_points_at_twitch() {
        assert_eq!(channel_url("foo"), "https://www.twitch.tv/foo");
    }
}
