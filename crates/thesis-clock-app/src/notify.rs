//! User-facing notices.
//!
//! Things the user should hear about but that never block the clock:
//! a restored virtual time, a remote authority that could not be reached,
//! local storage that could not be written. Published on a broadcast
//! channel so any number of views can show them.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Capacity of the notice channel.
///
/// A subscriber that falls further behind receives
/// [`broadcast::error::RecvError::Lagged`] and skips to the newest notice.
pub const NOTICE_CAPACITY: usize = 64;

/// How loudly a notice should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    /// Informational.
    Info,
    /// Something failed; the clock carried on.
    Warning,
}

/// A message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Human-readable text.
    pub message: String,
    /// Real wall time the notice was raised.
    pub at: NaiveDateTime,
}

impl Notice {
    /// An informational notice.
    pub fn info(message: impl Into<String>, at: NaiveDateTime) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
            at,
        }
    }

    /// A warning notice.
    pub fn warning(message: impl Into<String>, at: NaiveDateTime) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
            at,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
        };
        write!(f, "[{tag}] {}", self.message)
    }
}

/// Publish `notice` to every subscriber.
///
/// Returns the number of receivers reached; zero subscribers is normal.
pub fn publish(tx: &broadcast::Sender<Notice>, notice: Notice) -> usize {
    tx.send(notice).unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn at() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2024-06-10T10:00:00", "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    #[test]
    fn display_tags_level() {
        assert_eq!(Notice::info("restored", at()).to_string(), "[info] restored");
        assert_eq!(
            Notice::warning("offline", at()).to_string(),
            "[warning] offline"
        );
    }

    #[test]
    fn notices_travel_as_json() {
        let notice = Notice::warning("Server clock not updated", at());
        let json = serde_json::to_value(&notice).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "level": "warning",
                "message": "Server clock not updated",
                "at": "2024-06-10T10:00:00",
            })
        );
        let back: Notice = serde_json::from_value(json).unwrap();
        assert_eq!(back, notice);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_fine() {
        let (tx, _) = broadcast::channel(NOTICE_CAPACITY);
        assert_eq!(publish(&tx, Notice::info("nobody listening", at())), 0);

        let mut rx = tx.subscribe();
        assert_eq!(publish(&tx, Notice::warning("heard", at())), 1);
        assert_eq!(rx.recv().await.unwrap().level, NoticeLevel::Warning);
    }
}
