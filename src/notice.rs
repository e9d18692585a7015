//! Transient user notifications.
//!
//! At most one notice is live at a time: showing a new one replaces the
//! previous, and a notice disappears once its time-to-live has passed.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NoticeBoard {
    ttl: Duration,
    current: Mutex<Option<Notice>>,
}

impl NoticeBoard {
    pub fn new(ttl_ms: i64) -> Self {
        Self {
            ttl: Duration::milliseconds(ttl_ms),
            current: Mutex::new(None),
        }
    }

    pub fn show(&self, kind: NoticeKind, message: impl Into<String>, now: DateTime<Utc>) {
        let notice = Notice {
            kind,
            message: message.into(),
            expires_at: now + self.ttl,
        };
        if let Ok(mut current) = self.current.lock() {
            *current = Some(notice);
        }
    }

    /// The live notice at `now`; an expired one is dropped.
    pub fn current(&self, now: DateTime<Utc>) -> Option<Notice> {
        let mut current = self.current.lock().ok()?;
        if current.as_ref().is_some_and(|n| now >= n.expires_at) {
            *current = None;
        }
        current.clone()
    }

    pub fn dismiss(&self) {
        if let Ok(mut current) = self.current.lock() {
            *current = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn new_notice_replaces_old_and_expires() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let board = NoticeBoard::new(5_000);

        board.show(NoticeKind::Error, "first", t0);
        board.show(NoticeKind::Success, "second", t0);

        let live = board.current(t0 + Duration::milliseconds(4_999)).unwrap();
        assert_eq!(live.message, "second");
        assert!(board.current(t0 + Duration::milliseconds(5_000)).is_none());
    }

    #[test]
    fn dismiss_clears() {
        let now = Utc::now();
        let board = NoticeBoard::new(5_000);
        board.show(NoticeKind::Success, "saved", now);
        board.dismiss();
        assert!(board.current(now).is_none());
    }
}
