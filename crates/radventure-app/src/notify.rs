// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Transient toast notifications with auto-close deadlines.

use std::cell::Cell;
use std::time::Duration;

use time::OffsetDateTime;

use crate::NotificationId;

pub const DEFAULT_DURATION: Duration = Duration::from_millis(5000);

/// Source of wall-clock milliseconds.
pub trait Clock {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
        (nanos / 1_000_000) as i64
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<i64>,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: Cell::new(start_ms),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by.as_millis() as i64);
    }

    pub fn set(&self, ms: i64) {
        self.now.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> i64 {
        (**self).now_ms()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

pub struct NotificationAction {
    pub label: String,
    callback: Box<dyn FnMut()>,
}

impl NotificationAction {
    pub fn new(label: impl Into<String>, callback: impl FnMut() + 'static) -> Self {
        Self {
            label: label.into(),
            callback: Box::new(callback),
        }
    }
}

impl std::fmt::Debug for NotificationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationAction")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct NewNotification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: Option<String>,
    pub duration: Option<Duration>,
    pub auto_close: bool,
    pub action: Option<NotificationAction>,
}

impl NewNotification {
    pub fn new(kind: NotificationKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: None,
            duration: None,
            auto_close: true,
            action: None,
        }
    }

    pub fn info(title: impl Into<String>) -> Self {
        Self::new(NotificationKind::Info, title)
    }

    pub fn success(title: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, title)
    }

    pub fn warning(title: impl Into<String>) -> Self {
        Self::new(NotificationKind::Warning, title)
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, title)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn sticky(mut self) -> Self {
        self.auto_close = false;
        self
    }

    pub fn with_action(mut self, action: NotificationAction) -> Self {
        self.action = Some(action);
        self
    }
}

#[derive(Debug)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: Option<String>,
    pub action: Option<NotificationAction>,
    /// `None` when the notification stays until dismissed.
    pub expires_at_ms: Option<i64>,
}

#[derive(Debug)]
pub struct NotificationQueue<C: Clock> {
    clock: C,
    default_duration: Duration,
    last_id: i64,
    entries: Vec<Notification>,
}

impl<C: Clock> NotificationQueue<C> {
    pub fn new(clock: C) -> Self {
        Self::with_default_duration(clock, DEFAULT_DURATION)
    }

    pub fn with_default_duration(clock: C, default_duration: Duration) -> Self {
        Self {
            clock,
            default_duration,
            last_id: 0,
            entries: Vec::new(),
        }
    }

    pub fn add(&mut self, notification: NewNotification) -> NotificationId {
        let now = self.clock.now_ms();
        let raw = if now > self.last_id {
            now
        } else {
            self.last_id + 1
        };
        self.last_id = raw;
        let id = NotificationId::new(raw);

        let expires_at_ms = notification.auto_close.then(|| {
            let duration = notification.duration.unwrap_or(self.default_duration);
            now + duration.as_millis() as i64
        });
        self.entries.push(Notification {
            id,
            kind: notification.kind,
            title: notification.title,
            message: notification.message,
            action: notification.action,
            expires_at_ms,
        });
        id
    }

    /// Returns whether a notification was removed.
    pub fn remove(&mut self, id: NotificationId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn visible(&self) -> &[Notification] {
        &self.entries
    }

    pub fn get(&self, id: NotificationId) -> Option<&Notification> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Drops auto-close entries whose deadline has passed and returns their ids.
    pub fn expire(&mut self) -> Vec<NotificationId> {
        let now = self.clock.now_ms();
        let mut expired = Vec::new();
        self.entries.retain(|entry| match entry.expires_at_ms {
            Some(deadline) if deadline <= now => {
                expired.push(entry.id);
                false
            }
            _ => true,
        });
        expired
    }

    /// Runs the action callback, then dismisses the notification.
    pub fn invoke_action(&mut self, id: NotificationId) -> bool {
        let Some(position) = self.entries.iter().position(|entry| entry.id == id) else {
            return false;
        };
        let Some(mut action) = self.entries[position].action.take() else {
            return false;
        };
        (action.callback)();
        self.entries.remove(position);
        true
    }

    pub fn error_toast(&mut self, title: impl Into<String>, error: &anyhow::Error) -> NotificationId {
        self.add(NewNotification::error(title).with_message(format!("operation failed: {error:#}")))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ManualClock, NewNotification, NotificationAction, NotificationKind, NotificationQueue,
    };
    use anyhow::{Context, anyhow};
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Duration;

    #[test]
    fn same_millisecond_ids_stay_distinct_and_increasing() {
        let clock = ManualClock::new(1_000);
        let mut queue = NotificationQueue::new(&clock);
        let first = queue.add(NewNotification::info("saved"));
        let second = queue.add(NewNotification::info("saved again"));
        let third = queue.add(NewNotification::info("and again"));
        assert_eq!(first.get(), 1_000);
        assert_eq!(second.get(), 1_001);
        assert_eq!(third.get(), 1_002);
        let visible: Vec<_> = queue.visible().iter().map(|toast| toast.id).collect();
        assert_eq!(visible, vec![first, second, third]);

        clock.set(5_000);
        assert_eq!(queue.add(NewNotification::info("later")).get(), 5_000);
    }

    #[test]
    fn add_then_remove_leaves_queue_empty() {
        let clock = ManualClock::new(42);
        let mut queue = NotificationQueue::new(&clock);
        let id = queue.add(NewNotification::info("case saved"));
        assert!(queue.remove(id));
        assert!(queue.visible().is_empty());
        assert!(queue.get(id).is_none());
    }

    #[test]
    fn ids_stay_monotonic_when_clock_goes_backwards() {
        let clock = ManualClock::new(10_000);
        let mut queue = NotificationQueue::new(&clock);
        let first = queue.add(NewNotification::info("a"));
        clock.set(9_000);
        let second = queue.add(NewNotification::info("b"));
        assert!(second > first);
    }

    #[test]
    fn auto_close_expires_after_default_duration() {
        let clock = ManualClock::new(0);
        let mut queue = NotificationQueue::new(&clock);
        let id = queue.add(NewNotification::success("case saved"));
        let sticky = queue.add(NewNotification::warning("unsaved draft").sticky());

        clock.advance(Duration::from_millis(4_999));
        assert!(queue.expire().is_empty());

        clock.advance(Duration::from_millis(1));
        assert_eq!(queue.expire(), vec![id]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.visible()[0].id, sticky);

        clock.advance(Duration::from_secs(3_600));
        assert!(queue.expire().is_empty());
    }

    #[test]
    fn custom_duration_overrides_default() {
        let clock = ManualClock::new(0);
        let mut queue = NotificationQueue::with_default_duration(&clock, Duration::from_secs(60));
        queue.add(NewNotification::info("short").with_duration(Duration::from_millis(200)));
        queue.add(NewNotification::info("default"));
        clock.advance(Duration::from_millis(250));
        assert_eq!(queue.expire().len(), 1);
        assert_eq!(queue.visible()[0].title, "default");
    }

    #[test]
    fn invoking_action_runs_callback_and_dismisses() {
        let clock = ManualClock::new(0);
        let mut queue = NotificationQueue::new(&clock);
        let undone = Rc::new(Cell::new(false));
        let flag = Rc::clone(&undone);
        let id = queue.add(
            NewNotification::info("case deleted")
                .with_action(NotificationAction::new("Undo", move || flag.set(true))),
        );
        let plain = queue.add(NewNotification::info("no action"));

        assert!(queue.invoke_action(id));
        assert!(undone.get());
        assert!(queue.get(id).is_none());
        assert!(!queue.invoke_action(plain));
        assert!(!queue.remove(id));
        assert!(queue.remove(plain));
        assert!(queue.is_empty());
    }

    #[test]
    fn error_toast_renders_cause_chain() {
        let clock = ManualClock::new(0);
        let mut queue = NotificationQueue::new(&clock);
        let error = Err::<(), _>(anyhow!("balance too low"))
            .context("purchase")
            .expect_err("error");
        let id = queue.error_toast("Purchase failed", &error);
        let toast = queue.get(id).expect("toast");
        assert_eq!(toast.kind, NotificationKind::Error);
        assert_eq!(
            toast.message.as_deref(),
            Some("operation failed: purchase: balance too low")
        );
        queue.clear();
        assert!(queue.is_empty());
    }
}
