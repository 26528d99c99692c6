//! Deterministic stand-ins for the browser: a manual clock with queued timers, a
//! notifier that records everything and a transport whose responses the test drives.

use crate::api::{OnError, OnSuccess, SaveRequest, Transport, TransportError};
use crate::host::{Scheduler, TimerHandle};
use crate::monitor::MonitorStatus;
use crate::notify::{Notification, NotificationLevel, Notifier};
use std::cell::{Cell, RefCell};

struct QueuedTimer {
    deadline: i64,
    handle: TimerHandle,
    callback: Box<dyn FnOnce()>,
}

#[derive(Default)]
pub(crate) struct ManualScheduler {
    now: Cell<i64>,
    next_handle: Cell<i32>,
    timers: RefCell<Vec<QueuedTimer>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward, firing due timers in deadline order (ties: arming order).
    pub fn advance(&self, ms: i64) {
        let target = self.now.get() + ms;
        loop {
            let next = {
                let mut timers = self.timers.borrow_mut();
                let due = timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.deadline <= target)
                    .min_by_key(|(_, t)| (t.deadline, t.handle.0))
                    .map(|(i, _)| i);
                due.map(|i| timers.remove(i))
            };
            let Some(timer) = next else {
                break;
            };
            self.now.set(timer.deadline.max(self.now.get()));
            (timer.callback)();
        }
        self.now.set(target);
    }

    pub fn armed(&self) -> usize {
        self.timers.borrow().len()
    }
}

impl Scheduler for ManualScheduler {
    fn now_ms(&self) -> i64 {
        self.now.get()
    }

    fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> TimerHandle {
        let handle = TimerHandle(self.next_handle.get() + 1);
        self.next_handle.set(handle.0);
        self.timers.borrow_mut().push(QueuedTimer {
            deadline: self.now.get() + i64::from(delay_ms),
            handle,
            callback,
        });
        handle
    }

    fn clear_timeout(&self, handle: TimerHandle) {
        self.timers.borrow_mut().retain(|t| t.handle != handle);
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub notices: RefCell<Vec<Notification>>,
    pub escalations: RefCell<Vec<(String, MonitorStatus)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, level: NotificationLevel) -> usize {
        self.notices
            .borrow()
            .iter()
            .filter(|n| n.level == level)
            .count()
    }

    pub fn last(&self) -> Option<Notification> {
        self.notices.borrow().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.notices.borrow().len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, level: NotificationLevel, duration_ms: u32) {
        self.notices
            .borrow_mut()
            .push(Notification::new(message, level, duration_ms));
    }

    fn escalate(&self, message: &str, status: &MonitorStatus) {
        self.escalations
            .borrow_mut()
            .push((message.to_string(), status.clone()));
    }
}

type Slot = Option<(OnSuccess, OnError)>;

/// Holds every sent request; the test answers them by index.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    pub sent: RefCell<Vec<SaveRequest>>,
    slots: RefCell<Vec<Slot>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn take(&self, index: usize) -> (OnSuccess, OnError) {
        self.slots
            .borrow_mut()
            .get_mut(index)
            .and_then(|s| s.take())
            .expect("request already answered or never sent")
    }

    pub fn succeed(&self, index: usize, data: &str) {
        let (ok, _) = self.take(index);
        ok(data.to_string());
    }

    pub fn fail(&self, index: usize, err: TransportError) {
        let (_, fail) = self.take(index);
        fail(err);
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: SaveRequest, on_success: OnSuccess, on_error: OnError) {
        self.sent.borrow_mut().push(request);
        self.slots.borrow_mut().push(Some((on_success, on_error)));
    }
}
