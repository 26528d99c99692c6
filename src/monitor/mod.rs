mod matcher;
mod outcome;
mod transport;

pub use matcher::{NoteDataSaves, SaveMatcher};
pub use outcome::{
    ExceptionKind, SaveFailure, SaveOutcome, SaveRecord, UnloadBlocked,
};
pub use transport::MonitoredTransport;

use crate::api::{SaveRequest, Transport, TransportError};
use crate::config::{
    MonitorConfig, REFOCUS_WARNING_WINDOW_MS, SLOW_SAVE_THRESHOLD_MS, UNLOAD_BLOCK_WINDOW_MS,
};
use crate::host::{Scheduler, TimerHandle};
use crate::notify::{NotificationLevel, Notifier, PERSISTENT};
use crate::util::format_secs;
use serde::{Deserialize, Serialize};
use std::cell::{RefCell, RefMut};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::rc::{Rc, Weak};

const JOURNAL_CAPACITY: usize = 50;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SaveId(String);

impl SaveId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SaveId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub struct PendingSave {
    pub id: SaveId,
    pub target_id: String,
    pub url: String,
    pub started_ms: i64,
    /// Timeout armed for this save; later config changes don't affect it.
    pub timeout_ms: u32,
    timer: Option<TimerHandle>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FailureState {
    pub consecutive_failures: u32,
    pub last_failure_ms: Option<i64>,
}

impl FailureState {
    fn record(&mut self, now_ms: i64) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure_ms = Some(now_ms);
    }

    /// A counted failure younger than `window_ms`.
    fn failed_within(&self, now_ms: i64, window_ms: i64) -> bool {
        match self.last_failure_ms {
            Some(at) if self.consecutive_failures > 0 => now_ms - at < window_ms,
            _ => false,
        }
    }
}

/// Read-only snapshot for debugging and the JS handle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatus {
    pub is_online: bool,
    pub failure_count: u32,
    /// Epoch ms of the most recent failure, kept until `reset_failures`.
    pub last_failure_time: Option<i64>,
    pub pending_save_count: usize,
    pub timeout_ms: u32,
}

struct MonitorState {
    config: MonitorConfig,
    is_online: bool,
    pending: HashMap<SaveId, PendingSave>,
    failures: FailureState,
    next_seq: u64,
    journal: VecDeque<SaveRecord>,
}

impl MonitorState {
    fn record(&mut self, entry: &PendingSave, outcome: SaveOutcome, duration_ms: i64) {
        if self.journal.len() >= JOURNAL_CAPACITY {
            self.journal.pop_front();
        }
        self.journal.push_back(SaveRecord {
            id: entry.id.to_string(),
            target_id: entry.target_id.clone(),
            outcome,
            duration_ms,
        });
    }
}

struct Inner {
    state: RefCell<MonitorState>,
    scheduler: Rc<dyn Scheduler>,
    notifier: Rc<dyn Notifier>,
    matcher: Box<dyn SaveMatcher>,
}

/// Observes note saves: pending set, timeouts, failure counters and user notices.
///
/// Single-threaded. Every settle path removes the pending entry first; whichever of
/// "timer fired" and "response arrived" gets there first decides the outcome, the other
/// finds nothing and returns. Notices are emitted after the state borrow is released, so
/// a notifier may read [`SaveMonitor::status`] while handling one.
///
/// The monitor never retries and never touches the save itself; internal trouble is
/// logged and swallowed.
#[derive(Clone)]
pub struct SaveMonitor {
    inner: Rc<Inner>,
}

impl SaveMonitor {
    pub fn new(
        config: MonitorConfig,
        scheduler: Rc<dyn Scheduler>,
        notifier: Rc<dyn Notifier>,
    ) -> Self {
        Self::with_matcher(config, scheduler, notifier, NoteDataSaves)
    }

    pub fn with_matcher(
        config: MonitorConfig,
        scheduler: Rc<dyn Scheduler>,
        notifier: Rc<dyn Notifier>,
        matcher: impl SaveMatcher + 'static,
    ) -> Self {
        log::info!(target: "save_monitor", "monitor created (timeout {} ms)", config.timeout_ms);
        Self {
            inner: Rc::new(Inner {
                state: RefCell::new(MonitorState {
                    config,
                    is_online: true,
                    pending: HashMap::new(),
                    failures: FailureState::default(),
                    next_seq: 0,
                    journal: VecDeque::new(),
                }),
                scheduler,
                notifier,
                matcher: Box::new(matcher),
            }),
        }
    }

    fn state(&self) -> Option<RefMut<'_, MonitorState>> {
        match self.inner.state.try_borrow_mut() {
            Ok(st) => Some(st),
            Err(_) => {
                log::error!(target: "save_monitor", "re-entrant monitor access; event dropped");
                None
            }
        }
    }

    fn now(&self) -> i64 {
        self.inner.scheduler.now_ms()
    }

    fn notify(&self, message: &str, level: NotificationLevel, duration_ms: u32) {
        self.inner.notifier.notify(message, level, duration_ms);
    }

    fn alert(&self, message: &str) {
        let enabled = self
            .inner
            .state
            .try_borrow()
            .map(|st| st.config.system_alerts)
            .unwrap_or(false);
        if enabled {
            if let Some(status) = self.status() {
                self.inner.notifier.escalate(message, &status);
            }
        }
    }

    /// Wraps a callback-style transport.
    pub fn wrap<T: Transport>(&self, transport: T) -> MonitoredTransport<T> {
        MonitoredTransport::new(transport, self.clone())
    }

    /// Starts tracking `request` if it is a save. `None` means "not a save, don't track".
    pub fn begin(&self, request: &SaveRequest) -> Option<SaveTicket> {
        let target_id = self.inner.matcher.target_of(request)?;
        let started_ms = self.now();

        let (id, timeout_ms) = {
            let mut st = self.state()?;
            st.next_seq += 1;
            let id = SaveId(format!("{target_id}-{started_ms}-{}", st.next_seq));
            let timeout_ms = st.config.timeout_ms;
            st.pending.insert(
                id.clone(),
                PendingSave {
                    id: id.clone(),
                    target_id: target_id.clone(),
                    url: request.url.clone(),
                    started_ms,
                    timeout_ms,
                    timer: None,
                },
            );
            (id, timeout_ms)
        };

        let weak: Weak<Inner> = Rc::downgrade(&self.inner);
        let timer_id = id.clone();
        let timer = self.inner.scheduler.set_timeout(
            timeout_ms,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    SaveMonitor { inner }.on_timeout(&timer_id);
                }
            }),
        );

        match self.state() {
            Some(mut st) => match st.pending.get_mut(&id) {
                Some(entry) => entry.timer = Some(timer),
                None => self.inner.scheduler.clear_timeout(timer),
            },
            None => self.inner.scheduler.clear_timeout(timer),
        }

        log::debug!(target: "save_monitor", "save started: {target_id} ({})", request.url);

        Some(SaveTicket {
            monitor: self.clone(),
            id,
        })
    }

    fn take_pending(&self, id: &SaveId) -> Option<PendingSave> {
        let entry = self.state()?.pending.remove(id)?;
        if let Some(timer) = entry.timer {
            self.inner.scheduler.clear_timeout(timer);
        }
        Some(entry)
    }

    fn on_timeout(&self, id: &SaveId) {
        let now = self.now();
        let Some((entry, timeout_ms, duration)) = self.state().and_then(|mut st| {
            let entry = st.pending.remove(id)?;
            let timeout_ms = entry.timeout_ms;
            let duration = now - entry.started_ms;
            st.failures.record(now);
            st.record(
                &entry,
                SaveOutcome::Failed {
                    failure: SaveFailure::Timeout { timeout_ms },
                },
                duration,
            );
            Some((entry, timeout_ms, duration))
        }) else {
            return;
        };

        log::error!(
            target: "save_monitor",
            "save timed out: {} ({duration}ms)",
            entry.target_id
        );

        let message = SaveFailure::Timeout { timeout_ms }.user_message();
        self.notify(&message, NotificationLevel::Error, PERSISTENT);
        self.alert(&message);
    }

    fn on_success(&self, id: &SaveId) {
        let now = self.now();
        let Some(entry) = self.take_pending(id) else {
            log::debug!(target: "save_monitor", "late success for {id} ignored");
            return;
        };
        let duration = now - entry.started_ms;
        let slow = duration >= SLOW_SAVE_THRESHOLD_MS;
        let outcome = if slow {
            SaveOutcome::SlowSuccess
        } else {
            SaveOutcome::Success
        };

        if let Some(mut st) = self.state() {
            st.failures.consecutive_failures = 0;
            st.record(&entry, outcome, duration);
        }

        if slow {
            log::warn!(target: "save_monitor", "slow save: {} ({duration}ms)", entry.target_id);
            self.notify(
                &format!(
                    "⚠️ Saved, but it took {}s\nThe network may be slow",
                    format_secs(duration)
                ),
                NotificationLevel::Warning,
                3000,
            );
        } else {
            log::info!(target: "save_monitor", "saved: {} ({duration}ms)", entry.target_id);
        }
    }

    fn on_failure(&self, id: &SaveId, error: &TransportError) {
        let now = self.now();
        let Some(entry) = self.take_pending(id) else {
            log::debug!(target: "save_monitor", "late failure for {id} ignored");
            return;
        };
        let duration = now - entry.started_ms;
        let failure = SaveFailure::from_transport(error);

        if let Some(mut st) = self.state() {
            st.failures.record(now);
            st.record(
                &entry,
                SaveOutcome::Failed {
                    failure: failure.clone(),
                },
                duration,
            );
        }

        log::error!(
            target: "save_monitor",
            "save failed: {} after {duration}ms: {failure}",
            entry.target_id
        );

        let message = failure.user_message();
        self.notify(&message, NotificationLevel::Error, PERSISTENT);
        self.alert(&message);
    }

    fn on_abandon(&self, id: &SaveId) {
        let now = self.now();
        let Some(entry) = self.take_pending(id) else {
            return;
        };
        let duration = now - entry.started_ms;
        if let Some(mut st) = self.state() {
            st.record(&entry, SaveOutcome::Abandoned, duration);
        }
        log::warn!(
            target: "save_monitor",
            "save abandoned by caller: {} after {duration}ms",
            entry.target_id
        );
    }

    /// Async decorator: the result of `fut` is returned unchanged. Dropping the returned
    /// future before it resolves abandons the save.
    pub async fn track<T, F>(&self, request: &SaveRequest, fut: F) -> Result<T, TransportError>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        let Some(ticket) = self.begin(request) else {
            return fut.await;
        };

        let mut guard = AbandonOnDrop(Some(ticket));
        let result = fut.await;
        if let Some(ticket) = guard.0.take() {
            match &result {
                Ok(_) => ticket.succeed(),
                Err(e) => ticket.fail(e),
            }
        }
        result
    }

    /// Browser connectivity transition. An `online` event always clears the failure count;
    /// notices are only shown when the state actually changes.
    pub fn set_online(&self, online: bool) {
        {
            let Some(mut st) = self.state() else {
                return;
            };
            if st.is_online == online {
                if online {
                    st.failures.consecutive_failures = 0;
                }
                return;
            }
            st.is_online = online;
            if online {
                // Recovery doesn't touch pending saves; they still settle on their own.
                st.failures.consecutive_failures = 0;
            }
        }

        if online {
            log::info!(target: "save_monitor", "network back online");
            self.notify(
                "✅ Network restored\nSaving works again",
                NotificationLevel::Success,
                3000,
            );
        } else {
            log::error!(target: "save_monitor", "network went offline");
            let message =
                "❌ Network connection lost!\n\nNotes cannot be saved\nPlease check your connection";
            self.notify(message, NotificationLevel::Error, PERSISTENT);
            self.alert(message);
        }
    }

    /// Seeds the online flag without notices (e.g. from `navigator.onLine` at startup).
    pub fn set_initial_online(&self, online: bool) {
        if let Some(mut st) = self.state() {
            st.is_online = online;
        }
    }

    /// Tab became visible again. Returns whether a deferred warning was shown.
    pub fn on_visibility_restored(&self) -> bool {
        let now = self.now();
        let count = {
            let Some(st) = self.state() else {
                return false;
            };
            if !st.failures.failed_within(now, REFOCUS_WARNING_WINDOW_MS) {
                return false;
            }
            st.failures.consecutive_failures
        };

        self.notify(
            &format!(
                "⚠️ Heads up: {count} save(s) failed while you were away\nPlease check that your note content is complete"
            ),
            NotificationLevel::Warning,
            5000,
        );
        true
    }

    /// Whether the page may unload right now.
    pub fn check_unload(&self) -> Result<(), UnloadBlocked> {
        let now = self.now();
        let Ok(st) = self.inner.state.try_borrow() else {
            return Ok(());
        };

        if !st.pending.is_empty() {
            return Err(UnloadBlocked::PendingSaves(st.pending.len()));
        }
        if st.failures.failed_within(now, UNLOAD_BLOCK_WINDOW_MS) {
            return Err(UnloadBlocked::RecentFailure);
        }
        Ok(())
    }

    pub fn status(&self) -> Option<MonitorStatus> {
        let st = self.inner.state.try_borrow().ok()?;
        Some(MonitorStatus {
            is_online: st.is_online,
            failure_count: st.failures.consecutive_failures,
            last_failure_time: st.failures.last_failure_ms,
            pending_save_count: st.pending.len(),
            timeout_ms: st.config.timeout_ms,
        })
    }

    pub fn pending(&self) -> Vec<PendingSave> {
        self.inner
            .state
            .try_borrow()
            .map(|st| st.pending.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Most recent terminal outcomes, oldest first.
    pub fn recent_outcomes(&self) -> Vec<SaveRecord> {
        self.inner
            .state
            .try_borrow()
            .map(|st| st.journal.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Applies to saves started after the call. Zero is rejected.
    pub fn set_timeout_ms(&self, ms: u32) {
        if ms == 0 {
            log::warn!(target: "save_monitor", "ignoring zero save timeout");
            return;
        }
        if let Some(mut st) = self.state() {
            st.config.timeout_ms = ms;
            log::info!(target: "save_monitor", "save timeout set to {ms}ms");
        }
    }

    pub fn reset_failures(&self) {
        if let Some(mut st) = self.state() {
            st.failures = FailureState::default();
            log::info!(target: "save_monitor", "failure count reset");
        }
    }

    pub fn config(&self) -> Option<MonitorConfig> {
        self.inner.state.try_borrow().ok().map(|st| st.config.clone())
    }

    pub fn announce_start(&self) {
        self.notify("Save monitor enabled ✓", NotificationLevel::Success, 2000);
    }
}

/// Handle for one tracked save. Settling consumes it; dropping it unsettled leaves the
/// save to its timeout.
pub struct SaveTicket {
    monitor: SaveMonitor,
    id: SaveId,
}

impl SaveTicket {
    pub fn id(&self) -> &SaveId {
        &self.id
    }

    pub fn succeed(self) {
        self.monitor.on_success(&self.id);
    }

    pub fn fail(self, error: &TransportError) {
        self.monitor.on_failure(&self.id, error);
    }

    /// Stops tracking without counting a success or a failure.
    pub fn abandon(self) {
        self.monitor.on_abandon(&self.id);
    }
}

struct AbandonOnDrop(Option<SaveTicket>);

impl Drop for AbandonOnDrop {
    fn drop(&mut self) {
        if let Some(ticket) = self.0.take() {
            ticket.abandon();
        }
    }
}
