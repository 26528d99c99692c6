mod toast;

pub use toast::{SaveToasts, Toast, ToastQueue};

use crate::host::{BrowserScheduler, Scheduler};
use crate::monitor::MonitorStatus;
use serde::{Deserialize, Serialize};

/// `duration_ms` value meaning "stay until the user dismisses it".
pub const PERSISTENT: u32 = 0;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationLevel {
    pub fn glyph(self) -> &'static str {
        match self {
            NotificationLevel::Info => "ℹ",
            NotificationLevel::Success => "✓",
            NotificationLevel::Warning => "⚠",
            NotificationLevel::Error => "✕",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
    pub duration_ms: u32,
}

impl Notification {
    pub fn new(message: impl Into<String>, level: NotificationLevel, duration_ms: u32) -> Self {
        Self {
            message: message.into(),
            level,
            duration_ms,
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.duration_ms == PERSISTENT
    }
}

/// Where the monitor reports to. Implementations must not call back into the monitor
/// synchronously from `notify`.
pub trait Notifier {
    fn notify(&self, message: &str, level: NotificationLevel, duration_ms: u32);

    /// Louder channel for terminal failures (a blocking dialog in the browser).
    fn escalate(&self, _message: &str, _status: &MonitorStatus) {}
}

/// `window.confirm` escalation on top of the toast queue.
#[derive(Clone)]
pub struct BrowserNotifier {
    toasts: ToastQueue,
}

impl BrowserNotifier {
    pub fn new(toasts: ToastQueue) -> Self {
        Self { toasts }
    }
}

impl Notifier for BrowserNotifier {
    fn notify(&self, message: &str, level: NotificationLevel, duration_ms: u32) {
        self.toasts.notify(message, level, duration_ms);
    }

    fn escalate(&self, message: &str, status: &MonitorStatus) {
        let prompt = format!("{message}\n\nPress OK to print details to the console.");
        let status = status.clone();

        // Let the toast paint before the dialog blocks the page.
        BrowserScheduler::new().set_timeout(
            100,
            Box::new(move || {
                let Some(win) = web_sys::window() else {
                    return;
                };
                if let Ok(true) = win.confirm_with_message(&prompt) {
                    match serde_json::to_string_pretty(&status) {
                        Ok(json) => log::info!(target: "save_monitor", "status: {json}"),
                        Err(e) => log::error!(target: "save_monitor", "status not serializable: {e}"),
                    }
                }
            }),
        );
    }
}
