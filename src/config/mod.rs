use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_SAVE_TIMEOUT_MS: u32 = 10_000;

/// Successful saves at or above this latency get an advisory toast.
pub const SLOW_SAVE_THRESHOLD_MS: i64 = 3_000;

/// Failures younger than this are re-announced when the tab becomes visible again.
pub const REFOCUS_WARNING_WINDOW_MS: i64 = 5 * 60 * 1000;

/// Failures younger than this block page unload.
pub const UNLOAD_BLOCK_WINDOW_MS: i64 = 2 * 60 * 1000;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MonitorConfig {
    pub timeout_ms: u32,
    /// Escalate terminal failures to a blocking system dialog in addition to the toast.
    pub system_alerts: bool,
    /// Show a short "monitor enabled" toast on install.
    pub announce_start: bool,
    /// Backend base URL for the built-in client; the page origin when unset.
    pub api_url: Option<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_SAVE_TIMEOUT_MS,
            system_alerts: true,
            announce_start: true,
            api_url: None,
        }
    }
}

impl MonitorConfig {
    /// Reads `window.ENV`, the same runtime object the app uses for `API_URL`.
    pub fn from_env() -> Self {
        let Some(window) = web_sys::window() else {
            return Self::default();
        };
        let Some(env) = window.get("ENV") else {
            return Self::default();
        };
        if env.is_undefined() || !env.is_object() {
            return Self::default();
        }

        let parsed = js_sys::JSON::stringify(&env)
            .ok()
            .and_then(|s| s.as_string())
            .and_then(|s| serde_json::from_str::<Value>(&s).ok());

        match parsed {
            Some(v) => Self::from_env_value(&v),
            None => {
                log::warn!(target: "save_monitor", "window.ENV is not serializable; using defaults");
                Self::default()
            }
        }
    }

    /// We support BOTH upper-case keys (README style) and lower-case keys, upper-case first.
    pub fn from_env_value(env: &Value) -> Self {
        let mut config = Self::default();

        if let Some(ms) = lookup(env, "SAVE_TIMEOUT_MS", "save_timeout_ms").and_then(as_u32) {
            if ms == 0 {
                log::warn!(target: "save_monitor", "ignoring SAVE_TIMEOUT_MS=0");
            } else {
                config.timeout_ms = ms;
            }
        }

        if let Some(b) = lookup(env, "SAVE_MONITOR_SYSTEM_ALERTS", "save_monitor_system_alerts")
            .and_then(as_bool)
        {
            config.system_alerts = b;
        }

        if let Some(b) =
            lookup(env, "SAVE_MONITOR_ANNOUNCE", "save_monitor_announce").and_then(as_bool)
        {
            config.announce_start = b;
        }

        if let Some(url) = lookup(env, "API_URL", "api_url").and_then(|v| v.as_str()) {
            if !url.trim().is_empty() {
                config.api_url = Some(url.trim().to_string());
            }
        }

        config
    }
}

fn lookup<'a>(env: &'a Value, upper: &str, lower: &str) -> Option<&'a Value> {
    env.get(upper).or_else(|| env.get(lower))
}

fn as_u32(v: &Value) -> Option<u32> {
    match v {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

fn as_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
