use crate::api::TransportError;
use serde::{Deserialize, Serialize};

/// Best-effort reading of a failure that came without an HTTP status.
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
pub enum ExceptionKind {
    Network,
    Timeout,
    Abort,
    Unknown,
}

/// Checked in order: network, timeout, abort.
pub fn classify_exception(message: &str) -> ExceptionKind {
    let msg = message.to_lowercase();

    if msg.contains("failed to fetch") || msg.contains("network") || msg.contains("networkerror")
    {
        return ExceptionKind::Network;
    }
    if msg.contains("timeout") || msg.contains("timed out") {
        return ExceptionKind::Timeout;
    }
    if msg.contains("abort") {
        return ExceptionKind::Abort;
    }
    ExceptionKind::Unknown
}

#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SaveFailure {
    #[error("HTTP {status}: {status_text}")]
    Http { status: u16, status_text: String },

    #[error("network failure ({cause}): {detail}")]
    Network { cause: ExceptionKind, detail: String },

    #[error("no response within {timeout_ms} ms")]
    Timeout { timeout_ms: u32 },
}

impl SaveFailure {
    pub fn from_transport(e: &TransportError) -> Self {
        match e.http_status() {
            Some(status) => SaveFailure::Http {
                status,
                status_text: if e.status_text.is_empty() {
                    e.message.clone()
                } else {
                    e.status_text.clone()
                },
            },
            None => SaveFailure::Network {
                cause: classify_exception(&e.message),
                detail: e.message.clone(),
            },
        }
    }

    /// Toast / dialog text.
    pub fn user_message(&self) -> String {
        match self {
            SaveFailure::Http {
                status,
                status_text,
            } => {
                let mut message = format!("❌ Note save failed!\n\nHTTP {status}: {status_text}");
                match *status {
                    401 | 403 => message.push_str(
                        "\n\nLikely cause: your session has expired, please reload the page",
                    ),
                    413 => message.push_str("\n\nLikely cause: the content is too large"),
                    s if s >= 500 => message.push_str("\n\nLikely cause: server error"),
                    _ => {}
                }
                message
            }
            SaveFailure::Network { cause, detail } => {
                let mut message = "❌ Note save failed!\n\n".to_string();
                match cause {
                    ExceptionKind::Network => {
                        message.push_str("Network connection failed\nPlease check your connection")
                    }
                    ExceptionKind::Timeout => {
                        message.push_str("The save timed out\nThe network is responding too slowly")
                    }
                    ExceptionKind::Abort => {
                        message.push_str("The save was interrupted\nPossibly a network problem")
                    }
                    ExceptionKind::Unknown => message.push_str(&format!("Error: {detail}")),
                }
                message.push_str("\n\nMake sure your content is saved before closing the page!");
                message
            }
            SaveFailure::Timeout { timeout_ms } => format!(
                "⏱️ Note save timed out!\n\nThe save has been running for more than {} seconds\nThe network may be having problems\n\nPlease check your connection!",
                *timeout_ms as f64 / 1000.0
            ),
        }
    }
}

/// Terminal result of one tracked save.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SaveOutcome {
    Success,
    /// Succeeded, but slower than the advisory threshold.
    SlowSuccess,
    Failed { failure: SaveFailure },
    /// The caller stopped waiting before a response arrived; neither success nor failure.
    Abandoned,
}

impl SaveOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, SaveOutcome::Failed { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRecord {
    pub id: String,
    pub target_id: String,
    pub outcome: SaveOutcome,
    pub duration_ms: i64,
}

#[derive(thiserror::Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnloadBlocked {
    #[error("{0} save(s) still in flight")]
    PendingSaves(usize),

    #[error("a save failed recently")]
    RecentFailure,
}

impl UnloadBlocked {
    /// Text for the browser's leave-page prompt.
    pub fn prompt(&self) -> &'static str {
        match self {
            UnloadBlocked::PendingSaves(_) => "A note is still being saved. Leave anyway?",
            UnloadBlocked::RecentFailure => {
                "A save failed recently and your content may not be saved. Leave anyway?"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_exception_priority() {
        assert_eq!(classify_exception("Failed to fetch"), ExceptionKind::Network);
        assert_eq!(classify_exception("NetworkError when attempting"), ExceptionKind::Network);
        // network wins over timeout
        assert_eq!(classify_exception("network timeout"), ExceptionKind::Network);
        assert_eq!(classify_exception("operation timed out"), ExceptionKind::Timeout);
        assert_eq!(classify_exception("Request TIMEOUT"), ExceptionKind::Timeout);
        // timeout wins over abort
        assert_eq!(classify_exception("aborted after timeout"), ExceptionKind::Timeout);
        assert_eq!(classify_exception("The user aborted a request"), ExceptionKind::Abort);
        assert_eq!(classify_exception("boom"), ExceptionKind::Unknown);
        assert_eq!(classify_exception(""), ExceptionKind::Unknown);
    }

    #[test]
    fn test_failure_from_transport_without_status_is_network() {
        let f = SaveFailure::from_transport(&TransportError::network("Failed to fetch"));
        assert_eq!(
            f,
            SaveFailure::Network {
                cause: ExceptionKind::Network,
                detail: "Failed to fetch".to_string()
            }
        );

        let zero = TransportError {
            status: Some(0),
            status_text: String::new(),
            message: "request aborted".to_string(),
        };
        assert!(matches!(
            SaveFailure::from_transport(&zero),
            SaveFailure::Network {
                cause: ExceptionKind::Abort,
                ..
            }
        ));
    }

    #[test]
    fn test_failure_from_transport_with_status_is_http() {
        let f = SaveFailure::from_transport(&TransportError::http(503, "Service Unavailable"));
        assert_eq!(
            f,
            SaveFailure::Http {
                status: 503,
                status_text: "Service Unavailable".to_string()
            }
        );
        assert_eq!(f.to_string(), "HTTP 503: Service Unavailable");
    }

    #[test]
    fn test_http_messages_carry_status_hints() {
        let msg = |status: u16| {
            SaveFailure::Http {
                status,
                status_text: "x".to_string(),
            }
            .user_message()
        };

        assert!(msg(401).contains("session has expired"));
        assert!(msg(403).contains("session has expired"));
        assert!(msg(413).contains("too large"));
        assert!(msg(500).contains("server error"));
        assert!(msg(502).contains("server error"));

        let generic = msg(404);
        assert!(generic.contains("HTTP 404: x"));
        assert!(!generic.contains("Likely cause"));
    }

    #[test]
    fn test_network_messages_by_cause() {
        let msg = |cause| {
            SaveFailure::Network {
                cause,
                detail: "socket hang up".to_string(),
            }
            .user_message()
        };
        assert!(msg(ExceptionKind::Network).contains("Network connection failed"));
        assert!(msg(ExceptionKind::Timeout).contains("timed out"));
        assert!(msg(ExceptionKind::Abort).contains("interrupted"));
        assert!(msg(ExceptionKind::Unknown).contains("Error: socket hang up"));
        assert!(msg(ExceptionKind::Unknown).ends_with("before closing the page!"));
    }

    #[test]
    fn test_timeout_message_uses_seconds() {
        let m = SaveFailure::Timeout { timeout_ms: 10_000 }.user_message();
        assert!(m.contains("more than 10 seconds"));
        let m = SaveFailure::Timeout { timeout_ms: 2_500 }.user_message();
        assert!(m.contains("more than 2.5 seconds"));
    }

    #[test]
    fn test_record_serializes_with_tags() {
        let r = SaveRecord {
            id: "n1-0-1".to_string(),
            target_id: "n1".to_string(),
            outcome: SaveOutcome::Failed {
                failure: SaveFailure::Timeout { timeout_ms: 10_000 },
            },
            duration_ms: 10_000,
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["outcome"]["outcome"], "failed");
        assert_eq!(v["outcome"]["failure"]["kind"], "timeout");
        assert_eq!(v["outcome"]["failure"]["timeout_ms"], 10_000);
    }
}
