mod api;
mod browser;
mod config;
mod host;
mod monitor;
mod notify;
mod util;

#[cfg(test)]
mod test_support;

pub use api::{
    ApiClient, ApiError, ApiErrorKind, OnError, OnSuccess, SaveRequest, Transport, TransportError,
};
pub use browser::{install, SaveMonitorHandle, WINDOW_HANDLE_KEY};
pub use config::{
    MonitorConfig, DEFAULT_SAVE_TIMEOUT_MS, REFOCUS_WARNING_WINDOW_MS, SLOW_SAVE_THRESHOLD_MS,
    UNLOAD_BLOCK_WINDOW_MS,
};
pub use host::{BrowserScheduler, Scheduler, TimerHandle};
pub use monitor::{
    ExceptionKind, FailureState, MonitorStatus, MonitoredTransport, NoteDataSaves, PendingSave,
    SaveFailure, SaveId, SaveMatcher, SaveMonitor, SaveOutcome, SaveRecord, SaveTicket,
    UnloadBlocked,
};
pub use notify::{BrowserNotifier, Notification, NotificationLevel, Notifier, PERSISTENT};

// Needed for `#[wasm_bindgen(start)]` on the wasm entrypoint.
#[cfg(all(target_arch = "wasm32", not(test)))]
use wasm_bindgen::prelude::wasm_bindgen;

// Only register the WASM start function for normal builds (not for tests),
// otherwise wasm-bindgen-test will end up with multiple entry symbols.
#[cfg_attr(all(target_arch = "wasm32", not(test)), wasm_bindgen(start))]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
    install(MonitorConfig::from_env());
}

// WASM-only tests (run with `cargo test --target wasm32-unknown-unknown` + wasm-bindgen-test-runner)
#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_config_from_env_reads_window_env() {
        let win = web_sys::window().expect("window");
        let env = js_sys::JSON::parse(r#"{"SAVE_TIMEOUT_MS": 2500, "API_URL": "http://x"}"#)
            .expect("valid json");
        js_sys::Reflect::set(&win, &"ENV".into(), &env).expect("set ENV");

        let config = MonitorConfig::from_env();
        assert_eq!(config.timeout_ms, 2_500);
        assert_eq!(config.api_url.as_deref(), Some("http://x"));

        js_sys::Reflect::delete_property(&win, &"ENV".into()).expect("unset ENV");
        assert_eq!(MonitorConfig::from_env(), MonitorConfig::default());
    }
}
