use crate::api::ApiClient;
use crate::config::MonitorConfig;
use crate::host::{BrowserScheduler, Scheduler};
use crate::monitor::SaveMonitor;
use crate::notify::{BrowserNotifier, SaveToasts, ToastQueue};
use leptos::prelude::*;
use std::rc::Rc;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::wasm_bindgen;
use wasm_bindgen::{JsCast, JsValue};

/// Property the debug handle is published under on `window`.
pub const WINDOW_HANDLE_KEY: &str = "hulunoteSaveMonitor";

/// Wires a monitor into the current page: toast layer, connectivity / visibility / unload
/// listeners, and the `window.hulunoteSaveMonitor` debug handle.
pub fn install(config: MonitorConfig) -> SaveMonitor {
    let scheduler: Rc<dyn Scheduler> = Rc::new(BrowserScheduler::new());

    let toasts = ToastQueue::new(scheduler.clone());
    let signal = toasts.signal();
    mount_to_body(move || view! { <SaveToasts toasts=signal /> });

    let notifier = Rc::new(BrowserNotifier::new(toasts));
    let monitor = SaveMonitor::new(config.clone(), scheduler, notifier);

    if let Some(win) = web_sys::window() {
        monitor.set_initial_online(win.navigator().on_line());
    }

    start_global_listeners(&monitor);

    let client = ApiClient::new(resolve_api_url(&config))
        .with_stored_token()
        .with_monitor(monitor.clone());
    publish_handle(SaveMonitorHandle {
        monitor: monitor.clone(),
        client,
    });

    log::info!(target: "save_monitor", "monitor started");
    if config.announce_start {
        monitor.announce_start();
    }

    monitor
}

fn resolve_api_url(config: &MonitorConfig) -> String {
    if let Some(url) = &config.api_url {
        return url.clone();
    }
    web_sys::window()
        .and_then(|w| w.location().origin().ok())
        .unwrap_or_default()
}

fn listen(target: &web_sys::EventTarget, event: &str, handler: impl FnMut(web_sys::Event) + 'static) {
    let cb = Closure::wrap(Box::new(handler) as Box<dyn FnMut(web_sys::Event)>);
    if target
        .add_event_listener_with_callback(event, cb.as_ref().unchecked_ref())
        .is_err()
    {
        log::error!(target: "save_monitor", "could not listen for {event}");
    }

    // Listeners live for the page lifetime.
    cb.forget();
}

fn start_global_listeners(monitor: &SaveMonitor) {
    let Some(win) = web_sys::window() else {
        log::error!(target: "save_monitor", "no window; listeners not installed");
        return;
    };

    let m = monitor.clone();
    listen(&win, "online", move |_| m.set_online(true));

    let m = monitor.clone();
    listen(&win, "offline", move |_| m.set_online(false));

    let m = monitor.clone();
    listen(&win, "beforeunload", move |ev| {
        if let Err(blocked) = m.check_unload() {
            log::warn!(target: "save_monitor", "blocking unload: {blocked}");
            ev.prevent_default();
            if let Some(ev) = ev.dyn_ref::<web_sys::BeforeUnloadEvent>() {
                ev.set_return_value(blocked.prompt());
            }
        }
    });

    if let Some(doc) = win.document() {
        let m = monitor.clone();
        let doc2 = doc.clone();
        listen(&doc, "visibilitychange", move |_| {
            if !doc2.hidden() {
                m.on_visibility_restored();
            }
        });
    }
}

fn publish_handle(handle: SaveMonitorHandle) {
    let Some(win) = web_sys::window() else {
        return;
    };
    if js_sys::Reflect::set(&win, &WINDOW_HANDLE_KEY.into(), &JsValue::from(handle)).is_err() {
        log::warn!(target: "save_monitor", "could not publish window.{WINDOW_HANDLE_KEY}");
    }
}

fn to_js<T: serde::Serialize>(value: &T) -> JsValue {
    serde_json::to_string(value)
        .ok()
        .and_then(|s| js_sys::JSON::parse(&s).ok())
        .unwrap_or(JsValue::NULL)
}

/// Console-facing handle, e.g. `window.hulunoteSaveMonitor.status()`.
#[wasm_bindgen]
pub struct SaveMonitorHandle {
    monitor: SaveMonitor,
    client: ApiClient,
}

#[wasm_bindgen]
impl SaveMonitorHandle {
    pub fn status(&self) -> JsValue {
        match self.monitor.status() {
            Some(s) => to_js(&s),
            None => JsValue::NULL,
        }
    }

    #[wasm_bindgen(js_name = setTimeout)]
    pub fn set_timeout(&self, ms: u32) {
        self.monitor.set_timeout_ms(ms);
    }

    #[wasm_bindgen(js_name = resetFailureCount)]
    pub fn reset_failure_count(&self) {
        self.monitor.reset_failures();
    }

    #[wasm_bindgen(js_name = recentOutcomes)]
    pub fn recent_outcomes(&self) -> JsValue {
        to_js(&self.monitor.recent_outcomes())
    }

    /// Monitored `PUT api/notes/{id}/data`; resolves with the response body.
    #[wasm_bindgen(js_name = saveNote)]
    pub fn save_note(&self, note_id: String, content: String) -> js_sys::Promise {
        // The host may log in or out at any time; read the token per save.
        let client = self.client.clone().with_stored_token();
        wasm_bindgen_futures::future_to_promise(async move {
            client
                .save_note_data(&note_id, &content)
                .await
                .map(JsValue::from)
                .map_err(|e| JsValue::from_str(&e.message))
        })
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_install_publishes_handle() {
        let monitor = install(MonitorConfig {
            announce_start: false,
            system_alerts: false,
            ..MonitorConfig::default()
        });

        let win = web_sys::window().expect("window");
        let handle = js_sys::Reflect::get(&win, &WINDOW_HANDLE_KEY.into()).expect("handle");
        assert!(handle.is_object());

        let status = monitor.status().expect("status");
        assert_eq!(status.pending_save_count, 0);
        assert_eq!(status.failure_count, 0);
    }

    #[wasm_bindgen_test]
    fn test_unload_allowed_when_idle() {
        let monitor = install(MonitorConfig {
            announce_start: false,
            system_alerts: false,
            ..MonitorConfig::default()
        });
        assert!(monitor.check_unload().is_ok());
    }
}
