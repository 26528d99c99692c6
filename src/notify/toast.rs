use super::{NotificationLevel, Notifier};
use crate::host::Scheduler;
use icons::X;
use leptos::prelude::*;
use leptos_ui::clx;
use std::cell::Cell;
use std::rc::Rc;
use tw_merge::tw_merge;

const MAX_VISIBLE_TOASTS: usize = 5;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Toast {
    pub id: u64,
    pub message: String,
    pub level: NotificationLevel,
    pub persistent: bool,
}

/// Signal-backed toast list. Cloning shares the same list.
#[derive(Clone)]
pub struct ToastQueue {
    toasts: RwSignal<Vec<Toast>>,
    next_id: Rc<Cell<u64>>,
    scheduler: Rc<dyn Scheduler>,
}

impl ToastQueue {
    pub fn new(scheduler: Rc<dyn Scheduler>) -> Self {
        Self {
            toasts: RwSignal::new(vec![]),
            next_id: Rc::new(Cell::new(1)),
            scheduler,
        }
    }

    pub fn signal(&self) -> RwSignal<Vec<Toast>> {
        self.toasts
    }

    pub fn visible(&self) -> Vec<Toast> {
        self.toasts.get_untracked()
    }

    pub fn dismiss(&self, id: u64) {
        dismiss_in(self.toasts, id);
    }

    fn push(&self, message: &str, level: NotificationLevel, persistent: bool) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let toast = Toast {
            id,
            message: message.to_string(),
            level,
            persistent,
        };
        self.toasts.update(|v| {
            v.push(toast);
            if v.len() > MAX_VISIBLE_TOASTS {
                let overflow = v.len() - MAX_VISIBLE_TOASTS;
                v.drain(..overflow);
            }
        });
        id
    }
}

fn dismiss_in(toasts: RwSignal<Vec<Toast>>, id: u64) {
    // The host may already have unmounted the toast layer.
    let _ = toasts.try_update(|v| v.retain(|t| t.id != id));
}

impl Notifier for ToastQueue {
    fn notify(&self, message: &str, level: NotificationLevel, duration_ms: u32) {
        log::info!(target: "save_monitor", "notice [{level}] {}", message.replace('\n', " "));

        let id = self.push(message, level, duration_ms == 0);
        if duration_ms > 0 {
            let toasts = self.toasts;
            self.scheduler
                .set_timeout(duration_ms, Box::new(move || dismiss_in(toasts, id)));
        }
    }
}

mod components {
    use super::*;
    clx! {ToastStack, div, "fixed top-5 right-5 z-[100000] flex flex-col gap-2 w-[min(450px,calc(100vw-20px))] max-md:top-2.5 max-md:right-2.5 max-md:left-2.5 max-md:w-auto"}
    clx! {ToastMessage, div, "flex-1 text-sm leading-relaxed whitespace-pre-line"}
}

use components::*;

fn level_class(level: NotificationLevel) -> &'static str {
    match level {
        NotificationLevel::Info => "bg-blue-600",
        NotificationLevel::Success => "bg-green-600",
        NotificationLevel::Warning => "bg-amber-500",
        NotificationLevel::Error => "bg-red-600 border-2 border-red-400",
    }
}

#[component]
pub fn SaveToasts(toasts: RwSignal<Vec<Toast>>) -> impl IntoView {
    view! {
        <ToastStack attr:role="status" attr:aria-live="polite">
            <For
                each=move || toasts.get()
                key=|t| t.id
                children=move |t: Toast| {
                    let class = tw_merge!(
                        "flex items-start gap-3 rounded-lg px-5 py-4 text-white shadow-lg animate-in slide-in-from-right",
                        level_class(t.level)
                    );
                    let id = t.id;
                    let persistent = t.persistent;
                    view! {
                        <div class=class data-level=t.level.to_string()>
                            <div class="text-2xl font-bold shrink-0">{t.level.glyph()}</div>
                            <ToastMessage>{t.message}</ToastMessage>
                            <Show when=move || persistent>
                                <button
                                    class="shrink-0 opacity-80 hover:opacity-100 hover:cursor-pointer"
                                    attr:aria-label="Dismiss"
                                    on:click=move |_| dismiss_in(toasts, id)
                                >
                                    <X class="size-5" />
                                </button>
                            </Show>
                        </div>
                    }
                }
            />
        </ToastStack>
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use crate::host::BrowserScheduler;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_persistent_toast_stays_until_dismissed() {
        let q = ToastQueue::new(Rc::new(BrowserScheduler::new()));
        q.notify("offline", NotificationLevel::Error, 0);
        let shown = q.visible();
        assert_eq!(shown.len(), 1);
        assert!(shown[0].persistent);

        q.dismiss(shown[0].id);
        assert!(q.visible().is_empty());
    }

    #[wasm_bindgen_test]
    fn test_queue_keeps_only_latest_toasts() {
        let q = ToastQueue::new(Rc::new(BrowserScheduler::new()));
        for i in 0..8 {
            q.notify(&format!("n{i}"), NotificationLevel::Info, 0);
        }
        let shown = q.visible();
        assert_eq!(shown.len(), MAX_VISIBLE_TOASTS);
        assert_eq!(shown[0].message, "n3");
        assert_eq!(shown[4].message, "n7");
    }
}
