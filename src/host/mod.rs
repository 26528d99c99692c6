use crate::util::now_ms;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub i32);

/// The event loop the monitor runs on: a wall clock plus one-shot timers.
///
/// Everything runs on a single thread; callbacks are queued, never run re-entrantly from
/// `set_timeout` itself.
pub trait Scheduler {
    fn now_ms(&self) -> i64;
    fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> TimerHandle;
    fn clear_timeout(&self, handle: TimerHandle);
}

type ArmedTimers = Rc<RefCell<HashMap<i32, Closure<dyn FnMut()>>>>;

/// `window.setTimeout` / `Date.now` backed scheduler.
///
/// Armed callbacks are owned here until they fire or are cleared, so a cleared timer frees
/// its closure instead of leaking it. Clones share the same set.
#[derive(Clone, Default)]
pub struct BrowserScheduler {
    armed: ArmedTimers,
}

impl BrowserScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timers armed and neither fired nor cleared yet.
    pub fn armed(&self) -> usize {
        self.armed.borrow().len()
    }
}

impl Scheduler for BrowserScheduler {
    fn now_ms(&self) -> i64 {
        now_ms()
    }

    fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> TimerHandle {
        let Some(win) = web_sys::window() else {
            log::error!(target: "save_monitor", "no window; timer not armed");
            return TimerHandle(0);
        };

        let own_id = Rc::new(Cell::new(0));
        let armed = self.armed.clone();
        let id_cell = own_id.clone();
        let cb: Closure<dyn FnMut()> = Closure::once(move || {
            // Released only after this call returns.
            let this = armed.borrow_mut().remove(&id_cell.get());
            callback();
            drop(this);
        });

        let tid = match win.set_timeout_with_callback_and_timeout_and_arguments_0(
            cb.as_ref().unchecked_ref(),
            i32::try_from(delay_ms).unwrap_or(i32::MAX),
        ) {
            Ok(tid) => tid,
            Err(_) => {
                log::error!(target: "save_monitor", "setTimeout failed; timer not armed");
                return TimerHandle(0);
            }
        };

        own_id.set(tid);
        self.armed.borrow_mut().insert(tid, cb);
        TimerHandle(tid)
    }

    fn clear_timeout(&self, handle: TimerHandle) {
        if handle.0 == 0 {
            return;
        }
        if let Some(win) = web_sys::window() {
            win.clear_timeout_with_handle(handle.0);
        }
        let cleared = self.armed.borrow_mut().remove(&handle.0);
        drop(cleared);
    }
}
