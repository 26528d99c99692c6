use super::SaveMonitor;
use crate::api::{OnError, OnSuccess, SaveRequest, Transport};
use std::cell::Cell;
use std::rc::Rc;

/// Transport decorator: non-saves are forwarded as-is; saves are tracked, and the
/// caller's own callback always runs after the monitor has settled the save.
pub struct MonitoredTransport<T> {
    inner: T,
    monitor: SaveMonitor,
}

impl<T> MonitoredTransport<T> {
    pub fn new(inner: T, monitor: SaveMonitor) -> Self {
        Self { inner, monitor }
    }

    pub fn monitor(&self) -> &SaveMonitor {
        &self.monitor
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: Transport> Transport for MonitoredTransport<T> {
    fn send(&self, request: SaveRequest, on_success: OnSuccess, on_error: OnError) {
        let Some(ticket) = self.monitor.begin(&request) else {
            return self.inner.send(request, on_success, on_error);
        };

        // Shared between both callbacks; whichever runs takes it.
        let ticket = Rc::new(Cell::new(Some(ticket)));
        let ticket_err = ticket.clone();

        self.inner.send(
            request,
            Box::new(move |data| {
                if let Some(t) = ticket.take() {
                    t.succeed();
                }
                on_success(data);
            }),
            Box::new(move |err| {
                if let Some(t) = ticket_err.take() {
                    t.fail(&err);
                }
                on_error(err);
            }),
        );
    }
}
