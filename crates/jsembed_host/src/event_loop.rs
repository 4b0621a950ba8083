use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Requests that a running event loop stop at its next iteration boundary.
///
/// The handle is `Send + Sync`, so a stop can come from the tick callback,
/// another thread, or a signal handler. Requests made while no loop is
/// running are discarded when the next loop starts.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    requested: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.requested.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

/// The `running` and `stop_requested` flags of the event loop driver
#[derive(Debug, Default)]
pub struct EventLoopState {
    running: bool,
    stop: StopHandle,
}

impl EventLoopState {
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.is_stop_requested()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Sets the stop flag if a loop is running, returns whether it did
    pub(crate) fn request_stop(&self) -> bool {
        if self.running {
            self.stop.stop();
        }
        self.running
    }

    pub(crate) fn begin(&mut self) {
        self.stop.requested.store(false, Ordering::Release);
        self.running = true;
    }

    /// Consumes a pending stop request
    pub(crate) fn take_stop(&self) -> bool {
        self.stop.requested.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn finish(&mut self) {
        self.stop.requested.store(false, Ordering::Release);
        self.running = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_ignored_when_not_running() {
        let state = EventLoopState::default();
        assert!(!state.request_stop());
        assert!(!state.is_stop_requested());
    }

    #[test]
    fn test_begin_discards_stale_requests() {
        let mut state = EventLoopState::default();
        state.stop_handle().stop();
        state.begin();
        assert!(state.is_running());
        assert!(!state.take_stop());
    }

    #[test]
    fn test_stop_from_another_thread() {
        let mut state = EventLoopState::default();
        state.begin();

        let handle = state.stop_handle();
        std::thread::spawn(move || handle.stop()).join().unwrap();

        assert!(state.take_stop());
        assert!(!state.take_stop(), "a request is observed once");
        state.finish();
        assert!(!state.is_running());
    }
}
