use crate::error::TimerError;
use deno_core::CancelHandle;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

/// Longest delay a timer accepts, larger values are clamped
pub const MAX_TIMER_DELAY_MS: f64 = 2_147_483_647.0;

/// Largest timer id; ids travel through ops as small integers
pub const MAX_TIMER_ID: u32 = 0x3fff_ffff;

/// Pending timers of one engine, keyed by the id handed out by [`TimerTable::next_id`].
///
/// Closing the table makes every later registration fail, which lets the
/// event loop drain during shutdown even when scripts keep re-arming
/// intervals.
pub struct TimerTable {
    pending: HashMap<u32, Rc<CancelHandle>>,
    last_id: u32,
    closed: bool,
}

impl Default for TimerTable {
    fn default() -> Self {
        Self::starting_after(0)
    }
}

impl TimerTable {
    pub(crate) fn starting_after(last_id: u32) -> Self {
        Self {
            pending: HashMap::new(),
            last_id,
            closed: false,
        }
    }

    /// Next free id, wrapping to 1 after [`MAX_TIMER_ID`] and skipping pending ids
    pub fn next_id(&mut self) -> u32 {
        loop {
            self.last_id = if self.last_id >= MAX_TIMER_ID {
                1
            } else {
                self.last_id + 1
            };
            if !self.pending.contains_key(&self.last_id) {
                return self.last_id;
            }
        }
    }

    pub(crate) fn insert(&mut self, id: u32) -> Result<Rc<CancelHandle>, TimerError> {
        if self.closed {
            return Err(TimerError::Closed);
        }
        if self.pending.contains_key(&id) {
            return Err(TimerError::Duplicate(id));
        }
        let handle = CancelHandle::new_rc();
        self.pending.insert(id, handle.clone());
        Ok(handle)
    }

    pub(crate) fn remove(&mut self, id: u32) {
        self.pending.remove(&id);
    }

    /// Cancels a pending timer, returns false if it was not pending
    pub fn cancel(&mut self, id: u32) -> bool {
        match self.pending.remove(&id) {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Refuses new timers from now on, pending ones still fire
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Converts a script supplied delay to a duration, treating anything that is
/// not a finite non-negative number as zero
pub(crate) fn timer_delay(millis: f64) -> Duration {
    if millis.is_finite() && millis > 0.0 {
        Duration::from_secs_f64(millis.min(MAX_TIMER_DELAY_MS) / 1000.0)
    } else {
        Duration::ZERO
    }
}
