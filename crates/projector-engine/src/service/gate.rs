use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::{OverlayError, Result};

#[derive(Debug)]
struct GateState {
    accepting: bool,
    in_flight: usize,
}

/// Admission control for mutation requests.
///
/// Teardown closes the gate first, then waits for requests already inside to
/// finish; nothing touches the scene after [`drain`](Self::drain) returns true.
#[derive(Debug)]
pub struct RequestGate {
    state: Mutex<GateState>,
    idle: Condvar,
}

impl Default for RequestGate {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState { accepting: true, in_flight: 0 }),
            idle: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().expect("request gate lock poisoned")
    }

    /// Admits one request, or fails with `ShuttingDown` once the gate closed.
    pub fn enter(&self) -> Result<RequestGuard<'_>> {
        let mut state = self.lock();
        if !state.accepting {
            return Err(OverlayError::ShuttingDown);
        }
        state.in_flight += 1;
        Ok(RequestGuard { gate: self })
    }

    pub fn stop_accepting(&self) {
        let mut state = self.lock();
        if state.accepting {
            state.accepting = false;
            log::info!("request gate closed with {} requests in flight", state.in_flight);
        }
    }

    pub fn is_accepting(&self) -> bool {
        self.lock().accepting
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Waits up to `timeout` for in-flight requests to finish. Returns false
    /// if some were still running when time ran out.
    pub fn drain(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        while state.in_flight > 0 {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                log::warn!("drain timed out with {} requests in flight", state.in_flight);
                return false;
            }
            state = self
                .idle
                .wait_timeout(state, left)
                .expect("request gate lock poisoned")
                .0;
        }
        true
    }
}

/// Marks one admitted request; leaving scope releases it.
#[derive(Debug)]
pub struct RequestGuard<'a> {
    gate: &'a RequestGate,
}

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.gate.lock();
        state.in_flight -= 1;
        if state.in_flight == 0 {
            self.gate.idle.notify_all();
        }
    }
}
