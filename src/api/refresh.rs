//! Single-flight guard for access-token refresh.
//!
//! When several requests hit 401 at once, exactly one of them (the leader)
//! performs the refresh. The rest park on a FIFO wait-list and are released
//! with the leader's outcome, success or failure, once it settles.

use std::future::Future;
use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::error::AuthError;

type Outcome = Result<String, AuthError>;

#[derive(Default)]
struct GateState {
    in_flight: bool,
    waiters: Vec<oneshot::Sender<Outcome>>,
}

/// Coalesces concurrent refresh attempts into one network call.
#[derive(Default)]
pub struct RefreshGate {
    state: Mutex<GateState>,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `refresh` unless one is already in flight, in which case wait for
    /// that one and return its outcome.
    pub async fn run<F, Fut>(&self, refresh: F) -> Outcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome>,
    {
        let waiter = {
            let mut state = self.lock();
            if state.in_flight {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                Some(rx)
            } else {
                state.in_flight = true;
                None
            }
        };

        if let Some(rx) = waiter {
            log::debug!("Refresh already in flight, waiting");
            // Sender dropped without a value only if the leader vanished
            // between settle and send, which the guard rules out.
            return rx.await.unwrap_or(Err(AuthError::Interrupted));
        }

        let mut flight = Flight {
            gate: self,
            settled: false,
        };
        let outcome = refresh().await;
        flight.settle(outcome.clone());
        outcome
    }

    /// Number of callers currently parked behind the leader.
    pub fn waiting(&self) -> usize {
        self.lock().waiters.len()
    }

    pub fn in_flight(&self) -> bool {
        self.lock().in_flight
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn drain(&self, outcome: Outcome) {
        let waiters = {
            let mut state = self.lock();
            state.in_flight = false;
            std::mem::take(&mut state.waiters)
        };
        if !waiters.is_empty() {
            log::debug!("Releasing {} queued request(s) after refresh", waiters.len());
        }
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }
}

/// Leader's claim on the gate. If the leader future is dropped before the
/// refresh settles, waiters are rejected instead of hanging forever.
struct Flight<'a> {
    gate: &'a RefreshGate,
    settled: bool,
}

impl Flight<'_> {
    fn settle(&mut self, outcome: Outcome) {
        self.settled = true;
        self.gate.drain(outcome);
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            log::warn!("Refresh abandoned before settling, rejecting waiters");
            self.gate.drain(Err(AuthError::Interrupted));
        }
    }
}
