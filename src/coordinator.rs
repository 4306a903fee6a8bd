//! The pause/resume handshake between the driver/frontend and the
//! backend worker thread (§4.7, §5). Built on `parking_lot::{Mutex,
//! Condvar}` rather than `std::sync` — drawn from the sibling pack
//! crate `horus`, which reaches for `parking_lot` for exactly this kind
//! of hot shared-state lock (the teacher itself is single-threaded and
//! has no opinion here).

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// The backend worker's run state. Transitions only ever go
/// `Running -> ToPause -> Pausing -> Running` (§4.7's invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    ToPause,
    Pausing,
}

struct Shared {
    state: Mutex<RunState>,
    /// Signaled whenever the frontend wants the backend to look at the
    /// map again. Multiple notifications coalesce into one wakeup
    /// (§4.7's invariant) because the backend only ever checks "is there
    /// unfinished work" on wakeup, not "how many times was I notified".
    map_update: Condvar,
    /// Signaled by the backend once it has entered `Pausing`.
    pausing: Condvar,
    /// Signaled by `resume` to wake a backend parked in `Pausing`.
    running: Condvar,
}

/// Shared handle to the pause/resume protocol; cheaply cloned (an
/// `Arc` internally) so the driver and the backend worker thread each
/// hold their own copy.
#[derive(Clone)]
pub struct Coordinator {
    shared: std::sync::Arc<Shared>,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Coordinator {
    pub fn new() -> Self {
        Self {
            shared: std::sync::Arc::new(Shared {
                state: Mutex::new(RunState::Running),
                map_update: Condvar::new(),
                pausing: Condvar::new(),
                running: Condvar::new(),
            }),
        }
    }

    /// Non-blocking: signal the backend that the map changed.
    pub fn update_map(&self) {
        self.shared.map_update.notify_all();
    }

    /// Blocks the caller until the backend worker has entered `Pausing`.
    /// A no-op if the backend isn't `Running`.
    pub fn pause(&self) {
        let mut state = self.shared.state.lock();
        if *state != RunState::Running {
            return;
        }
        *state = RunState::ToPause;
        while *state != RunState::Pausing {
            self.shared.pausing.wait(&mut state);
        }
    }

    /// Resumes a paused backend. A no-op if it isn't `Pausing`.
    pub fn resume(&self) {
        let mut state = self.shared.state.lock();
        if *state != RunState::Pausing {
            return;
        }
        *state = RunState::Running;
        self.shared.running.notify_all();
    }

    /// Called by the backend worker at the top of each loop iteration
    /// (§4.6 step 1): honors a pending pause request by entering
    /// `Pausing` and blocking until `resume` is called, then returns.
    pub fn honor_pause_request(&self) {
        let mut state = self.shared.state.lock();
        if *state != RunState::ToPause {
            return;
        }
        *state = RunState::Pausing;
        self.shared.pausing.notify_all();
        while *state != RunState::Running {
            self.shared.running.wait(&mut state);
        }
    }

    /// Blocks the backend worker until `update_map` is signaled or
    /// `timeout` elapses, returning without distinguishing which (the
    /// caller re-checks map state either way).
    pub fn wait_for_map_update(&self, timeout: Duration) {
        let mut state = self.shared.state.lock();
        self.shared.map_update.wait_for(&mut state, timeout);
    }

    pub fn state(&self) -> RunState {
        *self.shared.state.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn pause_returns_only_after_worker_reaches_pausing() {
        let coord = Coordinator::new();
        let worker_coord = coord.clone();
        let reached_pausing = Arc::new(AtomicBool::new(false));
        let reached_pausing_worker = reached_pausing.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            worker_coord.honor_pause_request();
            reached_pausing_worker.store(true, Ordering::SeqCst);
        });

        coord.pause();
        assert_eq!(coord.state(), RunState::Pausing);
        coord.resume();
        handle.join().unwrap();
        assert!(reached_pausing.load(Ordering::SeqCst));
    }

    #[test]
    fn update_map_does_not_block() {
        let coord = Coordinator::new();
        coord.update_map();
        coord.update_map();
    }
}
