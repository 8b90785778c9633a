use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::types::RunState;

/// What a blocked worker observed when the gate released it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    Runnable,
    Stopped,
}

struct Inner {
    state: RunState,
    /// Active "pause regular targets" holds from executing sequences.
    holds: u32,
}

/// Shared running/paused/stopped signal every worker obeys.
///
/// Pause blocks workers at their next wait point without dropping anything
/// in flight; stop is terminal for the session and wakes every waiter and
/// sleeper promptly. A fresh session reuses the gate via `start`.
pub struct RunGate {
    inner: Mutex<Inner>,
    cond: Condvar,
}

impl RunGate {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: RunState::Stopped,
                holds: 0,
            }),
            cond: Condvar::new(),
        }
    }

    pub fn state(&self) -> RunState {
        self.inner.lock().unwrap().state
    }

    /// `STOPPED -> RUNNING`. Returns false if a session is already active.
    pub fn start(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.state != RunState::Stopped {
            return false;
        }
        inner.state = RunState::Running;
        inner.holds = 0;
        self.cond.notify_all();
        true
    }

    /// `RUNNING <-> PAUSED`. Returns the new state, or None when stopped.
    pub fn toggle_pause(&self) -> Option<RunState> {
        let mut inner = self.inner.lock().unwrap();
        inner.state = match inner.state {
            RunState::Running => RunState::Paused,
            RunState::Paused => RunState::Running,
            RunState::Stopped => return None,
        };
        self.cond.notify_all();
        Some(inner.state)
    }

    /// Transition to `STOPPED` and wake everyone. Returns true only for the
    /// caller that actually performed the transition, so concurrent
    /// limit-triggered stops collapse to one.
    pub fn stop(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == RunState::Stopped {
            return false;
        }
        inner.state = RunState::Stopped;
        self.cond.notify_all();
        true
    }

    /// Block until the gate is `RUNNING` with no target holds, or stopped.
    /// Target workers call this before every click.
    pub fn wait_runnable(&self) -> GateStatus {
        let mut inner = self.inner.lock().unwrap();
        loop {
            match inner.state {
                RunState::Stopped => return GateStatus::Stopped,
                RunState::Running if inner.holds == 0 => return GateStatus::Runnable,
                _ => inner = self.cond.wait(inner).unwrap(),
            }
        }
    }

    /// Like `wait_runnable` but ignores target holds. Sequence steps use
    /// this so a hold a sequence itself placed cannot deadlock it.
    pub fn wait_runnable_ignoring_holds(&self) -> GateStatus {
        let mut inner = self.inner.lock().unwrap();
        loop {
            match inner.state {
                RunState::Stopped => return GateStatus::Stopped,
                RunState::Running => return GateStatus::Runnable,
                RunState::Paused => inner = self.cond.wait(inner).unwrap(),
            }
        }
    }

    /// Sleep for `dur`, waking early when the gate stops. Returns true if
    /// the full duration elapsed, false if the gate was stopped. Pause does
    /// not interrupt a sleep already in progress.
    pub fn sleep_interruptible(&self, dur: Duration) -> bool {
        let deadline = Instant::now() + dur;
        let mut inner = self.inner.lock().unwrap();
        loop {
            if inner.state == RunState::Stopped {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            let (guard, _) = self.cond.wait_timeout(inner, deadline - now).unwrap();
            inner = guard;
        }
    }

    /// Suspend regular target workers until the guard drops. Holds nest:
    /// workers resume once every guard is gone.
    pub fn hold_targets(&self) -> HoldGuard<'_> {
        let mut inner = self.inner.lock().unwrap();
        inner.holds += 1;
        HoldGuard { gate: self }
    }
}

impl Default for RunGate {
    fn default() -> Self {
        Self::new()
    }
}

pub struct HoldGuard<'a> {
    gate: &'a RunGate,
}

impl Drop for HoldGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.gate.inner.lock().unwrap();
        inner.holds = inner.holds.saturating_sub(1);
        if inner.holds == 0 {
            self.gate.cond.notify_all();
        }
    }
}
