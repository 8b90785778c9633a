use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{bail, Result};

use crate::gate::RunGate;
use crate::injector::Injector;
use crate::logger;
use crate::sequence;
use crate::session::{RunContext, Stats};
use crate::settings::Profile;
use crate::types::{RunState, TriggerSource};
use crate::worker;

/// How long `stop` waits for spawned workers before declaring a defect.
pub const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct RunHandles {
    ctx: Option<Arc<RunContext>>,
    threads: Vec<JoinHandle<()>>,
}

/// Owns the run gate, the counters, and the start/pause/stop lifecycle.
/// Exactly one session is active at a time; all workers spawned for it are
/// joined on stop. Structural edits to the profile are only accepted while
/// stopped; counters may be reset at any time.
pub struct Supervisor {
    gate: Arc<RunGate>,
    injector: Arc<dyn Injector>,
    profile: Mutex<Profile>,
    stats: Mutex<Arc<Stats>>,
    run: Mutex<RunHandles>,
}

impl Supervisor {
    pub fn new(profile: Profile, injector: Arc<dyn Injector>) -> Result<Self> {
        profile.validate()?;
        logger::register_prefix("session", logger::COLOR_GRAY);
        logger::register_prefix("worker", logger::COLOR_BLUE);
        logger::register_prefix("seq", logger::COLOR_GREEN);
        let stats = Arc::new(Stats::for_profile(&profile));
        Ok(Self {
            gate: Arc::new(RunGate::new()),
            injector,
            profile: Mutex::new(profile),
            stats: Mutex::new(stats),
            run: Mutex::new(RunHandles::default()),
        })
    }

    pub fn state(&self) -> RunState {
        self.gate.state()
    }

    pub fn stats(&self) -> Arc<Stats> {
        self.stats.lock().unwrap().clone()
    }

    pub fn profile(&self) -> Profile {
        self.profile.lock().unwrap().clone()
    }

    /// Elapsed time of the active session, None when fully stopped.
    pub fn elapsed(&self) -> Option<Duration> {
        self.run.lock().unwrap().ctx.as_ref().map(|c| c.elapsed())
    }

    /// Start a session: one worker per enabled target with a positive
    /// interval, one scheduler per automatic sequence.
    pub fn start(&self) -> Result<()> {
        let mut run = self.run.lock().unwrap();
        if self.gate.state() != RunState::Stopped {
            bail!("a session is already active");
        }
        // Reap anything left from a limit-triggered stop.
        self.teardown(&mut run).ok();

        let profile = self.profile.lock().unwrap().clone();
        profile.validate()?;
        if !profile.targets.iter().any(|t| t.enabled) {
            bail!("no enabled targets configured");
        }

        let stats = self.stats.lock().unwrap().clone();
        self.gate.start();
        let ctx = Arc::new(RunContext {
            gate: self.gate.clone(),
            stats,
            injector: self.injector.clone(),
            targets: profile.targets.clone(),
            sequences: profile.sequences.clone(),
            jitter: profile.jitter,
            limits: profile.limits,
            started: Instant::now(),
        });

        let mut threads = Vec::new();
        let mut workers = 0;
        for (i, t) in ctx.targets.iter().enumerate() {
            if t.has_worker() {
                let ctx = ctx.clone();
                threads.push(thread::spawn(move || worker::run(ctx, i)));
                workers += 1;
            }
        }
        let mut schedulers = 0;
        for (i, s) in ctx.sequences.iter().enumerate() {
            if s.has_scheduler() {
                let ctx = ctx.clone();
                threads.push(thread::spawn(move || sequence::run_scheduler(ctx, i)));
                schedulers += 1;
            }
        }

        logger::info_p(
            "session",
            &format!("started: {} worker(s), {} scheduler(s)", workers, schedulers),
        );
        run.ctx = Some(ctx);
        run.threads = threads;
        Ok(())
    }

    /// `RUNNING <-> PAUSED`. Counters and timers are untouched.
    pub fn toggle_pause(&self) -> Result<RunState> {
        match self.gate.toggle_pause() {
            Some(state) => {
                logger::info_p(
                    "session",
                    if state == RunState::Paused { "paused" } else { "resumed" },
                );
                Ok(state)
            }
            None => bail!("no session is running"),
        }
    }

    /// Stop the session and join every spawned worker. A worker that does
    /// not exit within `STOP_JOIN_TIMEOUT` is surfaced as an error; it
    /// means one of its wait points stopped being interruptible.
    pub fn stop(&self) -> Result<()> {
        let mut run = self.run.lock().unwrap();
        self.gate.stop();
        self.teardown(&mut run)
    }

    /// Completes teardown after the gate stopped on its own (limit hit).
    /// Called periodically by the control surface.
    pub fn reap_if_stopped(&self) {
        if self.gate.state() != RunState::Stopped {
            return;
        }
        let mut run = self.run.lock().unwrap();
        if run.ctx.is_some() {
            if let Err(e) = self.teardown(&mut run) {
                logger::error_p("session", &format!("{}", e));
            }
        }
    }

    fn teardown(&self, run: &mut RunHandles) -> Result<()> {
        if run.ctx.is_none() && run.threads.is_empty() {
            return Ok(());
        }
        let deadline = Instant::now() + STOP_JOIN_TIMEOUT;
        let mut leaked = 0usize;
        for handle in run.threads.drain(..) {
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }
            if handle.is_finished() {
                handle.join().ok();
            } else {
                leaked += 1;
            }
        }
        run.ctx = None;
        if leaked > 0 {
            logger::error_p(
                "session",
                &format!("{} worker(s) failed to stop within {:?}", leaked, STOP_JOIN_TIMEOUT),
            );
            bail!(
                "{} worker(s) failed to stop within {:?}; a wait point is not interruptible",
                leaked,
                STOP_JOIN_TIMEOUT
            );
        }
        logger::info_p("session", "stopped");
        Ok(())
    }

    /// Zero all counters. Independent of the session lifecycle.
    pub fn reset_stats(&self) {
        self.stats.lock().unwrap().reset();
        logger::info_p("session", "counters reset");
    }

    /// Manual trigger entry point (UI action or hotkey digit). Validates
    /// and spawns the execution asynchronously; overlapping triggers of the
    /// same sequence collapse inside the runner rather than queuing.
    pub fn trigger_sequence(&self, idx: usize) -> Result<()> {
        let mut run = self.run.lock().unwrap();
        if self.gate.state() == RunState::Stopped {
            bail!("no session is running");
        }
        let Some(ctx) = run.ctx.clone() else {
            bail!("no session is running");
        };
        if idx >= ctx.sequences.len() {
            bail!(
                "sequence {} out of range ({} configured)",
                idx + 1,
                ctx.sequences.len()
            );
        }
        // Finished trigger threads would otherwise pile up until stop.
        run.threads.retain(|h| !h.is_finished());
        run.threads.push(thread::spawn(move || {
            sequence::run_once(&ctx, idx, TriggerSource::Manual);
        }));
        Ok(())
    }

    /// Apply a structural edit to the profile. Rejected while a session is
    /// active. Counters are rebuilt to match the new shape.
    pub fn edit_profile<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Profile) -> Result<()>,
    {
        let run = self.run.lock().unwrap();
        if self.gate.state() != RunState::Stopped || run.ctx.is_some() {
            bail!("cannot edit configuration while a session is active");
        }
        let mut profile = self.profile.lock().unwrap();
        let mut draft = profile.clone();
        f(&mut draft)?;
        draft.validate()?;
        *self.stats.lock().unwrap() = Arc::new(Stats::for_profile(&draft));
        *profile = draft;
        Ok(())
    }

    /// Swap in a whole saved profile (config load).
    pub fn replace_profile(&self, new: Profile) -> Result<()> {
        self.edit_profile(|p| {
            *p = new;
            Ok(())
        })
    }
}
