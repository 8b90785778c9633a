use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::gate::RunGate;
use crate::injector::Injector;
use crate::jitter::JitterDefaults;
use crate::logger;
use crate::settings::Profile;
use crate::types::{Sequence, Target};

/// Session-wide caps. Unset means unlimited. Reaching either one stops the
/// whole session; that is a defined transition, not an error.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Limits {
    #[serde(default)]
    pub max_clicks: Option<u64>,
    #[serde(default)]
    pub max_runtime_secs: Option<f64>,
}

impl Limits {
    pub fn max_runtime(&self) -> Option<Duration> {
        self.max_runtime_secs.map(Duration::from_secs_f64)
    }
}

pub struct TargetStats {
    pub clicks: AtomicU64,
}

pub struct SequenceStats {
    pub executions: AtomicU64,
    /// Exclusion flag: at most one live execution per sequence. Acquired
    /// with compare-and-set on entry to the runner.
    pub running: AtomicBool,
    pub step_clicks: Vec<AtomicU64>,
}

/// Runtime counters, kept apart from the definitions so they survive
/// session stop and reset independently of structural edits.
pub struct Stats {
    pub total: AtomicU64,
    pub targets: Vec<TargetStats>,
    pub sequences: Vec<SequenceStats>,
}

impl Stats {
    pub fn for_profile(profile: &Profile) -> Self {
        Self {
            total: AtomicU64::new(0),
            targets: profile
                .targets
                .iter()
                .map(|_| TargetStats {
                    clicks: AtomicU64::new(0),
                })
                .collect(),
            sequences: profile
                .sequences
                .iter()
                .map(|s| SequenceStats {
                    executions: AtomicU64::new(0),
                    running: AtomicBool::new(false),
                    step_clicks: s.steps.iter().map(|_| AtomicU64::new(0)).collect(),
                })
                .collect(),
        }
    }

    /// Zero every counter. Distinct from stopping; running flags are left
    /// alone so an in-flight sequence still releases its own.
    pub fn reset(&self) {
        self.total.store(0, Ordering::Relaxed);
        for t in &self.targets {
            t.clicks.store(0, Ordering::Relaxed);
        }
        for s in &self.sequences {
            s.executions.store(0, Ordering::Relaxed);
            for c in &s.step_clicks {
                c.store(0, Ordering::Relaxed);
            }
        }
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn target_clicks(&self, idx: usize) -> u64 {
        self.targets
            .get(idx)
            .map_or(0, |t| t.clicks.load(Ordering::Relaxed))
    }

    pub fn sequence_executions(&self, idx: usize) -> u64 {
        self.sequences
            .get(idx)
            .map_or(0, |s| s.executions.load(Ordering::Relaxed))
    }

    pub fn record_target_click(&self, idx: usize) {
        if let Some(t) = self.targets.get(idx) {
            t.clicks.fetch_add(1, Ordering::Relaxed);
        }
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// A sequence step click counts against the step, the referenced
    /// target, and the aggregate.
    pub fn record_step_click(&self, seq_idx: usize, step_idx: usize, target_idx: usize) {
        if let Some(s) = self.sequences.get(seq_idx) {
            if let Some(c) = s.step_clicks.get(step_idx) {
                c.fetch_add(1, Ordering::Relaxed);
            }
        }
        if let Some(t) = self.targets.get(target_idx) {
            t.clicks.fetch_add(1, Ordering::Relaxed);
        }
        self.total.fetch_add(1, Ordering::Relaxed);
    }
}

/// Everything one run session shares across its workers: the gate, the
/// counters, the definition snapshot taken at start, and the limits.
/// Definitions are immutable while the session lives (structural edits are
/// rejected at the supervisor boundary), so workers read them lock-free.
pub struct RunContext {
    pub gate: Arc<RunGate>,
    pub stats: Arc<Stats>,
    pub injector: Arc<dyn Injector>,
    pub targets: Vec<Target>,
    pub sequences: Vec<Sequence>,
    pub jitter: JitterDefaults,
    pub limits: Limits,
    pub started: Instant,
}

impl RunContext {
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Called by every worker after each click. Stops the session once a
    /// configured cap is reached; `RunGate::stop` makes the transition
    /// idempotent under concurrent callers.
    pub fn enforce_limits(&self) {
        if let Some(max) = self.limits.max_clicks {
            if self.stats.total() >= max && self.gate.stop() {
                logger::info_p("session", &format!("click limit {} reached, stopping", max));
                return;
            }
        }
        if let Some(max) = self.limits.max_runtime() {
            if self.elapsed() >= max && self.gate.stop() {
                logger::info_p(
                    "session",
                    &format!("runtime limit {:.1}s reached, stopping", max.as_secs_f64()),
                );
            }
        }
    }
}
