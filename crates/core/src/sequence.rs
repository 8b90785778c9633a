use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::gate::GateStatus;
use crate::jitter;
use crate::logger;
use crate::session::{RunContext, SequenceStats};
use crate::types::{RunState, TriggerSource};
use crate::worker;

/// What a single execution request resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// Ended early because the session stopped mid-sequence.
    Interrupted,
    /// Another execution of this sequence holds the exclusion flag. Not an
    /// error; overlapping triggers collapse rather than queue.
    AlreadyRunning,
    /// Automatic trigger of a manual-only sequence, or an empty step list.
    Skipped,
}

// Clears the exclusion flag on every exit path, error or not, so a failed
// run can never block future triggers.
struct RunningGuard<'a> {
    stats: &'a SequenceStats,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.stats.running.store(false, Ordering::Release);
    }
}

/// Execute the steps of sequence `idx` once, honoring the gate before
/// every step and applying each referenced target's own jitter profile.
///
/// At most one execution per sequence is live at any instant, regardless
/// of trigger source; the `running` flag is taken by compare-and-set.
pub fn run_once(ctx: &RunContext, idx: usize, source: TriggerSource) -> RunOutcome {
    let Some(seq) = ctx.sequences.get(idx) else {
        return RunOutcome::Skipped;
    };
    let stats = &ctx.stats.sequences[idx];

    // Enforced here, not just by omitting a scheduler for it.
    if seq.manual_only && source == TriggerSource::Automatic {
        return RunOutcome::Skipped;
    }
    if seq.steps.is_empty() {
        return RunOutcome::Skipped;
    }

    if stats
        .running
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        logger::info_p("seq", &format!("{}: already running, trigger ignored", seq.name));
        return RunOutcome::AlreadyRunning;
    }
    let _running = RunningGuard { stats };
    let _hold = seq.pause_targets.then(|| ctx.gate.hold_targets());

    logger::info_p(
        "seq",
        &format!("{}: executing ({:?} trigger)", seq.name, source),
    );

    let mut rng = rand::thread_rng();
    let mut interrupted = false;

    for (step_idx, step) in seq.steps.iter().enumerate() {
        if ctx.gate.wait_runnable_ignoring_holds() == GateStatus::Stopped {
            interrupted = true;
            break;
        }

        let Some(target) = ctx.targets.get(step.target) else {
            logger::warn_p(
                "seq",
                &format!("{}: step {} references missing target {}", seq.name, step_idx + 1, step.target),
            );
            continue;
        };

        let (x, y) = jitter::offset_position(
            &mut rng,
            target.x,
            target.y,
            ctx.jitter.radius_for(target),
            ctx.jitter.enabled,
        );
        match worker::perform_action(ctx.injector.as_ref(), &ctx.gate, target, x, y) {
            Ok(()) => ctx.stats.record_step_click(idx, step_idx, step.target),
            Err(e) => logger::warn_p(
                "seq",
                &format!("{}: step {} failed at ({}, {}): {}", seq.name, step_idx + 1, x, y, e),
            ),
        }

        ctx.enforce_limits();

        // Inter-step delay, skipped after the last step.
        if step_idx + 1 < seq.steps.len() {
            let delay = jitter::scale_duration(
                &mut rng,
                step.delay(),
                ctx.jitter.fraction_for(target),
                ctx.jitter.enabled,
            );
            if !ctx.gate.sleep_interruptible(delay) {
                interrupted = true;
                break;
            }
        }
    }

    // An execution counts once the flag was held, even when cut short.
    stats.executions.fetch_add(1, Ordering::Relaxed);
    if interrupted {
        logger::info_p("seq", &format!("{}: interrupted by stop", seq.name));
        RunOutcome::Interrupted
    } else {
        logger::info_p(
            "seq",
            &format!("{}: completed (execution #{})", seq.name, stats.executions.load(Ordering::Relaxed)),
        );
        RunOutcome::Completed
    }
}

/// Periodic scheduler loop for one automatically-triggered sequence. Runs
/// on its own thread: sleep the auto-interval, then execute unless the
/// session is paused. Paused cycles are skipped outright, never queued.
pub fn run_scheduler(ctx: Arc<RunContext>, idx: usize) {
    let Some(seq) = ctx.sequences.get(idx) else {
        return;
    };
    let interval = seq.auto_interval();
    logger::info_p(
        "seq",
        &format!("{}: scheduled every {:.1}s", seq.name, seq.auto_interval_secs),
    );

    loop {
        if !ctx.gate.sleep_interruptible(interval) {
            break;
        }
        match ctx.gate.state() {
            RunState::Running => {
                run_once(&ctx, idx, TriggerSource::Automatic);
            }
            RunState::Paused => continue,
            RunState::Stopped => break,
        }
        if ctx.gate.state() == RunState::Stopped {
            break;
        }
    }

    logger::info_p("seq", &format!("{}: scheduler stopped", seq.name));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::RunGate;
    use crate::injector::StubInjector;
    use crate::jitter::JitterDefaults;
    use crate::session::{Limits, Stats};
    use crate::settings::Profile;
    use crate::types::{ClickAction, MouseButton, Sequence, Step, Target};
    use std::thread;
    use std::time::{Duration, Instant};

    fn target(name: &str) -> Target {
        Target {
            name: name.into(),
            x: 10,
            y: 10,
            interval_secs: 0.0,
            button: MouseButton::Left,
            action: ClickAction::Single,
            hold_secs: 0.0,
            jitter_radius: Some(0),
            jitter_fraction: Some(0.0),
            enabled: true,
        }
    }

    fn context(sequences: Vec<Sequence>) -> (Arc<RunContext>, Arc<StubInjector>) {
        let mut profile = Profile::default();
        profile.targets = vec![target("a"), target("b")];
        profile.sequences = sequences;
        let injector = Arc::new(StubInjector::new());
        let ctx = Arc::new(RunContext {
            gate: Arc::new(RunGate::new()),
            stats: Arc::new(Stats::for_profile(&profile)),
            injector: injector.clone(),
            targets: profile.targets.clone(),
            sequences: profile.sequences.clone(),
            jitter: JitterDefaults::default(),
            limits: Limits::default(),
            started: Instant::now(),
        });
        (ctx, injector)
    }

    fn three_step_sequence(delay_secs: f64) -> Sequence {
        Sequence {
            name: "seq".into(),
            steps: vec![
                Step { target: 0, delay_secs },
                Step { target: 1, delay_secs },
                Step { target: 0, delay_secs: 0.0 },
            ],
            auto_interval_secs: 5.0,
            manual_only: false,
            pause_targets: false,
        }
    }

    #[test]
    fn executes_steps_in_order_and_counts_everything() {
        let (ctx, stub) = context(vec![three_step_sequence(0.0)]);
        ctx.gate.start();
        let outcome = run_once(&ctx, 0, TriggerSource::Manual);
        assert_eq!(outcome, RunOutcome::Completed);

        assert_eq!(stub.click_count(), 3);
        assert_eq!(ctx.stats.total(), 3);
        assert_eq!(ctx.stats.target_clicks(0), 2);
        assert_eq!(ctx.stats.target_clicks(1), 1);
        assert_eq!(ctx.stats.sequence_executions(0), 1);
        assert!(!ctx.stats.sequences[0].running.load(Ordering::SeqCst));
    }

    #[test]
    fn second_concurrent_trigger_is_a_no_op() {
        let (ctx, _stub) = context(vec![three_step_sequence(0.2)]);
        ctx.gate.start();

        let first = thread::spawn({
            let ctx = ctx.clone();
            move || run_once(&ctx, 0, TriggerSource::Manual)
        });
        thread::sleep(Duration::from_millis(50));
        let second = run_once(&ctx, 0, TriggerSource::Manual);
        assert_eq!(second, RunOutcome::AlreadyRunning);

        assert_eq!(first.join().unwrap(), RunOutcome::Completed);
        assert_eq!(ctx.stats.sequence_executions(0), 1);
    }

    #[test]
    fn automatic_trigger_of_manual_only_sequence_is_skipped() {
        let mut seq = three_step_sequence(0.0);
        seq.manual_only = true;
        let (ctx, stub) = context(vec![seq]);
        ctx.gate.start();

        assert_eq!(run_once(&ctx, 0, TriggerSource::Automatic), RunOutcome::Skipped);
        assert_eq!(stub.click_count(), 0);
        assert_eq!(ctx.stats.sequence_executions(0), 0);

        assert_eq!(run_once(&ctx, 0, TriggerSource::Manual), RunOutcome::Completed);
    }

    #[test]
    fn running_flag_clears_after_injection_errors() {
        let (ctx, stub) = context(vec![three_step_sequence(0.0)]);
        ctx.gate.start();
        stub.set_failing(true);
        assert_eq!(run_once(&ctx, 0, TriggerSource::Manual), RunOutcome::Completed);
        assert_eq!(ctx.stats.total(), 0);
        assert!(!ctx.stats.sequences[0].running.load(Ordering::SeqCst));

        stub.set_failing(false);
        assert_eq!(run_once(&ctx, 0, TriggerSource::Manual), RunOutcome::Completed);
        assert_eq!(ctx.stats.total(), 3);
    }

    #[test]
    fn stop_mid_delay_interrupts_promptly() {
        let (ctx, _stub) = context(vec![three_step_sequence(10.0)]);
        ctx.gate.start();

        let handle = thread::spawn({
            let ctx = ctx.clone();
            move || run_once(&ctx, 0, TriggerSource::Manual)
        });
        thread::sleep(Duration::from_millis(100));
        let stopped_at = Instant::now();
        ctx.gate.stop();
        let outcome = handle.join().unwrap();

        assert_eq!(outcome, RunOutcome::Interrupted);
        assert!(
            stopped_at.elapsed() < Duration::from_secs(5),
            "sequence did not observe stop during its inter-step delay"
        );
        // The cut-short execution still counts; the flag is released.
        assert_eq!(ctx.stats.sequence_executions(0), 1);
        assert!(!ctx.stats.sequences[0].running.load(Ordering::SeqCst));
    }

    #[test]
    fn pause_mid_delay_suspends_before_the_next_step() {
        let (ctx, stub) = context(vec![three_step_sequence(0.15)]);
        ctx.gate.start();

        let handle = thread::spawn({
            let ctx = ctx.clone();
            move || run_once(&ctx, 0, TriggerSource::Manual)
        });
        // Pause while the first inter-step delay runs.
        thread::sleep(Duration::from_millis(50));
        ctx.gate.toggle_pause();
        thread::sleep(Duration::from_millis(300));
        assert_eq!(stub.click_count(), 1, "a step clicked while paused");

        ctx.gate.toggle_pause();
        assert_eq!(handle.join().unwrap(), RunOutcome::Completed);
        assert_eq!(stub.click_count(), 3, "resume skipped or duplicated a step");
    }

    #[test]
    fn pause_targets_sequence_holds_the_gate_while_it_runs() {
        let mut seq = three_step_sequence(0.2);
        seq.pause_targets = true;
        let (ctx, _stub) = context(vec![seq]);
        ctx.gate.start();

        let handle = thread::spawn({
            let ctx = ctx.clone();
            move || run_once(&ctx, 0, TriggerSource::Manual)
        });
        thread::sleep(Duration::from_millis(100));
        // A target worker arriving now must block until the sequence ends.
        let blocked = thread::spawn({
            let ctx = ctx.clone();
            move || {
                let started = Instant::now();
                ctx.gate.wait_runnable();
                started.elapsed()
            }
        });
        handle.join().unwrap();
        let waited = blocked.join().unwrap();
        assert!(
            waited >= Duration::from_millis(100),
            "target worker was not held during a pause_targets sequence ({:?})",
            waited
        );
    }

    #[test]
    fn scheduler_fires_on_interval_and_exits_on_stop() {
        let mut seq = three_step_sequence(0.0);
        seq.auto_interval_secs = 0.05;
        let (ctx, _stub) = context(vec![seq]);
        ctx.gate.start();

        let handle = thread::spawn({
            let ctx = ctx.clone();
            move || run_scheduler(ctx, 0)
        });
        thread::sleep(Duration::from_millis(400));
        ctx.gate.stop();
        handle.join().unwrap();

        let executions = ctx.stats.sequence_executions(0);
        assert!(executions >= 2, "expected repeated executions, got {}", executions);
    }

    #[test]
    fn scheduler_skips_cycles_while_paused_without_backlog() {
        let mut seq = three_step_sequence(0.0);
        seq.auto_interval_secs = 0.05;
        let (ctx, _stub) = context(vec![seq]);
        ctx.gate.start();
        ctx.gate.toggle_pause();

        let handle = thread::spawn({
            let ctx = ctx.clone();
            move || run_scheduler(ctx, 0)
        });
        thread::sleep(Duration::from_millis(300));
        assert_eq!(ctx.stats.sequence_executions(0), 0, "scheduler ran while paused");

        ctx.gate.stop();
        handle.join().unwrap();
        assert_eq!(ctx.stats.sequence_executions(0), 0, "skipped cycles were queued");
    }
}
