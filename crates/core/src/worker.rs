use std::sync::Arc;

use anyhow::Result;

use crate::gate::{GateStatus, RunGate};
use crate::injector::Injector;
use crate::jitter;
use crate::logger;
use crate::session::RunContext;
use crate::types::{ClickAction, RunState, Target};

/// Perform one click action at `(x, y)`. A hold sleeps through the gate so
/// stop interrupts the wait, but the button is always released.
pub fn perform_action(
    injector: &dyn Injector,
    gate: &RunGate,
    target: &Target,
    x: i32,
    y: i32,
) -> Result<()> {
    match target.action {
        ClickAction::Single => injector.click(x, y, target.button, 1),
        ClickAction::Double => injector.click(x, y, target.button, 2),
        ClickAction::Hold => {
            injector.press(x, y, target.button)?;
            gate.sleep_interruptible(target.hold());
            injector.release(x, y, target.button)
        }
    }
}

/// Periodic worker loop for one enabled target. Runs on its own thread
/// until the gate stops: wait at the gate, click with jitter, count, check
/// limits, sleep the jittered interval.
///
/// Injection failures are logged and skipped; they never kill the worker.
pub fn run(ctx: Arc<RunContext>, idx: usize) {
    let target = ctx.targets[idx].clone();
    let mut rng = rand::thread_rng();
    logger::info_p(
        "worker",
        &format!("{}: clicking every {:.1}s", target.name, target.interval_secs),
    );

    loop {
        if ctx.gate.wait_runnable() == GateStatus::Stopped {
            break;
        }

        let (x, y) = jitter::offset_position(
            &mut rng,
            target.x,
            target.y,
            ctx.jitter.radius_for(&target),
            ctx.jitter.enabled,
        );
        match perform_action(ctx.injector.as_ref(), &ctx.gate, &target, x, y) {
            Ok(()) => ctx.stats.record_target_click(idx),
            Err(e) => logger::warn_p(
                "worker",
                &format!("{}: click at ({}, {}) failed: {}", target.name, x, y, e),
            ),
        }

        ctx.enforce_limits();
        if ctx.gate.state() == RunState::Stopped {
            break;
        }

        let sleep = jitter::scale_duration(
            &mut rng,
            target.interval(),
            ctx.jitter.fraction_for(&target),
            ctx.jitter.enabled,
        );
        if !ctx.gate.sleep_interruptible(sleep) {
            break;
        }
    }

    logger::info_p("worker", &format!("{}: stopped", target.name));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injector::{StubEvent, StubInjector};
    use crate::jitter::JitterDefaults;
    use crate::session::{Limits, Stats};
    use crate::settings::Profile;
    use crate::types::MouseButton;
    use std::thread;
    use std::time::{Duration, Instant};

    fn target(interval_secs: f64) -> Target {
        Target {
            name: "t".into(),
            x: 100,
            y: 200,
            interval_secs,
            button: MouseButton::Left,
            action: ClickAction::Single,
            hold_secs: 0.0,
            jitter_radius: Some(0),
            jitter_fraction: Some(0.0),
            enabled: true,
        }
    }

    fn context(targets: Vec<Target>, limits: Limits) -> (Arc<RunContext>, Arc<StubInjector>) {
        let mut profile = Profile::default();
        profile.targets = targets.clone();
        let injector = Arc::new(StubInjector::new());
        let ctx = Arc::new(RunContext {
            gate: Arc::new(RunGate::new()),
            stats: Arc::new(Stats::for_profile(&profile)),
            injector: injector.clone(),
            targets,
            sequences: Vec::new(),
            jitter: JitterDefaults::default(),
            limits,
            started: Instant::now(),
        });
        (ctx, injector)
    }

    #[test]
    fn double_action_issues_two_press_releases() {
        let mut t = target(1.0);
        t.action = ClickAction::Double;
        let stub = StubInjector::new();
        let gate = RunGate::new();
        perform_action(&stub, &gate, &t, 5, 6).unwrap();
        assert_eq!(
            stub.events.lock().unwrap()[0],
            StubEvent::Click(5, 6, MouseButton::Left, 2)
        );
    }

    #[test]
    fn hold_releases_even_when_stopped_mid_hold() {
        let mut t = target(1.0);
        t.action = ClickAction::Hold;
        t.hold_secs = 0.05;
        let stub = StubInjector::new();
        let gate = RunGate::new();
        // Gate never started: sleep_interruptible returns immediately, but
        // press and release must both have happened.
        perform_action(&stub, &gate, &t, 1, 2).unwrap();
        let events = stub.events.lock().unwrap();
        assert!(matches!(events[0], StubEvent::Press(..)));
        assert!(matches!(events[1], StubEvent::Release(..)));
    }

    #[test]
    fn worker_clicks_on_its_interval_and_exits_on_stop() {
        let (ctx, stub) = context(vec![target(0.02)], Limits::default());
        ctx.gate.start();
        let handle = thread::spawn({
            let ctx = ctx.clone();
            move || run(ctx, 0)
        });

        thread::sleep(Duration::from_millis(200));
        ctx.gate.stop();
        handle.join().unwrap();

        let clicks = ctx.stats.target_clicks(0);
        assert!(clicks >= 2, "expected several clicks, got {}", clicks);
        assert_eq!(stub.click_count() as u64, clicks);
        assert_eq!(ctx.stats.total(), clicks);
    }

    #[test]
    fn click_cap_stops_the_session_at_the_cap() {
        let limits = Limits {
            max_clicks: Some(3),
            max_runtime_secs: None,
        };
        let (ctx, _stub) = context(vec![target(0.01)], limits);
        ctx.gate.start();
        let handle = thread::spawn({
            let ctx = ctx.clone();
            move || run(ctx, 0)
        });
        handle.join().unwrap();

        assert_eq!(ctx.stats.total(), 3);
        assert_eq!(ctx.gate.state(), RunState::Stopped);
    }

    #[test]
    fn failed_injection_is_skipped_not_fatal() {
        let (ctx, stub) = context(vec![target(0.01)], Limits::default());
        stub.set_failing(true);
        ctx.gate.start();
        let handle = thread::spawn({
            let ctx = ctx.clone();
            move || run(ctx, 0)
        });

        thread::sleep(Duration::from_millis(100));
        assert_eq!(ctx.stats.total(), 0, "failed clicks must not count");

        stub.set_failing(false);
        thread::sleep(Duration::from_millis(100));
        ctx.gate.stop();
        handle.join().unwrap();
        assert!(ctx.stats.total() > 0, "worker did not recover after errors");
    }

    #[test]
    fn paused_worker_stops_clicking_until_resume() {
        let (ctx, _stub) = context(vec![target(0.01)], Limits::default());
        ctx.gate.start();
        let handle = thread::spawn({
            let ctx = ctx.clone();
            move || run(ctx, 0)
        });

        thread::sleep(Duration::from_millis(100));
        ctx.gate.toggle_pause();
        // Let any in-flight iteration finish, then sample.
        thread::sleep(Duration::from_millis(100));
        let frozen = ctx.stats.total();
        thread::sleep(Duration::from_millis(150));
        assert_eq!(ctx.stats.total(), frozen, "counters moved while paused");

        ctx.gate.toggle_pause();
        thread::sleep(Duration::from_millis(100));
        assert!(ctx.stats.total() > frozen, "worker did not resume");

        ctx.gate.stop();
        handle.join().unwrap();
    }
}
