use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};

use crate::logger;
use crate::types::MouseButton;

/// Pointer-injection seam. Implementations may fail per call; the
/// scheduler treats that as non-fatal and keeps its loops alive.
pub trait Injector: Send + Sync {
    /// Move to `(x, y)` and press-release `count` times.
    fn click(&self, x: i32, y: i32, button: MouseButton, count: u32) -> Result<()>;
    fn press(&self, x: i32, y: i32, button: MouseButton) -> Result<()>;
    fn release(&self, x: i32, y: i32, button: MouseButton) -> Result<()>;
}

/// Create the injector for this process. `force_stub` swaps in the logging
/// stub; without the `inject` feature the stub is all there is.
pub fn create_injector(force_stub: bool) -> Arc<dyn Injector> {
    if force_stub {
        logger::register_prefix("stub", logger::COLOR_GRAY);
        return Arc::new(StubInjector::new());
    }
    #[cfg(feature = "inject")]
    {
        return Arc::new(enigo_impl::EnigoInjector::new());
    }
    #[cfg(not(feature = "inject"))]
    {
        logger::register_prefix("stub", logger::COLOR_GRAY);
        logger::warn("built without the inject feature, clicks go to the stub");
        Arc::new(StubInjector::new())
    }
}

#[cfg(feature = "inject")]
mod enigo_impl {
    use super::*;
    use enigo::{Enigo, MouseControllable};

    fn to_enigo(button: MouseButton) -> enigo::MouseButton {
        match button {
            MouseButton::Left => enigo::MouseButton::Left,
            MouseButton::Middle => enigo::MouseButton::Middle,
            MouseButton::Right => enigo::MouseButton::Right,
        }
    }

    /// Real pointer injection through enigo. The handle is not
    /// thread-safe, so every worker funnels through one mutex.
    pub struct EnigoInjector {
        enigo: Mutex<Enigo>,
    }

    impl EnigoInjector {
        pub fn new() -> Self {
            Self {
                enigo: Mutex::new(Enigo::new()),
            }
        }

        fn check_coords(x: i32, y: i32) -> Result<()> {
            if x < 0 || y < 0 {
                bail!("coordinate ({}, {}) is outside the screen", x, y);
            }
            Ok(())
        }
    }

    impl Injector for EnigoInjector {
        fn click(&self, x: i32, y: i32, button: MouseButton, count: u32) -> Result<()> {
            Self::check_coords(x, y)?;
            let mut en = self.enigo.lock().unwrap();
            en.mouse_move_to(x, y);
            for _ in 0..count {
                en.mouse_click(to_enigo(button));
            }
            Ok(())
        }

        fn press(&self, x: i32, y: i32, button: MouseButton) -> Result<()> {
            Self::check_coords(x, y)?;
            let mut en = self.enigo.lock().unwrap();
            en.mouse_move_to(x, y);
            en.mouse_down(to_enigo(button));
            Ok(())
        }

        fn release(&self, x: i32, y: i32, button: MouseButton) -> Result<()> {
            Self::check_coords(x, y)?;
            let mut en = self.enigo.lock().unwrap();
            en.mouse_up(to_enigo(button));
            Ok(())
        }
    }
}

/// One recorded injection call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubEvent {
    Click(i32, i32, MouseButton, u32),
    Press(i32, i32, MouseButton),
    Release(i32, i32, MouseButton),
}

/// Logging injector that records every call instead of moving the pointer.
/// Tests drive the whole scheduler through it.
pub struct StubInjector {
    pub events: Mutex<Vec<StubEvent>>,
    fail: AtomicBool,
}

impl StubInjector {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    /// Make every subsequent call fail, to exercise error paths.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn click_count(&self) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, StubEvent::Click(..)))
            .count()
    }

    fn record(&self, event: StubEvent) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("stub injector configured to fail");
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

impl Default for StubInjector {
    fn default() -> Self {
        Self::new()
    }
}

impl Injector for StubInjector {
    fn click(&self, x: i32, y: i32, button: MouseButton, count: u32) -> Result<()> {
        logger::info_p("stub", &format!("click({}, {}, {:?}, x{})", x, y, button, count));
        self.record(StubEvent::Click(x, y, button, count))
    }

    fn press(&self, x: i32, y: i32, button: MouseButton) -> Result<()> {
        logger::info_p("stub", &format!("press({}, {}, {:?})", x, y, button));
        self.record(StubEvent::Press(x, y, button))
    }

    fn release(&self, x: i32, y: i32, button: MouseButton) -> Result<()> {
        logger::info_p("stub", &format!("release({}, {}, {:?})", x, y, button));
        self.record(StubEvent::Release(x, y, button))
    }
}
