//! Scheduler core for tapper: per-target click workers, sequence
//! execution with per-sequence exclusion, the shared run gate, jitter,
//! and session limit enforcement. The pointer itself moves behind the
//! [`injector::Injector`] seam; the TUI lives in `tapper-tui`.

pub mod gate;
pub mod injector;
pub mod jitter;
pub mod logger;
pub mod sequence;
pub mod session;
pub mod settings;
pub mod supervisor;
pub mod types;
pub mod worker;
