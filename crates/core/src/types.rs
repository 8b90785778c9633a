use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Session lifecycle state shared through the run gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Running,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

/// What a target does when its timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClickAction {
    Single,
    Double,
    /// Press, wait `hold_secs`, release.
    Hold,
}

/// One screen point clicked on its own timer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    pub x: i32,
    pub y: i32,
    /// Seconds between clicks. Zero means sequence-only: the target never
    /// gets its own worker but stays addressable by sequence steps.
    #[serde(default = "default_interval")]
    pub interval_secs: f64,
    #[serde(default = "default_button")]
    pub button: MouseButton,
    #[serde(default = "default_action")]
    pub action: ClickAction,
    #[serde(default)]
    pub hold_secs: f64,
    /// Per-target spatial jitter radius in pixels; global default when unset.
    #[serde(default)]
    pub jitter_radius: Option<i32>,
    /// Per-target temporal jitter fraction; global default when unset.
    #[serde(default)]
    pub jitter_fraction: Option<f64>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Target {
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_secs.max(0.0))
    }

    pub fn hold(&self) -> Duration {
        Duration::from_secs_f64(self.hold_secs.max(0.0))
    }

    /// Whether this target gets its own periodic worker.
    pub fn has_worker(&self) -> bool {
        self.enabled && self.interval_secs > 0.0
    }
}

/// One step of a sequence: a target reference plus the delay applied
/// before the next step (never after the last one).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub target: usize,
    #[serde(default)]
    pub delay_secs: f64,
}

impl Step {
    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.delay_secs.max(0.0))
    }
}

/// An ordered set of steps executed as one unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sequence {
    pub name: String,
    pub steps: Vec<Step>,
    /// Seconds between automatic executions; ignored when `manual_only`.
    #[serde(default = "default_auto_interval")]
    pub auto_interval_secs: f64,
    #[serde(default)]
    pub manual_only: bool,
    /// Suspend regular target workers for the duration of an execution.
    #[serde(default)]
    pub pause_targets: bool,
}

impl Sequence {
    pub fn auto_interval(&self) -> Duration {
        Duration::from_secs_f64(self.auto_interval_secs.max(0.0))
    }

    /// Whether this sequence gets its own periodic scheduler.
    pub fn has_scheduler(&self) -> bool {
        !self.manual_only && self.auto_interval_secs > 0.0 && !self.steps.is_empty()
    }
}

/// Where a sequence execution request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    Automatic,
    Manual,
}

fn default_interval() -> f64 {
    1.0
}

fn default_auto_interval() -> f64 {
    5.0
}

fn default_button() -> MouseButton {
    MouseButton::Left
}

fn default_action() -> ClickAction {
    ClickAction::Single
}

fn default_true() -> bool {
    true
}
