use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::Target;

/// Global jitter settings, applied wherever a target does not override them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct JitterDefaults {
    /// Master switch; when off every jitter function is the identity.
    pub enabled: bool,
    /// Spatial radius in pixels, per axis.
    pub radius: i32,
    /// Temporal fraction in [0, 1]; sleeps scale by [1-f, 1+f].
    pub fraction: f64,
}

impl Default for JitterDefaults {
    fn default() -> Self {
        Self {
            enabled: true,
            radius: 3,
            fraction: 0.1,
        }
    }
}

impl JitterDefaults {
    pub fn radius_for(&self, target: &Target) -> i32 {
        target.jitter_radius.unwrap_or(self.radius).max(0)
    }

    pub fn fraction_for(&self, target: &Target) -> f64 {
        target.jitter_fraction.unwrap_or(self.fraction).clamp(0.0, 1.0)
    }
}

/// Offset `(x, y)` by an independent uniform sample from [-radius, radius]
/// per axis. Identity when disabled or radius is zero.
pub fn offset_position<R: Rng>(
    rng: &mut R,
    x: i32,
    y: i32,
    radius: i32,
    enabled: bool,
) -> (i32, i32) {
    if !enabled || radius <= 0 {
        return (x, y);
    }
    (
        x + rng.gen_range(-radius..=radius),
        y + rng.gen_range(-radius..=radius),
    )
}

/// Scale `base` by a uniform factor from [max(0, 1-fraction), 1+fraction].
/// Identity when disabled or fraction is zero.
pub fn scale_duration<R: Rng>(
    rng: &mut R,
    base: Duration,
    fraction: f64,
    enabled: bool,
) -> Duration {
    if !enabled || fraction <= 0.0 {
        return base;
    }
    let f = fraction.min(1.0);
    let factor = rng.gen_range((1.0 - f).max(0.0)..=1.0 + f);
    Duration::from_secs_f64(base.as_secs_f64() * factor)
}
