use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::jitter::JitterDefaults;
use crate::session::{Limits, Stats};
use crate::types::{Sequence, Target};

/// Single-character control bindings used by the presentation surface.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Hotkeys {
    pub pause: char,
    pub stop: char,
}

impl Default for Hotkeys {
    fn default() -> Self {
        Self {
            pause: 'p',
            stop: 'q',
        }
    }
}

/// The whole configurable surface: target and sequence definitions plus
/// global jitter, limit, and hotkey defaults. Counters are never part of a
/// profile; they live in `Stats` and persist separately as a snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub targets: Vec<Target>,
    #[serde(default)]
    pub sequences: Vec<Sequence>,
    #[serde(default)]
    pub jitter: JitterDefaults,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub hotkeys: Hotkeys,
}

impl Profile {
    pub fn load(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, path: &Path) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            let _ = std::fs::write(path, json);
        }
    }

    /// Structural sanity, checked on load and after every edit.
    pub fn validate(&self) -> Result<()> {
        for t in &self.targets {
            if t.name.is_empty() {
                bail!("target with empty name");
            }
            if t.interval_secs < 0.0 {
                bail!("target {}: negative interval", t.name);
            }
            if t.hold_secs < 0.0 {
                bail!("target {}: negative hold duration", t.name);
            }
            if let Some(f) = t.jitter_fraction {
                if !(0.0..=1.0).contains(&f) {
                    bail!("target {}: jitter fraction {} outside [0, 1]", t.name, f);
                }
            }
            if let Some(r) = t.jitter_radius {
                if r < 0 {
                    bail!("target {}: negative jitter radius", t.name);
                }
            }
        }
        for s in &self.sequences {
            if s.name.is_empty() {
                bail!("sequence with empty name");
            }
            if s.steps.is_empty() {
                bail!("sequence {}: no steps", s.name);
            }
            if !s.manual_only && s.auto_interval_secs <= 0.0 {
                bail!("sequence {}: automatic but auto interval is not positive", s.name);
            }
            for (i, step) in s.steps.iter().enumerate() {
                if step.target >= self.targets.len() {
                    bail!(
                        "sequence {}: step {} references target {} of {}",
                        s.name,
                        i + 1,
                        step.target,
                        self.targets.len()
                    );
                }
                if step.delay_secs < 0.0 {
                    bail!("sequence {}: step {} has a negative delay", s.name, i + 1);
                }
            }
        }
        if !(0.0..=1.0).contains(&self.jitter.fraction) {
            bail!("global jitter fraction {} outside [0, 1]", self.jitter.fraction);
        }
        Ok(())
    }
}

/// One entry of the saved-profile directory listing.
#[derive(Debug, Clone)]
pub struct SavedConfig {
    pub name: String,
    pub path: PathBuf,
    pub modified: String,
    pub summary: String,
}

/// List saved profiles, newest first.
pub fn list_saved(dir: &Path) -> Vec<SavedConfig> {
    let mut configs = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return configs;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().map_or(true, |e| e != "json") {
            continue;
        }
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let modified = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        let summary = match std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str::<Profile>(&s).ok())
        {
            Some(p) => format!("{} targets, {} sequences", p.targets.len(), p.sequences.len()),
            None => "(unreadable)".to_string(),
        };
        configs.push(SavedConfig {
            name,
            path,
            modified,
            summary,
        });
    }
    configs.sort_by(|a, b| b.modified.cmp(&a.modified));
    configs
}

/// Save the profile under `name` in `dir`, generating a timestamped name
/// when none is given. Returns the written path.
pub fn save_named(profile: &Profile, dir: &Path, name: Option<&str>) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating {}", dir.display()))?;
    let name = match name {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => format!("config_{}", Local::now().format("%Y%m%d_%H%M%S")),
    };
    let path = dir.join(format!("{}.json", name.trim_end_matches(".json")));
    let json = serde_json::to_string_pretty(profile)?;
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

/// Load and validate a saved profile.
pub fn load_named(path: &Path) -> Result<Profile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let profile: Profile =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    profile.validate()?;
    Ok(profile)
}

/// Counter snapshot handed to the persistence collaborator on shutdown.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_clicks: u64,
    pub targets: Vec<TargetSnapshot>,
    pub sequences: Vec<SequenceSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TargetSnapshot {
    pub name: String,
    pub clicks: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SequenceSnapshot {
    pub name: String,
    pub executions: u64,
    pub step_clicks: Vec<u64>,
}

impl StatsSnapshot {
    pub fn capture(profile: &Profile, stats: &Stats) -> Self {
        use std::sync::atomic::Ordering;
        Self {
            total_clicks: stats.total(),
            targets: profile
                .targets
                .iter()
                .enumerate()
                .map(|(i, t)| TargetSnapshot {
                    name: t.name.clone(),
                    clicks: stats.target_clicks(i),
                })
                .collect(),
            sequences: profile
                .sequences
                .iter()
                .enumerate()
                .map(|(i, s)| SequenceSnapshot {
                    name: s.name.clone(),
                    executions: stats.sequence_executions(i),
                    step_clicks: stats
                        .sequences
                        .get(i)
                        .map(|ss| ss.step_clicks.iter().map(|c| c.load(Ordering::Relaxed)).collect())
                        .unwrap_or_default(),
                })
                .collect(),
        }
    }

    pub fn save(&self, path: &Path) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            let _ = std::fs::write(path, json);
        }
    }
}
