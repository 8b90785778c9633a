use std::path::PathBuf;
use std::sync::{mpsc, Arc};

use tapper_core::settings::{self, Hotkeys};
use tapper_core::supervisor::Supervisor;
use tapper_core::types::RunState;
use tapper_core::logger;

pub struct App {
    pub supervisor: Arc<Supervisor>,
    pub hotkeys: Hotkeys,
    pub selected: usize,
    pub log_visible: bool,
    pub log_messages: Vec<String>,
    pub log_scroll: usize, // offset from bottom (0 = latest)
    pub log_rx: mpsc::Receiver<String>,
    pub configs_dir: PathBuf,
    config_cursor: usize,
    pub status: Option<String>,
    pub should_quit: bool,
}

impl App {
    pub fn new(
        supervisor: Arc<Supervisor>,
        log_rx: mpsc::Receiver<String>,
        configs_dir: PathBuf,
    ) -> Self {
        let hotkeys = supervisor.profile().hotkeys;
        Self {
            supervisor,
            hotkeys,
            selected: 0,
            log_visible: true,
            log_messages: Vec::new(),
            log_scroll: 0,
            log_rx,
            configs_dir,
            config_cursor: 0,
            status: None,
            should_quit: false,
        }
    }

    /// Per-frame housekeeping: finish teardown after limit stops, pull logs.
    pub fn tick(&mut self) {
        self.supervisor.reap_if_stopped();
        while let Ok(msg) = self.log_rx.try_recv() {
            self.log_messages.push(msg);
        }
    }

    fn report(&mut self, result: anyhow::Result<()>) {
        match result {
            Ok(()) => self.status = None,
            Err(e) => {
                logger::warn(&format!("{}", e));
                self.status = Some(format!("{}", e));
            }
        }
    }

    pub fn start_session(&mut self) {
        let r = self.supervisor.start();
        self.report(r);
    }

    pub fn toggle_pause(&mut self) {
        let r = self.supervisor.toggle_pause().map(|_| ());
        self.report(r);
    }

    /// Stop hotkey: ends the session if one is active, quits otherwise.
    pub fn stop_or_quit(&mut self) {
        if self.supervisor.state() != RunState::Stopped {
            let r = self.supervisor.stop();
            self.report(r);
        } else {
            self.should_quit = true;
        }
    }

    pub fn quit(&mut self) {
        let r = self.supervisor.stop();
        self.report(r);
        self.should_quit = true;
    }

    pub fn reset_counters(&mut self) {
        self.supervisor.reset_stats();
        self.status = None;
    }

    pub fn trigger_sequence(&mut self, digit: u32) {
        let r = self.supervisor.trigger_sequence(digit.saturating_sub(1) as usize);
        self.report(r);
    }

    pub fn save_profile_snapshot(&mut self) {
        let profile = self.supervisor.profile();
        match settings::save_named(&profile, &self.configs_dir, None) {
            Ok(path) => {
                logger::info(&format!("configuration saved to {}", path.display()));
                self.status = None;
            }
            Err(e) => self.report(Err(e)),
        }
    }

    /// Load the next saved configuration, newest first; repeated presses
    /// cycle through the directory. Rejected while a session is active.
    pub fn load_saved_config(&mut self) {
        let configs = settings::list_saved(&self.configs_dir);
        if configs.is_empty() {
            self.status = Some(format!("no saved configurations in {}", self.configs_dir.display()));
            return;
        }
        let cfg = &configs[self.config_cursor % configs.len()];
        let loaded = match settings::load_named(&cfg.path) {
            Ok(p) => p,
            Err(e) => {
                self.report(Err(e));
                return;
            }
        };
        if let Err(e) = self.supervisor.replace_profile(loaded) {
            self.report(Err(e));
            return;
        }
        // The cached bindings come from the profile; pick up the new ones.
        self.hotkeys = self.supervisor.profile().hotkeys;
        self.selected = 0;
        self.config_cursor = (self.config_cursor + 1) % configs.len();
        logger::info(&format!("configuration {} loaded ({})", cfg.name, cfg.summary));
        self.status = Some(format!("loaded {} ({})", cfg.name, cfg.summary));
    }

    pub fn move_up(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
        }
    }

    pub fn move_down(&mut self) {
        let len = self.supervisor.profile().targets.len();
        if self.selected + 1 < len {
            self.selected += 1;
        }
    }

    /// Toggle the selected target's enabled flag. A structural edit, so
    /// the supervisor rejects it while a session is active.
    pub fn toggle_selected(&mut self) {
        let idx = self.selected;
        let r = self.supervisor.edit_profile(|p| {
            if let Some(t) = p.targets.get_mut(idx) {
                t.enabled = !t.enabled;
            }
            Ok(())
        });
        self.report(r);
    }

    pub fn toggle_log(&mut self) {
        self.log_visible = !self.log_visible;
    }

    pub fn scroll_log_up(&mut self, n: usize) {
        self.log_scroll = self.log_scroll.saturating_add(n);
    }

    pub fn scroll_log_down(&mut self, n: usize) {
        self.log_scroll = self.log_scroll.saturating_sub(n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tapper_core::injector::StubInjector;
    use tapper_core::settings::Profile;
    use tapper_core::types::{ClickAction, MouseButton, Target};

    fn target(name: &str, interval_secs: f64) -> Target {
        Target {
            name: name.into(),
            x: 10,
            y: 10,
            interval_secs,
            button: MouseButton::Left,
            action: ClickAction::Single,
            hold_secs: 0.0,
            jitter_radius: Some(0),
            jitter_fraction: Some(0.0),
            enabled: true,
        }
    }

    fn app(configs_dir: &Path) -> App {
        let mut profile = Profile::default();
        profile.targets = vec![target("base", 0.5)];
        let supervisor =
            Arc::new(Supervisor::new(profile, Arc::new(StubInjector::new())).unwrap());
        let (_tx, rx) = mpsc::channel();
        App::new(supervisor, rx, configs_dir.to_path_buf())
    }

    fn temp_configs(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tapper_app_{}_{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn loading_a_saved_config_replaces_profile_and_rebinds_hotkeys() {
        let dir = temp_configs("load");
        let mut saved = Profile::default();
        saved.targets = vec![target("from_disk", 1.0), target("second", 2.0)];
        saved.hotkeys.pause = 'z';
        settings::save_named(&saved, &dir, Some("alpha")).unwrap();

        let mut app = app(&dir);
        assert_eq!(app.hotkeys.pause, 'p');
        app.load_saved_config();

        let p = app.supervisor.profile();
        assert_eq!(p.targets.len(), 2);
        assert_eq!(p.targets[0].name, "from_disk");
        assert_eq!(app.hotkeys.pause, 'z');
        assert_eq!(app.selected, 0);
        assert!(app.status.as_deref().unwrap_or("").contains("alpha"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn loading_is_rejected_while_a_session_is_active() {
        let dir = temp_configs("active");
        let mut saved = Profile::default();
        saved.targets = vec![target("from_disk", 1.0)];
        settings::save_named(&saved, &dir, Some("alpha")).unwrap();

        let mut app = app(&dir);
        app.supervisor.start().unwrap();
        app.load_saved_config();
        assert_eq!(app.supervisor.profile().targets[0].name, "base");
        assert!(app.status.is_some(), "rejection surfaces in the status line");
        app.supervisor.stop().unwrap();

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn loading_from_an_empty_directory_reports_and_keeps_the_profile() {
        let dir = temp_configs("empty");
        let mut app = app(&dir);
        app.load_saved_config();
        assert_eq!(app.supervisor.profile().targets[0].name, "base");
        assert!(app.status.as_deref().unwrap_or("").contains("no saved"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
