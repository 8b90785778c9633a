use std::io;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};

use anyhow::Result;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use tapper_core::injector::create_injector;
use tapper_core::settings::{Profile, StatsSnapshot};
use tapper_core::supervisor::Supervisor;
use tapper_core::logger;

fn main() -> Result<()> {
    let force_stub = std::env::args().any(|a| a == "--stub");

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let logs_dir = cwd.join("logs");
    let configs_dir = cwd.join("saved_configs");
    let profile_path = cwd.join("profile.json");
    let stats_path = cwd.join("stats.json");

    logger::init(&logs_dir);

    let profile = Profile::load(&profile_path);
    if !profile_path.exists() {
        // First run: write the template so there is something to edit.
        profile.save(&profile_path);
    }
    logger::info(&format!(
        "loaded profile: {} target(s), {} sequence(s)",
        profile.targets.len(),
        profile.sequences.len()
    ));

    let injector = create_injector(force_stub);
    let supervisor = Arc::new(Supervisor::new(profile, injector)?);

    let (log_tx, log_rx) = mpsc::channel::<String>();
    logger::set_tui_sender(log_tx);
    logger::info("tapper started");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = tapper_tui::App::new(Arc::clone(&supervisor), log_rx, configs_dir);
    let result = tapper_tui::event::run(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    // The event loop stops the session on quit; make sure anyway, then
    // hand the counters to the persistence side.
    supervisor.stop().ok();
    let profile = supervisor.profile();
    profile.save(&profile_path);
    StatsSnapshot::capture(&profile, &supervisor.stats()).save(&stats_path);

    result
}
