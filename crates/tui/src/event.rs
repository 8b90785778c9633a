use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, MouseEventKind};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::App;
use crate::ui;

pub fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> anyhow::Result<()> {
    loop {
        if app.should_quit {
            return Ok(());
        }

        app.tick();
        terminal.draw(|f| ui::draw(f, app))?;

        // Poll with a 100ms timeout so counters and state stay live.
        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        match event::read()? {
            Event::Key(key) => {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Esc => app.quit(),
                    KeyCode::Char(c) if c.eq_ignore_ascii_case(&app.hotkeys.stop) => {
                        app.stop_or_quit();
                    }
                    KeyCode::Char(c) if c.eq_ignore_ascii_case(&app.hotkeys.pause) => {
                        app.toggle_pause();
                    }
                    KeyCode::Char(c @ '1'..='9') => {
                        app.trigger_sequence(c.to_digit(10).unwrap_or(0));
                    }
                    KeyCode::Char('s') | KeyCode::Char('S') => app.start_session(),
                    KeyCode::Char('r') | KeyCode::Char('R') => app.reset_counters(),
                    KeyCode::Char('c') | KeyCode::Char('C') => app.save_profile_snapshot(),
                    KeyCode::Char('o') | KeyCode::Char('O') => app.load_saved_config(),
                    KeyCode::Up | KeyCode::Char('k') | KeyCode::Char('K') => app.move_up(),
                    KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('J') => app.move_down(),
                    KeyCode::Char(' ') => app.toggle_selected(),
                    KeyCode::Char('l') | KeyCode::Char('L') => app.toggle_log(),
                    _ => {}
                }
            }
            Event::Mouse(mouse) => match mouse.kind {
                MouseEventKind::ScrollUp => app.scroll_log_up(3),
                MouseEventKind::ScrollDown => app.scroll_log_down(3),
                _ => {}
            },
            _ => {}
        }
    }
}
