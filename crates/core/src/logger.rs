use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{mpsc, Mutex, OnceLock};

use chrono::Local;

static LOGGER: OnceLock<Mutex<Logger>> = OnceLock::new();

struct Logger {
    file: File,
    tui_tx: Option<mpsc::Sender<String>>,
    prefixes: HashMap<String, u8>,
}

// Color indices for TUI rendering (mapped in the tui crate).
pub const COLOR_GRAY: u8 = 1;
pub const COLOR_BLUE: u8 = 2;
pub const COLOR_GREEN: u8 = 3;

/// Initialize the global logger, truncating `tapper.log` in `log_dir`.
/// Logging before init (or in tests) is a silent no-op.
pub fn init(log_dir: &Path) {
    fs::create_dir_all(log_dir).ok();
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_dir.join("tapper.log"))
        .expect("failed to open log file");

    LOGGER
        .set(Mutex::new(Logger {
            file,
            tui_tx: None,
            prefixes: HashMap::new(),
        }))
        .ok();
}

/// Wire the channel feeding the TUI log panel.
pub fn set_tui_sender(tx: mpsc::Sender<String>) {
    if let Some(logger) = LOGGER.get() {
        logger.lock().unwrap().tui_tx = Some(tx);
    }
}

/// Register a subsystem prefix with a display color used by `*_p` calls.
pub fn register_prefix(prefix: &str, color: u8) {
    if let Some(logger) = LOGGER.get() {
        logger.lock().unwrap().prefixes.insert(prefix.to_string(), color);
    }
}

// The TUI channel carries structured records with \x1f separators:
// level\x1fprefix\x1fcolor\x1ftimestamp\x1fmessage. The file gets plain text.
fn write_log(level: &str, prefix: &str, color: u8, msg: &str) {
    let ts = Local::now().format("%H:%M:%S").to_string();

    let file_line = if prefix.is_empty() {
        format!("[{}] [{}] {}", ts, level, msg)
    } else {
        format!("[{}] [{}] [{}] {}", ts, level, prefix, msg)
    };
    let tui_line = format!("{}\x1f{}\x1f{}\x1f{}\x1f{}", level, prefix, color, ts, msg);

    if let Some(logger) = LOGGER.get() {
        let mut l = logger.lock().unwrap();
        writeln!(l.file, "{}", file_line).ok();
        if let Some(tx) = &l.tui_tx {
            tx.send(tui_line).ok();
        }
    }
}

fn prefix_color(prefix: &str) -> u8 {
    LOGGER
        .get()
        .and_then(|l| l.lock().ok())
        .and_then(|l| l.prefixes.get(prefix).copied())
        .unwrap_or(0)
}

pub fn info(msg: &str) {
    write_log("INFO", "", 0, msg);
}

pub fn warn(msg: &str) {
    write_log("WARN", "", 0, msg);
}

pub fn error(msg: &str) {
    write_log("ERROR", "", 0, msg);
}

pub fn info_p(prefix: &str, msg: &str) {
    write_log("INFO", prefix, prefix_color(prefix), msg);
}

pub fn warn_p(prefix: &str, msg: &str) {
    write_log("WARN", prefix, prefix_color(prefix), msg);
}

pub fn error_p(prefix: &str, msg: &str) {
    write_log("ERROR", prefix, prefix_color(prefix), msg);
}
