//! Session log for the editor.
//!
//! One file per session, truncated at launch:
//!   Windows:  `%APPDATA%\MaskFE\maskfe.log`
//!   Linux:    `~/.local/share/MaskFE/maskfe.log`
//!   macOS:    `~/Library/Application Support/MaskFE/maskfe.log`
//!
//! Write through `log_info!` / `log_warn!` / `log_err!`.  Nothing is recorded
//! until [`init`] opens the file or [`set_echo`] turns on stderr mirroring,
//! so library users and tests get silent no-ops.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(test)]
#[path = "logger_test.rs"]
mod logger_test;

static SINK: OnceLock<Mutex<File>> = OnceLock::new();
static SINK_PATH: OnceLock<PathBuf> = OnceLock::new();
static ECHO: AtomicBool = AtomicBool::new(false);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
    Panic,
}

impl Level {
    pub fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Panic => "PANIC",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::record($crate::logger::Level::Info, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::record($crate::logger::Level::Warn, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::record($crate::logger::Level::Error, format_args!($($arg)*))
    };
}

/// Where this session is being logged, once [`init`] succeeded.
pub fn log_path() -> Option<&'static PathBuf> {
    SINK_PATH.get()
}

/// Mirror every record to stderr (headless `--verbose`).
pub fn set_echo(on: bool) {
    ECHO.store(on, Ordering::Relaxed);
}

/// True when a record would go anywhere.
pub fn is_active() -> bool {
    SINK.get().is_some() || ECHO.load(Ordering::Relaxed)
}

/// `[HH:MM:SS] [LEVEL] message`
pub fn format_record(clock: &str, level: Level, msg: fmt::Arguments<'_>) -> String {
    format!("[{}] [{}] {}", clock, level, msg)
}

/// Emit one record.  I/O failures are swallowed.
pub fn record(level: Level, msg: fmt::Arguments<'_>) {
    if !is_active() {
        return;
    }
    let line = format_record(&clock(), level, msg);
    if ECHO.load(Ordering::Relaxed) {
        eprintln!("{}", line);
    }
    append(&line);
}

fn append(line: &str) {
    if let Some(sink) = SINK.get()
        && let Ok(mut file) = sink.lock()
    {
        let _ = writeln!(file, "{}", line);
    }
}

/// Open (truncating) the session file and hook panics into it.  A file that
/// cannot be opened leaves logging disabled.
pub fn init() {
    let path = data_dir().join("MaskFE").join("maskfe.log");
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let file = match OpenOptions::new().create(true).write(true).truncate(true).open(&path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("[logger] cannot open {}: {}", path.display(), e);
            return;
        }
    };
    let _ = SINK.set(Mutex::new(file));
    let _ = SINK_PATH.set(path.clone());

    append(&format!("=== MaskFE session (unix {}) ===", unix_secs().unwrap_or(0)));
    append(&format!("Log file: {}", path.display()));
    append("");

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        record(Level::Panic, format_args!("{}", info));
        prev(info);
    }));
}

fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(appdata) = std::env::var("APPDATA") {
        return PathBuf::from(appdata);
    }
    #[cfg(target_os = "macos")]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join("Library").join("Application Support");
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".local").join("share"),
        Err(_) => PathBuf::from("."),
    }
}

fn unix_secs() -> Option<u64> {
    SystemTime::now().duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}

/// UTC wall clock, `HH:MM:SS`.
fn clock() -> String {
    match unix_secs() {
        Some(secs) => format!("{:02}:{:02}:{:02}", (secs % 86400) / 3600, (secs % 3600) / 60, secs % 60),
        None => "??:??:??".to_string(),
    }
}
