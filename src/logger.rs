//! Session logger: all `tracing` output goes to a single file in the OS data
//! directory.
//!
//! The file is **truncated at each launch**, so it only ever contains output
//! from the most recent run.
//!
//! Log location:
//!   Windows:  `%APPDATA%\MaskPaint\maskpaint.log`
//!   Linux:    `~/.local/share/MaskPaint/maskpaint.log`
//!   macOS:    `~/Library/Application Support/MaskPaint/maskpaint.log`
//!
//! With `verbose` the same records are mirrored to stderr.  `RUST_LOG`
//! overrides the default level filter.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Returns the path to the current session log file.
pub fn log_path() -> Option<&'static PathBuf> {
    LOG_PATH.get()
}

/// Initialise the session logger.  Call once, before any logging.
///
/// * Creates (or truncates) the log file and writes a session header.
/// * Installs the global `tracing` subscriber.
/// * Installs a panic hook that records the panic before the default handler
///   runs.
///
/// A log file that cannot be opened is not fatal: logging then goes to
/// stderr only (when verbose) or nowhere.
pub fn init(verbose: bool) {
    let path = log_file_path();
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path);

    let file = match file {
        Ok(mut f) => {
            let _ = writeln!(f, "=== MaskPaint session started {} ===", human_timestamp());
            let _ = writeln!(f, "Log file: {}", path.display());
            let _ = writeln!(f);
            let _ = LOG_PATH.set(path);
            Some(Arc::new(f))
        }
        Err(e) => {
            eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
            None
        }
    };

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false);

    // try_init: a second call (tests, embedding) keeps the first subscriber.
    let _ = match (file.clone(), verbose) {
        (Some(f), true) => builder.with_writer(f.and(std::io::stderr)).try_init(),
        (Some(f), false) => builder.with_writer(f).try_init(),
        (None, true) => builder.with_writer(std::io::stderr).try_init(),
        (None, false) => builder.with_writer(std::io::sink).try_init(),
    };

    if let Some(f) = file {
        let prev = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let mut out: &File = &f;
            let _ = writeln!(out, "[{}] [PANIC] {}", timestamp(), info);
            prev(info);
        }));
    }
}

fn log_file_path() -> PathBuf {
    data_dir().join("MaskPaint").join("maskpaint.log")
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library").join("Application Support");
        }
    }
    // Linux / fallback
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

/// HH:MM:SS (UTC) within the current day.
fn timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => {
            let secs = d.as_secs();
            format!("{:02}:{:02}:{:02}", (secs % 86400) / 3600, (secs % 3600) / 60, secs % 60)
        }
        Err(_) => "??:??:??".to_string(),
    }
}

fn human_timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => format!("(unix {})", d.as_secs()),
        Err(_) => "(unknown time)".to_string(),
    }
}
