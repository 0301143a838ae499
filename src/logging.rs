use std::{
    fs::OpenOptions,
    io::Write,
    path::Path,
    sync::{
        atomic::{AtomicBool, AtomicU8, Ordering},
        mpsc::{self, Sender},
        OnceLock,
    },
    thread,
};

use crate::paths::log_path;

/* =========================
   GLOBAL STATE
   ========================= */

static DEBUG: AtomicBool = AtomicBool::new(false);
static THRESHOLD: AtomicU8 = AtomicU8::new(Level::Warn as u8);
static LOG_TX: OnceLock<Sender<String>> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl Level {
    pub fn parse(raw: &str) -> Level {
        match raw.trim().to_ascii_lowercase().as_str() {
            "error" => Level::Error,
            "info" => Level::Info,
            "debug" | "trace" => Level::Debug,
            _ => Level::Warn,
        }
    }

    fn from_tag(tag: &str) -> Level {
        match tag {
            "ERROR" => Level::Error,
            "WARN" => Level::Warn,
            "INFO" => Level::Info,
            _ => Level::Debug,
        }
    }
}

/* =========================
   PUBLIC API
   ========================= */

/// Starts the background writer. Later calls only update the level.
pub fn init(debug: bool, level: &str) {
    set_debug(debug);
    set_level(level);

    if LOG_TX.get().is_some() {
        return;
    }

    let path = log_path();
    let (tx, rx) = mpsc::channel::<String>();
    if LOG_TX.set(tx).is_err() {
        return;
    }

    thread::spawn(move || {
        let mut file = match open_log(&path) {
            Some(file) => file,
            None => return,
        };

        while let Ok(line) = rx.recv() {
            let _ = writeln!(file, "{line}");
            let _ = file.flush();
        }
    });
}

pub fn set_debug(debug: bool) {
    DEBUG.store(debug, Ordering::Relaxed);
}

pub fn set_level(level: &str) {
    THRESHOLD.store(Level::parse(level) as u8, Ordering::Relaxed);
}

/// Debug mode lets everything through; otherwise the configured level decides.
/// Warnings and errors are always written.
#[inline]
pub fn should_log(level: &str) -> bool {
    if DEBUG.load(Ordering::Relaxed) {
        return true;
    }
    let level = Level::from_tag(level);
    level <= Level::Warn || level as u8 <= THRESHOLD.load(Ordering::Relaxed)
}

/* =========================
   INTERNAL
   ========================= */

#[inline]
pub fn enqueue(level: &str, msg: String) {
    if let Some(tx) = LOG_TX.get() {
        let ts = timestamp();
        let _ = tx.send(format!("{ts} [{level}] {msg}"));
    }
}

fn open_log(path: &Path) -> Option<std::fs::File> {
    if let Some(dir) = path.parent() {
        let _ = std::fs::create_dir_all(dir);
    }
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("planetboy-wallpaper: cannot open {}: {e}", path.display());
            None
        }
    }
}

fn timestamp() -> String {
    let now = chrono::Local::now();
    now.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

/* =========================
   MACROS
   ========================= */

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {{
        if $crate::logging::should_log("DEBUG") {
            $crate::logging::enqueue(
                "DEBUG",
                format!($($arg)*)
            );
        }
    }};
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {{
        if $crate::logging::should_log("INFO") {
            $crate::logging::enqueue(
                "INFO",
                format!($($arg)*)
            );
        }
    }};
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {{
        $crate::logging::enqueue(
            "WARN",
            format!($($arg)*)
        );
    }};
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {{
        $crate::logging::enqueue(
            "ERROR",
            format!($($arg)*)
        );
    }};
}
