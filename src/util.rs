use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};

/// Try to enable ANSI escape sequence support on Windows consoles.
/// Returns true if enabling succeeded, false otherwise.
#[cfg(windows)]
pub fn try_enable_ansi_on_windows() -> bool {
    enable_ansi_support::enable_ansi_support().is_ok()
}

// On non-Windows platforms terminals support ANSI by default; provide a
// no-op fallback to avoid referencing the optional crate.
#[cfg(not(windows))]
pub fn try_enable_ansi_on_windows() -> bool {
    false
}

/// Convert a byte count into a human readable string using IEC units.
pub fn human_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    let b = bytes as f64;
    if b >= GB {
        format!("{:.2} GiB", b / GB)
    } else if b >= MB {
        format!("{:.2} MiB", b / MB)
    } else if b >= KB {
        format!("{:.2} KiB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

/// Canonical per-user state directory (`~/.upsync`).
pub fn state_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".".to_owned() + env!("CARGO_PKG_NAME")))
}

/// Spinner shown while a transfer is in flight. The session API is blocking,
/// so a steady tick is the only liveness signal the terminal gets.
pub fn transfer_spinner(msg: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Install the --verbose tracing subscriber: debug-level fmt layer writing
/// through a daily-rolling appender under `~/.upsync/logs`. Falls back to
/// stderr when no home directory is available. The returned guard must stay
/// alive for the duration of the process.
pub fn init_verbose_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("upsync=debug,ups=debug"));
    match state_dir() {
        Some(dir) => {
            let logs = dir.join("logs");
            let _ = std::fs::create_dir_all(&logs);
            let appender = tracing_appender::rolling::daily(logs, "upsync.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

/// Append structured failures as JSON Lines under the canonical logs
/// directory (or `path` when given) and return the file written to.
pub fn write_failures_jsonl(
    path: Option<PathBuf>,
    failures: &[crate::SyncError],
) -> Option<PathBuf> {
    let jsonl_path = match path {
        Some(p) => p,
        None => {
            let dir = state_dir()?.join("logs");
            let _ = std::fs::create_dir_all(&dir);
            dir.join("failures.jsonl")
        }
    };
    let mut f = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&jsonl_path)
        .ok()?;
    let stamp = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
    for err in failures {
        let obj = serde_json::json!({
            "ts": stamp,
            "variant": err.variant_name(),
            "content_delivered": err.content_was_delivered(),
            "message": err.to_string(),
        });
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(f, "{}", line);
        }
    }
    Some(jsonl_path)
}
