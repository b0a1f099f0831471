//! Terminal output formatting.
//!
//! Human-readable lines with colored symbols, or one JSON object per line
//! when `--json` is set. Quiet mode suppresses everything except warnings and
//! errors.

use std::fmt::Display;
use std::sync::{OnceLock, RwLock};

use owo_colors::OwoColorize;
use serde_json::json;

/// Runtime output configuration shared by CLI handlers.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Emit machine-readable JSON output instead of human-readable text.
    pub json: bool,
    /// Suppress non-essential output.
    pub quiet: bool,
}

impl OutputConfig {
    #[must_use]
    pub const fn new(json: bool, quiet: bool) -> Self {
        Self { json, quiet }
    }
}

static OUTPUT_CONFIG: OnceLock<RwLock<OutputConfig>> = OnceLock::new();

fn config_cell() -> &'static RwLock<OutputConfig> {
    OUTPUT_CONFIG.get_or_init(|| RwLock::new(OutputConfig::default()))
}

fn read_config() -> OutputConfig {
    match config_cell().read() {
        Ok(config) => *config,
        Err(poisoned) => *poisoned.into_inner(),
    }
}

fn write_config(config: OutputConfig) {
    match config_cell().write() {
        Ok(mut current) => *current = config,
        Err(poisoned) => *poisoned.into_inner() = config,
    }
}

fn emit_json_line(kind: &str, payload: serde_json::Value) {
    println!("{}", json!({ "type": kind, "payload": payload }));
}

/// Route one message: a JSON line in JSON mode, otherwise `human` unless
/// quiet mode hides it. Essential messages survive quiet mode.
fn emit(
    kind: &str,
    payload: impl FnOnce() -> serde_json::Value,
    essential: bool,
    human: impl FnOnce(),
) {
    let config = read_config();
    if config.json {
        emit_json_line(kind, payload());
    } else if essential || !config.quiet {
        human();
    }
}

/// Apply output settings from global CLI flags.
pub fn configure(config: OutputConfig) {
    write_config(config);
}

#[must_use]
pub fn is_json() -> bool {
    read_config().json
}

/// Print the tool name and version.
pub fn header(version: &str) {
    emit(
        "header",
        || json!({ "app": "stagehand", "version": version }),
        false,
        || println!("{} {}", "stagehand".bold(), version.dimmed()),
    );
}

/// Print a whole document as one JSON line. Ignored outside JSON mode.
pub fn document(kind: &str, payload: serde_json::Value) {
    if read_config().json {
        emit_json_line(kind, payload);
    }
}

/// Print a labeled value.
pub fn field(label: &str, value: impl Display) {
    let value = value.to_string();
    emit(
        "field",
        || json!({ "label": label, "value": value }),
        false,
        || println!("  {:<16} {}", label.dimmed(), value),
    );
}

pub fn success(message: &str) {
    emit(
        "success",
        || json!({ "message": message }),
        false,
        || println!("  {} {}", "✓".green(), message),
    );
}

pub fn warning(message: &str) {
    emit(
        "warning",
        || json!({ "message": message }),
        true,
        || println!("  {} {}", "⚠".yellow(), message),
    );
}

/// Print an error to stderr, in both modes.
pub fn error(message: &str) {
    if read_config().json {
        eprintln!("{}", json!({ "type": "error", "payload": { "message": message } }));
    } else {
        eprintln!("  {} {}", "×".red(), message);
    }
}

pub fn section(title: &str) {
    emit(
        "section",
        || json!({ "title": title }),
        false,
        || println!("\n{}", title.bold()),
    );
}

pub fn note(message: &str) {
    emit(
        "note",
        || json!({ "message": message }),
        false,
        || println!("  {} {}", "·".dimmed(), message.dimmed()),
    );
}

/// Format a highlighted value in cyan.
pub fn highlight(value: impl Display) -> String {
    let value = value.to_string();
    if is_json() {
        return value;
    }
    format!("{}", value.cyan())
}

/// Format a dimmed value.
pub fn muted(value: impl Display) -> String {
    let value = value.to_string();
    if is_json() {
        return value;
    }
    format!("{}", value.dimmed())
}

/// `Some(v)` as `v{unit}`, `None` as `n/a`.
#[must_use]
pub fn metric(value: Option<f64>, unit: &str) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}{unit}"))
}
