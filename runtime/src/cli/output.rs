//! Output helpers shared by the subcommands.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

/// Whether `--json` was given.
pub fn is_json() -> bool {
    std::env::var("DASHTAP_JSON").is_ok()
}

/// Whether `--quiet` was given.
pub fn is_quiet() -> bool {
    std::env::var("DASHTAP_QUIET").is_ok()
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("  Error: could not serialize output: {e}"),
    }
}

/// Write `value` as pretty JSON to `path`, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}
