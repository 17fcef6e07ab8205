//! Settings and chart files
//!
//! Both are JSON. Settings files hold a (possibly partial) configuration;
//! chart files hold either a fingering chart or a nine-note keyboard chart:
//!
//! ```json
//! [["G5", "*.***.oooo"], ["G#5", "*.**o.**@o"], ["A5", "*.**o.oooo"]]
//! ["C5", "D5", "E5", "F5", "G5", "A5", "B5", "C6", "D6"]
//! ```

use crate::fingering::Fingering;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Contents of a chart file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChartFile {
    /// Note/fingering pairs, for Breath and Lip modes
    Fingering(Vec<Fingering>),
    /// Notes in keyboard position order, for Keyboard mode
    Keyboard(Vec<String>),
}

/// Load a JSON file
///
/// Unlike application config, a file named on the command line must exist
/// and parse.
pub fn load_json<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    log::info!("load_json: Loading from {:?}", path);

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {:?}", path))?;
    let value = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse JSON in {:?}", path))?;

    Ok(value)
}

/// Save a value as pretty-printed JSON (2-space indent, trailing newline)
///
/// Creates parent directories if they don't exist.
pub fn save_json<T>(value: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    log::info!("save_json: Saving to {:?}", path);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
    }

    let mut json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
    json.push('\n');

    std::fs::write(path, json).with_context(|| format!("Failed to write file: {:?}", path))?;

    Ok(())
}
