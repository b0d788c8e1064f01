//! Spec document loading.
//!
//! Supports YAML and JSON serializations of the same tree; the format
//! is picked by file extension. Loaded documents are validated before
//! they reach the engine.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

use super::ScrawlSpec;

/// Parses a YAML spec document.
pub fn from_yaml(input: &str) -> Result<ScrawlSpec> {
    let spec: ScrawlSpec = serde_yaml::from_str(input)?;
    Ok(spec)
}

/// Parses a JSON spec document.
pub fn from_json(input: &str) -> Result<ScrawlSpec> {
    let spec: ScrawlSpec = serde_json::from_str(input)?;
    Ok(spec)
}

/// Loads a spec document from a `.yaml`/`.yml`/`.json` file.
///
/// # Errors
///
/// Returns [`Error::Config`] for an unsupported extension, and the
/// underlying parse or IO error otherwise. The loaded spec is
/// validated before being returned.
pub fn load_file(path: impl AsRef<Path>) -> Result<ScrawlSpec> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let contents = fs::read_to_string(path)?;
    let spec = match extension.as_str() {
        "yaml" | "yml" => from_yaml(&contents)?,
        "json" => from_json(&contents)?,
        other => {
            return Err(Error::config(format!(
                "unsupported config file type '.{other}' at {}",
                path.display()
            )));
        }
    };

    spec.validate()?;
    Ok(spec)
}

// ============================================================================
// Tests
// ============================================================================
