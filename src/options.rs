use std::{fs, path::Path};

use anyhow::{Context, Result};

use crate::validate::types::ValidationOptions;

/// Save validation options to a JSON file.
pub fn save_validation_options(path: &Path, options: &ValidationOptions) -> Result<()> {
    let content = serde_json::to_string_pretty(options)
        .context("failed to serialize validation options as JSON")?;
    fs::write(path, content)
        .with_context(|| format!("failed to save validation options: {}", path.display()))?;
    Ok(())
}

/// Load validation options from a JSON file. Missing fields take defaults.
pub fn load_validation_options(path: &Path) -> Result<ValidationOptions> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to load validation options: {}", path.display()))?;
    let options: ValidationOptions =
        serde_json::from_str(&content).context("failed to parse validation options JSON")?;
    Ok(options)
}
