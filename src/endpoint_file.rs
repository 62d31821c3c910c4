// Side file holding the last target URL (`stats_url.txt`)

use std::path::Path;

use anyhow::Context;

pub fn write_endpoint_file(path: &Path, url: &str) -> anyhow::Result<()> {
    std::fs::write(path, url)
        .with_context(|| format!("failed to write stats url file {}", path.display()))
}

/// First line of the file, trimmed. A missing or blank file is an error.
pub fn read_endpoint_file(path: &Path) -> anyhow::Result<String> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to open stats url file {}", path.display()))?;
    let line = content.lines().next().unwrap_or("").trim();
    anyhow::ensure!(!line.is_empty(), "stats url file {} is empty", path.display());
    Ok(line.to_string())
}
