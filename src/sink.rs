use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Write a finished table to `<out_dir>/<name>.json`, replacing whatever
/// was there before.
pub fn write_table<T: Serialize>(out_dir: &str, name: &str, table: &T) -> Result<PathBuf> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output dir '{}'", out_dir))?;

    let path = Path::new(out_dir).join(format!("{}.json", name));
    let body = serde_json::to_string_pretty(table).context("Failed to serialize table")?;
    std::fs::write(&path, body).with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(path)
}

/// Opening-price snapshot written by a previous run.
pub fn load_opening_prices(path: &str) -> Result<BTreeMap<String, f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read opening-price snapshot '{}'", path))?;
    serde_json::from_str(&text).context("Failed to parse opening-price snapshot")
}

pub fn save_opening_prices(path: &str, prices: &BTreeMap<String, f64>) -> Result<()> {
    let body = serde_json::to_string_pretty(prices).context("Failed to serialize opening prices")?;
    std::fs::write(path, body)
        .with_context(|| format!("Failed to write opening-price snapshot '{}'", path))?;
    Ok(())
}
