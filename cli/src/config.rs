//! Effective configuration dump

use anyhow::{Context, Result};
use waystack_core::NavConfig;

pub fn run_config_command(path: Option<&str>) -> Result<()> {
    let base = match path {
        Some(path) => NavConfig::from_file(path).with_context(|| format!("loading {path}"))?,
        None => NavConfig::default(),
    };
    let config = base
        .with_env_overrides()
        .context("applying WAYSTACK_* overrides")?;

    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
