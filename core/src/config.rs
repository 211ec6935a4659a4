//! Navigation configuration.
//!
//! Loaded from TOML, then optionally overridden from `WAYSTACK_*` environment
//! variables. Key material is deliberately not part of this struct.

use crate::codec::DEFAULT_MAX_INFLATED;
use crate::error::{NavError, NavResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Maximum URL-embedded token length before falling back to POST.
pub const DEFAULT_GET_THRESHOLD: usize = 2000;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Programming errors are reported with their message.
    #[default]
    Dev,
    /// Programming errors degrade to a generic error page.
    Prod,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Get,
    Post,
    Database,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Get => "get",
            BackendKind::Post => "post",
            BackendKind::Database => "database",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Keying {
    #[default]
    Global,
    PerSession,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NavConfig {
    pub mode: Mode,
    pub backend: BackendKind,
    pub get_threshold: usize,
    /// Byte budget for an encoded call stack; `None` disables eviction.
    pub stack_ceiling: Option<usize>,
    pub encrypt: bool,
    pub keying: Keying,
    /// Query/form parameter that carries the token.
    pub token_key: String,
    pub max_inflated_bytes: usize,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Dev,
            backend: BackendKind::Get,
            get_threshold: DEFAULT_GET_THRESHOLD,
            stack_ceiling: None,
            encrypt: false,
            keying: Keying::Global,
            token_key: "wst".to_string(),
            max_inflated_bytes: DEFAULT_MAX_INFLATED,
        }
    }
}

impl NavConfig {
    pub fn from_toml_str(text: &str) -> NavResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| NavError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> NavResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| NavError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Applies `WAYSTACK_MODE`, `WAYSTACK_BACKEND`, `WAYSTACK_GET_THRESHOLD`
    /// and `WAYSTACK_STACK_CEILING` on top of the current values.
    pub fn with_env_overrides(self) -> NavResult<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> NavResult<Self> {
        if let Some(mode) = lookup("WAYSTACK_MODE") {
            self.mode = match mode.to_ascii_lowercase().as_str() {
                "prod" | "production" => Mode::Prod,
                "dev" | "development" => Mode::Dev,
                other => return Err(NavError::Config(format!("unknown mode `{other}`"))),
            };
        }
        if let Some(backend) = lookup("WAYSTACK_BACKEND") {
            self.backend = match backend.to_ascii_lowercase().as_str() {
                "get" => BackendKind::Get,
                "post" => BackendKind::Post,
                "database" | "db" => BackendKind::Database,
                other => return Err(NavError::Config(format!("unknown backend `{other}`"))),
            };
        }
        if let Some(threshold) = lookup("WAYSTACK_GET_THRESHOLD") {
            self.get_threshold = parse_bytes("WAYSTACK_GET_THRESHOLD", &threshold)?;
        }
        if let Some(ceiling) = lookup("WAYSTACK_STACK_CEILING") {
            self.stack_ceiling = match ceiling.trim() {
                "" | "none" => None,
                value => Some(parse_bytes("WAYSTACK_STACK_CEILING", value)?),
            };
        }
        self.validate()?;
        tracing::debug!(
            mode = ?self.mode,
            backend = self.backend.as_str(),
            get_threshold = self.get_threshold,
            stack_ceiling = ?self.stack_ceiling,
            "navigation config resolved"
        );
        Ok(self)
    }

    pub fn validate(&self) -> NavResult<()> {
        if self.token_key.is_empty() {
            return Err(NavError::Config("token_key must not be empty".into()));
        }
        if self.get_threshold == 0 {
            return Err(NavError::Config("get_threshold must be positive".into()));
        }
        if self.max_inflated_bytes == 0 {
            return Err(NavError::Config("max_inflated_bytes must be positive".into()));
        }
        Ok(())
    }
}

fn parse_bytes(name: &str, value: &str) -> NavResult<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| NavError::Config(format!("{name} must be a byte count, got `{value}`")))
}
