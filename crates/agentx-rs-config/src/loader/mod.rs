//! Layered configuration loader.
//!
//! Collects config layers from well-known locations, validates each against the
//! schema, merges them in precedence order while honoring locked keys from the
//! requirements layer, and produces the effective `AgentxConfig`.

mod discovery;
mod layer_io;
mod merge;
mod schema;

#[cfg(test)]
mod tests;

use crate::model::CONTEXT_PLACEHOLDER;
use crate::{AgentxConfig, ConfigError};
use log::{debug, info};
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Config filename looked up in every layer location.
const DEFAULT_CONFIG_FILE: &str = "agentx.json5";
/// Per-user and per-repo config directory.
const DEFAULT_CONFIG_DIR: &str = ".agentx";
/// Entries that mark a project root.
const DEFAULT_PROJECT_ROOT_MARKERS: &[&str] = &[".git", DEFAULT_CONFIG_DIR];

#[cfg(unix)]
const SYSTEM_CONFIG_PATH: &str = "/etc/agentx/agentx.json5";
#[cfg(unix)]
const SYSTEM_REQUIREMENTS_PATH: &str = "/etc/agentx/requirements.json5";
#[cfg(windows)]
const SYSTEM_CONFIG_PATH: &str = "C:\\ProgramData\\agentx\\agentx.json5";
#[cfg(windows)]
const SYSTEM_REQUIREMENTS_PATH: &str = "C:\\ProgramData\\agentx\\requirements.json5";

/// Effective config plus the layers that produced it.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub config: AgentxConfig,
    pub layers: Vec<ConfigLayer>,
}

/// Origin of a config layer, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
    /// Locked values that later layers cannot override.
    Requirements,
    System,
    User,
    /// `agentx.json5` at the project root.
    Project,
    Cwd,
    /// `.agentx/agentx.json5` at the project root.
    Repo,
    /// Explicit `--config` paths.
    Runtime,
}

impl ConfigLayerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigLayerSource::Requirements => "requirements",
            ConfigLayerSource::System => "system",
            ConfigLayerSource::User => "user",
            ConfigLayerSource::Project => "project",
            ConfigLayerSource::Cwd => "cwd",
            ConfigLayerSource::Repo => "repo",
            ConfigLayerSource::Runtime => "runtime",
        }
    }
}

/// A layer that was found on disk and merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLayer {
    pub source: ConfigLayerSource,
    pub path: PathBuf,
}

/// Locations consulted by `load_layered_with_options`.
#[derive(Debug, Clone)]
pub struct LayeredConfigOptions {
    /// Working directory used to find local layers and the project root.
    pub cwd: PathBuf,
    pub system_config_path: Option<PathBuf>,
    pub user_config_path: Option<PathBuf>,
    pub requirements_path: Option<PathBuf>,
    /// Override files applied last; each must exist.
    pub runtime_paths: Vec<PathBuf>,
    pub project_root_markers: Vec<String>,
}

impl LayeredConfigOptions {
    /// Default layer locations for the provided cwd.
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            system_config_path: discovery::default_system_config_path(),
            user_config_path: discovery::default_user_config_path(),
            requirements_path: discovery::default_requirements_path(),
            runtime_paths: Vec::new(),
            project_root_markers: DEFAULT_PROJECT_ROOT_MARKERS
                .iter()
                .map(|marker| marker.to_string())
                .collect(),
        }
    }

    /// Add a runtime override applied after every other layer.
    pub fn with_runtime_path(mut self, path: impl AsRef<Path>) -> Self {
        self.runtime_paths.push(path.as_ref().to_path_buf());
        self
    }
}

impl AgentxConfig {
    /// Load a single config file without layering.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("loading config from path: {}", path.display());
        let contents = fs::read_to_string(path)?;
        let value: Value = json5::from_str(&contents)?;
        config_from_value(value, "config")
    }

    /// Load a single config from JSON5 contents without layering.
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config from raw contents (len={})", contents.len());
        let value: Value = json5::from_str(contents)?;
        config_from_value(value, "config")
    }

    /// Load the layered config stack using the default locations.
    pub fn load_layered(cwd: impl AsRef<Path>) -> Result<LayeredConfig, ConfigError> {
        Self::load_layered_with_options(LayeredConfigOptions::new(cwd))
    }

    /// Load the layered config stack.
    ///
    /// Precedence (low -> high): system, user, project, cwd, repo, runtime.
    /// Keys set in the requirements layer win over all of them.
    pub fn load_layered_with_options(
        options: LayeredConfigOptions,
    ) -> Result<LayeredConfig, ConfigError> {
        let cwd = discovery::normalize_path(&options.cwd)?;
        info!("loading layered config (cwd={})", cwd.display());

        let requirements = match options.requirements_path.as_deref() {
            Some(path) => layer_io::read_optional(ConfigLayerSource::Requirements, path)?,
            None => None,
        };

        let mut layers = Vec::new();
        let mut seen = HashSet::new();
        let mut overlays = Vec::new();
        for candidate in discovery::candidates(&options, &cwd) {
            if !seen.insert(discovery::unique_path(&candidate.path)) {
                debug!(
                    "skipping duplicate layer (source={:?}, path={})",
                    candidate.source,
                    candidate.path.display()
                );
                continue;
            }
            let loaded = if candidate.required {
                Some(layer_io::read_required(candidate.source, &candidate.path)?)
            } else {
                layer_io::read_optional(candidate.source, &candidate.path)?
            };
            if let Some(loaded) = loaded {
                layers.push(loaded.meta.clone());
                overlays.push(loaded);
            }
        }

        let mut merged = Value::Object(serde_json::Map::new());
        let locked = requirements.as_ref().map(|layer| &layer.value);
        for overlay in &overlays {
            merge::merge_layer(&mut merged, &overlay.value, locked);
        }
        if let Some(requirements) = requirements {
            merge::merge_layer(&mut merged, &requirements.value, None);
            layers.insert(0, requirements.meta);
        }

        let config = config_from_value(merged, "effective")?;
        info!("layered config loaded (layers={})", layers.len());
        Ok(LayeredConfig { config, layers })
    }

    /// Check invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory.recall_k == 0 {
            return Err(ConfigError::Invalid(
                "memory.recall_k must be greater than zero".to_string(),
            ));
        }
        if self.memory.dimension == Some(0) {
            return Err(ConfigError::Invalid(
                "memory.dimension must be greater than zero".to_string(),
            ));
        }
        if self.memory.path.trim().is_empty() {
            return Err(ConfigError::Invalid("memory.path must not be empty".to_string()));
        }
        if !self.prompts.answer.contains(CONTEXT_PLACEHOLDER) {
            return Err(ConfigError::Invalid(format!(
                "prompts.answer must contain the {CONTEXT_PLACEHOLDER} placeholder"
            )));
        }
        for (name, value) in [
            ("timeouts.embedding_ms", self.timeouts.embedding_ms),
            ("timeouts.llm_ms", self.timeouts.llm_ms),
            ("timeouts.persist_ms", self.timeouts.persist_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        let capture = &self.memory.capture;
        for (field, patterns) in [
            ("deny_patterns", &capture.deny_patterns),
            ("redact_patterns", &capture.redact_patterns),
        ] {
            for (idx, pattern) in patterns.iter().enumerate() {
                if let Err(err) = Regex::new(pattern) {
                    return Err(ConfigError::InvalidField {
                        path: format!("memory.capture.{field}[{idx}]"),
                        message: err.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// A parsed, schema-checked layer.
#[derive(Debug, Clone)]
struct LoadedLayer {
    meta: ConfigLayer,
    value: Value,
}

fn config_from_value(value: Value, label: &str) -> Result<AgentxConfig, ConfigError> {
    schema::validate_layer_schema(&value, label)?;
    let config: AgentxConfig = serde_json::from_value(value)?;
    config.validate()?;
    Ok(config)
}
