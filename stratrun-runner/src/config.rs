//! Serializable run configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stratrun_core::protocol::ProtocolTags;
use thiserror::Error;

use crate::profile::{Capabilities, EngineProfile};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("unknown engine profile '{0}' (expected one of: {known})", known = EngineProfile::builtin_names().join(", "))]
    UnknownProfile(String),
}

/// Partial protocol tag override; unset tags keep the profile's value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equity_tag: Option<String>,
}

/// Everything needed to launch one strategy run.
///
/// Owned by the caller and never mutated by a run. Free-form tables use
/// `BTreeMap` so the canonical JSON, and therefore `config_hash`, does not
/// depend on key order in the source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Strategy identifier
    pub strategy: String,

    #[serde(default = "default_engine_profile")]
    pub engine_profile: String,

    /// Launcher executable; the artifact path is appended after `args`
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Child working directory (inherits the caller's when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    #[serde(default)]
    pub keep_artifacts: bool,

    /// Strategy parameters
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,

    /// Broker / capital settings
    #[serde(default)]
    pub engine: BTreeMap<String, serde_json::Value>,

    /// Environment overlay, applied last
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<ProtocolOverride>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Capabilities>,
}

fn default_engine_profile() -> String {
    EngineProfile::EVENT_DRIVEN.to_string()
}

impl RunConfig {
    /// Minimal config for `strategy` launched with `program`.
    pub fn new(strategy: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            engine_profile: default_engine_profile(),
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            keep_artifacts: false,
            params: BTreeMap::new(),
            engine: BTreeMap::new(),
            env: BTreeMap::new(),
            protocol: None,
            capabilities: None,
        }
    }

    /// Load and validate a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.strategy.trim().is_empty() {
            return Err(ConfigError::Invalid("strategy must not be empty".into()));
        }
        if self.program.trim().is_empty() {
            return Err(ConfigError::Invalid("program must not be empty".into()));
        }
        self.profile().map(|_| ())
    }

    /// Resolve the engine profile with this config's overrides applied.
    pub fn profile(&self) -> Result<EngineProfile, ConfigError> {
        let mut profile = EngineProfile::builtin(&self.engine_profile)
            .ok_or_else(|| ConfigError::UnknownProfile(self.engine_profile.clone()))?;

        if let Some(over) = &self.protocol {
            if let Some(tag) = &over.trade_tag {
                profile.tags.trade_tag = tag.clone();
            }
            if let Some(tag) = &over.equity_tag {
                profile.tags.equity_tag = tag.clone();
            }
        }
        if let Some(caps) = self.capabilities {
            profile.capabilities = caps;
        }

        if !profile.tags.is_valid() {
            return Err(ConfigError::Invalid(format!(
                "protocol tags must be non-empty and distinct (trade: '{}', equity: '{}')",
                profile.tags.trade_tag, profile.tags.equity_tag
            )));
        }
        Ok(profile)
    }

    /// Tags the child is expected to speak.
    pub fn tags(&self) -> Result<ProtocolTags, ConfigError> {
        self.profile().map(|p| p.tags)
    }

    /// Deterministic content hash of the config (blake3 over canonical JSON).
    ///
    /// Two runs with identical configs share a hash regardless of key order
    /// in their source files.
    pub fn config_hash(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }
}
