//! Engine profiles: one descriptor per backtest engine family.
//!
//! A profile fixes the protocol dialect the engine speaks, which analytics
//! groups are meaningful for its output, and how a `RunConfig` is exported
//! into the child's environment.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use stratrun_core::protocol::ProtocolTags;

use crate::config::RunConfig;

/// Analytics groups an engine's output supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    /// win rate, profit factor, win/loss ratio, trade count
    pub trade_metrics: bool,
    /// Sharpe, Sortino, Calmar
    pub risk_ratios: bool,
    /// skewness, kurtosis
    pub distribution_moments: bool,
}

impl Capabilities {
    pub const ALL: Capabilities = Capabilities {
        trade_metrics: true,
        risk_ratios: true,
        distribution_moments: true,
    };
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::ALL
    }
}

/// Names of the environment variables a config is exported under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvMapping {
    pub strategy_var: String,
    pub params_var: String,
    pub engine_var: String,
}

impl Default for EnvMapping {
    fn default() -> Self {
        Self {
            strategy_var: "STRATRUN_STRATEGY".into(),
            params_var: "STRATRUN_PARAMS".into(),
            engine_var: "STRATRUN_ENGINE".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineProfile {
    pub name: String,
    pub tags: ProtocolTags,
    pub capabilities: Capabilities,
    pub env_mapping: EnvMapping,
}

impl EngineProfile {
    pub const EVENT_DRIVEN: &'static str = "event_driven";
    pub const VECTORIZED: &'static str = "vectorized";

    /// Bar-by-bar engines that report every fill and every bar's equity.
    pub fn event_driven() -> Self {
        Self {
            name: Self::EVENT_DRIVEN.into(),
            tags: ProtocolTags::default(),
            capabilities: Capabilities::ALL,
            env_mapping: EnvMapping::default(),
        }
    }

    /// Array-at-a-time engines. Their equity series is resampled, so
    /// distribution moments are not reported.
    pub fn vectorized() -> Self {
        Self {
            name: Self::VECTORIZED.into(),
            tags: ProtocolTags::new("VBT_TRADE:", "VBT_EQUITY:"),
            capabilities: Capabilities {
                distribution_moments: false,
                ..Capabilities::ALL
            },
            env_mapping: EnvMapping::default(),
        }
    }

    /// Look up a built-in profile by name.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            Self::EVENT_DRIVEN => Some(Self::event_driven()),
            Self::VECTORIZED => Some(Self::vectorized()),
            _ => None,
        }
    }

    pub fn builtin_names() -> &'static [&'static str] {
        &[Self::EVENT_DRIVEN, Self::VECTORIZED]
    }

    /// Environment for the child: the profile's export of `config`, then the
    /// explicit `env` overlay on top.
    pub fn environment(&self, config: &RunConfig) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert(self.env_mapping.strategy_var.clone(), config.strategy.clone());
        env.insert(
            self.env_mapping.params_var.clone(),
            serde_json::to_string(&config.params).unwrap_or_else(|_| "{}".into()),
        );
        env.insert(
            self.env_mapping.engine_var.clone(),
            serde_json::to_string(&config.engine).unwrap_or_else(|_| "{}".into()),
        );
        for (key, value) in &config.env {
            env.insert(key.clone(), value.clone());
        }
        env
    }
}
