//! Planner configuration, persisted as TOML.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::formula::AnchorElement;
use crate::graph::DiscoveryConfig;
use crate::optimize::{DEFAULT_ZERO_THRESHOLD, MassBalanceOptimizer};

pub type ConfigResult<T> = std::result::Result<T, EngineError>;

/// Tunables for one [`Planner`](crate::planner::Planner).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Element whose coefficient scales the stoichiometric ratio, or `"shared"`.
    #[serde(default)]
    pub anchor_element: AnchorElement,
    /// Separator between fields of a condition line.
    #[serde(default = "default_condition_delimiter")]
    pub condition_delimiter: String,
    /// Allocated masses at or below this are reported as zero.
    #[serde(default = "default_zero_threshold")]
    pub zero_threshold: f64,
    /// Worker pool size; 0 means one thread per core.
    #[serde(default)]
    pub worker_threads: usize,
    /// Longest chain allowed; unset means no limit beyond the no-reuse rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_chain_length: Option<usize>,
    #[serde(default = "default_max_chains")]
    pub max_chains: usize,
    /// Per-request deadline in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    /// Condition fields containing this carry a pressure value.
    #[serde(default = "default_pressure_marker")]
    pub pressure_marker: String,
    /// Condition fields containing this set the microimpurities flag.
    #[serde(default = "default_microimpurity_marker")]
    pub microimpurity_marker: String,
}

fn default_condition_delimiter() -> String {
    "; ".into()
}
fn default_zero_threshold() -> f64 {
    DEFAULT_ZERO_THRESHOLD
}
fn default_max_chains() -> usize {
    DiscoveryConfig::default().max_chains
}
fn default_pressure_marker() -> String {
    "MPa".into()
}
fn default_microimpurity_marker() -> String {
    "microimpurit".into()
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            anchor_element: AnchorElement::default(),
            condition_delimiter: default_condition_delimiter(),
            zero_threshold: default_zero_threshold(),
            worker_threads: 0,
            max_chain_length: None,
            max_chains: default_max_chains(),
            request_timeout_secs: None,
            pressure_marker: default_pressure_marker(),
            microimpurity_marker: default_microimpurity_marker(),
        }
    }
}

impl PlannerConfig {
    /// Reject values the planner cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |message: String| Err(EngineError::InvalidConfig { message });

        if let AnchorElement::Fixed(symbol) = &self.anchor_element {
            if !crate::formula::is_element_symbol(symbol) {
                return invalid(format!("anchor_element \"{symbol}\" is not an element symbol"));
            }
        }
        if self.condition_delimiter.is_empty() {
            return invalid("condition_delimiter must not be empty".into());
        }
        if !(self.zero_threshold.is_finite() && self.zero_threshold > 0.0) {
            return invalid(format!(
                "zero_threshold must be positive, got {}",
                self.zero_threshold
            ));
        }
        if self.max_chain_length == Some(0) {
            return invalid("max_chain_length must be at least 1 when set".into());
        }
        if self.max_chains == 0 {
            return invalid("max_chains must be at least 1".into());
        }
        if self.request_timeout_secs == Some(0) {
            return invalid("request_timeout_secs must be at least 1 when set".into());
        }
        if self.pressure_marker.is_empty() || self.microimpurity_marker.is_empty() {
            return invalid("condition markers must not be empty".into());
        }
        Ok(())
    }

    pub fn discovery(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            max_chain_length: self.max_chain_length,
            max_chains: self.max_chains,
        }
    }

    pub fn optimizer(&self) -> MassBalanceOptimizer {
        MassBalanceOptimizer::new(self.anchor_element.clone(), self.zero_threshold)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| EngineError::ConfigRead {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| EngineError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| EngineError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EngineError::ConfigWrite {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| EngineError::ConfigWrite {
            path: path.display().to_string(),
            source: e,
        })
    }
}
