// ⚙️ Engine Configuration - Tolerances, history cap, connector look
//
// Every field has a default, so an empty JSON object is a valid config.
// Load order: defaults <- JSON file (optional) <- environment overrides.

use crate::geometry::CurveSettings;
use crate::history::{CommandHistory, MAX_HISTORY};
use crate::mapping::MappingType;
use crate::validator::{CardinalityValidator, DEFAULT_WEIGHT_EPSILON};
use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const ENV_MAX_HISTORY: &str = "GL_MAPPING_MAX_HISTORY";
pub const ENV_WEIGHT_EPSILON: &str = "GL_MAPPING_WEIGHT_EPSILON";

// ============================================================================
// CONNECTOR PALETTE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectorPalette {
    pub one_to_one: String,
    pub one_to_many: String,
    pub many_to_one: String,

    /// Overrides the type color for the selected connector
    pub selected: String,

    pub stroke_width: f64,
    pub selected_stroke_width: f64,
}

impl Default for ConnectorPalette {
    fn default() -> Self {
        ConnectorPalette {
            one_to_one: "#3b82f6".to_string(),
            one_to_many: "#10b981".to_string(),
            many_to_one: "#f59e0b".to_string(),
            selected: "#ef4444".to_string(),
            stroke_width: 2.0,
            selected_stroke_width: 3.0,
        }
    }
}

impl ConnectorPalette {
    pub fn color_for(&self, mapping_type: MappingType) -> &str {
        match mapping_type {
            MappingType::OneToOne => &self.one_to_one,
            MappingType::OneToMany => &self.one_to_many,
            MappingType::ManyToOne => &self.many_to_one,
        }
    }
}

// ============================================================================
// ENGINE CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Tolerance for group weight sums (default: 1e-6)
    pub weight_epsilon: f64,

    /// Batches retained for undo (default: 50)
    pub max_history: usize,

    /// Control-point offset as a share of the horizontal span (default: 0.4)
    pub control_point_ratio: f64,

    /// Upper bound on the control-point offset in pixels (default: 100)
    pub control_point_cap: f64,

    pub palette: ConnectorPalette,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            weight_epsilon: DEFAULT_WEIGHT_EPSILON,
            max_history: MAX_HISTORY,
            control_point_ratio: 0.4,
            control_point_cap: 100.0,
            palette: ConnectorPalette::default(),
        }
    }
}

impl EngineConfig {
    /// Load config from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse engine config JSON")
    }

    /// Defaults, then the optional file, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup; unparsable values are ignored
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_MAX_HISTORY) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                match trimmed.parse::<usize>() {
                    Ok(value) if value > 0 => self.max_history = value,
                    Ok(_) => tracing::warn!("{ENV_MAX_HISTORY} must be positive, ignoring"),
                    Err(err) => tracing::warn!("invalid {ENV_MAX_HISTORY}, ignoring: {err}"),
                }
            }
        }

        if let Some(raw) = lookup(ENV_WEIGHT_EPSILON) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                match trimmed.parse::<f64>() {
                    Ok(value) if value >= 0.0 => self.weight_epsilon = value,
                    Ok(_) => tracing::warn!("{ENV_WEIGHT_EPSILON} must not be negative, ignoring"),
                    Err(err) => tracing::warn!("invalid {ENV_WEIGHT_EPSILON}, ignoring: {err}"),
                }
            }
        }
    }

    pub fn validator(&self) -> CardinalityValidator {
        CardinalityValidator::with_epsilon(self.weight_epsilon)
    }

    pub fn history(&self) -> CommandHistory {
        CommandHistory::with_max_history(self.max_history)
    }

    pub fn curve(&self) -> CurveSettings {
        CurveSettings {
            ratio: self.control_point_ratio,
            cap: self.control_point_cap,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
