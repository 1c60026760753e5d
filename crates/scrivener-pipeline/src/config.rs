//! Configuration for the research service

use scrivener_research::ResearchConfig;
use serde::{Deserialize, Serialize};

/// Configuration for the research service
///
/// # Examples
///
/// ```
/// use scrivener_pipeline::PipelineConfig;
///
/// let config = PipelineConfig::default();
/// assert_eq!(config.max_active_sessions, 4);
/// assert_eq!(config.research.max_iterations, 3);
///
/// let config = PipelineConfig::aggressive();
/// assert_eq!(config.research.max_iterations, 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Sessions allowed to run at the same time
    /// Default: 4
    #[serde(default = "default_max_active_sessions")]
    pub max_active_sessions: usize,

    /// Resume sessions left running by a previous process when the service starts
    /// Default: false
    #[serde(default)]
    pub resume_interrupted: bool,

    /// Defaults for sessions submitted without their own configuration
    #[serde(default)]
    pub research: ResearchConfig,
}

fn default_max_active_sessions() -> usize {
    4
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_active_sessions: default_max_active_sessions(),
            resume_interrupted: false,
            research: ResearchConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// More sessions at once, each with the aggressive research preset
    pub fn aggressive() -> Self {
        Self {
            max_active_sessions: 8,
            resume_interrupted: true,
            research: ResearchConfig::aggressive(),
        }
    }

    /// Fewer sessions at once, each with the lenient research preset
    pub fn lenient() -> Self {
        Self {
            max_active_sessions: 2,
            resume_interrupted: true,
            research: ResearchConfig::lenient(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_active_sessions == 0 {
            return Err("max_active_sessions must be at least 1".to_string());
        }
        if self.max_active_sessions > 64 {
            return Err("max_active_sessions must be at most 64".to_string());
        }
        self.research.validate()
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}
