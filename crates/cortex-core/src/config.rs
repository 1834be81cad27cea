use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CortexError, Result};
use crate::types::{AMBIGUITY_THRESHOLD, CONFIDENCE_THRESHOLD};

/// Top-level configuration for the command pipeline.
///
/// Loaded from `~/.cortex/config.toml` by default. Each section corresponds
/// to one layer of the pipeline or a cross-cutting concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CortexConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub reflex: ReflexConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub nudge: NudgeConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl CortexConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed, or if a
    /// threshold is outside `[0, 1]`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CortexConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| CortexError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        let unit = 0.0..=1.0;
        if !unit.contains(&self.reflex.confidence_threshold) {
            return Err(CortexError::Config(format!(
                "reflex.confidence_threshold must be within [0, 1], got {}",
                self.reflex.confidence_threshold
            )));
        }
        if !unit.contains(&self.reflex.ambiguity_threshold) {
            return Err(CortexError::Config(format!(
                "reflex.ambiguity_threshold must be within [0, 1], got {}",
                self.reflex.ambiguity_threshold
            )));
        }
        if self.orchestrator.endpoint.trim().is_empty() {
            return Err(CortexError::Config(
                "orchestrator.endpoint must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Local pattern classifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflexConfig {
    /// Below this confidence a local result is escalated.
    pub confidence_threshold: f64,
    /// Best and second-best closer than this are escalated as ambiguous.
    pub ambiguity_threshold: f64,
    /// Optional TOML file replacing the built-in trigger and pattern tables.
    pub tables_path: Option<String>,
}

impl Default for ReflexConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: CONFIDENCE_THRESHOLD,
            ambiguity_threshold: AMBIGUITY_THRESHOLD,
            tables_path: None,
        }
    }
}

/// Language-model endpoint used by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`).
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f32,
    /// Request timeout; `None` leaves the request unbounded.
    pub timeout_secs: Option<u64>,
    /// Number of earlier utterances forwarded as context.
    pub context_turns: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/v1".to_string(),
            model: "llama3.1:8b".to_string(),
            api_key_env: "CORTEX_API_KEY".to_string(),
            temperature: 0.1,
            timeout_secs: None,
            context_turns: 3,
        }
    }
}

/// Pacing of chain auto-advance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Delay before the next pending action is promoted.
    pub advance_delay_ms: u64,
    /// Delay before a fully resolved chain closes.
    pub close_delay_ms: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            advance_delay_ms: 300,
            close_delay_ms: 1500,
        }
    }
}

/// Protocol nudge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NudgeConfig {
    pub enabled: bool,
    /// Expiry applied to rules that do not set their own.
    pub default_expiry_secs: u64,
}

impl Default for NudgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_expiry_secs: 300,
        }
    }
}

/// Deployment context of the telemetry sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

/// Telemetry and redaction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Redaction is skipped in development.
    pub environment: Environment,
    pub email_redaction: bool,
    pub phone_redaction: bool,
    /// Citizen service number (BSN) redaction.
    pub bsn_redaction: bool,
    /// Full dates (`dd-mm-yyyy`), which include dates of birth.
    pub date_redaction: bool,
    /// Replace patient names and ids in logged entity bags.
    pub patient_redaction: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Production,
            email_redaction: true,
            phone_redaction: true,
            bsn_redaction: true,
            date_redaction: true,
            patient_redaction: true,
        }
    }
}

impl TelemetryConfig {
    pub fn redaction_active(&self) -> bool {
        self.environment != Environment::Development
    }
}
