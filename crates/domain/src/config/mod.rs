mod backends;
mod llm;
mod observability;
mod runtime;
mod sessions;

pub use backends::*;
pub use llm::*;
pub use observability::*;
pub use runtime::*;
pub use sessions::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub access: AccessConfig,
    /// Log sources keyed by tag (e.g. `router`, `proxy`).
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,
    #[serde(default)]
    pub submit: SubmitConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Access
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Who may talk to the console.
///
/// The admin may do everything. Users in `allowed_users` may use every
/// feature except diagnostic analysis and grant management. Other users
/// need a feature granted at runtime; grants are kept in
/// `permissions_file` (JSON) when set, otherwise only in memory. With no
/// admin, no allow-list and no grants, everyone may use the non-admin
/// features and nobody is admin.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AccessConfig {
    #[serde(default)]
    pub admin_id: Option<String>,
    #[serde(default)]
    pub allowed_users: Vec<String>,
    #[serde(default)]
    pub permissions_file: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good. Key resolution
    /// reads the environment, so the result can differ between hosts.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.llm.models.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "llm.models".into(),
                message: "at least one model must be listed".into(),
            });
        }

        if self.llm.models.iter().any(|m| m.trim().is_empty()) {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "llm.models".into(),
                message: "model identifiers must not be empty".into(),
            });
        }

        if self.llm.base_url.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "llm.base_url".into(),
                message: "base_url must not be empty".into(),
            });
        }

        // Generation fails fast without keys; the console still boots.
        if self.llm.resolve_keys().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "llm.keys".into(),
                message: format!(
                    "no API keys configured (set llm.keys or {})",
                    self.llm.key_env
                ),
            });
        }

        if self.delivery.chunk_chars == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "delivery.chunk_chars".into(),
                message: "chunk size must be greater than 0".into(),
            });
        } else if self.delivery.chunk_chars > 4_096 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "delivery.chunk_chars".into(),
                message: "chunk size exceeds the 4096-character message limit".into(),
            });
        }

        if self.sessions.history_max_chars == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "sessions.history_max_chars".into(),
                message: "history cap must be greater than 0".into(),
            });
        }

        if self.analysis.deadline_secs == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "analysis.deadline_secs".into(),
                message: "deadline must be greater than 0".into(),
            });
        }

        if self.orchestrator.reply_deadline_secs == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "orchestrator.reply_deadline_secs".into(),
                message: "deadline must be greater than 0".into(),
            });
        }

        for (tag, source) in &self.sources {
            if source.command.trim().is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("sources.{tag}.command"),
                    message: "command must not be empty".into(),
                });
            }
        }

        if let Some(url) = &self.submit.webhook_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "submit.webhook_url".into(),
                    message: "webhook_url must be an http(s) URL".into(),
                });
            }
        } else {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "submit.webhook_url".into(),
                message: "no webhook configured; wizard submissions run in dry-run mode".into(),
            });
        }

        if self.access.admin_id.is_none() && self.access.allowed_users.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "access".into(),
                message: "no admin or allow-list configured; every user is allowed and nobody is admin".into(),
            });
        }

        errors
    }

    /// True when `validate` reports at least one hard error.
    pub fn has_errors(&self) -> bool {
        self.validate()
            .iter()
            .any(|e| e.severity == ConfigSeverity::Error)
    }
}
