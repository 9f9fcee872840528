use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Administrative backends
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A log source the assistant can pull fresh context from.
///
/// `command` is run through `sh -c`. The placeholders `{lines}` and
/// `{verbose}` are substituted before execution, e.g.
/// `ssh root@router "logread | tail -n {lines}"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Human-readable name used in status messages.
    #[serde(default)]
    pub label: Option<String>,
    pub command: String,
    #[serde(default = "d_30")]
    pub timeout_secs: u64,
    /// Role line prepended to the analysis prompt for this source.
    #[serde(default)]
    pub analysis_prompt: Option<String>,
}

/// Where completed wizard submissions go.
///
/// With no `webhook_url` submissions are logged and acknowledged only
/// (dry run).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Env var holding a bearer token for the webhook.
    #[serde(default = "d_token_env")]
    pub token_env: String,
    #[serde(default = "d_30")]
    pub timeout_secs: u64,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            token_env: d_token_env(),
            timeout_secs: 30,
        }
    }
}

fn d_30() -> u64 {
    30
}
fn d_token_env() -> String {
    "HOMEOPS_SUBMIT_TOKEN".into()
}
