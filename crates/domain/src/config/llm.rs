use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Generation provider
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the Gemini REST API.
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Direct keys (for config-only setups; prefer `key_env`).
    #[serde(default)]
    pub keys: Vec<String>,
    /// Env var holding a comma-separated key list. Resolved at startup and
    /// appended after `keys`.
    #[serde(default = "d_key_env")]
    pub key_env: String,
    /// Models in priority order. Most capable first, most conservative last.
    #[serde(default = "d_models")]
    pub models: Vec<String>,
    /// Upper bound for a single (model, key) generation call.
    #[serde(default = "d_90000")]
    pub attempt_timeout_ms: u64,
    /// Where the key cursor starts on each call.
    #[serde(default)]
    pub cursor_policy: CursorPolicy,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            keys: Vec::new(),
            key_env: d_key_env(),
            models: d_models(),
            attempt_timeout_ms: 90_000,
            cursor_policy: CursorPolicy::Sticky,
        }
    }
}

/// Key cursor behaviour between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CursorPolicy {
    /// Keep the cursor wherever the last rotation left it. A key that worked
    /// stays preferred for the next call.
    #[default]
    Sticky,
    /// Start every call from the first key.
    ResetPerCall,
}

impl LlmConfig {
    /// Collect the key pool: direct keys first, then the comma-separated
    /// list from `key_env`. Blank entries are dropped.
    pub fn resolve_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .keys
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        if let Ok(raw) = std::env::var(&self.key_env) {
            keys.extend(split_key_list(&raw));
        }
        keys
    }
}

/// Split a comma-separated key list, trimming whitespace and dropping
/// empty entries.
pub fn split_key_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ── serde default helpers ───────────────────────────────────────────

fn d_base_url() -> String {
    "https://generativelanguage.googleapis.com".into()
}
fn d_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn d_models() -> Vec<String> {
    [
        "gemini-3-pro-preview",
        "gemini-2.5-pro",
        "gemini-3-flash-preview",
        "gemini-2.5-flash",
        "gemini-2.0-flash",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn d_90000() -> u64 {
    90_000
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_key_list_trims_and_drops_empties() {
        let keys = split_key_list("a,b, c ,,");
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn default_models_are_ordered_preview_first() {
        let cfg = LlmConfig::default();
        assert_eq!(cfg.models.first().map(String::as_str), Some("gemini-3-pro-preview"));
        assert_eq!(cfg.models.last().map(String::as_str), Some("gemini-2.0-flash"));
    }

    #[test]
    fn cursor_policy_deserializes_snake_case() {
        let cfg: LlmConfig = toml::from_str(r#"cursor_policy = "reset_per_call""#).unwrap();
        assert_eq!(cfg.cursor_policy, CursorPolicy::ResetPerCall);
    }

    #[test]
    fn resolve_keys_reads_direct_keys_and_env() {
        let cfg = LlmConfig {
            keys: vec![" direct ".into(), "".into()],
            key_env: "HO_TEST_RESOLVE_KEYS_7781".into(),
            ..LlmConfig::default()
        };
        std::env::set_var("HO_TEST_RESOLVE_KEYS_7781", "k1, k2");
        let keys = cfg.resolve_keys();
        std::env::remove_var("HO_TEST_RESOLVE_KEYS_7781");
        assert_eq!(keys, vec!["direct", "k1", "k2"]);
    }
}
