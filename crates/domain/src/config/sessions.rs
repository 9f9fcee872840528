use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Per-user session state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Retention cap for the AI conversation transcript, in characters.
    /// Large enough for several turns, small enough for the provider's
    /// input limit.
    #[serde(default = "d_20000")]
    pub history_max_chars: usize,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            history_max_chars: 20_000,
        }
    }
}

fn d_20000() -> usize {
    20_000
}
