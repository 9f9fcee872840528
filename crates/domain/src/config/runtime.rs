use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message delivery
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Chunk ceiling in characters. Kept below the transport's hard limit
    /// (4096 for Telegram) to leave room for formatting overhead.
    #[serde(default = "d_3800")]
    pub chunk_chars: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self { chunk_chars: 3_800 }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation routing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Overall deadline for one AI reply (log refresh + generation).
    #[serde(default = "d_180")]
    pub reply_deadline_secs: u64,
    /// Lines requested when refreshing a log source on a follow-up turn.
    #[serde(default = "d_100")]
    pub log_fetch_lines: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            reply_deadline_secs: 180,
            log_fetch_lines: 100,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Diagnostic analysis
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Overall deadline for one analysis run, collection included.
    #[serde(default = "d_120")]
    pub deadline_secs: u64,
    /// Lines requested from the log source for a first analysis.
    #[serde(default = "d_100")]
    pub log_lines: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            deadline_secs: 120,
            log_lines: 100,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_3800() -> usize {
    3_800
}
fn d_180() -> u64 {
    180
}
fn d_120() -> u64 {
    120
}
fn d_100() -> usize {
    100
}
