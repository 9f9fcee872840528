use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use ho_domain::config::Config;
use ho_providers::GenerationClient;
use ho_sessions::SessionStore;

use crate::runtime::Orchestrator;

/// Everything a front end needs after boot.
///
/// - **Core services**: config, generation client, sessions
/// - **Runtime**: the orchestrator and the shutdown token that bounds
///   detached analyses
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub llm: Arc<GenerationClient>,
    pub sessions: Arc<SessionStore>,

    // ── Runtime ───────────────────────────────────────────────────────
    pub orchestrator: Arc<Orchestrator>,
    /// Cancelling this stops every in-flight analysis.
    pub shutdown: CancellationToken,
}
