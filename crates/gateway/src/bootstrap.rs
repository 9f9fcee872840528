//! Composition root.
//!
//! Builds every service from config and wires them into an [`AppState`].
//! Front ends (the console REPL today) only supply a [`ChatTransport`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use ho_domain::config::{Config, ConfigSeverity};
use ho_providers::{GeminiBackend, GenerationClient, TextGenerator};
use ho_sessions::SessionStore;

use crate::backends::{CommandLogSource, DryRunSubmitter, LogSource, Submitter, WebhookSubmitter};
use crate::runtime::{
    wizards, AccessPolicy, DiagnosticRunner, MessageDelivery, Orchestrator, WizardEngine,
};
use crate::state::AppState;
use crate::transport::ChatTransport;

/// Validate config, initialise every subsystem and return a wired
/// [`AppState`].
pub fn build_app_state(
    config: Arc<Config>,
    transport: Arc<dyn ChatTransport>,
) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if config.has_errors() {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Generation client ────────────────────────────────────────────
    let backend = GeminiBackend::from_config(&config.llm).context("initializing Gemini backend")?;
    let llm = Arc::new(GenerationClient::from_config(Arc::new(backend), &config.llm));
    if llm.pool().is_empty() {
        tracing::warn!(
            key_env = %config.llm.key_env,
            "no API keys configured; AI replies will fail until keys are provided"
        );
    } else {
        tracing::info!(
            keys = llm.pool().len(),
            models = llm.models().len(),
            cursor_policy = ?config.llm.cursor_policy,
            "generation client ready"
        );
    }

    // ── Session store ────────────────────────────────────────────────
    let sessions = Arc::new(SessionStore::new(config.sessions.history_max_chars));

    // ── Collaborators ────────────────────────────────────────────────
    let logs: Arc<dyn LogSource> = Arc::new(CommandLogSource::new(config.sources.clone()));
    tracing::info!(sources = config.sources.len(), "log sources ready");

    let submitter: Arc<dyn Submitter> =
        match WebhookSubmitter::from_config(&config.submit).context("initializing webhook submitter")? {
            Some(webhook) => {
                tracing::info!(webhook = ?webhook, "wizard submissions go to webhook");
                Arc::new(webhook)
            }
            None => {
                tracing::info!("no webhook configured; wizard submissions are dry runs");
                Arc::new(DryRunSubmitter)
            }
        };

    // ── Runtime ──────────────────────────────────────────────────────
    let delivery = Arc::new(MessageDelivery::new(transport, config.delivery.chunk_chars));
    let generator: Arc<dyn TextGenerator> = llm.clone();
    let registry = Arc::new(wizards::builtin());
    if registry.is_empty() {
        tracing::warn!("no wizards registered");
    } else {
        tracing::info!(kinds = registry.len(), "wizard registry ready");
    }

    let wizard_engine = WizardEngine::new(
        sessions.clone(),
        registry,
        submitter,
        delivery.clone(),
    );

    let shutdown = CancellationToken::new();
    let analysis = DiagnosticRunner::new(
        generator.clone(),
        logs.clone(),
        delivery.clone(),
        sessions.clone(),
        shutdown.clone(),
    )
    .with_deadline(Duration::from_secs(config.analysis.deadline_secs))
    .with_log_lines(config.analysis.log_lines);

    let orchestrator = Arc::new(
        Orchestrator::new(
            sessions.clone(),
            generator,
            logs,
            delivery,
            wizard_engine,
            analysis,
        )
        .with_access(AccessPolicy::from_config(&config.access))
        .with_reply_deadline(Duration::from_secs(config.orchestrator.reply_deadline_secs))
        .with_log_fetch_lines(config.orchestrator.log_fetch_lines),
    );
    tracing::info!("orchestrator ready");

    Ok(AppState {
        config,
        llm,
        sessions,
        orchestrator,
        shutdown,
    })
}
