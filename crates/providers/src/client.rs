//! Failover generation client.
//!
//! [`GenerationClient`] walks the model list in priority order and, for each
//! model, the key pool starting at the shared cursor. The first successful
//! (model, key) pair wins. A model is abandoned once the cursor cannot
//! rotate or has wrapped back to where it started for that model.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ho_domain::config::{CursorPolicy, LlmConfig};
use ho_domain::error::{Error, Result};
use ho_domain::trace::TraceEvent;

use crate::auth::{KeyEntry, KeyPool};
use crate::traits::{GenerationBackend, TextGenerator};

pub struct GenerationClient {
    backend: Arc<dyn GenerationBackend>,
    pool: Arc<KeyPool>,
    models: Vec<String>,
    attempt_timeout: Duration,
    cursor_policy: CursorPolicy,
}

impl GenerationClient {
    pub fn new(backend: Arc<dyn GenerationBackend>, pool: Arc<KeyPool>, models: Vec<String>) -> Self {
        Self {
            backend,
            pool,
            models,
            attempt_timeout: Duration::from_millis(90_000),
            cursor_policy: CursorPolicy::Sticky,
        }
    }

    /// Build from the `[llm]` config section. Keys are resolved from config
    /// and the environment.
    pub fn from_config(backend: Arc<dyn GenerationBackend>, cfg: &LlmConfig) -> Self {
        let pool = Arc::new(KeyPool::new(cfg.resolve_keys()));
        tracing::info!(
            provider = backend.provider_id(),
            keys = pool.len(),
            models = cfg.models.len(),
            cursor_policy = ?cfg.cursor_policy,
            "generation client configured"
        );
        Self::new(backend, pool, cfg.models.clone())
            .with_attempt_timeout(Duration::from_millis(cfg.attempt_timeout_ms))
            .with_cursor_policy(cfg.cursor_policy)
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_cursor_policy(mut self, policy: CursorPolicy) -> Self {
        self.cursor_policy = policy;
        self
    }

    pub fn pool(&self) -> &Arc<KeyPool> {
        &self.pool
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Produce a response for `prompt`, trying every model against every key
    /// until one succeeds.
    pub async fn generate(&self, prompt: &str, image: Option<&[u8]>) -> Result<String> {
        if self.pool.is_empty() {
            return Err(Error::Config("no API keys configured".into()));
        }
        if self.cursor_policy == CursorPolicy::ResetPerCall {
            self.pool.reset();
        }

        let mut last_error: Option<Error> = None;

        for model in &self.models {
            let start_index = self.pool.cursor();
            // Bounded even if concurrent callers rotate the shared cursor.
            let mut attempts = 0usize;

            loop {
                let Some(entry) = self.pool.current() else {
                    break;
                };
                attempts += 1;

                match self.attempt(model, &entry, prompt, image).await {
                    Ok(text) => return Ok(text),
                    Err(e) => {
                        tracing::warn!(
                            model = %model,
                            key_index = entry.index,
                            error = %e,
                            "generation attempt failed"
                        );
                        let reason = e.to_string();
                        last_error = Some(e);

                        match self.pool.rotate() {
                            Some(next) if next != start_index && attempts < self.pool.len() => {
                                TraceEvent::KeyRotated {
                                    from_index: entry.index,
                                    to_index: next,
                                    reason,
                                }
                                .emit();
                            }
                            _ => {
                                TraceEvent::ModelAbandoned {
                                    model: model.clone(),
                                    last_error: reason,
                                }
                                .emit();
                                break;
                            }
                        }
                    }
                }
            }
        }

        let last = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no models configured".into());
        Err(Error::Exhausted { last })
    }

    /// One (model, key) attempt: open a session, then generate under the
    /// per-attempt timeout.
    async fn attempt(
        &self,
        model: &str,
        entry: &KeyEntry,
        prompt: &str,
        image: Option<&[u8]>,
    ) -> Result<String> {
        TraceEvent::GenerationAttempt {
            model: model.to_owned(),
            key_index: entry.index,
            with_image: image.is_some(),
        }
        .emit();

        let session = self.backend.open_session(&entry.key).await?;

        let started = Instant::now();
        let text = match tokio::time::timeout(
            self.attempt_timeout,
            session.generate(model, prompt, image),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::Timeout(format!(
                    "model '{}' timed out after {}ms",
                    model,
                    self.attempt_timeout.as_millis()
                )))
            }
        };

        TraceEvent::GenerationSucceeded {
            model: model.to_owned(),
            key_index: entry.index,
            duration_ms: started.elapsed().as_millis() as u64,
            response_chars: text.chars().count(),
        }
        .emit();
        Ok(text)
    }
}

#[async_trait::async_trait]
impl TextGenerator for GenerationClient {
    async fn generate(&self, prompt: &str, image: Option<&[u8]>) -> Result<String> {
        GenerationClient::generate(self, prompt, image).await
    }
}

impl std::fmt::Debug for GenerationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationClient")
            .field("provider", &self.backend.provider_id())
            .field("pool", &self.pool)
            .field("models", &self.models)
            .field("attempt_timeout", &self.attempt_timeout)
            .field("cursor_policy", &self.cursor_policy)
            .finish()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
