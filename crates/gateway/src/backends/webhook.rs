//! Wizard submitters.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;

use ho_domain::config::SubmitConfig;
use ho_domain::error::{Error, Result};

use super::Submitter;

/// Longest response body echoed back to the user.
const MAX_ECHO_CHARS: usize = 3_000;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Webhook
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// POSTs `{"kind": …, "fields": {…}}` to a configured endpoint.
pub struct WebhookSubmitter {
    url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl WebhookSubmitter {
    pub fn new(url: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.without_url().to_string()))?;
        Ok(Self {
            url: url.into(),
            token,
            client,
        })
    }

    /// Build from config. Returns `None` when no webhook is configured.
    pub fn from_config(cfg: &SubmitConfig) -> Result<Option<Self>> {
        let Some(url) = cfg.webhook_url.as_deref().filter(|u| !u.trim().is_empty()) else {
            return Ok(None);
        };
        let token = std::env::var(&cfg.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty());
        Self::new(url, token, Duration::from_secs(cfg.timeout_secs.max(1))).map(Some)
    }
}

impl std::fmt::Debug for WebhookSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSubmitter")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

#[async_trait::async_trait]
impl Submitter for WebhookSubmitter {
    async fn submit(&self, kind: &str, fields: &BTreeMap<String, String>) -> Result<String> {
        let submit_err = |message: String| Error::Submit {
            kind: kind.to_owned(),
            message,
        };

        let mut req = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "kind": kind, "fields": fields }));
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| submit_err(e.without_url().to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| submit_err(e.without_url().to_string()))?;

        if !status.is_success() {
            return Err(submit_err(format!(
                "HTTP {} - {}",
                status.as_u16(),
                truncate(body.trim(), MAX_ECHO_CHARS)
            )));
        }

        tracing::info!(kind = %kind, status = status.as_u16(), "submission accepted");
        Ok(confirmation_from_body(&body))
    }
}

/// Prefer a `message` field from a JSON reply, else the raw body.
fn confirmation_from_body(body: &str) -> String {
    let text = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_else(|| body.trim().to_owned());
    if text.is_empty() {
        "ok".to_owned()
    } else {
        truncate(&text, MAX_ECHO_CHARS)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_owned(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dry run
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Logs submissions and confirms without touching anything.
#[derive(Debug, Default)]
pub struct DryRunSubmitter;

#[async_trait::async_trait]
impl Submitter for DryRunSubmitter {
    async fn submit(&self, kind: &str, fields: &BTreeMap<String, String>) -> Result<String> {
        tracing::info!(kind = %kind, ?fields, "dry-run submission");
        let summary: Vec<String> = fields
            .iter()
            .map(|(k, v)| format!("{k} = {}", v.replace('\n', ", ")))
            .collect();
        Ok(format!("(dry run, nothing applied)\n{}", summary.join("\n")))
    }
}
