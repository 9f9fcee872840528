//! Google Gemini adapter.
//!
//! Implements the Gemini `generateContent` API. The key travels in the
//! `x-goog-api-key` header so it never appears in URLs or error strings.

use std::time::Duration;

use base64::Engine as _;
use serde_json::Value;

use ho_domain::config::LlmConfig;
use ho_domain::error::{Error, Result};

use crate::traits::{GenerationBackend, ProviderSession};
use crate::util::{from_reqwest, sniff_image_mime};

const PROVIDER_ID: &str = "google";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct GeminiBackend {
    base_url: String,
    client: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(from_reqwest)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        // The client's own timeout sits just above the per-attempt deadline
        // so the attempt timeout is the one that fires.
        Self::new(
            &cfg.base_url,
            Duration::from_millis(cfg.attempt_timeout_ms.saturating_add(5_000)),
        )
    }
}

#[async_trait::async_trait]
impl GenerationBackend for GeminiBackend {
    async fn open_session(&self, credential: &str) -> Result<Box<dyn ProviderSession>> {
        if credential.trim().is_empty() {
            return Err(Error::Config("empty Gemini API key".into()));
        }
        Ok(Box::new(GeminiSession {
            base_url: self.base_url.clone(),
            api_key: credential.to_owned(),
            client: self.client.clone(),
        }))
    }

    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct GeminiSession {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiSession {
    fn generate_url(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait::async_trait]
impl ProviderSession for GeminiSession {
    async fn generate(&self, model: &str, prompt: &str, image: Option<&[u8]>) -> Result<String> {
        let url = self.generate_url(model);
        let body = build_body(prompt, image);

        tracing::debug!(
            provider = PROVIDER_ID,
            model = %model,
            prompt_chars = prompt.chars().count(),
            with_image = image.is_some(),
            "gemini generate request"
        );

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::Provider {
                provider: PROVIDER_ID.into(),
                message: format!("HTTP {} - {}", status.as_u16(), resp_text),
            });
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        parse_response(&resp_json)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire format
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn build_body(prompt: &str, image: Option<&[u8]>) -> Value {
    let mut parts = vec![serde_json::json!({ "text": prompt })];
    if let Some(bytes) = image {
        parts.push(serde_json::json!({
            "inlineData": {
                "mimeType": sniff_image_mime(bytes),
                "data": base64::engine::general_purpose::STANDARD.encode(bytes),
            }
        }));
    }
    serde_json::json!({
        "contents": [{ "role": "user", "parts": parts }],
    })
}

/// Concatenate the text parts of every candidate.
fn parse_response(body: &Value) -> Result<String> {
    let candidates = body
        .get("candidates")
        .and_then(|c| c.as_array())
        .filter(|a| !a.is_empty())
        .ok_or_else(|| {
            let reason = body
                .get("promptFeedback")
                .and_then(|f| f.get("blockReason"))
                .and_then(|r| r.as_str())
                .unwrap_or("no candidates in response");
            Error::Provider {
                provider: PROVIDER_ID.into(),
                message: reason.to_string(),
            }
        })?;

    let mut text = String::new();
    for candidate in candidates {
        let parts = candidate
            .get("content")
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.as_array());
        if let Some(parts) = parts {
            for part in parts {
                if let Some(t) = part.get("text").and_then(|v| v.as_str()) {
                    text.push_str(t);
                }
            }
        }
    }
    Ok(text)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
