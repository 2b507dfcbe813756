//! Reasoning engine seam and the Anthropic-backed client behind it.

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use tracing::debug;

const ANTHROPIC_API: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Token budget for extraction and overview calls.
pub const ANALYSIS_MAX_TOKENS: u32 = 4096;
/// Token budget for ad-hoc query answers.
pub const QUERY_MAX_TOKENS: u32 = 2048;

/// Blocking request/response text generation. The pipeline treats the
/// returned text as opaque and untrusted; transport and auth failures
/// propagate unchanged, with no retry.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    async fn generate(&self, prompt: &str, system_prompt: &str, max_tokens: u32)
        -> Result<String>;
}

pub struct ClaudeClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl ClaudeClient {
    pub fn new(api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key,
            model: DEFAULT_MODEL.to_string(),
        })
    }

    /// Resolve the API key from `ANTHROPIC_API_KEY` or, failing that, a
    /// key file on disk.
    pub fn from_env_or_file(key_file: &Path) -> Result<Self> {
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Self::new(key);
            }
        }

        let key = std::fs::read_to_string(key_file)
            .with_context(|| format!("API key file not found: {}", key_file.display()))?;
        let key = key.trim().to_string();
        if key.is_empty() {
            bail!("API key file is empty: {}", key_file.display());
        }

        Self::new(key)
    }
}

#[async_trait]
impl ReasoningEngine for ClaudeClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: &str,
        max_tokens: u32,
    ) -> Result<String> {
        debug!(
            prompt_bytes = prompt.len(),
            system_bytes = system_prompt.len(),
            max_tokens,
            "sending generation request"
        );

        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "messages": [
                {"role": "user", "content": prompt}
            ]
        });
        if !system_prompt.is_empty() {
            body["system"] = serde_json::Value::String(system_prompt.to_string());
        }

        let response = self
            .client
            .post(ANTHROPIC_API)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .context("reasoning engine request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("reasoning engine request failed with {status}: {detail}");
        }

        let json: serde_json::Value = response
            .json()
            .await
            .context("reasoning engine returned an unreadable response body")?;

        json.get("content")
            .and_then(|content| content.get(0))
            .and_then(|block| block.get("text"))
            .and_then(|text| text.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("reasoning engine response carried no text content"))
    }
}
