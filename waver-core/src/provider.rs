//! Provider resolution and the chat-model clients it selects between.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::config::{ConfigError, LlmProvider, ProviderConfig, ProviderKeys, WaverSettings};
use crate::contract::{ChatError, ChatModel};

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const GEMINI_DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Map the configured provider selector to a fully populated [`ProviderConfig`].
///
/// Fails with [`ConfigError::Missing`] when the selector is unset or not one of
/// [`LlmProvider::ALL`], or when the selected provider's API key is absent. The
/// failure names the configuration key that needs to be set.
pub fn resolve(settings: &WaverSettings) -> Result<ProviderConfig, ConfigError> {
    let selected = settings
        .llm_provider
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(str::parse::<LlmProvider>);

    let resolved = match selected {
        Some(Ok(LlmProvider::OpenAi)) => ProviderConfig::OpenAi {
            api_key: required_key(&settings.openai, "waver.openai.api-key", LlmProvider::OpenAi)?,
        },
        Some(Ok(LlmProvider::Gemini)) => ProviderConfig::Gemini {
            api_key: required_key(&settings.gemini, "waver.gemini.api-key", LlmProvider::Gemini)?,
        },
        Some(Err(_)) | None => {
            let valid: Vec<&str> = LlmProvider::ALL.iter().map(LlmProvider::as_str).collect();
            error!(
                configured = settings.llm_provider.as_deref().unwrap_or("<unset>"),
                "Unsupported or missing LLM provider"
            );
            return Err(ConfigError::Missing(format!(
                "Unsupported or missing LLM provider configured in 'waver.llm-provider'. Valid options are: [{}]",
                valid.join(", ")
            )));
        }
    };

    info!(provider = %resolved.provider(), "Resolved LLM provider configuration");
    Ok(resolved)
}

fn required_key(
    keys: &ProviderKeys,
    property: &str,
    provider: LlmProvider,
) -> Result<String, ConfigError> {
    match keys.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => Ok(key.to_string()),
        _ => {
            error!(%provider, property, "API key not configured for provider");
            Err(ConfigError::Missing(format!(
                "Property '{property}' was not set for {provider} provider."
            )))
        }
    }
}

/// Build the chat client for a resolved provider.
pub fn build_chat_model(provider: &ProviderConfig) -> Arc<dyn ChatModel> {
    match provider {
        ProviderConfig::OpenAi { api_key } => Arc::new(OpenAiChatModel::new(api_key.clone())),
        ProviderConfig::Gemini { api_key } => Arc::new(GeminiChatModel::new(api_key.clone())),
    }
}

/// OpenAI chat-completions client.
pub struct OpenAiChatModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
    url: String,
}

impl OpenAiChatModel {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: OPENAI_DEFAULT_MODEL.to_string(),
            url: OPENAI_CHAT_URL.to_string(),
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn chat(&self, prompt: &str) -> Result<String, ChatError> {
        debug!(model = %self.model, prompt_len = prompt.len(), "Sending OpenAI chat request");
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Request(e.to_string()))?;
        let value = read_json(response).await?;
        value["choices"][0]["message"]["content"]
            .as_str()
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
            .ok_or(ChatError::EmptyResponse)
    }
}

/// Google Gemini generateContent client.
pub struct GeminiChatModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiChatModel {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: GEMINI_DEFAULT_MODEL.to_string(),
        }
    }
}

#[async_trait]
impl ChatModel for GeminiChatModel {
    async fn chat(&self, prompt: &str) -> Result<String, ChatError> {
        debug!(model = %self.model, prompt_len = prompt.len(), "Sending Gemini generateContent request");
        let url = format!("{GEMINI_BASE_URL}/{}:generateContent", self.model);
        let body = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Request(e.to_string()))?;
        let value = read_json(response).await?;
        let text: String = value["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(ChatError::EmptyResponse);
        }
        Ok(text)
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value, ChatError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<Failed to decode response body>"));
        error!(status = %status, "Chat backend returned error");
        return Err(ChatError::Status {
            status: status.as_u16(),
            body,
        });
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| ChatError::Request(e.to_string()))
}
