use crate::consts::*;
use crate::exceptions::ParleyError;
use crate::llm::api_models::{
    ChatCompletionRequest, ChatMessage, GeminiContent, GeminiPart, GenerateContentRequest,
    StreamOptions,
};
use crate::models::{Message, Role};
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    OpenAi,
    Gemini,
    DeepInfra,
    HuggingFace,
    Mock,
}

impl Provider {
    /// Guesses the provider from a bare model identifier.
    pub fn infer(model_id: &str) -> Option<Provider> {
        let id = model_id.to_ascii_lowercase();
        if id.starts_with("mock") {
            Some(Provider::Mock)
        } else if id.starts_with("gemini-") {
            Some(Provider::Gemini)
        } else if ["gpt-", "chatgpt-", "o1", "o3", "o4"]
            .iter()
            .any(|p| id.starts_with(p))
        {
            Some(Provider::OpenAi)
        } else if id.contains('/') {
            Some(Provider::DeepInfra)
        } else {
            None
        }
    }

    /// The name under which the key file stores this provider by default.
    pub fn key_name(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OpenAI",
            Provider::Gemini => "Google AI",
            Provider::DeepInfra => "DeepInfra",
            Provider::HuggingFace => "HuggingFace",
            Provider::Mock => "Mock",
        }
    }

    pub fn api_key_envs(&self) -> &'static [&'static str] {
        match self {
            Provider::OpenAi => &["OPENAI_API_KEY"],
            Provider::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
            Provider::DeepInfra => &["DEEPINFRA_API_KEY"],
            Provider::HuggingFace => &["HF_TOKEN", "HUGGINGFACE_API_KEY"],
            Provider::Mock => &[],
        }
    }

    pub fn base_url_env(&self) -> &'static str {
        match self {
            Provider::OpenAi => "PARLEY_OPENAI_BASE_URL",
            Provider::Gemini => "PARLEY_GEMINI_BASE_URL",
            Provider::DeepInfra => "PARLEY_DEEPINFRA_BASE_URL",
            Provider::HuggingFace => "PARLEY_HUGGINGFACE_BASE_URL",
            Provider::Mock => "PARLEY_MOCK_BASE_URL",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenAi => OPENAI_BASE_URL,
            Provider::Gemini => GEMINI_BASE_URL,
            Provider::DeepInfra => DEEPINFRA_BASE_URL,
            Provider::HuggingFace => HUGGINGFACE_BASE_URL,
            Provider::Mock => "",
        }
    }

    pub fn requires_key(&self) -> bool {
        !matches!(self, Provider::Mock)
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key_name())
    }
}

impl FromStr for Provider {
    type Err = ParleyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "openai" => Ok(Provider::OpenAi),
            "googleai" | "google" | "gemini" => Ok(Provider::Gemini),
            "deepinfra" => Ok(Provider::DeepInfra),
            "huggingface" | "hf" => Ok(Provider::HuggingFace),
            "mock" => Ok(Provider::Mock),
            _ => Err(ParleyError::Configuration(format!(
                "Unrecognized provider '{}'. Use one of: OpenAI, Google AI, DeepInfra, HuggingFace, Mock.",
                s
            ))),
        }
    }
}

/// Everything needed to address one model: resolved from the properties file.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArguments {
    /// Curated name the user selected (section name or alias target).
    pub name: String,
    pub provider: Provider,
    /// Provider name as written in the properties file, used for key lookup.
    pub provider_name: String,
    /// Full identifier sent to the provider.
    pub model_id: String,
    pub base_url: Option<String>,
    pub params: Map<String, Value>,
}

#[derive(Debug)]
pub struct LlmClient {
    http: HttpClient,
    api_key: Option<String>,
    base_url: String,
    pub provider: Provider,
    pub model_id: String,
    params: Map<String, Value>,
}

impl LlmClient {
    pub fn new(args: &ModelArguments, api_key: Option<String>) -> Self {
        let base_url = args
            .base_url
            .clone()
            .or_else(|| env::var(args.provider.base_url_env()).ok())
            .unwrap_or_else(|| args.provider.default_base_url().to_string());

        Self {
            http: crate::utils::setup_http_client(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            provider: args.provider,
            model_id: args.model_id.clone(),
            params: args.params.clone(),
        }
    }

    pub fn build_chat_request(&self, messages: &[Message]) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model_id.clone(),
            messages: normalize_messages(messages),
            stream: true,
            stream_options: Some(StreamOptions {
                include_usage: true,
            }),
            extra_body: self.params.clone(),
        }
    }

    pub fn build_gemini_request(&self, messages: &[Message]) -> GenerateContentRequest {
        let mut system_parts = Vec::new();
        let mut contents = Vec::new();

        for msg in normalize_messages(messages) {
            if msg.role == Role::System.to_string() {
                system_parts.push(GeminiPart::text(msg.content));
                continue;
            }
            let role = if msg.role == Role::Assistant.to_string() {
                "model"
            } else {
                "user"
            };
            contents.push(GeminiContent {
                role: Some(role.to_string()),
                parts: vec![GeminiPart::text(msg.content)],
            });
        }

        let mut generation_config = Map::new();
        for (key, value) in &self.params {
            let Some(mapped) = gemini_config_key(key) else {
                tracing::debug!("Dropping '{}': not a Gemini generation setting", key);
                continue;
            };
            let value = match (mapped, value) {
                ("stopSequences", Value::String(s)) => Value::Array(vec![Value::String(s.clone())]),
                _ => value.clone(),
            };
            generation_config.insert(mapped.to_string(), value);
        }

        GenerateContentRequest {
            contents,
            system_instruction: if system_parts.is_empty() {
                None
            } else {
                Some(GeminiContent {
                    role: None,
                    parts: system_parts,
                })
            },
            generation_config,
        }
    }

    /// Sends a streaming request; the caller reads the SSE body line by line.
    pub async fn stream_chat(&self, messages: &[Message]) -> Result<reqwest::Response, ParleyError> {
        let request_builder = match self.provider {
            Provider::Gemini => {
                let url = format!(
                    "{}/models/{}:streamGenerateContent?alt=sse",
                    self.base_url, self.model_id
                );
                let mut rb = self.http.post(&url).json(&self.build_gemini_request(messages));
                if let Some(key) = &self.api_key {
                    rb = rb.header("x-goog-api-key", key);
                }
                rb
            }
            Provider::Mock => {
                return Err(ParleyError::Provider(
                    "The mock provider does not use the network.".into(),
                ));
            }
            _ => {
                let url = format!("{}/chat/completions", self.base_url);
                let mut rb = self.http.post(&url).json(&self.build_chat_request(messages));
                if let Some(key) = &self.api_key {
                    rb = rb.header("Authorization", format!("Bearer {}", key));
                }
                rb
            }
        };

        tracing::debug!(
            provider = %self.provider,
            model = %self.model_id,
            "Sending chat request"
        );

        let response = request_builder
            .send()
            .await
            .map_err(|e| ParleyError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            let error_msg = if text.trim().is_empty() {
                format!("API Error (Status: {}): [Empty Body]", status)
            } else {
                format!("API Error (Status: {}): {}", status, text.trim())
            };
            return Err(ParleyError::Provider(error_msg));
        }

        Ok(response)
    }
}

/// `generationConfig` field for a request parameter, `None` for parameters
/// Gemini does not accept.
fn gemini_config_key(key: &str) -> Option<&'static str> {
    Some(match key {
        "temperature" => "temperature",
        "top_p" | "topP" => "topP",
        "top_k" | "topK" => "topK",
        "max_tokens" | "max_output_tokens" | "maxOutputTokens" => "maxOutputTokens",
        "stop" | "stop_sequences" | "stopSequences" => "stopSequences",
        "candidate_count" | "candidateCount" => "candidateCount",
        "presence_penalty" | "presencePenalty" => "presencePenalty",
        "frequency_penalty" | "frequencyPenalty" => "frequencyPenalty",
        "seed" => "seed",
        "response_mime_type" | "responseMimeType" => "responseMimeType",
        _ => return None,
    })
}

/// Helper to parse an SSE line: "data: {json}"
pub fn parse_sse_line<T: DeserializeOwned>(line: &str) -> Option<T> {
    let trimmed = line.trim();
    let content = trimmed.strip_prefix("data:")?.trim_start();
    if content == "[DONE]" {
        return None;
    }
    serde_json::from_str(content).ok()
}

/// Drops empty messages and merges consecutive same-role turns so that
/// providers with strict turn alternation accept the payload.
pub fn normalize_messages(messages: &[Message]) -> Vec<ChatMessage> {
    let mut aligned: Vec<ChatMessage> = Vec::with_capacity(messages.len());
    for msg in messages {
        let trimmed_content = msg.content.trim();
        if trimmed_content.is_empty() {
            continue;
        }
        let role = msg.role.to_string();

        if let Some(last) = aligned.last_mut()
            && last.role == role
        {
            last.content.push_str("\n\n");
            last.content.push_str(trimmed_content);
            continue;
        }
        aligned.push(ChatMessage {
            role,
            content: trimmed_content.to_string(),
        });
    }
    aligned
}
