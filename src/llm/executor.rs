use crate::config::Config;
use crate::consts::MOCK_REPLY_PREFIX;
use crate::exceptions::ParleyError;
use crate::keys::KeyStore;
use crate::llm::api_models::{ChatCompletionChunk, GenerateContentResponse};
use crate::llm::client::{LlmClient, ModelArguments, Provider, parse_sse_line};
use crate::models::{LlmResponse, Message, Role, TokenUsage};
use futures_util::TryStreamExt;
use std::time::Instant;

/// Resolves model settings and keys, then runs one request against the
/// model's provider.
pub struct LlmService<'a> {
    config: &'a Config,
    keys: &'a KeyStore,
}

impl<'a> LlmService<'a> {
    pub fn new(config: &'a Config, keys: &'a KeyStore) -> Self {
        Self { config, keys }
    }

    pub fn client_for(&self, args: &ModelArguments) -> LlmClient {
        let api_key = self.keys.lookup(&args.provider_name, &[]).or_else(|| {
            self.keys
                .lookup(args.provider.key_name(), args.provider.api_key_envs())
        });

        match (&api_key, args.provider.requires_key()) {
            (Some(_), _) => {
                tracing::debug!("Found provider '{}'. Injecting API key.", args.provider_name)
            }
            (None, true) => tracing::warn!(
                "Provider '{}' has no API key set. Proceeding without one.",
                args.provider_name
            ),
            (None, false) => {}
        }

        LlmClient::new(args, api_key)
    }

    /// Sends `messages` to `model` and streams content deltas into `on_delta`.
    pub async fn get_response<F>(
        &self,
        model: &str,
        messages: &[Message],
        mut on_delta: F,
    ) -> Result<LlmResponse, ParleyError>
    where
        F: FnMut(&str),
    {
        let args = self.config.model_arguments(model)?;
        tracing::debug!(
            "Calling {} ({}) with params: {}",
            args.model_id,
            args.provider,
            serde_json::Value::Object(args.params.clone())
        );

        let start_time = Instant::now();

        if args.provider == Provider::Mock {
            let content = mock_reply(messages);
            on_delta(&content);
            return Ok(LlmResponse {
                content,
                model: args.name,
                token_usage: None,
                duration_ms: start_time.elapsed().as_millis() as u64,
            });
        }

        let client = self.client_for(&args);
        let response = client.stream_chat(messages).await?;

        let mut full_response = String::new();
        let mut usage_data: Option<TokenUsage> = None;

        use tokio::io::AsyncBufReadExt;
        let stream = response.bytes_stream().map_err(std::io::Error::other);
        let reader = tokio_util::io::StreamReader::new(stream);
        let mut lines = tokio::io::BufReader::new(reader).lines();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let (delta, usage) = decode_line(args.provider, &line);
                    if let Some(text) = delta
                        && !text.is_empty()
                    {
                        full_response.push_str(&text);
                        on_delta(&text);
                    }
                    if usage.is_some() {
                        usage_data = usage;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    if !full_response.is_empty() {
                        tracing::warn!("Stream interrupted: {}. Saving partial response.", e);
                        break;
                    } else {
                        return Err(ParleyError::Provider(format!("Stream error: {}", e)));
                    }
                }
            }
        }

        if full_response.trim().is_empty() {
            return Err(ParleyError::Provider(format!(
                "{} returned an empty response.",
                args.provider
            )));
        }

        Ok(LlmResponse {
            content: full_response,
            model: args.name,
            token_usage: usage_data,
            duration_ms: start_time.elapsed().as_millis() as u64,
        })
    }
}

/// Content delta and usage carried by one SSE line, per wire format.
pub fn decode_line(provider: Provider, line: &str) -> (Option<String>, Option<TokenUsage>) {
    match provider {
        Provider::Gemini => match parse_sse_line::<GenerateContentResponse>(line) {
            Some(chunk) => {
                let usage = chunk.usage_metadata.as_ref().map(|u| TokenUsage {
                    prompt_tokens: u.prompt_token_count,
                    completion_tokens: u.candidates_token_count,
                    total_tokens: u.total_token_count,
                });
                (Some(chunk.text()), usage)
            }
            None => (None, None),
        },
        _ => match parse_sse_line::<ChatCompletionChunk>(line) {
            Some(chunk) => {
                let delta = chunk.choices.first().and_then(|c| c.delta.content.clone());
                let usage = chunk.usage.map(|u| TokenUsage {
                    prompt_tokens: u.prompt_tokens,
                    completion_tokens: u.completion_tokens,
                    total_tokens: u.total_tokens,
                });
                (delta, usage)
            }
            None => (None, None),
        },
    }
}

fn mock_reply(messages: &[Message]) -> String {
    let last_user = messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.trim())
        .unwrap_or("");
    format!("{}{}", MOCK_REPLY_PREFIX, last_user)
}
