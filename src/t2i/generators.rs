use crate::consts::*;
use crate::exceptions::ParleyError;
use crate::llm::api_models::{GeminiContent, GeminiPart, GenerateContentResponse};
use crate::t2i::response::ImageResponse;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::{Value, json};
use std::env;
use std::time::Duration;

const IMAGE_TIMEOUT: Duration = Duration::from_secs(120);
const REPLICATE_POLL_INTERVAL: Duration = Duration::from_secs(1);
const REPLICATE_MAX_POLLS: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    DallE,
    DeepInfra,
    Gemini,
    Replicate,
    Mock,
}

impl Family {
    /// Key-file entry holding this family's credentials.
    pub fn key_name(&self) -> &'static str {
        match self {
            Family::DallE => "OpenAI",
            Family::DeepInfra => "DeepInfra",
            Family::Gemini => "Google AI",
            Family::Replicate => "Replicate",
            Family::Mock => "Mock",
        }
    }

    pub fn api_key_envs(&self) -> &'static [&'static str] {
        match self {
            Family::DallE => &["OPENAI_API_KEY"],
            Family::DeepInfra => &["DEEPINFRA_API_KEY"],
            Family::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
            Family::Replicate => &["REPLICATE_API_TOKEN"],
            Family::Mock => &[],
        }
    }

    fn base_url(&self) -> String {
        let (var, default) = match self {
            Family::DallE => ("PARLEY_OPENAI_BASE_URL", OPENAI_BASE_URL),
            Family::DeepInfra => ("PARLEY_DEEPINFRA_BASE_URL", DEEPINFRA_BASE_URL),
            Family::Gemini => ("PARLEY_GEMINI_BASE_URL", GEMINI_BASE_URL),
            Family::Replicate => ("PARLEY_REPLICATE_BASE_URL", REPLICATE_BASE_URL),
            Family::Mock => return String::new(),
        };
        env::var(var)
            .unwrap_or_else(|_| default.to_string())
            .trim_end_matches('/')
            .to_string()
    }
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Family::DallE => "DALL-E",
            Family::DeepInfra => "DeepInfra",
            Family::Gemini => "Gemini",
            Family::Replicate => "Replicate",
            Family::Mock => "Mock",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug)]
pub struct ImageModel {
    pub name: &'static str,
    pub family: Family,
    pub aliases: &'static [&'static str],
    pub size: Option<&'static str>,
    pub quality: Option<&'static str>,
    pub style: Option<&'static str>,
}

pub const IMAGE_MODELS: &[ImageModel] = &[
    ImageModel {
        name: "dall-e-3",
        family: Family::DallE,
        aliases: &["dalle-3", "dalle3"],
        size: Some("1024x1024"),
        quality: Some("standard"),
        style: Some("vivid"),
    },
    ImageModel {
        name: "dall-e-2",
        family: Family::DallE,
        aliases: &["dalle-2", "dalle2"],
        size: Some("1024x1024"),
        quality: None,
        style: None,
    },
    ImageModel {
        name: "black-forest-labs/FLUX-2-pro",
        family: Family::DeepInfra,
        aliases: &["flux-2"],
        size: Some("1024x1024"),
        quality: None,
        style: None,
    },
    ImageModel {
        name: "ByteDance/Seedream-4",
        family: Family::DeepInfra,
        aliases: &["seedream-4"],
        size: Some("1024x1024"),
        quality: None,
        style: None,
    },
    ImageModel {
        name: "stability-ai/stable-diffusion-3.5-large",
        family: Family::DeepInfra,
        aliases: &["sd-3.5"],
        size: Some("1024x1024"),
        quality: None,
        style: None,
    },
    ImageModel {
        name: "gemini-2.5-flash-image",
        family: Family::Gemini,
        aliases: &[
            "gemini-2.5",
            "nanobanana",
            "nano-banana",
            "gemini-2.5-image",
            "flash-image",
        ],
        size: None,
        quality: None,
        style: None,
    },
    ImageModel {
        name: "gemini-3-pro-image-preview",
        family: Family::Gemini,
        aliases: &[
            "gemini-3",
            "gemini-3-image",
            "gemini-3-pro-image",
            "gemini-3-preview",
        ],
        size: None,
        quality: None,
        style: None,
    },
    ImageModel {
        name: "prunaai/z-image-turbo",
        family: Family::Replicate,
        aliases: &["z-image"],
        size: None,
        quality: None,
        style: None,
    },
    ImageModel {
        name: "mock",
        family: Family::Mock,
        aliases: &["test", "placeholder", "mock-image"],
        size: None,
        quality: None,
        style: None,
    },
];

/// Canonical name or alias to model entry.
pub fn lookup(model: &str) -> Option<&'static ImageModel> {
    IMAGE_MODELS
        .iter()
        .find(|m| m.name == model || m.aliases.contains(&model))
}

/// Every accepted name: aliases and canonical names.
pub fn supported_models() -> Vec<&'static str> {
    IMAGE_MODELS
        .iter()
        .flat_map(|m| m.aliases.iter().copied().chain(std::iter::once(m.name)))
        .collect()
}

#[derive(Debug)]
pub struct ImageGenerator {
    pub model: &'static ImageModel,
    api_key: Option<String>,
    base_url: String,
    http: reqwest::Client,
    pub size: Option<String>,
    poll_interval: Duration,
    max_polls: u32,
}

/// Picks the generator for `model`. The key falls back to the family's
/// environment variables.
pub fn of(model: &str, key: Option<String>) -> Result<ImageGenerator, ParleyError> {
    let entry = lookup(model.trim()).ok_or_else(|| {
        ParleyError::InvalidInput(format!(
            "Model {} not supported. Supported models: {}",
            model,
            supported_models().join(", ")
        ))
    })?;

    let api_key = key.filter(|k| !k.trim().is_empty()).or_else(|| {
        entry
            .family
            .api_key_envs()
            .iter()
            .filter_map(|var| env::var(var).ok())
            .find(|v| !v.trim().is_empty())
    });

    if entry.family != Family::Mock && api_key.is_none() {
        return Err(ParleyError::Configuration(format!(
            "{} API key not provided. Run `parley keys set \"{}\"` or set {}.",
            entry.family,
            entry.family.key_name(),
            entry.family.api_key_envs().join(" or ")
        )));
    }

    tracing::info!("Using {} model: {}", entry.family, entry.name);

    Ok(ImageGenerator {
        model: entry,
        api_key,
        base_url: entry.family.base_url(),
        http: crate::utils::setup_http_client_with_timeout(Some(IMAGE_TIMEOUT)),
        size: entry.size.map(String::from),
        poll_interval: REPLICATE_POLL_INTERVAL,
        max_polls: REPLICATE_MAX_POLLS,
    })
}

// --- Wire types ---

#[derive(Deserialize, Debug)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Deserialize, Debug)]
struct ImageDatum {
    b64_json: Option<String>,
    url: Option<String>,
    revised_prompt: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Prediction {
    id: Option<String>,
    status: String,
    #[serde(default)]
    output: Value,
    error: Option<Value>,
    urls: Option<PredictionUrls>,
}

#[derive(Deserialize, Debug)]
struct PredictionUrls {
    get: Option<String>,
}

impl ImageGenerator {
    pub async fn generate(&self, prompt: &str) -> Result<ImageResponse, ParleyError> {
        if prompt.trim().is_empty() {
            return Err(ParleyError::InvalidInput("Prompt cannot be empty.".into()));
        }
        tracing::debug!("Generating image with {}: {}", self.model.name, prompt);

        match self.model.family {
            Family::Mock => Ok(ImageResponse::from_url(
                MOCK_IMAGE_URL,
                Some(format!("[Mock] {}", prompt)),
            )),
            Family::DallE => self.openai_images(prompt, false).await,
            Family::DeepInfra => self.openai_images(prompt, true).await,
            Family::Gemini => self.gemini_image(prompt).await,
            Family::Replicate => self.replicate_image(prompt).await,
        }
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key.as_deref().unwrap_or_default())
    }

    /// OpenAI-style `images/generations`, shared by DALL-E and DeepInfra.
    async fn openai_images(&self, prompt: &str, want_b64: bool) -> Result<ImageResponse, ParleyError> {
        let mut body = json!({
            "model": self.model.name,
            "prompt": prompt,
            "n": 1,
        });
        if let Some(size) = &self.size {
            body["size"] = json!(size);
        }
        if let Some(quality) = self.model.quality {
            body["quality"] = json!(quality);
        }
        if let Some(style) = self.model.style {
            body["style"] = json!(style);
        }
        if want_b64 {
            body["response_format"] = json!("b64_json");
        }

        let url = format!("{}/images/generations", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("Authorization", self.bearer())
            .json(&body)
            .send()
            .await
            .map_err(|e| ParleyError::Provider(e.to_string()))?;
        let parsed: ImagesResponse = read_json_response(response, self.model.family).await?;

        let datum = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ParleyError::Provider("No image data in response".into()))?;

        if let Some(b64) = datum.b64_json {
            let bytes = decode_base64(&b64)?;
            Ok(ImageResponse::from_bytes(bytes, datum.revised_prompt))
        } else if let Some(url) = datum.url {
            Ok(ImageResponse::from_url(url, datum.revised_prompt))
        } else {
            Err(ParleyError::Provider(
                "Neither b64_json nor url found in response".into(),
            ))
        }
    }

    async fn gemini_image(&self, prompt: &str) -> Result<ImageResponse, ParleyError> {
        let content = GeminiContent {
            role: Some("user".into()),
            parts: vec![GeminiPart::text(prompt)],
        };
        let body = json!({
            "contents": [content],
            "generationConfig": { "responseModalities": ["IMAGE"] },
        });

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model.name);
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", self.api_key.as_deref().unwrap_or_default())
            .json(&body)
            .send()
            .await
            .map_err(|e| ParleyError::Provider(e.to_string()))?;
        let parsed: GenerateContentResponse = read_json_response(response, self.model.family).await?;

        let inline = parsed
            .candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .find_map(|p| p.inline_data.as_ref())
            .ok_or_else(|| ParleyError::Provider("No image data found in response".into()))?;

        let bytes = decode_base64(&inline.data)?;
        let text = parsed.text();
        tracing::info!(
            "Extracted {} image ({} bytes)",
            inline.mime_type,
            bytes.len()
        );
        Ok(ImageResponse::from_bytes(
            bytes,
            if text.trim().is_empty() { None } else { Some(text) },
        ))
    }

    async fn replicate_image(&self, prompt: &str) -> Result<ImageResponse, ParleyError> {
        let url = format!("{}/models/{}/predictions", self.base_url, self.model.name);
        let response = self
            .http
            .post(&url)
            .header("Authorization", self.bearer())
            .header("Prefer", "wait")
            .json(&json!({ "input": { "prompt": prompt } }))
            .send()
            .await
            .map_err(|e| ParleyError::Provider(e.to_string()))?;
        let mut prediction: Prediction = read_json_response(response, self.model.family).await?;

        let mut polls = 0;
        while matches!(prediction.status.as_str(), "starting" | "processing") {
            let get_url = prediction
                .urls
                .as_ref()
                .and_then(|u| u.get.clone())
                .ok_or_else(|| {
                    ParleyError::Provider(format!(
                        "Prediction {} is still {} and has no status URL",
                        prediction.id.as_deref().unwrap_or("?"),
                        prediction.status
                    ))
                })?;
            polls += 1;
            if polls > self.max_polls {
                return Err(ParleyError::Provider(format!(
                    "Prediction {} did not finish in time",
                    prediction.id.as_deref().unwrap_or("?")
                )));
            }
            tokio::time::sleep(self.poll_interval).await;

            let response = self
                .http
                .get(&get_url)
                .header("Authorization", self.bearer())
                .send()
                .await
                .map_err(|e| ParleyError::Provider(e.to_string()))?;
            prediction = read_json_response(response, self.model.family).await?;
        }

        if prediction.status != "succeeded" {
            let detail = prediction
                .error
                .map(|e| e.to_string())
                .unwrap_or_else(|| prediction.status.clone());
            return Err(ParleyError::Provider(format!("Replicate prediction failed: {}", detail)));
        }

        let output = match prediction.output {
            Value::String(s) => s,
            Value::Array(items) => items
                .into_iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect::<String>(),
            other => {
                return Err(ParleyError::Provider(format!(
                    "Unexpected output from Replicate: {}",
                    other
                )));
            }
        };
        replicate_output(&output)
    }
}

/// Replicate returns URLs, data URIs or raw base64 depending on the model.
pub fn replicate_output(output: &str) -> Result<ImageResponse, ParleyError> {
    let output = output.trim();
    if output.is_empty() {
        return Err(ParleyError::Provider("No data in Replicate response".into()));
    }
    if let Some(rest) = output.strip_prefix("data:")
        && let Some((_, b64)) = rest.split_once(',')
    {
        return Ok(ImageResponse::from_bytes(decode_base64(b64)?, None));
    }
    if output.starts_with("http://") || output.starts_with("https://") {
        return Ok(ImageResponse::from_url(output, None));
    }
    match decode_base64(output) {
        Ok(bytes) => Ok(ImageResponse::from_bytes(bytes, None)),
        Err(_) => {
            tracing::warn!("Unrecognized string format from Replicate, treating as URL");
            Ok(ImageResponse::from_url(output, None))
        }
    }
}

fn decode_base64(data: &str) -> Result<Vec<u8>, ParleyError> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64
        .decode(cleaned.as_bytes())
        .map_err(|e| ParleyError::Provider(format!("Failed to decode base64 image: {}", e)))
}

async fn read_json_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    family: Family,
) -> Result<T, ParleyError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ParleyError::Provider(e.to_string()))?;

    if !status.is_success() {
        let body = if text.trim().is_empty() {
            "[Empty Body]".to_string()
        } else {
            text.trim().to_string()
        };
        return Err(ParleyError::Provider(format!(
            "{} API Error (Status: {}): {}",
            family, status, body
        )));
    }

    serde_json::from_str(&text).map_err(|e| {
        ParleyError::Provider(format!("Unexpected {} response: {}", family, e))
    })
}
