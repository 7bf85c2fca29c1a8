//! OpenAI-compatible HTTP client.
//!
//! Translation and story planning use chat completions in JSON mode. Images
//! are requested as URLs and downloaded; speech comes back as raw bytes.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::config::GenerationSettings;
use crate::domain::Locale;

use super::{
    ContentTranslator, GeneratedAsset, ImageGenerator, SpeechSynthesizer, StoryDraft,
    StoryPlanner,
};

/// Client for an OpenAI-compatible API
pub struct OpenAiClient {
    /// API root, e.g. `https://api.openai.com/v1`
    base_url: String,
    api_key: Option<String>,
    chat_model: String,
    image_model: String,
    speech_model: String,
    voice: String,
    /// HTTP client
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
}

impl OpenAiClient {
    /// Create from resolved settings
    pub fn from_settings(settings: &GenerationSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            chat_model: settings.chat_model.clone(),
            image_model: settings.image_model.clone(),
            speech_model: settings.speech_model.clone(),
            voice: settings.voice.clone(),
            client,
        })
    }

    /// Build API URL
    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.client.post(self.api_url(path));
        match self.api_key {
            Some(ref key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Fail with the response body when the status is not 2xx
    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("{} failed with HTTP {}: {}", what, status, body.trim());
    }

    /// Run a JSON-mode chat completion and parse the reply
    async fn chat_json(&self, system: &str, user: &str) -> Result<Value> {
        let response = self
            .post("chat/completions")
            .json(&json!({
                "model": self.chat_model,
                "response_format": {"type": "json_object"},
                "messages": [
                    {"role": "system", "content": system},
                    {"role": "user", "content": user},
                ],
            }))
            .send()
            .await
            .context("Failed to send chat completion request")?;

        let response: ChatResponse = Self::check(response, "Chat completion")
            .await?
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .context("Chat completion returned no content")?;

        serde_json::from_str(&content).context("Chat completion did not return valid JSON")
    }
}

#[async_trait]
impl ContentTranslator for OpenAiClient {
    fn model(&self) -> &str {
        &self.chat_model
    }

    #[instrument(skip(self, payload, locale), fields(locale = %locale))]
    async fn translate(&self, payload: &Value, locale: Locale) -> Result<Value> {
        let system = format!(
            "Translate every string value in the user's JSON document into {}. \
             Keep all keys, the structure, numbers and any LaTeX math ($...$, \\(...\\)) \
             unchanged. Reply with the translated JSON document only.",
            locale.language_name()
        );
        let translated = self
            .chat_json(&system, &serde_json::to_string(payload)?)
            .await
            .with_context(|| format!("Failed to translate content to {}", locale))?;

        if payload.is_object() && !translated.is_object() {
            anyhow::bail!("Translation changed the payload shape");
        }
        debug!("Translation received");
        Ok(translated)
    }
}

#[async_trait]
impl StoryPlanner for OpenAiClient {
    fn model(&self) -> &str {
        &self.chat_model
    }

    #[instrument(skip(self, payload, locale), fields(locale = %locale))]
    async fn plan(&self, payload: &Value, locale: Locale, max_slides: usize) -> Result<StoryDraft> {
        let system = format!(
            "You turn lessons into short illustrated stories for students. \
             Write in {language}. Reply with JSON of the form \
             {{\"title\": string, \"slides\": [{{\"caption\": string, \"image_prompt\": string}}]}} \
             with at most {max_slides} slides. Captions are one or two sentences; \
             image prompts describe a single illustration in English.",
            language = locale.language_name(),
            max_slides = max_slides
        );
        let reply = self
            .chat_json(&system, &serde_json::to_string(payload)?)
            .await
            .context("Failed to plan story")?;

        let draft: StoryDraft =
            serde_json::from_value(reply).context("Story plan has an unexpected shape")?;
        debug!(slides = draft.slides.len(), "Story plan received");
        Ok(draft)
    }
}

#[async_trait]
impl ImageGenerator for OpenAiClient {
    #[instrument(skip(self, prompt))]
    async fn generate(&self, prompt: &str) -> Result<GeneratedAsset> {
        let response = self
            .post("images/generations")
            .json(&json!({
                "model": self.image_model,
                "prompt": prompt,
                "n": 1,
                "size": "1024x1024",
                "response_format": "url",
            }))
            .send()
            .await
            .context("Failed to send image generation request")?;

        let response: ImageResponse = Self::check(response, "Image generation")
            .await?
            .json()
            .await
            .context("Failed to parse image generation response")?;

        let url = response
            .data
            .into_iter()
            .find_map(|d| d.url)
            .context("Image generation returned no URL")?;

        let download = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to download generated image")?;
        let download = Self::check(download, "Image download").await?;
        let mime = download
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .unwrap_or_else(|| "image/png".to_string());
        let bytes = download
            .bytes()
            .await
            .context("Failed to read generated image")?;

        Ok(GeneratedAsset::new(bytes.to_vec(), mime))
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiClient {
    fn voice(&self) -> &str {
        &self.voice
    }

    #[instrument(skip(self, text, locale), fields(locale = %locale))]
    async fn synthesize(&self, text: &str, locale: Locale) -> Result<GeneratedAsset> {
        let response = self
            .post("audio/speech")
            .json(&json!({
                "model": self.speech_model,
                "voice": self.voice,
                "input": text,
                "response_format": "mp3",
            }))
            .send()
            .await
            .context("Failed to send speech request")?;

        let bytes = Self::check(response, "Speech synthesis")
            .await?
            .bytes()
            .await
            .context("Failed to read synthesized audio")?;

        Ok(GeneratedAsset::new(bytes.to_vec(), "audio/mpeg"))
    }
}
