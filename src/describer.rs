//! Frame description via multimodal models.
//!
//! Defines the [`FrameDescriber`] capability and its providers:
//! - **[`OllamaDescriber`]** — `POST /api/chat` on a local Ollama with the
//!   frame attached as a base64 image (default model `llama3.2-vision`).
//! - **[`OpenAIDescriber`]** — `POST /v1/chat/completions` with the frame
//!   as a `data:image/jpeg;base64,...` image part.
//! - **[`DisabledDescriber`]** — fails every call; used when no model is
//!   configured.
//!
//! Every provider sends the same single-turn request: the frame prompt
//! ([`DEFAULT_PROMPT`] unless overridden) plus one image. The model's reply
//! is used verbatim apart from trimming surrounding whitespace. Calls are
//! bounded by `describer.timeout_secs` and are never retried; any failure
//! is a [`PipelineError::DescriptionFailed`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use base64::Engine as _;
use serde_json::{json, Value};

use crate::config::DescriberConfig;
use crate::error::{PipelineError, PipelineResult};

/// Instruction sent with every frame.
pub const DEFAULT_PROMPT: &str = "Describe the action in this cricket frame specifically. \
Is it a six, wicket, or boundary? Return a short 1-sentence description.";

/// Capability: turn one frame image into a short description.
#[async_trait]
pub trait FrameDescriber: Send + Sync {
    /// Returns the model identifier (e.g. `"llama3.2-vision"`).
    fn model_name(&self) -> &str;

    /// Describe the image at `image`.
    ///
    /// The file must exist and be readable; a read error is reported as
    /// [`PipelineError::DescriptionFailed`] like any model error.
    async fn describe(&self, image: &Path) -> PipelineResult<String>;
}

async fn read_image_base64(image: &Path) -> PipelineResult<String> {
    let bytes = tokio::fs::read(image)
        .await
        .map_err(|e| PipelineError::description(image, format!("cannot read image: {}", e)))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

fn non_empty(image: &Path, text: &str) -> PipelineResult<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::description(image, "model returned an empty description"));
    }
    Ok(trimmed.to_string())
}

fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Send a JSON request and return the decoded body, mapping transport and
/// HTTP errors to `DescriptionFailed`.
async fn post_json(
    request: reqwest::RequestBuilder,
    image: &Path,
    provider: &str,
) -> PipelineResult<Value> {
    let response = request.send().await.map_err(|e| {
        let reason = if e.is_timeout() {
            format!("{} request timed out", provider)
        } else {
            format!("{} request failed: {}", provider, e)
        };
        PipelineError::description(image, reason)
    })?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        return Err(PipelineError::description(
            image,
            format!("{} API error {}: {}", provider, status, body_text.trim()),
        ));
    }

    response.json::<Value>().await.map_err(|e| {
        PipelineError::description(image, format!("invalid {} response: {}", provider, e))
    })
}

// ============ Disabled ============

/// A describer that always fails. Used when `describer.provider = "disabled"`.
pub struct DisabledDescriber;

#[async_trait]
impl FrameDescriber for DisabledDescriber {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn describe(&self, image: &Path) -> PipelineResult<String> {
        Err(PipelineError::description(image, "describer is disabled"))
    }
}

// ============ Ollama ============

/// Describer backed by a local Ollama instance.
///
/// Requires a vision-capable model to be pulled
/// (e.g. `ollama pull llama3.2-vision`).
pub struct OllamaDescriber {
    model: String,
    url: String,
    prompt: String,
    client: reqwest::Client,
}

impl OllamaDescriber {
    pub const DEFAULT_URL: &'static str = "http://localhost:11434";
    pub const DEFAULT_MODEL: &'static str = "llama3.2-vision";

    pub fn new(config: &DescriberConfig) -> Result<Self> {
        Ok(Self {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            prompt: config
                .prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
            client: build_client(config.timeout_secs)?,
        })
    }

    fn request_body(&self, image_b64: String) -> Value {
        json!({
            "model": self.model,
            "stream": false,
            "messages": [{
                "role": "user",
                "content": self.prompt,
                "images": [image_b64],
            }],
        })
    }
}

#[async_trait]
impl FrameDescriber for OllamaDescriber {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn describe(&self, image: &Path) -> PipelineResult<String> {
        let body = self.request_body(read_image_base64(image).await?);
        let request = self
            .client
            .post(format!("{}/api/chat", self.url))
            .json(&body);
        let json = post_json(request, image, "Ollama").await?;
        let text = parse_ollama_response(&json)
            .map_err(|e| PipelineError::description(image, e))?;
        non_empty(image, &text)
    }
}

/// Extract `message.content` from an Ollama `/api/chat` response.
fn parse_ollama_response(json: &Value) -> Result<String> {
    if let Some(err) = json.get("error").and_then(|e| e.as_str()) {
        bail!("Ollama error: {}", err);
    }
    json.get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing message.content"))
}

// ============ OpenAI ============

/// Describer backed by the OpenAI chat completions API.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAIDescriber {
    model: String,
    url: String,
    api_key: String,
    prompt: String,
    client: reqwest::Client,
}

impl OpenAIDescriber {
    pub const DEFAULT_URL: &'static str = "https://api.openai.com";
    pub const DEFAULT_MODEL: &'static str = "gpt-4o-mini";

    /// # Errors
    ///
    /// Returns an error if `OPENAI_API_KEY` is not set.
    pub fn new(config: &DescriberConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &DescriberConfig, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.into(),
            prompt: config
                .prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
            client: build_client(config.timeout_secs)?,
        })
    }

    fn request_body(&self, image_b64: String) -> Value {
        json!({
            "model": self.model,
            "max_tokens": 100,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": self.prompt },
                    {
                        "type": "image_url",
                        "image_url": { "url": format!("data:image/jpeg;base64,{}", image_b64) }
                    }
                ],
            }],
        })
    }
}

#[async_trait]
impl FrameDescriber for OpenAIDescriber {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn describe(&self, image: &Path) -> PipelineResult<String> {
        let body = self.request_body(read_image_base64(image).await?);
        let request = self
            .client
            .post(format!("{}/v1/chat/completions", self.url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body);
        let json = post_json(request, image, "OpenAI").await?;
        let text = parse_openai_response(&json)
            .map_err(|e| PipelineError::description(image, e))?;
        non_empty(image, &text)
    }
}

/// Extract `choices[0].message.content` from a chat completions response.
fn parse_openai_response(json: &Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

/// Create the [`FrameDescriber`] selected by configuration.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"ollama"` | [`OllamaDescriber`] |
/// | `"openai"` | [`OpenAIDescriber`] |
/// | `"disabled"` | [`DisabledDescriber`] |
pub fn create_describer(config: &DescriberConfig) -> Result<Arc<dyn FrameDescriber>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledDescriber)),
        "ollama" => Ok(Arc::new(OllamaDescriber::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIDescriber::new(config)?)),
        other => bail!("Unknown describer provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use std::sync::Mutex;
    use tempfile::TempDir;

    type Captured = Arc<Mutex<Vec<Value>>>;

    /// Serves a canned JSON reply on `path` and records request bodies.
    async fn mock_model(path: &'static str, status: StatusCode, reply: Value) -> (String, Captured) {
        let captured: Captured = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route(
                path,
                post(
                    move |State(captured): State<Captured>, Json(body): Json<Value>| {
                        let reply = reply.clone();
                        async move {
                            captured.lock().unwrap().push(body);
                            (status, Json(reply))
                        }
                    },
                ),
            )
            .with_state(captured.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        (format!("http://{}", addr), captured)
    }

    fn frame(tmp: &TempDir) -> std::path::PathBuf {
        let path = tmp.path().join("frame-0001.jpg");
        std::fs::write(&path, [0xFFu8, 0xD8, 0xFF, 0xE0]).unwrap();
        path
    }

    fn config(provider: &str, url: &str) -> DescriberConfig {
        DescriberConfig {
            provider: provider.to_string(),
            url: Some(url.to_string()),
            timeout_secs: 5,
            ..DescriberConfig::default()
        }
    }

    #[tokio::test]
    async fn ollama_sends_prompt_and_image() {
        let tmp = TempDir::new().unwrap();
        let image = frame(&tmp);
        let (url, captured) = mock_model(
            "/api/chat",
            StatusCode::OK,
            json!({"message": {"role": "assistant", "content": "  The batter hits a six.\n"}}),
        )
        .await;

        let describer = OllamaDescriber::new(&config("ollama", &url)).unwrap();
        assert_eq!(describer.model_name(), "llama3.2-vision");
        let text = describer.describe(&image).await.unwrap();
        assert_eq!(text, "The batter hits a six.");

        let bodies = captured.lock().unwrap();
        let msg = &bodies[0]["messages"][0];
        assert_eq!(msg["content"], DEFAULT_PROMPT);
        assert_eq!(msg["images"][0], "/9j/4A==");
        assert_eq!(bodies[0]["stream"], false);
    }

    #[tokio::test]
    async fn ollama_http_error_is_description_failed() {
        let tmp = TempDir::new().unwrap();
        let image = frame(&tmp);
        let (url, _) = mock_model(
            "/api/chat",
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"error": "model not loaded"}),
        )
        .await;

        let describer = OllamaDescriber::new(&config("ollama", &url)).unwrap();
        let err = describer.describe(&image).await.unwrap_err();
        assert!(matches!(err, PipelineError::DescriptionFailed { .. }));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn openai_sends_data_uri_and_bearer() {
        let tmp = TempDir::new().unwrap();
        let image = frame(&tmp);
        let (url, captured) = mock_model(
            "/v1/chat/completions",
            StatusCode::OK,
            json!({"choices": [{"message": {"role": "assistant", "content": "Wicket! The stumps are hit."}}]}),
        )
        .await;

        let mut cfg = config("openai", &url);
        cfg.prompt = Some("What happens?".to_string());
        let describer = OpenAIDescriber::with_api_key(&cfg, "sk-test").unwrap();
        let text = describer.describe(&image).await.unwrap();
        assert_eq!(text, "Wicket! The stumps are hit.");

        let bodies = captured.lock().unwrap();
        let parts = &bodies[0]["messages"][0]["content"];
        assert_eq!(parts[0]["text"], "What happens?");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/jpeg;base64,/9j/4A==");
    }

    #[tokio::test]
    async fn empty_reply_is_description_failed() {
        let tmp = TempDir::new().unwrap();
        let image = frame(&tmp);
        let (url, _) = mock_model(
            "/api/chat",
            StatusCode::OK,
            json!({"message": {"content": "   "}}),
        )
        .await;

        let describer = OllamaDescriber::new(&config("ollama", &url)).unwrap();
        let err = describer.describe(&image).await.unwrap_err();
        assert!(err.to_string().contains("empty description"));
    }

    #[tokio::test]
    async fn unreadable_image_is_description_failed() {
        let describer = OllamaDescriber::new(&config("ollama", "http://127.0.0.1:9")).unwrap();
        let err = describer
            .describe(Path::new("/nonexistent/frame-0001.jpg"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cannot read image"));
    }

    #[tokio::test]
    async fn disabled_always_fails() {
        let err = DisabledDescriber
            .describe(Path::new("frame-0001.jpg"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }

    #[test]
    fn parse_responses() {
        assert_eq!(
            parse_ollama_response(&json!({"message": {"content": "x"}})).unwrap(),
            "x"
        );
        assert!(parse_ollama_response(&json!({"error": "boom"})).is_err());
        assert!(parse_ollama_response(&json!({})).is_err());
        assert!(parse_openai_response(&json!({"choices": []})).is_err());
    }

    #[test]
    fn create_describer_selects_provider() {
        let cfg = DescriberConfig {
            provider: "disabled".into(),
            ..DescriberConfig::default()
        };
        assert_eq!(create_describer(&cfg).unwrap().model_name(), "disabled");

        let cfg = DescriberConfig {
            provider: "ollama".into(),
            model: Some("llava".into()),
            ..DescriberConfig::default()
        };
        assert_eq!(create_describer(&cfg).unwrap().model_name(), "llava");

        let cfg = DescriberConfig {
            provider: "bogus".into(),
            ..DescriberConfig::default()
        };
        assert!(create_describer(&cfg).is_err());
    }
}
