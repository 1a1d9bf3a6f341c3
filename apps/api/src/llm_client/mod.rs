/// LLM Client: the single point of entry for all generative-language API calls.
///
/// ARCHITECTURAL RULE: No other module may call the Gemini API directly.
/// The workflow depends on the `GenerationService` trait, not on this client.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::LlmConfig;

pub mod prompts;

const API_KEY_HEADER: &str = "x-goog-api-key";
const JSON_MIME_TYPE: &str = "application/json";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API key is missing. Please ensure it's configured in the deployment environment.")]
    MissingApiKey,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Failed to get valid content from API response")]
    MalformedResponse,

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'a str,
    response_schema: &'a Value,
}

impl<'a> GenerateContentRequest<'a> {
    fn new(prompt: &'a str, schema: Option<&'a Value>) -> Self {
        Self {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: schema.map(|schema| GenerationConfig {
                response_mime_type: JSON_MIME_TYPE,
                response_schema: schema,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
}

impl GenerateContentResponse {
    /// Text of the first part of the first candidate.
    pub fn text(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .and_then(|p| p.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Service trait
// ────────────────────────────────────────────────────────────────────────────

/// The generation backend seen by the workflow.
///
/// Held by `WorkflowController` as `Arc<dyn GenerationService>`.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Free-form prose response.
    async fn generate_text(&self, prompt: &str) -> Result<String, LlmError>;

    /// Structured response constrained by `schema`, parsed as JSON.
    async fn generate_structured(&self, prompt: &str, schema: &Value) -> Result<Value, LlmError>;
}

/// Calls `generate_structured` and deserializes the result into `T`.
pub async fn generate_json<T: DeserializeOwned>(
    service: &dyn GenerationService,
    prompt: &str,
    schema: &Value,
) -> Result<T, LlmError> {
    let value = service.generate_structured(prompt, schema).await?;
    serde_json::from_value(value).map_err(LlmError::Parse)
}

// ────────────────────────────────────────────────────────────────────────────
// Gemini client
// ────────────────────────────────────────────────────────────────────────────

/// Wraps the Gemini `generateContent` endpoint with timeout, retry and
/// structured output helpers.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Makes a raw call to the API, returning the full response object.
    /// Retries on 429 (rate limit), 5xx and transport errors with exponential backoff.
    pub async fn call(
        &self,
        prompt: &str,
        schema: Option<&Value>,
    ) -> Result<GenerateContentResponse, LlmError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(LlmError::MissingApiKey)?;

        let request_body = GenerateContentRequest::new(prompt, schema);
        let url = self.endpoint();
        let attempts = self.config.max_retries + 1;

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = backoff_delay(self.config.retry_base_delay_ms, attempt);
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&url)
                .header(API_KEY_HEADER, api_key)
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                let error = LlmError::Api {
                    status: status.as_u16(),
                    message: upstream_message(&body),
                };
                if status.as_u16() == 429 || status.is_server_error() {
                    last_error = Some(error);
                    continue;
                }
                return Err(error);
            }

            let parsed: GenerateContentResponse = response.json().await?;

            if let Some(usage) = &parsed.usage_metadata {
                debug!(
                    "LLM call succeeded: prompt_tokens={}, candidate_tokens={}",
                    usage.prompt_token_count, usage.candidates_token_count
                );
            }

            return Ok(parsed);
        }

        Err(last_error.unwrap_or(LlmError::MalformedResponse))
    }
}

#[async_trait]
impl GenerationService for LlmClient {
    async fn generate_text(&self, prompt: &str) -> Result<String, LlmError> {
        let response = self.call(prompt, None).await?;
        response
            .text()
            .map(str::to_string)
            .ok_or(LlmError::MalformedResponse)
    }

    async fn generate_structured(&self, prompt: &str, schema: &Value) -> Result<Value, LlmError> {
        let response = self.call(prompt, Some(schema)).await?;
        let text = response.text().ok_or(LlmError::MalformedResponse)?;
        serde_json::from_str(strip_json_fences(text)).map_err(LlmError::Parse)
    }
}

/// Exponential backoff before retry number `attempt` (1-based), saturating.
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor))
}

/// Pulls `error.message` out of an upstream error body.
fn upstream_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if body.trim().is_empty() => "Unknown error".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));
    match inner {
        Some(stripped) => stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start()),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use serde_json::json;

    use super::*;

    async fn spawn_mock(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client_for(base: String, api_key: Option<&str>) -> LlmClient {
        LlmClient::new(LlmConfig {
            api_key: api_key.map(str::to_string),
            api_base: base,
            timeout_secs: 5,
            max_retries: 0,
            retry_base_delay_ms: 1,
            ..LlmConfig::default()
        })
        .unwrap()
    }

    fn candidate_body(text: &str) -> Value {
        json!({
            "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }],
            "usageMetadata": { "promptTokenCount": 12, "candidatesTokenCount": 7 }
        })
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n[\"a\", \"b\"]\n```";
        assert_eq!(strip_json_fences(input), "[\"a\", \"b\"]");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "  [\"reporting\"] ";
        assert_eq!(strip_json_fences(input), "[\"reporting\"]");
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        assert_eq!(backoff_delay(1000, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(1000, 2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(1000, 4), Duration::from_millis(8000));
    }

    #[test]
    fn test_backoff_saturates_instead_of_overflowing() {
        assert_eq!(backoff_delay(1000, 70), Duration::from_millis(u64::MAX));
        assert_eq!(backoff_delay(u64::MAX, 3), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_request_without_schema_omits_generation_config() {
        let body = serde_json::to_value(GenerateContentRequest::new("hello", None)).unwrap();
        assert_eq!(
            body,
            json!({ "contents": [{ "role": "user", "parts": [{ "text": "hello" }] }] })
        );
    }

    #[test]
    fn test_request_with_schema_sets_json_mime_type() {
        let schema = prompts::string_array_schema();
        let body = serde_json::to_value(GenerateContentRequest::new("hi", Some(&schema))).unwrap();
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "ARRAY");
        assert_eq!(body["generationConfig"]["responseSchema"]["items"]["type"], "STRING");
    }

    #[test]
    fn test_response_text_missing_parts_is_none() {
        let response: GenerateContentResponse =
            serde_json::from_value(json!({ "candidates": [{ "content": { "parts": [] } }] }))
                .unwrap();
        assert!(response.text().is_none());

        let empty: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert!(empty.text().is_none());
    }

    #[test]
    fn test_upstream_message_prefers_error_message() {
        let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(upstream_message(body), "API key not valid");
        assert_eq!(upstream_message(""), "Unknown error");
        assert_eq!(upstream_message("bad gateway"), "bad gateway");
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_without_network() {
        let client = client_for("http://127.0.0.1:9".to_string(), None);
        let err = client.generate_text("prompt").await.unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey));
    }

    #[tokio::test]
    async fn test_generate_text_sends_key_and_prompt() {
        let router = Router::new().route(
            "/v1beta/models/:call",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers.get("x-goog-api-key").unwrap(), "test-key");
                assert!(body.get("generationConfig").is_none());
                let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
                Json(candidate_body(&format!("echo: {prompt}")))
            }),
        );
        let base = spawn_mock(router).await;
        let client = client_for(base, Some("test-key"));

        let text = client.generate_text("write a resume").await.unwrap();
        assert_eq!(text, "echo: write a resume");
    }

    #[tokio::test]
    async fn test_generate_structured_parses_fenced_json() {
        let router = Router::new().route(
            "/v1beta/models/:call",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
                Json(candidate_body("```json\n[\"attention to detail\", \"reporting\"]\n```"))
            }),
        );
        let base = spawn_mock(router).await;
        let client = client_for(base, Some("k"));

        let skills: Vec<String> =
            generate_json(&client, "skills", &prompts::string_array_schema())
                .await
                .unwrap();
        assert_eq!(skills, vec!["attention to detail", "reporting"]);
    }

    #[tokio::test]
    async fn test_structured_response_not_json_is_parse_error() {
        let router = Router::new().route(
            "/v1beta/models/:call",
            post(|| async { Json(candidate_body("not json at all")) }),
        );
        let base = spawn_mock(router).await;
        let client = client_for(base, Some("k"));

        let err = client
            .generate_structured("skills", &prompts::string_array_schema())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
    }

    #[tokio::test]
    async fn test_structured_wrong_shape_is_parse_error() {
        let router = Router::new().route(
            "/v1beta/models/:call",
            post(|| async { Json(candidate_body("{\"skills\": 3}")) }),
        );
        let base = spawn_mock(router).await;
        let client = client_for(base, Some("k"));

        let err = generate_json::<Vec<String>>(&client, "skills", &prompts::string_array_schema())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
    }

    #[tokio::test]
    async fn test_missing_candidates_is_malformed() {
        let router = Router::new().route(
            "/v1beta/models/:call",
            post(|| async { Json(json!({ "candidates": [] })) }),
        );
        let base = spawn_mock(router).await;
        let client = client_for(base, Some("k"));

        let err = client.generate_text("prompt").await.unwrap_err();
        assert!(matches!(err, LlmError::MalformedResponse));
    }

    #[tokio::test]
    async fn test_client_error_surfaces_status_and_message_without_retry() {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/v1beta/models/:call",
                post(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    (
                        StatusCode::BAD_REQUEST,
                        Json(json!({ "error": { "code": 400, "message": "API key not valid" } })),
                    )
                }),
            )
            .with_state(hits.clone());
        let base = spawn_mock(router).await;
        let mut client = client_for(base, Some("k"));
        client.config.max_retries = 2;

        let err = client.generate_text("prompt").await.unwrap_err();
        match err {
            LlmError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "API key not valid");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_error_retries_then_succeeds() {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/v1beta/models/:call",
                post(|State(hits): State<Arc<AtomicUsize>>| async move {
                    if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({})))
                    } else {
                        (StatusCode::OK, Json(candidate_body("second time lucky")))
                    }
                }),
            )
            .with_state(hits.clone());
        let base = spawn_mock(router).await;
        let mut client = client_for(base, Some("k"));
        client.config.max_retries = 2;

        let text = client.generate_text("prompt").await.unwrap();
        assert_eq!(text, "second time lucky");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_server_error_exhausts_retries() {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/v1beta/models/:call",
                post(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({ "error": { "message": "backend overloaded" } })),
                    )
                }),
            )
            .with_state(hits.clone());
        let base = spawn_mock(router).await;
        let mut client = client_for(base, Some("k"));
        client.config.max_retries = 1;

        let err = client.generate_text("prompt").await.unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 500, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
