//! Gemini `generateContent` client.
//!
//! This module defines the backend seam used by the narrative generator and
//! its reqwest implementation for the Google Generative Language API.

use crate::config::AiConfig;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Why a single model candidate produced no narrative.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP 404: the model identifier is unknown to the endpoint.
    #[error("model {0} not found")]
    ModelNotFound(String),

    #[error("API error {status}: {body}")]
    Http { status: u16, body: String },

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("failed to send request: {0}")]
    Transport(String),

    #[error("failed to parse response: {0}")]
    Decode(String),
}

/// Something that can turn a prompt into text with a given model.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Issue exactly one request for `model`.
    async fn generate(&self, model: &str, prompt: &str) -> Result<GenerateResponse, BackendError>;
}

/// `generateContent` request body.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

impl<'a> GenerateRequest<'a> {
    fn from_prompt(prompt: &'a str) -> Self {
        Self {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        }
    }
}

/// `generateContent` response body. Every level is optional on the wire
/// and defaults to empty, so a missing field reads as an empty text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResponseCandidate {
    #[serde(default)]
    pub content: ResponseContent,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResponseContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResponsePart {
    #[serde(default)]
    pub text: String,
}

impl GenerateResponse {
    /// Response holding a single text part.
    #[cfg(test)]
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            candidates: vec![ResponseCandidate {
                content: ResponseContent {
                    parts: vec![ResponsePart { text: text.into() }],
                },
            }],
        }
    }

    /// Text of the first part of the first candidate, or `""`.
    pub fn text(&self) -> &str {
        self.candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .unwrap_or("")
    }
}

/// reqwest-backed Gemini client.
pub struct GeminiClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout_seconds: u64,
}

impl GeminiClient {
    /// Create a client for the configured endpoint.
    pub fn new(config: &AiConfig, api_key: String) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self::with_http_client(http_client, config, api_key))
    }

    /// Create a client around an already configured reqwest client.
    pub fn with_http_client(http_client: reqwest::Client, config: &AiConfig, api_key: String) -> Self {
        Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout_seconds: config.timeout_seconds,
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn generate(&self, model: &str, prompt: &str) -> Result<GenerateResponse, BackendError> {
        let url = self.endpoint(model);
        debug!("POST {} ({} prompt bytes)", url, prompt.len());

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&GenerateRequest::from_prompt(prompt))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout(self.timeout_seconds)
                } else {
                    BackendError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(BackendError::ModelNotFound(model.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Http {
                status: status.as_u16(),
                body: body.chars().take(300).collect(),
            });
        }

        response
            .json::<GenerateResponse>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and hand back the raw request.
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}/v1", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let content_length = text[..end]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + content_length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });

        (base_url, handle)
    }

    fn client(base_url: String) -> GeminiClient {
        let config = AiConfig {
            base_url,
            timeout_seconds: 5,
            ..AiConfig::default()
        };
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .no_proxy()
            .build()
            .unwrap();
        GeminiClient::with_http_client(http_client, &config, "test-key".to_string())
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let config = AiConfig {
            base_url: "https://example.test/v1beta/".to_string(),
            ..AiConfig::default()
        };
        let client = GeminiClient::new(&config, "k".to_string()).unwrap();
        assert_eq!(
            client.endpoint("gemini-pro"),
            "https://example.test/v1beta/models/gemini-pro:generateContent"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let json = serde_json::to_value(GenerateRequest::from_prompt("hello")).unwrap();
        assert_eq!(json, serde_json::json!({"contents": [{"parts": [{"text": "hello"}]}]}));
    }

    #[test]
    fn test_response_text() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"<h1>OK</h1>"}],"role":"model"},"finishReason":"STOP"}]}"#,
        )
        .unwrap();
        assert_eq!(response.text(), "<h1>OK</h1>");
    }

    #[test]
    fn test_response_missing_fields_read_as_empty() {
        let no_candidates: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(no_candidates.text(), "");

        let blocked: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
        assert_eq!(blocked.text(), "");
    }

    #[tokio::test]
    async fn test_generate_success() {
        let (base_url, server) = serve_once(
            "200 OK",
            r#"{"candidates":[{"content":{"parts":[{"text":"narrative"}]}}]}"#,
        )
        .await;

        let response = client(base_url).generate("gemini-2.5-flash", "prompt").await.unwrap();
        assert_eq!(response.text(), "narrative");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1/models/gemini-2.5-flash:generateContent"));
        assert!(request.to_ascii_lowercase().contains("x-goog-api-key: test-key"));
    }

    #[tokio::test]
    async fn test_generate_not_found() {
        let (base_url, server) = serve_once("404 Not Found", r#"{"error":{"code":404}}"#).await;

        let err = client(base_url).generate("gemini-0", "prompt").await.unwrap_err();
        assert!(matches!(err, BackendError::ModelNotFound(ref m) if m == "gemini-0"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_generate_http_error() {
        let (base_url, server) = serve_once("403 Forbidden", r#"{"error":"bad key"}"#).await;

        let err = client(base_url).generate("gemini-2.5-flash", "prompt").await.unwrap_err();
        assert!(matches!(err, BackendError::Http { status: 403, .. }));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_generate_malformed_body() {
        let (base_url, server) = serve_once("200 OK", "not json").await;

        let err = client(base_url).generate("gemini-2.5-flash", "prompt").await.unwrap_err();
        assert!(matches!(err, BackendError::Decode(_)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_generate_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}/v1", listener.local_addr().unwrap());
        drop(listener);

        let err = client(base_url).generate("gemini-2.5-flash", "prompt").await.unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));
    }
}
