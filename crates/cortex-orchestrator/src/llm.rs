//! Language-model client.

use std::time::Duration;

use async_trait::async_trait;
use cortex_core::config::OrchestratorConfig;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::OrchestratorError;

/// A text-generation service that answers a system + user prompt pair.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send the prompts and return the raw reply text.
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, OrchestratorError>;

    /// Model name for logging.
    fn model_name(&self) -> &str;
}

/// Client for OpenAI-compatible `/chat/completions` endpoints (OpenAI,
/// Azure OpenAI, Ollama, vLLM and the like).
#[derive(Debug, Clone)]
pub struct HttpLanguageModel {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
}

impl HttpLanguageModel {
    /// Create a client for `endpoint` (base URL, without
    /// `/chat/completions`).
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: None,
            temperature: 0.1,
        }
    }

    /// Build from configuration. The API key is read from the environment
    /// variable named in `api_key_env`; a missing key is not an error, local
    /// endpoints usually do not need one.
    pub fn from_config(config: &OrchestratorConfig) -> Result<Self, OrchestratorError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| OrchestratorError::Config(e.to_string()))?;

        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            debug!(env = %config.api_key_env, "No API key set, sending unauthenticated requests");
        }

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }
}

#[derive(Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[async_trait]
impl LanguageModel for HttpLanguageModel {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, OrchestratorError> {
        let body = serde_json::json!({
            "model": &self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt}
            ],
            "temperature": self.temperature,
            "response_format": {"type": "json_object"}
        });

        let mut request = self.client.post(self.url()).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), model = %self.model, "Model endpoint returned an error");
            return Err(OrchestratorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| OrchestratorError::Malformed(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(OrchestratorError::EmptyReply)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and hand back the raw request.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request_complete(&request) {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).into_owned()
        });
        (format!("http://{}/v1", addr), handle)
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|l| {
                let (name, value) = l.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        request.len() >= header_end + 4 + content_length
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let (endpoint, server) = serve_once(
            "200 OK",
            r#"{"choices":[{"message":{"role":"assistant","content":"{\"intent\":\"note\",\"confidence\":0.9}"}}]}"#,
        )
        .await;
        let model = HttpLanguageModel::new(endpoint, "test-model").with_api_key("secret");

        let reply = model.complete("systeem", "gebruiker").await.unwrap();
        assert_eq!(reply, r#"{"intent":"note","confidence":0.9}"#);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1/chat/completions"));
        assert!(request.to_lowercase().contains("authorization: bearer secret"));
        assert!(request.contains("\"model\":\"test-model\""));
        assert!(request.contains("json_object"));
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let (endpoint, server) = serve_once("503 Service Unavailable", r#"{"error":"busy"}"#).await;
        let model = HttpLanguageModel::new(endpoint, "test-model");

        let err = model.complete("s", "u").await.unwrap_err();
        match err {
            OrchestratorError::Status { status, body } => {
                assert_eq!(status, 503);
                assert!(body.contains("busy"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        let request = server.await.unwrap();
        assert!(!request.to_lowercase().contains("authorization:"));
    }

    #[tokio::test]
    async fn test_empty_choices_is_an_error() {
        let (endpoint, _server) = serve_once("200 OK", r#"{"choices":[]}"#).await;
        let model = HttpLanguageModel::new(endpoint, "test-model");
        assert!(matches!(
            model.complete("s", "u").await,
            Err(OrchestratorError::EmptyReply)
        ));
    }

    #[tokio::test]
    async fn test_non_json_body_is_malformed() {
        let (endpoint, _server) = serve_once("200 OK", "<html>proxy</html>").await;
        let model = HttpLanguageModel::new(endpoint, "test-model");
        assert!(matches!(
            model.complete("s", "u").await,
            Err(OrchestratorError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        // Bind and drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let model = HttpLanguageModel::new(format!("http://{}", addr), "test-model");
        assert!(matches!(
            model.complete("s", "u").await,
            Err(OrchestratorError::Transport(_))
        ));
    }

    #[test]
    fn test_url_joins_endpoint() {
        let model = HttpLanguageModel::new("http://localhost:11434/v1/", "m");
        assert_eq!(model.url(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn test_from_config_reads_settings() {
        let config = OrchestratorConfig {
            endpoint: "https://llm.example.org/v1".to_string(),
            model: "clinical-small".to_string(),
            api_key_env: "CORTEX_TEST_KEY_THAT_IS_NOT_SET".to_string(),
            temperature: 0.0,
            timeout_secs: Some(5),
            context_turns: 3,
        };
        let model = HttpLanguageModel::from_config(&config).unwrap();
        assert_eq!(model.model_name(), "clinical-small");
        assert!(model.api_key.is_none());
        assert_eq!(model.temperature, 0.0);
    }
}
