use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use sb_core::{ChatMessage, ChatModel, ChatRequest, ChatResponse, Error, Result, TokenUsage};
use serde::Serialize;
use serde_json::Value;

use crate::ModelKind;

const MAX_ERROR_BODY: usize = 2000;

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: &'a [ChatMessage],
    max_completion_tokens: u32,
    reasoning_effort: &'static str,
    response_format: ResponseFormat,
}

#[derive(Debug, Clone)]
enum Auth {
    ApiKeyHeader,
    Bearer,
}

/// Chat-completions client for Azure OpenAI deployments and OpenAI-compatible APIs.
///
/// Every request asks for minimal reasoning effort and a JSON object response.
/// One call per `complete`; retries are the caller's business.
pub struct ChatCompletionClient {
    client: Client,
    api_key: String,
    url: Url,
    model: Option<String>,
    label: String,
    auth: Auth,
    default_timeout: Duration,
}

impl ChatCompletionClient {
    pub fn new(kind: &ModelKind, api_key: Option<String>, default_timeout: Duration) -> Result<Self> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::InvalidInput("chat completion API key is required".to_string()))?;

        let (url, model, label, auth) = match kind {
            ModelKind::Azure { endpoint, deployment, api_version } => {
                let raw = format!(
                    "{}/openai/deployments/{}/chat/completions",
                    endpoint.trim_end_matches('/'),
                    deployment
                );
                let url = Url::parse_with_params(&raw, &[("api-version", api_version.as_str())])
                    .map_err(|e| Error::InvalidInput(format!("invalid Azure endpoint {}: {}", endpoint, e)))?;
                (url, None, deployment.clone(), Auth::ApiKeyHeader)
            }
            ModelKind::OpenAi { base_url, model } => {
                let raw = format!("{}/chat/completions", base_url.trim_end_matches('/'));
                let url = Url::parse(&raw)
                    .map_err(|e| Error::InvalidInput(format!("invalid base URL {}: {}", base_url, e)))?;
                (url, Some(model.clone()), model.clone(), Auth::Bearer)
            }
            ModelKind::Dummy => {
                return Err(Error::InvalidInput(
                    "the dummy model has no chat completion endpoint".to_string(),
                ))
            }
        };

        let client = Client::builder().timeout(default_timeout).build()?;
        Ok(Self { client, api_key, url, model, label, auth, default_timeout })
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.auth {
            Auth::ApiKeyHeader => builder.header("api-key", &self.api_key),
            Auth::Bearer => builder.bearer_auth(&self.api_key),
        }
    }
}

impl fmt::Debug for ChatCompletionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatCompletionClient")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("url", &self.url.as_str())
            .field("model", &self.label)
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

#[async_trait]
impl ChatModel for ChatCompletionClient {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse> {
        if request.messages.is_empty() {
            return Err(Error::InvalidInput("chat request has no messages".to_string()));
        }
        let timeout = request.timeout.unwrap_or(self.default_timeout);
        let body = ChatRequestBody {
            model: self.model.as_deref(),
            messages: &request.messages,
            max_completion_tokens: request.max_output_tokens,
            reasoning_effort: "minimal",
            response_format: ResponseFormat { kind: "json_object" },
        };

        tracing::debug!(
            "POST {} ({} messages, max {} tokens)",
            self.url.path(),
            request.messages.len(),
            request.max_output_tokens
        );

        let response = self
            .authorize(self.client.post(self.url.clone()))
            .json(&body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(timeout.as_secs())
                } else {
                    Error::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY).collect();
            tracing::warn!("Chat completion failed with status {}: {}", status, body);
            return Err(Error::Status { status: status.as_u16(), body });
        }

        let envelope: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(timeout.as_secs())
            } else {
                Error::MalformedEnvelope(e.to_string())
            }
        })?;
        if !envelope.is_object() {
            return Err(Error::MalformedEnvelope("response body is not a JSON object".to_string()));
        }

        let usage = envelope
            .get("usage")
            .cloned()
            .and_then(|u| serde_json::from_value::<TokenUsage>(u).ok());
        let model = envelope.get("model").and_then(Value::as_str).map(str::to_string);

        Ok(ChatResponse { envelope, usage, model })
    }
}
