use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use sb_core::{ChatModel, ChatRequest, ChatResponse, Error, Result, TokenUsage};
use serde_json::{json, Value};

/// Model used when no provider is configured. Every call fails, so the
/// pipeline runs entirely on heuristic fill and local synthesis.
pub struct DummyModel;

impl fmt::Debug for DummyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyModel").finish()
    }
}

impl DummyModel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DummyModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ChatModel for DummyModel {
    fn name(&self) -> &str {
        "Dummy"
    }

    async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse> {
        Err(Error::Inference("no chat model configured".to_string()))
    }
}

#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Assistant text wrapped in a standard `choices[0].message.content` envelope
    Content(String),
    /// A raw provider envelope
    Envelope(Value),
    /// The call fails with an inference error carrying this message
    Fail(String),
}

impl ScriptedReply {
    fn into_response(self) -> Result<ChatResponse> {
        match self {
            ScriptedReply::Content(content) => Ok(ChatResponse {
                envelope: json!({
                    "choices": [{"message": {"role": "assistant", "content": content}}],
                    "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15},
                    "model": "scripted"
                }),
                usage: Some(TokenUsage { prompt_tokens: 10, completion_tokens: 5, total_tokens: 15 }),
                model: Some("scripted".to_string()),
            }),
            ScriptedReply::Envelope(envelope) => Ok(ChatResponse { envelope, usage: None, model: None }),
            ScriptedReply::Fail(message) => Err(Error::Inference(message)),
        }
    }
}

/// Replays queued replies in order, then repeats `exhausted` forever.
/// Records every request it receives.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<ScriptedReply>>,
    exhausted: ScriptedReply,
    requests: Mutex<Vec<ChatRequest>>,
}

impl fmt::Debug for ScriptedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedModel")
            .field("calls", &self.call_count())
            .finish()
    }
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            exhausted: ScriptedReply::Fail("script exhausted".to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A model whose every call returns `reply`.
    pub fn always(reply: ScriptedReply) -> Self {
        Self { exhausted: reply, ..Self::new() }
    }

    pub fn then(self, reply: ScriptedReply) -> Self {
        self.replies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(reply);
        self
    }

    pub fn then_content(self, content: impl Into<String>) -> Self {
        self.then(ScriptedReply::Content(content.into()))
    }

    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.then(ScriptedReply::Fail(message.into()))
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ChatModel for ScriptedModel {
    fn name(&self) -> &str {
        "Scripted"
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);
        let next = self
            .replies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or_else(|| self.exhausted.clone());
        next.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sb_core::ChatMessage;

    fn request() -> ChatRequest {
        ChatRequest::new(vec![ChatMessage::user("hello")], 10)
    }

    #[tokio::test]
    async fn test_dummy_model_always_fails() {
        let model = DummyModel::new();
        let err = model.complete(request()).await.unwrap_err();
        assert_eq!(err.code(), "inference_error");
        assert_eq!(model.name(), "Dummy");
    }

    #[tokio::test]
    async fn test_scripted_model_replays_in_order() {
        let model = ScriptedModel::new().then_content("{}").then_fail("boom");

        let first = model.complete(request()).await.unwrap();
        assert_eq!(crate::extract::extract_content(&first.envelope), "{}");
        assert_eq!(first.usage.map(|u| u.total_tokens), Some(15));

        let second = model.complete(request()).await.unwrap_err();
        assert_eq!(second.to_string(), "Inference error: boom");

        let third = model.complete(request()).await.unwrap_err();
        assert_eq!(third.to_string(), "Inference error: script exhausted");
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn test_scripted_model_always() {
        let model = ScriptedModel::always(ScriptedReply::Content("same".to_string()));
        for _ in 0..3 {
            let response = model.complete(request()).await.unwrap();
            assert_eq!(crate::extract::extract_content(&response.envelope), "same");
        }
        assert_eq!(model.requests().len(), 3);
    }
}
