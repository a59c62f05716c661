use std::time::Duration;

use sb_core::{ChatMessage, ChatModel, ChatRequest, Result, UsageRecord};

use crate::extract::extract_content;

/// Makes one model call and returns the extracted assistant text.
///
/// A usage record tagged `source` is appended for every attempt, including
/// failed ones (with zero tokens).
pub(crate) async fn call_for_content(
    model: &dyn ChatModel,
    messages: Vec<ChatMessage>,
    max_output_tokens: u32,
    timeout: Duration,
    source: &str,
    usage: &mut Vec<UsageRecord>,
) -> Result<String> {
    let request = ChatRequest::new(messages, max_output_tokens).with_timeout(timeout);
    match model.complete(request).await {
        Ok(response) => {
            let model_id = response.model.clone().or_else(|| Some(model.name().to_string()));
            usage.push(UsageRecord::new(source, model_id, response.usage));
            Ok(extract_content(&response.envelope))
        }
        Err(e) => {
            usage.push(UsageRecord::new(source, None, None));
            Err(e)
        }
    }
}
