use std::sync::Arc;

use sb_core::{ChatModel, Result};

use crate::{Config, ModelKind};

pub mod dummy;
pub mod openai;

pub use dummy::{DummyModel, ScriptedModel, ScriptedReply};
pub use openai::ChatCompletionClient;

/// Builds the chat model described by `config`.
pub fn create_model(config: &Config) -> Result<Arc<dyn ChatModel>> {
    match &config.model {
        ModelKind::Dummy => {
            tracing::warn!("No chat model configured, briefings will use local synthesis only");
            Ok(Arc::new(DummyModel::new()))
        }
        kind => {
            let client = ChatCompletionClient::new(kind, config.api_key.clone(), config.merge_timeout)?;
            tracing::info!("🧠 Chat model initialized ({})", client.name());
            Ok(Arc::new(client))
        }
    }
}
