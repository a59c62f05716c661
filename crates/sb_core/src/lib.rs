pub mod error;
pub mod models;
pub mod storage;
pub mod types;

pub use error::{Error, Result};
pub use models::{ChatMessage, ChatModel, ChatRequest, ChatResponse, Role};
pub use storage::{ArticleSource, ReportStorage, UsageSink};
pub use types::*;
