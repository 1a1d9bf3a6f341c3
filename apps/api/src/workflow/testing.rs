//! Scripted generation backend for workflow and router tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;

use crate::llm_client::{GenerationService, LlmError};

pub(crate) enum Reply {
    Text(String),
    Skills(Vec<String>),
    Status(u16, String),
    /// Never completes; used to exercise cancellation.
    Hang,
}

impl Reply {
    pub(crate) fn text(text: &str) -> Self {
        Reply::Text(text.to_string())
    }

    pub(crate) fn skills(skills: &[&str]) -> Self {
        Reply::Skills(skills.iter().map(|s| s.to_string()).collect())
    }
}

/// Answers calls from a queue of replies and records every prompt it saw.
#[derive(Default)]
pub(crate) struct ScriptedService {
    replies: Mutex<VecDeque<Reply>>,
    prompts: Mutex<Vec<String>>,
    pub(crate) called: Notify,
}

impl ScriptedService {
    pub(crate) fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.prompts.lock().len()
    }

    fn next(&self, prompt: &str) -> Reply {
        self.prompts.lock().push(prompt.to_string());
        self.called.notify_one();
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected generation call: {prompt}"))
    }
}

#[async_trait]
impl GenerationService for ScriptedService {
    async fn generate_text(&self, prompt: &str) -> Result<String, LlmError> {
        match self.next(prompt) {
            Reply::Text(text) => Ok(text),
            Reply::Skills(skills) => Ok(skills.join("\n")),
            Reply::Status(status, message) => Err(LlmError::Api { status, message }),
            Reply::Hang => std::future::pending().await,
        }
    }

    async fn generate_structured(&self, prompt: &str, _schema: &Value) -> Result<Value, LlmError> {
        match self.next(prompt) {
            Reply::Text(text) => serde_json::from_str(&text).map_err(LlmError::Parse),
            Reply::Skills(skills) => Ok(Value::from(skills)),
            Reply::Status(status, message) => Err(LlmError::Api { status, message }),
            Reply::Hang => std::future::pending().await,
        }
    }
}
