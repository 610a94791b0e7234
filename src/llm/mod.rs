//! Chat completion providers and the primary/secondary fallback

pub mod openai_compat;

pub use openai_compat::OpenAICompatChat;

use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

pub const PRIMARY_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

pub const SECONDARY_SYSTEM_PROMPT: &str = "You are a helpful assistant. If the user greets you (e.g., 'Hello'), reply politely without summarizing or referencing the document. For all other queries, provide concise and relevant answers.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Return the assistant's reply, trimmed
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Cheap reachability probe
    async fn health_check(&self) -> Result<()>;

    fn provider_name(&self) -> &str;
}

/// Which endpoint produced a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Responder {
    Primary,
    Secondary,
}

#[derive(Debug, Clone)]
pub struct ChatReply {
    pub text: String,
    pub responder: Responder,
}

/// Try the primary endpoint, then fall back to the secondary one if allowed
#[derive(Clone)]
pub struct ChatFallback {
    primary: Arc<dyn ChatProvider>,
    secondary: Arc<dyn ChatProvider>,
}

impl ChatFallback {
    pub fn new(primary: Arc<dyn ChatProvider>, secondary: Arc<dyn ChatProvider>) -> Self {
        Self { primary, secondary }
    }

    pub fn secondary(&self) -> &Arc<dyn ChatProvider> {
        &self.secondary
    }

    pub async fn respond(&self, prompt: &str, allow_fallback: bool) -> Result<ChatReply> {
        info!("[CHAT] Using primary API ({}) for response", self.primary.provider_name());

        let primary_messages = [ChatMessage::system(PRIMARY_SYSTEM_PROMPT), ChatMessage::user(prompt)];
        match self.primary.complete(&primary_messages).await {
            Ok(text) => {
                return Ok(ChatReply {
                    text,
                    responder: Responder::Primary,
                })
            }
            Err(e) => {
                warn!("[CHAT] Primary API failed: {}", e);
            }
        }

        if !allow_fallback {
            return Err(Error::FallbackDeclined);
        }

        info!("[CHAT] Switching to secondary API ({})", self.secondary.provider_name());
        let secondary_messages = [
            ChatMessage::system(SECONDARY_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];
        let text = self.secondary.complete(&secondary_messages).await?;
        info!("[CHAT] Secondary API response received");

        Ok(ChatReply {
            text,
            responder: Responder::Secondary,
        })
    }
}
