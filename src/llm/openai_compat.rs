//! Chat client for OpenAI-compatible `/chat/completions` endpoints (Groq, OpenAI)

use super::{ChatMessage, ChatProvider};
use crate::config::ChatEndpoint;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: usize,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

pub struct OpenAICompatChat {
    client: Client,
    name: String,
    endpoint: ChatEndpoint,
}

impl OpenAICompatChat {
    pub fn new(name: impl Into<String>, endpoint: ChatEndpoint) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(endpoint.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            name: name.into(),
            endpoint,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint.api_base.trim_end_matches('/'), path)
    }
}

fn first_choice(parsed: ChatCompletionResponse) -> Result<String> {
    parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content.trim().to_string())
        .ok_or_else(|| Error::Chat("response contained no choices".to_string()))
}

#[async_trait]
impl ChatProvider for OpenAICompatChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.endpoint.model,
            messages,
            max_tokens: self.endpoint.max_tokens,
            temperature: self.endpoint.temperature,
            stream: false,
        };

        let response = self
            .client
            .post(self.url("chat/completions"))
            .bearer_auth(&self.endpoint.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Chat(format!("{} request failed: {e}", self.name)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(Error::Chat(format!("{} error ({status}): {body}", self.name)));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Chat(format!("{} response parse error: {e}", self.name)))?;
        first_choice(parsed)
    }

    async fn health_check(&self) -> Result<()> {
        let response = self
            .client
            .get(self.url("models"))
            .bearer_auth(&self.endpoint.api_key)
            .send()
            .await
            .map_err(|e| Error::Chat(format!("{} unreachable: {e}", self.name)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::Chat(format!(
                "{} health check returned {}",
                self.name,
                response.status()
            )))
        }
    }

    fn provider_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;

    #[test]
    fn test_reply_is_trimmed() {
        let parsed: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"  Exams are in May.\n"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_choice(parsed).unwrap(), "Exams are in May.");
    }

    #[test]
    fn test_empty_choices_is_an_error() {
        let parsed: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(first_choice(parsed), Err(Error::Chat(_))));
    }

    #[test]
    fn test_urls_join_cleanly() {
        let mut endpoint = Config::default().chat.primary;
        endpoint.api_base = "https://api.groq.com/openai/v1/".to_string();
        let chat = OpenAICompatChat::new("Groq", endpoint).unwrap();
        assert_eq!(
            chat.url("chat/completions"),
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }

    #[test]
    fn test_request_shape() {
        let messages = [ChatMessage::user("hi")];
        let request = ChatCompletionRequest {
            model: "llama-3.1-8b-instant",
            messages: &messages,
            max_tokens: 512,
            temperature: 1.0,
            stream: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["max_tokens"], 512);
    }
}
