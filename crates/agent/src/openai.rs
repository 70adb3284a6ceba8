//! OpenAI-compatible chat completion client. Works against api.openai.com
//! and against Ollama's OpenAI-compatible endpoint via `base_url`.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use shopmate_core::config::{LlmConfig, LlmProvider};

use crate::llm::{ChatMessage, ChatModel, LlmError, TokenStream};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const STREAM_CHANNEL_CAPACITY: usize = 32;

pub struct OpenAiChatModel {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
}

impl OpenAiChatModel {
    pub fn new(base_url: impl Into<String>, api_key: Option<SecretString>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key,
            model: model.into(),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        let base_url = config.base_url.clone().unwrap_or_else(|| match config.provider {
            LlmProvider::OpenAi => OPENAI_BASE_URL.to_string(),
            LlmProvider::Ollama => "http://localhost:11434/v1".to_string(),
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self { client, base_url, api_key: config.api_key.clone(), model: config.model.clone() }
    }

    fn request(&self, messages: &[ChatMessage], temperature: f32, stream: bool) -> reqwest::RequestBuilder {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let mut request = self.client.post(url).json(&json!({
            "model": self.model,
            "messages": messages,
            "temperature": temperature,
            "stream": stream,
        }));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }
        request
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// Pulls the delta token out of one `data:` payload; `None` for keep-alives,
/// role-only deltas, and the `[DONE]` sentinel (handled by the caller).
fn parse_stream_token(data: &str) -> Option<String> {
    let chunk: StreamChunk = serde_json::from_str(data).ok()?;
    chunk.choices.into_iter().next().and_then(|choice| choice.delta.content)
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, LlmError> {
        let response = self.request(messages, temperature, false).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let completion: CompletionResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(LlmError::EmptyResponse)
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<TokenStream, LlmError> {
        let response = self.request(messages, temperature, true).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let (tx, rx) = mpsc::channel::<Result<String, LlmError>>(STREAM_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(error) => {
                        let _ = tx.send(Err(LlmError::Request(error))).await;
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(newline) = buffer.find('\n') {
                    let line: String = buffer.drain(..=newline).collect();
                    let line = line.trim();
                    let Some(data) = line.strip_prefix("data:") else { continue };
                    let data = data.trim();
                    if data == "[DONE]" {
                        return;
                    }
                    if let Some(token) = parse_stream_token(data) {
                        if !token.is_empty() && tx.send(Ok(token)).await.is_err() {
                            // Receiver dropped; the request keeps running
                            // server-side but nothing listens anymore.
                            return;
                        }
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

#[cfg(test)]
mod tests {
    use super::parse_stream_token;

    #[test]
    fn stream_token_is_extracted_from_delta_payload() {
        let token = parse_stream_token(
            r#"{"choices":[{"delta":{"content":"hel"},"index":0}]}"#,
        );
        assert_eq!(token.as_deref(), Some("hel"));
    }

    #[test]
    fn role_only_delta_yields_no_token() {
        assert!(parse_stream_token(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).is_none());
        assert!(parse_stream_token(r#"{"choices":[]}"#).is_none());
        assert!(parse_stream_token("not json").is_none());
    }
}
