//! OpenAI-compatible chat completion client
//!
//! Covers the providers the engine ships against (Groq, DashScope's
//! compatible mode) plus any custom base URL exposing the same protocol.
//! Streaming uses the SSE wire format: `data: {json}` lines terminated by a
//! `data: [DONE]` sentinel.

use crate::config::LlmConfig;
use crate::llm::{ChatMessage, ChunkStream, LlmError, LlmService};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const DASHSCOPE_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";

pub struct OpenAiCompatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatClient {
    /// Resolve provider and credentials from config. Unknown providers and
    /// missing keys are initialization failures, never query-time ones.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let base_url = match config.provider.as_str() {
            "groq" => GROQ_BASE_URL.to_string(),
            "dashscope" => DASHSCOPE_BASE_URL.to_string(),
            "custom" => config
                .base_url
                .clone()
                .ok_or_else(|| LlmError::Request("custom provider needs llm.base_url".into()))?,
            other => return Err(LlmError::UnsupportedProvider(other.to_string())),
        };

        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| LlmError::MissingApiKey(config.api_key_env.clone()))?;

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| LlmError::Request(e.to_string()))?;

        tracing::info!(provider = %config.provider, model = %config.model, "LLM client ready");

        Ok(Self {
            http,
            base_url,
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    async fn post(
        &self,
        messages: &[ChatMessage],
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            stream,
        };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

/// Extract the text delta from one SSE line, if it carries one.
/// Returns `Ok(None)` for keep-alives, empty deltas and the DONE sentinel.
fn parse_sse_line(line: &str) -> Result<Option<String>, LlmError> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim();

    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }

    let chunk: StreamChunk = serde_json::from_str(data)
        .map_err(|e| LlmError::MalformedResponse(format!("bad stream chunk: {}", e)))?;

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|content| !content.is_empty()))
}

#[async_trait]
impl LlmService for OpenAiCompatClient {
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let response = self.post(messages, false).await?;

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::MalformedResponse("response held no choices".to_string()))
    }

    async fn stream(&self, messages: &[ChatMessage]) -> Result<ChunkStream, LlmError> {
        let response = self.post(messages, true).await?;

        let (tx, rx) = tokio::sync::mpsc::channel::<Result<String, LlmError>>(32);

        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(piece) = bytes.next().await {
                let piece = match piece {
                    Ok(piece) => piece,
                    Err(e) => {
                        let _ = tx.send(Err(LlmError::Stream(e.to_string()))).await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&piece));

                // SSE events are newline-delimited; hold back the last
                // partial line until more bytes arrive
                while let Some(pos) = buffer.find('\n') {
                    let line: String = buffer.drain(..=pos).collect();
                    match parse_sse_line(line.trim_end()) {
                        Ok(Some(content)) => {
                            if tx.send(Ok(content)).await.is_err() {
                                // receiver dropped: stop consuming promptly
                                return;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            let _ = tx.send(Err(e)).await;
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
    use super::*;

    #[test]
    fn test_parse_sse_content_line() {
        let line = r#"data: {"choices":[{"delta":{"content":"Wu "}}]}"#;
        assert_eq!(parse_sse_line(line).unwrap(), Some("Wu ".to_string()));
    }

    #[test]
    fn test_parse_sse_done_sentinel() {
        assert_eq!(parse_sse_line("data: [DONE]").unwrap(), None);
    }

    #[test]
    fn test_parse_sse_ignores_non_data_lines() {
        assert_eq!(parse_sse_line("").unwrap(), None);
        assert_eq!(parse_sse_line(": keep-alive").unwrap(), None);
        assert_eq!(parse_sse_line("event: message").unwrap(), None);
    }

    #[test]
    fn test_parse_sse_empty_delta() {
        let line = r#"data: {"choices":[{"delta":{}}]}"#;
        assert_eq!(parse_sse_line(line).unwrap(), None);
    }

    #[test]
    fn test_parse_sse_malformed_json_is_error() {
        assert!(parse_sse_line("data: {not json").is_err());
    }

    #[test]
    fn test_completion_request_omits_stream_false() {
        let messages = vec![ChatMessage::user("hi")];
        let request = CompletionRequest {
            model: "llama-3.3-70b-versatile",
            messages: &messages,
            temperature: 0.1,
            stream: false,
        };
        let json = serde_json::to_value(&request).unwrap();

        assert!(json.get("stream").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_completion_response_parsing() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"an answer"}}]}"#;
        let parsed: CompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content, "an answer");
    }
}
