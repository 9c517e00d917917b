//! Anthropic Messages API client.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{CompletionRequest, Provider, send_json};
use crate::error::LlmError;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    system: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

pub(super) async fn generate(
    http: &Client,
    base_url: &str,
    api_key: &str,
    request: &CompletionRequest<'_>,
) -> Result<String, LlmError> {
    let body = MessagesRequest {
        model: request.model,
        system: request.system,
        max_tokens: request.max_output_tokens,
        temperature: request.temperature,
        messages: vec![Message {
            role: "user",
            content: request.prompt,
        }],
    };

    let response: MessagesResponse = send_json(
        Provider::Claude,
        http.post(format!("{}/v1/messages", base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .timeout(request.timeout)
            .json(&body),
    )
    .await?;

    if response.stop_reason.as_deref() == Some("refusal") {
        return Err(LlmError::Blocked {
            provider: Provider::Claude.to_string(),
            reason: "refusal".to_string(),
        });
    }

    Ok(response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect::<Vec<_>>()
        .join(""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::spawn_mock;
    use axum::{Json, Router, http::HeaderMap, routing::post};
    use std::time::Duration;

    fn request() -> CompletionRequest<'static> {
        CompletionRequest {
            model: "claude-3-5-haiku-latest",
            system: "sys",
            prompt: "prompt",
            temperature: 0.3,
            max_output_tokens: 256,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_generate_collects_text_blocks() {
        let router = Router::new().route(
            "/v1/messages",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                assert_eq!(headers.get("x-api-key").unwrap(), "key");
                assert_eq!(headers.get("anthropic-version").unwrap(), ANTHROPIC_VERSION);
                assert_eq!(body["system"], "sys");
                assert_eq!(body["max_tokens"], 256);
                assert_eq!(body["messages"][0]["role"], "user");
                Json(serde_json::json!({
                    "content": [
                        { "type": "text", "text": "Parte 1. " },
                        { "type": "thinking", "thinking": "..." },
                        { "type": "text", "text": "Parte 2." }
                    ],
                    "stop_reason": "end_turn"
                }))
            }),
        );
        let base = spawn_mock(router).await;

        let text = generate(&Client::new(), &base, "key", &request()).await.unwrap();
        assert_eq!(text, "Parte 1. Parte 2.");
    }

    #[tokio::test]
    async fn test_refusal_is_blocked() {
        let router = Router::new().route(
            "/v1/messages",
            post(|| async {
                Json(serde_json::json!({ "content": [], "stop_reason": "refusal" }))
            }),
        );
        let base = spawn_mock(router).await;

        let err = generate(&Client::new(), &base, "key", &request()).await.unwrap_err();
        assert!(matches!(err, LlmError::Blocked { .. }));
    }
}
