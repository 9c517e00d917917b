//! OpenAI-compatible chat completions client.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{CompletionRequest, Provider, send_json};
use crate::error::LlmError;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    refusal: Option<String>,
}

pub(super) async fn generate(
    http: &Client,
    base_url: &str,
    api_key: &str,
    request: &CompletionRequest<'_>,
) -> Result<String, LlmError> {
    let body = ChatRequest {
        model: request.model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: request.system,
            },
            ChatMessage {
                role: "user",
                content: request.prompt,
            },
        ],
        temperature: request.temperature,
        max_tokens: request.max_output_tokens,
    };

    let response: ChatResponse = send_json(
        Provider::OpenAi,
        http.post(format!("{}/v1/chat/completions", base_url))
            .bearer_auth(api_key)
            .timeout(request.timeout)
            .json(&body),
    )
    .await?;

    let Some(choice) = response.choices.into_iter().next() else {
        return Ok(String::new());
    };

    if let Some(reason) = choice.message.refusal {
        return Err(LlmError::Blocked {
            provider: Provider::OpenAi.to_string(),
            reason,
        });
    }
    if choice.finish_reason.as_deref() == Some("content_filter") {
        return Err(LlmError::Blocked {
            provider: Provider::OpenAi.to_string(),
            reason: "content_filter".to_string(),
        });
    }

    Ok(choice.message.content.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::spawn_mock;
    use axum::{Json, Router, routing::post};
    use std::time::Duration;

    fn request() -> CompletionRequest<'static> {
        CompletionRequest {
            model: "gpt-4o-mini",
            system: "sys",
            prompt: "prompt",
            temperature: 0.3,
            max_output_tokens: 512,
            timeout: Duration::from_secs(5),
        }
    }

    async fn serve(response: serde_json::Value) -> String {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(move |Json(body): Json<serde_json::Value>| {
                let response = response.clone();
                async move {
                    assert_eq!(body["model"], "gpt-4o-mini");
                    assert_eq!(body["messages"][0]["role"], "system");
                    assert_eq!(body["messages"][1]["content"], "prompt");
                    assert_eq!(body["max_tokens"], 512);
                    Json(response)
                }
            }),
        );
        spawn_mock(router).await
    }

    #[tokio::test]
    async fn test_generate() {
        let base = serve(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "resposta" }, "finish_reason": "stop" }]
        }))
        .await;

        let text = generate(&Client::new(), &base, "key", &request()).await.unwrap();
        assert_eq!(text, "resposta");
    }

    #[tokio::test]
    async fn test_refusal_is_blocked() {
        let base = serve(serde_json::json!({
            "choices": [{ "message": { "content": null, "refusal": "I can't help with that" } }]
        }))
        .await;

        let err = generate(&Client::new(), &base, "key", &request()).await.unwrap_err();
        assert!(matches!(err, LlmError::Blocked { .. }));
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                (
                    axum::http::StatusCode::TOO_MANY_REQUESTS,
                    [(axum::http::header::RETRY_AFTER, "7")],
                    "slow down",
                )
            }),
        );
        let base = spawn_mock(router).await;

        let err = generate(&Client::new(), &base, "key", &request()).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.retry_after_secs(), Some(7));
    }
}
