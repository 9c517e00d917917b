//! Google Gemini `generateContent` client.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{CompletionRequest, Provider, send_json};
use crate::error::LlmError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

pub(super) async fn generate(
    http: &Client,
    base_url: &str,
    api_key: &str,
    request: &CompletionRequest<'_>,
) -> Result<String, LlmError> {
    let url = format!(
        "{}/v1beta/models/{}:generateContent",
        base_url,
        urlencoding::encode(request.model)
    );

    let body = GenerateContentRequest {
        system_instruction: Content {
            role: None,
            parts: vec![RequestPart {
                text: request.system,
            }],
        },
        contents: vec![Content {
            role: Some("user"),
            parts: vec![RequestPart {
                text: request.prompt,
            }],
        }],
        generation_config: GenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_output_tokens,
        },
    };

    let response: GenerateContentResponse = send_json(
        Provider::Gemini,
        http.post(url)
            .header("x-goog-api-key", api_key)
            .timeout(request.timeout)
            .json(&body),
    )
    .await?;

    extract_text(response)
}

fn extract_text(response: GenerateContentResponse) -> Result<String, LlmError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(LlmError::Blocked {
            provider: Provider::Gemini.to_string(),
            reason,
        });
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(LlmError::EmptyResponse {
            provider: Provider::Gemini.to_string(),
        });
    };

    if candidate.finish_reason.as_deref() == Some("SAFETY") {
        return Err(LlmError::Blocked {
            provider: Provider::Gemini.to_string(),
            reason: "SAFETY".to_string(),
        });
    }

    Ok(candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::spawn_mock;
    use axum::{Json, Router, http::HeaderMap, routing::post};
    use std::time::Duration;

    fn parse(value: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let response = parse(serde_json::json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Olá, " }, { "text": "mundo" }] },
                "finishReason": "STOP"
            }]
        }));
        assert_eq!(extract_text(response).unwrap(), "Olá, mundo");
    }

    #[test]
    fn test_blocked_prompt() {
        let response = parse(serde_json::json!({
            "promptFeedback": { "blockReason": "OTHER" }
        }));
        assert!(matches!(
            extract_text(response),
            Err(LlmError::Blocked { reason, .. }) if reason == "OTHER"
        ));
    }

    #[test]
    fn test_safety_finish_is_blocked() {
        let response = parse(serde_json::json!({
            "candidates": [{ "finishReason": "SAFETY" }]
        }));
        assert!(matches!(extract_text(response), Err(LlmError::Blocked { .. })));
    }

    #[test]
    fn test_no_candidates_is_empty() {
        let response = parse(serde_json::json!({}));
        assert!(matches!(
            extract_text(response),
            Err(LlmError::EmptyResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_request_shape() {
        let router = Router::new().route(
            "/v1beta/models/{action}",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                assert_eq!(headers.get("x-goog-api-key").unwrap(), "key");
                assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys");
                assert_eq!(body["contents"][0]["role"], "user");
                assert_eq!(body["contents"][0]["parts"][0]["text"], "prompt");
                assert_eq!(body["generationConfig"]["maxOutputTokens"], 128);
                Json(serde_json::json!({
                    "candidates": [{ "content": { "parts": [{ "text": "resposta" }] } }]
                }))
            }),
        );
        let base = spawn_mock(router).await;

        let request = CompletionRequest {
            model: "gemini-2.0-flash",
            system: "sys",
            prompt: "prompt",
            temperature: 0.3,
            max_output_tokens: 128,
            timeout: Duration::from_secs(5),
        };
        let text = generate(&Client::new(), &base, "key", &request).await.unwrap();
        assert_eq!(text, "resposta");
    }
}
