use base64::{engine::general_purpose, Engine as _};
use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::llm::media::detect_mime_type;
use crate::llm::outcome::GenerationResponse;
use crate::utils::http::get_http_client;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Gemini request failed: {0}")]
    Transport(String),
    #[error("Gemini request failed with status {status}: {detail}")]
    Api { status: StatusCode, detail: String },
}

/// One generation request: the rewritten instruction plus optional
/// reference images attached as inline data.
#[derive(Debug)]
pub struct GenerateRequest<'a> {
    pub instruction: &'a str,
    pub reference_images: &'a [Vec<u8>],
    pub aspect_ratio: Option<&'a str>,
    pub image_size: Option<&'a str>,
}

fn redact_api_key(config: &Config, text: &str) -> String {
    let key = config.gemini_api_key.trim();
    if key.is_empty() {
        return text.to_string();
    }
    text.replace(key, "[redacted]")
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

pub(crate) fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

fn build_safety_settings(profile: &str) -> Vec<Value> {
    let threshold = match profile {
        "standard" => "BLOCK_MEDIUM_AND_ABOVE",
        "permissive" => "OFF",
        _ => {
            warn!("Unknown safety profile '{}', using permissive defaults.", profile);
            "OFF"
        }
    };

    vec![
        json!({ "category": "HARM_CATEGORY_HARASSMENT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_CIVIC_INTEGRITY", "threshold": threshold }),
    ]
}

fn build_image_config(aspect_ratio: Option<&str>, image_size: Option<&str>) -> Option<Value> {
    let mut map = Map::new();

    if let Some(aspect_ratio) = aspect_ratio {
        let trimmed = aspect_ratio.trim();
        if !trimmed.is_empty() {
            map.insert("aspectRatio".to_string(), json!(trimmed));
        }
    }

    if let Some(image_size) = image_size {
        let trimmed = image_size.trim();
        if !trimmed.is_empty() {
            map.insert("imageSize".to_string(), json!(trimmed));
        }
    }

    if map.is_empty() {
        None
    } else {
        Some(Value::Object(map))
    }
}

fn build_request_parts(instruction: &str, reference_images: &[Vec<u8>]) -> Vec<Value> {
    let mut parts = Vec::new();
    let text_part = json!({ "text": instruction });

    // With reference images attached, the instruction reads best after them.
    if reference_images.is_empty() {
        parts.push(text_part);
        return parts;
    }

    for image_data in reference_images {
        let mime_type = detect_mime_type(image_data).unwrap_or_else(|| "image/png".to_string());
        let encoded = general_purpose::STANDARD.encode(image_data);
        parts.push(json!({
            "inlineData": {
                "mimeType": mime_type,
                "data": encoded
            }
        }));
    }
    parts.push(text_part);

    parts
}

fn summarize_request(parts: &[Value]) -> Value {
    let mut text_preview = None;
    let mut inline_parts = 0usize;
    for part in parts {
        if let Some(text) = part.get("text").and_then(|value| value.as_str()) {
            if text_preview.is_none() {
                text_preview = Some(truncate_for_log(text, 200));
            }
        } else if part.get("inlineData").is_some() {
            inline_parts += 1;
        }
    }
    json!({ "textPreview": text_preview, "inlineParts": inline_parts })
}

pub async fn generate_content(
    config: &Config,
    model: &str,
    request: GenerateRequest<'_>,
) -> Result<GenerationResponse, GenerationError> {
    let parts = build_request_parts(request.instruction, request.reference_images);

    let mut generation_config = json!({
        "temperature": config.temperature,
        "topK": config.top_k,
        "topP": config.top_p,
        "maxOutputTokens": config.max_output_tokens,
        "responseModalities": ["TEXT", "IMAGE"],
    });
    if let Some(image_config) = build_image_config(request.aspect_ratio, request.image_size) {
        if let Some(config_object) = generation_config.as_object_mut() {
            config_object.insert("imageConfig".to_string(), image_config);
        }
    }

    let payload = json!({
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": generation_config,
        "safetySettings": build_safety_settings(config.safety_settings.as_str()),
    });

    if tracing::enabled!(tracing::Level::DEBUG) {
        debug!(target: "llm.gemini", model = model, request = %summarize_request(&parts));
    }

    let client = get_http_client();
    let url = format!(
        "{}/v1beta/models/{}:generateContent?key={}",
        config.api_base, model, config.gemini_api_key
    );

    // One attempt per user action. A failed request ends the run; the user
    // decides whether to try again.
    let response = client
        .post(&url)
        .timeout(Duration::from_secs(config.request_timeout_seconds))
        .json(&payload)
        .send()
        .await
        .map_err(|err| {
            let err_text = redact_api_key(config, &err.to_string());
            warn!(
                "Gemini request failed to send: {} (timeout={}, connect={})",
                err_text,
                err.is_timeout(),
                err.is_connect()
            );
            GenerationError::Transport(err_text)
        })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let (message, body_summary) = summarize_error_body(&body);
        warn!("Gemini API error: status={}, body={}", status, body_summary);
        let detail = redact_api_key(config, &message.unwrap_or(body_summary));
        return Err(GenerationError::Api { status, detail });
    }

    response
        .json::<GenerationResponse>()
        .await
        .map_err(|err| GenerationError::Transport(format!("invalid response body: {err}")))
}

/// One-line guidance for failures the user can act on, keyed by the HTTP
/// status code appearing in the rendered error text.
pub fn hint_for_error(error_text: &str) -> Option<&'static str> {
    if error_text.contains("401") || error_text.contains("403") {
        Some("Check that GEMINI_API_KEY is valid and has access to this model.")
    } else if error_text.contains("404") {
        Some("Model not found. Run `nanobanana models` to list available models.")
    } else if error_text.contains("429") {
        Some("Quota or rate limit exhausted. Wait a moment and trigger a new attempt.")
    } else if error_text.contains("500") || error_text.contains("503") {
        Some("The generation service had an internal error. Try again later.")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissive_profile_disables_every_category() {
        let settings = build_safety_settings("permissive");
        assert_eq!(settings.len(), 5);
        for setting in settings {
            assert_eq!(setting["threshold"], "OFF");
        }
    }

    #[test]
    fn standard_profile_blocks_medium_and_above() {
        let settings = build_safety_settings("standard");
        assert!(settings
            .iter()
            .all(|s| s["threshold"] == "BLOCK_MEDIUM_AND_ABOVE"));
    }

    #[test]
    fn image_config_is_omitted_when_empty() {
        assert!(build_image_config(None, None).is_none());
        assert!(build_image_config(Some("  "), None).is_none());
        let config = build_image_config(Some("16:9"), Some("2K")).unwrap();
        assert_eq!(config["aspectRatio"], "16:9");
        assert_eq!(config["imageSize"], "2K");
    }

    #[test]
    fn instruction_follows_reference_images() {
        let images = vec![vec![1u8, 2, 3]];
        let parts = build_request_parts("do the thing", &images);
        assert_eq!(parts.len(), 2);
        assert!(parts[0].get("inlineData").is_some());
        assert_eq!(parts[1]["text"], "do the thing");

        let parts = build_request_parts("solo", &[]);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0]["text"], "solo");
    }

    #[test]
    fn hints_match_known_status_codes() {
        assert!(hint_for_error("status 429 Too Many Requests")
            .unwrap()
            .contains("Quota"));
        assert!(hint_for_error("status 404 Not Found")
            .unwrap()
            .contains("models"));
        assert!(hint_for_error("status 403 Forbidden")
            .unwrap()
            .contains("GEMINI_API_KEY"));
        assert!(hint_for_error("connection reset by peer").is_none());
    }

    #[test]
    fn error_body_summary_prefers_nested_message() {
        let (message, _) = summarize_error_body(
            r#"{"error": {"code": 429, "message": "Resource has been exhausted"}}"#,
        );
        assert_eq!(message.as_deref(), Some("Resource has been exhausted"));

        let (message, summary) = summarize_error_body("");
        assert!(message.is_none());
        assert_eq!(summary, "empty response body");
    }
}
