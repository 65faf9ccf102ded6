use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;

use crate::llm::media::detect_mime_type;

/// Response envelope for a generation call. The wire shape varies between
/// model families: the standard candidate/content/parts path, a bare
/// top-level parts list, or a dedicated images list. Every level is
/// optional and both camelCase and snake_case spellings are accepted.
#[derive(Debug, Deserialize)]
pub struct GenerationResponse {
    pub candidates: Option<Vec<Candidate>>,
    pub parts: Option<Vec<Part>>,
    pub images: Option<Vec<InlineBlob>>,
    #[serde(rename = "promptFeedback", alias = "prompt_feedback")]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
    #[serde(rename = "finishReason", alias = "finish_reason")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Content {
    pub parts: Option<Vec<Part>>,
}

#[derive(Debug, Deserialize)]
pub struct Part {
    pub text: Option<String>,
    #[serde(rename = "inlineData", alias = "inline_data")]
    pub inline_data: Option<InlineBlob>,
}

#[derive(Debug, Deserialize)]
pub struct InlineBlob {
    #[serde(rename = "mimeType", alias = "mime_type")]
    pub mime_type: Option<String>,
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PromptFeedback {
    #[serde(rename = "blockReason", alias = "block_reason")]
    pub block_reason: Option<String>,
}

/// What a single request produced, after normalization.
#[derive(Debug)]
pub enum RenderOutcome {
    Image { bytes: Vec<u8>, mime_type: String },
    Text(String),
    Empty { diagnostic: Option<String> },
}

enum NormalizedPart {
    Image { bytes: Vec<u8>, mime_type: String },
    Text(String),
    Unrecognized,
}

fn decode_blob(blob: &InlineBlob) -> Option<(Vec<u8>, String)> {
    let data = blob.data.as_deref()?;
    let bytes = general_purpose::STANDARD.decode(data.trim()).ok()?;
    if bytes.is_empty() {
        return None;
    }
    let mime_type = blob
        .mime_type
        .clone()
        .filter(|mime| !mime.trim().is_empty())
        .or_else(|| detect_mime_type(&bytes))
        .unwrap_or_else(|| "image/png".to_string());
    Some((bytes, mime_type))
}

fn normalize_part(part: &Part) -> NormalizedPart {
    if let Some(blob) = &part.inline_data {
        if let Some((bytes, mime_type)) = decode_blob(blob) {
            return NormalizedPart::Image { bytes, mime_type };
        }
    }
    if let Some(text) = &part.text {
        if !text.trim().is_empty() {
            return NormalizedPart::Text(text.clone());
        }
    }
    NormalizedPart::Unrecognized
}

fn collect_parts(response: &GenerationResponse) -> Vec<NormalizedPart> {
    let mut normalized = Vec::new();

    for candidate in response.candidates.as_deref().unwrap_or(&[]) {
        if let Some(parts) = candidate.content.as_ref().and_then(|c| c.parts.as_ref()) {
            normalized.extend(parts.iter().map(normalize_part));
        }
    }

    if let Some(parts) = &response.parts {
        normalized.extend(parts.iter().map(normalize_part));
    }

    for blob in response.images.as_deref().unwrap_or(&[]) {
        match decode_blob(blob) {
            Some((bytes, mime_type)) => {
                normalized.push(NormalizedPart::Image { bytes, mime_type })
            }
            None => normalized.push(NormalizedPart::Unrecognized),
        }
    }

    normalized
}

fn empty_diagnostic(response: &GenerationResponse) -> Option<String> {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.as_deref())
    {
        return Some(format!("prompt blocked: {reason}"));
    }

    response
        .candidates
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .find_map(|candidate| candidate.finish_reason.as_deref())
        .filter(|reason| !reason.eq_ignore_ascii_case("STOP"))
        .map(|reason| format!("finish reason: {reason}"))
}

/// Image data wins over text; text wins over nothing. Absent structure is
/// "not found", never an error.
pub fn extract_outcome(response: GenerationResponse) -> RenderOutcome {
    let mut texts = Vec::new();

    for part in collect_parts(&response) {
        match part {
            NormalizedPart::Image { bytes, mime_type } => {
                return RenderOutcome::Image { bytes, mime_type };
            }
            NormalizedPart::Text(text) => texts.push(text),
            NormalizedPart::Unrecognized => {}
        }
    }

    if !texts.is_empty() {
        return RenderOutcome::Text(texts.join("\n"));
    }

    RenderOutcome::Empty {
        diagnostic: empty_diagnostic(&response),
    }
}
