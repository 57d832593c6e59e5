//! Generative service wire mapping and defensive response parsing.
//!
//! The generation endpoint returns free-form text that is supposed to
//! contain a JSON score object. Models wrap it in prose or code fences often
//! enough that parsing is two-stage: direct structural parse first, then
//! extraction of the first balanced object as a documented second attempt.
//! Anything past that is a `Parse` error carrying a truncated excerpt.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AnalysisError;

/// Chat-style generation request with the image inlined as a data URL.
pub fn build_generation_request(model: &str, prompt: &str, image: &[u8]) -> Value {
    json!({
        "model": model,
        "messages": [{
            "role": "user",
            "content": [
                { "type": "text", "text": prompt },
                {
                    "type": "image_url",
                    "image_url": { "url": format!("data:image/jpeg;base64,{}", BASE64.encode(image)) }
                }
            ]
        }],
        "temperature": 0.2,
        "max_tokens": 500
    })
}

/// Pull the assistant message text out of the response envelope.
pub fn extract_message_text(body: &str) -> Result<String, AnalysisError> {
    let value: Value = serde_json::from_str(body).map_err(|e| {
        AnalysisError::parse(format!("generation response is not valid JSON: {}", e), body)
    })?;
    value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AnalysisError::parse("generation response missing message content", body))
}

/// The fields consumed from the model's score object: the headline score
/// (anchored against the synthesized baseline downstream) and the tip list.
/// The number arrives as an integer or a float depending on the model's
/// mood; any extra keys the model emits are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawScorePayload {
    pub overall: Option<f64>,
    #[serde(default, alias = "advice")]
    pub tips: Vec<String>,
}

/// Two-stage defensive parse of the model's textual output.
pub fn parse_score_payload(text: &str) -> Result<RawScorePayload, AnalysisError> {
    if let Ok(payload) = serde_json::from_str::<RawScorePayload>(text) {
        return Ok(payload);
    }
    if let Some(fragment) = first_balanced_object(text) {
        if let Ok(payload) = serde_json::from_str::<RawScorePayload>(fragment) {
            return Ok(payload);
        }
    }
    Err(AnalysisError::parse(
        "no score object found in generation output",
        text,
    ))
}

/// First balanced `{ ... }` substring, skipping braces inside string literals.
pub fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, byte) in text.as_bytes().iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if *byte == b'\\' {
                escaped = true;
            } else if *byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=offset]);
                }
            }
            _ => {}
        }
    }
    None
}
