use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Body of `/api/chat` and `/api/stream`.
///
/// Fields that are missing or not strings deserialize to `None` so the
/// validator reports them with its own message.
#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default, deserialize_with = "string_or_none")]
    pub message: Option<String>,
    #[serde(default, rename = "systemPrompt", deserialize_with = "string_or_none")]
    pub system_prompt: Option<String>,
}

/// Body of `/api/translate`.
#[derive(Debug, Default, Deserialize)]
pub struct TranslateRequest {
    #[serde(default, deserialize_with = "string_or_none")]
    pub text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        _ => None,
    })
}
