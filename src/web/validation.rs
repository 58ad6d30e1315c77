//! Input checks shared by every `/api` endpoint.
//!
//! All endpoints go through [`validate`] so the length and content rules
//! cannot drift apart between routes.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

pub const MAX_INPUT_CHARS: usize = 5000;
pub const MAX_SYSTEM_PROMPT_CHARS: usize = 2000;

/// Script blocks, `javascript:` URIs and inline `on*=` handlers.
static DISALLOWED_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?is)<script\b.*?</script>",
        r"(?i)javascript:",
        r"(?i)on[a-z0-9_]+\s*=",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("disallowed-content pattern must compile"))
    .collect()
});

/// Which request field a validation failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Message,
    Text,
    SystemPrompt,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Message => "Mensaje",
            Field::Text => "Texto",
            Field::SystemPrompt => "System prompt",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} requerido")]
    EmptyInput(Field),

    #[error("{field} demasiado largo (máximo {max} caracteres)")]
    TooLong { field: Field, max: usize },

    #[error("Contenido no permitido detectado")]
    DisallowedContent,
}

/// Check a user input and its optional system prompt.
///
/// `input` is `None` when the field was missing or not a string. Lengths are
/// counted in characters, not bytes. Returns the accepted input.
pub fn validate<'a>(
    field: Field,
    input: Option<&'a str>,
    system_prompt: Option<&str>,
) -> Result<&'a str, ValidationError> {
    let input = input
        .filter(|text| !text.is_empty())
        .ok_or(ValidationError::EmptyInput(field))?;

    if input.chars().count() > MAX_INPUT_CHARS {
        return Err(ValidationError::TooLong { field, max: MAX_INPUT_CHARS });
    }

    if let Some(prompt) = system_prompt {
        if prompt.chars().count() > MAX_SYSTEM_PROMPT_CHARS {
            return Err(ValidationError::TooLong {
                field: Field::SystemPrompt,
                max: MAX_SYSTEM_PROMPT_CHARS,
            });
        }
    }

    if contains_disallowed(input) || system_prompt.is_some_and(contains_disallowed) {
        return Err(ValidationError::DisallowedContent);
    }

    Ok(input)
}

pub fn contains_disallowed(text: &str) -> bool {
    DISALLOWED_PATTERNS.iter().any(|pattern| pattern.is_match(text))
}
