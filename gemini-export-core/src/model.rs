use std::fmt;

use serde::Serialize;

use crate::error::Result;

pub const DEFAULT_MAX_CHARS_PER_MESSAGE: usize = 200_000;

/// Speaker of one exported turn.
///
/// `System` is part of the wire format but no classification path produces it yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(rename = "gemini")]
    Assistant,
    System,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Gemini",
            Self::System => "System",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "gemini"),
            Self::System => write!(f, "system"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportMessage {
    pub role: Role,
    pub markdown: String,
    pub text: String,
    pub timestamp: Option<String>,
    pub order: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPayload {
    pub chat_id: Option<String>,
    pub source_url: String,
    pub messages: Vec<ExportMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<ExportPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExportResponse {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            payload: None,
            error: Some(error.into()),
        }
    }
}

impl From<Result<ExportPayload>> for ExportResponse {
    fn from(result: Result<ExportPayload>) -> Self {
        match result {
            Ok(payload) => Self {
                ok: true,
                payload: Some(payload),
                error: None,
            },
            Err(err) => Self::failure(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtractOptions {
    pub max_chars_per_message: Option<usize>,
}

impl ExtractOptions {
    pub fn max_chars(&self) -> usize {
        self.max_chars_per_message
            .unwrap_or(DEFAULT_MAX_CHARS_PER_MESSAGE)
    }
}
