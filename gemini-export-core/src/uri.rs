use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::{ExportError, Result};

pub const GEMINI_HOST: &str = "gemini.google.com";
const APP_PATH: &str = "/app";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatUrl {
    pub url: Url,
    pub chat_id: String,
}

impl ChatUrl {
    pub fn parse(input: &str) -> Result<Self> {
        input.parse()
    }

    pub fn is_gemini(&self) -> bool {
        is_gemini_app(&self.url)
    }

    pub fn file_name(&self) -> String {
        format!("{}.md", self.chat_id)
    }
}

impl FromStr for ChatUrl {
    type Err = ExportError;

    fn from_str(input: &str) -> Result<Self> {
        let url = Url::parse(input).map_err(|_| ExportError::NoActiveThread)?;
        let chat_id = chat_id_from_path(url.path()).ok_or(ExportError::NoActiveThread)?;
        Ok(Self { url, chat_id })
    }
}

impl fmt::Display for ChatUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Thread id of an absolute `/app/<id>` URL; `None` for anything else.
///
/// The id is the first path segment after `/app/`, trimmed. Percent-encoding is kept as-is.
pub fn chat_id_from_url(input: &str) -> Option<String> {
    let url = Url::parse(input).ok()?;
    chat_id_from_path(url.path())
}

pub fn is_gemini_chat_url(input: &str) -> bool {
    Url::parse(input).is_ok_and(|url| is_gemini_app(&url))
}

fn is_gemini_app(url: &Url) -> bool {
    url.host_str() == Some(GEMINI_HOST) && url.path().starts_with(APP_PATH)
}

fn chat_id_from_path(path: &str) -> Option<String> {
    let rest = path.strip_prefix(APP_PATH)?.strip_prefix('/')?;
    let id = rest.split('/').next()?.trim();
    (!id.is_empty()).then(|| id.to_string())
}
