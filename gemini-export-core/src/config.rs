use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use dirs::{download_dir, home_dir};

use crate::error::{ExportError, Result};
use crate::model::ExtractOptions;

pub const MAX_CHARS_ENV: &str = "GEMINI_EXPORT_MAX_CHARS";
pub const EXPORT_DIR_ENV: &str = "GEMINI_EXPORT_DIR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    pub max_chars_per_message: Option<usize>,
    pub save_dir: PathBuf,
}

impl ExportConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var_os(key))
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let max_chars_per_message = lookup(MAX_CHARS_ENV)
            .filter(|value| !value.is_empty())
            .map(|value| parse_max_chars(&value.to_string_lossy()))
            .transpose()?;

        // Precedence:
        // 1) GEMINI_EXPORT_DIR
        // 2) the platform download directory (where the browser build saves)
        // 3) the home directory
        // 4) the working directory
        let save_dir = lookup(EXPORT_DIR_ENV)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
            .or_else(download_dir)
            .or_else(home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            max_chars_per_message,
            save_dir,
        })
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            max_chars_per_message: self.max_chars_per_message,
        }
    }
}

pub fn parse_max_chars(input: &str) -> Result<usize> {
    match input.trim().parse::<usize>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ExportError::InvalidConfig(format!(
            "max chars per message must be a positive integer, got {input:?}"
        ))),
    }
}
