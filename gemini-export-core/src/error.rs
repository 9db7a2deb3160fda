use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Open a Gemini chat thread before exporting.")]
    NoActiveThread,

    #[error("Unable to locate the chat thread on this page.")]
    RootNotFound,

    #[error("Unable to locate the chat scroll area. Reload Gemini and try again.")]
    ScrollContainerNotFound,

    #[error("Chat scroll position did not change. Scroll to the top manually and try again.")]
    ScrollStalled,

    #[error("Chat history did not finish loading. Scroll to the top and try again.")]
    ScrollIncomplete,

    #[error("No messages were found in the current chat.")]
    NoMessagesFound,

    #[error("download failed for {path}: {source}")]
    DownloadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    ExportAborted(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("snapshot file is empty: {path}")]
    EmptySnapshot { path: PathBuf },

    #[error("snapshot file is not valid UTF-8: {path}")]
    NonUtf8Snapshot { path: PathBuf },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ExportError>;
