pub mod classify;
pub mod config;
pub mod content;
pub mod dom;
pub mod error;
pub mod extract;
pub mod locate;
pub mod markers;
pub mod model;
pub mod render;
pub mod scroll;
pub mod segment;
pub mod service;
pub mod time;
pub mod uri;

pub use config::ExportConfig;
pub use error::{ExportError, Result};
pub use extract::extract_messages;
pub use locate::find_chat_root;
pub use markers::{Locale, MarkerVocabulary};
pub use model::{ExportMessage, ExportPayload, ExportResponse, ExtractOptions, Role};
pub use render::format_export_markdown;
pub use scroll::{ScrollConfig, ScrollController, ScrollReport, ScrollState, ScrollSurface};
pub use service::{
    ChatPage, SnapshotPage, export_current_chat, export_response, export_response_to_json,
    read_snapshot, save_markdown,
};
pub use time::{local_iso_timestamp, now_local_iso};
pub use uri::{ChatUrl, chat_id_from_url, is_gemini_chat_url};
