use std::fs;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};

use crate::error::{ExportError, Result};
use crate::extract::extract_messages;
use crate::locate::find_chat_root;
use crate::markers::MarkerVocabulary;
use crate::model::{ExportPayload, ExportResponse, ExtractOptions};
use crate::scroll::{ScrollConfig, ScrollSurface, scroll_to_top};
use crate::uri::ChatUrl;

pub const EXPORT_FAILED: &str = "Export failed.";

static CANONICAL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"link[rel="canonical"][href]"#).expect("valid selector"));
static OG_URL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:url"][content]"#).expect("valid selector"));

pub trait ChatPage {
    fn url(&self) -> &str;
    fn document(&self) -> &Html;
    fn scroll_container(&mut self) -> Option<&mut dyn ScrollSurface>;
}

/// Scroll state of a page that is already fully loaded: always at the top, never growing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettledSurface;

impl ScrollSurface for SettledSurface {
    fn scroll_top(&self) -> u64 {
        0
    }

    fn set_scroll_top(&mut self, _top: u64) {}

    fn scroll_height(&self) -> u64 {
        0
    }

    fn client_height(&self) -> u64 {
        0
    }

    fn settle(&mut self, _delay: Duration) {}
}

#[derive(Debug)]
pub struct SnapshotPage {
    url: String,
    document: Html,
    surface: SettledSurface,
}

impl SnapshotPage {
    /// Parses `html`; without an explicit `url`, the snapshot's canonical link or `og:url` is used.
    pub fn parse(html: &str, url: Option<&str>) -> Self {
        let document = Html::parse_document(html);
        let url = url
            .map(ToString::to_string)
            .or_else(|| embedded_url(&document))
            .unwrap_or_default();
        Self {
            url,
            document,
            surface: SettledSurface,
        }
    }

    pub fn from_file(path: &Path, url: Option<&str>) -> Result<Self> {
        let html = read_snapshot(path)?;
        Ok(Self::parse(&html, url))
    }
}

impl ChatPage for SnapshotPage {
    fn url(&self) -> &str {
        &self.url
    }

    fn document(&self) -> &Html {
        &self.document
    }

    fn scroll_container(&mut self) -> Option<&mut dyn ScrollSurface> {
        Some(&mut self.surface)
    }
}

fn embedded_url(document: &Html) -> Option<String> {
    document
        .select(&CANONICAL_SELECTOR)
        .find_map(|link| link.value().attr("href"))
        .or_else(|| {
            document
                .select(&OG_URL_SELECTOR)
                .find_map(|meta| meta.value().attr("content"))
        })
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(ToString::to_string)
}

pub fn read_snapshot(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if bytes.is_empty() {
        return Err(ExportError::EmptySnapshot {
            path: path.to_path_buf(),
        });
    }

    String::from_utf8(bytes).map_err(|_| ExportError::NonUtf8Snapshot {
        path: path.to_path_buf(),
    })
}

/// Scrolls the page's history to the top, then extracts every turn.
///
/// The first failing stage ends the export; nothing partial is returned.
pub fn export_current_chat(
    page: &mut dyn ChatPage,
    vocabulary: &MarkerVocabulary,
    options: &ExtractOptions,
    scroll: ScrollConfig,
) -> Result<ExportPayload> {
    let chat_url = ChatUrl::parse(page.url())?;
    if !chat_url.is_gemini() {
        warn!(url = %chat_url, "page is not a Gemini chat; exporting anyway");
    }

    locate_root(page.document(), vocabulary)?;

    info!(phase = "scrolling", chat_id = %chat_url.chat_id, "export status");
    let surface = page
        .scroll_container()
        .ok_or(ExportError::ScrollContainerNotFound)?;
    let report = scroll_to_top(surface, scroll)?;

    info!(
        phase = "extracting",
        iterations = report.iterations,
        "export status"
    );
    let root = locate_root(page.document(), vocabulary)?;
    let messages = extract_messages(root, vocabulary, options);
    if messages.is_empty() {
        return Err(ExportError::NoMessagesFound);
    }

    info!(phase = "done", messages = messages.len(), "export status");
    Ok(ExportPayload {
        chat_id: Some(chat_url.chat_id),
        source_url: page.url().to_string(),
        messages,
    })
}

/// [`export_current_chat`] as a boundary response; panics become a generic failure.
pub fn export_response(
    page: &mut dyn ChatPage,
    vocabulary: &MarkerVocabulary,
    options: &ExtractOptions,
    scroll: ScrollConfig,
) -> ExportResponse {
    match catch_unwind(AssertUnwindSafe(|| {
        export_current_chat(page, vocabulary, options, scroll)
    })) {
        Ok(result) => {
            if let Err(err) = &result {
                warn!(error = %err, "export failed");
            }
            ExportResponse::from(result)
        }
        Err(_) => {
            warn!("export aborted unexpectedly");
            ExportResponse::failure(EXPORT_FAILED)
        }
    }
}

pub fn export_response_to_json(response: &ExportResponse) -> Result<String> {
    serde_json::to_string_pretty(response)
        .map_err(|err| ExportError::Serialization(err.to_string()))
}

pub fn save_markdown(dir: &Path, chat_id: &str, markdown: &str) -> Result<PathBuf> {
    let path = dir.join(format!("{chat_id}.md"));
    fs::create_dir_all(dir)
        .and_then(|()| fs::write(&path, markdown))
        .map_err(|source| ExportError::DownloadFailed {
            path: path.clone(),
            source,
        })?;
    info!(path = %path.display(), "export saved");
    Ok(path)
}

fn locate_root<'a>(document: &'a Html, vocabulary: &MarkerVocabulary) -> Result<ElementRef<'a>> {
    let root = find_chat_root(document, vocabulary);
    if root.children().any(|child| child.value().is_element()) {
        Ok(root)
    } else {
        Err(ExportError::RootNotFound)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use scraper::Html;
    use tempfile::tempdir;

    use super::{
        ChatPage, EXPORT_FAILED, SnapshotPage, export_current_chat, export_response,
        export_response_to_json, read_snapshot, save_markdown,
    };
    use crate::error::ExportError;
    use crate::markers::MarkerVocabulary;
    use crate::model::{ExtractOptions, Role};
    use crate::scroll::{ScrollConfig, ScrollSurface};

    const CHAT: &str = r#"<html><head>
        <link rel="canonical" href="https://gemini.google.com/app/snap42">
        </head><body><main><div id="chat-history">
            <user-query><p>What is Rust?</p></user-query>
            <model-response><p>A systems language.</p></model-response>
        </div></main></body></html>"#;

    fn export(page: &mut dyn ChatPage) -> crate::error::Result<crate::model::ExportPayload> {
        export_current_chat(
            page,
            &MarkerVocabulary::default(),
            &ExtractOptions::default(),
            ScrollConfig::default(),
        )
    }

    #[test]
    fn exports_snapshot_with_embedded_url() {
        let mut page = SnapshotPage::parse(CHAT, None);
        assert_eq!(page.url(), "https://gemini.google.com/app/snap42");

        let payload = export(&mut page).expect("export");
        assert_eq!(payload.chat_id.as_deref(), Some("snap42"));
        assert_eq!(payload.source_url, "https://gemini.google.com/app/snap42");
        assert_eq!(payload.messages.len(), 2);
        assert_eq!(payload.messages[0].role, Role::User);
        assert_eq!(payload.messages[1].role, Role::Assistant);
    }

    #[test]
    fn explicit_url_wins_over_embedded_one() {
        let page = SnapshotPage::parse(CHAT, Some("https://gemini.google.com/app/given"));
        assert_eq!(page.url(), "https://gemini.google.com/app/given");
    }

    #[test]
    fn missing_thread_id_fails_first() {
        let mut page = SnapshotPage::parse("<main></main>", Some("https://gemini.google.com/app"));
        assert!(matches!(export(&mut page), Err(ExportError::NoActiveThread)));
    }

    #[test]
    fn empty_page_has_no_root() {
        let mut page = SnapshotPage::parse("", Some("https://gemini.google.com/app/x"));
        assert!(matches!(export(&mut page), Err(ExportError::RootNotFound)));
    }

    #[test]
    fn page_without_turns_has_no_messages() {
        let mut page = SnapshotPage::parse(
            "<main><p>Welcome</p></main>",
            Some("https://gemini.google.com/app/x"),
        );
        let response = export_response(
            &mut page,
            &MarkerVocabulary::default(),
            &ExtractOptions::default(),
            ScrollConfig::default(),
        );
        assert!(!response.ok);
        assert_eq!(
            response.error.as_deref(),
            Some("No messages were found in the current chat.")
        );
        let json = export_response_to_json(&response).expect("json");
        assert!(json.contains("\"ok\": false"));
    }

    struct NoScrollPage {
        document: Html,
    }

    impl ChatPage for NoScrollPage {
        fn url(&self) -> &str {
            "https://gemini.google.com/app/abc"
        }

        fn document(&self) -> &Html {
            &self.document
        }

        fn scroll_container(&mut self) -> Option<&mut dyn ScrollSurface> {
            None
        }
    }

    #[test]
    fn missing_scroll_area_is_reported() {
        let mut page = NoScrollPage {
            document: Html::parse_document(CHAT),
        };
        assert!(matches!(
            export(&mut page),
            Err(ExportError::ScrollContainerNotFound)
        ));
    }

    struct BrokenPage {
        document: Html,
    }

    impl ChatPage for BrokenPage {
        fn url(&self) -> &str {
            "https://gemini.google.com/app/abc"
        }

        fn document(&self) -> &Html {
            &self.document
        }

        fn scroll_container(&mut self) -> Option<&mut dyn ScrollSurface> {
            panic!("scroll container detached")
        }
    }

    #[test]
    fn panics_become_a_generic_failure() {
        let mut page = BrokenPage {
            document: Html::parse_document(CHAT),
        };
        let response = export_response(
            &mut page,
            &MarkerVocabulary::default(),
            &ExtractOptions::default(),
            ScrollConfig::default(),
        );
        assert!(!response.ok);
        assert_eq!(response.error.as_deref(), Some(EXPORT_FAILED));
    }

    #[test]
    fn saves_markdown_under_chat_id() {
        let temp = tempdir().expect("tempdir");
        let dir = temp.path().join("exports");
        let path = save_markdown(&dir, "abc123", "# hi\n").expect("save");
        assert_eq!(path, dir.join("abc123.md"));
        assert_eq!(fs::read_to_string(path).expect("read"), "# hi\n");
    }

    #[test]
    fn save_failure_is_a_download_error() {
        let temp = tempdir().expect("tempdir");
        let blocker = temp.path().join("file");
        fs::write(&blocker, "x").expect("write");
        let err = save_markdown(&blocker, "abc", "md").expect_err("not a directory");
        assert!(matches!(err, ExportError::DownloadFailed { .. }));
    }

    #[test]
    fn snapshot_files_must_be_utf8_and_non_empty() {
        let temp = tempdir().expect("tempdir");
        let empty = temp.path().join("empty.html");
        fs::write(&empty, "").expect("write");
        assert!(matches!(
            read_snapshot(&empty),
            Err(ExportError::EmptySnapshot { .. })
        ));

        let binary = temp.path().join("binary.html");
        fs::write(&binary, [0xff, 0xfe, 0x00]).expect("write");
        assert!(matches!(
            read_snapshot(&binary),
            Err(ExportError::NonUtf8Snapshot { .. })
        ));

        assert!(matches!(
            read_snapshot(&temp.path().join("missing.html")),
            Err(ExportError::Io { .. })
        ));
    }
}
