use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};
use tracing::debug;

use crate::classify::classify_segment;
use crate::content::{clamp, serialize_assistant_segment, serialize_user_segment};
use crate::dom::{normalize_text, normalized_text};
use crate::markers::MarkerVocabulary;
use crate::model::{ExportMessage, ExtractOptions, Role};
use crate::segment::{find_message_blocks, split_mixed_block};

static TIME_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("time").expect("valid selector"));
static LABELED_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[aria-label]").expect("valid selector"));
static TIME_LABEL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2}:\d{2})|(\d{1,2}時\d{2}分)").expect("valid regex"));

/// Runs segmentation, splitting, classification, and serialization over `root`.
///
/// Orders are 1-based and gapless: unclassifiable or empty segments never take a slot.
pub fn extract_messages(
    root: ElementRef<'_>,
    vocabulary: &MarkerVocabulary,
    options: &ExtractOptions,
) -> Vec<ExportMessage> {
    let max_chars = options.max_chars();
    let mut messages = Vec::new();
    let mut previous: Option<Role> = None;

    for block in find_message_blocks(root, vocabulary) {
        for segment in split_mixed_block(root, block, vocabulary) {
            let Some(role) = classify_segment(segment, previous, vocabulary) else {
                debug!(tag = segment.value().name(), "skipping unclassifiable segment");
                continue;
            };

            let order = messages.len() + 1;
            let content = match role {
                Role::User => serialize_user_segment(segment, vocabulary),
                Role::Assistant | Role::System => {
                    serialize_assistant_segment(segment, order, vocabulary)
                }
            };
            let markdown = clamp(content.markdown, max_chars);
            let text = clamp(content.text, max_chars);
            if markdown.is_empty() && text.is_empty() {
                debug!(%role, "skipping empty segment");
                continue;
            }

            messages.push(ExportMessage {
                role,
                markdown,
                text,
                timestamp: find_timestamp(segment),
                order,
            });
            previous = Some(role);
        }
    }

    debug!(count = messages.len(), "messages extracted");
    messages
}

pub fn find_timestamp(segment: ElementRef<'_>) -> Option<String> {
    if let Some(time) = segment.select(&TIME_SELECTOR).next() {
        let text = normalized_text(time);
        if !text.is_empty() {
            return Some(text);
        }
    }

    segment
        .select(&LABELED_SELECTOR)
        .filter_map(|element| element.value().attr("aria-label"))
        .map(normalize_text)
        .find(|label| TIME_LABEL_PATTERN.is_match(label))
}
