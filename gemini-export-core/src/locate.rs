use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::dom::{normalized_text, parent_element};
use crate::markers::MarkerVocabulary;

const CHAT_ROOT_SELECTORS: &[&str] = &[
    "#chat-history",
    r#"infinite-scroller[data-test-id="chat-history-container"]"#,
];
/// An ancestor must hold at least this many marker controls to count as a full exchange.
const MIN_ROOT_MARKERS: usize = 2;

static STABLE_ROOT_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    CHAT_ROOT_SELECTORS
        .iter()
        .map(|css| Selector::parse(css).expect("valid selector"))
        .collect()
});
static HEADING_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"h1, h2, h3, h4, h5, h6, [role="heading"]"#).expect("valid selector")
});
static MAIN_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"main, [role="main"]"#).expect("valid selector"));
static BODY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("body").expect("valid selector"));

type RootStrategy = for<'a> fn(&'a Html, &MarkerVocabulary) -> Option<ElementRef<'a>>;

/// Evaluated in order; the first strategy that yields an element wins.
const ROOT_STRATEGIES: &[(&str, RootStrategy)] = &[
    ("stable-selector", by_stable_selector),
    ("conversation-heading", by_conversation_heading),
    ("main-landmark", by_main_landmark),
];

/// Finds the element bounding the conversation. Never fails: the body (or the document element)
/// is the last resort.
pub fn find_chat_root<'a>(document: &'a Html, vocabulary: &MarkerVocabulary) -> ElementRef<'a> {
    for (name, strategy) in ROOT_STRATEGIES {
        if let Some(root) = strategy(document, vocabulary) {
            debug!(strategy = name, tag = root.value().name(), "chat root located");
            return root;
        }
    }

    debug!(strategy = "body", "chat root located");
    document
        .select(&BODY_SELECTOR)
        .next()
        .unwrap_or_else(|| document.root_element())
}

fn by_stable_selector<'a>(document: &'a Html, _: &MarkerVocabulary) -> Option<ElementRef<'a>> {
    STABLE_ROOT_SELECTORS
        .iter()
        .find_map(|selector| document.select(selector).next())
}

fn by_conversation_heading<'a>(
    document: &'a Html,
    vocabulary: &MarkerVocabulary,
) -> Option<ElementRef<'a>> {
    let heading = document.select(&HEADING_SELECTOR).find(|heading| {
        let text = normalized_text(*heading);
        vocabulary
            .headings()
            .iter()
            .any(|phrase| !phrase.is_empty() && text.contains(phrase.as_str()))
    })?;
    let heading_parent = parent_element(heading)?;

    let mut current = Some(heading_parent);
    while let Some(ancestor) = current {
        if ancestor.value().name() == "body" {
            break;
        }
        if vocabulary.all_marker_buttons(ancestor).len() >= MIN_ROOT_MARKERS {
            return Some(ancestor);
        }
        current = parent_element(ancestor);
    }

    Some(heading_parent)
}

fn by_main_landmark<'a>(document: &'a Html, _: &MarkerVocabulary) -> Option<ElementRef<'a>> {
    document.select(&MAIN_SELECTOR).next()
}
