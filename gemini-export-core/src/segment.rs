use once_cell::sync::Lazy;
use scraper::{ElementRef, Selector};
use tracing::debug;

use crate::dom::{
    closest_within, dedupe, has_descendant, is_within, parent_element, sort_document_order,
};
use crate::markers::{MarkerRole, MarkerVocabulary};

pub const USER_TURN_TAG: &str = "user-query";
pub const ASSISTANT_TURN_TAG: &str = "model-response";

static TURN_TAG_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("user-query, model-response").expect("valid selector"));
static USER_TURN_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(USER_TURN_TAG).expect("valid selector"));
static ASSISTANT_TURN_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(ASSISTANT_TURN_TAG).expect("valid selector"));
static CONVERSATION_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".conversation-container").expect("valid selector"));
static USER_CONTENT_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"h1, h2, h3, h4, h5, h6, [role="heading"]"#).expect("valid selector")
});
static ASSISTANT_CONTENT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p, ul, ol, pre, code, table").expect("valid selector"));

type BlockStrategy = for<'a> fn(ElementRef<'a>, &MarkerVocabulary) -> Vec<ElementRef<'a>>;

/// Evaluated in order; the first non-empty result wins.
const BLOCK_STRATEGIES: &[(&str, BlockStrategy)] = &[
    ("turn-tags", by_turn_tags),
    ("conversation-container", by_conversation_class),
    ("marker-buttons", by_marker_buttons),
];

/// Returns the elements holding one conversational turn each, in document order.
pub fn find_message_blocks<'a>(
    root: ElementRef<'a>,
    vocabulary: &MarkerVocabulary,
) -> Vec<ElementRef<'a>> {
    for (name, strategy) in BLOCK_STRATEGIES {
        let mut blocks = strategy(root, vocabulary);
        if blocks.is_empty() {
            continue;
        }
        sort_document_order(&mut blocks);
        debug!(strategy = name, count = blocks.len(), "message blocks found");
        return blocks;
    }

    debug!("no message blocks found");
    Vec::new()
}

fn by_turn_tags<'a>(root: ElementRef<'a>, _: &MarkerVocabulary) -> Vec<ElementRef<'a>> {
    root.select(&TURN_TAG_SELECTOR).collect()
}

fn by_conversation_class<'a>(root: ElementRef<'a>, _: &MarkerVocabulary) -> Vec<ElementRef<'a>> {
    root.select(&CONVERSATION_SELECTOR).collect()
}

fn by_marker_buttons<'a>(
    root: ElementRef<'a>,
    vocabulary: &MarkerVocabulary,
) -> Vec<ElementRef<'a>> {
    let mut blocks = Vec::new();
    for role in [MarkerRole::User, MarkerRole::Assistant] {
        for marker in vocabulary.marker_buttons(root, role) {
            let Some(start) = parent_element(marker) else {
                continue;
            };
            if let Some(block) =
                closest_within(start, root, false, |el| holds_turn_content(el, role))
            {
                blocks.push(block);
            }
        }
    }
    dedupe(blocks)
}

pub fn holds_turn_content(element: ElementRef<'_>, role: MarkerRole) -> bool {
    match role {
        MarkerRole::User => has_descendant(element, &USER_CONTENT_SELECTOR),
        MarkerRole::Assistant => has_descendant(element, &ASSISTANT_CONTENT_SELECTOR),
    }
}

pub fn turn_tag_role(element: ElementRef<'_>) -> Option<MarkerRole> {
    match element.value().name() {
        USER_TURN_TAG => Some(MarkerRole::User),
        ASSISTANT_TURN_TAG => Some(MarkerRole::Assistant),
        _ => None,
    }
}

/// Splits a block that nests both a user turn and an assistant turn.
///
/// Returns one or two elements in document order; the block itself when it cannot be split.
pub fn split_mixed_block<'a>(
    _root: ElementRef<'a>,
    block: ElementRef<'a>,
    vocabulary: &MarkerVocabulary,
) -> Vec<ElementRef<'a>> {
    if turn_tag_role(block).is_some() {
        return vec![block];
    }

    let user_part = nested_turn(block, MarkerRole::User, vocabulary);
    let assistant_part = nested_turn(block, MarkerRole::Assistant, vocabulary);

    let (Some(user_part), Some(assistant_part)) = (user_part, assistant_part) else {
        return vec![block];
    };

    if user_part == block
        || assistant_part == block
        || is_within(user_part, assistant_part)
        || is_within(assistant_part, user_part)
    {
        return vec![block];
    }

    let mut parts = vec![user_part, assistant_part];
    sort_document_order(&mut parts);
    debug!(first = parts[0].value().name(), "split mixed block");
    parts
}

/// The sub-element of `block` that owns the turn of `role`: a nested turn tag first, then the
/// content-bearing ancestor of the first marker of that role.
fn nested_turn<'a>(
    block: ElementRef<'a>,
    role: MarkerRole,
    vocabulary: &MarkerVocabulary,
) -> Option<ElementRef<'a>> {
    let tag_selector: &Selector = match role {
        MarkerRole::User => &USER_TURN_SELECTOR,
        MarkerRole::Assistant => &ASSISTANT_TURN_SELECTOR,
    };
    if let Some(tagged) = block.select(tag_selector).next() {
        return Some(tagged);
    }

    vocabulary
        .marker_buttons(block, role)
        .into_iter()
        .find_map(|marker| {
            let start = parent_element(marker)?;
            closest_within(start, block, true, |el| holds_turn_content(el, role))
        })
}
