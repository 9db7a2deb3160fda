use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::dom::{
    closest, closest_within, compare_document_order, has_descendant, is_within, strip_labels,
    visible_text, visible_text_excluding,
};
use crate::markers::MarkerVocabulary;

pub const MAX_TABLE_COLUMNS: usize = 20;

const BLOCK_END_MARKER: &str = "<!-- /gemini-export:block -->";

const STRIP_SELECTORS: &[&str] = &[
    "button",
    r#"[role="button"]"#,
    "message-actions",
    "mat-menu",
    "mat-icon",
    ".response-container-header",
    ".response-container-header-controls",
    ".response-container-header-status",
    ".response-container-header-processing-state",
    ".response-tts-container",
    ".menu-button-wrapper",
    ".more-menu-button-container",
    "copy-button",
    "thumb-up-button",
    "thumb-down-button",
    "regenerate-button",
    r#"[data-test-id="copy-button"]"#,
    r#"[data-test-id="more-menu-button"]"#,
    r#"[data-test-id="actions-menu-button"]"#,
    r#"[data-test-id="thoughts-header-button"]"#,
];

static STRIP_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(&STRIP_SELECTORS.join(", ")).expect("valid selector"));
static LANGUAGE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9+#_.-]{1,20}$").expect("valid regex"));

static USER_HEADING_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"h2, [role="heading"][aria-level="2"]"#).expect("valid selector")
});
static PARAGRAPH_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p").expect("valid selector"));
static HEADING_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").expect("valid selector"));
static LIST_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("ul, ol").expect("valid selector"));
static LIST_ITEM_SKIP_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("ul, ol, pre, table, code-block, .code-block").expect("valid selector")
});
static PROSE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("p, ul, ol, table, h1, h2, h3, h4, h5, h6").expect("valid selector")
});
static LIST_ITEM_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("li").expect("valid selector"));
static CODE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("code").expect("valid selector"));
static PRE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("pre").expect("valid selector"));
static CODE_OR_PRE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("code, pre").expect("valid selector"));
static CODE_BLOCK_TAG_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("code-block").expect("valid selector"));
static CODE_BLOCK_CLASS_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".code-block").expect("valid selector"));
static CODE_BLOCK_ANY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".code-block, code-block").expect("valid selector"));
static CODE_DECORATION_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".code-block-decoration").expect("valid selector"));
static LABEL_CANDIDATE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span, div, label, button").expect("valid selector"));
static ICON_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("mat-icon").expect("valid selector"));
static TABLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table").expect("valid selector"));
static ROW_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("valid selector"));
static CELL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("th, td").expect("valid selector"));

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerializedContent {
    pub markdown: String,
    pub text: String,
}

impl SerializedContent {
    pub fn is_empty(&self) -> bool {
        self.markdown.is_empty() && self.text.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockItem<'a> {
    Paragraph(ElementRef<'a>),
    Heading(ElementRef<'a>),
    List(ElementRef<'a>),
    Code {
        element: ElementRef<'a>,
        code: String,
        language: Option<String>,
    },
    Table {
        element: ElementRef<'a>,
        rows: Option<Vec<Vec<String>>>,
    },
}

impl<'a> BlockItem<'a> {
    pub fn element(&self) -> ElementRef<'a> {
        match self {
            Self::Paragraph(element) | Self::Heading(element) | Self::List(element) => *element,
            Self::Code { element, .. } | Self::Table { element, .. } => *element,
        }
    }
}

pub fn serialize_user_segment(
    segment: ElementRef<'_>,
    vocabulary: &MarkerVocabulary,
) -> SerializedContent {
    let labels = vocabulary.ui_labels();
    let main_text = segment
        .select(&USER_HEADING_SELECTOR)
        .next()
        .map(|heading| strip_labels(&visible_text(heading), &labels))
        .unwrap_or_default();

    let mut parts = Vec::new();
    if !main_text.is_empty() {
        parts.push(main_text.clone());
    }
    for paragraph in segment.select(&PARAGRAPH_SELECTOR) {
        let text = strip_labels(&visible_text(paragraph), &labels);
        if !text.is_empty() && text != main_text {
            parts.push(text);
        }
    }

    let markdown = parts.join("\n\n");
    let text = if markdown.is_empty() {
        plain_text(segment, vocabulary)
    } else {
        markdown.clone()
    };
    SerializedContent { markdown, text }
}

pub fn serialize_assistant_segment(
    segment: ElementRef<'_>,
    order: usize,
    vocabulary: &MarkerVocabulary,
) -> SerializedContent {
    let labels = vocabulary.ui_labels();
    let mut parts: Vec<String> = Vec::new();
    let mut code_index = 1;
    let mut table_index = 1;

    for item in collect_block_items(segment, vocabulary) {
        match item {
            BlockItem::Paragraph(element) => {
                let text = strip_labels(&visible_text(element), &labels);
                if !text.is_empty() {
                    parts.push(text);
                }
            }
            BlockItem::Heading(element) => {
                let text = strip_labels(&visible_text(element), &labels);
                if !text.is_empty() {
                    parts.push(format!("### {text}"));
                }
            }
            BlockItem::List(element) => {
                let text = render_list(element, &labels);
                if !text.is_empty() {
                    parts.push(text);
                }
            }
            BlockItem::Code { code, language, .. } => {
                parts.push(format!(
                    "<!-- gemini-export:block type=code id=msg-{order}-code-{code_index} lang={} -->",
                    language.as_deref().unwrap_or_default()
                ));
                parts.push(fenced_code(&code, language.as_deref()));
                parts.push(BLOCK_END_MARKER.to_string());
                code_index += 1;
            }
            BlockItem::Table { element, rows } => {
                let body = match rows {
                    Some(rows) => render_table(&rows),
                    None => strip_labels(&visible_text(element), &labels),
                };
                if !body.is_empty() {
                    parts.push(format!(
                        "<!-- gemini-export:block type=table id=msg-{order}-table-{table_index} lang= -->"
                    ));
                    parts.push(body);
                    parts.push(BLOCK_END_MARKER.to_string());
                }
                table_index += 1;
            }
        }
    }

    SerializedContent {
        markdown: parts.join("\n\n"),
        text: plain_text(segment, vocabulary),
    }
}

pub fn collect_block_items<'a>(
    segment: ElementRef<'a>,
    vocabulary: &MarkerVocabulary,
) -> Vec<BlockItem<'a>> {
    let labels = vocabulary.ui_labels();
    let code_blocks = collect_code_blocks(segment, vocabulary);
    let tables: Vec<ElementRef<'a>> = segment
        .select(&TABLE_SELECTOR)
        .filter(|table| !inside_other_table(*table, segment))
        .filter(|table| !code_blocks.iter().any(|(container, _, _)| is_within(*table, *container)))
        .collect();

    let claimed = |element: ElementRef<'a>| {
        code_blocks
            .iter()
            .any(|(container, _, _)| is_within(element, *container))
            || tables.iter().any(|table| is_within(element, *table))
    };
    let inside_list_item =
        |element: ElementRef<'a>| closest_within(element, segment, false, is_list_item).is_some();

    let mut items = Vec::new();
    for heading in segment.select(&HEADING_SELECTOR) {
        if !claimed(heading) && !inside_list_item(heading) {
            items.push(BlockItem::Heading(heading));
        }
    }
    for paragraph in segment.select(&PARAGRAPH_SELECTOR) {
        if !claimed(paragraph) && !inside_list_item(paragraph) {
            items.push(BlockItem::Paragraph(paragraph));
        }
    }
    for list in segment.select(&LIST_SELECTOR) {
        if !claimed(list) && owning_list(list, segment).is_none() {
            items.push(BlockItem::List(list));
        }
    }
    for (element, code, language) in code_blocks {
        items.push(BlockItem::Code {
            element,
            code,
            language,
        });
    }
    for table in tables {
        items.push(BlockItem::Table {
            element: table,
            rows: extract_table_rows(table, &labels),
        });
    }

    items.sort_by(|a, b| compare_document_order(a.element(), b.element()));
    items
}

type CodeBlock<'a> = (ElementRef<'a>, String, Option<String>);

fn collect_code_blocks<'a>(
    segment: ElementRef<'a>,
    vocabulary: &MarkerVocabulary,
) -> Vec<CodeBlock<'a>> {
    let mut blocks: Vec<CodeBlock<'a>> = Vec::new();

    for code in segment.select(&CODE_SELECTOR) {
        let body = raw_text(code);
        let in_pre = closest_within(code, segment, false, is_pre).is_some();
        if !body.contains('\n') && !in_pre {
            continue;
        }
        let container = resolve_code_container(code, segment, vocabulary);
        push_code_block(&mut blocks, container, body, vocabulary);
    }

    for pre in segment.select(&PRE_SELECTOR) {
        if has_descendant(pre, &CODE_SELECTOR) {
            continue;
        }
        let body = raw_text(pre);
        if body.trim().is_empty() {
            continue;
        }
        let container = resolve_code_container(pre, segment, vocabulary);
        push_code_block(&mut blocks, container, body, vocabulary);
    }

    for code_block in segment.select(&CODE_BLOCK_TAG_SELECTOR) {
        let container = code_block
            .select(&CODE_BLOCK_CLASS_SELECTOR)
            .next()
            .unwrap_or(code_block);
        let body = code_block
            .select(&CODE_OR_PRE_SELECTOR)
            .next()
            .map(raw_text)
            .unwrap_or_default();
        if body.trim().is_empty() {
            continue;
        }
        push_code_block(&mut blocks, container, body, vocabulary);
    }

    blocks
}

fn push_code_block<'a>(
    blocks: &mut Vec<CodeBlock<'a>>,
    container: ElementRef<'a>,
    body: String,
    vocabulary: &MarkerVocabulary,
) {
    if blocks.iter().any(|(existing, _, _)| *existing == container) {
        return;
    }
    let language = find_language_label(container, vocabulary);
    blocks.push((container, body, language));
}

fn resolve_code_container<'a>(
    element: ElementRef<'a>,
    segment: ElementRef<'a>,
    vocabulary: &MarkerVocabulary,
) -> ElementRef<'a> {
    if let Some(wrapper) =
        closest_within(element, segment, false, |el| CODE_BLOCK_ANY_SELECTOR.matches(&el))
    {
        return wrapper;
    }
    if let Some(wrapper) = closest_within(element, segment, false, |el| {
        el.select(&PRE_SELECTOR).count() <= 1
            && !vocabulary.chrome_buttons(el).is_empty()
            && !holds_prose(el)
    }) {
        return wrapper;
    }
    closest_within(element, segment, false, is_pre).unwrap_or(element)
}

pub fn find_language_label(
    container: ElementRef<'_>,
    vocabulary: &MarkerVocabulary,
) -> Option<String> {
    let decoration = closest(container, &CODE_BLOCK_ANY_SELECTOR)
        .and_then(|code_block| code_block.select(&CODE_DECORATION_SELECTOR).next());
    if let Some(decoration) = decoration {
        let text = visible_text_excluding(decoration, &ICON_SELECTOR);
        if LANGUAGE_PATTERN.is_match(&text) {
            return Some(text.to_lowercase());
        }
    }

    for candidate in container.select(&LABEL_CANDIDATE_SELECTOR) {
        if closest_within(candidate, container, true, |el| {
            CODE_OR_PRE_SELECTOR.matches(&el) || ICON_SELECTOR.matches(&el)
        })
        .is_some()
            || has_descendant(candidate, &CODE_OR_PRE_SELECTOR)
            || vocabulary.is_chrome_control(candidate)
        {
            continue;
        }
        let text = visible_text_excluding(candidate, &ICON_SELECTOR);
        if LANGUAGE_PATTERN.is_match(&text) {
            return Some(text.to_lowercase());
        }
    }
    None
}

/// Parses a table into a rectangular matrix of cell texts.
///
/// Returns `None` when the table has no cells or its widest row exceeds [`MAX_TABLE_COLUMNS`].
pub fn extract_table_rows<S: AsRef<str>>(
    table: ElementRef<'_>,
    labels: &[S],
) -> Option<Vec<Vec<String>>> {
    let mut rows: Vec<Vec<String>> = table
        .select(&ROW_SELECTOR)
        .filter(|row| owning_table(*row) == Some(table))
        .map(|row| {
            row.select(&CELL_SELECTOR)
                .filter(|cell| owning_table(*cell) == Some(table))
                .map(|cell| strip_labels(&visible_text(cell), labels))
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect();

    let width = rows.iter().map(Vec::len).max()?;
    if width > MAX_TABLE_COLUMNS {
        return None;
    }
    for row in &mut rows {
        row.resize(width, String::new());
    }
    Some(rows)
}

// A copy-control wrapper only counts as a code container when nothing besides the code is prose.
fn holds_prose(wrapper: ElementRef<'_>) -> bool {
    wrapper
        .select(&PROSE_SELECTOR)
        .any(|block| closest_within(block, wrapper, true, is_pre).is_none())
}

pub fn render_table(rows: &[Vec<String>]) -> String {
    let Some((header, body)) = rows.split_first() else {
        return String::new();
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(table_line(header));
    lines.push(format!("| {} |", vec!["---"; header.len()].join(" | ")));
    lines.extend(body.iter().map(|row| table_line(row)));
    lines.join("\n")
}

fn table_line(cells: &[String]) -> String {
    let cells: Vec<String> = cells.iter().map(|cell| cell.replace('|', r"\|")).collect();
    format!("| {} |", cells.join(" | "))
}

pub fn fenced_code(code: &str, language: Option<&str>) -> String {
    let body = code.strip_suffix('\n').unwrap_or(code);
    let language = language.map(str::trim).unwrap_or_default();

    let mut fence = "```".to_string();
    while body.contains(fence.as_str()) {
        fence.push('`');
    }
    format!("{fence}{language}\n{body}\n{fence}")
}

fn render_list<S: AsRef<str>>(list: ElementRef<'_>, labels: &[S]) -> String {
    let mut lines = Vec::new();
    push_list_lines(list, labels, "", &mut lines);
    lines.join("\n")
}

fn push_list_lines<S: AsRef<str>>(
    list: ElementRef<'_>,
    labels: &[S],
    indent: &str,
    lines: &mut Vec<String>,
) {
    let ordered = list.value().name() == "ol";

    for (index, item) in list
        .select(&LIST_ITEM_SELECTOR)
        .filter(|item| owning_list(*item, list) == Some(list))
        .enumerate()
    {
        let number = index + 1;
        let text = strip_labels(&visible_text_excluding(item, &LIST_ITEM_SKIP_SELECTOR), labels);
        let prefix = if text.is_empty() {
            String::new()
        } else {
            let prefix = if ordered {
                format!("{number}. ")
            } else {
                "- ".to_string()
            };
            lines.push(format!("{indent}{prefix}{text}"));
            prefix
        };

        let nested_indent = format!("{indent}{}", " ".repeat(prefix.len().max(2)));
        for nested in item
            .select(&LIST_SELECTOR)
            .filter(|nested| owning_list(*nested, list) == Some(list))
        {
            push_list_lines(nested, labels, &nested_indent, lines);
        }
    }
}

pub fn plain_text(segment: ElementRef<'_>, vocabulary: &MarkerVocabulary) -> String {
    let mut fragment = Html::parse_fragment(&segment.html());
    let chrome: Vec<_> = fragment.select(&STRIP_SELECTOR).map(|el| el.id()).collect();
    for id in chrome {
        if let Some(mut node) = fragment.tree.get_mut(id) {
            node.detach();
        }
    }
    strip_labels(&visible_text(fragment.root_element()), &vocabulary.ui_labels())
}

pub fn clamp(value: String, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((cut, _)) => value[..cut].to_string(),
        None => value,
    }
}

fn raw_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

fn is_pre(element: ElementRef<'_>) -> bool {
    element.value().name() == "pre"
}

fn is_list_item(element: ElementRef<'_>) -> bool {
    element.value().name() == "li"
}

fn is_list(element: ElementRef<'_>) -> bool {
    matches!(element.value().name(), "ul" | "ol")
}

fn owning_list<'a>(element: ElementRef<'a>, bound: ElementRef<'a>) -> Option<ElementRef<'a>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take_while(|ancestor| is_within(*ancestor, bound))
        .find(|ancestor| is_list(*ancestor))
}

fn owning_table(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name() == "table")
}

fn inside_other_table(table: ElementRef<'_>, segment: ElementRef<'_>) -> bool {
    owning_table(table).is_some_and(|outer| is_within(outer, segment))
}
