use std::cmp::Ordering;

use scraper::{ElementRef, Selector};

const BLOCK_TAGS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "br",
    "dd",
    "div",
    "dl",
    "dt",
    "figcaption",
    "figure",
    "footer",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "li",
    "main",
    "nav",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "tbody",
    "td",
    "tfoot",
    "th",
    "thead",
    "tr",
    "ul",
];
const HIDDEN_TAGS: &[&str] = &["script", "style", "template", "noscript"];

pub fn normalize_text(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn text_content(element: ElementRef<'_>) -> String {
    element.text().collect()
}

pub fn normalized_text(element: ElementRef<'_>) -> String {
    normalize_text(&text_content(element))
}

pub fn strip_labels<S: AsRef<str>>(text: &str, labels: &[S]) -> String {
    let mut stripped = text.to_string();
    for label in labels {
        let label = label.as_ref();
        if !label.is_empty() && stripped.contains(label) {
            stripped = stripped.replace(label, "");
        }
    }
    normalize_text(&stripped)
}

/// Text as a reader would see it: block boundaries become separators, hidden content is skipped.
pub fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    push_visible_text(element, None, &mut out);
    normalize_text(&out)
}

/// Like [`visible_text`], but descendants matching `skip` (and their subtrees) are left out.
pub fn visible_text_excluding(element: ElementRef<'_>, skip: &Selector) -> String {
    let mut out = String::new();
    push_visible_text(element, Some(skip), &mut out);
    normalize_text(&out)
}

fn push_visible_text(element: ElementRef<'_>, skip: Option<&Selector>, out: &mut String) {
    let name = element.value().name();
    if HIDDEN_TAGS.contains(&name) {
        return;
    }

    let is_block = BLOCK_TAGS.contains(&name);
    if is_block {
        out.push(' ');
    }

    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            if skip.is_some_and(|selector| selector.matches(&child_element)) {
                continue;
            }
            push_visible_text(child_element, skip, out);
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }

    if is_block {
        out.push(' ');
    }
}

/// Position of the element as sibling indices from the document root.
///
/// Lexicographic comparison of two paths is pre-order (document) order: an ancestor's path is a
/// prefix of its descendants' paths and therefore sorts first.
fn tree_path(element: ElementRef<'_>) -> Vec<usize> {
    let mut path = std::iter::once(*element)
        .chain(element.ancestors())
        .map(|node| node.prev_siblings().count())
        .collect::<Vec<_>>();
    path.reverse();
    path
}

pub fn compare_document_order(a: ElementRef<'_>, b: ElementRef<'_>) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    tree_path(a).cmp(&tree_path(b))
}

pub fn sort_document_order(elements: &mut [ElementRef<'_>]) {
    elements.sort_by_cached_key(|element| tree_path(*element));
}

pub fn dedupe<'a>(elements: Vec<ElementRef<'a>>) -> Vec<ElementRef<'a>> {
    let mut unique: Vec<ElementRef<'a>> = Vec::with_capacity(elements.len());
    for element in elements {
        if !unique.contains(&element) {
            unique.push(element);
        }
    }
    unique
}

pub fn is_within(element: ElementRef<'_>, container: ElementRef<'_>) -> bool {
    element == container
        || element
            .ancestors()
            .any(|ancestor| ancestor.id() == container.id())
}

pub fn parent_element(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.parent().and_then(ElementRef::wrap)
}

pub fn closest<'a>(element: ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    std::iter::once(element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .find(|candidate| selector.matches(candidate))
}

/// Walks from `start` towards the root and returns the first element satisfying `predicate`.
///
/// The walk never leaves `bound`; `bound` itself is a candidate only when `include_bound` is set.
pub fn closest_within<'a, F>(
    start: ElementRef<'a>,
    bound: ElementRef<'a>,
    include_bound: bool,
    predicate: F,
) -> Option<ElementRef<'a>>
where
    F: Fn(ElementRef<'a>) -> bool,
{
    if !is_within(start, bound) {
        return None;
    }

    let mut current = Some(start);
    while let Some(element) = current {
        if element == bound {
            return (include_bound && predicate(element)).then_some(element);
        }
        if predicate(element) {
            return Some(element);
        }
        current = parent_element(element);
    }
    None
}

pub fn has_descendant(element: ElementRef<'_>, selector: &Selector) -> bool {
    element.select(selector).next().is_some()
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use scraper::{Html, Selector};

    use super::{
        closest, closest_within, compare_document_order, dedupe, is_within, normalize_text,
        sort_document_order, strip_labels, visible_text, visible_text_excluding,
    };

    fn select_one<'a>(html: &'a Html, css: &str) -> scraper::ElementRef<'a> {
        let selector = Selector::parse(css).expect("selector");
        html.select(&selector).next().expect("element")
    }

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize_text("  a \n\t b\u{a0}c  "), "a b c");
        assert_eq!(normalize_text(" \n "), "");
    }

    #[test]
    fn strip_labels_removes_vocabulary() {
        let labels = ["Copy prompt", "Show thinking"];
        assert_eq!(strip_labels("Copy prompt Hello  world", &labels), "Hello world");
        assert_eq!(strip_labels("Show thinking", &labels), "");
    }

    #[test]
    fn document_order_is_preorder() {
        let html = Html::parse_document(
            r#"<div id="a"><p id="b"><span id="c"></span></p></div><div id="d"></div>"#,
        );
        let a = select_one(&html, "#a");
        let b = select_one(&html, "#b");
        let c = select_one(&html, "#c");
        let d = select_one(&html, "#d");

        assert_eq!(compare_document_order(a, a), Ordering::Equal);
        assert_eq!(compare_document_order(a, c), Ordering::Less);
        assert_eq!(compare_document_order(c, b), Ordering::Greater);
        assert_eq!(compare_document_order(c, d), Ordering::Less);

        let mut elements = vec![d, c, a, b];
        sort_document_order(&mut elements);
        assert_eq!(elements, vec![a, b, c, d]);
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let html = Html::parse_document(r#"<p id="x"></p><p id="y"></p>"#);
        let x = select_one(&html, "#x");
        let y = select_one(&html, "#y");
        assert_eq!(dedupe(vec![x, y, x, y]), vec![x, y]);
    }

    #[test]
    fn closest_and_containment() {
        let html = Html::parse_document(
            r#"<section id="root"><div class="outer"><div class="inner"><b id="leaf"></b></div></div></section>"#,
        );
        let root = select_one(&html, "#root");
        let leaf = select_one(&html, "#leaf");
        let outer_selector = Selector::parse(".outer").expect("selector");

        let outer = closest(leaf, &outer_selector).expect("outer");
        assert!(is_within(leaf, outer));
        assert!(!is_within(outer, leaf));

        let found = closest_within(leaf, root, false, |el| el.value().name() == "section");
        assert!(found.is_none());
        let found = closest_within(leaf, root, true, |el| el.value().name() == "section");
        assert_eq!(found, Some(root));
    }

    #[test]
    fn visible_text_separates_blocks() {
        let html = Html::parse_document(
            "<div id=\"t\"><p>one</p><p>two<b>three</b></p><script>ignored()</script></div>",
        );
        assert_eq!(visible_text(select_one(&html, "#t")), "one twothree");

        let skip = Selector::parse("b").expect("selector");
        assert_eq!(visible_text_excluding(select_one(&html, "#t"), &skip), "one two");
    }
}
