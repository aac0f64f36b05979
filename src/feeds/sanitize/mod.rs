
use fancy_regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use url::Url;

static UNWANTED_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("script, style, iframe, nav, footer, img").expect("valid selector")
});

static NON_WORD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s\x{4e00}-\x{9fff}]").expect("valid regex"));

/// Reduce an HTML fragment to plain text of at most `max_chars` characters.
///
/// Scripts, styles, embedded frames, navigation, footers and images are
/// dropped along with their text; remaining whitespace is collapsed.
#[inline]
pub fn clean_html(html: &str, max_chars: usize) -> String {
    if html.trim().is_empty() {
        return String::new();
    }

    let mut fragment = Html::parse_fragment(html);
    remove_unwanted_elements(&mut fragment);

    let text: String = fragment
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ");

    truncate_chars(&collapse_whitespace(&text), max_chars)
}

/// Keep word characters, whitespace and CJK ideographs; everything else becomes a space
#[inline]
pub fn clean_text(text: &str) -> String {
    collapse_whitespace(&NON_WORD_REGEX.replace_all(text, " "))
}

#[inline]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate on a character boundary
#[inline]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Host of a URL without a leading `www.`, if it has one
#[inline]
pub fn host_name(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    (!host.is_empty()).then(|| host.to_string())
}

fn remove_unwanted_elements(document: &mut Html) {
    let unwanted_node_ids: Vec<_> = document
        .select(&UNWANTED_SELECTOR)
        .map(|element| element.id())
        .collect();

    for node_id in unwanted_node_ids {
        if let Some(mut node) = document.tree.get_mut(node_id) {
            node.detach();
        }
    }
}
