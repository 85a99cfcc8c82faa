use scraper::Html;

/// Upper bound, in characters, on the text kept from a single page.
pub const MAX_PAGE_CHARS: usize = 1000;

/// Concatenates every text node of `document` in document order, exactly as
/// it appears in the markup. Script and style bodies are text nodes too.
pub fn extract_text(document: &Html) -> String {
    document
        .tree
        .root()
        .descendants()
        .filter_map(|node| node.value().as_text())
        .map(|text| &**text)
        .collect()
}

pub fn extract_html_text(body: &str) -> String {
    extract_text(&Html::parse_document(body))
}

/// Collapses whitespace runs into single spaces and keeps at most
/// [`MAX_PAGE_CHARS`] characters.
pub fn clean_text(input: &str) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.char_indices().nth(MAX_PAGE_CHARS) {
        Some((cut, _)) => collapsed[..cut].to_string(),
        None => collapsed,
    }
}
