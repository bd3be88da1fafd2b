use scraper::ElementRef;

use crate::utils::normalize_whitespace;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Failed to parse URL: {0}")]
    UrlParseError(String),
    #[error("Missing required field: {0}")]
    MissingField(String),
    #[error("Unsupported page layout: {0}")]
    UnsupportedLayout(String),
    #[error("Next page control is a <{0}> element, not a link")]
    NextControlNotALink(String),
}

pub(crate) fn elem_text(element: ElementRef) -> String {
    normalize_whitespace(&element.text().collect::<String>())
}

/// Text nodes sitting directly under `element`, without its descendants.
pub(crate) fn own_text(element: ElementRef) -> String {
    let text = element
        .children()
        .filter_map(|child| child.value().as_text().map(|t| t.to_string()))
        .collect::<String>();
    normalize_whitespace(&text)
}

pub(crate) fn child_elements<'a>(element: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    element.children().filter_map(ElementRef::wrap)
}

pub(crate) fn child_elements_named<'a>(
    element: ElementRef<'a>,
    name: &'a str,
) -> impl Iterator<Item = ElementRef<'a>> {
    child_elements(element).filter(move |e| e.value().name() == name)
}

pub(crate) fn next_element_sibling(element: ElementRef) -> Option<ElementRef> {
    element.next_siblings().find_map(ElementRef::wrap)
}

/// Some pages leak markup into text cells; only what follows the last `>` is content.
pub(crate) fn strip_leaked_markup(text: &str) -> String {
    match text.rfind('>') {
        Some(idx) => text[idx + 1..].trim().to_string(),
        None => text.trim().to_string(),
    }
}
