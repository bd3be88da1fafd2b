use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::parser::{ParseError, elem_text, own_text};

static RE_QUESTION_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://questions\.assemblee-nationale\.fr/q(\d{1,2})/(\d{1,2})-\d+(?:QE|QG|QOSD)\.html?$")
        .expect("invalid regex: question link")
});
static RE_NEXT_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^suivant[\s»>]*$").expect("invalid regex: next label"));
static RE_OFFSET_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(offset\)/(\d+)/\(query\)").expect("invalid regex: offset segment")
});

static SEL_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("invalid selector: link"));
static SEL_ANY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body *").expect("invalid selector: any element"));
static SEL_RESULT_COUNT: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("#resultats-questions > p > strong").expect("invalid selector: result count")
});
static SEL_RESULT_ROW: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("#resultats-questions > table > tbody > tr")
        .expect("invalid selector: result row")
});
static SEL_ROW_LINK: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("td:nth-child(1) > a[href]").expect("invalid selector: row link")
});

/// Document links of `legislature` on a result page, in page order, without repeats.
pub fn parse_question_links(html: &str, legislature: u8) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();

    document
        .select(&SEL_LINK)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| {
            RE_QUESTION_LINK.captures(href).is_some_and(|caps| {
                caps[1].parse::<u8>().ok() == Some(legislature)
                    && caps[2].parse::<u8>().ok() == Some(legislature)
            })
        })
        .filter(|href| seen.insert(href.to_string()))
        .map(str::to_string)
        .collect()
}

/// Locates the "Suivant" control. `Ok(None)` means the page is the last one.
///
/// Links labelled "Suivant" that point outside the legislature's result list are
/// ignored. A "Suivant" label with no enclosing link (plain text, a disabled
/// `span`, an `<a>` without `href`) means the template changed.
pub fn parse_next_control(html: &str, legislature: u8) -> Result<Option<String>, ParseError> {
    let document = Html::parse_document(html);
    let marker = format!("/recherche/resultats_questions/{legislature}/(offset)");
    let mut unlinked = None;

    for label in document
        .select(&SEL_ANY)
        .filter(|e| RE_NEXT_LABEL.is_match(&own_text(*e)))
    {
        let control = std::iter::once(label)
            .chain(label.ancestors().filter_map(ElementRef::wrap))
            .find(|e| e.value().name() == "a");

        match control.and_then(|a| a.value().attr("href")) {
            Some(href) if href.contains(&marker) => return Ok(Some(href.trim().to_string())),
            Some(href) => log::debug!("Ignoring \"Suivant\" link to {}", href),
            None => {
                let name = control.unwrap_or(label).value().name().to_string();
                unlinked.get_or_insert(name);
            }
        }
    }

    match unlinked {
        Some(name) => Err(ParseError::NextControlNotALink(name)),
        None => Ok(None),
    }
}

pub fn rewrite_offset(href: &str, offset: u32) -> String {
    RE_OFFSET_SEGMENT
        .replace(href, format!("(offset)/{offset}/(query)").as_str())
        .into_owned()
}

pub fn offset_from_url(url: &str) -> Option<u32> {
    RE_OFFSET_SEGMENT
        .captures(url)
        .and_then(|caps| caps[1].parse().ok())
}

/// Total hit count printed above the result table, if the search matched anything.
pub fn parse_result_count(html: &str) -> Option<u64> {
    let document = Html::parse_document(html);
    document
        .select(&SEL_RESULT_COUNT)
        .next()
        .map(elem_text)
        .and_then(|text| text.replace(' ', "").parse().ok())
}

pub fn parse_result_rows(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&SEL_RESULT_ROW)
        .filter_map(|row| row.select(&SEL_ROW_LINK).next())
        .filter_map(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string())
        .collect()
}
