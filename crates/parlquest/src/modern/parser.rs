use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use crate::parser::{ParseError, elem_text, next_element_sibling, own_text};
use crate::types::{QuestionId, RawQuestion};
use crate::utils::parse_french_date;

static RE_DEPUTY_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^{}PA\d+$",
        regex::escape(crate::DEPUTIES_URL)
    ))
    .expect("invalid regex: deputy url")
});
static RE_NAME_IN_PARENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)\s*\(.+\)$").expect("invalid regex: name in parens"));

static SEL_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("invalid selector: link"));
static SEL_PARAGRAPH: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p").expect("invalid selector: paragraph"));
static SEL_SPAN: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span").expect("invalid selector: span"));
static SEL_ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a").expect("invalid selector: anchor"));
static SEL_ATTRIBUTAIRE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("p#blocMinistereAttributaire span").expect("invalid selector: attributaire")
});
static SEL_HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h2, h3, h4").expect("invalid selector: heading"));
static SEL_SMALL_PARAGRAPH: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p._pa-small").expect("invalid selector: small paragraph"));

/// Parses the label-anchored layout introduced with the 16th legislature.
pub fn parse_modern_question(html: &str, id: &QuestionId) -> Result<RawQuestion, ParseError> {
    let document = Html::parse_document(html);

    let congressman = find_congressman(&document)
        .ok_or_else(|| ParseError::MissingField("congressman".to_string()))?;
    let theme = labelled_value(&document, "Rubrique :")
        .ok_or_else(|| ParseError::MissingField("Rubrique".to_string()))?;
    let responsible_ministry = document
        .select(&SEL_ATTRIBUTAIRE)
        .next()
        .map(elem_text)
        .ok_or_else(|| ParseError::MissingField("blocMinistereAttributaire".to_string()))?;

    let (question_date, response_date) = if id.question_type().has_sitting_date() {
        let sitting = labelled_value(&document, "Date de la séance :")
            .ok_or_else(|| ParseError::MissingField("Date de la séance".to_string()))?;
        let date = parse_french_date(&sitting);
        (date, date)
    } else {
        (
            publication_date(&document, "Question publiée le"),
            publication_date(&document, "Réponse publiée le"),
        )
    };

    let (question_text, response_text) = match section_text(&document, "texte de la question") {
        Some(question) => (
            Some(question),
            section_text(&document, "texte de la réponse"),
        ),
        // Without headings the answer paragraph comes first on the page.
        None => {
            let mut texts = document
                .select(&SEL_SMALL_PARAGRAPH)
                .map(elem_text)
                .filter(|t| !t.is_empty());
            match (texts.next(), texts.next()) {
                (Some(answer), Some(question)) => (Some(question), Some(answer)),
                (only, _) => (only, None),
            }
        }
    };

    log::debug!("Parsed modern question {}", id);
    Ok(RawQuestion {
        id: id.to_string(),
        congressman,
        questioned_ministry: labelled_value(&document, "Ministère interrogé :").unwrap_or_default(),
        responsible_ministry,
        question_date,
        response_date,
        theme,
        sub_theme: labelled_value(&document, "Titre :").unwrap_or_default(),
        analysis: labelled_value(&document, "Analyse :"),
        question_text,
        response_text,
    })
}

fn find_congressman(document: &Html) -> Option<String> {
    let link = document.select(&SEL_LINK).find(|a| {
        a.value()
            .attr("href")
            .is_some_and(|href| RE_DEPUTY_URL.is_match(href.trim()))
    })?;
    let text = elem_text(link);

    match RE_NAME_IN_PARENS.captures(&text) {
        Some(caps) => Some(caps[1].to_string()),
        None => Some(text),
    }
}

/// Value of a `<p>Label : <span>value</span></p>` pair.
fn labelled_value(document: &Html, label: &str) -> Option<String> {
    document
        .select(&SEL_PARAGRAPH)
        .find(|p| own_text(*p).contains(label))
        .map(|p| match p.select(&SEL_SPAN).next() {
            Some(span) => elem_text(span),
            None => own_text(p).replace(label, "").trim().to_string(),
        })
}

fn publication_date(document: &Html, label: &str) -> Option<chrono::NaiveDate> {
    let span = document
        .select(&SEL_SPAN)
        .find(|span| own_text(*span).contains(label))?;

    match span.select(&SEL_ANCHOR).next() {
        Some(a) => parse_french_date(&elem_text(a)),
        None => parse_french_date(&elem_text(span)),
    }
}

fn section_text(document: &Html, heading: &str) -> Option<String> {
    document
        .select(&SEL_HEADING)
        .find(|h| elem_text(*h).to_lowercase().contains(heading))
        .and_then(next_element_sibling)
        .map(elem_text)
        .filter(|t| !t.is_empty())
}
