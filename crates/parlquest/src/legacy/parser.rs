use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::labels::{Anchor, COMPILED_RULES, LegacyField};
use crate::parser::{ParseError, child_elements_named, elem_text};
use crate::types::{QuestionId, RawQuestion};
use crate::utils::parse_french_date;

static SEL_PRINT_LAYOUT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#printtop").expect("invalid selector: print layout"));
static SEL_TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("invalid selector: table"));
static SEL_ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("invalid selector: row"));

/// Parses the table-based layout used up to the 13th legislature. Each row holds
/// a label cell followed by a value cell; date rows are recognized by their value.
pub fn parse_legacy_question(html: &str, id: &QuestionId) -> Result<RawQuestion, ParseError> {
    let document = Html::parse_document(html);

    if document.select(&SEL_PRINT_LAYOUT).next().is_some() {
        return Err(ParseError::UnsupportedLayout(format!(
            "{id} uses the printable layout"
        )));
    }

    let table = document
        .select(&SEL_TABLE)
        .next()
        .ok_or_else(|| ParseError::MissingField("question table".to_string()))?;

    let mut question = RawQuestion {
        id: id.to_string(),
        ..Default::default()
    };
    let mut debate = None;

    for row in table.select(&SEL_ROW) {
        let mut cells = child_elements_named(row, "td");
        let Some(label_cell) = cells.next() else {
            continue;
        };
        let label = elem_text(label_cell);
        let value_cell = cells.next();
        let value = value_cell.map(elem_text).unwrap_or_default();

        let Some(field) = classify(&label, &value) else {
            continue;
        };

        match field {
            LegacyField::Congressman => set_once(&mut question.congressman, value),
            LegacyField::QuestionedMinistry => set_once(&mut question.questioned_ministry, value),
            LegacyField::ResponsibleMinistry => {
                set_once(&mut question.responsible_ministry, value)
            }
            LegacyField::QuestionDate => {
                question.question_date = question.question_date.or(parse_french_date(&value))
            }
            LegacyField::ResponseDate => {
                question.response_date = question.response_date.or(parse_french_date(&value))
            }
            LegacyField::Theme => set_once(&mut question.theme, value),
            LegacyField::SubTheme => set_once(&mut question.sub_theme, value),
            LegacyField::Analysis => {
                question.analysis = question.analysis.or(Some(value));
            }
            LegacyField::QuestionText => {
                question.question_text = question.question_text.or(Some(value));
            }
            LegacyField::ResponseText => {
                question.response_text = question.response_text.or(Some(value));
            }
            LegacyField::Debate => {
                debate = debate.or(value_cell.map(debate_text));
            }
        }
    }

    if question.question_text.is_none() {
        question.question_text = debate;
    }

    log::debug!("Parsed legacy question {}", id);
    Ok(question)
}

/// Label-anchored rules are tried before value-anchored ones so that a text
/// body quoting a publication notice is not mistaken for a date row.
fn classify(label: &str, value: &str) -> Option<LegacyField> {
    COMPILED_RULES
        .iter()
        .filter(|rule| rule.anchor == Anchor::Label)
        .find(|rule| rule.matches(label))
        .or_else(|| {
            COMPILED_RULES
                .iter()
                .filter(|rule| rule.anchor == Anchor::Value)
                .find(|rule| rule.matches(value))
        })
        .map(|rule| rule.field)
}

fn set_once(slot: &mut String, value: String) {
    if slot.is_empty() {
        *slot = value;
    }
}

/// Debate transcripts are split across paragraphs; they are merged into one text.
fn debate_text(cell: ElementRef) -> String {
    let paragraphs = child_elements_named(cell, "p")
        .map(elem_text)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>();

    if paragraphs.is_empty() {
        elem_text(cell)
    } else {
        paragraphs.join(" ")
    }
}
