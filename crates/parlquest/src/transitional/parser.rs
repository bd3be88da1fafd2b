use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::parser::{ParseError, child_elements_named, elem_text, strip_leaked_markup};
use crate::types::{QuestionId, RawQuestion};
use crate::utils::parse_french_date;

static SEL_HEADER: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("section.question_header").expect("invalid selector: header")
});
static SEL_DEPUTY_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span a").expect("invalid selector: deputy link"));
static SEL_INFO: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("section.question_info").expect("invalid selector: info"));
static SEL_MINISTRIES: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.ministere").expect("invalid selector: ministries"));
static SEL_ANALYSIS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.analyse_header").expect("invalid selector: analysis header")
});
static SEL_PUBLISH_DATES: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.question_publish_date").expect("invalid selector: publish dates")
});
static SEL_BIG_CONTENT: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("span.question_big_content").expect("invalid selector: big content")
});
static SEL_ANSWER: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("section.question_answer").expect("invalid selector: answer")
});
static SEL_PARAGRAPH: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p").expect("invalid selector: paragraph"));
static SEL_RESPONSE_BODY: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.reponse_contenu").expect("invalid selector: response body")
});

/// Parses the sectioned layout of the 14th and 15th legislatures.
pub fn parse_transitional_question(
    html: &str,
    id: &QuestionId,
) -> Result<RawQuestion, ParseError> {
    let document = Html::parse_document(html);

    let header = document
        .select(&SEL_HEADER)
        .next()
        .ok_or_else(|| ParseError::MissingField("question_header section".to_string()))?;
    let congressman = header
        .select(&SEL_DEPUTY_LINK)
        .next()
        .map(elem_text)
        .ok_or_else(|| ParseError::MissingField("congressman".to_string()))?;

    let info = document
        .select(&SEL_INFO)
        .next()
        .ok_or_else(|| ParseError::MissingField("question_info section".to_string()))?;

    let ministries = info
        .select(&SEL_MINISTRIES)
        .next()
        .ok_or_else(|| ParseError::MissingField("ministere block".to_string()))?;
    let ministries = child_texts(ministries, |div| Some(cleaned_text(div)));

    let analysis_header = info
        .select(&SEL_ANALYSIS)
        .next()
        .ok_or_else(|| ParseError::MissingField("analyse_header block".to_string()))?;
    let mut topics = child_texts(analysis_header, |div| {
        div.select(&SEL_PARAGRAPH).next().map(cleaned_text)
    })
    .into_iter();

    let mut question = RawQuestion {
        id: id.to_string(),
        congressman,
        questioned_ministry: ministries.first().cloned().unwrap_or_default(),
        responsible_ministry: ministries.get(1).cloned().unwrap_or_default(),
        theme: topics.next().unwrap_or_default(),
        sub_theme: topics.next().unwrap_or_default(),
        analysis: topics.next(),
        ..Default::default()
    };

    if let Some(dates) = info.select(&SEL_PUBLISH_DATES).next() {
        for block in child_elements_named(dates, "div") {
            let label = elem_text(block);
            let date = block
                .select(&SEL_BIG_CONTENT)
                .next()
                .and_then(|span| parse_french_date(&elem_text(span)));

            if label.contains("Question publiée au JO") {
                question.question_date = question.question_date.or(date);
            } else if label.contains("Réponse publiée au JO") {
                question.response_date = question.response_date.or(date);
            }
        }
    }

    if let Some(answer) = document.select(&SEL_ANSWER).next() {
        let mut blocks = child_elements_named(answer, "div");
        question.question_text = blocks
            .next()
            .and_then(|div| div.select(&SEL_PARAGRAPH).next())
            .map(cleaned_text);
        question.response_text = blocks
            .next()
            .and_then(|div| div.select(&SEL_RESPONSE_BODY).next())
            .map(cleaned_text);
    }

    log::debug!("Parsed transitional question {}", id);
    Ok(question)
}

fn cleaned_text(element: ElementRef) -> String {
    strip_leaked_markup(&elem_text(element))
}

fn child_texts<F>(parent: ElementRef, text_of: F) -> Vec<String>
where
    F: Fn(ElementRef) -> Option<String>,
{
    child_elements_named(parent, "div")
        .filter_map(text_of)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;
    use std::str::FromStr;

    fn parse_fixture(path: &str, id: &str) -> Result<RawQuestion, ParseError> {
        let html = fs::read_to_string(path).expect("Failed to read sample file");
        let id = QuestionId::from_str(id).unwrap();
        parse_transitional_question(&html, &id)
    }

    #[test]
    fn test_parse_transitional_written_question() {
        let raw = parse_fixture("fixtures/transitional/14-78012QE.htm", "14-78012QE")
            .expect("Failed to parse transitional question");

        assert_eq!(raw.congressman, "M. Pierre Lefebvre");
        assert_eq!(raw.questioned_ministry, "Agriculture, agroalimentaire et forêt");
        assert_eq!(raw.responsible_ministry, "Agriculture, agroalimentaire et forêt");
        assert_eq!(raw.theme, "agriculture");
        assert_eq!(raw.sub_theme, "aides");
        assert_eq!(raw.analysis.as_deref(), Some("jeunes agriculteurs. installation."));
        assert_eq!(raw.question_date, NaiveDate::from_ymd_opt(2015, 4, 21));
        assert_eq!(raw.response_date, NaiveDate::from_ymd_opt(2015, 9, 1));
        assert!(
            raw.question_text
                .as_deref()
                .is_some_and(|t| t.starts_with("M. Pierre Lefebvre attire"))
        );
        assert_eq!(
            raw.response_text.as_deref(),
            Some("Le dispositif d'aide à l'installation a été renforcé.")
        );
    }

    #[test]
    fn test_dates_are_matched_by_label_not_position() {
        let raw = parse_fixture(
            "fixtures/transitional/14-81234QE-reversed-dates.htm",
            "14-81234QE",
        )
        .expect("Failed to parse transitional question");

        assert_eq!(raw.question_date, NaiveDate::from_ymd_opt(2015, 4, 21));
        assert_eq!(raw.response_date, NaiveDate::from_ymd_opt(2015, 9, 1));
    }

    #[test]
    fn test_parse_transitional_unanswered_question() {
        let raw = parse_fixture("fixtures/transitional/15-2044QE-unanswered.htm", "15-2044QE")
            .expect("Failed to parse transitional question");

        assert_eq!(raw.analysis, None);
        assert_eq!(raw.response_date, None);
        assert_eq!(raw.response_text, None);
        assert_eq!(raw.question_date, NaiveDate::from_ymd_opt(2017, 10, 3));
    }

    #[test]
    fn test_missing_header_is_structural_error() {
        let html = "<html><body><section class=\"question_info\"></section></body></html>";
        let id = QuestionId::from_str("14-1QE").unwrap();
        assert!(matches!(
            parse_transitional_question(html, &id),
            Err(ParseError::MissingField(_))
        ));
    }
}
