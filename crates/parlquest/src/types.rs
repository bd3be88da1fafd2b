use std::fmt::Display;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::utils::{clean_congressman, normalize_optional, normalize_whitespace};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid question id '{0}'. Expected '<legislature>-<sequence><QE|QOSD|QG>'")]
    InvalidId(String),
    #[error("Invalid question type '{0}'. Accepted values: 'QE', 'QOSD', 'QG'")]
    InvalidType(String),
    #[error("Question {id} is recorded as {stored} but its id says {derived}")]
    TypeMismatch {
        id: String,
        stored: QuestionType,
        derived: QuestionType,
    },
}

static RE_QUESTION_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})-(\d+)(QE|QOSD|QG)$").expect("invalid regex: question id")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QuestionType {
    #[serde(rename = "QE")]
    Written,
    #[serde(rename = "QOSD")]
    OralWithoutDebate,
    #[serde(rename = "QG")]
    Government,
}

impl QuestionType {
    pub fn suffix(&self) -> &'static str {
        match self {
            QuestionType::Written => "QE",
            QuestionType::OralWithoutDebate => "QOSD",
            QuestionType::Government => "QG",
        }
    }

    /// Oral questions are answered during a sitting, so one date stands for both
    /// the question and the answer.
    pub fn has_sitting_date(&self) -> bool {
        !matches!(self, QuestionType::Written)
    }
}

impl FromStr for QuestionType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QE" => Ok(QuestionType::Written),
            "QOSD" => Ok(QuestionType::OralWithoutDebate),
            "QG" => Ok(QuestionType::Government),
            _ => Err(ValidationError::InvalidType(s.to_string())),
        }
    }
}

impl Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuestionType::Written => write!(f, "Written question"),
            QuestionType::OralWithoutDebate => write!(f, "Oral question without debate"),
            QuestionType::Government => write!(f, "Question to the government"),
        }
    }
}

/// A validated `<legislature>-<sequence><suffix>` document identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QuestionId {
    raw: String,
    legislature: u8,
    question_type: QuestionType,
}

impl QuestionId {
    pub fn legislature(&self) -> u8 {
        self.legislature
    }

    pub fn question_type(&self) -> QuestionType {
        self.question_type
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Canonical page of the document, e.g. `.../q14/14-78012QE.htm`.
    pub fn document_url(&self) -> String {
        format!("{}/q{}/{}.htm", crate::QUESTIONS_HOST, self.legislature, self.raw)
    }
}

impl FromStr for QuestionId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = RE_QUESTION_ID
            .captures(s)
            .ok_or_else(|| ValidationError::InvalidId(s.to_string()))?;

        let legislature = caps[1]
            .parse::<u8>()
            .map_err(|_| ValidationError::InvalidId(s.to_string()))?;
        let question_type = QuestionType::from_str(&caps[3])?;

        Ok(QuestionId {
            raw: s.to_string(),
            legislature,
            question_type,
        })
    }
}

impl TryFrom<String> for QuestionId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        QuestionId::from_str(&value)
    }
}

impl From<QuestionId> for String {
    fn from(id: QuestionId) -> Self {
        id.raw
    }
}

impl Display for QuestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Fields as lifted from a document page, before normalization and validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawQuestion {
    pub id: String,
    pub congressman: String,
    pub questioned_ministry: String,
    pub responsible_ministry: String,
    pub question_date: Option<NaiveDate>,
    pub response_date: Option<NaiveDate>,
    pub theme: String,
    pub sub_theme: String,
    pub analysis: Option<String>,
    pub question_text: Option<String>,
    pub response_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StoredQuestion {
    #[serde(flatten)]
    fields: RawQuestion,
    question_type: Option<QuestionType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredQuestion")]
pub struct QuestionEntity {
    pub id: QuestionId,
    pub congressman: String,
    pub questioned_ministry: String,
    pub responsible_ministry: String,
    pub question_date: Option<NaiveDate>,
    pub response_date: Option<NaiveDate>,
    pub theme: String,
    pub sub_theme: String,
    pub analysis: Option<String>,
    pub question_text: Option<String>,
    pub response_text: Option<String>,
    question_type: QuestionType,
}

impl QuestionEntity {
    pub fn new(raw: RawQuestion) -> Result<Self, ValidationError> {
        let id = QuestionId::from_str(raw.id.trim())?;
        let question_type = id.question_type();

        Ok(QuestionEntity {
            id,
            congressman: clean_congressman(&raw.congressman),
            questioned_ministry: normalize_whitespace(&raw.questioned_ministry),
            responsible_ministry: normalize_whitespace(&raw.responsible_ministry),
            question_date: raw.question_date,
            response_date: raw.response_date,
            theme: normalize_whitespace(&raw.theme),
            sub_theme: normalize_whitespace(&raw.sub_theme),
            analysis: normalize_optional(raw.analysis.as_deref()),
            question_text: normalize_optional(raw.question_text.as_deref()),
            response_text: normalize_optional(raw.response_text.as_deref()),
            question_type,
        })
    }

    pub fn question_type(&self) -> QuestionType {
        self.question_type
    }
}

impl TryFrom<StoredQuestion> for QuestionEntity {
    type Error = ValidationError;

    fn try_from(stored: StoredQuestion) -> Result<Self, Self::Error> {
        let entity = QuestionEntity::new(stored.fields)?;
        match stored.question_type {
            Some(stored_type) if stored_type != entity.question_type => {
                Err(ValidationError::TypeMismatch {
                    id: entity.id.to_string(),
                    stored: stored_type,
                    derived: entity.question_type,
                })
            }
            _ => Ok(entity),
        }
    }
}

impl Display for QuestionEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "┌─ {} ─ {}", self.id, self.question_type)?;
        writeln!(f, "│  Deputy:      {}", self.congressman)?;
        writeln!(f, "│  Questioned:  {}", self.questioned_ministry)?;
        writeln!(f, "│  Responsible: {}", self.responsible_ministry)?;
        match (self.question_date, self.response_date) {
            (Some(asked), Some(answered)) => {
                writeln!(f, "│  Dates:       {} → {}", asked, answered)?
            }
            (Some(asked), None) => writeln!(f, "│  Asked:       {}", asked)?,
            (None, Some(answered)) => writeln!(f, "│  Answered:    {}", answered)?,
            (None, None) => {}
        }
        writeln!(f, "│  Theme:       {} / {}", self.theme, self.sub_theme)?;
        if let Some(analysis) = &self.analysis {
            writeln!(f, "│  Analysis:    {}", analysis)?;
        }
        if let Some(text) = &self.question_text {
            let preview: String = text.chars().take(160).collect();
            writeln!(f, "│  Question:    {}…", preview)?;
        }
        if let Some(text) = &self.response_text {
            let preview: String = text.chars().take(160).collect();
            writeln!(f, "│  Response:    {}…", preview)?;
        }
        write!(f, "└─")
    }
}

/// Summary of every document filed under one topic across legislatures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionsByTheme {
    pub theme: String,
    pub legislatures: Vec<u8>,
    pub total_number_of_questions: u64,
    pub urls: Vec<String>,
}

impl Display for QuestionsByTheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Theme: {}", self.theme)?;
        let legislatures = self
            .legislatures
            .iter()
            .map(u8::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(f, "  Legislatures: {}", legislatures)?;
        writeln!(f, "  Questions:    {}", self.total_number_of_questions)?;
        for url in &self.urls {
            writeln!(f, "    {}", url)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str) -> RawQuestion {
        RawQuestion {
            id: id.to_string(),
            congressman: "M.Durand Jean".to_string(),
            theme: "Electricité et gaz".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_question_type_from_id() {
        let cases = [
            ("8-53QG", QuestionType::Government),
            ("12-104532QE", QuestionType::Written),
            ("16-1QOSD", QuestionType::OralWithoutDebate),
        ];

        for (id, expected) in cases {
            let parsed = QuestionId::from_str(id).expect("valid id");
            assert_eq!(parsed.question_type(), expected);
            let again = QuestionId::from_str(parsed.as_str()).expect("valid id");
            assert_eq!(again.question_type(), parsed.question_type());
            assert_eq!(again, parsed);
        }
    }

    #[test]
    fn test_question_id_components() {
        let id = QuestionId::from_str("14-00987QE").unwrap();
        assert_eq!(id.legislature(), 14);
        assert_eq!(id.to_string(), "14-00987QE");
        assert_eq!(
            id.document_url(),
            "https://questions.assemblee-nationale.fr/q14/14-00987QE.htm"
        );
    }

    #[test]
    fn test_invalid_question_ids() {
        for id in ["", "8-53", "8-53QX", "123-4QE", "8-QE", "8-53QE.htm", "a8-53QE"] {
            assert!(
                matches!(QuestionId::from_str(id), Err(ValidationError::InvalidId(_))),
                "'{id}' should be rejected"
            );
        }
    }

    #[test]
    fn test_entity_normalizes_fields() {
        let mut fields = raw("9-1200QE");
        fields.question_text = Some("  Le  ministre\u{a0}de\n\tl'intérieur  ".to_string());
        fields.response_text = Some(String::new());
        fields.analysis = Some("   ".to_string());

        let entity = QuestionEntity::new(fields).expect("valid entity");

        assert_eq!(entity.congressman, "Durand Jean");
        assert_eq!(
            entity.question_text.as_deref(),
            Some("Le ministre de l'intérieur")
        );
        assert_eq!(entity.response_text, None);
        assert_eq!(entity.analysis, None);
        assert_eq!(entity.question_type(), QuestionType::Written);
    }

    #[test]
    fn test_entity_without_question_text_is_valid() {
        let entity = QuestionEntity::new(raw("8-53QG")).expect("valid entity");
        assert!(entity.question_text.is_none());
    }

    #[test]
    fn test_entity_rejects_bad_id() {
        let err = QuestionEntity::new(raw("8-53XX")).unwrap_err();
        assert_eq!(err, ValidationError::InvalidId("8-53XX".to_string()));
    }

    #[test]
    fn test_entity_json_round_trip_keeps_type() {
        let entity = QuestionEntity::new(raw("15-4411QOSD")).unwrap();
        let json = serde_json::to_value(&entity).unwrap();

        assert_eq!(json["id"], "15-4411QOSD");
        assert_eq!(json["question_type"], "QOSD");

        let back: QuestionEntity = serde_json::from_value(json).unwrap();
        assert_eq!(back, entity);
    }

    #[test]
    fn test_entity_json_with_contradicting_type_is_rejected() {
        let entity = QuestionEntity::new(raw("15-4411QOSD")).unwrap();
        let mut json = serde_json::to_value(&entity).unwrap();
        json["question_type"] = serde_json::Value::from("QE");

        let err = serde_json::from_value::<QuestionEntity>(json).unwrap_err();
        assert!(err.to_string().contains("15-4411QOSD"));
    }
}
