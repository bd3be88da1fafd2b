use std::fmt::Display;

use crate::legacy::parse_legacy_question;
use crate::modern::parse_modern_question;
use crate::parser::ParseError;
use crate::transitional::parse_transitional_question;
use crate::types::{QuestionEntity, QuestionId, RawQuestion, ValidationError};

/// Last legislature served with the table layout.
pub const LAST_LEGACY_LEGISLATURE: u8 = 13;
/// Last legislature served with the sectioned layout.
pub const LAST_TRANSITIONAL_LEGISLATURE: u8 = 15;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Era {
    Legacy,
    Transitional,
    Modern,
}

impl Era {
    pub fn for_legislature(legislature: u8) -> Era {
        match legislature {
            ..=LAST_LEGACY_LEGISLATURE => Era::Legacy,
            ..=LAST_TRANSITIONAL_LEGISLATURE => Era::Transitional,
            _ => Era::Modern,
        }
    }

    pub fn parser(&self) -> &'static dyn EraParser {
        match self {
            Era::Legacy => &LegacyParser,
            Era::Transitional => &TransitionalParser,
            Era::Modern => &ModernParser,
        }
    }
}

impl Display for Era {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Era::Legacy => write!(f, "legacy"),
            Era::Transitional => write!(f, "transitional"),
            Era::Modern => write!(f, "modern"),
        }
    }
}

pub trait EraParser: Send + Sync {
    fn era(&self) -> Era;

    fn parse(&self, html: &str, id: &QuestionId) -> Result<RawQuestion, ParseError>;
}

pub struct LegacyParser;
pub struct TransitionalParser;
pub struct ModernParser;

impl EraParser for LegacyParser {
    fn era(&self) -> Era {
        Era::Legacy
    }

    fn parse(&self, html: &str, id: &QuestionId) -> Result<RawQuestion, ParseError> {
        parse_legacy_question(html, id)
    }
}

impl EraParser for TransitionalParser {
    fn era(&self) -> Era {
        Era::Transitional
    }

    fn parse(&self, html: &str, id: &QuestionId) -> Result<RawQuestion, ParseError> {
        parse_transitional_question(html, id)
    }
}

impl EraParser for ModernParser {
    fn era(&self) -> Era {
        Era::Modern
    }

    fn parse(&self, html: &str, id: &QuestionId) -> Result<RawQuestion, ParseError> {
        parse_modern_question(html, id)
    }
}

/// Parses a fetched document with the parser of the legislature it was listed under.
pub fn parse_document(
    html: &str,
    id: &QuestionId,
    legislature: u8,
) -> Result<QuestionEntity, DocumentError> {
    let parser = Era::for_legislature(legislature).parser();
    log::debug!("Parsing {} with the {} parser", id, parser.era());
    let raw = parser.parse(html, id)?;
    Ok(QuestionEntity::new(raw)?)
}
