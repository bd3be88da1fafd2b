use std::sync::LazyLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyField {
    Congressman,
    QuestionedMinistry,
    ResponsibleMinistry,
    QuestionDate,
    ResponseDate,
    Theme,
    SubTheme,
    Analysis,
    QuestionText,
    ResponseText,
    /// Oral questions print the exchange as one debate transcript.
    Debate,
}

/// Which cell of a row carries the marker text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Label,
    Value,
}

#[derive(Debug)]
pub struct LabelRule {
    pub field: LegacyField,
    pub anchor: Anchor,
    pub spellings: &'static [&'static str],
}

/// Rules are tried in order and the first match wins. Every non-ASCII character
/// of a spelling stands for one or two arbitrary characters, so mis-decoded
/// accents ("MinistÃ¨re") and stripped ones ("Ministere") both match.
pub const LABEL_RULES: &[LabelRule] = &[
    LabelRule {
        field: LegacyField::Congressman,
        anchor: Anchor::Label,
        spellings: &["Question N°", "Question N"],
    },
    LabelRule {
        field: LegacyField::QuestionedMinistry,
        anchor: Anchor::Label,
        spellings: &["Ministère interrogé"],
    },
    LabelRule {
        field: LegacyField::ResponsibleMinistry,
        anchor: Anchor::Label,
        spellings: &["Ministère attributaire"],
    },
    LabelRule {
        field: LegacyField::QuestionDate,
        anchor: Anchor::Value,
        spellings: &["Question publiée au", "Question publiée le"],
    },
    LabelRule {
        field: LegacyField::ResponseDate,
        anchor: Anchor::Value,
        spellings: &["Réponse publiée au", "Réponse publiée le"],
    },
    LabelRule {
        field: LegacyField::Theme,
        anchor: Anchor::Label,
        spellings: &["Rubrique"],
    },
    LabelRule {
        field: LegacyField::SubTheme,
        anchor: Anchor::Label,
        spellings: &["Tête d'analyse"],
    },
    LabelRule {
        field: LegacyField::Analysis,
        anchor: Anchor::Label,
        spellings: &["Analyse :", "Analyse:"],
    },
    LabelRule {
        field: LegacyField::QuestionText,
        anchor: Anchor::Label,
        spellings: &["Texte de la QUESTION", "Texte de la question"],
    },
    LabelRule {
        field: LegacyField::ResponseText,
        anchor: Anchor::Label,
        spellings: &["Texte de la RÉPONSE", "Texte de la réponse"],
    },
    LabelRule {
        field: LegacyField::Debate,
        anchor: Anchor::Label,
        spellings: &["DÉBAT"],
    },
];

pub(crate) struct CompiledRule {
    pub field: LegacyField,
    pub anchor: Anchor,
    pattern: Regex,
}

impl CompiledRule {
    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

pub(crate) static COMPILED_RULES: LazyLock<Vec<CompiledRule>> = LazyLock::new(|| {
    LABEL_RULES
        .iter()
        .map(|rule| CompiledRule {
            field: rule.field,
            anchor: rule.anchor,
            pattern: Regex::new(&spellings_pattern(rule.spellings))
                .expect("invalid regex: legacy label"),
        })
        .collect()
});

fn spellings_pattern(spellings: &[&str]) -> String {
    spellings
        .iter()
        .map(|spelling| tolerant_pattern(spelling))
        .collect::<Vec<_>>()
        .join("|")
}

fn tolerant_pattern(spelling: &str) -> String {
    let mut pattern = String::new();
    for c in spelling.chars() {
        match c {
            '\'' | '’' => pattern.push_str("['’]"),
            ' ' => pattern.push_str(r"\s+"),
            ':' => pattern.push_str(r"\s*:"),
            c if c.is_ascii() => pattern.push_str(&regex::escape(&c.to_string())),
            _ => pattern.push_str(".{1,2}"),
        }
    }
    format!("(?:{pattern})")
}
