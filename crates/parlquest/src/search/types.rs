use std::fmt::Display;

/// Body of the form-encoded POST that opens a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub legislature: u8,
    pub documents_per_page: u32,
    /// `rubrique` filter; empty means every topic.
    pub theme: Option<String>,
}

const DOCUMENT_TYPES: [&str; 3] = ["qe", "qg", "qosd"];
const REPLY_STATES: [&str; 2] = ["ar", "sr"];
const REMOVED_STATES: [&str; 2] = ["0", "1"];
const BLANK_FIELDS: [&str; 18] = [
    "q",
    "id_auteur",
    "departement",
    "groupePolitique",
    "ministereInterroge",
    "ministereAttributaire",
    "causeCloture",
    "numDocument",
    "typeDate",
    "typeDate_start",
    "typeDate_end",
    "typeDate_exact",
    "criteres[0][field]",
    "criteres[0][value]",
    "criteres[1][field]",
    "criteres[1][value]",
    "criteres[2][field]",
    "criteres[2][value]",
];

impl SearchQuery {
    pub fn new(legislature: u8, documents_per_page: u32) -> Self {
        Self {
            legislature,
            documents_per_page,
            theme: None,
        }
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("legislature", self.legislature.to_string())];

        fields.extend(DOCUMENT_TYPES.iter().map(|t| ("ssTypeDocument[]", t.to_string())));
        fields.extend(REPLY_STATES.iter().map(|r| ("replies[]", r.to_string())));
        fields.extend(REMOVED_STATES.iter().map(|r| ("removed[]", r.to_string())));
        fields.push(("q_in", "0".to_string()));
        fields.extend(BLANK_FIELDS.iter().map(|f| (*f, String::new())));
        fields.push(("rubrique", self.theme.clone().unwrap_or_default()));
        fields.push(("sort_by", "ssTypeDocument".to_string()));
        fields.push(("sort_order", "asc".to_string()));
        fields.push(("limit", self.documents_per_page.to_string()));

        fields
    }

    pub fn encode(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.form_fields())
            .finish()
    }
}

impl Display for SearchQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "legislature {} ({} per page",
            self.legislature, self.documents_per_page
        )?;
        if let Some(theme) = &self.theme {
            write!(f, ", rubrique '{}'", theme)?;
        }
        write!(f, ")")
    }
}
