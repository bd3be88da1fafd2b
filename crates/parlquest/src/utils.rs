use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;

static RE_NUMERIC_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})/(\d{1,2})/(\d{4})").expect("invalid regex: numeric date")
});
static RE_FRENCH_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?:er)?\s+(\p{L}+)\s+(\d{4})\b").expect("invalid regex: french date")
});
static RE_TITLE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:de\s*)?(?:M\.|Mme\.?|Mlle\.?|M\s)\s*").expect("invalid regex: title prefix")
});
static RE_TRAILING_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^)]*\)?\s*$").expect("invalid regex: trailing group"));
static RE_DOCUMENT_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2}-\d+(?:QE|QG|QOSD))\.html?$").expect("invalid regex: document id")
});

/// Collapses whitespace runs into single spaces. `char::is_whitespace` covers
/// U+00A0 and U+202F, which the pages use around colons.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn normalize_optional(text: Option<&str>) -> Option<String> {
    text.map(normalize_whitespace).filter(|t| !t.is_empty())
}

/// Strips civil titles and the trailing "(group - constituency)" from a deputy name.
pub fn clean_congressman(name: &str) -> String {
    let name = normalize_whitespace(name);
    let name = RE_TRAILING_GROUP.replace(&name, "");
    let name = RE_TITLE_PREFIX.replace(&name, "");
    name.trim().to_string()
}

/// Reads either `dd/mm/yyyy` or the long French form (`5 décembre 2017`, `1er mars 1990`).
pub fn parse_french_date(text: &str) -> Option<NaiveDate> {
    if let Some(caps) = RE_NUMERIC_DATE.captures(text) {
        let day = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let year = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    let caps = RE_FRENCH_DATE.captures(text)?;
    let day = caps[1].parse().ok()?;
    let month = parse_month(&caps[2])?;
    let year = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_month(month: &str) -> Option<u32> {
    match month.to_lowercase().as_str() {
        "janvier" => Some(1),
        "février" | "fevrier" => Some(2),
        "mars" => Some(3),
        "avril" => Some(4),
        "mai" => Some(5),
        "juin" => Some(6),
        "juillet" => Some(7),
        "août" | "aout" => Some(8),
        "septembre" => Some(9),
        "octobre" => Some(10),
        "novembre" => Some(11),
        "décembre" | "decembre" => Some(12),
        _ => None,
    }
}

/// Pulls `8-53QG` out of `.../q8/8-53QG.htm`.
pub fn extract_question_id(link: &str) -> Option<&str> {
    RE_DOCUMENT_ID
        .captures(link)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[derive(Debug, Clone)]
pub struct HarvestRequest {
    pub legislature: u8,
    pub documents_per_page: u32,
    pub resume_url: Option<String>,
    pub theme: Option<String>,
}

impl HarvestRequest {
    pub fn new(legislature: u8, documents_per_page: u32) -> Self {
        Self {
            legislature,
            documents_per_page,
            resume_url: None,
            theme: None,
        }
    }

    pub fn validate(self) -> Result<Self, String> {
        if self.legislature == 0 || self.legislature > 99 {
            return Err(format!(
                "Legislature must be between 1 and 99, got {}",
                self.legislature
            ));
        }
        if self.documents_per_page == 0 {
            return Err("Documents per page must be greater than 0".to_string());
        }
        if let Some(url) = &self.resume_url
            && crate::search::offset_from_url(url).is_none()
        {
            return Err(format!("Resume URL has no (offset) segment: {url}"));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum CrawlEnd {
    /// The last page had no next-page control.
    Exhausted,
    Aborted(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct HarvestStats {
    pub legislature: u8,
    pub pages: usize,
    pub links: usize,
    pub harvested: usize,
    pub already_harvested: usize,
    pub failed: usize,
    pub offset: u32,
    pub end: CrawlEnd,
}

impl HarvestStats {
    pub fn new(legislature: u8) -> Self {
        Self {
            legislature,
            pages: 0,
            links: 0,
            harvested: 0,
            already_harvested: 0,
            failed: 0,
            offset: 0,
            end: CrawlEnd::Exhausted,
        }
    }
}

impl std::fmt::Display for HarvestStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\nLegislature {}:", self.legislature)?;
        writeln!(f, "  Result pages:      {}", self.pages)?;
        writeln!(f, "  Document links:    {}", self.links)?;
        writeln!(f, "  Harvested:         {}", self.harvested)?;
        writeln!(f, "  Already harvested: {}", self.already_harvested)?;
        writeln!(f, "  Failed:            {}", self.failed)?;
        writeln!(f, "  Last offset:       {}", self.offset)?;
        match &self.end {
            CrawlEnd::Exhausted => writeln!(f, "  Crawl:             completed"),
            CrawlEnd::Aborted(reason) => writeln!(f, "  Crawl:             aborted ({reason})"),
        }
    }
}
