mod parser;
pub mod types;

pub use parser::{
    offset_from_url, parse_next_control, parse_question_links, parse_result_count,
    parse_result_rows, rewrite_offset,
};
pub use types::SearchQuery;

use url::Url;

use crate::parser::ParseError;

pub const SEARCH_URL: &str = "https://www2.assemblee-nationale.fr/recherche/resultats_questions";

/// The next request of a crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRequest {
    /// First page: a form POST against the search endpoint.
    Search(SearchQuery),
    /// Later pages: a GET against the rewritten "next" URL.
    Follow(String),
}

/// Tracks the crawl of one legislature's result pages.
#[derive(Debug, Clone)]
pub struct Paginator {
    query: SearchQuery,
    offset: u32,
    resume_url: Option<String>,
    /// Scheme and host prefixed to relative next-page links.
    host: String,
}

impl Paginator {
    pub fn new(query: SearchQuery) -> Self {
        Self {
            query,
            offset: 0,
            resume_url: None,
            host: crate::SEARCH_HOST.to_string(),
        }
    }

    /// Restarts a crawl from a previously followed "next" URL; the offset is read back from it.
    pub fn resume(query: SearchQuery, url: &str) -> Result<Self, ParseError> {
        let offset = offset_from_url(url)
            .ok_or_else(|| ParseError::UrlParseError(format!("no (offset) segment in {url}")))?;
        Ok(Self {
            query,
            offset,
            resume_url: Some(url.to_string()),
            host: crate::SEARCH_HOST.to_string(),
        })
    }

    /// Follows next-page links on the host serving `search_url` instead of the
    /// public site.
    pub fn with_search_url(mut self, search_url: &str) -> Result<Self, ParseError> {
        let url = Url::parse(search_url)
            .map_err(|e| ParseError::UrlParseError(format!("{search_url}: {e}")))?;
        self.host = url.origin().ascii_serialization();
        Ok(self)
    }

    pub fn legislature(&self) -> u8 {
        self.query.legislature
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn first_request(&self) -> PageRequest {
        match &self.resume_url {
            Some(url) => PageRequest::Follow(url.clone()),
            None => PageRequest::Search(self.query.clone()),
        }
    }

    pub fn links(&self, page_html: &str) -> Vec<String> {
        parse_question_links(page_html, self.query.legislature)
    }

    /// Moves past `page_html`. The offset grows by one page on every call, whether
    /// or not the page's links turned out usable.
    pub fn advance(&mut self, page_html: &str) -> Result<Option<PageRequest>, ParseError> {
        self.offset += self.query.documents_per_page;

        let next = parse_next_control(page_html, self.query.legislature)?;
        Ok(next.map(|href| {
            let href = rewrite_offset(&href, self.offset);
            let url = if href.starts_with("http") {
                href
            } else {
                format!("{}{}", self.host, href)
            };
            PageRequest::Follow(url)
        }))
    }
}
