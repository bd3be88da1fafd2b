use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::dispatch::{DocumentError, parse_document};
use crate::export::{ExportError, Exporter};
use crate::parser::ParseError;
use crate::scraper::{Fetch, ScraperError};
use crate::search::{PageRequest, Paginator, SearchQuery, parse_result_count, parse_result_rows};
use crate::store::{Store, StoreError};
use crate::types::{QuestionId, QuestionsByTheme, ValidationError};
use crate::utils::{CrawlEnd, HarvestRequest, HarvestStats, extract_question_id};

/// Legislatures queried when summarizing a topic.
pub const THEME_LEGISLATURES: RangeInclusive<u8> = 7..=15;

#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error(transparent)]
    Scraper(#[from] ScraperError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("Invalid harvest request: {0}")]
    InvalidRequest(String),
}

enum DocumentOutcome {
    Harvested,
    AlreadyHarvested,
}

/// Drives result-page crawls and feeds every new document to the exporter.
///
/// The store only answers the dedup question; documents reach it when the
/// exporter writes there.
pub struct Harvester<'a> {
    fetcher: &'a dyn Fetch,
    store: &'a dyn Store,
    exporter: &'a dyn Exporter,
    search_url: String,
}

impl<'a> Harvester<'a> {
    pub fn new(
        fetcher: &'a dyn Fetch,
        store: &'a dyn Store,
        exporter: &'a dyn Exporter,
        search_url: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            store,
            exporter,
            search_url: search_url.into(),
        }
    }

    /// Crawls one legislature until its last result page, or until a page
    /// cannot be fetched or its next-page control is broken. Only an invalid
    /// request or search URL is returned as an error; everything else ends up
    /// in the stats.
    pub async fn harvest(&self, request: HarvestRequest) -> Result<HarvestStats, HarvestError> {
        let request = request.validate().map_err(HarvestError::InvalidRequest)?;
        let legislature = request.legislature;

        let mut query = SearchQuery::new(legislature, request.documents_per_page);
        if let Some(theme) = request.theme {
            query = query.with_theme(theme);
        }
        let mut paginator = match &request.resume_url {
            Some(url) => Paginator::resume(query, url)?,
            None => Paginator::new(query),
        }
        .with_search_url(&self.search_url)?;

        let mut stats = HarvestStats::new(legislature);
        stats.offset = paginator.offset();
        let mut next = paginator.first_request();

        loop {
            let page = match self.fetch_page(&next).await {
                Ok(page) => page,
                Err(e) => {
                    log::error!("Legislature {}: result page failed: {}", legislature, e);
                    stats.end = CrawlEnd::Aborted(e.to_string());
                    break;
                }
            };
            stats.pages += 1;

            let links = paginator.links(&page);
            log::info!(
                "Legislature {}: page {} at offset {} lists {} documents",
                legislature,
                stats.pages,
                paginator.offset(),
                links.len()
            );
            stats.links += links.len();

            for link in &links {
                match self.harvest_document(link, legislature).await {
                    Ok(DocumentOutcome::Harvested) => stats.harvested += 1,
                    Ok(DocumentOutcome::AlreadyHarvested) => stats.already_harvested += 1,
                    Err(e) => {
                        log::warn!("Skipping {}: {}", link, e);
                        stats.failed += 1;
                    }
                }
            }

            let advanced = paginator.advance(&page);
            stats.offset = paginator.offset();
            match advanced {
                Ok(Some(request)) => next = request,
                Ok(None) => {
                    log::info!("Legislature {}: no further result pages", legislature);
                    stats.end = CrawlEnd::Exhausted;
                    break;
                }
                Err(e) => {
                    log::error!("Legislature {}: {}", legislature, e);
                    stats.end = CrawlEnd::Aborted(e.to_string());
                    break;
                }
            }
        }

        Ok(stats)
    }

    /// Crawls each legislature in turn. A failing legislature never stops the others.
    pub async fn harvest_range(
        &self,
        legislatures: RangeInclusive<u8>,
        documents_per_page: u32,
    ) -> Vec<HarvestStats> {
        let mut all = Vec::new();
        for legislature in legislatures {
            let request = HarvestRequest::new(legislature, documents_per_page);
            let stats = self.harvest(request).await.unwrap_or_else(|e| {
                log::error!("Legislature {}: {}", legislature, e);
                let mut stats = HarvestStats::new(legislature);
                stats.end = CrawlEnd::Aborted(e.to_string());
                stats
            });
            all.push(stats);
        }
        all
    }

    /// Counts the documents filed under `theme` in each legislature and keeps up to
    /// `per_legislature` URLs of documents that carry a question text.
    pub async fn questions_by_theme(
        &self,
        theme: &str,
        per_legislature: usize,
        documents_per_page: u32,
    ) -> QuestionsByTheme {
        let mut summary = QuestionsByTheme {
            theme: theme.to_string(),
            ..Default::default()
        };

        for legislature in THEME_LEGISLATURES {
            let query = SearchQuery::new(legislature, documents_per_page).with_theme(theme);
            let page = match self.fetch_page(&PageRequest::Search(query)).await {
                Ok(page) => page,
                Err(e) => {
                    log::warn!("Legislature {}: theme search failed: {}", legislature, e);
                    continue;
                }
            };

            let count = parse_result_count(&page).unwrap_or(0);
            if count == 0 {
                continue;
            }
            log::info!("Legislature {}: {} questions under {}", legislature, count, theme);
            summary.legislatures.push(legislature);
            summary.total_number_of_questions += count;

            let mut kept = 0;
            for url in parse_result_rows(&page) {
                if kept == per_legislature {
                    break;
                }
                match self.has_question_text(&url, legislature).await {
                    Ok(true) => {
                        summary.urls.push(url);
                        kept += 1;
                    }
                    Ok(false) => log::debug!("No question text in {}", url),
                    Err(e) => log::warn!("Skipping {}: {}", url, e),
                }
            }
        }

        summary
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<String, ScraperError> {
        match request {
            PageRequest::Search(query) => {
                log::debug!("Searching {}", query);
                self.fetcher.post_form(&self.search_url, query.encode()).await
            }
            PageRequest::Follow(url) => self.fetcher.get(url).await,
        }
    }

    async fn harvest_document(
        &self,
        link: &str,
        legislature: u8,
    ) -> Result<DocumentOutcome, HarvestError> {
        let id = document_id(link)?;
        if self.store.exists(&id)? {
            log::debug!("{} already harvested", id);
            return Ok(DocumentOutcome::AlreadyHarvested);
        }

        let html = self.fetcher.get(link).await?;
        let question = parse_document(&html, &id, legislature)?;
        self.exporter.export(&question)?;
        log::debug!("Harvested {}", id);
        Ok(DocumentOutcome::Harvested)
    }

    async fn has_question_text(&self, link: &str, legislature: u8) -> Result<bool, HarvestError> {
        let id = document_id(link)?;
        let html = self.fetcher.get(link).await?;
        let question = parse_document(&html, &id, legislature)?;
        Ok(question.question_text.is_some())
    }
}

fn document_id(link: &str) -> Result<QuestionId, HarvestError> {
    let raw = extract_question_id(link)
        .ok_or_else(|| ParseError::UrlParseError(format!("no document id in {link}")))?;
    Ok(QuestionId::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::StoreExporter;
    use crate::scraper::testing::FixtureFetcher;
    use crate::search::SEARCH_URL;
    use crate::store::MemoryStore;

    const NEXT_PAGE: &str = "https://www2.assemblee-nationale.fr/recherche/resultats_questions/14/(offset)/100/(query)/eyJsZWdpc2xhdHVyZSI6MTR9";
    const WRITTEN: &str = "https://questions.assemblee-nationale.fr/q14/14-78012QE.htm";
    const LAST_PAGE_DOC: &str = "https://questions.assemblee-nationale.fr/q14/14-90001QE.htm";

    fn crawl_fetcher() -> FixtureFetcher {
        FixtureFetcher::default()
            .search("legislature=14&", "fixtures/search/results_14_page1.html")
            .fixture(NEXT_PAGE, "fixtures/search/results_14_last.html")
            .fixture(WRITTEN, "fixtures/transitional/14-78012QE.htm")
            .fixture(LAST_PAGE_DOC, "fixtures/transitional/14-78012QE.htm")
    }

    #[tokio::test]
    async fn test_harvest_walks_every_page() {
        let fetcher = crawl_fetcher();
        let store = MemoryStore::new();
        let exporter = StoreExporter::new(&store);
        let harvester = Harvester::new(&fetcher, &store, &exporter, SEARCH_URL);

        let stats = harvester.harvest(HarvestRequest::new(14, 100)).await.unwrap();

        assert_eq!(stats.end, CrawlEnd::Exhausted);
        assert_eq!(stats.pages, 2);
        assert_eq!(stats.links, 4);
        assert_eq!(stats.harvested, 2);
        // 14-1033QG and 14-512QOSD are not served.
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.offset, 200);
        assert_eq!(fetcher.request_count(NEXT_PAGE), 1);

        let id = QuestionId::from_str("14-90001QE").unwrap();
        assert!(store.exists(&id).unwrap());
    }

    #[tokio::test]
    async fn test_second_harvest_finds_nothing_new() {
        let fetcher = crawl_fetcher();
        let store = MemoryStore::new();
        let exporter = StoreExporter::new(&store);
        let harvester = Harvester::new(&fetcher, &store, &exporter, SEARCH_URL);

        harvester.harvest(HarvestRequest::new(14, 100)).await.unwrap();
        let again = harvester.harvest(HarvestRequest::new(14, 100)).await.unwrap();

        assert_eq!(again.harvested, 0);
        assert_eq!(again.already_harvested, 2);
        assert_eq!(fetcher.request_count(WRITTEN), 1);
        assert_eq!(store.question_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_broken_next_control_aborts_legislature() {
        let fetcher = FixtureFetcher::default()
            .search("legislature=14&", "fixtures/search/results_14_broken_next.html")
            .fixture(
                "https://questions.assemblee-nationale.fr/q14/14-90002QE.htm",
                "fixtures/transitional/14-78012QE.htm",
            );
        let store = MemoryStore::new();
        let exporter = StoreExporter::new(&store);
        let harvester = Harvester::new(&fetcher, &store, &exporter, SEARCH_URL);

        let stats = harvester.harvest(HarvestRequest::new(14, 100)).await.unwrap();

        assert_eq!(stats.pages, 1);
        assert_eq!(stats.harvested, 1);
        assert!(matches!(stats.end, CrawlEnd::Aborted(ref reason) if reason.contains("span")));
    }

    #[tokio::test]
    async fn test_resume_starts_from_given_page() {
        let fetcher = crawl_fetcher();
        let store = MemoryStore::new();
        let exporter = StoreExporter::new(&store);
        let harvester = Harvester::new(&fetcher, &store, &exporter, SEARCH_URL);

        let mut request = HarvestRequest::new(14, 100);
        request.resume_url = Some(NEXT_PAGE.to_string());
        let stats = harvester.harvest(request).await.unwrap();

        assert_eq!(stats.pages, 1);
        assert_eq!(stats.harvested, 1);
        assert_eq!(stats.offset, 200);
        assert!(fetcher.requests().iter().all(|r| !r.starts_with("POST")));
    }

    #[tokio::test]
    async fn test_range_survives_failing_legislatures() {
        let fetcher = crawl_fetcher();
        let store = MemoryStore::new();
        let exporter = StoreExporter::new(&store);
        let harvester = Harvester::new(&fetcher, &store, &exporter, SEARCH_URL);

        let all = harvester.harvest_range(13..=15, 100).await;

        assert_eq!(all.len(), 3);
        assert!(matches!(all[0].end, CrawlEnd::Aborted(_)));
        assert_eq!(all[1].end, CrawlEnd::Exhausted);
        assert_eq!(all[1].harvested, 2);
        assert!(matches!(all[2].end, CrawlEnd::Aborted(_)));
        assert_eq!(all[2].pages, 0);
    }

    #[tokio::test]
    async fn test_crawl_follows_pages_on_configured_host() {
        let mirror_next = NEXT_PAGE.replace("https://www2.assemblee-nationale.fr", "http://mirror.test");
        let fetcher = FixtureFetcher::default()
            .search("legislature=14&", "fixtures/search/results_14_page1.html")
            .fixture(&mirror_next, "fixtures/search/results_14_last_with_previous.html");
        let store = MemoryStore::new();
        let exporter = StoreExporter::new(&store);
        let harvester = Harvester::new(
            &fetcher,
            &store,
            &exporter,
            "http://mirror.test/recherche/resultats_questions",
        );

        let stats = harvester.harvest(HarvestRequest::new(14, 100)).await.unwrap();

        assert_eq!(stats.end, CrawlEnd::Exhausted);
        assert_eq!(stats.pages, 2);
        assert_eq!(fetcher.request_count(&mirror_next), 1);
        assert_eq!(fetcher.request_count(NEXT_PAGE), 0);
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected() {
        let fetcher = FixtureFetcher::default();
        let store = MemoryStore::new();
        let exporter = StoreExporter::new(&store);
        let harvester = Harvester::new(&fetcher, &store, &exporter, SEARCH_URL);

        let result = harvester.harvest(HarvestRequest::new(14, 0)).await;

        assert!(matches!(result, Err(HarvestError::InvalidRequest(_))));
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn test_questions_by_theme() {
        let fetcher = FixtureFetcher::default()
            .search("legislature=9&", "fixtures/search/theme_results_9.html")
            .fixture(
                "https://questions.assemblee-nationale.fr/q9/9-1200QE.htm",
                "fixtures/legacy/9-1200QE-mojibake.htm",
            )
            .page(
                "https://questions.assemblee-nationale.fr/q9/9-1201QE.htm",
                "<html><body><table><tr><td>Rubrique :</td><td>police</td></tr></table></body></html>",
            )
            .fixture(
                "https://questions.assemblee-nationale.fr/q9/9-1203QE.htm",
                "fixtures/legacy/12-104532QE.htm",
            );
        let store = MemoryStore::new();
        let exporter = StoreExporter::new(&store);
        let harvester = Harvester::new(&fetcher, &store, &exporter, SEARCH_URL);

        let summary = harvester.questions_by_theme("police", 2, 100).await;

        assert_eq!(summary.legislatures, vec![9]);
        assert_eq!(summary.total_number_of_questions, 1248);
        assert_eq!(
            summary.urls,
            vec![
                "https://questions.assemblee-nationale.fr/q9/9-1200QE.htm",
                "https://questions.assemblee-nationale.fr/q9/9-1203QE.htm",
            ]
        );
        // One search per legislature, whether or not it answered.
        let searches = fetcher
            .requests()
            .iter()
            .filter(|r| r.starts_with("POST"))
            .count();
        assert_eq!(searches, THEME_LEGISLATURES.count());
    }
}
