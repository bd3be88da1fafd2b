use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};

use crate::config::HttpConfig;

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Page not found: {0}")]
    NotFound(String),
}

/// Outbound HTTP used by the crawl. Requests are issued one at a time.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn get(&self, url: &str) -> Result<String, ScraperError>;

    /// POSTs an `application/x-www-form-urlencoded` body.
    async fn post_form(&self, url: &str, body: String) -> Result<String, ScraperError>;
}

#[derive(Debug, Clone)]
pub struct WebScraper {
    client: Client,
}

impl WebScraper {
    pub fn new(config: &HttpConfig) -> Result<Self, ScraperError> {
        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        // No timeout unless configured: reqwest then waits indefinitely.
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    async fn read_body(
        &self,
        url: &str,
        response: reqwest::Response,
    ) -> Result<String, ScraperError> {
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ScraperError::NotFound(url.to_string()));
        }

        Ok(response
            .error_for_status()?
            .text()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?)
    }
}

#[async_trait]
impl Fetch for WebScraper {
    async fn get(&self, url: &str) -> Result<String, ScraperError> {
        log::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?;
        self.read_body(url, response).await
    }

    async fn post_form(&self, url: &str, body: String) -> Result<String, ScraperError> {
        log::debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?;
        self.read_body(url, response).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::fs;
    use std::sync::Mutex;

    use super::*;

    /// Serves canned pages keyed by URL and records every request.
    #[derive(Default)]
    pub struct FixtureFetcher {
        pages: HashMap<String, String>,
        posts: HashMap<String, String>,
        requests: Mutex<Vec<String>>,
    }

    impl FixtureFetcher {
        pub fn page(mut self, url: &str, html: impl Into<String>) -> Self {
            self.pages.insert(url.to_string(), html.into());
            self
        }

        pub fn fixture(self, url: &str, path: &str) -> Self {
            let html = fs::read_to_string(path).expect("Failed to read sample file");
            self.page(url, html)
        }

        /// Response to a POST whose body contains `needle`.
        pub fn search(mut self, needle: &str, path: &str) -> Self {
            let html = fs::read_to_string(path).expect("Failed to read sample file");
            self.posts.insert(needle.to_string(), html);
            self
        }

        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }

        pub fn request_count(&self, url: &str) -> usize {
            self.requests().iter().filter(|r| r.as_str() == url).count()
        }
    }

    #[async_trait]
    impl Fetch for FixtureFetcher {
        async fn get(&self, url: &str) -> Result<String, ScraperError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| ScraperError::NotFound(url.to_string()))
        }

        async fn post_form(&self, url: &str, body: String) -> Result<String, ScraperError> {
            self.requests.lock().unwrap().push(format!("POST {url}"));
            self.posts
                .iter()
                .find(|(needle, _)| body.contains(needle.as_str()))
                .map(|(_, html)| html.clone())
                .ok_or_else(|| ScraperError::NotFound(url.to_string()))
        }
    }
}
