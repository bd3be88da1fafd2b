pub mod config;
pub mod dispatch;
pub mod export;
pub mod harvest;
pub mod legacy;
pub mod modern;
pub mod parser;
pub mod scraper;
pub mod search;
pub mod store;
pub mod themes;
pub mod transitional;
pub mod types;
pub mod utils;

pub use config::Config;
pub use harvest::Harvester;
pub use scraper::{Fetch, ScraperError, WebScraper};
pub use types::{QuestionEntity, QuestionId, QuestionType};

pub(crate) const SEARCH_HOST: &str = "https://www2.assemblee-nationale.fr";
pub(crate) const QUESTIONS_HOST: &str = "https://questions.assemblee-nationale.fr";
pub(crate) const DEPUTIES_URL: &str = "https://www.assemblee-nationale.fr/dyn/deputes/";
