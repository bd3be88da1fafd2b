//! Persistence for harvested questions and the topic hierarchy.
//!
//! Documents are keyed by their natural identifier and topics by
//! `unique_identifier`, so every write is an upsert.

pub mod local;
pub mod memory;

pub use local::LocalStore;
pub use memory::MemoryStore;

use crate::themes::{HierarchyError, ThemeHierarchy, ThemeNode, ThemeTree};
use crate::types::{QuestionEntity, QuestionId};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
    #[error("Store lock poisoned")]
    Poisoned,
}

pub trait Store: Send + Sync {
    fn exists(&self, id: &QuestionId) -> Result<bool, StoreError>;

    fn upsert_question(&self, question: &QuestionEntity) -> Result<(), StoreError>;

    fn get_question(&self, id: &QuestionId) -> Result<Option<QuestionEntity>, StoreError>;

    /// Number of stored documents whose `theme` equals `theme`.
    fn count_questions_by_theme(&self, theme: &str) -> Result<u64, StoreError>;

    fn upsert_theme(&self, theme: &ThemeNode) -> Result<(), StoreError>;

    /// Every stored topic, ordered by identifier.
    fn themes(&self) -> Result<Vec<ThemeNode>, StoreError>;

    fn hierarchy(&self) -> Result<ThemeHierarchy, StoreError> {
        Ok(ThemeHierarchy::new(self.themes()?)?)
    }

    fn get_theme(&self, name: &str, level: u8) -> Result<ThemeNode, StoreError> {
        self.themes()?
            .into_iter()
            .find(|t| t.name == name && t.level == level)
            .ok_or_else(|| {
                HierarchyError::UnknownName {
                    name: name.to_string(),
                    level,
                }
                .into()
            })
    }

    fn get_subthemes(&self, identifier: &str) -> Result<Vec<ThemeTree>, StoreError> {
        Ok(self.hierarchy()?.subtree(identifier)?)
    }

    fn get_parent_theme(
        &self,
        identifier: &str,
        stop_at_level: u8,
    ) -> Result<ThemeNode, StoreError> {
        Ok(self
            .hierarchy()?
            .resolve_from(identifier, stop_at_level)?
            .clone())
    }
}
