use std::collections::BTreeMap;
use std::sync::RwLock;

use super::{Store, StoreError};
use crate::themes::ThemeNode;
use crate::types::{QuestionEntity, QuestionId};

/// Process-local store, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    questions: RwLock<BTreeMap<String, QuestionEntity>>,
    themes: RwLock<BTreeMap<String, ThemeNode>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn question_count(&self) -> Result<usize, StoreError> {
        Ok(self.questions.read().map_err(|_| StoreError::Poisoned)?.len())
    }
}

impl Store for MemoryStore {
    fn exists(&self, id: &QuestionId) -> Result<bool, StoreError> {
        let questions = self.questions.read().map_err(|_| StoreError::Poisoned)?;
        Ok(questions.contains_key(id.as_str()))
    }

    fn upsert_question(&self, question: &QuestionEntity) -> Result<(), StoreError> {
        let mut questions = self.questions.write().map_err(|_| StoreError::Poisoned)?;
        questions.insert(question.id.to_string(), question.clone());
        Ok(())
    }

    fn get_question(&self, id: &QuestionId) -> Result<Option<QuestionEntity>, StoreError> {
        let questions = self.questions.read().map_err(|_| StoreError::Poisoned)?;
        Ok(questions.get(id.as_str()).cloned())
    }

    fn count_questions_by_theme(&self, theme: &str) -> Result<u64, StoreError> {
        let questions = self.questions.read().map_err(|_| StoreError::Poisoned)?;
        Ok(questions.values().filter(|q| q.theme == theme).count() as u64)
    }

    fn upsert_theme(&self, theme: &ThemeNode) -> Result<(), StoreError> {
        let mut themes = self.themes.write().map_err(|_| StoreError::Poisoned)?;
        themes.insert(theme.unique_identifier.clone(), theme.clone());
        Ok(())
    }

    fn themes(&self) -> Result<Vec<ThemeNode>, StoreError> {
        let themes = self.themes.read().map_err(|_| StoreError::Poisoned)?;
        Ok(themes.values().cloned().collect())
    }
}
