//! Filesystem store.
//!
//! ```text
//! {root}/
//! ├── themes.json          # every topic, keyed by identifier
//! └── questions/
//!     └── <id>.json        # one validated document per file
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{Store, StoreError};
use crate::themes::ThemeNode;
use crate::types::{QuestionEntity, QuestionId};

const THEMES_FILE: &str = "themes.json";
const QUESTIONS_DIR: &str = "questions";

#[derive(Debug)]
pub struct LocalStore {
    root: PathBuf,
    // Serializes read-modify-write cycles on themes.json.
    themes_lock: Mutex<()>,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            themes_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn question_path(&self, id: &str) -> PathBuf {
        self.root.join(QUESTIONS_DIR).join(format!("{id}.json"))
    }

    /// Writes to a temporary file, then renames it over the target.
    fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>, StoreError> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn load_themes(&self) -> Result<BTreeMap<String, ThemeNode>, StoreError> {
        Ok(self
            .read_json(&self.root.join(THEMES_FILE))?
            .unwrap_or_default())
    }

    fn stored_questions(&self) -> Result<Vec<QuestionEntity>, StoreError> {
        let dir = self.root.join(QUESTIONS_DIR);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Io(e)),
        };

        let mut questions = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && let Some(question) = self.read_json(&path)?
            {
                questions.push(question);
            }
        }
        Ok(questions)
    }
}

impl Store for LocalStore {
    fn exists(&self, id: &QuestionId) -> Result<bool, StoreError> {
        Ok(self.question_path(id.as_str()).try_exists()?)
    }

    fn upsert_question(&self, question: &QuestionEntity) -> Result<(), StoreError> {
        self.write_json(&self.question_path(question.id.as_str()), question)
    }

    fn get_question(&self, id: &QuestionId) -> Result<Option<QuestionEntity>, StoreError> {
        self.read_json(&self.question_path(id.as_str()))
    }

    fn count_questions_by_theme(&self, theme: &str) -> Result<u64, StoreError> {
        Ok(self
            .stored_questions()?
            .iter()
            .filter(|q| q.theme == theme)
            .count() as u64)
    }

    fn upsert_theme(&self, theme: &ThemeNode) -> Result<(), StoreError> {
        let _guard = self.themes_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut themes = self.load_themes()?;
        themes.insert(theme.unique_identifier.clone(), theme.clone());
        self.write_json(&self.root.join(THEMES_FILE), &themes)
    }

    fn themes(&self) -> Result<Vec<ThemeNode>, StoreError> {
        Ok(self.load_themes()?.into_values().collect())
    }
}
