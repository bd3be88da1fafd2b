use std::fmt::Display;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::store::{Store, StoreError};
use crate::types::QuestionEntity;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Unknown export format: {0}")]
    UnknownFormat(String),
    #[error("Exporter lock poisoned")]
    Poisoned,
}

/// Where harvested documents end up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// One `question_<id>.json` file per document.
    Json,
    /// A single JSON Lines file.
    Flat,
    /// A single CSV file with a header row.
    Csv,
    #[default]
    Store,
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "flat" | "jsonl" => Ok(ExportFormat::Flat),
            "csv" => Ok(ExportFormat::Csv),
            "store" => Ok(ExportFormat::Store),
            _ => Err(ExportError::UnknownFormat(s.to_string())),
        }
    }
}

impl Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExportFormat::Json => "json",
            ExportFormat::Flat => "flat",
            ExportFormat::Csv => "csv",
            ExportFormat::Store => "store",
        };
        write!(f, "{}", name)
    }
}

/// Receives each validated document once it has been parsed.
pub trait Exporter: Send + Sync {
    fn export(&self, question: &QuestionEntity) -> Result<(), ExportError>;
}

pub struct JsonExporter {
    dir: PathBuf,
}

impl JsonExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Exporter for JsonExporter {
    fn export(&self, question: &QuestionEntity) -> Result<(), ExportError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("question_{}.json", question.id));
        fs::write(&path, serde_json::to_vec_pretty(question)?)?;
        log::debug!("Wrote {}", path.display());
        Ok(())
    }
}

/// Appends one JSON object per line.
pub struct FlatFileExporter {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FlatFileExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

impl Exporter for FlatFileExporter {
    fn export(&self, question: &QuestionEntity) -> Result<(), ExportError> {
        let _guard = self.lock.lock().map_err(|_| ExportError::Poisoned)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut line = serde_json::to_string(question)?;
        line.push('\n');
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?
            .write_all(line.as_bytes())?;
        Ok(())
    }
}

/// Appends one CSV record per document. The header is written when the file is
/// created or still empty.
pub struct CsvExporter {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CsvExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

impl Exporter for CsvExporter {
    fn export(&self, question: &QuestionEntity) -> Result<(), ExportError> {
        let _guard = self.lock.lock().map_err(|_| ExportError::Poisoned)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let write_header = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        writer.serialize(question)?;
        writer.flush()?;
        Ok(())
    }
}

pub struct StoreExporter<'a> {
    store: &'a dyn Store,
}

impl<'a> StoreExporter<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }
}

impl Exporter for StoreExporter<'_> {
    fn export(&self, question: &QuestionEntity) -> Result<(), ExportError> {
        Ok(self.store.upsert_question(question)?)
    }
}

/// Hands each document to several exporters in order, stopping at the first failure.
pub struct ExportChain<'a> {
    exporters: Vec<Box<dyn Exporter + 'a>>,
}

impl<'a> ExportChain<'a> {
    pub fn new() -> Self {
        Self {
            exporters: Vec::new(),
        }
    }

    pub fn with(mut self, exporter: impl Exporter + 'a) -> Self {
        self.exporters.push(Box::new(exporter));
        self
    }
}

impl Default for ExportChain<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Exporter for ExportChain<'_> {
    fn export(&self, question: &QuestionEntity) -> Result<(), ExportError> {
        for exporter in &self.exporters {
            exporter.export(question)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{QuestionId, RawQuestion};

    fn question(id: &str) -> QuestionEntity {
        QuestionEntity::new(RawQuestion {
            id: id.to_string(),
            congressman: "M. Paul Girard (SOC)".to_string(),
            theme: "transports".to_string(),
            question_text: Some("Texte  de la\nquestion".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_export_format_from_str() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("jsonl".parse::<ExportFormat>().unwrap(), ExportFormat::Flat);
        assert_eq!("store".parse::<ExportFormat>().unwrap(), ExportFormat::Store);
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!("xml".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_json_exporter_writes_one_file_per_question() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = JsonExporter::new(dir.path().join("out"));

        exporter.export(&question("14-512QOSD")).unwrap();

        let text = fs::read_to_string(dir.path().join("out/question_14-512QOSD.json")).unwrap();
        let back: QuestionEntity = serde_json::from_str(&text).unwrap();
        assert_eq!(back.congressman, "Paul Girard");
        assert_eq!(back.question_text.as_deref(), Some("Texte de la question"));
    }

    #[test]
    fn test_flat_exporter_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("questions.jsonl");
        let exporter = FlatFileExporter::new(&path);

        exporter.export(&question("14-512QOSD")).unwrap();
        exporter.export(&question("14-1033QG")).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let ids = text
            .lines()
            .map(|line| serde_json::from_str::<QuestionEntity>(line).unwrap().id)
            .map(|id| id.to_string())
            .collect::<Vec<_>>();
        assert_eq!(ids, ["14-512QOSD", "14-1033QG"]);
    }

    #[test]
    fn test_csv_exporter_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("questions.csv");

        CsvExporter::new(&path).export(&question("14-512QOSD")).unwrap();
        // A second exporter on the same file keeps appending below the header.
        CsvExporter::new(&path).export(&question("14-1033QG")).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "id");
        assert_eq!(&headers[1], "congressman");

        let records = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(&records[0][0], "14-512QOSD");
        assert_eq!(&records[1][0], "14-1033QG");
        assert_eq!(&records[1][1], "Paul Girard");
        assert_eq!(&records[0][4], "");
    }

    #[test]
    fn test_store_exporter_upserts() {
        let store = MemoryStore::new();
        let exporter = StoreExporter::new(&store);

        exporter.export(&question("14-1033QG")).unwrap();
        exporter.export(&question("14-1033QG")).unwrap();

        assert_eq!(store.question_count().unwrap(), 1);
        let id: QuestionId = "14-1033QG".parse().unwrap();
        assert!(store.exists(&id).unwrap());
    }

    #[test]
    fn test_chain_feeds_every_exporter() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let chain = ExportChain::new()
            .with(StoreExporter::new(&store))
            .with(JsonExporter::new(dir.path()));

        chain.export(&question("14-512QOSD")).unwrap();

        assert_eq!(store.question_count().unwrap(), 1);
        assert!(dir.path().join("question_14-512QOSD.json").exists());
    }
}
