//! Batch source and result sink: JSON files of email records.
//!
//! Input is a JSON array of objects with at least a `text` field. Headers may
//! be nested (`"headers": {"date": ..}`) or flattened (`"headers.date": ..`),
//! the latter being what spreadsheet exports produce. Unknown columns are
//! kept and written back out with the predictions.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::DatasetError;
use crate::pipeline::normalize::{normalize, value_to_text};
use crate::pipeline::types::{ClassificationItem, ClassificationOutcome, ItemOutcome};

/// Header fields used by the timeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailHeaders {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl EmailHeaders {
    fn is_empty(&self) -> bool {
        self.date.is_none() && self.from.is_none() && self.subject.is_none()
    }
}

/// One input row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailRecord {
    /// Raw body. Non-string cells are rendered to text.
    #[serde(default, deserialize_with = "text_from_any")]
    pub text: String,
    #[serde(default, skip_serializing_if = "EmailHeaders::is_empty")]
    pub headers: EmailHeaders,
    /// Ground-truth labels, when the file is a labelled set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_category: Option<String>,
    /// Every other column, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EmailRecord {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Header by name (`date`, `from`, `subject`), nested or flattened.
    pub fn header(&self, name: &str) -> Option<String> {
        let nested = match name {
            "date" => self.headers.date.as_deref(),
            "from" => self.headers.from.as_deref(),
            "subject" => self.headers.subject.as_deref(),
            _ => None,
        };
        nested.map(str::to_string).or_else(|| {
            self.extra
                .get(&format!("headers.{name}"))
                .map(value_to_text)
                .filter(|s| !s.is_empty())
        })
    }
}

/// One output row: the input record plus the prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: usize,
    #[serde(flatten)]
    pub record: EmailRecord,
    pub pred_main: String,
    pub pred_sub: String,
    /// Outcome label: `classified`, `parse_error`, `api_error`, `retry_failed`.
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

fn text_from_any<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_text(&value))
}

/// Load input records, keeping at most `limit` of them.
pub fn load_records(path: &Path, limit: Option<usize>) -> Result<Vec<EmailRecord>, DatasetError> {
    let mut records: Vec<EmailRecord> = read_json(path)?;
    if let Some(limit) = limit {
        records.truncate(limit);
    }
    Ok(records)
}

/// Load a predictions file written by [`write_predictions`].
pub fn load_predictions(path: &Path) -> Result<Vec<PredictionRecord>, DatasetError> {
    read_json(path)
}

/// Normalize record bodies into dispatcher items; ids are record indexes.
pub fn to_items(records: &[EmailRecord]) -> Vec<ClassificationItem> {
    records
        .iter()
        .enumerate()
        .map(|(id, record)| ClassificationItem::new(id, normalize(&record.text)))
        .collect()
}

/// Join records with their outcomes by id.
pub fn to_predictions(
    records: Vec<EmailRecord>,
    outcomes: &[ItemOutcome],
) -> Result<Vec<PredictionRecord>, DatasetError> {
    if records.len() != outcomes.len() {
        return Err(DatasetError::LengthMismatch {
            records: records.len(),
            outcomes: outcomes.len(),
        });
    }

    let mut slots: Vec<Option<EmailRecord>> = records.into_iter().map(Some).collect();
    outcomes
        .iter()
        .map(|o| {
            let record = slots
                .get_mut(o.id)
                .and_then(Option::take)
                .ok_or(DatasetError::LengthMismatch {
                    records: slots.len(),
                    outcomes: outcomes.len(),
                })?;
            let (pred_main, pred_sub) = o.outcome.prediction();
            let status_code = match o.outcome {
                ClassificationOutcome::ApiError { status_code } => status_code,
                _ => None,
            };
            Ok(PredictionRecord {
                id: o.id,
                record,
                pred_main: pred_main.to_string(),
                pred_sub: pred_sub.to_string(),
                outcome: o.outcome.label().to_string(),
                status_code,
            })
        })
        .collect()
}

/// Write predictions as a pretty-printed JSON array.
pub fn write_predictions(path: &Path, predictions: &[PredictionRecord]) -> Result<(), DatasetError> {
    let write_err = |source| DatasetError::Write {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(write_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, predictions).map_err(|e| DatasetError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    writer.flush().map_err(write_err)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, DatasetError> {
    let file = File::open(path).map_err(|source| DatasetError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| DatasetError::Json {
        path: path.to_path_buf(),
        source,
    })
}
