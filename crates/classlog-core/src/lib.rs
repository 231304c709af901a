use serde::{Deserialize, Serialize};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

/// Highest score an instructor may attach to an interaction.
pub const MAX_SCORE: u8 = 10;

/// Fixed column order shared by the durable log and every export.
pub const INTERACTION_COLUMNS: [&str; 5] =
    ["Student", "Prompt", "AI_Response", "Timestamp", "Score"];

const LOG_TIMESTAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("storage failure: {0}")]
    IoFailure(#[from] std::io::Error),
    #[error("corrupt record at line {line}: {reason}")]
    CorruptRecord { line: usize, reason: String },
    #[error("record index {index} out of range for log of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("score {0} outside accepted range 0-{MAX_SCORE}")]
    InvalidScore(u8),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// One logged prompt/response exchange plus metadata.
///
/// `seq` is the record's zero-based physical ordinal in the durable log,
/// assigned at append time. Rows are never deleted or reordered, so `seq`
/// is a stable identifier across process runs without being a persisted
/// column of its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    pub seq: usize,
    pub student_name: String,
    pub prompt: String,
    pub response: String,
    #[serde(with = "log_timestamp")]
    pub timestamp: PrimitiveDateTime,
    pub score: Option<u8>,
}

/// Caller-supplied fields for one append.
///
/// `recorded_at` overrides the capture clock; leave it `None` to stamp the
/// record with the current local time at append.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordInput {
    pub student_name: String,
    pub prompt: String,
    pub response: String,
    #[serde(default, with = "log_timestamp::option")]
    pub recorded_at: Option<PrimitiveDateTime>,
}

impl RecordInput {
    /// Validates the input before it is appended.
    ///
    /// # Errors
    /// Returns [`LogError::InvalidRecord`] when the student name is empty
    /// after trimming.
    pub fn validate(&self) -> Result<(), LogError> {
        if self.student_name.trim().is_empty() {
            return Err(LogError::InvalidRecord(
                "student_name MUST be non-empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Checks a grading score against the accepted range.
///
/// # Errors
/// Returns [`LogError::InvalidScore`] when the score exceeds [`MAX_SCORE`].
pub fn validate_score(score: u8) -> Result<(), LogError> {
    if score > MAX_SCORE {
        return Err(LogError::InvalidScore(score));
    }
    Ok(())
}

/// Ordered, session-scoped container of records owned by the caller.
///
/// The UI layer keeps one of these per interactive session instead of a
/// global interaction list; the exporter accepts its slice directly for
/// session-only downloads.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionLog {
    records: Vec<Record>,
}

impl SessionLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parses a log timestamp in the fixed `YYYY-MM-DD HH:MM:SS` layout.
///
/// # Errors
/// Returns [`LogError::InvalidRecord`] when the value does not match the
/// layout.
pub fn parse_log_timestamp(value: &str) -> Result<PrimitiveDateTime, LogError> {
    PrimitiveDateTime::parse(value, LOG_TIMESTAMP)
        .map_err(|err| LogError::InvalidRecord(format!("invalid timestamp {value:?}: {err}")))
}

/// Formats a timestamp in the fixed `YYYY-MM-DD HH:MM:SS` layout.
///
/// # Errors
/// Returns [`LogError::InvalidRecord`] when formatting fails.
pub fn format_log_timestamp(value: PrimitiveDateTime) -> Result<String, LogError> {
    value
        .format(LOG_TIMESTAMP)
        .map_err(|err| LogError::InvalidRecord(format!("failed to format timestamp: {err}")))
}

/// Current wall-clock time for a new record, local process clock with a UTC
/// fallback when the platform cannot determine the local offset.
#[must_use]
pub fn now_log_time() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    PrimitiveDateTime::new(now.date(), now.time())
}

/// Serde adapter keeping timestamps in the fixed log layout rather than the
/// `time` crate default representation.
pub mod log_timestamp {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::PrimitiveDateTime;

    /// # Errors
    /// Fails when the timestamp cannot be rendered in the log layout.
    pub fn serialize<S: Serializer>(
        value: &PrimitiveDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let formatted = super::format_log_timestamp(*value).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    /// # Errors
    /// Fails when the input string does not match the log layout.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<PrimitiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_log_timestamp(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use time::PrimitiveDateTime;

        /// # Errors
        /// Fails when a present timestamp cannot be rendered in the log layout.
        pub fn serialize<S: Serializer>(
            value: &Option<PrimitiveDateTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(inner) => super::serialize(inner, serializer),
                None => serializer.serialize_none(),
            }
        }

        /// # Errors
        /// Fails when a present input string does not match the log layout.
        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<PrimitiveDateTime>, D::Error> {
            let raw = Option::<String>::deserialize(deserializer)?;
            match raw {
                Some(value) => crate::parse_log_timestamp(&value)
                    .map(Some)
                    .map_err(serde::de::Error::custom),
                None => Ok(None),
            }
        }
    }
}
