//! Durable CSV append log for student/AI interactions.
//!
//! The primary store is a plain CSV file with the fixed header
//! `Student,Prompt,AI_Response,Timestamp,Score`, one row per appended
//! record, oldest first. Rows are never rewritten: grading appends to a
//! sibling `<stem>.scores.csv` correction stream, and [`CsvInteractionStore::load_all`]
//! overlays those corrections (last one wins) onto the base rows.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use classlog_core::{
    format_log_timestamp, now_log_time, parse_log_timestamp, validate_score, LogError, Record,
    RecordInput, INTERACTION_COLUMNS,
};
use serde::{Deserialize, Serialize};

const SCORES_SUFFIX: &str = "scores.csv";

/// Header of the correction stream, written the same way the primary log
/// header is written from [`INTERACTION_COLUMNS`].
const SCORE_COLUMNS: [&str; 3] = ["Seq", "Score", "Graded_At"];

/// Durable row shape of the primary log. The header itself is written from
/// [`INTERACTION_COLUMNS`]; the serde renames here must stay aligned with
/// that const so rows deserialize against it.
#[derive(Debug, Serialize, Deserialize)]
struct InteractionRow {
    #[serde(rename = "Student")]
    student: String,
    #[serde(rename = "Prompt")]
    prompt: String,
    #[serde(rename = "AI_Response")]
    response: String,
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "Score")]
    score: Option<u8>,
}

/// One grading action in the correction stream.
#[derive(Debug, Serialize, Deserialize)]
struct ScoreRow {
    #[serde(rename = "Seq")]
    seq: usize,
    #[serde(rename = "Score")]
    score: u8,
    #[serde(rename = "Graded_At")]
    graded_at: String,
}

/// Append-only interaction store backed by a CSV file pair.
///
/// The store holds no state beyond the identity of its backing files; every
/// operation opens, works, and closes. There is no `close` step: the store
/// stays available for further appends and loads across process runs.
pub struct CsvInteractionStore {
    log_path: PathBuf,
    scores_path: PathBuf,
}

impl CsvInteractionStore {
    /// Binds a store to its backing log file. The file itself is created
    /// lazily by the first [`append`](Self::append); loading a store that
    /// was never written yields an empty sequence.
    #[must_use]
    pub fn open(log_path: &Path) -> Self {
        let stem = log_path
            .file_stem()
            .map_or_else(|| "interactions".to_string(), |s| s.to_string_lossy().into_owned());
        let scores_path = log_path.with_file_name(format!("{stem}.{SCORES_SUFFIX}"));
        Self {
            log_path: log_path.to_path_buf(),
            scores_path,
        }
    }

    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Appends one interaction and returns the stored record with its
    /// assigned sequence number.
    ///
    /// The header and row are serialized into one buffer and written with a
    /// single append call, so a failed append leaves no partial row behind
    /// and a concurrent reader never observes a torn line. Prior rows are
    /// neither rewritten nor re-parsed.
    ///
    /// # Errors
    /// Returns [`LogError::InvalidRecord`] for an invalid input and
    /// [`LogError::IoFailure`] when the backing file is unwritable. Failures
    /// are surfaced to the caller and never retried.
    pub fn append(&self, input: &RecordInput) -> Result<Record, LogError> {
        input.validate()?;

        let seq = self.count_base_rows()?;
        let timestamp = input.recorded_at.unwrap_or_else(now_log_time);
        let record = Record {
            seq,
            student_name: input.student_name.clone(),
            prompt: input.prompt.clone(),
            response: input.response.clone(),
            timestamp,
            score: None,
        };

        let row = InteractionRow {
            student: record.student_name.clone(),
            prompt: record.prompt.clone(),
            response: record.response.clone(),
            timestamp: format_log_timestamp(record.timestamp)?,
            score: None,
        };
        append_row(&self.log_path, &INTERACTION_COLUMNS, &row)?;

        Ok(record)
    }

    /// Returns all stored records, oldest first, with score corrections
    /// applied.
    ///
    /// An absent store yields an empty sequence, not an error. A row that
    /// cannot be parsed into the record shape is skipped with a warning and
    /// the rest of the log stays usable; the skipped row still consumes its
    /// physical ordinal so later sequence numbers are stable.
    ///
    /// # Errors
    /// Returns [`LogError::IoFailure`] when the backing files exist but
    /// cannot be read.
    pub fn load_all(&self) -> Result<Vec<Record>, LogError> {
        let mut records = self.read_base_rows()?;
        self.overlay_corrections(&mut records)?;
        Ok(records)
    }

    /// Attaches a score to the record at `index`, its zero-based position in
    /// the sequence returned by [`load_all`](Self::load_all).
    ///
    /// Arguments are validated before anything is written; a rejected call
    /// leaves both files untouched. Re-grading the same record overwrites
    /// the previous score. The primary log is not rewritten: the grade is
    /// appended to the correction stream keyed by the record's sequence
    /// number, so a concurrent append cannot retarget it.
    ///
    /// # Errors
    /// Returns [`LogError::InvalidScore`] for a score above the maximum,
    /// [`LogError::IndexOutOfRange`] when `index` is past the end of the
    /// log, and [`LogError::IoFailure`] on storage failures.
    pub fn set_score(&self, index: usize, score: u8) -> Result<Record, LogError> {
        validate_score(score)?;
        let records = self.load_all()?;
        let Some(record) = records.get(index) else {
            return Err(LogError::IndexOutOfRange {
                index,
                len: records.len(),
            });
        };
        self.push_correction(record.seq, score)?;

        let mut graded = record.clone();
        graded.score = Some(score);
        Ok(graded)
    }

    /// Stable-identifier variant of [`set_score`](Self::set_score): the
    /// target is addressed by its sequence number, which never shifts under
    /// appends, instead of its view position.
    ///
    /// # Errors
    /// Same as [`set_score`](Self::set_score); `IndexOutOfRange` here means
    /// no stored record carries `seq`.
    pub fn set_score_by_seq(&self, seq: usize, score: u8) -> Result<Record, LogError> {
        validate_score(score)?;
        let records = self.load_all()?;
        let Some(record) = records.iter().find(|record| record.seq == seq) else {
            return Err(LogError::IndexOutOfRange {
                index: seq,
                len: records.len(),
            });
        };
        self.push_correction(seq, score)?;

        let mut graded = record.clone();
        graded.score = Some(score);
        Ok(graded)
    }

    fn read_base_rows(&self) -> Result<Vec<Record>, LogError> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.log_path)
            .map_err(|err| map_csv_error(err, 1))?;
        let headers = reader.headers().map_err(|err| map_csv_error(err, 1))?.clone();

        let mut records = Vec::new();
        let mut seq = 0_usize;
        for row in reader.records() {
            // 1-based file line, past the header.
            let line = seq + 2;
            let outcome = match row {
                Ok(raw) => parse_interaction(&raw, &headers, seq, line),
                Err(err) if is_io_error(&err) => return Err(map_csv_error(err, line)),
                Err(err) => Err(map_csv_error(err, line)),
            };
            match outcome {
                Ok(record) => records.push(record),
                Err(err) => {
                    tracing::warn!(line, %err, "skipping unparseable interaction row");
                }
            }
            seq += 1;
        }
        Ok(records)
    }

    fn overlay_corrections(&self, records: &mut [Record]) -> Result<(), LogError> {
        if !self.scores_path.exists() {
            return Ok(());
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.scores_path)
            .map_err(|err| map_csv_error(err, 1))?;
        let headers = reader.headers().map_err(|err| map_csv_error(err, 1))?.clone();

        for (ordinal, row) in reader.records().enumerate() {
            let line = ordinal + 2;
            let parsed = match row {
                Ok(value) => value.deserialize::<ScoreRow>(Some(&headers)),
                Err(err) => {
                    if is_io_error(&err) {
                        return Err(map_csv_error(err, line));
                    }
                    tracing::warn!(line, %err, "skipping unreadable score correction");
                    continue;
                }
            };
            let correction = match parsed {
                Ok(value) => value,
                Err(err) => {
                    tracing::warn!(line, %err, "skipping malformed score correction");
                    continue;
                }
            };
            if validate_score(correction.score).is_err() {
                tracing::warn!(
                    line,
                    score = correction.score,
                    "skipping score correction outside accepted range"
                );
                continue;
            }
            match records
                .iter_mut()
                .find(|record| record.seq == correction.seq)
            {
                Some(record) => record.score = Some(correction.score),
                None => {
                    tracing::warn!(
                        line,
                        seq = correction.seq,
                        "score correction targets an unknown record"
                    );
                }
            }
        }
        Ok(())
    }

    fn push_correction(&self, seq: usize, score: u8) -> Result<(), LogError> {
        let row = ScoreRow {
            seq,
            score,
            graded_at: format_log_timestamp(now_log_time())?,
        };
        append_row(&self.scores_path, &SCORE_COLUMNS, &row)
    }

    /// Counts physical data rows without parsing them into the record
    /// shape; the count is the next sequence number.
    fn count_base_rows(&self) -> Result<usize, LogError> {
        if !self.log_path.exists() {
            return Ok(0);
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.log_path)
            .map_err(|err| map_csv_error(err, 1))?;

        let mut count = 0_usize;
        for row in reader.byte_records() {
            if let Err(err) = row {
                if is_io_error(&err) {
                    return Err(map_csv_error(err, count + 2));
                }
            }
            count += 1;
        }
        Ok(count)
    }
}

fn parse_interaction(
    raw: &csv::StringRecord,
    headers: &csv::StringRecord,
    seq: usize,
    line: usize,
) -> Result<Record, LogError> {
    let interaction = raw
        .deserialize::<InteractionRow>(Some(headers))
        .map_err(|err| map_csv_error(err, line))?;

    let timestamp =
        parse_log_timestamp(&interaction.timestamp).map_err(|err| LogError::CorruptRecord {
            line,
            reason: err.to_string(),
        })?;

    Ok(Record {
        seq,
        student_name: interaction.student,
        prompt: interaction.prompt,
        response: interaction.response,
        timestamp,
        score: interaction.score,
    })
}

/// Serializes one row (with the header when the file is new or empty) and
/// appends it with a single write. The header comes from the shared column
/// const, never from the row's serde shape.
fn append_row<S: Serialize>(path: &Path, header: &[&str], row: &S) -> Result<(), LogError> {
    let needs_header = match fs::metadata(path) {
        Ok(metadata) => metadata.len() == 0,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => true,
        Err(err) => return Err(LogError::IoFailure(err)),
    };

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    if needs_header {
        writer
            .write_record(header)
            .map_err(|err| LogError::InvalidRecord(err.to_string()))?;
    }
    writer
        .serialize(row)
        .map_err(|err| LogError::InvalidRecord(err.to_string()))?;
    let buffer = writer
        .into_inner()
        .map_err(|err| LogError::IoFailure(err.into_error()))?;

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(&buffer)?;
    file.flush()?;
    Ok(())
}

fn is_io_error(err: &csv::Error) -> bool {
    matches!(err.kind(), csv::ErrorKind::Io(_))
}

fn map_csv_error(err: csv::Error, line: usize) -> LogError {
    let reason = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(io) => LogError::IoFailure(io),
        _ => LogError::CorruptRecord { line, reason },
    }
}
