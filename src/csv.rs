use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::request::{IssueRequest, RequestError, SpendRequest};
use crate::{Command, Payer, Points};

/// Errors that can occur when reading commands or writing balances
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to open {path}: {source}")]
    Open { path: String, source: csv::Error },

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized command type '{command_type}'")]
    UnrecognizedType { line: usize, command_type: String },

    #[error("line {line}: {source}")]
    Invalid { line: usize, source: RequestError },

    #[error("failed to write balances: {0}")]
    Write(#[from] csv::Error),

    #[error("failed to flush balances: {0}")]
    Flush(#[from] io::Error),
}

#[derive(Debug, Deserialize)]
struct InputRow {
    r#type: String,
    payer: Option<String>,
    points: Option<i64>,
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct OutputRow {
    payer: Payer,
    points: Points,
}

/// Read validated commands from a csv file.
///
/// Expected header: `type,payer,points,timestamp`. Issue rows need every column;
/// spend rows only `points`. Timestamps are RFC 3339 and must not be after `now`.
pub fn read_commands(
    path: impl AsRef<Path>,
    now: DateTime<Utc>,
) -> Result<impl Iterator<Item = Result<Command, CsvError>>, CsvError> {
    let path = path.as_ref();
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| CsvError::Open {
            path: path.display().to_string(),
            source,
        })?;

    Ok(reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(move |(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            let request = match row.r#type.as_str() {
                "issue" => IssueRequest {
                    payer: row.payer,
                    points: row.points,
                    timestamp: row.timestamp,
                }
                .validate(now),
                "spend" => SpendRequest { points: row.points }.validate(),
                other => {
                    return Err(CsvError::UnrecognizedType {
                        line,
                        command_type: other.to_string(),
                    });
                }
            };
            request.map_err(|source| CsvError::Invalid { line, source })
        }))
}

/// Write payer balances in csv format
pub fn write_balances(
    writer: impl io::Write,
    balances: impl IntoIterator<Item = (Payer, Points)>,
) -> Result<(), CsvError> {
    let mut writer = csv::Writer::from_writer(writer);

    for (payer, points) in balances {
        writer.serialize(OutputRow { payer, points })?;
    }

    writer.flush()?;
    Ok(())
}
