//! JSON artifact persistence shared by every pipeline stage.
//!
//! Why this exists:
//! - We centralize artifact reads/writes in one place so error classification
//!   stays consistent: an absent file is `MissingInput`, an unparseable file is
//!   `FormatMismatch`. The orchestrator branches on exactly that split (a
//!   `FormatMismatch` on an ingestion artifact triggers recomputation).
//! - Writes go through a temporary file in the destination directory followed
//!   by a rename, so a stage either publishes a complete artifact or none.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// Read a JSON artifact from disk.
///
/// Error mapping:
/// - file absent → `Error::MissingInput`
/// - present but unparseable → `Error::FormatMismatch`
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(Error::missing_input(format!("{} not found", path.display())));
        }
        Err(err) => return Err(err.into()),
    };

    serde_json::from_reader(BufReader::new(file)).map_err(|err| Error::FormatMismatch {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}

/// Write a JSON artifact atomically (temp file + rename into place).
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path.parent().ok_or_else(|| {
        Error::missing_input(format!("{} has no parent directory", path.display()))
    })?;
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, value).map_err(|err| Error::FormatMismatch {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    tmp.flush()?;
    tmp.persist(path)
        .map_err(|err| Error::Io(err.error))?;

    Ok(())
}
