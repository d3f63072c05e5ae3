use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::TransformedRow;

pub const CSV_HEADERS: [&str; 5] = ["row_id", "data", "created", "updated", "isDeleted"];

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Cannot create staging directory `{path:?}`: {raw_error_message}")]
    CannotCreateDirectory { path: PathBuf, raw_error_message: String },
    #[error("Cannot write csv file `{path:?}`: {raw_error_message}")]
    CannotWriteFile { path: PathBuf, raw_error_message: String },
}

pub fn csv_file_path(dir: &Path, table_name: &str) -> PathBuf {
    dir.join(format!("{}.csv", table_name))
}

/// Writes `<dir>/<table_name>.csv` with a header line, creating `dir` if needed.
pub fn write_csv(dir: &Path, table_name: &str, rows: &[TransformedRow]) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(dir).map_err(|e| ExportError::CannotCreateDirectory {
        path: dir.to_path_buf(),
        raw_error_message: e.to_string(),
    })?;

    let path = csv_file_path(dir, table_name);
    let cannot_write = |e: &dyn std::fmt::Display| ExportError::CannotWriteFile {
        path: path.clone(),
        raw_error_message: e.to_string(),
    };

    // headers are written by hand so an empty table still gets them
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&path)
        .map_err(|e| cannot_write(&e))?;

    writer.write_record(CSV_HEADERS).map_err(|e| cannot_write(&e))?;
    for row in rows {
        writer.serialize(row).map_err(|e| cannot_write(&e))?;
    }
    writer.flush().map_err(|e| cannot_write(&e))?;

    debug!("wrote {} rows to {:?}", rows.len(), path);
    Ok(path)
}
