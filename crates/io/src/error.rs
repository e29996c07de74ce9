use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error(
        "{}: unsupported file type (expected .xlsx, .xls, .xlsb, .ods, .csv or .tsv)",
        path.display()
    )]
    UnsupportedFormat { path: PathBuf },
    #[error("{}: cannot open: {message}", path.display())]
    Open { path: PathBuf, message: String },
    #[error("{}: sheet '{sheet}': {message}", path.display())]
    Sheet {
        path: PathBuf,
        sheet: String,
        message: String,
    },
    #[error("{}: cannot write: {message}", path.display())]
    Write { path: PathBuf, message: String },
}

impl IoError {
    pub(crate) fn open(path: &std::path::Path, message: impl ToString) -> Self {
        Self::Open {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }

    pub(crate) fn write(path: &std::path::Path, message: impl ToString) -> Self {
        Self::Write {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }
}
