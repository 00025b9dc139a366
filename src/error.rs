use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Could not decode {file}: no encoding/delimiter combination produced a table ({})", attempts.join("; "))]
    Decode { file: String, attempts: Vec<String> },

    #[error("Could not read spreadsheet {file}: {reason}")]
    Spreadsheet { file: String, reason: String },

    #[error("{file} has no data rows after the header")]
    EmptyInput { file: String },

    #[error("{file}: {missing} column not identified; columns found: [{}]", columns.join(", "))]
    ColumnNotFound {
        file: String,
        missing: String,
        columns: Vec<String>,
    },

    #[error("{file}: no row has a valid date ({dropped} rows dropped)")]
    NoValidRecords { file: String, dropped: usize },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestionError {
    /// True when the file was read but its columns could not be mapped to roles.
    pub fn is_unusable_file(&self) -> bool {
        matches!(self, IngestionError::ColumnNotFound { .. })
    }

    /// The file name the error refers to, if it is tied to one input.
    pub fn file(&self) -> Option<&str> {
        match self {
            IngestionError::Decode { file, .. }
            | IngestionError::Spreadsheet { file, .. }
            | IngestionError::EmptyInput { file }
            | IngestionError::ColumnNotFound { file, .. }
            | IngestionError::NoValidRecords { file, .. } => Some(file),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestionError>;
