use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (bad tolerance, empty marker, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// A configured column could not be located in a sheet.
    #[error("{source_name} sheet '{sheet}': schema mismatch on column '{column}': {reason}")]
    SchemaMismatch {
        source_name: String,
        sheet: String,
        column: String,
        reason: String,
    },
    /// A named sheet is absent from the workbook.
    #[error("{source_name}: sheet '{sheet}' not found")]
    MissingSheet { source_name: String, sheet: String },
    /// Workbook or sheet holds no usable rows.
    #[error("{source_name}: input is empty")]
    EmptyInput { source_name: String },
}

impl ReconError {
    pub(crate) fn schema(
        source_name: &str,
        sheet: &str,
        column: &str,
        reason: impl Into<String>,
    ) -> Self {
        Self::SchemaMismatch {
            source_name: source_name.into(),
            sheet: sheet.into(),
            column: column.into(),
            reason: reason.into(),
        }
    }
}
