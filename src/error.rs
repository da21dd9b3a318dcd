use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PanelError {
    #[error("No data file for {year} (looked for {})", .path.display())]
    NotFound { year: i32, path: PathBuf },

    #[error("{view}: missing required columns: {}", .columns.join(", "))]
    MissingColumns { view: String, columns: Vec<String> },

    #[error("No records for year {0}")]
    NoSuchYear(i32),

    #[error("At least two years of data are needed for a comparison")]
    NotEnoughYears,

    #[error("{view}: no matching records")]
    NoRows { view: String },

    #[error("Input is not tabular: {0}")]
    NotTabular(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "xlsx")]
    #[error("XLSX error: {0}")]
    Xlsx(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

impl PanelError {
    /// Structural problems a view reports as a warning and then stops.
    pub fn is_data_warning(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::MissingColumns { .. }
                | Self::NoSuchYear(_)
                | Self::NotEnoughYears
                | Self::NoRows { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PanelError>;
