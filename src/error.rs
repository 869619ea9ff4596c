use thiserror::Error;

/// Everything that can stop a dataset load or a chart render.
#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Please upload a dataset to proceed.")]
    NoDataset,
    #[error("No columns to parse from file")]
    EmptyDataset,
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Expected {expected} fields in line {row}, saw {found}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Column '{0}' not found")]
    UnknownColumn(String),
    #[error("Column '{column}' is not {expected}")]
    WrongColumnKind {
        column: String,
        expected: &'static str,
    },
    #[error("Column '{column}' has no values to plot")]
    NoValues { column: String },
    #[error("No numeric columns available for {chart}.")]
    NoNumericColumns { chart: &'static str },
    #[error("Please select at least one column for the Pairplot.")]
    EmptySelection,
    #[error("Invalid upload '{name}': only .csv files are accepted")]
    InvalidUpload { name: String },
    #[error("Could not find a file identifier in share link '{0}'")]
    InvalidShareLink(String),
    #[error("Failed to fetch dataset from {url}: HTTP {status}. Check that the file is shared publicly.")]
    RemoteStatus { url: String, status: u16 },
    #[error("Failed to fetch dataset: {0}")]
    RemoteTransport(#[from] reqwest::Error),
    #[error("Unknown page '{0}'")]
    UnknownPage(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to render chart: {0}")]
    Render(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DashboardError {
    /// Drawing code reports through anyhow; keep the whole context chain.
    pub fn render(err: anyhow::Error) -> Self {
        DashboardError::Render(format!("{:#}", err))
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
