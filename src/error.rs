use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ConvertError {
    #[error("time dimension not found (tried {})", tried.join(" and "))]
    TemporalDimensionNotFound { tried: Vec<String> },

    #[error("time variable {0} has no dimensions")]
    TemporalMarkerScalar(String),

    #[error("failed to read {path}: {message}")]
    Read { path: Utf8PathBuf, message: String },

    #[error("unsupported data type {dtype} for variable {variable}")]
    UnsupportedDataType { variable: String, dtype: String },

    #[error("invalid variable: {0}")]
    InvalidVariable(String),

    #[error("failed to write {path}: {message}")]
    Write { path: Utf8PathBuf, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("worker count must be at least 1, got {0}")]
    #[diagnostic(help("pass --workers with a positive value"))]
    InvalidWorkerCount(usize),

    #[error("no data directory given")]
    #[diagnostic(help("pass DATA_DIR or set data_dir in the config file"))]
    MissingDataDir,

    #[error("data directory not found: {0}")]
    DataDirNotFound(Utf8PathBuf),

    #[error("conversion panicked: {0}")]
    Panicked(String),

    #[error("failed to start worker pool: {0}")]
    ThreadPool(String),
}

impl ConvertError {
    pub fn read(path: impl Into<Utf8PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Read {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub fn write(path: impl Into<Utf8PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Write {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Errors that stop the run before any file is converted.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ConvertError::ConfigRead(_)
                | ConvertError::ConfigParse(_)
                | ConvertError::InvalidWorkerCount(_)
                | ConvertError::MissingDataDir
                | ConvertError::DataDirNotFound(_)
        )
    }
}
