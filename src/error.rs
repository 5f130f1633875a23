use std::path::PathBuf;

/// Result type alias for operations that fail with a typed [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Error types surfaced to callers of the generators and the config loader
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
    #[error("Go module path is unknown: set project.module or add a go.mod to the project root")]
    MissingModule,
    #[error("formatting failed: {0}")]
    Format(String),
}
