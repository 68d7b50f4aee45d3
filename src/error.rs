use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors: anything that prevents reading or writing one of the
/// run's files. Dirty data inside a successfully loaded source is never
/// an error; it is handled by the flattener and the skip log.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The record source parsed as JSON but is not an array of mappings.
    #[error("unexpected shape in {}: {message}", path.display())]
    Shape { path: PathBuf, message: String },

    #[error("failed to write {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

pub type ExtractResult<T> = Result<T, ExtractError>;
