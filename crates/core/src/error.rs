use thiserror::Error;

/// Failure to turn a recording byte stream into an [`EventCollection`](crate::EventCollection).
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed record on line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Recording is empty")]
    Empty,

    #[error("{0}")]
    Other(String),
}
