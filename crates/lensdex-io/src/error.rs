use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot open '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("index store: {0}")]
    Store(String),

    /// The store accepted the bulk call but refused some of its documents.
    #[error("{rejected} of {total} bulk items failed, first: {reason}")]
    Rejected {
        rejected: usize,
        total: usize,
        reason: String,
    },

    #[error("http: {0}")]
    Http(String),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid store url: {0}")]
    Url(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e.to_string())
    }
}
