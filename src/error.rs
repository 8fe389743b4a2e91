use thiserror::Error;

/// type alias for all operations in this crate that could fail with a [`LabError`]
pub type Result<T> = std::result::Result<T, LabError>;

/// The Error variants used throughout the lab.
/// Lower level errors from third party crates are wrapped so that every entry point can
/// propagate them with `?`
#[derive(Error, Debug)]
pub enum LabError {
    /// errors caused by file or socket IO
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// errors when (de)serializing JSON
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// errors when reading the offers dataset
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// transport level errors while talking to the ClickHouse HTTP interface
    #[error("http error: {0}")]
    Http(String),

    /// ClickHouse accepted the request but answered with an error
    #[error("ClickHouse error: {0}")]
    ClickHouse(String),

    /// errors returned by the MongoDB driver
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    /// errors converting values into BSON documents
    #[error("BSON error: {0}")]
    Bson(#[from] bson::ser::Error),

    /// a MongoDB collection was requested after the connection was closed
    #[error("database not connected")]
    NotConnected,

    /// a dataset row could not be turned into a category or product document
    #[error("invalid dataset row: {0}")]
    InvalidRow(String),

    /// errors when parsing command line options or configuration values
    #[error("{0}")]
    Parsing(String),

    /// catch-all error containing a message
    #[error("{0}")]
    StringErr(String),
}

impl From<ureq::Error> for LabError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Status(code, resp) => {
                let body = resp.into_string().unwrap_or_default();
                LabError::ClickHouse(format!("status {}: {}", code, body.trim()))
            }
            ureq::Error::Transport(t) => LabError::Http(t.to_string()),
        }
    }
}
