use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("scan unavailable: {0}")]
    ScanUnavailable(String),

    #[error("whitelist unavailable: {0}")]
    WhitelistUnavailable(String),

    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("scan session {session} superseded by session {latest}")]
    Superseded { session: u64, latest: u64 },

    #[error("invalid bssid: {0}")]
    InvalidBssid(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::PersistenceFailure(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
