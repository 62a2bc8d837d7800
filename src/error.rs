use thiserror::Error;

/// Errors returned by the core slot table.
///
/// Mirrors the `-EINVAL`/`-ENOMEM`/`-EEXIST`/`-ENOENT` taxonomy of the table
/// this crate forwards for, kept private to this crate: callers only ever
/// see [`L2Error`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub(crate) enum TableError {
    #[error("invalid argument: {0}")]
    Invalid(String),
    #[error("table is full")]
    NoMemory,
    #[error("entry already exists")]
    Exists,
    #[error("entry not found")]
    NotFound,
}

/// Errors surfaced by the public API: the table itself, MAC parsing, and
/// command dispatch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum L2Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("out of memory: table is full")]
    OutOfMemory,
}

impl L2Error {
    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        L2Error::InvalidArgument(msg.into())
    }

    pub(crate) fn already_exists(mac: impl Into<String>) -> Self {
        L2Error::AlreadyExists(mac.into())
    }

    pub(crate) fn not_found(mac: impl Into<String>) -> Self {
        L2Error::NotFound(mac.into())
    }

    /// Attach the offending MAC string to a bare [`TableError`], the way
    /// command glue is required to reference the MAC that triggered it.
    pub(crate) fn from_table_error(err: TableError, mac: &str) -> Self {
        match err {
            TableError::Invalid(msg) => L2Error::InvalidArgument(msg),
            TableError::NoMemory => L2Error::OutOfMemory,
            TableError::Exists => L2Error::already_exists(mac),
            TableError::NotFound => L2Error::not_found(mac),
        }
    }
}

pub(crate) type TableResult<T> = std::result::Result<T, TableError>;
pub type Result<T> = std::result::Result<T, L2Error>;
