use thiserror::Error;

use crate::host::HostError;
use crate::protocol::backend::ServerError;

pub use color_eyre::eyre::eyre;

/// Return code reported back to the host for every invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnCode {
    Ok,
    /// The cursor is exhausted; there is nothing more to load.
    Finished,
    /// The host already holds observations that `prepare` would clobber.
    DataInMemory,
    Usage,
    Database,
    /// A host storage call failed with this code.
    Host(i32),
}

impl ReturnCode {
    pub const FALLBACK_HOST_CODE: i32 = 498;

    pub fn code(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::Finished => 1,
            Self::DataInMemory => 4,
            Self::Usage => 198,
            Self::Database => 200,
            Self::Host(code) if code != 0 => code,
            Self::Host(_) => Self::FALLBACK_HOST_CODE,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    ServerError(#[from] ServerError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Bad config error: {0}")]
    BadConfigError(String),

    #[error("Bad usage error: {0}")]
    BadUsageError(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Unsupported authentication method: {0}")]
    UnsupportedAuth(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("Database error: not connected")]
    NotConnected,

    #[error("Database error: connection failed.\n{0}")]
    Connection(#[source] Box<Error>),

    #[error("{0}")]
    Query(#[source] Box<Error>),

    #[error("{0}")]
    SchemaResolution(#[source] Box<Error>),

    #[error("Must call \"prepare\" before calling \"populate_next\"")]
    NoPreparedQuery,

    #[error("no; data in memory would be lost")]
    DataInMemory,

    #[error("failed to parse date {value:?} at ({obs}, {var})")]
    DateParse { obs: usize, var: usize, value: String },

    #[error("failed to parse {value:?} as a number at ({obs}, {var})")]
    ValueParse { obs: usize, var: usize, value: String },

    #[error("failed to store oid:{oid} at ({obs},{var}): {source}")]
    HostWrite {
        oid: u32,
        obs: usize,
        var: usize,
        #[source]
        source: HostError,
    },

    #[error("failed to publish {name}: {source}")]
    HostMacro {
        name: &'static str,
        #[source]
        source: HostError,
    },

    #[error("Library bug: {0}")]
    LibraryBug(#[from] color_eyre::Report),
}

impl Error {
    /// Wraps a database-level failure of a cursor statement.
    pub fn query(err: Error) -> Self {
        Self::Query(Box::new(err))
    }

    pub fn connection(err: Error) -> Self {
        Self::Connection(Box::new(err))
    }

    /// Whether the underlying connection can no longer be used.
    pub fn is_connection_broken(&self) -> bool {
        match self {
            Self::IoError(_) | Self::InvalidMessage(_) | Self::NotConnected => true,
            Self::Connection(_) => true,
            Self::Query(inner) | Self::SchemaResolution(inner) => inner.is_connection_broken(),
            _ => false,
        }
    }

    pub fn return_code(&self) -> ReturnCode {
        match self {
            Self::Usage(_) | Self::NoPreparedQuery | Self::BadUsageError(_) => ReturnCode::Usage,
            Self::DataInMemory => ReturnCode::DataInMemory,
            Self::HostWrite { source, .. } | Self::HostMacro { source, .. } => {
                ReturnCode::Host(source.code)
            }
            _ => ReturnCode::Database,
        }
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(err: std::convert::Infallible) -> Self {
        match err {}
    }
}

pub type Result<T> = std::result::Result<T, Error>;
