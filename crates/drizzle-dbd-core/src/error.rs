//! Error types for driver operations.

use std::fmt;

/// Client error code for "MySQL server has gone away".
pub const CR_SERVER_GONE_ERROR: u16 = 2006;
/// Client error code for "Lost connection to MySQL server during query".
pub const CR_SERVER_LOST: u16 = 2013;
/// Client error code for a malformed packet.
pub const CR_MALFORMED_PACKET: u16 = 2027;

/// The primary error type for all driver operations.
#[derive(Debug)]
pub enum Error {
    /// Connection-related errors (connect, authentication, lost session)
    Connection(ConnectionError),
    /// The server (or the driver on its behalf) rejected a statement
    Query(QueryError),
    /// Wire-level protocol violations
    Protocol(ProtocolError),
    /// Binding to a placeholder that does not exist
    Parameter(ParameterError),
    /// Operation called out of order (fetch without execute, ...)
    Sequence(String),
    /// Feature that is recognized but never attempted
    Unsupported(String),
    /// Allocation of the rewritten statement failed; nothing was sent
    OutOfMemory { requested: usize },
    /// Configuration errors
    Config(ConfigError),
    /// I/O errors
    Io(std::io::Error),
}

/// Driver-side error numbers reported when the server did not supply one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum DriverErrorCode {
    Connect = 1,
    NotActive = 4,
    Query = 5,
    FetchRow = 6,
    ListFields = 11,
    NoResult = 14,
    NotImplemented = 15,
    IllegalParamNum = 16,
    Mem = 17,
    Sequence = 19,
    AutoCommit = 21,
    Commit = 22,
    Rollback = 23,
}

impl DriverErrorCode {
    /// The numeric code as reported through `err`.
    pub const fn code(self) -> u16 {
        self as u16
    }
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    /// Client error number (2002, 2006, 2013, ...) when known
    pub code: Option<u16>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to establish connection
    Connect,
    /// Authentication failed
    Authentication,
    /// The server went away or the stream broke mid-command
    Disconnected,
    /// Connection refused
    Refused,
    /// Connect or read timeout elapsed
    Timeout,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    /// Server errno, or a [`DriverErrorCode`] for driver-raised failures
    pub code: u16,
    pub sqlstate: Option<String>,
    pub message: String,
    pub sql: Option<String>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Error packet sent by the server
    Server,
    /// Transaction control (autocommit, commit, rollback) failed
    Transaction,
    /// Raised by the driver before anything reached the server
    Driver,
}

#[derive(Debug)]
pub struct ProtocolError {
    pub message: String,
    pub raw_data: Option<Vec<u8>>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterError {
    /// 1-based index the caller asked for
    pub index: usize,
    /// Number of placeholders in the statement
    pub count: usize,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Error number in the `err` namespace: server errno, client errno, or
    /// a driver code.
    pub fn code(&self) -> Option<u16> {
        match self {
            Error::Connection(e) => Some(e.code.unwrap_or(DriverErrorCode::Connect.code())),
            Error::Query(e) => Some(e.code),
            Error::Protocol(_) => Some(CR_MALFORMED_PACKET),
            Error::Parameter(_) => Some(DriverErrorCode::IllegalParamNum.code()),
            Error::Sequence(_) => Some(DriverErrorCode::Sequence.code()),
            Error::Unsupported(_) => Some(DriverErrorCode::NotImplemented.code()),
            Error::OutOfMemory { .. } => Some(DriverErrorCode::Mem.code()),
            Error::Config(_) | Error::Io(_) => None,
        }
    }

    /// Get SQLSTATE if available (e.g., "42S02" for unknown table)
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sqlstate.as_deref(),
            _ => None,
        }
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }

    /// Does this error mean the session is gone and a reconnect may help?
    pub fn is_server_gone(&self) -> bool {
        self.code() == Some(CR_SERVER_GONE_ERROR)
    }

    /// Is this a connection error that likely requires reconnection?
    pub fn is_connection_error(&self) -> bool {
        match self {
            Error::Connection(_) | Error::Io(_) => true,
            Error::Query(q) => matches!(q.code, CR_SERVER_GONE_ERROR | CR_SERVER_LOST),
            _ => false,
        }
    }

    /// Build a "server gone" error for a write that never reached the server.
    pub fn server_gone(source: std::io::Error) -> Self {
        Error::Connection(ConnectionError {
            kind: ConnectionErrorKind::Disconnected,
            code: Some(CR_SERVER_GONE_ERROR),
            message: "MySQL server has gone away".to_string(),
            source: Some(Box::new(source)),
        })
    }

    /// Build a "lost connection" error for a read that broke mid-result.
    pub fn server_lost(source: std::io::Error) -> Self {
        Error::Connection(ConnectionError {
            kind: ConnectionErrorKind::Disconnected,
            code: Some(CR_SERVER_LOST),
            message: "Lost connection to MySQL server during query".to_string(),
            source: Some(Box::new(source)),
        })
    }

    /// Build a driver-raised query error with the given code.
    pub fn driver(code: DriverErrorCode, message: impl Into<String>) -> Self {
        Error::Query(QueryError {
            kind: QueryErrorKind::Driver,
            code: code.code(),
            sqlstate: None,
            message: message.into(),
            sql: None,
            source: None,
        })
    }

    /// Build a protocol error from a message.
    pub fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol(ProtocolError {
            message: message.into(),
            raw_data: None,
            source: None,
        })
    }
}

impl QueryError {
    /// Attach the statement text that produced this error.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e),
            Error::Query(e) => {
                if let Some(sqlstate) = &e.sqlstate {
                    write!(f, "Query error {} (SQLSTATE {}): {}", e.code, sqlstate, e.message)
                } else {
                    write!(f, "Query error {}: {}", e.code, e.message)
                }
            }
            Error::Protocol(e) => write!(f, "Protocol error: {}", e.message),
            Error::Parameter(e) => write!(f, "{}", e),
            Error::Sequence(msg) => write!(f, "{}", msg),
            Error::Unsupported(msg) => write!(f, "{}", msg),
            Error::OutOfMemory { requested } => {
                write!(f, "Out of memory allocating {} bytes for statement", requested)
            }
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Protocol(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} ({})", self.message, code),
            None => write!(f, "{}", self.message),
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sqlstate) = &self.sqlstate {
            write!(f, "{} (SQLSTATE {})", self.message, sqlstate)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Illegal parameter number {} (statement has {})",
            self.index, self.count
        )
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<ProtocolError> for Error {
    fn from(err: ProtocolError) -> Self {
        Error::Protocol(err)
    }
}

impl From<ParameterError> for Error {
    fn from(err: ParameterError) -> Self {
        Error::Parameter(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

/// Result type alias for driver operations.
pub type Result<T> = std::result::Result<T, Error>;
