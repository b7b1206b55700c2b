//! Connection configuration.
//!
//! Holds the connect parameters for the wire client plus the session
//! defaults a new database handle starts with. Built either with the
//! builder methods or from a DBI-style DSN string.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use drizzle_dbd_core::error::ConfigError;
use drizzle_dbd_core::{Error, Result};

use crate::rewrite::TypeGuessing;

/// Driver configuration.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Hostname or IP address
    pub host: String,
    /// Port number (default: 3306)
    pub port: u16,
    /// Unix socket path; takes precedence over host/port when set
    pub socket: Option<PathBuf>,
    pub user: String,
    pub password: Option<String>,
    /// Default database selected at connect time
    pub database: Option<String>,
    /// Connection character set number
    pub charset: u8,
    pub connect_timeout: Duration,
    /// Read/write timeout on the established stream; `None` blocks forever
    pub read_timeout: Option<Duration>,
    /// Report matched rather than changed rows for UPDATE
    pub client_found_rows: bool,
    /// Allow several statements separated by `;` in one execute
    pub multi_statements: bool,
    /// LOAD DATA LOCAL INFILE is refused unless set
    pub local_infile: bool,
    /// Compressed protocol; not implemented by the wire client
    pub compression: bool,
    /// Connection attributes sent with the handshake
    pub attributes: BTreeMap<String, String>,
    pub max_packet_size: u32,

    /// Reconnect once when the server has gone away (auto-commit only)
    pub auto_reconnect: bool,
    /// Stream rows instead of buffering the whole result
    pub use_result: bool,
    pub type_guessing: TypeGuessing,
    /// Decode text columns as UTF-8
    pub enable_utf8: bool,
    /// Trim trailing spaces from fetched text columns
    pub chop_blanks: bool,
    pub auto_commit: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            socket: None,
            user: String::new(),
            password: None,
            database: None,
            charset: crate::protocol::charset::DEFAULT_CHARSET,
            connect_timeout: Duration::from_secs(30),
            read_timeout: None,
            client_found_rows: false,
            multi_statements: false,
            local_infile: false,
            compression: false,
            attributes: BTreeMap::new(),
            max_packet_size: 16 * 1024 * 1024,
            auto_reconnect: false,
            use_result: false,
            type_guessing: TypeGuessing::Off,
            enable_utf8: true,
            chop_blanks: false,
            auto_commit: true,
        }
    }
}

impl DriverConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a DSN of the form `database=test;host=db;port=3307`.
    ///
    /// A leading `dbi:drizzle:` prefix is accepted. A bare first segment
    /// without `=` names the database. Keys are case-insensitive and may
    /// carry a `drizzle_` prefix.
    pub fn from_dsn(dsn: &str) -> Result<Self> {
        let body = strip_dsn_prefix(dsn);
        let mut config = Self::default();

        for (i, part) in body.split([';', ':']).enumerate() {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let Some((key, value)) = part.split_once('=') else {
                if i == 0 {
                    config.database = Some(part.to_string());
                    continue;
                }
                return Err(config_error(format!("malformed DSN segment '{}'", part)));
            };
            let key = key.trim().to_ascii_lowercase();
            let key = key.strip_prefix("drizzle_").unwrap_or(&key);
            let value = value.trim();
            match key {
                "database" | "db" | "dbname" => config.database = Some(value.to_string()),
                "host" | "hostname" => config.host = value.to_string(),
                "port" => config.port = parse_value(key, value)?,
                "socket" => config.socket = Some(PathBuf::from(value)),
                "user" | "username" => config.user = value.to_string(),
                "password" => config.password = Some(value.to_string()),
                "connect_timeout" => {
                    config.connect_timeout = Duration::from_secs(parse_value(key, value)?);
                }
                "read_timeout" => {
                    config.read_timeout = Some(Duration::from_secs(parse_value(key, value)?));
                }
                "client_found_rows" => config.client_found_rows = parse_flag(key, value)?,
                "multi_statements" => config.multi_statements = parse_flag(key, value)?,
                "local_infile" => config.local_infile = parse_flag(key, value)?,
                "compression" => config.compression = parse_flag(key, value)?,
                "auto_reconnect" => config.auto_reconnect = parse_flag(key, value)?,
                "use_result" => config.use_result = parse_flag(key, value)?,
                "enable_utf8" => config.enable_utf8 = parse_flag(key, value)?,
                "chopblanks" | "chop_blanks" => config.chop_blanks = parse_flag(key, value)?,
                "autocommit" | "auto_commit" => config.auto_commit = parse_flag(key, value)?,
                "unsafe_type_guessing" | "unsafe_bind_type_guessing" => {
                    config.type_guessing = TypeGuessing::from_level(parse_value(key, value)?);
                }
                other => {
                    tracing::debug!(key = other, "ignoring unknown DSN attribute");
                }
            }
        }

        Ok(config)
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn socket(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket = Some(path.into());
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn charset(mut self, charset: u8) -> Self {
        self.charset = charset;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn client_found_rows(mut self, enabled: bool) -> Self {
        self.client_found_rows = enabled;
        self
    }

    pub fn multi_statements(mut self, enabled: bool) -> Self {
        self.multi_statements = enabled;
        self
    }

    /// Enable or disable local infile handling.
    ///
    /// # Security Warning
    /// A malicious server can ask for any file the client can read.
    pub fn local_infile(mut self, enabled: bool) -> Self {
        self.local_infile = enabled;
        self
    }

    pub fn compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    /// Set a connection attribute.
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn max_packet_size(mut self, size: u32) -> Self {
        self.max_packet_size = size;
        self
    }

    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    pub fn use_result(mut self, enabled: bool) -> Self {
        self.use_result = enabled;
        self
    }

    pub fn type_guessing(mut self, mode: TypeGuessing) -> Self {
        self.type_guessing = mode;
        self
    }

    pub fn enable_utf8(mut self, enabled: bool) -> Self {
        self.enable_utf8 = enabled;
        self
    }

    pub fn chop_blanks(mut self, enabled: bool) -> Self {
        self.chop_blanks = enabled;
        self
    }

    pub fn auto_commit(mut self, enabled: bool) -> Self {
        self.auto_commit = enabled;
        self
    }

    /// `host:port` for TCP connects.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Capability flags requested in the handshake response.
    pub fn capability_flags(&self) -> u32 {
        use crate::protocol::capabilities::{
            CLIENT_COMPRESS, CLIENT_CONNECT_ATTRS, CLIENT_CONNECT_WITH_DB, CLIENT_FOUND_ROWS,
            CLIENT_LOCAL_FILES, CLIENT_MULTI_STATEMENTS, DEFAULT_CLIENT_FLAGS,
        };

        let mut flags = DEFAULT_CLIENT_FLAGS;
        if self.database.is_some() {
            flags |= CLIENT_CONNECT_WITH_DB;
        }
        if self.client_found_rows {
            flags |= CLIENT_FOUND_ROWS;
        }
        if self.multi_statements {
            flags |= CLIENT_MULTI_STATEMENTS;
        }
        if self.compression {
            flags |= CLIENT_COMPRESS;
        }
        if self.local_infile {
            flags |= CLIENT_LOCAL_FILES;
        }
        if !self.attributes.is_empty() {
            flags |= CLIENT_CONNECT_ATTRS;
        }
        flags
    }
}

fn strip_dsn_prefix(dsn: &str) -> &str {
    let lower = dsn.get(..12).map(str::to_ascii_lowercase);
    if lower.as_deref() == Some("dbi:drizzle:") {
        &dsn[12..]
    } else {
        dsn
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.parse().map_err(|e| {
        Error::Config(ConfigError {
            message: format!("invalid value '{}' for DSN attribute {}", value, key),
            source: Some(Box::new(e)),
        })
    })
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" | "" => Ok(false),
        _ => Err(config_error(format!(
            "invalid flag '{}' for DSN attribute {}",
            value, key
        ))),
    }
}

fn config_error(message: String) -> Error {
    Error::Config(ConfigError {
        message,
        source: None,
    })
}
