//! Database handle.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use drizzle_dbd_core::error::{ConfigError, QueryError, QueryErrorKind};
use drizzle_dbd_core::{DriverErrorCode, Error, Result, Value};
use serde::Serialize;

use crate::attributes::{AttrValue, DatabaseAttr, expect_flag, read_only};
use crate::client::WireConnector;
use crate::config::DriverConfig;
use crate::connection::{Connection, Connector};
use crate::cursor::Cursor;
use crate::params::ParamStore;
use crate::placeholder::count_placeholders;
use crate::rewrite::{TypeGuessing, escape_string};
use crate::statement::Statement;
use crate::types::{SqlType, SqlTypeInfo, TYPE_INFO, type_info_for};

/// Reconnect counters, per database handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DriverStats {
    pub auto_reconnects_ok: u64,
    pub auto_reconnects_failed: u64,
}

impl DriverStats {
    fn to_attr(self) -> AttrValue {
        let mut map = BTreeMap::new();
        map.insert(
            "auto_reconnects_ok".to_string(),
            AttrValue::UInt(self.auto_reconnects_ok),
        );
        map.insert(
            "auto_reconnects_failed".to_string(),
            AttrValue::UInt(self.auto_reconnects_failed),
        );
        AttrValue::Map(map)
    }
}

/// A connected session plus its settings.
///
/// Statements borrow the handle mutably for every server round trip, so
/// one session never serves two operations at once. Reconnecting swaps
/// the session inside the handle; statements are unaffected.
pub struct Database {
    pub(crate) conn: Option<Box<dyn Connection>>,
    pub(crate) connector: Box<dyn Connector>,
    pub(crate) config: DriverConfig,
    pub(crate) insert_id: u64,
    pub(crate) stats: DriverStats,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("active", &self.is_active())
            .field("config", &self.config)
            .field("insert_id", &self.insert_id)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

fn not_connected() -> Error {
    Error::driver(DriverErrorCode::NotActive, "database handle is not connected")
}

fn transaction_error(code: DriverErrorCode, message: &str, source: Error) -> Error {
    Error::Query(QueryError {
        kind: QueryErrorKind::Transaction,
        code: code.code(),
        sqlstate: source.sqlstate().map(str::to_string),
        message: message.to_string(),
        sql: None,
        source: Some(Box::new(source)),
    })
}

impl Database {
    /// Open a session through `connector`. The same connector is used for
    /// automatic reconnects.
    #[tracing::instrument(level = "debug", skip_all, fields(host = %config.host, port = config.port))]
    pub fn connect(config: DriverConfig, connector: impl Connector + 'static) -> Result<Self> {
        let conn = connector.connect(&config)?;
        tracing::debug!(
            server = conn.server_info(),
            thread_id = conn.thread_id(),
            "connected"
        );
        Ok(Self {
            conn: Some(conn),
            connector: Box::new(connector),
            config,
            insert_id: 0,
            stats: DriverStats::default(),
        })
    }

    /// Open a session with the bundled wire client.
    pub fn connect_wire(config: DriverConfig) -> Result<Self> {
        Self::connect(config, WireConnector)
    }

    pub fn is_active(&self) -> bool {
        self.conn.is_some()
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub(crate) fn connection_mut(&mut self) -> Result<&mut (dyn Connection + 'static)> {
        self.conn.as_deref_mut().ok_or_else(not_connected)
    }

    /// Prepare `sql` for execution. Nothing is sent to the server.
    pub fn prepare(&self, sql: &str) -> Result<Statement> {
        if !self.is_active() {
            return Err(not_connected());
        }
        let statement = Statement::new(
            sql,
            count_placeholders(sql),
            self.config.use_result,
            self.config.chop_blanks,
        );
        tracing::trace!(sql, params = statement.param_count(), "prepared");
        Ok(statement)
    }

    /// Execute `sql` once with `params` bound in order and release every
    /// result. Returns the row count.
    pub fn do_statement(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        let mut store = ParamStore::new(count_placeholders(sql));
        for (i, value) in params.iter().enumerate() {
            store.bind(i + 1, value.clone(), None)?;
        }
        let execution = self.run_statement(sql, &mut store, false)?;

        let mut cursor = Cursor::default();
        cursor.start(execution.result, execution.rows, execution.more_pending);
        cursor.drain(self.connection_mut()?);
        Ok(execution.rows)
    }

    /// Commit the current transaction. Does nothing under AutoCommit.
    pub fn commit(&mut self) -> Result<()> {
        if self.config.auto_commit {
            tracing::warn!("commit ineffective with AutoCommit enabled");
            return Ok(());
        }
        self.connection_mut()?.commit()
    }

    /// Roll back the current transaction. Does nothing under AutoCommit.
    pub fn rollback(&mut self) -> Result<()> {
        if self.config.auto_commit {
            tracing::warn!("rollback ineffective with AutoCommit enabled");
            return Ok(());
        }
        self.connection_mut()?.rollback()
    }

    pub fn auto_commit(&self) -> bool {
        self.config.auto_commit
    }

    /// Switch the session's autocommit mode. The handle's setting only
    /// changes when the server accepted it.
    pub fn set_auto_commit(&mut self, enabled: bool) -> Result<()> {
        self.connection_mut()?
            .set_autocommit(enabled)
            .map_err(|e| {
                let message = if enabled {
                    "Turning on AutoCommit failed"
                } else {
                    "Turning off AutoCommit failed"
                };
                transaction_error(DriverErrorCode::AutoCommit, message, e)
            })?;
        self.config.auto_commit = enabled;
        Ok(())
    }

    pub fn ping(&mut self) -> Result<()> {
        self.connection_mut()?.ping()
    }

    /// Close the session. Later calls that need the server fail.
    pub fn disconnect(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            conn.close();
            tracing::debug!("disconnected");
        }
    }

    /// Render `value` as an SQL literal.
    ///
    /// `None` when `sql_type` is a type written without quotes. Text that
    /// is not valid UTF-8 after escaping is written as a hex literal.
    pub fn quote(&self, value: &Value, sql_type: Option<SqlType>) -> Option<String> {
        let Some(raw) = value.to_sql_bytes() else {
            return Some("NULL".to_string());
        };
        if let Some(info) = sql_type.and_then(type_info_for) {
            info.literal_prefix?;
        }
        let escaped = match &self.conn {
            Some(conn) => conn.escape_literal(&raw),
            None => escape_string(&raw),
        };
        Some(match String::from_utf8(escaped) {
            Ok(text) => format!("'{}'", text),
            Err(_) => {
                let mut hex = String::with_capacity(raw.len() * 2 + 3);
                hex.push_str("X'");
                for byte in raw.iter() {
                    let _ = write!(hex, "{:02X}", byte);
                }
                hex.push('\'');
                hex
            }
        })
    }

    /// The SQL type catalog, one record per type.
    pub fn type_info_all(&self) -> &'static [SqlTypeInfo] {
        &TYPE_INFO
    }

    /// Insert id of the last statement that produced no result set.
    pub fn last_insert_id(&self) -> u64 {
        self.insert_id
    }

    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    pub fn attribute(&self, attr: DatabaseAttr) -> AttrValue {
        match attr {
            DatabaseAttr::AutoCommit => AttrValue::Bool(self.config.auto_commit),
            DatabaseAttr::AutoReconnect => AttrValue::Bool(self.config.auto_reconnect),
            DatabaseAttr::UseResult => AttrValue::Bool(self.config.use_result),
            DatabaseAttr::UseBufferedResult => AttrValue::Bool(!self.config.use_result),
            DatabaseAttr::UnsafeTypeGuessing => AttrValue::Int(self.config.type_guessing.level()),
            DatabaseAttr::EnableUtf8 => AttrValue::Bool(self.config.enable_utf8),
            DatabaseAttr::ChopBlanks => AttrValue::Bool(self.config.chop_blanks),
            DatabaseAttr::InsertId => AttrValue::UInt(self.insert_id),
            DatabaseAttr::Stats => self.stats.to_attr(),
            DatabaseAttr::ServerInfo => self
                .conn
                .as_ref()
                .map_or(AttrValue::Null, |c| AttrValue::from(c.server_info())),
            DatabaseAttr::ThreadId => self
                .conn
                .as_ref()
                .map_or(AttrValue::Null, |c| AttrValue::UInt(c.thread_id())),
        }
    }

    pub fn set_attribute(&mut self, attr: DatabaseAttr, value: AttrValue) -> Result<()> {
        if attr.is_read_only() {
            return Err(read_only(attr.name()));
        }
        match attr {
            DatabaseAttr::AutoCommit => self.set_auto_commit(expect_flag(&value)?)?,
            DatabaseAttr::AutoReconnect => self.config.auto_reconnect = expect_flag(&value)?,
            DatabaseAttr::UseResult => self.config.use_result = expect_flag(&value)?,
            DatabaseAttr::UseBufferedResult => self.config.use_result = !expect_flag(&value)?,
            DatabaseAttr::UnsafeTypeGuessing => {
                let level = value.as_i64().ok_or_else(|| {
                    Error::Config(ConfigError {
                        message: format!("{} expects an integer level", attr.name()),
                        source: None,
                    })
                })?;
                self.config.type_guessing = TypeGuessing::from_level(level);
            }
            DatabaseAttr::EnableUtf8 => self.config.enable_utf8 = expect_flag(&value)?,
            DatabaseAttr::ChopBlanks => self.config.chop_blanks = expect_flag(&value)?,
            DatabaseAttr::InsertId
            | DatabaseAttr::Stats
            | DatabaseAttr::ServerInfo
            | DatabaseAttr::ThreadId => return Err(read_only(attr.name())),
        }
        tracing::trace!(attr = attr.name(), "attribute set");
        Ok(())
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        let Some(conn) = self.conn.as_mut() else {
            return;
        };
        if !self.config.auto_commit {
            if let Err(err) = conn.rollback() {
                let err = transaction_error(DriverErrorCode::Rollback, "ROLLBACK failed", err);
                tracing::warn!(error = %err, "rollback on close failed");
            }
        }
        self.disconnect();
    }
}
