//! Statement execution: rewrite, submit, reconnect once, fetch the result.

use std::borrow::Cow;

use drizzle_dbd_core::{DriverErrorCode, Error, Result};

use crate::connection::ResultSet;
use crate::cursor::discard_pending;
use crate::database::Database;
use crate::params::ParamStore;
use crate::rewrite::rewrite;

/// What one execute produced.
#[derive(Debug)]
pub(crate) struct Execution {
    /// Buffered row count, affected rows when there is no result set, 0
    /// for a streaming result.
    pub rows: u64,
    pub result: Option<ResultSet>,
    pub more_pending: bool,
    pub insert_id: u64,
    pub warning_count: u16,
}

/// Table named by a `LISTFIELDS <table>` pseudo-statement, if `sql` is one.
pub(crate) fn listfields_table(sql: &[u8]) -> Result<Option<&str>> {
    let sql = sql.trim_ascii_start();
    let Some(rest) = sql
        .strip_prefix(b"listfields ")
        .or_else(|| sql.strip_prefix(b"LISTFIELDS "))
    else {
        return Ok(None);
    };
    let rest = rest.trim_ascii_start();
    let end = rest
        .iter()
        .position(u8::is_ascii_whitespace)
        .unwrap_or(rest.len());
    if end == 0 {
        return Err(Error::driver(DriverErrorCode::Query, "Missing table name"));
    }
    std::str::from_utf8(&rest[..end])
        .map(Some)
        .map_err(|_| Error::driver(DriverErrorCode::ListFields, "Table name is not valid UTF-8"))
}

fn with_sql(err: Error, sql: &[u8]) -> Error {
    match err {
        Error::Query(q) if q.sql.is_none() => {
            Error::Query(q.with_sql(String::from_utf8_lossy(sql)))
        }
        other => other,
    }
}

impl Database {
    /// Run `statement` with `params` substituted.
    ///
    /// Results still pending on the session from any earlier statement are
    /// read and thrown away first.
    ///
    /// A server-gone failure on submit is retried exactly once after a
    /// reconnect, and only while both auto-reconnect and auto-commit are
    /// on. Any other failure, or a second one, is returned as-is.
    #[tracing::instrument(level = "debug", skip_all, fields(params = params.len(), use_result = use_result))]
    pub(crate) fn run_statement(
        &mut self,
        statement: &str,
        params: &mut ParamStore,
        use_result: bool,
    ) -> Result<Execution> {
        let guessing = self.config.type_guessing;
        let conn = self.connection_mut()?;
        let sql: Cow<'_, [u8]> = rewrite(statement, params, guessing, &|raw: &[u8]| {
            conn.escape_literal(raw)
        })?;

        // A handle dropped mid-stream leaves its rows on the wire.
        if let Err(err) = discard_pending(conn) {
            tracing::warn!(error = %err, "error while freeing results left on the session");
        }

        if let Some(table) = listfields_table(&sql)? {
            tracing::trace!(table, "listing fields");
            let result = self
                .connection_mut()?
                .list_fields(table)
                .map_err(|e| with_sql(e, &sql))?;
            return Ok(Execution {
                rows: 0,
                result: Some(result),
                more_pending: false,
                insert_id: self.insert_id,
                warning_count: 0,
            });
        }

        if let Err(err) = self.connection_mut()?.submit_query(&sql) {
            if !self.should_reconnect(&err) || !self.reconnect() {
                return Err(with_sql(err, &sql));
            }
            self.connection_mut()?
                .submit_query(&sql)
                .map_err(|e| with_sql(e, &sql))?;
        }

        let conn = self.connection_mut()?;
        let result = if use_result {
            conn.use_result()
        } else {
            conn.store_result()
        }
        .map_err(|e| with_sql(e, &sql))?;

        let rows = match &result {
            Some(rs) => rs.buffered_len().map_or(0, |n| n as u64),
            None => conn.affected_rows(),
        };
        let more_pending = conn.more_results();
        let warning_count = conn.warning_count();
        if result.is_none() {
            self.insert_id = conn.insert_id();
        }
        tracing::trace!(rows, more_pending, "statement executed");

        Ok(Execution {
            rows,
            result,
            more_pending,
            insert_id: self.insert_id,
            warning_count,
        })
    }

    fn should_reconnect(&self, err: &Error) -> bool {
        err.is_server_gone() && self.config.auto_reconnect && self.config.auto_commit
    }

    /// Replace the session with a fresh one. On failure the old session
    /// stays in place.
    fn reconnect(&mut self) -> bool {
        match self.connector.connect(&self.config) {
            Ok(fresh) => {
                if let Some(mut old) = self.conn.replace(fresh) {
                    old.close();
                }
                self.stats.auto_reconnects_ok += 1;
                tracing::debug!(
                    reconnects = self.stats.auto_reconnects_ok,
                    "reconnected after server went away"
                );
                true
            }
            Err(err) => {
                self.stats.auto_reconnects_failed += 1;
                tracing::warn!(error = %err, "auto-reconnect failed");
                false
            }
        }
    }
}
