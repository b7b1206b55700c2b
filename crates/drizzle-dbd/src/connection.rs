//! The session seam between the statement layer and the wire.
//!
//! [`Connection`] is what the execution engine drives: submit text, pull
//! the result back buffered or streaming, step through multi-result
//! sequences, and manage the transaction mode. [`Connector`] opens
//! sessions, both initially and when reconnecting.
//!
//! [`WireConnection`](crate::client::WireConnection) is the bundled
//! implementation.

use std::collections::VecDeque;
use std::sync::Arc;

use drizzle_dbd_core::Result;

use crate::config::DriverConfig;
use crate::rewrite::escape_string;
use crate::types::ColumnDef;

/// One undecoded text-protocol row; `None` is SQL NULL.
pub type RawRow = Vec<Option<Vec<u8>>>;

/// Where the rows of a result set come from.
#[derive(Debug, Clone, PartialEq)]
pub enum RowSource {
    /// Read completely at execute time.
    Buffered(VecDeque<RawRow>),
    /// Read from the connection one row per fetch.
    Streaming,
}

/// Column metadata plus row source for one result in a sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    pub columns: Arc<[ColumnDef]>,
    pub rows: RowSource,
}

impl ResultSet {
    pub fn buffered(columns: impl Into<Arc<[ColumnDef]>>, rows: Vec<RawRow>) -> Self {
        Self {
            columns: columns.into(),
            rows: RowSource::Buffered(rows.into()),
        }
    }

    pub fn streaming(columns: impl Into<Arc<[ColumnDef]>>) -> Self {
        Self {
            columns: columns.into(),
            rows: RowSource::Streaming,
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.rows, RowSource::Streaming)
    }

    /// Rows not yet fetched, if the result is buffered.
    pub fn buffered_len(&self) -> Option<usize> {
        match &self.rows {
            RowSource::Buffered(rows) => Some(rows.len()),
            RowSource::Streaming => None,
        }
    }
}

/// Outcome of advancing to the next pending result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextResult {
    /// Another result has been read and is ready for `store_result` or
    /// `use_result`.
    More,
    /// Nothing was pending.
    Done,
}

/// A live session with the server.
///
/// Every call blocks until the server answers. A result set that was
/// opened with [`use_result`](Connection::use_result) must be read to the
/// end (or discarded) before the next command.
pub trait Connection: Send {
    /// Send a statement and read the first response.
    ///
    /// Fails with a server-gone error (2006) when the session was lost
    /// before the statement reached the server.
    fn submit_query(&mut self, sql: &[u8]) -> Result<()>;

    /// Read the whole current result. `None` when it carries no rows.
    fn store_result(&mut self) -> Result<Option<ResultSet>>;

    /// Open the current result for row-by-row reading. `None` when it
    /// carries no rows.
    fn use_result(&mut self) -> Result<Option<ResultSet>>;

    /// Next row of the open streaming result; `None` after the last one.
    fn fetch_streamed_row(&mut self) -> Result<Option<RawRow>>;

    /// Skip whatever is left of the open streaming result.
    fn discard_rows(&mut self) -> Result<()>;

    /// Does the server have more results pending for the last statement?
    fn more_results(&self) -> bool;

    /// Read the next pending result.
    fn next_result(&mut self) -> Result<NextResult>;

    /// Rows changed by the last statement.
    fn affected_rows(&self) -> u64;

    fn insert_id(&self) -> u64;

    fn warning_count(&self) -> u16;

    /// Column metadata of `table`, as a result set without rows.
    fn list_fields(&mut self, table: &str) -> Result<ResultSet>;

    fn set_autocommit(&mut self, enabled: bool) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    /// Escape `raw` for a single-quoted literal in this session's dialect.
    fn escape_literal(&self, raw: &[u8]) -> Vec<u8> {
        escape_string(raw)
    }

    fn ping(&mut self) -> Result<()>;

    /// Say goodbye to the server. Errors are swallowed.
    fn close(&mut self);

    fn server_info(&self) -> &str;

    fn thread_id(&self) -> u64;
}

/// Opens sessions.
pub trait Connector: Send {
    fn connect(&self, config: &DriverConfig) -> Result<Box<dyn Connection>>;
}

impl<F> Connector for F
where
    F: Fn(&DriverConfig) -> Result<Box<dyn Connection>> + Send,
{
    fn connect(&self, config: &DriverConfig) -> Result<Box<dyn Connection>> {
        self(config)
    }
}
