//! Result cursor and multi-result iteration.
//!
//! A statement moves `Idle -> Active(0) -> Active(1) -> ... -> Exhausted`.
//! Every transition drops the cached column attributes, so nothing read
//! for one result set can leak into the next.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use drizzle_dbd_core::{ColumnInfo, Error, Result};

use crate::attributes::{AttrValue, StatementAttr};
use crate::connection::{Connection, NextResult, RawRow, ResultSet, RowSource};
use crate::types::ColumnDef;

/// Position of a statement in its result sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CursorState {
    /// Never executed.
    #[default]
    Idle,
    /// Holding result set `n` (0-based) of the last execute.
    Active(usize),
    /// All results consumed or released.
    Exhausted,
}

impl CursorState {
    pub const fn is_active(self) -> bool {
        matches!(self, CursorState::Active(_))
    }
}

#[derive(Debug, Default)]
pub struct Cursor {
    state: CursorState,
    result: Option<ResultSet>,
    names: Arc<ColumnInfo>,
    /// Rows of the current result: buffered count, rows streamed so far,
    /// or affected rows when it has none.
    row_count: u64,
    attr_cache: HashMap<StatementAttr, AttrValue>,
    drain_error: Option<Error>,
}

impl Cursor {
    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn has_result(&self) -> bool {
        self.result.is_some()
    }

    /// Column definitions of the current result, if it has rows.
    pub fn columns(&self) -> Option<&[ColumnDef]> {
        self.result.as_ref().map(|r| &*r.columns)
    }

    /// Shared column names handed to fetched rows.
    pub fn names(&self) -> Arc<ColumnInfo> {
        Arc::clone(&self.names)
    }

    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    pub fn cached(&self, attr: StatementAttr) -> Option<&AttrValue> {
        self.attr_cache.get(&attr)
    }

    pub fn cache(&mut self, attr: StatementAttr, value: AttrValue) {
        self.attr_cache.insert(attr, value);
    }

    /// Number of column attributes currently cached.
    pub fn cached_len(&self) -> usize {
        self.attr_cache.len()
    }

    /// The last error hit while releasing pending results, once.
    pub fn take_drain_error(&mut self) -> Option<Error> {
        self.drain_error.take()
    }

    /// Install the first result of a fresh execute.
    ///
    /// A statement without a result set and nothing pending goes straight
    /// to `Exhausted`.
    pub fn start(&mut self, result: Option<ResultSet>, rows: u64, more_pending: bool) {
        self.attr_cache.clear();
        self.state = if result.is_some() || more_pending {
            CursorState::Active(0)
        } else {
            CursorState::Exhausted
        };
        self.install(result, rows);
        tracing::trace!(state = ?self.state, rows, "cursor started");
    }

    /// Move to the next result set of the current execute.
    ///
    /// Returns the new state. An error while reading the next result
    /// leaves the cursor `Exhausted` and is returned.
    pub fn advance(&mut self, conn: &mut dyn Connection, use_result: bool) -> Result<CursorState> {
        let CursorState::Active(n) = self.state else {
            return Ok(self.state);
        };
        self.attr_cache.clear();
        self.row_count = 0;

        match self.load_next(conn, use_result) {
            Ok(true) => self.state = CursorState::Active(n + 1),
            Ok(false) => self.state = CursorState::Exhausted,
            Err(err) => {
                self.state = CursorState::Exhausted;
                self.install(None, 0);
                return Err(err);
            }
        }
        tracing::debug!(state = ?self.state, columns = self.names.len(), "switched result set");
        Ok(self.state)
    }

    fn load_next(&mut self, conn: &mut dyn Connection, use_result: bool) -> Result<bool> {
        if let Some(previous) = self.result.take() {
            if previous.is_streaming() {
                conn.discard_rows()?;
            }
        }
        self.names = Arc::default();

        if !conn.more_results() || conn.next_result()? == NextResult::Done {
            return Ok(false);
        }
        let result = if use_result {
            conn.use_result()?
        } else {
            conn.store_result()?
        };
        let affected = conn.affected_rows();
        if result.is_none() && !conn.more_results() {
            self.row_count = affected;
            return Ok(false);
        }
        self.install(result, affected);
        Ok(true)
    }

    fn install(&mut self, result: Option<ResultSet>, affected: u64) {
        self.row_count = match &result {
            Some(rs) => rs.buffered_len().map_or(0, |n| n as u64),
            None => affected,
        };
        self.names = match &result {
            Some(rs) => Arc::new(ColumnInfo::new(
                rs.columns.iter().map(|c| c.name.clone()).collect(),
            )),
            None => Arc::default(),
        };
        self.result = result;
    }

    /// Next raw row of the current result; `None` once it is used up.
    pub fn next_raw(&mut self, conn: &mut dyn Connection) -> Result<Option<RawRow>> {
        let Some(result) = self.result.as_mut() else {
            return Err(Error::Sequence("fetch() without execute()".to_string()));
        };
        if let RowSource::Buffered(rows) = &mut result.rows {
            return Ok(rows.pop_front());
        }

        let fetched = conn.fetch_streamed_row();
        match &fetched {
            Ok(Some(_)) => self.row_count += 1,
            // The stream is over either way; nothing is left to discard.
            _ => result.rows = RowSource::Buffered(VecDeque::new()),
        }
        fetched
    }

    /// Release the current result and skip every result still pending on
    /// the connection.
    ///
    /// Never fails: errors are logged and kept for
    /// [`take_drain_error`](Self::take_drain_error).
    pub fn drain(&mut self, conn: &mut dyn Connection) {
        if let Err(err) = self.skip_pending(conn) {
            tracing::warn!(error = %err, "error while freeing pending result sets");
            self.drain_error = Some(err);
        }
        self.invalidate();
    }

    fn skip_pending(&mut self, conn: &mut dyn Connection) -> Result<()> {
        self.result = None;
        discard_pending(conn)
    }

    /// Forget the current result without talking to the server.
    pub fn invalidate(&mut self) {
        self.result = None;
        self.names = Arc::default();
        self.attr_cache.clear();
        if self.state.is_active() {
            self.state = CursorState::Exhausted;
        }
    }
}

/// Read past whatever the session still owes: the rest of a streamed
/// result and every result queued behind it.
pub(crate) fn discard_pending(conn: &mut dyn Connection) -> Result<()> {
    conn.discard_rows()?;
    while conn.more_results() {
        if conn.next_result()? == NextResult::Done {
            break;
        }
        if conn.use_result()?.is_some() {
            conn.discard_rows()?;
        }
    }
    Ok(())
}
