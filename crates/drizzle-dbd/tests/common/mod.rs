//! Scripted in-memory session for handle-level tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use drizzle_dbd::{
    ColumnDef, Connection, Connector, Database, DriverConfig, FieldType, NextResult, RawRow,
    ResultSet, escape_string,
};
use drizzle_dbd_core::error::{ConnectionError, ConnectionErrorKind, QueryError, QueryErrorKind};
use drizzle_dbd_core::{Error, Result};

/// A failure injected into the next submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    ServerGone,
    Syntax,
}

impl Failure {
    pub fn into_error(self) -> Error {
        match self {
            Failure::ServerGone => {
                Error::server_gone(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
            }
            Failure::Syntax => Error::Query(QueryError {
                kind: QueryErrorKind::Server,
                code: 1064,
                sqlstate: Some("42000".to_string()),
                message: "You have an error in your SQL syntax".to_string(),
                sql: None,
                source: None,
            }),
        }
    }
}

/// One result in a statement's reply sequence.
#[derive(Debug, Clone)]
pub enum Reply {
    Rows {
        columns: Vec<ColumnDef>,
        rows: Vec<RawRow>,
    },
    Ok {
        affected: u64,
        insert_id: u64,
    },
    Fail(Failure),
}

pub fn text_columns(names: &[&str]) -> Vec<ColumnDef> {
    names
        .iter()
        .map(|n| ColumnDef::new(*n, FieldType::VarString))
        .collect()
}

pub fn raw(cells: &[Option<&str>]) -> RawRow {
    cells
        .iter()
        .map(|c| c.map(|s| s.as_bytes().to_vec()))
        .collect()
}

pub fn rows(names: &[&str], data: &[&[Option<&str>]]) -> Reply {
    Reply::Rows {
        columns: text_columns(names),
        rows: data.iter().map(|r| raw(r)).collect(),
    }
}

#[derive(Debug, Default)]
pub struct MockState {
    /// Reply sequence per exact statement text; unknown text gets an OK.
    pub scripts: HashMap<String, Vec<Reply>>,
    /// Column lists served by `list_fields`.
    pub tables: HashMap<String, Vec<ColumnDef>>,
    /// Failures applied to the next submits, in order.
    pub failures: VecDeque<Failure>,
    pub refuse_connect: bool,
    /// Sessions escape by doubling quotes, as under NO_BACKSLASH_ESCAPES.
    pub no_backslash_escapes: bool,
    pub connects: usize,
    /// Every statement that reached `submit_query`, in order.
    pub submitted: Vec<String>,
    /// Transaction and session commands, in order.
    pub commands: Vec<String>,
}

pub type Shared = Arc<Mutex<MockState>>;

pub fn shared() -> Shared {
    Arc::new(Mutex::new(MockState::default()))
}

pub fn script(state: &Shared, sql: &str, replies: Vec<Reply>) {
    state
        .lock()
        .expect("lock poisoned")
        .scripts
        .insert(sql.to_string(), replies);
}

#[derive(Debug)]
pub struct MockConnection {
    state: Shared,
    id: u64,
    current: Option<Reply>,
    pending: VecDeque<Reply>,
    streaming: Option<VecDeque<RawRow>>,
    affected: u64,
    insert_id: u64,
}

impl MockConnection {
    fn new(state: Shared, id: u64) -> Self {
        Self {
            state,
            id,
            current: None,
            pending: VecDeque::new(),
            streaming: None,
            affected: 0,
            insert_id: 0,
        }
    }

    fn record(&self, command: impl Into<String>) {
        self.state
            .lock()
            .expect("lock poisoned")
            .commands
            .push(command.into());
    }

    fn step(&mut self) {
        self.current = self.pending.pop_front();
        if let Some(Reply::Ok {
            affected,
            insert_id,
        }) = &self.current
        {
            self.affected = *affected;
            self.insert_id = *insert_id;
        }
    }
}

fn out_of_sync() -> Error {
    Error::Query(QueryError {
        kind: QueryErrorKind::Driver,
        code: 2014,
        sqlstate: None,
        message: "Commands out of sync".to_string(),
        sql: None,
        source: None,
    })
}

impl Connection for MockConnection {
    fn submit_query(&mut self, sql: &[u8]) -> Result<()> {
        if self.current.is_some() || !self.pending.is_empty() || self.streaming.is_some() {
            return Err(out_of_sync());
        }
        let sql = String::from_utf8_lossy(sql).into_owned();
        let replies = {
            let mut state = self.state.lock().expect("lock poisoned");
            state.submitted.push(sql.clone());
            if let Some(failure) = state.failures.pop_front() {
                return Err(failure.into_error());
            }
            state.scripts.get(&sql).cloned().unwrap_or_else(|| {
                vec![Reply::Ok {
                    affected: 0,
                    insert_id: 0,
                }]
            })
        };
        self.pending = replies.into();
        self.step();
        if let Some(Reply::Fail(failure)) = self.current {
            self.current = None;
            self.pending.clear();
            return Err(failure.into_error());
        }
        Ok(())
    }

    fn store_result(&mut self) -> Result<Option<ResultSet>> {
        match self.current.take() {
            Some(Reply::Rows { columns, rows }) => Ok(Some(ResultSet::buffered(columns, rows))),
            Some(Reply::Fail(failure)) => Err(failure.into_error()),
            Some(Reply::Ok { .. }) | None => Ok(None),
        }
    }

    fn use_result(&mut self) -> Result<Option<ResultSet>> {
        match self.current.take() {
            Some(Reply::Rows { columns, rows }) => {
                self.streaming = Some(rows.into());
                Ok(Some(ResultSet::streaming(columns)))
            }
            Some(Reply::Fail(failure)) => Err(failure.into_error()),
            Some(Reply::Ok { .. }) | None => Ok(None),
        }
    }

    fn fetch_streamed_row(&mut self) -> Result<Option<RawRow>> {
        let row = self.streaming.as_mut().and_then(VecDeque::pop_front);
        if row.is_none() {
            self.streaming = None;
        }
        Ok(row)
    }

    fn discard_rows(&mut self) -> Result<()> {
        self.streaming = None;
        if matches!(self.current, Some(Reply::Rows { .. })) {
            self.current = None;
        }
        Ok(())
    }

    fn more_results(&self) -> bool {
        !self.pending.is_empty()
    }

    fn next_result(&mut self) -> Result<NextResult> {
        self.streaming = None;
        if self.pending.is_empty() {
            return Ok(NextResult::Done);
        }
        self.step();
        if let Some(Reply::Fail(failure)) = self.current {
            self.current = None;
            return Err(failure.into_error());
        }
        Ok(NextResult::More)
    }

    fn affected_rows(&self) -> u64 {
        self.affected
    }

    fn insert_id(&self) -> u64 {
        self.insert_id
    }

    fn warning_count(&self) -> u16 {
        0
    }

    fn list_fields(&mut self, table: &str) -> Result<ResultSet> {
        self.record(format!("LISTFIELDS {}", table));
        let columns = self
            .state
            .lock()
            .expect("lock poisoned")
            .tables
            .get(table)
            .cloned();
        match columns {
            Some(columns) => Ok(ResultSet::buffered(columns, Vec::new())),
            None => Err(Error::Query(QueryError {
                kind: QueryErrorKind::Server,
                code: 1146,
                sqlstate: Some("42S02".to_string()),
                message: format!("Table '{}' doesn't exist", table),
                sql: None,
                source: None,
            })),
        }
    }

    fn set_autocommit(&mut self, enabled: bool) -> Result<()> {
        self.record(format!("autocommit={}", u8::from(enabled)));
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.record("COMMIT");
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.record("ROLLBACK");
        Ok(())
    }

    fn escape_literal(&self, raw: &[u8]) -> Vec<u8> {
        if !self.state.lock().expect("lock poisoned").no_backslash_escapes {
            return escape_string(raw);
        }
        let mut out = Vec::with_capacity(raw.len());
        for &b in raw {
            if b == b'\'' {
                out.push(b'\'');
            }
            out.push(b);
        }
        out
    }

    fn ping(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) {
        self.record(format!("close {}", self.id));
    }

    fn server_info(&self) -> &str {
        "5.7.99-mock"
    }

    fn thread_id(&self) -> u64 {
        self.id
    }
}

/// Connector handing out sessions that share `state`.
pub fn connector(state: &Shared) -> impl Connector + 'static {
    let state = Arc::clone(state);
    move |_: &DriverConfig| -> Result<Box<dyn Connection>> {
        let mut guard = state.lock().expect("lock poisoned");
        if guard.refuse_connect {
            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Refused,
                code: Some(2003),
                message: "Can't connect to MySQL server".to_string(),
                source: None,
            }));
        }
        guard.connects += 1;
        let id = guard.connects as u64;
        drop(guard);
        Ok(Box::new(MockConnection::new(Arc::clone(&state), id)))
    }
}

pub fn open(state: &Shared, config: DriverConfig) -> Database {
    Database::connect(config, connector(state)).expect("mock connect")
}
