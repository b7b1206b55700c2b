//! Statement handle: emulated prepare, bind, execute and fetch.

use std::collections::BTreeMap;

use drizzle_dbd_core::{Error, Result, Row, Value};

use crate::attributes::{AttrValue, StatementAttr, expect_flag, read_only};
use crate::cursor::{Cursor, CursorState};
use crate::database::Database;
use crate::fetch::{DecodeOptions, decode_row};
use crate::params::ParamStore;
use crate::types::{ColumnDef, SqlType};

/// A statement prepared on the client.
///
/// Placeholders are counted at prepare time and substituted into the text
/// on every execute. Operations that talk to the server take the owning
/// [`Database`].
#[derive(Debug)]
pub struct Statement {
    statement: String,
    params: ParamStore,
    cursor: Cursor,
    row: Row,
    use_result: bool,
    chop_blanks: bool,
    rows: Option<u64>,
    insert_id: u64,
    warning_count: u16,
    last_warning: Option<String>,
}

impl Statement {
    pub(crate) fn new(sql: &str, param_count: usize, use_result: bool, chop_blanks: bool) -> Self {
        Self {
            statement: sql.to_string(),
            params: ParamStore::new(param_count),
            cursor: Cursor::default(),
            row: Row::default(),
            use_result,
            chop_blanks,
            rows: None,
            insert_id: 0,
            warning_count: 0,
            last_warning: None,
        }
    }

    pub fn sql(&self) -> &str {
        &self.statement
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn params(&self) -> &ParamStore {
        &self.params
    }

    pub fn state(&self) -> CursorState {
        self.cursor.state()
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// Row count of the current result; `None` before the first execute.
    pub fn rows(&self) -> Option<u64> {
        self.rows
    }

    /// Diagnostic left by the last suspicious bind.
    pub fn last_warning(&self) -> Option<&str> {
        self.last_warning.as_deref()
    }

    /// The last error swallowed while freeing pending results, once.
    pub fn take_drain_error(&mut self) -> Option<Error> {
        self.cursor.take_drain_error()
    }

    /// Bind `value` to the 1-based placeholder `index`.
    pub fn bind_param(
        &mut self,
        index: usize,
        value: impl Into<Value>,
        sql_type: Option<SqlType>,
    ) -> Result<()> {
        if let Some(warning) = self.params.bind(index, value.into(), sql_type)? {
            self.last_warning = Some(warning);
        }
        Ok(())
    }

    pub fn bind_param_inout(
        &mut self,
        _index: usize,
        _value: impl Into<Value>,
        _sql_type: Option<SqlType>,
    ) -> Result<()> {
        Err(Error::Unsupported(
            "Output parameters not implemented".to_string(),
        ))
    }

    /// Execute with the current bindings. Returns the row count.
    ///
    /// Results still pending from the previous execute are released first.
    pub fn execute(&mut self, db: &mut Database) -> Result<u64> {
        self.cursor.drain(db.connection_mut()?);
        self.rows = None;

        let execution = db.run_statement(&self.statement, &mut self.params, self.use_result)?;
        self.insert_id = execution.insert_id;
        self.warning_count = execution.warning_count;
        self.rows = Some(execution.rows);
        self.cursor
            .start(execution.result, execution.rows, execution.more_pending);
        Ok(execution.rows)
    }

    /// Move to the next result set. `true` when there is one.
    pub fn more_results(&mut self, db: &mut Database) -> Result<bool> {
        if !self.cursor.state().is_active() {
            return Ok(false);
        }
        let conn = db.connection_mut()?;
        let state = self.cursor.advance(conn, self.use_result)?;
        self.warning_count = conn.warning_count();
        self.rows = Some(self.cursor.row_count());
        Ok(state.is_active())
    }

    /// Fetch the next row into the statement's row buffer.
    ///
    /// `Ok(None)` marks the end of the current result. When no further
    /// results are pending the statement is finished, and fetching again
    /// is a sequence error.
    pub fn fetch(&mut self, db: &mut Database) -> Result<Option<&Row>> {
        if !self.cursor.has_result() {
            return Err(Error::Sequence("fetch() without execute()".to_string()));
        }
        let options = DecodeOptions {
            chop_blanks: self.chop_blanks,
            enable_utf8: db.config.enable_utf8,
        };
        let conn = db.connection_mut()?;

        match self.cursor.next_raw(conn)? {
            Some(raw) => {
                let names = self.cursor.names();
                let columns = self.cursor.columns().unwrap_or_default();
                decode_row(&mut self.row, names, columns, raw, options);
                if self.use_result {
                    self.rows = Some(self.cursor.row_count());
                }
                Ok(Some(&self.row))
            }
            None => {
                if !conn.more_results() {
                    self.cursor.drain(conn);
                }
                Ok(None)
            }
        }
    }

    /// Release the current result and everything still pending.
    pub fn finish(&mut self, db: &mut Database) {
        match db.connection_mut() {
            Ok(conn) => self.cursor.drain(conn),
            Err(_) => self.cursor.invalidate(),
        }
    }

    /// Finish and drop the statement along with its bindings.
    pub fn destroy(mut self, db: &mut Database) {
        self.finish(db);
        self.params.clear();
    }

    /// Replace the statement text, dropping bindings and results.
    pub fn reprepare(&mut self, db: &mut Database, sql: &str) {
        self.finish(db);
        self.statement = sql.to_string();
        self.params = ParamStore::new(crate::placeholder::count_placeholders(sql));
        self.rows = None;
        self.last_warning = None;
    }

    pub fn blob_read(&mut self, _field: usize, _offset: usize, _len: usize) -> Result<Vec<u8>> {
        Err(Error::Unsupported("blob_read not implemented".to_string()))
    }

    pub fn attribute(&mut self, attr: StatementAttr) -> Result<AttrValue> {
        Ok(match attr {
            StatementAttr::NumOfFields => {
                AttrValue::UInt(self.cursor.columns().map_or(0, |c| c.len() as u64))
            }
            StatementAttr::NumOfParams => AttrValue::UInt(self.params.len() as u64),
            StatementAttr::ParamValues => AttrValue::Map(
                self.params
                    .param_values()
                    .into_iter()
                    .map(|(i, v)| (i.to_string(), AttrValue::from(v)))
                    .collect::<BTreeMap<_, _>>(),
            ),
            StatementAttr::WarningCount => AttrValue::UInt(u64::from(self.warning_count)),
            StatementAttr::LastInsertId => AttrValue::UInt(self.insert_id),
            StatementAttr::UseResult => AttrValue::Bool(self.use_result),
            StatementAttr::ChopBlanks => AttrValue::Bool(self.chop_blanks),
            column_attr => return self.column_attribute(column_attr),
        })
    }

    fn column_attribute(&mut self, attr: StatementAttr) -> Result<AttrValue> {
        if let Some(cached) = self.cursor.cached(attr) {
            return Ok(cached.clone());
        }
        let columns = self
            .cursor
            .columns()
            .ok_or_else(|| Error::Sequence("statement contains no result".to_string()))?;
        let value = AttrValue::List(columns.iter().map(|c| column_value(c, attr)).collect());
        self.cursor.cache(attr, value.clone());
        Ok(value)
    }

    pub fn set_attribute(&mut self, attr: StatementAttr, value: AttrValue) -> Result<()> {
        match attr {
            StatementAttr::UseResult => self.use_result = expect_flag(&value)?,
            StatementAttr::ChopBlanks => self.chop_blanks = expect_flag(&value)?,
            other => return Err(read_only(&format!("{:?}", other))),
        }
        Ok(())
    }
}

fn column_value(column: &ColumnDef, attr: StatementAttr) -> AttrValue {
    let info = column.field_type.type_info();
    match attr {
        StatementAttr::Name => AttrValue::from(column.name.as_str()),
        StatementAttr::Table => AttrValue::from(column.table.as_str()),
        StatementAttr::Type => AttrValue::Int(i64::from(info.data_type.code())),
        StatementAttr::NativeType => AttrValue::UInt(u64::from(column.field_type.code())),
        StatementAttr::TypeName => AttrValue::from(info.type_name),
        StatementAttr::Nullable => AttrValue::Bool(!column.is_not_null()),
        StatementAttr::IsNotNull => AttrValue::Bool(column.is_not_null()),
        StatementAttr::IsPriKey => AttrValue::Bool(column.is_primary_key()),
        StatementAttr::IsKey => AttrValue::Bool(column.is_key()),
        StatementAttr::IsBlob => AttrValue::Bool(column.is_blob()),
        StatementAttr::IsNum => AttrValue::Bool(column.is_numeric()),
        StatementAttr::IsAutoIncrement => AttrValue::Bool(column.is_auto_increment()),
        StatementAttr::Length => AttrValue::UInt(u64::from(column.length)),
        StatementAttr::MaxLength => AttrValue::UInt(column.max_length),
        StatementAttr::Precision => AttrValue::UInt(column.precision()),
        StatementAttr::Scale => AttrValue::UInt(u64::from(column.decimals)),
        _ => AttrValue::Null,
    }
}
