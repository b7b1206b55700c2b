//! Handle attributes.
//!
//! Attribute names are resolved once into closed enums; anything else is
//! "not recognized" (`from_name` returns `None`). Values travel as
//! [`AttrValue`].

use std::collections::BTreeMap;

use drizzle_dbd_core::{Error, Result, Value};
use serde::Serialize;

/// A dynamically-typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    /// One entry per result column
    List(Vec<AttrValue>),
    Map(BTreeMap<String, AttrValue>),
}

impl AttrValue {
    /// Truthiness in the host's sense: NULL, false, 0 and "" are false.
    pub fn as_bool(&self) -> bool {
        match self {
            AttrValue::Null => false,
            AttrValue::Bool(b) => *b,
            AttrValue::Int(i) => *i != 0,
            AttrValue::UInt(u) => *u != 0,
            AttrValue::Double(d) => *d != 0.0,
            AttrValue::Text(s) => !s.is_empty() && s != "0",
            AttrValue::Bytes(b) => !b.is_empty() && b != b"0",
            AttrValue::List(_) | AttrValue::Map(_) => true,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Bool(b) => Some(i64::from(*b)),
            AttrValue::Int(i) => Some(*i),
            AttrValue::UInt(u) => i64::try_from(*u).ok(),
            AttrValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AttrValue]> {
        match self {
            AttrValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// JSON rendering for host bindings.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<u64> for AttrValue {
    fn from(v: u64) -> Self {
        AttrValue::UInt(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Text(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Text(v)
    }
}

impl From<Value> for AttrValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => AttrValue::Null,
            Value::Bool(b) => AttrValue::Bool(b),
            Value::Int(i) => AttrValue::Int(i),
            Value::UInt(u) => AttrValue::UInt(u),
            Value::Double(d) => AttrValue::Double(d),
            Value::Text(s) => AttrValue::Text(s),
            Value::Bytes(b) => AttrValue::Bytes(b),
        }
    }
}

impl<T: Into<AttrValue>> From<Vec<T>> for AttrValue {
    fn from(items: Vec<T>) -> Self {
        AttrValue::List(items.into_iter().map(Into::into).collect())
    }
}

/// Strip the optional driver prefix from an attribute name.
fn unprefixed(name: &str) -> &str {
    name.strip_prefix("drizzle_").unwrap_or(name)
}

/// Database handle attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseAttr {
    AutoCommit,
    AutoReconnect,
    UseResult,
    /// Inverse view of `UseResult`
    UseBufferedResult,
    UnsafeTypeGuessing,
    EnableUtf8,
    ChopBlanks,
    InsertId,
    Stats,
    ServerInfo,
    ThreadId,
}

impl DatabaseAttr {
    pub const ALL: [DatabaseAttr; 11] = [
        DatabaseAttr::AutoCommit,
        DatabaseAttr::AutoReconnect,
        DatabaseAttr::UseResult,
        DatabaseAttr::UseBufferedResult,
        DatabaseAttr::UnsafeTypeGuessing,
        DatabaseAttr::EnableUtf8,
        DatabaseAttr::ChopBlanks,
        DatabaseAttr::InsertId,
        DatabaseAttr::Stats,
        DatabaseAttr::ServerInfo,
        DatabaseAttr::ThreadId,
    ];

    /// Resolve a host attribute name. Driver-specific names may carry the
    /// `drizzle_` prefix.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "AutoCommit" => return Some(DatabaseAttr::AutoCommit),
            "ChopBlanks" => return Some(DatabaseAttr::ChopBlanks),
            _ => {}
        }
        Some(match unprefixed(name) {
            "auto_commit" => DatabaseAttr::AutoCommit,
            "auto_reconnect" => DatabaseAttr::AutoReconnect,
            "use_result" => DatabaseAttr::UseResult,
            "use_buffered_result" => DatabaseAttr::UseBufferedResult,
            "unsafe_bind_type_guessing" | "unsafe_type_guessing" => {
                DatabaseAttr::UnsafeTypeGuessing
            }
            "enable_utf8" => DatabaseAttr::EnableUtf8,
            "insertid" | "insert_id" => DatabaseAttr::InsertId,
            "dbd_stats" | "stats" => DatabaseAttr::Stats,
            "serverinfo" | "server_info" => DatabaseAttr::ServerInfo,
            "thread_id" => DatabaseAttr::ThreadId,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            DatabaseAttr::AutoCommit => "AutoCommit",
            DatabaseAttr::AutoReconnect => "drizzle_auto_reconnect",
            DatabaseAttr::UseResult => "drizzle_use_result",
            DatabaseAttr::UseBufferedResult => "drizzle_use_buffered_result",
            DatabaseAttr::UnsafeTypeGuessing => "drizzle_unsafe_bind_type_guessing",
            DatabaseAttr::EnableUtf8 => "drizzle_enable_utf8",
            DatabaseAttr::ChopBlanks => "ChopBlanks",
            DatabaseAttr::InsertId => "drizzle_insertid",
            DatabaseAttr::Stats => "drizzle_dbd_stats",
            DatabaseAttr::ServerInfo => "drizzle_serverinfo",
            DatabaseAttr::ThreadId => "drizzle_thread_id",
        }
    }

    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            DatabaseAttr::InsertId
                | DatabaseAttr::Stats
                | DatabaseAttr::ServerInfo
                | DatabaseAttr::ThreadId
        )
    }
}

/// Statement handle attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementAttr {
    Name,
    Table,
    /// SQL type code per column
    Type,
    /// Wire type code per column
    NativeType,
    TypeName,
    Nullable,
    IsNotNull,
    IsPriKey,
    IsKey,
    IsBlob,
    IsNum,
    IsAutoIncrement,
    Length,
    MaxLength,
    Precision,
    Scale,
    NumOfFields,
    NumOfParams,
    ParamValues,
    WarningCount,
    LastInsertId,
    UseResult,
    ChopBlanks,
}

impl StatementAttr {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "NAME" => StatementAttr::Name,
            "TYPE" => StatementAttr::Type,
            "NULLABLE" => StatementAttr::Nullable,
            "PRECISION" => StatementAttr::Precision,
            "SCALE" => StatementAttr::Scale,
            "NUM_OF_FIELDS" => StatementAttr::NumOfFields,
            "NUM_OF_PARAMS" => StatementAttr::NumOfParams,
            "ParamValues" => StatementAttr::ParamValues,
            "ChopBlanks" => StatementAttr::ChopBlanks,
            other => match unprefixed(other) {
                "table" => StatementAttr::Table,
                "type" => StatementAttr::NativeType,
                "type_name" => StatementAttr::TypeName,
                "is_not_null" => StatementAttr::IsNotNull,
                "is_pri_key" => StatementAttr::IsPriKey,
                "is_key" => StatementAttr::IsKey,
                "is_blob" => StatementAttr::IsBlob,
                "is_num" => StatementAttr::IsNum,
                "is_auto_increment" => StatementAttr::IsAutoIncrement,
                "length" => StatementAttr::Length,
                "max_length" => StatementAttr::MaxLength,
                "warning_count" => StatementAttr::WarningCount,
                "insertid" | "last_insert_id" => StatementAttr::LastInsertId,
                "use_result" => StatementAttr::UseResult,
                _ => return None,
            },
        })
    }

    /// One value per column of the active result?
    pub fn is_per_column(self) -> bool {
        !matches!(
            self,
            StatementAttr::NumOfFields
                | StatementAttr::NumOfParams
                | StatementAttr::ParamValues
                | StatementAttr::WarningCount
                | StatementAttr::LastInsertId
                | StatementAttr::UseResult
                | StatementAttr::ChopBlanks
        )
    }

    pub fn is_settable(self) -> bool {
        matches!(self, StatementAttr::UseResult | StatementAttr::ChopBlanks)
    }
}

/// Error for writing an attribute that cannot be written.
pub(crate) fn read_only(name: &str) -> Error {
    Error::Unsupported(format!("attribute {} is read-only", name))
}

/// Require a boolean-ish value.
pub(crate) fn expect_flag(value: &AttrValue) -> Result<bool> {
    match value {
        AttrValue::List(_) | AttrValue::Map(_) => Err(Error::Unsupported(
            "expected a scalar attribute value".to_string(),
        )),
        other => Ok(other.as_bool()),
    }
}
