//! Core types for the drizzle-dbd driver.
//!
//! This crate holds the pieces shared by the driver and any host binding:
//!
//! - `Error` and `Result` for every driver operation
//! - `Value`, the dynamic host value used for binding and fetching
//! - `Row`, the reusable fetch buffer

pub mod error;
pub mod row;
pub mod value;

pub use error::{
    ConfigError, ConnectionError, ConnectionErrorKind, DriverErrorCode, Error, ParameterError,
    ProtocolError, QueryError, QueryErrorKind, Result,
};
pub use row::{ColumnInfo, Row};
pub use value::Value;
