//! Drizzle/MySQL driver with client-side statement emulation.
//!
//! Statements are "prepared" on the client: placeholders are counted at
//! prepare time and every execute splices the bound values into the SQL
//! text before it goes out over the text protocol. On top of that the
//! crate provides:
//!
//! - Multi-result iteration with best-effort draining of leftovers
//! - One automatic reconnect when the server went away under AutoCommit
//! - Buffered or streaming result retrieval
//! - A row buffer reused across fetches and result sets
//! - Typed database and statement attributes
//! - A blocking wire client behind the [`Connection`] trait
//!
//! # Example
//!
//! ```rust,ignore
//! use drizzle_dbd::{Database, DriverConfig};
//!
//! let config = DriverConfig::new()
//!     .host("localhost")
//!     .user("root")
//!     .database("test");
//! let mut db = Database::connect_wire(config)?;
//!
//! let mut stmt = db.prepare("SELECT id, name FROM users WHERE id > ? LIMIT ?")?;
//! stmt.bind_param(1, 10, None)?;
//! stmt.bind_param(2, 5, None)?;
//! stmt.execute(&mut db)?;
//! while let Some(row) = stmt.fetch(&mut db)? {
//!     println!("{:?}", row.get_by_name("name"));
//! }
//! ```

pub mod attributes;
pub mod auth;
pub mod client;
pub mod config;
pub mod connection;
pub mod cursor;
pub mod database;
mod execute;
pub mod fetch;
pub mod params;
pub mod placeholder;
pub mod protocol;
pub mod rewrite;
pub mod statement;
pub mod types;

pub use attributes::{AttrValue, DatabaseAttr, StatementAttr};
pub use client::{WireConnection, WireConnector};
pub use config::DriverConfig;
pub use connection::{Connection, Connector, NextResult, RawRow, ResultSet, RowSource};
pub use cursor::CursorState;
pub use database::{Database, DriverStats};
pub use params::{ParamStore, ParameterSlot};
pub use placeholder::count_placeholders;
pub use rewrite::{Escaper, TypeGuessing, escape_string, rewrite};
pub use statement::Statement;
pub use types::{ColumnDef, FieldType, SqlType, SqlTypeInfo};

pub use drizzle_dbd_core::{Error, Result, Row, Value};
