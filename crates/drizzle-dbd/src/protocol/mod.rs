//! MySQL/Drizzle wire protocol pieces used by [`crate::client`].
//!
//! Every packet starts with a 4-byte header (3-byte little-endian payload
//! length, 1-byte sequence number). Payloads of `MAX_PACKET_SIZE` bytes
//! continue in the next packet.

pub mod reader;
pub mod writer;

use drizzle_dbd_core::Error;
use drizzle_dbd_core::error::{QueryError, QueryErrorKind};

pub use reader::PacketReader;
pub use writer::PacketWriter;

/// Maximum payload size for a single packet (2^24 - 1 bytes).
pub const MAX_PACKET_SIZE: usize = 0xFF_FF_FF;

/// Capability flags exchanged during the handshake.
pub mod capabilities {
    pub const CLIENT_LONG_PASSWORD: u32 = 1;
    pub const CLIENT_FOUND_ROWS: u32 = 1 << 1;
    pub const CLIENT_LONG_FLAG: u32 = 1 << 2;
    pub const CLIENT_CONNECT_WITH_DB: u32 = 1 << 3;
    pub const CLIENT_COMPRESS: u32 = 1 << 5;
    pub const CLIENT_LOCAL_FILES: u32 = 1 << 7;
    pub const CLIENT_PROTOCOL_41: u32 = 1 << 9;
    pub const CLIENT_SSL: u32 = 1 << 11;
    pub const CLIENT_TRANSACTIONS: u32 = 1 << 13;
    pub const CLIENT_SECURE_CONNECTION: u32 = 1 << 15;
    pub const CLIENT_MULTI_STATEMENTS: u32 = 1 << 16;
    pub const CLIENT_MULTI_RESULTS: u32 = 1 << 17;
    pub const CLIENT_PLUGIN_AUTH: u32 = 1 << 19;
    pub const CLIENT_CONNECT_ATTRS: u32 = 1 << 20;
    pub const CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA: u32 = 1 << 21;

    /// Capabilities requested on every connection.
    ///
    /// `CLIENT_DEPRECATE_EOF` is left out: result sets always end in an
    /// EOF packet, which keeps the streaming reader simple.
    pub const DEFAULT_CLIENT_FLAGS: u32 = CLIENT_PROTOCOL_41
        | CLIENT_SECURE_CONNECTION
        | CLIENT_LONG_PASSWORD
        | CLIENT_LONG_FLAG
        | CLIENT_TRANSACTIONS
        | CLIENT_MULTI_RESULTS
        | CLIENT_PLUGIN_AUTH
        | CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA;
}

/// Command bytes (COM_xxx) sent by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Quit = 0x01,
    Query = 0x03,
    FieldList = 0x04,
    Ping = 0x0e,
}

/// Server status flags carried by OK and EOF packets.
pub mod server_status {
    pub const SERVER_STATUS_IN_TRANS: u16 = 0x0001;
    pub const SERVER_STATUS_AUTOCOMMIT: u16 = 0x0002;
    pub const SERVER_MORE_RESULTS_EXISTS: u16 = 0x0008;
    pub const SERVER_STATUS_NO_BACKSLASH_ESCAPES: u16 = 0x0200;
}

/// Character set numbers.
pub mod charset {
    pub const UTF8_GENERAL_CI: u8 = 33;
    pub const UTF8MB4_GENERAL_CI: u8 = 45;
    pub const BINARY: u8 = 63;

    /// Default charset for new connections.
    pub const DEFAULT_CHARSET: u8 = UTF8MB4_GENERAL_CI;
}

/// A packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub payload_length: u32,
    pub sequence_id: u8,
}

impl PacketHeader {
    /// Total header size in bytes.
    pub const SIZE: usize = 4;

    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self {
            payload_length: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]),
            sequence_id: bytes[3],
        }
    }

    pub fn to_bytes(self) -> [u8; 4] {
        let len = self.payload_length.to_le_bytes();
        [len[0], len[1], len[2], self.sequence_id]
    }
}

/// Classification of a server response by its first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Ok,
    Error,
    /// 0xFE with a short payload
    Eof,
    LocalInfile,
    /// Column count, column definition or row
    Data,
}

impl PacketType {
    pub fn of(payload: &[u8]) -> Self {
        match payload.first() {
            Some(0x00) => PacketType::Ok,
            Some(0xFF) => PacketType::Error,
            Some(0xFE) if payload.len() < 9 => PacketType::Eof,
            Some(0xFB) => PacketType::LocalInfile,
            _ => PacketType::Data,
        }
    }
}

/// Parsed OK packet.
#[derive(Debug, Clone, Default)]
pub struct OkPacket {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status_flags: u16,
    pub warnings: u16,
    pub info: String,
}

/// Parsed error packet.
#[derive(Debug, Clone)]
pub struct ErrPacket {
    pub error_code: u16,
    pub sql_state: String,
    pub error_message: String,
}

impl ErrPacket {
    /// Convert into a driver error, keeping code, SQLSTATE and message
    /// exactly as the server sent them.
    pub fn into_error(self) -> Error {
        Error::Query(QueryError {
            kind: QueryErrorKind::Server,
            code: self.error_code,
            sqlstate: (!self.sql_state.is_empty()).then_some(self.sql_state),
            message: self.error_message,
            sql: None,
            source: None,
        })
    }
}

/// Parsed EOF packet.
#[derive(Debug, Clone, Copy, Default)]
pub struct EofPacket {
    pub warnings: u16,
    pub status_flags: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let header = PacketHeader {
            payload_length: 0x0012_3456,
            sequence_id: 7,
        };
        assert_eq!(header.to_bytes(), [0x56, 0x34, 0x12, 7]);
        assert_eq!(PacketHeader::from_bytes([0x56, 0x34, 0x12, 7]), header);
    }

    #[test]
    fn packet_type_detection() {
        assert_eq!(PacketType::of(&[0x00, 0, 0]), PacketType::Ok);
        assert_eq!(PacketType::of(&[0xFF, 1]), PacketType::Error);
        assert_eq!(PacketType::of(&[0xFE, 0, 0, 2, 0]), PacketType::Eof);
        assert_eq!(PacketType::of(&[0xFE; 12]), PacketType::Data);
        assert_eq!(PacketType::of(&[0x03]), PacketType::Data);
        assert_eq!(PacketType::of(&[]), PacketType::Data);
    }

    #[test]
    fn err_packet_keeps_server_details() {
        let err = ErrPacket {
            error_code: 1064,
            sql_state: "42000".to_string(),
            error_message: "You have an error in your SQL syntax".to_string(),
        }
        .into_error();
        assert_eq!(err.code(), Some(1064));
        assert_eq!(err.sqlstate(), Some("42000"));
    }
}
