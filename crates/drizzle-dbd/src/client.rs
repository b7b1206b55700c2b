//! Blocking MySQL-protocol client.
//!
//! Implements [`Connection`] over TCP or a Unix socket with the text
//! protocol: handshake and authentication, `COM_QUERY`, `COM_FIELD_LIST`,
//! `COM_PING` and `COM_QUIT`. Results are read buffered or streaming, and
//! multi-result sequences are followed through `SERVER_MORE_RESULTS_EXISTS`.

// Packet lengths are bounded by the 24-bit header
#![allow(clippy::cast_possible_truncation)]

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::sync::Arc;

use drizzle_dbd_core::error::{ConnectionError, ConnectionErrorKind, QueryError, QueryErrorKind};
use drizzle_dbd_core::{Error, Result};

use crate::auth;
use crate::config::DriverConfig;
use crate::connection::{Connection, Connector, NextResult, RawRow, ResultSet};
use crate::protocol::reader::PacketReader;
use crate::protocol::writer::{PacketWriter, frame_packets};
use crate::protocol::{
    Command, MAX_PACKET_SIZE, OkPacket, PacketHeader, PacketType, capabilities, server_status,
};
use crate::types::{ColumnDef, FieldType};

/// Client error code for a command issued while a result is still unread.
pub const CR_COMMANDS_OUT_OF_SYNC: u16 = 2014;

/// What the server sent in its initial handshake.
#[derive(Debug, Clone, Default)]
pub struct ServerHandshake {
    pub capabilities: u32,
    pub protocol_version: u8,
    pub server_version: String,
    pub connection_id: u32,
    pub auth_plugin: String,
    /// Scramble used by the password plugins
    pub auth_data: Vec<u8>,
    pub charset: u8,
    pub status_flags: u16,
}

/// Parse the initial handshake packet (protocol version 10).
pub fn parse_handshake(payload: &[u8]) -> Result<ServerHandshake> {
    let mut reader = PacketReader::new(payload);

    let protocol_version = reader
        .read_u8()
        .ok_or_else(|| Error::protocol("Missing protocol version"))?;
    if protocol_version == 0xFF {
        let err = reader
            .parse_err_packet()
            .ok_or_else(|| Error::protocol("Invalid error packet"))?;
        return Err(connect_error(
            ConnectionErrorKind::Refused,
            Some(err.error_code),
            err.error_message,
        ));
    }
    if protocol_version != 10 {
        return Err(Error::protocol(format!(
            "Unsupported protocol version: {}",
            protocol_version
        )));
    }

    let server_version = reader.read_null_string();
    let connection_id = reader
        .read_u32_le()
        .ok_or_else(|| Error::protocol("Missing connection ID"))?;
    let auth_data_1 = reader
        .read_bytes(8)
        .ok_or_else(|| Error::protocol("Missing auth data"))?;
    reader.skip(1);

    let caps_lower = reader
        .read_u16_le()
        .ok_or_else(|| Error::protocol("Missing capability flags"))?;
    let charset = reader
        .read_u8()
        .unwrap_or(crate::protocol::charset::DEFAULT_CHARSET);
    let status_flags = reader.read_u16_le().unwrap_or(0);
    let caps_upper = reader.read_u16_le().unwrap_or(0);
    let capabilities = u32::from(caps_lower) | (u32::from(caps_upper) << 16);

    let auth_data_len = if capabilities & capabilities::CLIENT_PLUGIN_AUTH != 0 {
        usize::from(reader.read_u8().unwrap_or(0))
    } else {
        0
    };
    reader.skip(10);

    let mut auth_data = auth_data_1.to_vec();
    if capabilities & capabilities::CLIENT_SECURE_CONNECTION != 0 {
        let len2 = if auth_data_len > 8 {
            auth_data_len - 8
        } else {
            13
        };
        if let Some(part2) = reader.read_bytes(len2.min(reader.remaining())) {
            auth_data.extend_from_slice(part2.strip_suffix(&[0]).unwrap_or(part2));
        }
    }

    let auth_plugin = if capabilities & capabilities::CLIENT_PLUGIN_AUTH != 0 {
        reader.read_null_string()
    } else {
        auth::plugins::MYSQL_NATIVE_PASSWORD.to_string()
    };

    Ok(ServerHandshake {
        capabilities,
        protocol_version,
        server_version,
        connection_id,
        auth_plugin,
        auth_data,
        charset,
        status_flags,
    })
}

/// Parse a column definition packet (protocol 4.1 layout).
pub fn parse_column_def(payload: &[u8]) -> Result<ColumnDef> {
    let mut reader = PacketReader::new(payload);
    let mut text = |what: &str| {
        reader
            .read_lenenc_string()
            .ok_or_else(|| Error::protocol(format!("Missing {} in column definition", what)))
    };

    let _catalog = text("catalog")?;
    let schema = text("schema")?;
    let table = text("table")?;
    let org_table = text("org_table")?;
    let name = text("name")?;
    let org_name = text("org_name")?;

    let _fixed_len = reader.read_lenenc_int();
    let truncated = || Error::protocol("Truncated column definition");
    let charset = reader.read_u16_le().ok_or_else(truncated)?;
    let length = reader.read_u32_le().ok_or_else(truncated)?;
    let field_type = FieldType::from_u8(reader.read_u8().ok_or_else(truncated)?);
    let flags = reader.read_u16_le().ok_or_else(truncated)?;
    let decimals = reader.read_u8().ok_or_else(truncated)?;

    Ok(ColumnDef {
        schema,
        table,
        org_table,
        name,
        org_name,
        charset,
        length,
        max_length: 0,
        field_type,
        flags,
        decimals,
    })
}

/// Split a text-protocol row into its columns.
pub fn parse_text_row(payload: &[u8], column_count: usize) -> Result<RawRow> {
    let mut reader = PacketReader::new(payload);
    (0..column_count)
        .map(|i| {
            reader
                .read_text_column()
                .map(|col| col.map(<[u8]>::to_vec))
                .ok_or_else(|| Error::protocol(format!("Truncated row at column {}", i)))
        })
        .collect()
}

/// Is `payload` the EOF packet that ends a column or row list?
fn is_eof(payload: &[u8]) -> bool {
    PacketType::of(payload) == PacketType::Eof
}

fn connect_error(kind: ConnectionErrorKind, code: Option<u16>, message: impl Into<String>) -> Error {
    Error::Connection(ConnectionError {
        kind,
        code,
        message: message.into(),
        source: None,
    })
}

fn out_of_sync() -> Error {
    Error::Query(QueryError {
        kind: QueryErrorKind::Driver,
        code: CR_COMMANDS_OUT_OF_SYNC,
        sqlstate: None,
        message: "Commands out of sync; you can't run this command now".to_string(),
        sql: None,
        source: None,
    })
}

/// Map a failed read. A session that is already gone when the first
/// response is awaited reports 2006; anything later reports 2013.
fn read_failure(err: io::Error, first_response: bool) -> Error {
    let gone = matches!(
        err.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
    );
    if first_response && gone {
        Error::server_gone(err)
    } else {
        Error::server_lost(err)
    }
}

enum Stream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Stream {
    fn set_timeouts(&self, timeout: Option<std::time::Duration>) -> io::Result<()> {
        match self {
            Stream::Tcp(s) => {
                s.set_read_timeout(timeout)?;
                s.set_write_timeout(timeout)
            }
            #[cfg(unix)]
            Stream::Unix(s) => {
                s.set_read_timeout(timeout)?;
                s.set_write_timeout(timeout)
            }
        }
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.read(buf),
            #[cfg(unix)]
            Stream::Unix(s) => s.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.write(buf),
            #[cfg(unix)]
            Stream::Unix(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Tcp(s) => s.flush(),
            #[cfg(unix)]
            Stream::Unix(s) => s.flush(),
        }
    }
}

fn open_stream(config: &DriverConfig) -> Result<Stream> {
    #[cfg(unix)]
    if let Some(path) = &config.socket {
        let stream = UnixStream::connect(path).map_err(|e| {
            Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect,
                code: Some(2002),
                message: format!("Can't connect through socket '{}': {}", path.display(), e),
                source: Some(Box::new(e)),
            })
        })?;
        return Ok(Stream::Unix(stream));
    }

    let addr = config.socket_addr();
    let addrs = addr.to_socket_addrs().map_err(|e| {
        Error::Connection(ConnectionError {
            kind: ConnectionErrorKind::Connect,
            code: Some(2005),
            message: format!("Unknown server host '{}': {}", config.host, e),
            source: Some(Box::new(e)),
        })
    })?;

    let mut last_err = None;
    for sock_addr in addrs {
        match TcpStream::connect_timeout(&sock_addr, config.connect_timeout) {
            Ok(stream) => {
                stream.set_nodelay(true).ok();
                return Ok(Stream::Tcp(stream));
            }
            Err(e) => last_err = Some(e),
        }
    }

    let (kind, message, source) = match last_err {
        Some(e) => {
            let kind = match e.kind() {
                io::ErrorKind::ConnectionRefused => ConnectionErrorKind::Refused,
                io::ErrorKind::TimedOut => ConnectionErrorKind::Timeout,
                _ => ConnectionErrorKind::Connect,
            };
            let message = format!("Can't connect to server on '{}': {}", addr, e);
            (kind, message, Some(Box::new(e) as Box<dyn std::error::Error + Send + Sync>))
        }
        None => (
            ConnectionErrorKind::Connect,
            format!("No address found for '{}'", addr),
            None,
        ),
    };
    Err(Error::Connection(ConnectionError {
        kind,
        code: Some(2003),
        message,
        source,
    }))
}

/// The result currently owned by the protocol stream.
#[derive(Debug, Clone)]
enum Pending {
    None,
    /// Column definitions read, rows not yet touched
    Columns(Arc<[ColumnDef]>),
    /// Rows being read one by one
    Streaming(Arc<[ColumnDef]>),
}

/// A blocking session with a MySQL-protocol server.
pub struct WireConnection {
    stream: Stream,
    server: ServerHandshake,
    /// Capabilities both sides agreed on
    capabilities: u32,
    host: String,
    sequence_id: u8,
    status_flags: u16,
    affected_rows: u64,
    insert_id: u64,
    warnings: u16,
    pending: Pending,
    closed: bool,
}

impl std::fmt::Debug for WireConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireConnection")
            .field("host", &self.host)
            .field("connection_id", &self.server.connection_id)
            .field("server_version", &self.server.server_version)
            .field("status_flags", &self.status_flags)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl WireConnection {
    /// Open a session.
    ///
    /// 1. TCP (or Unix socket) connect
    /// 2. Receive server handshake
    /// 3. Send handshake response with the password scramble
    /// 4. Follow auth switch / fast-auth exchanges to the final OK
    /// 5. Apply the initial auto-commit mode
    #[tracing::instrument(level = "debug", skip(config), fields(host = %config.host, port = config.port))]
    pub fn connect(config: &DriverConfig) -> Result<Self> {
        if config.compression {
            return Err(Error::Unsupported(
                "compressed protocol is not implemented".to_string(),
            ));
        }

        let stream = open_stream(config)?;
        stream
            .set_timeouts(Some(config.connect_timeout))
            .map_err(Error::Io)?;

        let mut conn = Self {
            stream,
            server: ServerHandshake::default(),
            capabilities: 0,
            host: config.host.clone(),
            sequence_id: 0,
            status_flags: 0,
            affected_rows: 0,
            insert_id: 0,
            warnings: 0,
            pending: Pending::None,
            closed: false,
        };

        let payload = conn.read_payload(false)?;
        conn.server = parse_handshake(&payload)?;
        conn.status_flags = conn.server.status_flags;
        conn.capabilities = config.capability_flags() & conn.server.capabilities;
        tracing::debug!(
            server_version = %conn.server.server_version,
            connection_id = conn.server.connection_id,
            plugin = %conn.server.auth_plugin,
            "received handshake"
        );

        conn.send_handshake_response(config)?;
        conn.handle_auth_result(config, 0)?;

        conn.stream
            .set_timeouts(config.read_timeout)
            .map_err(Error::Io)?;
        conn.set_autocommit(config.auto_commit)?;
        Ok(conn)
    }

    /// Negotiated capability flags.
    pub fn capabilities(&self) -> u32 {
        self.capabilities
    }

    pub fn status_flags(&self) -> u16 {
        self.status_flags
    }

    fn send_handshake_response(&mut self, config: &DriverConfig) -> Result<()> {
        let password = config.password.as_deref().unwrap_or("");
        let auth_response =
            auth::auth_response(&self.server.auth_plugin, password, &self.server.auth_data);
        let caps = self.capabilities;

        let mut writer = PacketWriter::new();
        writer.write_u32_le(caps);
        writer.write_u32_le(config.max_packet_size);
        writer.write_u8(config.charset);
        writer.write_zeros(23);
        writer.write_null_string(&config.user);

        if caps & capabilities::CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA != 0 {
            writer.write_lenenc_bytes(&auth_response);
        } else if caps & capabilities::CLIENT_SECURE_CONNECTION != 0 {
            writer.write_u8(auth_response.len() as u8);
            writer.write_bytes(&auth_response);
        } else {
            writer.write_bytes(&auth_response);
            writer.write_u8(0);
        }

        if caps & capabilities::CLIENT_CONNECT_WITH_DB != 0 {
            writer.write_null_string(config.database.as_deref().unwrap_or(""));
        }
        if caps & capabilities::CLIENT_PLUGIN_AUTH != 0 {
            writer.write_null_string(&self.server.auth_plugin);
        }
        if caps & capabilities::CLIENT_CONNECT_ATTRS != 0 {
            let mut attrs = PacketWriter::new();
            for (key, value) in &config.attributes {
                attrs.write_lenenc_bytes(key.as_bytes());
                attrs.write_lenenc_bytes(value.as_bytes());
            }
            writer.write_lenenc_bytes(attrs.as_bytes());
        }

        self.write_packet(writer.as_bytes())
    }

    fn handle_auth_result(&mut self, config: &DriverConfig, switches: u8) -> Result<()> {
        let payload = self.read_payload(false)?;
        match payload.first() {
            Some(0x00) => {
                if let Some(ok) = PacketReader::new(&payload).parse_ok_packet() {
                    self.status_flags = ok.status_flags;
                }
                Ok(())
            }
            Some(0xFF) => {
                let err = PacketReader::new(&payload)
                    .parse_err_packet()
                    .ok_or_else(|| Error::protocol("Invalid error packet"))?;
                Err(connect_error(
                    ConnectionErrorKind::Authentication,
                    Some(err.error_code),
                    err.error_message,
                ))
            }
            Some(0xFE) if switches < 2 => {
                let mut reader = PacketReader::new(&payload[1..]);
                let plugin = reader.read_null_string();
                let auth_data = reader.read_rest().to_vec();
                tracing::debug!(plugin = %plugin, "auth switch requested");
                let password = config.password.as_deref().unwrap_or("");
                let response = auth::auth_response(&plugin, password, &auth_data);
                self.write_packet(&response)?;
                self.handle_auth_result(config, switches + 1)
            }
            Some(0x01) => match payload.get(1) {
                Some(&auth::caching_sha2::FAST_AUTH_SUCCESS) => {
                    self.handle_auth_result(config, switches)
                }
                Some(&auth::caching_sha2::PERFORM_FULL_AUTH) => Err(connect_error(
                    ConnectionErrorKind::Authentication,
                    None,
                    "Full caching_sha2_password authentication requires TLS or RSA, which are not supported",
                )),
                other => Err(Error::protocol(format!(
                    "Unknown auth continuation: {:?}",
                    other
                ))),
            },
            _ => Err(Error::protocol("Unexpected packet during authentication")),
        }
    }

    /// Read one logical packet, joining continuation packets.
    fn read_packet(&mut self) -> io::Result<Vec<u8>> {
        let mut payload = Vec::new();
        loop {
            let mut header = [0u8; PacketHeader::SIZE];
            self.stream.read_exact(&mut header)?;
            let header = PacketHeader::from_bytes(header);
            self.sequence_id = header.sequence_id.wrapping_add(1);

            let len = header.payload_length as usize;
            let start = payload.len();
            payload.resize(start + len, 0);
            self.stream.read_exact(&mut payload[start..])?;
            if len < MAX_PACKET_SIZE {
                return Ok(payload);
            }
        }
    }

    fn read_payload(&mut self, first_response: bool) -> Result<Vec<u8>> {
        self.read_packet()
            .map_err(|e| read_failure(e, first_response))
    }

    fn write_packet(&mut self, payload: &[u8]) -> Result<()> {
        let (packet, next) = frame_packets(payload, self.sequence_id);
        self.sequence_id = next;
        self.stream
            .write_all(&packet)
            .and_then(|()| self.stream.flush())
            .map_err(Error::server_gone)
    }

    fn send_command(&mut self, command: Command, body: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::server_gone(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection closed",
            )));
        }
        if !matches!(self.pending, Pending::None) {
            return Err(out_of_sync());
        }
        self.sequence_id = 0;
        let mut payload = Vec::with_capacity(body.len() + 1);
        payload.push(command as u8);
        payload.extend_from_slice(body);
        self.write_packet(&payload)
    }

    fn apply_ok(&mut self, ok: &OkPacket) {
        self.affected_rows = ok.affected_rows;
        self.insert_id = ok.last_insert_id;
        self.status_flags = ok.status_flags;
        self.warnings = ok.warnings;
    }

    /// Interpret the first packet of a statement response.
    fn read_response(&mut self, first_response: bool) -> Result<()> {
        let payload = self.read_payload(first_response)?;
        match PacketType::of(&payload) {
            PacketType::Ok => {
                let ok = PacketReader::new(&payload)
                    .parse_ok_packet()
                    .ok_or_else(|| Error::protocol("Invalid OK packet"))?;
                self.apply_ok(&ok);
                Ok(())
            }
            PacketType::Error => {
                self.status_flags &= !server_status::SERVER_MORE_RESULTS_EXISTS;
                Err(PacketReader::new(&payload)
                    .parse_err_packet()
                    .ok_or_else(|| Error::protocol("Invalid error packet"))?
                    .into_error())
            }
            PacketType::LocalInfile => {
                // An empty packet tells the server no file follows.
                self.write_packet(&[])?;
                let _ = self.read_response(false);
                Err(Error::Unsupported(
                    "LOAD DATA LOCAL INFILE is not supported".to_string(),
                ))
            }
            PacketType::Eof | PacketType::Data => {
                let count = PacketReader::new(&payload)
                    .read_lenenc_int()
                    .ok_or_else(|| Error::protocol("Invalid column count"))?;
                let columns = self.read_column_defs(Some(count))?;
                self.affected_rows = 0;
                self.pending = Pending::Columns(columns);
                Ok(())
            }
        }
    }

    /// Column definitions up to the terminating EOF. With a known count
    /// exactly that many are expected first.
    fn read_column_defs(&mut self, count: Option<u64>) -> Result<Arc<[ColumnDef]>> {
        let mut columns = Vec::new();
        loop {
            let payload = self.read_payload(false)?;
            if is_eof(&payload) {
                if let Some(eof) = PacketReader::new(&payload).parse_eof_packet() {
                    self.status_flags = eof.status_flags;
                    self.warnings = eof.warnings;
                }
                break;
            }
            if PacketType::of(&payload) == PacketType::Error {
                return Err(PacketReader::new(&payload)
                    .parse_err_packet()
                    .ok_or_else(|| Error::protocol("Invalid error packet"))?
                    .into_error());
            }
            columns.push(parse_column_def(&payload)?);
        }
        if let Some(expected) = count {
            if columns.len() as u64 != expected {
                return Err(Error::protocol(format!(
                    "Expected {} column definitions, got {}",
                    expected,
                    columns.len()
                )));
            }
        }
        Ok(columns.into())
    }

    /// Next row of the current result; `None` at its EOF.
    fn read_row(&mut self, column_count: usize) -> Result<Option<RawRow>> {
        let payload = self.read_payload(false)?;
        if is_eof(&payload) {
            if let Some(eof) = PacketReader::new(&payload).parse_eof_packet() {
                self.status_flags = eof.status_flags;
                self.warnings = eof.warnings;
            }
            return Ok(None);
        }
        if PacketType::of(&payload) == PacketType::Error {
            self.status_flags &= !server_status::SERVER_MORE_RESULTS_EXISTS;
            return Err(PacketReader::new(&payload)
                .parse_err_packet()
                .ok_or_else(|| Error::protocol("Invalid error packet"))?
                .into_error());
        }
        parse_text_row(&payload, column_count).map(Some)
    }

    /// Run a statement whose result is of no interest.
    fn simple_query(&mut self, sql: &str) -> Result<()> {
        self.submit_query(sql.as_bytes())?;
        self.discard_rows()
    }
}

impl Connection for WireConnection {
    fn submit_query(&mut self, sql: &[u8]) -> Result<()> {
        tracing::trace!(sql = %String::from_utf8_lossy(sql), "COM_QUERY");
        self.send_command(Command::Query, sql)?;
        self.read_response(true)
    }

    fn store_result(&mut self) -> Result<Option<ResultSet>> {
        let columns = match std::mem::replace(&mut self.pending, Pending::None) {
            Pending::None => return Ok(None),
            Pending::Columns(columns) => columns,
            streaming @ Pending::Streaming(_) => {
                self.pending = streaming;
                return Err(out_of_sync());
            }
        };

        let mut rows = Vec::new();
        let mut max_lengths = vec![0u64; columns.len()];
        while let Some(row) = self.read_row(columns.len())? {
            for (max, col) in max_lengths.iter_mut().zip(&row) {
                if let Some(bytes) = col {
                    *max = (*max).max(bytes.len() as u64);
                }
            }
            rows.push(row);
        }

        let columns: Vec<ColumnDef> = columns
            .iter()
            .zip(max_lengths)
            .map(|(col, max_length)| ColumnDef {
                max_length,
                ..col.clone()
            })
            .collect();
        Ok(Some(ResultSet::buffered(columns, rows)))
    }

    fn use_result(&mut self) -> Result<Option<ResultSet>> {
        match std::mem::replace(&mut self.pending, Pending::None) {
            Pending::None => Ok(None),
            Pending::Columns(columns) => {
                self.pending = Pending::Streaming(Arc::clone(&columns));
                Ok(Some(ResultSet::streaming(columns)))
            }
            streaming @ Pending::Streaming(_) => {
                self.pending = streaming;
                Err(out_of_sync())
            }
        }
    }

    fn fetch_streamed_row(&mut self) -> Result<Option<RawRow>> {
        let Pending::Streaming(columns) = &self.pending else {
            return Ok(None);
        };
        let count = columns.len();
        let row = self.read_row(count);
        if !matches!(row, Ok(Some(_))) {
            self.pending = Pending::None;
        }
        row
    }

    fn discard_rows(&mut self) -> Result<()> {
        if let Pending::Columns(columns) = &self.pending {
            self.pending = Pending::Streaming(Arc::clone(columns));
        }
        while self.fetch_streamed_row()?.is_some() {}
        Ok(())
    }

    fn more_results(&self) -> bool {
        self.status_flags & server_status::SERVER_MORE_RESULTS_EXISTS != 0
    }

    fn next_result(&mut self) -> Result<NextResult> {
        self.discard_rows()?;
        if !self.more_results() {
            return Ok(NextResult::Done);
        }
        self.read_response(false)?;
        Ok(NextResult::More)
    }

    fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    fn insert_id(&self) -> u64 {
        self.insert_id
    }

    fn warning_count(&self) -> u16 {
        self.warnings
    }

    fn list_fields(&mut self, table: &str) -> Result<ResultSet> {
        let mut body = table.as_bytes().to_vec();
        body.push(0);
        self.send_command(Command::FieldList, &body)?;
        let columns = self.read_column_defs(None)?;
        Ok(ResultSet::buffered(columns, Vec::new()))
    }

    fn set_autocommit(&mut self, enabled: bool) -> Result<()> {
        self.simple_query(if enabled {
            "SET autocommit=1"
        } else {
            "SET autocommit=0"
        })
    }

    fn commit(&mut self) -> Result<()> {
        self.simple_query("COMMIT")
    }

    fn rollback(&mut self) -> Result<()> {
        self.simple_query("ROLLBACK")
    }

    fn escape_literal(&self, raw: &[u8]) -> Vec<u8> {
        if self.status_flags & server_status::SERVER_STATUS_NO_BACKSLASH_ESCAPES != 0 {
            let mut out = Vec::with_capacity(raw.len());
            for &b in raw {
                if b == b'\'' {
                    out.push(b'\'');
                }
                out.push(b);
            }
            out
        } else {
            crate::rewrite::escape_string(raw)
        }
    }

    fn ping(&mut self) -> Result<()> {
        self.send_command(Command::Ping, &[])?;
        let payload = self.read_payload(true)?;
        match PacketType::of(&payload) {
            PacketType::Ok => Ok(()),
            PacketType::Error => Err(PacketReader::new(&payload)
                .parse_err_packet()
                .ok_or_else(|| Error::protocol("Invalid error packet"))?
                .into_error()),
            _ => Err(Error::protocol("Unexpected ping response")),
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.pending = Pending::None;
        self.sequence_id = 0;
        let _ = self.write_packet(&[Command::Quit as u8]);
        self.closed = true;
        tracing::debug!(connection_id = self.server.connection_id, "connection closed");
    }

    fn server_info(&self) -> &str {
        &self.server.server_version
    }

    fn thread_id(&self) -> u64 {
        u64::from(self.server.connection_id)
    }
}

impl Drop for WireConnection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens [`WireConnection`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct WireConnector;

impl Connector for WireConnector {
    fn connect(&self, config: &DriverConfig) -> Result<Box<dyn Connection>> {
        Ok(Box::new(WireConnection::connect(config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::writer::PacketWriter;
    use crate::types::column_flags;

    fn handshake_payload() -> Vec<u8> {
        let caps = capabilities::CLIENT_PROTOCOL_41
            | capabilities::CLIENT_SECURE_CONNECTION
            | capabilities::CLIENT_PLUGIN_AUTH;
        let mut w = PacketWriter::new();
        w.write_u8(10);
        w.write_null_string("7.2.4-drizzle");
        w.write_u32_le(42);
        w.write_bytes(b"abcdefgh");
        w.write_u8(0);
        w.write_u16_le((caps & 0xFFFF) as u16);
        w.write_u8(45);
        w.write_u16_le(server_status::SERVER_STATUS_AUTOCOMMIT);
        w.write_u16_le((caps >> 16) as u16);
        w.write_u8(21);
        w.write_zeros(10);
        w.write_bytes(b"ijklmnopqrst\0");
        w.write_null_string(auth::plugins::MYSQL_NATIVE_PASSWORD);
        w.into_bytes()
    }

    #[test]
    fn parses_handshake() {
        let hs = parse_handshake(&handshake_payload()).unwrap();
        assert_eq!(hs.protocol_version, 10);
        assert_eq!(hs.server_version, "7.2.4-drizzle");
        assert_eq!(hs.connection_id, 42);
        assert_eq!(hs.auth_data, b"abcdefghijklmnopqrst");
        assert_eq!(hs.auth_plugin, "mysql_native_password");
        assert_eq!(hs.charset, 45);
        assert!(hs.capabilities & capabilities::CLIENT_PLUGIN_AUTH != 0);
    }

    #[test]
    fn handshake_error_packet_is_connection_error() {
        let mut payload = vec![0xFF, 0x10, 0x04];
        payload.extend_from_slice(b"Too many connections");
        let err = parse_handshake(&payload).unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
        assert_eq!(err.code(), Some(1040));
    }

    #[test]
    fn parses_column_definition() {
        let mut w = PacketWriter::new();
        for part in ["def", "shop", "o", "orders", "id", "id"] {
            w.write_lenenc_bytes(part.as_bytes());
        }
        w.write_lenenc_int(0x0c);
        w.write_u16_le(63);
        w.write_u32_le(11);
        w.write_u8(FieldType::Long.code());
        w.write_u16_le(column_flags::NOT_NULL | column_flags::PRIMARY_KEY);
        w.write_u8(0);

        let col = parse_column_def(w.as_bytes()).unwrap();
        assert_eq!(col.schema, "shop");
        assert_eq!(col.table, "o");
        assert_eq!(col.org_table, "orders");
        assert_eq!(col.name, "id");
        assert_eq!(col.charset, 63);
        assert_eq!(col.length, 11);
        assert_eq!(col.field_type, FieldType::Long);
        assert!(col.is_primary_key());
        assert!(col.is_not_null());

        assert!(matches!(
            parse_column_def(&w.as_bytes()[..20]),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn parses_text_rows() {
        let row = parse_text_row(&[0x01, b'7', 0xFB, 0x00], 3).unwrap();
        assert_eq!(row, vec![Some(b"7".to_vec()), None, Some(Vec::new())]);
        assert!(parse_text_row(&[0x01, b'7'], 2).is_err());
    }

    #[test]
    fn read_failures_map_to_client_codes() {
        let eof = || io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        assert_eq!(read_failure(eof(), true).code(), Some(2006));
        assert!(read_failure(eof(), true).is_server_gone());
        assert_eq!(read_failure(eof(), false).code(), Some(2013));
        let timeout = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert_eq!(read_failure(timeout, true).code(), Some(2013));
    }

    #[test]
    fn eof_detection() {
        assert!(is_eof(&[0xFE, 0, 0, 0x08, 0]));
        assert!(!is_eof(&[0xFE, 1, 2, 3, 4, 5, 6, 7, 8, 9]));
        assert!(!is_eof(&[0x00]));
    }
}
