//! Cursor over a packet payload.
//!
//! All reads return `None` on truncated input; callers turn that into a
//! protocol error with context.

use crate::protocol::{EofPacket, ErrPacket, OkPacket};

/// Marker byte for a NULL column in a text row.
pub const NULL_COLUMN: u8 = 0xFB;

#[derive(Debug)]
pub struct PacketReader<'a> {
    rest: &'a [u8],
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { rest: data }
    }

    pub fn remaining(&self) -> usize {
        self.rest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }

    pub fn peek(&self) -> Option<u8> {
        self.rest.first().copied()
    }

    pub fn read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        if self.rest.len() < len {
            return None;
        }
        let (head, tail) = self.rest.split_at(len);
        self.rest = tail;
        Some(head)
    }

    fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        self.read_bytes(N)?.try_into().ok()
    }

    pub fn skip(&mut self, n: usize) -> bool {
        self.read_bytes(n).is_some()
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        self.read_array::<1>().map(|[b]| b)
    }

    pub fn read_u16_le(&mut self) -> Option<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub fn read_u24_le(&mut self) -> Option<u32> {
        self.read_array::<3>()
            .map(|[a, b, c]| u32::from_le_bytes([a, b, c, 0]))
    }

    pub fn read_u32_le(&mut self) -> Option<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_u64_le(&mut self) -> Option<u64> {
        self.read_array().map(u64::from_le_bytes)
    }

    /// Length-encoded integer. `0xFB` (NULL) and `0xFF` yield `None`.
    pub fn read_lenenc_int(&mut self) -> Option<u64> {
        match self.read_u8()? {
            b @ 0x00..=0xFA => Some(u64::from(b)),
            0xFC => self.read_u16_le().map(u64::from),
            0xFD => self.read_u24_le().map(u64::from),
            0xFE => self.read_u64_le(),
            _ => None,
        }
    }

    pub fn read_lenenc_bytes(&mut self) -> Option<&'a [u8]> {
        let len = usize::try_from(self.read_lenenc_int()?).ok()?;
        self.read_bytes(len)
    }

    pub fn read_lenenc_string(&mut self) -> Option<String> {
        self.read_lenenc_bytes()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    /// One text-protocol column: `None` for SQL NULL.
    pub fn read_text_column(&mut self) -> Option<Option<&'a [u8]>> {
        if self.peek() == Some(NULL_COLUMN) {
            self.skip(1);
            return Some(None);
        }
        self.read_lenenc_bytes().map(Some)
    }

    /// NUL-terminated string; a missing terminator consumes the rest.
    pub fn read_null_string(&mut self) -> String {
        let end = self
            .rest
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.rest.len());
        let s = String::from_utf8_lossy(&self.rest[..end]).into_owned();
        self.rest = self.rest.get(end + 1..).unwrap_or_default();
        s
    }

    pub fn read_rest(&mut self) -> &'a [u8] {
        std::mem::take(&mut self.rest)
    }

    pub fn read_rest_string(&mut self) -> String {
        String::from_utf8_lossy(self.read_rest()).into_owned()
    }

    /// OK packet body, with or without the leading 0x00.
    pub fn parse_ok_packet(&mut self) -> Option<OkPacket> {
        if self.peek() == Some(0x00) {
            self.skip(1);
        }
        Some(OkPacket {
            affected_rows: self.read_lenenc_int()?,
            last_insert_id: self.read_lenenc_int()?,
            status_flags: self.read_u16_le()?,
            warnings: self.read_u16_le()?,
            info: self.read_rest_string(),
        })
    }

    /// Error packet body, with or without the leading 0xFF.
    pub fn parse_err_packet(&mut self) -> Option<ErrPacket> {
        if self.peek() == Some(0xFF) {
            self.skip(1);
        }
        let error_code = self.read_u16_le()?;
        let sql_state = if self.peek() == Some(b'#') {
            self.skip(1);
            String::from_utf8_lossy(self.read_bytes(5)?).into_owned()
        } else {
            String::new()
        };
        Some(ErrPacket {
            error_code,
            sql_state,
            error_message: self.read_rest_string(),
        })
    }

    /// EOF packet body, with or without the leading 0xFE.
    pub fn parse_eof_packet(&mut self) -> Option<EofPacket> {
        if self.peek() == Some(0xFE) {
            self.skip(1);
        }
        Some(EofPacket {
            warnings: self.read_u16_le()?,
            status_flags: self.read_u16_le()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_width_integers() {
        let mut reader = PacketReader::new(&[0x42, 0x34, 0x12, 0x56, 0x34, 0x12, 0x78]);
        assert_eq!(reader.read_u8(), Some(0x42));
        assert_eq!(reader.read_u16_le(), Some(0x1234));
        assert_eq!(reader.read_u24_le(), Some(0x0012_3456));
        assert_eq!(reader.read_u32_le(), None);
        assert_eq!(reader.remaining(), 1);
    }

    #[test]
    fn lenenc_integers() {
        let mut reader = PacketReader::new(&[0xFA]);
        assert_eq!(reader.read_lenenc_int(), Some(250));
        let mut reader = PacketReader::new(&[0xFC, 0x34, 0x12]);
        assert_eq!(reader.read_lenenc_int(), Some(0x1234));
        let mut reader = PacketReader::new(&[0xFD, 0x56, 0x34, 0x12]);
        assert_eq!(reader.read_lenenc_int(), Some(0x0012_3456));
        let mut reader = PacketReader::new(&[0xFE, 1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(reader.read_lenenc_int(), Some(0x0807_0605_0403_0201));
        let mut reader = PacketReader::new(&[0xFB]);
        assert_eq!(reader.read_lenenc_int(), None);
    }

    #[test]
    fn text_columns_distinguish_null_from_empty() {
        let mut reader = PacketReader::new(&[0xFB, 0x00, 0x02, b'h', b'i']);
        assert_eq!(reader.read_text_column(), Some(None));
        assert_eq!(reader.read_text_column(), Some(Some(&b""[..])));
        assert_eq!(reader.read_text_column(), Some(Some(&b"hi"[..])));
        assert_eq!(reader.read_text_column(), None);
    }

    #[test]
    fn null_strings() {
        let mut reader = PacketReader::new(b"hello\0world");
        assert_eq!(reader.read_null_string(), "hello");
        assert_eq!(reader.read_null_string(), "world");
        assert!(reader.is_empty());
    }

    #[test]
    fn ok_packet() {
        let mut reader = PacketReader::new(&[0x00, 0x01, 0x2A, 0x0A, 0x00, 0x03, 0x00]);
        let ok = reader.parse_ok_packet().unwrap();
        assert_eq!(ok.affected_rows, 1);
        assert_eq!(ok.last_insert_id, 42);
        assert_eq!(ok.status_flags, 0x000A);
        assert_eq!(ok.warnings, 3);
        assert!(ok.info.is_empty());
    }

    #[test]
    fn err_packet() {
        let mut data = vec![0xFF, 0x15, 0x04, b'#'];
        data.extend_from_slice(b"28000Access denied");
        let err = PacketReader::new(&data).parse_err_packet().unwrap();
        assert_eq!(err.error_code, 1045);
        assert_eq!(err.sql_state, "28000");
        assert_eq!(err.error_message, "Access denied");
    }

    #[test]
    fn eof_packet() {
        let eof = PacketReader::new(&[0xFE, 0x01, 0x00, 0x08, 0x00])
            .parse_eof_packet()
            .unwrap();
        assert_eq!(eof.warnings, 1);
        assert_eq!(eof.status_flags, 0x0008);
    }
}
