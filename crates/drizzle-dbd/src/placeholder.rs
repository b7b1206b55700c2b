//! Placeholder scanning.
//!
//! A `?` counts as a placeholder only outside quoted regions. Backquote,
//! single and double quote each open a region closed by the same
//! character; inside one a backslash escapes the next byte. An unterminated
//! region runs to the end of the text.

/// Quote characters that open a literal or quoted identifier.
pub(crate) const fn is_quote(byte: u8) -> bool {
    matches!(byte, b'`' | b'\'' | b'"')
}

/// Length of the quoted region starting at `bytes[0]`, delimiters included.
///
/// `bytes[0]` must be a quote character.
pub(crate) fn quoted_len(bytes: &[u8]) -> usize {
    let close = bytes[0];
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == close => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Number of `?` placeholders in `statement`.
///
/// ```
/// use drizzle_dbd::count_placeholders;
///
/// assert_eq!(count_placeholders("SELECT * FROM t WHERE a=? AND b='it''s ?'"), 1);
/// ```
pub fn count_placeholders(statement: &str) -> usize {
    let bytes = statement.as_bytes();
    let mut count = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b if is_quote(b) => i += quoted_len(&bytes[i..]),
            b'?' => {
                count += 1;
                i += 1;
            }
            _ => i += 1,
        }
    }
    count
}
