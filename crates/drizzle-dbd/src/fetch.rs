//! Raw row decoding into the caller-visible row buffer.

use std::sync::Arc;

use drizzle_dbd_core::{ColumnInfo, Row, Value};

use crate::connection::RawRow;
use crate::types::ColumnDef;

/// Per-fetch decoding switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Trim trailing spaces from text columns
    pub chop_blanks: bool,
    /// Hand out text columns as `Value::Text`
    pub enable_utf8: bool,
}

/// Decode one cell. NULL stays distinct from the empty string.
pub fn decode_cell(column: &ColumnDef, cell: Option<Vec<u8>>, options: DecodeOptions) -> Value {
    let Some(mut bytes) = cell else {
        return Value::Null;
    };
    if column.is_binary() {
        return Value::Bytes(bytes);
    }
    if options.chop_blanks {
        let keep = bytes.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
        bytes.truncate(keep);
    }
    if options.enable_utf8 {
        match String::from_utf8(bytes) {
            Ok(text) => Value::Text(text),
            Err(err) => Value::Bytes(err.into_bytes()),
        }
    } else {
        Value::Bytes(bytes)
    }
}

/// Refill `row` from `raw`.
///
/// The row is resized in place to the current column count, so a row
/// object handed out for one result set stays the same object for the next.
pub fn decode_row(
    row: &mut Row,
    names: Arc<ColumnInfo>,
    columns: &[ColumnDef],
    raw: RawRow,
    options: DecodeOptions,
) {
    row.reshape(names);
    let mut cells = raw.into_iter();
    for (slot, column) in row.values_mut().iter_mut().zip(columns) {
        *slot = decode_cell(column, cells.next().flatten(), options);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::charset;
    use crate::types::{FieldType, column_flags};

    const UTF8: DecodeOptions = DecodeOptions {
        chop_blanks: false,
        enable_utf8: true,
    };

    fn text() -> ColumnDef {
        ColumnDef::new("t", FieldType::VarString)
    }

    #[test]
    fn null_is_not_empty() {
        assert_eq!(decode_cell(&text(), None, UTF8), Value::Null);
        assert_eq!(
            decode_cell(&text(), Some(Vec::new()), UTF8),
            Value::Text(String::new())
        );
    }

    #[test]
    fn chop_blanks_trims_spaces_only() {
        let options = DecodeOptions {
            chop_blanks: true,
            enable_utf8: true,
        };
        assert_eq!(
            decode_cell(&text(), Some(b"ab  ".to_vec()), options),
            Value::from("ab")
        );
        assert_eq!(
            decode_cell(&text(), Some(b"ab\t \n".to_vec()), options),
            Value::from("ab\t \n")
        );
        assert_eq!(
            decode_cell(&text(), Some(b"   ".to_vec()), options),
            Value::from("")
        );
    }

    #[test]
    fn binary_columns_stay_bytes() {
        let options = DecodeOptions {
            chop_blanks: true,
            enable_utf8: true,
        };
        let by_charset = ColumnDef::new("b", FieldType::Blob).with_charset(u16::from(charset::BINARY));
        let by_flag = text().with_flags(column_flags::BINARY);
        for column in [by_charset, by_flag] {
            assert_eq!(
                decode_cell(&column, Some(b"x ".to_vec()), options),
                Value::Bytes(b"x ".to_vec())
            );
        }
    }

    #[test]
    fn utf8_switch() {
        let raw = "caf\u{e9}".as_bytes().to_vec();
        assert_eq!(
            decode_cell(&text(), Some(raw.clone()), UTF8),
            Value::from("caf\u{e9}")
        );
        assert_eq!(
            decode_cell(&text(), Some(raw.clone()), DecodeOptions::default()),
            Value::Bytes(raw)
        );
        assert_eq!(
            decode_cell(&text(), Some(vec![0xff, 0xfe]), UTF8),
            Value::Bytes(vec![0xff, 0xfe])
        );
    }

    #[test]
    fn row_is_resized_between_result_sets() {
        let mut row = Row::default();
        let wide = Arc::new(ColumnInfo::new(vec!["a".into(), "b".into(), "c".into()]));
        let cols3 = vec![text(), text(), text()];
        decode_row(
            &mut row,
            Arc::clone(&wide),
            &cols3,
            vec![Some(b"1".to_vec()), None, Some(b"3".to_vec())],
            UTF8,
        );
        assert_eq!(row.len(), 3);
        assert_eq!(row.get(1), Some(&Value::Null));

        let narrow = Arc::new(ColumnInfo::new(vec!["x".into()]));
        decode_row(&mut row, narrow, &cols3[..1], vec![Some(b"9".to_vec())], UTF8);
        assert_eq!(row.len(), 1);
        assert_eq!(row.get_by_name("x"), Some(&Value::from("9")));
        assert_eq!(row.get_by_name("a"), None);
    }
}
