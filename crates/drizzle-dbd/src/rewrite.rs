//! Client-side statement preparation.
//!
//! Splices bound parameter values into the statement text in place of its
//! `?` placeholders, producing the SQL that is actually sent. Quoted
//! regions are copied through untouched. Values are emitted either as a
//! bare numeric literal or as an escaped, single-quoted string.

use std::borrow::Cow;

use drizzle_dbd_core::{Error, Result, Value};

use crate::params::{ParamStore, ParameterSlot};
use crate::placeholder::{is_quote, quoted_len};
use crate::types::SqlType;

/// How the type of a parameter bound without a declared SQL type is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeGuessing {
    /// Everything without a declared type is quoted as a string.
    #[default]
    Off,
    /// Values carrying a native numeric representation are numbers.
    Loose,
    /// Values whose whole text parses as a number are numbers.
    Strict,
}

impl TypeGuessing {
    /// Map the integer `unsafe_type_guessing` attribute value.
    pub fn from_level(level: i64) -> Self {
        match level {
            i64::MIN..=0 => TypeGuessing::Off,
            1 => TypeGuessing::Loose,
            _ => TypeGuessing::Strict,
        }
    }

    pub fn level(self) -> i64 {
        match self {
            TypeGuessing::Off => 0,
            TypeGuessing::Loose => 1,
            TypeGuessing::Strict => 2,
        }
    }

    /// Type inferred for a defined value under this mode.
    pub fn infer(self, value: &Value) -> SqlType {
        let numeric = match self {
            TypeGuessing::Off => false,
            TypeGuessing::Loose => value.has_numeric_repr(),
            TypeGuessing::Strict => value
                .to_sql_bytes()
                .is_some_and(|text| numeric_prefix(&text).1),
        };
        if numeric {
            SqlType::Integer
        } else {
            SqlType::VarChar
        }
    }
}

/// Leading numeric part of `value`.
///
/// Leading whitespace is skipped, then the longest run of digits with at
/// most one `.` is taken. A `-` is accepted only as the very first byte.
/// Returns the end offset of that run and whether it covers the whole
/// input.
pub fn numeric_prefix(value: &[u8]) -> (usize, bool) {
    let mut end = value.iter().take_while(|b| b.is_ascii_whitespace()).count();
    let mut seen_neg = false;
    let mut seen_dec = false;
    while let Some(&byte) = value.get(end) {
        match byte {
            b'-' if !seen_neg && end == 0 => seen_neg = true,
            b'.' if !seen_dec => seen_dec = true,
            b if b.is_ascii_digit() => {}
            _ => break,
        }
        end += 1;
    }
    (end, end == value.len())
}

/// Append `src` to `out` with MySQL string-literal escaping.
pub fn escape_into(out: &mut Vec<u8>, src: &[u8]) {
    for &byte in src {
        let escaped = match byte {
            0 => b'0',
            b'\n' => b'n',
            b'\r' => b'r',
            b'\\' => b'\\',
            b'\'' => b'\'',
            b'"' => b'"',
            0x1a => b'Z',
            _ => {
                out.push(byte);
                continue;
            }
        };
        out.push(b'\\');
        out.push(escaped);
    }
}

/// Escape `src` for use inside a quoted string literal.
pub fn escape_string(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len() + src.len() / 8 + 1);
    escape_into(&mut out, src);
    out
}

/// Does `text` start with `limit`, whitespace, then a placeholder?
fn starts_limit_placeholder(text: &[u8]) -> bool {
    let Some(rest) = text
        .get(..5)
        .filter(|word| word.eq_ignore_ascii_case(b"limit"))
        .map(|_| &text[5..])
    else {
        return false;
    };
    let gap = rest.iter().take_while(|b| b.is_ascii_whitespace()).count();
    gap > 0 && rest.get(gap) == Some(&b'?')
}

/// Escaping function of the session's dialect, see
/// [`Connection::escape_literal`](crate::connection::Connection::escape_literal).
pub type Escaper<'a> = &'a dyn Fn(&[u8]) -> Vec<u8>;

/// Both dialects at most double a literal: every byte gains one backslash
/// or every quote is doubled.
fn worst_case_len(slot: &ParameterSlot) -> usize {
    match slot.value.as_ref().and_then(Value::to_sql_bytes) {
        Some(text) => text.len().saturating_mul(2).saturating_add(2),
        None => 4,
    }
}

fn write_param(out: &mut Vec<u8>, slot: &ParameterSlot, in_limit: bool, escape: Escaper<'_>) {
    let Some(text) = slot.value.as_ref().and_then(Value::to_sql_bytes) else {
        out.extend_from_slice(b"NULL");
        return;
    };

    if in_limit || slot.sql_type().is_some_and(SqlType::is_numeric) {
        let (end, _) = numeric_prefix(&text);
        let literal = &text[..end];
        if literal.iter().any(u8::is_ascii_digit) {
            out.extend_from_slice(literal);
            return;
        }
    }

    out.push(b'\'');
    out.extend_from_slice(&escape(&text));
    out.push(b'\'');
}

fn estimated_len(statement_len: usize, slots: &[ParameterSlot]) -> usize {
    slots
        .iter()
        .map(worst_case_len)
        .fold(statement_len, usize::saturating_add)
}

fn output_buffer(requested: usize) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.try_reserve(requested)
        .map_err(|_| Error::OutOfMemory { requested })?;
    Ok(out)
}

/// Substitute the bound parameters into `statement`.
///
/// With no parameters the statement is returned as-is. Otherwise leading
/// whitespace is dropped and every `?` outside quoted regions consumes the
/// next slot in order. Placeholders beyond the slot count are copied
/// through literally.
///
/// A slot is written as a bare number when its type is numeric or when it
/// follows `LIMIT ?` (until the next `)`); only the leading numeric part
/// of its text is kept. A numeric slot whose text has no leading digits is
/// quoted like a string instead.
///
/// Slots without a declared type get one inferred per `guessing` first;
/// the inference holds until the slot is bound again. String literals are
/// escaped with `escape`, which must follow the session's dialect.
pub fn rewrite<'a>(
    statement: &'a str,
    params: &mut ParamStore,
    guessing: TypeGuessing,
    escape: Escaper<'_>,
) -> Result<Cow<'a, [u8]>> {
    if params.is_empty() {
        return Ok(Cow::Borrowed(statement.as_bytes()));
    }
    params.infer_types(guessing);

    let text = statement
        .trim_start_matches(|c: char| c.is_ascii_whitespace())
        .as_bytes();
    let mut out = output_buffer(estimated_len(text.len(), params.slots()))?;

    let mut slots = params.slots().iter();
    let mut in_limit = false;
    let mut i = 0;
    while i < text.len() {
        if !in_limit && starts_limit_placeholder(&text[i..]) {
            in_limit = true;
        }
        match text[i] {
            quote if is_quote(quote) => {
                let len = quoted_len(&text[i..]);
                out.extend_from_slice(&text[i..i + len]);
                i += len;
            }
            b'?' => {
                match slots.next() {
                    Some(slot) => write_param(&mut out, slot, in_limit, escape),
                    None => out.push(b'?'),
                }
                i += 1;
            }
            b')' => {
                in_limit = false;
                out.push(b')');
                i += 1;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }

    tracing::trace!(
        statement = %String::from_utf8_lossy(&out),
        params = params.len(),
        "rewrote statement"
    );
    Ok(Cow::Owned(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(values: Vec<Value>) -> ParamStore {
        let mut params = ParamStore::new(values.len());
        for (i, value) in values.into_iter().enumerate() {
            params.bind(i + 1, value, None).unwrap();
        }
        params
    }

    fn rewritten(sql: &str, params: &mut ParamStore, guessing: TypeGuessing) -> String {
        let out = rewrite(sql, params, guessing, &escape_string).unwrap();
        String::from_utf8(out.into_owned()).unwrap()
    }

    fn unescape(src: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut bytes = src.iter();
        while let Some(&b) = bytes.next() {
            if b != b'\\' {
                out.push(b);
                continue;
            }
            out.push(match bytes.next() {
                Some(b'0') => 0,
                Some(b'n') => b'\n',
                Some(b'r') => b'\r',
                Some(b'Z') => 0x1a,
                Some(&other) => other,
                None => break,
            });
        }
        out
    }

    #[test]
    fn no_params_borrows_input() {
        let mut params = ParamStore::new(0);
        let out = rewrite("  SELECT 1", &mut params, TypeGuessing::Off, &escape_string).unwrap();
        assert!(matches!(out, Cow::Borrowed(b"  SELECT 1")));
    }

    #[test]
    fn limit_placeholders_stay_unquoted() {
        let mut params = store(vec![Value::from("10"), Value::from("20")]);
        assert_eq!(
            rewritten("SELECT * FROM t LIMIT ?, ?", &mut params, TypeGuessing::Off),
            "SELECT * FROM t LIMIT 10, 20"
        );
    }

    #[test]
    fn limit_heuristic_resets_on_paren() {
        let mut params = store(vec![Value::from("5"), Value::from("x")]);
        assert_eq!(
            rewritten(
                "SELECT * FROM (SELECT a FROM t limit ?) s WHERE b = ?",
                &mut params,
                TypeGuessing::Off
            ),
            "SELECT * FROM (SELECT a FROM t limit 5) s WHERE b = 'x'"
        );
    }

    #[test]
    fn numeric_slots_are_truncated() {
        let mut params = ParamStore::new(1);
        params
            .bind(1, Value::from("12.5abc"), Some(SqlType::Integer))
            .unwrap();
        assert_eq!(
            rewritten("SELECT ?", &mut params, TypeGuessing::Off),
            "SELECT 12.5"
        );
    }

    #[test]
    fn non_numeric_text_falls_back_to_quotes() {
        let mut params = ParamStore::new(1);
        params
            .bind(1, Value::from("abc"), Some(SqlType::Integer))
            .unwrap();
        assert_eq!(
            rewritten("SELECT ?", &mut params, TypeGuessing::Loose),
            "SELECT 'abc'"
        );

        let mut params = store(vec![Value::from("abc")]);
        assert_eq!(
            rewritten("SELECT ?", &mut params, TypeGuessing::Loose),
            "SELECT 'abc'"
        );
    }

    #[test]
    fn undefined_is_null_literal() {
        let mut params = ParamStore::new(2);
        params.bind(1, Value::Null, Some(SqlType::VarChar)).unwrap();
        assert_eq!(
            rewritten("INSERT INTO t VALUES (?, ?)", &mut params, TypeGuessing::Strict),
            "INSERT INTO t VALUES (NULL, NULL)"
        );
    }

    #[test]
    fn guessing_modes() {
        let values = || vec![Value::Int(7), Value::from("8"), Value::from("8x")];
        let sql = "VALUES (?, ?, ?)";

        let mut params = store(values());
        assert_eq!(
            rewritten(sql, &mut params, TypeGuessing::Off),
            "VALUES ('7', '8', '8x')"
        );
        let mut params = store(values());
        assert_eq!(
            rewritten(sql, &mut params, TypeGuessing::Loose),
            "VALUES (7, '8', '8x')"
        );
        let mut params = store(values());
        assert_eq!(
            rewritten(sql, &mut params, TypeGuessing::Strict),
            "VALUES (7, 8, '8x')"
        );
    }

    #[test]
    fn quoted_regions_are_copied_verbatim() {
        let mut params = store(vec![Value::from("v")]);
        assert_eq!(
            rewritten(
                r#"  SELECT '?', "a\"?", `c?` FROM t WHERE x = ?"#,
                &mut params,
                TypeGuessing::Off
            ),
            r#"SELECT '?', "a\"?", `c?` FROM t WHERE x = 'v'"#
        );
    }

    #[test]
    fn excess_placeholders_are_left_alone() {
        let mut params = store(vec![Value::from(1)]);
        assert_eq!(
            rewritten("SELECT ?, ?", &mut params, TypeGuessing::Loose),
            "SELECT 1, ?"
        );
    }

    #[test]
    fn escaping_round_trips() {
        let raw: &[u8] = b"it's a \"test\"\\\n\r\0\x1a end";
        let mut params = store(vec![Value::from(raw)]);
        let out = rewrite("SELECT ?", &mut params, TypeGuessing::Off, &escape_string)
            .unwrap()
            .into_owned();
        let literal = &out[b"SELECT '".len()..out.len() - 1];
        assert_eq!(unescape(literal), raw);
        assert_eq!(escape_string(b"a'b"), b"a\\'b");
    }

    #[test]
    fn literals_follow_the_session_dialect() {
        let doubling = |raw: &[u8]| {
            let mut out = Vec::with_capacity(raw.len());
            for &b in raw {
                if b == b'\'' {
                    out.push(b'\'');
                }
                out.push(b);
            }
            out
        };
        let mut params = store(vec![Value::from("x\\' OR 1=1 -- ")]);
        let out = rewrite(
            "SELECT * FROM t WHERE a = ?",
            &mut params,
            TypeGuessing::Off,
            &doubling,
        )
        .unwrap()
        .into_owned();
        assert_eq!(out, b"SELECT * FROM t WHERE a = 'x\\'' OR 1=1 -- '");

        let mut params = store(vec![Value::from("x''y")]);
        let out = rewrite("SELECT ?", &mut params, TypeGuessing::Off, &doubling)
            .unwrap()
            .into_owned();
        assert_eq!(out, b"SELECT 'x''''y'");
        assert!(out.len() <= "SELECT ?".len() + worst_case_len(&params.slots()[0]));
    }

    #[test]
    fn oversized_estimate_is_out_of_memory() {
        let params = store(vec![Value::from("abc"), Value::Null]);
        assert_eq!(estimated_len(10, params.slots()), 10 + 8 + 4);
        assert_eq!(estimated_len(usize::MAX - 1, params.slots()), usize::MAX);

        let err = output_buffer(usize::MAX).unwrap_err();
        assert!(matches!(err, Error::OutOfMemory { requested: usize::MAX }));
        assert_eq!(err.code(), Some(17));
        assert!(output_buffer(64).unwrap().capacity() >= 64);
    }

    #[test]
    fn numeric_prefix_rules() {
        assert_eq!(numeric_prefix(b"-12.5"), (5, true));
        assert_eq!(numeric_prefix(b"12.5.1"), (4, false));
        assert_eq!(numeric_prefix(b"1-2"), (1, false));
        assert_eq!(numeric_prefix(b"  42"), (4, true));
        assert_eq!(numeric_prefix(b" -4"), (1, false));
        assert_eq!(numeric_prefix(b"abc"), (0, false));
    }

    #[test]
    fn type_guessing_levels() {
        assert_eq!(TypeGuessing::from_level(0), TypeGuessing::Off);
        assert_eq!(TypeGuessing::from_level(-3), TypeGuessing::Off);
        assert_eq!(TypeGuessing::from_level(1), TypeGuessing::Loose);
        assert_eq!(TypeGuessing::from_level(7), TypeGuessing::Strict);
        assert_eq!(TypeGuessing::Strict.level(), 2);
    }
}
