//! Wire column types, host SQL type codes and the type catalog.
//!
//! - [`FieldType`]: closed set of wire column types (`MYSQL_TYPE_*`)
//! - [`SqlType`]: ODBC/DBI SQL type codes a caller can declare on a bind
//! - [`TYPE_INFO`]: read-only catalog behind `type_info_all`, reached
//!   from a column through the total mapping [`FieldType::type_info`]

use serde::{Deserialize, Serialize};

/// Wire column type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldType {
    Decimal = 0x00,
    Tiny = 0x01,
    Short = 0x02,
    Long = 0x03,
    Float = 0x04,
    Double = 0x05,
    Null = 0x06,
    Timestamp = 0x07,
    LongLong = 0x08,
    Int24 = 0x09,
    Date = 0x0A,
    Time = 0x0B,
    DateTime = 0x0C,
    Year = 0x0D,
    NewDate = 0x0E,
    VarChar = 0x0F,
    Bit = 0x10,
    Json = 0xF5,
    NewDecimal = 0xF6,
    Enum = 0xF7,
    Set = 0xF8,
    TinyBlob = 0xF9,
    MediumBlob = 0xFA,
    LongBlob = 0xFB,
    Blob = 0xFC,
    VarString = 0xFD,
    String = 0xFE,
    Geometry = 0xFF,
}

impl FieldType {
    /// Parse a field type byte. Unknown codes are read as `String`.
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => FieldType::Decimal,
            0x01 => FieldType::Tiny,
            0x02 => FieldType::Short,
            0x03 => FieldType::Long,
            0x04 => FieldType::Float,
            0x05 => FieldType::Double,
            0x06 => FieldType::Null,
            0x07 => FieldType::Timestamp,
            0x08 => FieldType::LongLong,
            0x09 => FieldType::Int24,
            0x0A => FieldType::Date,
            0x0B => FieldType::Time,
            0x0C => FieldType::DateTime,
            0x0D => FieldType::Year,
            0x0E => FieldType::NewDate,
            0x0F => FieldType::VarChar,
            0x10 => FieldType::Bit,
            0xF5 => FieldType::Json,
            0xF6 => FieldType::NewDecimal,
            0xF7 => FieldType::Enum,
            0xF8 => FieldType::Set,
            0xF9 => FieldType::TinyBlob,
            0xFA => FieldType::MediumBlob,
            0xFB => FieldType::LongBlob,
            0xFC => FieldType::Blob,
            0xFD => FieldType::VarString,
            0xFF => FieldType::Geometry,
            _ => FieldType::String,
        }
    }

    /// The wire code.
    pub const fn code(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn is_blob(self) -> bool {
        matches!(
            self,
            FieldType::TinyBlob | FieldType::MediumBlob | FieldType::LongBlob | FieldType::Blob
        )
    }

    /// Catalog record describing this wire type.
    ///
    /// Total: wire types without a dedicated entry describe as `varchar`.
    pub fn type_info(self) -> &'static SqlTypeInfo {
        let index = match self {
            FieldType::Decimal | FieldType::NewDecimal => 1,
            FieldType::Tiny => 2,
            FieldType::Short | FieldType::Long | FieldType::Int24 | FieldType::Year => 4,
            FieldType::Float | FieldType::Double => 7,
            FieldType::Timestamp => 8,
            FieldType::LongLong => 9,
            FieldType::Time => 11,
            FieldType::DateTime => 12,
            FieldType::Enum | FieldType::Set => 13,
            FieldType::TinyBlob | FieldType::MediumBlob | FieldType::LongBlob | FieldType::Blob => {
                14
            }
            FieldType::Null
            | FieldType::Date
            | FieldType::NewDate
            | FieldType::VarChar
            | FieldType::Bit
            | FieldType::Json
            | FieldType::VarString
            | FieldType::String
            | FieldType::Geometry => 0,
        };
        &TYPE_INFO[index]
    }
}

/// Column flags in result set metadata.
pub mod column_flags {
    pub const NOT_NULL: u16 = 1;
    pub const PRIMARY_KEY: u16 = 2;
    pub const UNIQUE_KEY: u16 = 4;
    pub const MULTIPLE_KEY: u16 = 8;
    pub const BLOB: u16 = 16;
    pub const UNSIGNED: u16 = 32;
    pub const BINARY: u16 = 128;
    pub const AUTO_INCREMENT: u16 = 512;
    pub const NUM: u16 = 32768;
}

/// Column definition from a result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub schema: String,
    /// Table name (or alias)
    pub table: String,
    pub org_table: String,
    /// Column name (or alias)
    pub name: String,
    pub org_name: String,
    /// Character set number; 63 is binary
    pub charset: u16,
    /// Declared display length
    pub length: u32,
    /// Longest value seen in a buffered result, 0 when unknown
    pub max_length: u64,
    pub field_type: FieldType,
    pub flags: u16,
    pub decimals: u8,
}

impl ColumnDef {
    /// A column with just a name and type, all metadata defaulted.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            schema: String::new(),
            table: String::new(),
            org_table: String::new(),
            name: name.into(),
            org_name: String::new(),
            charset: u16::from(crate::protocol::charset::UTF8MB4_GENERAL_CI),
            length: 0,
            max_length: 0,
            field_type,
            flags: 0,
            decimals: 0,
        }
    }

    #[must_use]
    pub fn with_flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn with_charset(mut self, charset: u16) -> Self {
        self.charset = charset;
        self
    }

    pub const fn is_not_null(&self) -> bool {
        self.flags & column_flags::NOT_NULL != 0
    }

    pub const fn is_primary_key(&self) -> bool {
        self.flags & column_flags::PRIMARY_KEY != 0
    }

    /// Part of any index: primary, unique or plain.
    pub const fn is_key(&self) -> bool {
        self.flags
            & (column_flags::PRIMARY_KEY | column_flags::UNIQUE_KEY | column_flags::MULTIPLE_KEY)
            != 0
    }

    pub const fn is_auto_increment(&self) -> bool {
        self.flags & column_flags::AUTO_INCREMENT != 0
    }

    pub const fn is_blob(&self) -> bool {
        self.flags & column_flags::BLOB != 0 || self.field_type.is_blob()
    }

    /// Binary data: binary charset or the BINARY flag.
    pub const fn is_binary(&self) -> bool {
        self.charset == crate::protocol::charset::BINARY as u16
            || self.flags & column_flags::BINARY != 0
    }

    pub fn is_numeric(&self) -> bool {
        self.flags & column_flags::NUM != 0 || self.field_type.type_info().is_num
    }

    /// Display precision: the larger of declared and observed length.
    pub fn precision(&self) -> u64 {
        u64::from(self.length).max(self.max_length)
    }
}

/// SQL type codes, as declared by a caller on bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
pub enum SqlType {
    Char = 1,
    Numeric = 2,
    Decimal = 3,
    Integer = 4,
    SmallInt = 5,
    Float = 6,
    Real = 7,
    Double = 8,
    Date = 9,
    Time = 10,
    Timestamp = 11,
    VarChar = 12,
    LongVarChar = -1,
    Binary = -2,
    VarBinary = -3,
    LongVarBinary = -4,
    BigInt = -5,
    TinyInt = -6,
    Bit = -7,
}

impl SqlType {
    /// Look up a code. Codes outside the closed set yield `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            1 => SqlType::Char,
            2 => SqlType::Numeric,
            3 => SqlType::Decimal,
            4 => SqlType::Integer,
            5 => SqlType::SmallInt,
            6 => SqlType::Float,
            7 => SqlType::Real,
            8 => SqlType::Double,
            9 => SqlType::Date,
            10 => SqlType::Time,
            11 => SqlType::Timestamp,
            12 => SqlType::VarChar,
            -1 => SqlType::LongVarChar,
            -2 => SqlType::Binary,
            -3 => SqlType::VarBinary,
            -4 => SqlType::LongVarBinary,
            -5 => SqlType::BigInt,
            -6 => SqlType::TinyInt,
            -7 => SqlType::Bit,
            _ => return None,
        })
    }

    pub const fn code(self) -> i16 {
        self as i16
    }

    /// Values of these types are spliced into SQL unquoted.
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            SqlType::Numeric
                | SqlType::Decimal
                | SqlType::Integer
                | SqlType::SmallInt
                | SqlType::Float
                | SqlType::Real
                | SqlType::Double
                | SqlType::BigInt
                | SqlType::TinyInt
        )
    }
}

/// One catalog record, in `type_info_all` column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SqlTypeInfo {
    pub type_name: &'static str,
    pub data_type: SqlType,
    pub column_size: u32,
    pub literal_prefix: Option<&'static str>,
    pub literal_suffix: Option<&'static str>,
    pub create_params: Option<&'static str>,
    pub nullable: bool,
    pub case_sensitive: bool,
    /// 0 = not searchable, 1 = LIKE only, 3 = searchable
    pub searchable: u8,
    pub unsigned_attribute: bool,
    pub fixed_prec_scale: bool,
    pub auto_unique_value: bool,
    pub local_type_name: &'static str,
    pub minimum_scale: u8,
    pub maximum_scale: u8,
    pub num_prec_radix: u8,
    pub sql_datatype: Option<SqlType>,
    pub sql_datetime_sub: u8,
    pub interval_precision: u8,
    #[serde(rename = "native_type")]
    pub native_type: u8,
    #[serde(rename = "is_num")]
    pub is_num: bool,
}

/// Column names of `type_info_all`, in order.
pub const TYPE_INFO_COLUMNS: [&str; 21] = [
    "TYPE_NAME",
    "DATA_TYPE",
    "COLUMN_SIZE",
    "LITERAL_PREFIX",
    "LITERAL_SUFFIX",
    "CREATE_PARAMS",
    "NULLABLE",
    "CASE_SENSITIVE",
    "SEARCHABLE",
    "UNSIGNED_ATTRIBUTE",
    "FIXED_PREC_SCALE",
    "AUTO_UNIQUE_VALUE",
    "LOCAL_TYPE_NAME",
    "MINIMUM_SCALE",
    "MAXIMUM_SCALE",
    "NUM_PREC_RADIX",
    "SQL_DATATYPE",
    "SQL_DATETIME_SUB",
    "INTERVAL_PRECISION",
    "native_type",
    "is_num",
];

const Q: Option<&str> = Some("'");

#[allow(clippy::too_many_arguments, clippy::fn_params_excessive_bools)]
const fn entry(
    type_name: &'static str,
    data_type: SqlType,
    column_size: u32,
    quote: Option<&'static str>,
    create_params: Option<&'static str>,
    (nullable, unsigned_attribute, auto_unique_value): (bool, bool, bool),
    searchable: u8,
    local_type_name: &'static str,
    (minimum_scale, maximum_scale, num_prec_radix): (u8, u8, u8),
    sql_datatype: Option<SqlType>,
    native: FieldType,
    is_num: bool,
) -> SqlTypeInfo {
    SqlTypeInfo {
        type_name,
        data_type,
        column_size,
        literal_prefix: quote,
        literal_suffix: quote,
        create_params,
        nullable,
        case_sensitive: false,
        searchable,
        unsigned_attribute,
        fixed_prec_scale: false,
        auto_unique_value,
        local_type_name,
        minimum_scale,
        maximum_scale,
        num_prec_radix,
        sql_datatype,
        sql_datetime_sub: 0,
        interval_precision: 0,
        native_type: native.code(),
        is_num,
    }
}

use FieldType as F;
use SqlType as S;

/// The type catalog. The first fifteen rows are the per-wire-type
/// descriptions [`FieldType::type_info`] points at; the rest only show up
/// in `type_info_all`.
#[rustfmt::skip]
pub static TYPE_INFO: [SqlTypeInfo; 45] = [
    entry("varchar", S::VarChar, 255, Q, Some("max length"), (true, false, false), 3, "variable length string", (0, 0, 0), Some(S::VarChar), F::VarString, false),
    entry("decimal", S::Decimal, 15, None, Some("precision,scale"), (true, false, false), 3, "double", (0, 6, 2), Some(S::Decimal), F::NewDecimal, true),
    entry("tinyint", S::TinyInt, 3, None, None, (true, false, false), 3, "Tiny integer", (0, 0, 10), Some(S::TinyInt), F::Tiny, true),
    entry("smallint", S::SmallInt, 5, None, None, (true, false, false), 3, "Short integer", (0, 0, 10), Some(S::SmallInt), F::Long, true),
    entry("integer", S::Integer, 10, None, None, (true, false, false), 3, "integer", (0, 0, 10), Some(S::Integer), F::Long, true),
    entry("float", S::Real, 7, None, None, (true, false, false), 0, "float", (0, 2, 10), Some(S::Float), F::Double, true),
    entry("double", S::Float, 15, None, None, (true, false, false), 3, "double", (0, 4, 2), Some(S::Float), F::Double, true),
    entry("double", S::Double, 15, None, None, (true, false, false), 3, "double", (0, 4, 10), Some(S::Double), F::Double, true),
    entry("timestamp", S::Timestamp, 14, Q, None, (false, false, false), 3, "timestamp", (0, 0, 0), Some(S::Timestamp), F::Timestamp, false),
    entry("bigint", S::BigInt, 19, None, None, (true, false, false), 3, "Longlong integer", (0, 0, 10), Some(S::BigInt), F::LongLong, true),
    entry("mediumint", S::Integer, 8, None, None, (true, false, false), 3, "Medium integer", (0, 0, 10), Some(S::Integer), F::Long, true),
    entry("time", S::Time, 6, Q, None, (true, false, false), 3, "time", (0, 0, 0), Some(S::Time), F::Time, false),
    entry("datetime", S::Timestamp, 21, Q, None, (true, false, false), 3, "datetime", (0, 0, 0), Some(S::Timestamp), F::DateTime, false),
    entry("enum", S::VarChar, 255, Q, None, (true, false, false), 1, "enum(value1,value2,value3...)", (0, 0, 0), None, F::Enum, false),
    entry("blob", S::LongVarBinary, 65535, Q, None, (true, false, false), 3, "binary large object (0-65535)", (0, 0, 0), Some(S::LongVarBinary), F::Blob, false),
    entry("tinyblob", S::VarBinary, 255, Q, None, (true, false, false), 3, "binary large object (0-255) ", (0, 0, 0), Some(S::VarBinary), F::Blob, false),
    entry("mediumblob", S::LongVarBinary, 16_777_215, Q, None, (true, false, false), 3, "binary large object", (0, 0, 0), Some(S::LongVarBinary), F::Blob, false),
    entry("longblob", S::LongVarBinary, 2_147_483_647, Q, None, (true, false, false), 3, "binary large object, use mediumblob instead", (0, 0, 0), Some(S::LongVarBinary), F::Blob, false),
    entry("char", S::Char, 255, Q, Some("max length"), (true, false, false), 3, "string", (0, 0, 0), Some(S::Char), F::VarString, false),
    entry("decimal", S::Numeric, 15, None, Some("precision,scale"), (true, false, false), 3, "double", (0, 6, 2), Some(S::Numeric), F::NewDecimal, true),
    entry("tinyint unsigned", S::TinyInt, 3, None, None, (true, true, false), 3, "Tiny integer unsigned", (0, 0, 10), Some(S::TinyInt), F::Tiny, true),
    entry("smallint unsigned", S::SmallInt, 5, None, None, (true, true, false), 3, "Short integer unsigned", (0, 0, 10), Some(S::SmallInt), F::Long, true),
    entry("mediumint unsigned", S::Integer, 8, None, None, (true, true, false), 3, "Medium integer unsigned", (0, 0, 10), Some(S::Integer), F::Long, true),
    entry("int unsigned", S::Integer, 10, None, None, (true, true, false), 3, "integer unsigned", (0, 0, 10), Some(S::Integer), F::Long, true),
    entry("int", S::Integer, 10, None, None, (true, false, false), 3, "integer", (0, 0, 10), Some(S::Integer), F::Long, true),
    entry("integer unsigned", S::Integer, 10, None, None, (true, true, false), 3, "integer", (0, 0, 10), Some(S::Integer), F::Long, true),
    entry("bigint unsigned", S::BigInt, 20, None, None, (true, true, false), 3, "Longlong integer unsigned", (0, 0, 10), Some(S::BigInt), F::LongLong, true),
    entry("text", S::LongVarChar, 65535, Q, None, (true, false, false), 3, "large text object (0-65535)", (0, 0, 0), Some(S::LongVarChar), F::Blob, false),
    entry("mediumtext", S::LongVarChar, 16_777_215, Q, None, (true, false, false), 3, "large text object", (0, 0, 0), Some(S::LongVarChar), F::Blob, false),
    entry("mediumint unsigned auto_increment", S::Integer, 8, None, None, (false, true, true), 3, "Medium integer unsigned auto_increment", (0, 0, 10), Some(S::Integer), F::Long, true),
    entry("tinyint unsigned auto_increment", S::TinyInt, 3, None, None, (false, true, true), 3, "tinyint unsigned auto_increment", (0, 0, 10), Some(S::TinyInt), F::Tiny, true),
    entry("smallint auto_increment", S::SmallInt, 5, None, None, (false, false, true), 3, "smallint auto_increment", (0, 0, 10), Some(S::SmallInt), F::Long, true),
    entry("int unsigned auto_increment", S::Integer, 10, None, None, (false, true, true), 3, "integer unsigned auto_increment", (0, 0, 10), Some(S::Integer), F::Long, true),
    entry("mediumint", S::Integer, 7, None, None, (true, false, false), 3, "Medium integer", (0, 0, 10), Some(S::Integer), F::Long, true),
    entry("bit", S::Bit, 1, None, None, (true, false, false), 3, "char(1)", (0, 0, 0), Some(S::Bit), F::Long, false),
    entry("numeric", S::Numeric, 19, None, Some("precision,scale"), (true, false, false), 3, "numeric", (0, 19, 10), Some(S::Numeric), F::NewDecimal, true),
    entry("integer unsigned auto_increment", S::Integer, 10, None, None, (false, true, true), 3, "integer unsigned auto_increment", (0, 0, 10), Some(S::Integer), F::Long, true),
    entry("smallint unsigned auto_increment", S::SmallInt, 5, None, None, (false, true, true), 3, "smallint unsigned auto_increment", (0, 0, 10), Some(S::SmallInt), F::Long, true),
    entry("int auto_increment", S::Integer, 10, None, None, (false, false, true), 3, "integer auto_increment", (0, 0, 10), Some(S::Integer), F::Long, true),
    SqlTypeInfo {
        literal_suffix: None,
        ..entry("long varbinary", S::LongVarBinary, 16_777_215, Some("0x"), None, (true, false, false), 3, "mediumblob", (0, 0, 0), Some(S::LongVarBinary), F::Blob, false)
    },
    entry("double auto_increment", S::Double, 15, None, None, (false, false, true), 3, "double auto_increment", (0, 4, 10), Some(S::Double), F::Double, true),
    entry("bigint auto_increment", S::BigInt, 19, None, None, (false, false, true), 3, "bigint auto_increment", (0, 0, 10), Some(S::BigInt), F::LongLong, true),
    entry("float auto_increment", S::Real, 7, None, None, (false, false, true), 0, "float auto_increment", (0, 2, 10), Some(S::Float), F::Double, true),
    entry("long varchar", S::LongVarChar, 16_777_215, Q, None, (true, false, false), 3, "mediumtext", (0, 0, 0), Some(S::LongVarChar), F::Blob, true),
    entry("bigint unsigned auto_increment", S::BigInt, 20, None, None, (false, true, true), 3, "bigint unsigned auto_increment", (0, 0, 10), Some(S::BigInt), F::LongLong, true),
];

/// First catalog entry whose `DATA_TYPE` is `sql_type`.
pub fn type_info_for(sql_type: SqlType) -> Option<&'static SqlTypeInfo> {
    TYPE_INFO.iter().find(|info| info.data_type == sql_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_type_from_u8() {
        assert_eq!(FieldType::from_u8(0x03), FieldType::Long);
        assert_eq!(FieldType::from_u8(0xFC), FieldType::Blob);
        assert_eq!(FieldType::from_u8(0x42), FieldType::String);
    }

    #[test]
    fn type_info_is_total() {
        for code in 0..=u8::MAX {
            let info = FieldType::from_u8(code).type_info();
            assert!(!info.type_name.is_empty());
        }
        assert_eq!(FieldType::Long.type_info().type_name, "integer");
        assert_eq!(FieldType::LongLong.type_info().type_name, "bigint");
        assert_eq!(FieldType::NewDecimal.type_info().type_name, "decimal");
        assert_eq!(FieldType::Blob.type_info().type_name, "blob");
        assert_eq!(FieldType::Enum.type_info().type_name, "enum");
        assert_eq!(FieldType::Date.type_info().type_name, "varchar");
        assert!(FieldType::Double.type_info().is_num);
        assert!(!FieldType::VarString.type_info().is_num);
    }

    #[test]
    fn sql_type_codes() {
        assert_eq!(SqlType::from_code(4), Some(SqlType::Integer));
        assert_eq!(SqlType::from_code(-5), Some(SqlType::BigInt));
        assert_eq!(SqlType::from_code(93), None);
        assert_eq!(SqlType::VarChar.code(), 12);
        for numeric in [
            SqlType::Numeric,
            SqlType::Decimal,
            SqlType::Integer,
            SqlType::SmallInt,
            SqlType::Float,
            SqlType::Real,
            SqlType::Double,
            SqlType::BigInt,
            SqlType::TinyInt,
        ] {
            assert!(numeric.is_numeric(), "{numeric:?}");
        }
        assert!(!SqlType::VarChar.is_numeric());
        assert!(!SqlType::Bit.is_numeric());
        assert!(!SqlType::Date.is_numeric());
    }

    #[test]
    fn literal_prefix_lookup() {
        assert_eq!(type_info_for(SqlType::VarChar).unwrap().literal_prefix, Some("'"));
        assert_eq!(type_info_for(SqlType::Integer).unwrap().literal_prefix, None);
        assert_eq!(type_info_for(SqlType::Date), None);
    }

    #[test]
    fn column_def_flags() {
        use column_flags::*;
        let col = ColumnDef::new("id", FieldType::Long)
            .with_flags(NOT_NULL | PRIMARY_KEY | AUTO_INCREMENT | NUM);
        assert!(col.is_not_null());
        assert!(col.is_primary_key());
        assert!(col.is_key());
        assert!(col.is_auto_increment());
        assert!(col.is_numeric());
        assert!(!col.is_blob());

        let col = ColumnDef::new("data", FieldType::Blob).with_charset(63);
        assert!(col.is_blob());
        assert!(col.is_binary());
        assert!(!ColumnDef::new("name", FieldType::VarString).is_binary());
    }

    #[test]
    fn precision_uses_longest() {
        let mut col = ColumnDef::new("name", FieldType::VarString);
        col.length = 10;
        col.max_length = 40;
        assert_eq!(col.precision(), 40);
        col.max_length = 3;
        assert_eq!(col.precision(), 10);
    }
}
