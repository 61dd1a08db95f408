use serde::Serialize;

/// Declared data types of legacy table columns.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ColumnType {
    /// Fixed-width text (`C`)
    Character,
    /// Fixed-point number stored as ASCII text (`N`)
    Numeric,
    /// Floating-point number stored as ASCII text (`F`)
    Float,
    /// Date stored as `YYYYMMDD` text (`D`)
    Date,
    /// Single-character boolean (`L`)
    Logical,
    /// Little-endian 32-bit integer (`I`)
    Integer,
    /// Little-endian 64-bit integer scaled by 10 000 (`Y`)
    Currency,
    /// Little-endian IEEE 754 double (`B`)
    Double,
    /// Julian day number plus milliseconds since midnight (`T`)
    DateTime,
    /// Memo block reference (`M`, `G`, `P`) into the `.fpt` / `.dbt` file beside the table
    Memo,
    /// Any other declared type code
    Other(char),
}

impl ColumnType {
    /// Maps a header type code to a column type.
    pub fn from_code(code: u8) -> Self {
        match code.to_ascii_uppercase() {
            b'C' => Self::Character,
            b'N' => Self::Numeric,
            b'F' => Self::Float,
            b'D' => Self::Date,
            b'L' => Self::Logical,
            b'I' => Self::Integer,
            b'Y' => Self::Currency,
            b'B' | b'O' => Self::Double,
            b'T' | b'@' => Self::DateTime,
            b'M' | b'G' | b'P' => Self::Memo,
            other => Self::Other(other as char),
        }
    }

    /// Returns the name shown to operators in diagnostic reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::Numeric => "numeric",
            Self::Float => "float",
            Self::Date => "date",
            Self::Logical => "logical",
            Self::Integer => "integer",
            Self::Currency => "currency",
            Self::Double => "double",
            Self::DateTime => "datetime",
            Self::Memo => "memo",
            Self::Other(_) => "unknown",
        }
    }

    /// Returns true if values of this type are numbers.
    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Numeric | Self::Float | Self::Integer | Self::Currency | Self::Double
        )
    }
}

impl Serialize for ColumnType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A column as declared in a legacy table header.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnDescriptor {
    /// Column name (upper case in most legacy tables)
    pub name: String,
    /// Declared column type
    pub kind: ColumnType,
    /// Declared width in bytes
    pub length: usize,
    /// Declared decimal places (numeric columns only)
    pub decimals: u8,
}

impl ColumnDescriptor {
    pub fn new(name: &str, kind: ColumnType, length: usize, decimals: u8) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            length,
            decimals,
        }
    }
}
