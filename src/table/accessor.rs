use crate::error::LegacyError;
use crate::table::value::FieldValue;
use crate::table::RecordCursor;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use serde_json::Map;
use serde_json::Value;
use tracing::trace;
use tracing::Span;

const DATE_FORMATS: [&str; 4] = ["%Y%m%d", "%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d/%m/%Y %H:%M:%S"];

/// Typed, null-tolerant view of the cursor's current record.
///
/// A single malformed legacy cell must not abort a scan, so unreadable or
/// out-of-range values resolve to `""`, `0`, `0.0` or `None`. The only hard
/// failure is asking for a column the table does not declare.
pub struct Row<'a> {
    cursor: &'a dyn RecordCursor,
    number: usize,
    span: &'a Span,
}

impl<'a> Row<'a> {
    /// Wraps the current record; `number` is its 0-based position in the scan.
    /// Cell-level events are logged under `span`.
    pub fn new(cursor: &'a dyn RecordCursor, number: usize, span: &'a Span) -> Self {
        Self { cursor, number, span }
    }

    /// 0-based position of the record in the scan
    pub fn number(&self) -> usize {
        self.number
    }

    /// Returns true if the table declares the column, letting mappers
    /// tolerate columns that differ across table revisions.
    pub fn has_column(&self, name: &str) -> bool {
        self.cursor.ordinal(name).is_some()
    }

    /// Reads the raw value; unreadable cells become `FieldValue::Null`.
    pub fn value(&self, name: &str) -> Result<FieldValue, LegacyError> {
        match self.checked_value(name) {
            Err(LegacyError::RowDecode { message, .. }) => {
                trace!(parent: self.span, row = self.number, column = name, error = %message, "unreadable cell read as null");
                Ok(FieldValue::Null)
            }
            result => result,
        }
    }

    /// Reads the raw value, failing the row when the cell cannot be decoded.
    /// For columns whose loss would silently change the record's meaning.
    pub fn checked_value(&self, name: &str) -> Result<FieldValue, LegacyError> {
        let ordinal = self
            .cursor
            .ordinal(name)
            .ok_or_else(|| LegacyError::UnknownColumn(name.to_owned()))?;
        self.cursor.value(ordinal).map_err(|error| LegacyError::RowDecode {
            row: self.number,
            message: format!("column {name}: {error}"),
        })
    }

    /// Trimmed text of the column
    pub fn string(&self, name: &str) -> Result<String, LegacyError> {
        self.value(name).map(|value| to_string(&value))
    }

    /// Trimmed text of the column, or `""` if the table lacks it
    pub fn optional_string(&self, name: &str) -> Result<String, LegacyError> {
        if self.has_column(name) {
            self.string(name)
        } else {
            Ok(String::new())
        }
    }

    pub fn int32(&self, name: &str) -> Result<i32, LegacyError> {
        self.value(name).map(|value| to_int32(&value))
    }

    pub fn decimal(&self, name: &str) -> Result<f64, LegacyError> {
        self.value(name).map(|value| to_decimal(&value))
    }

    pub fn datetime(&self, name: &str) -> Result<Option<NaiveDateTime>, LegacyError> {
        self.value(name).map(|value| to_datetime(&value))
    }

    pub fn date(&self, name: &str) -> Result<Option<NaiveDate>, LegacyError> {
        self.datetime(name).map(|datetime| datetime.map(|datetime| datetime.date()))
    }

    /// Converts the whole record to a column → value map.
    /// Unlike the typed readers, an unreadable cell fails the whole record.
    pub fn to_json_map(&self) -> Result<Map<String, Value>, LegacyError> {
        self.cursor
            .columns()
            .iter()
            .enumerate()
            .map(|(ordinal, column)| Ok((column.name.to_owned(), self.cursor.value(ordinal)?.to_json())))
            .collect()
    }
}

pub(crate) fn to_string(value: &FieldValue) -> String {
    match value {
        FieldValue::Logical(true) => "T".to_owned(),
        FieldValue::Logical(false) => "F".to_owned(),
        value => value.to_string(),
    }
}

pub(crate) fn to_int32(value: &FieldValue) -> i32 {
    match value {
        FieldValue::Integer(integer) => i32::try_from(*integer).unwrap_or(0),
        FieldValue::Number(number) => float_to_int32(*number),
        FieldValue::Text(text) => {
            let text = text.trim();
            text.parse::<i32>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().map(float_to_int32))
                .unwrap_or(0)
        }
        FieldValue::Logical(logical) => *logical as i32,
        _ => 0,
    }
}

fn float_to_int32(number: f64) -> i32 {
    if number.is_finite() && number >= i32::MIN as f64 && number <= i32::MAX as f64 {
        number.trunc() as i32
    } else {
        0
    }
}

pub(crate) fn to_decimal(value: &FieldValue) -> f64 {
    match value {
        FieldValue::Number(number) if number.is_finite() => *number,
        FieldValue::Integer(integer) => *integer as f64,
        FieldValue::Text(text) => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|number| number.is_finite())
            .unwrap_or(0.0),
        _ => 0.0,
    }
}

pub(crate) fn to_datetime(value: &FieldValue) -> Option<NaiveDateTime> {
    match value {
        FieldValue::DateTime(datetime) => Some(*datetime),
        FieldValue::Date(date) => date.and_hms_opt(0, 0, 0),
        FieldValue::Text(text) => {
            let text = text.trim();
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
                .or_else(|| {
                    DATE_FORMATS
                        .iter()
                        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                        .and_then(|date| date.and_hms_opt(0, 0, 0))
                })
        }
        _ => None,
    }
}
