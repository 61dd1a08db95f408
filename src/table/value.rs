use chrono::NaiveDate;
use chrono::NaiveDateTime;
use serde_json::Value;
use std::fmt::Display;

/// Raw value of one cell in the current row of a legacy table.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// Blank numeric/date cells, blank memo pointers and binary memo blocks
    Null,
    /// Decoded text, trailing padding removed
    Text(String),
    /// Fractional numbers
    Number(f64),
    /// Whole numbers
    Integer(i64),
    /// Booleans
    Logical(bool),
    /// Dates without time
    Date(NaiveDate),
    /// Dates with time
    DateTime(NaiveDateTime),
}

impl FieldValue {
    /// Returns true for `Null` and for text made only of whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    /// Text as stored, leading padding kept, for values sliced by character position.
    pub fn to_raw_text(&self) -> String {
        match self {
            Self::Text(text) => text.to_owned(),
            value => value.to_string(),
        }
    }

    /// Converts the value to JSON for raw sample output.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Text(text) => Value::String(text.trim().to_owned()),
            Self::Number(number) => serde_json::Number::from_f64(*number)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Integer(integer) => Value::from(*integer),
            Self::Logical(logical) => Value::Bool(*logical),
            Self::Date(_) | Self::DateTime(_) => Value::String(self.to_string()),
        }
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Text(text) => write!(f, "{}", text.trim()),
            Self::Number(number) => write!(f, "{}", number),
            Self::Integer(integer) => write!(f, "{}", integer),
            Self::Logical(logical) => write!(f, "{}", logical),
            Self::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Self::DateTime(datetime) => write!(f, "{}", datetime.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn display_trims_text_and_formats_dates() {
        assert_eq!(FieldValue::Text("  ABC   ".to_owned()).to_string(), "ABC");
        assert_eq!(FieldValue::Null.to_string(), "");
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(FieldValue::Date(date).to_string(), "2024-03-09");
        let datetime = date.and_hms_opt(13, 5, 0).unwrap();
        assert_eq!(FieldValue::DateTime(datetime).to_string(), "2024-03-09 13:05:00");
    }

    #[test]
    fn json_conversion() {
        assert_eq!(FieldValue::Integer(42).to_json(), json!(42));
        assert_eq!(FieldValue::Number(1.5).to_json(), json!(1.5));
        assert_eq!(FieldValue::Number(f64::NAN).to_json(), Value::Null);
        assert_eq!(FieldValue::Logical(true).to_json(), json!(true));
        assert_eq!(FieldValue::Text("x  ".to_owned()).to_json(), json!("x"));
    }

    #[test]
    fn raw_text_keeps_leading_padding() {
        assert_eq!(FieldValue::Text("  12 AB".to_owned()).to_raw_text(), "  12 AB");
        assert_eq!(FieldValue::Integer(7).to_raw_text(), "7");
        assert_eq!(FieldValue::Null.to_raw_text(), "");
    }

    #[test]
    fn blank_values() {
        assert!(FieldValue::Null.is_blank());
        assert!(FieldValue::Text("   ".to_owned()).is_blank());
        assert!(!FieldValue::Integer(0).is_blank());
    }
}
