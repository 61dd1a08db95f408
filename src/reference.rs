//! Fixed-width document references
//!
//! Cash-cut ledgers pack the documents they cover into one text column. Each
//! reference is a fixed-width record: characters `[0, 10)` hold the document
//! id, `[10, 30)` the series and `[30, end)` the folio. Several references are
//! separated by line breaks.
use serde::Serialize;
use std::iter::once;
use thiserror::Error;
use tracing::debug;

const DOCUMENT_ID_END: usize = 10;
const SERIES_END: usize = 30;

#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("Cannot slice characters {lower}..{upper:?} of '{line}'")]
    SliceError {
        lower: usize,
        upper: Option<usize>,
        line: String,
    },
}

/// One decoded document reference; all three parts are non-empty.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct DocumentReference {
    pub document_id: String,
    pub series: String,
    pub folio: String,
}

impl DocumentReference {
    /// Trims the three parts; returns None if any of them ends up empty.
    pub fn new(document_id: &str, series: &str, folio: &str) -> Option<Self> {
        let (document_id, series, folio) = (document_id.trim(), series.trim(), folio.trim());
        if document_id.is_empty() || series.is_empty() || folio.is_empty() {
            None
        } else {
            Some(Self {
                document_id: document_id.to_owned(),
                series: series.to_owned(),
                folio: folio.to_owned(),
            })
        }
    }
}

/// Decodes zero or more references from a packed text value.
///
/// Lines shorter than 30 characters and lines with a blank part are skipped.
/// Never fails: a value that cannot be sliced yields no references at all.
pub fn parse_references(text: Option<&str>) -> Vec<DocumentReference> {
    let Some(text) = text.filter(|text| !text.trim().is_empty()) else {
        return Vec::new();
    };
    match try_parse_references(text) {
        Ok(references) => references,
        Err(error) => {
            debug!(%error, "discarding undecodable document references");
            Vec::new()
        }
    }
}

fn try_parse_references(text: &str) -> Result<Vec<DocumentReference>, ReferenceError> {
    if !text.contains(['\n', '\r']) && text.chars().count() >= SERIES_END {
        return Ok(parse_line(text)?.into_iter().collect());
    }
    let mut references = Vec::new();
    for line in text.split(['\n', '\r']).filter(|line| !line.is_empty()) {
        if line.chars().count() < SERIES_END {
            continue;
        }
        if let Some(reference) = parse_line(line)? {
            references.push(reference);
        }
    }
    Ok(references)
}

fn parse_line(line: &str) -> Result<Option<DocumentReference>, ReferenceError> {
    let document_id = slice(line, 0, Some(DOCUMENT_ID_END))?;
    let series = slice(line, DOCUMENT_ID_END, Some(SERIES_END))?;
    let folio = slice(line, SERIES_END, None)?;
    Ok(DocumentReference::new(document_id, series, folio))
}

/// Slices by character positions; `upper = None` runs to the end of the line
fn slice(line: &str, lower: usize, upper: Option<usize>) -> Result<&str, ReferenceError> {
    let boundary = |index: usize| {
        line.char_indices()
            .map(|(offset, _)| offset)
            .chain(once(line.len()))
            .nth(index)
    };
    let start = boundary(lower);
    let end = match upper {
        Some(upper) => boundary(upper),
        None => Some(line.len()),
    };
    start
        .zip(end)
        .and_then(|(start, end)| line.get(start..end))
        .ok_or_else(|| ReferenceError::SliceError {
            lower,
            upper,
            line: line.to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = "1234567890          FGIFS                 4821";

    fn reference(document_id: &str, series: &str, folio: &str) -> DocumentReference {
        DocumentReference::new(document_id, series, folio).unwrap()
    }

    #[test]
    fn single_fixed_width_line() {
        assert_eq!(parse_references(Some(LINE)), vec![reference("1234567890", "FGIFS", "4821")]);
    }

    #[test]
    fn short_single_line_is_empty() {
        assert!(parse_references(Some("1234567890 FGIFS 4821")).is_empty());
        assert!(parse_references(Some(&"x".repeat(29))).is_empty());
    }

    #[test]
    fn blank_input_is_empty() {
        assert!(parse_references(None).is_empty());
        assert!(parse_references(Some("")).is_empty());
        assert!(parse_references(Some("   \r\n\t  ")).is_empty());
    }

    #[test]
    fn multiple_lines_keep_order_and_skip_short_lines() {
        let text = format!("{LINE}\nShort");
        assert_eq!(parse_references(Some(&text)), vec![reference("1234567890", "FGIFS", "4821")]);

        let second = "0000000002          FGIFS                 4822";
        let text = format!("{LINE}\r\n{second}\r\n");
        assert_eq!(
            parse_references(Some(&text)),
            vec![
                reference("1234567890", "FGIFS", "4821"),
                reference("0000000002", "FGIFS", "4822"),
            ]
        );
    }

    #[test]
    fn blank_part_discards_whole_line() {
        let no_series = "1234567890                              4821";
        let no_folio = "1234567890          FGIFS          ";
        let no_id = "                    FGIFS          4821";
        for line in [no_series, no_folio, no_id] {
            assert!(parse_references(Some(line)).is_empty(), "{line:?}");
        }
        let text = format!("{no_series}\n{LINE}");
        assert_eq!(parse_references(Some(&text)).len(), 1);
    }

    #[test]
    fn slices_by_characters() {
        let line = "ÑÑÑ4567890          SERIEÑ                7";
        assert_eq!(parse_references(Some(line)), vec![reference("ÑÑÑ4567890", "SERIEÑ", "7")]);
    }

    #[test]
    fn parsing_is_idempotent() {
        let text = format!("{LINE}\nShort\n{LINE}");
        assert_eq!(parse_references(Some(&text)), parse_references(Some(&text)));
    }

    #[test]
    fn slice_out_of_range_is_an_error() {
        assert!(slice("abc", 5, None).is_err());
        assert_eq!(slice("abcdef", 2, Some(4)).unwrap(), "cd");
        assert_eq!(slice("abcdef", 6, None).unwrap(), "");
    }
}
