//! dBase / FoxPro table format (.dbf)
//! Reader for the fixed-schema tables written by the legacy point-of-sale system
//! Handles the 32-byte header, the field descriptor array and fixed-length records

use crate::error::LegacyError;
use crate::helpers::memo::MemoReader;
use crate::helpers::string::to_ascii_name;
use crate::helpers::string::to_f64;
use crate::helpers::string::to_i32;
use crate::helpers::string::to_i64;
use crate::helpers::string::to_u16;
use crate::helpers::string::to_u32;
use crate::table::column::ColumnDescriptor;
use crate::table::column::ColumnType;
use crate::table::value::FieldValue;
use chrono::NaiveDate;
use chrono::NaiveTime;
use encoding_rs::Encoding;
use std::cell::RefCell;
use std::fs::File;
use std::io::BufReader;
use std::io::ErrorKind;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;
use thiserror::Error;
use tracing::debug;
use tracing::warn;

const HEADER_SIZE: usize = 32;
const DESCRIPTOR_SIZE: usize = 32;
const HEADER_TERMINATOR: u8 = 0x0D;
const END_OF_FILE: u8 = 0x1A;
const DELETED: u8 = b'*';
const SYSTEM_COLUMN: u8 = 0x01;
const JULIAN_DAY_BEFORE_CE: i64 = 1_721_425; // Julian day number of 0000-12-31

/// Errors specific to DBF table parsing
#[derive(Error, Debug)]
pub enum DbfError {
    #[error("Fewer than {0} header bytes available")]
    HeaderTruncated(usize),

    #[error("Field descriptor array is not terminated")]
    MissingTerminator,

    #[error("Declared record length {0} is shorter than its fields ({1} bytes)")]
    RecordLengthMismatch(usize, usize),

    #[error("Invalid numeric value '{0}'")]
    InvalidNumber(String),

    #[error("Invalid date value '{0}'")]
    InvalidDate(String),

    #[error("Invalid logical value '{0}'")]
    InvalidLogical(char),

    #[error("Column index {0} is out of range")]
    ColumnOutOfRange(usize),

    #[error("No current record, advance the cursor first")]
    NoCurrentRecord,

    #[error("Memo block {0} is referenced but no memo file sits beside the table")]
    MemoFileMissing(u32),

    #[error("Failed to read memo block {block}: {source}")]
    MemoBlock {
        block: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Memo of {0} bytes exceeds the supported size")]
    MemoTooLarge(u32),

    #[error("Invalid memo block size {0}")]
    InvalidMemoBlockSize(u16),
}

/// Fixed table header (first 32 bytes of the file)
#[derive(Clone, Debug)]
pub(crate) struct DbfHeader {
    pub(crate) version: u8,
    pub(crate) last_update: Option<NaiveDate>,
    pub(crate) record_count: u32,
    pub(crate) header_length: u16,
    pub(crate) record_length: u16,
    pub(crate) language_driver: u8,
}

impl DbfHeader {
    fn new(data: &[u8]) -> DbfHeader {
        DbfHeader {
            version: data[0],
            last_update: NaiveDate::from_ymd_opt(1900 + data[1] as i32, data[2] as u32, data[3] as u32),
            record_count: to_u32(&data[4..8]),
            header_length: to_u16(&data[8..10]),
            record_length: to_u16(&data[10..12]),
            language_driver: data[29],
        }
    }
}

/// A field descriptor with its byte offset inside a record
#[derive(Clone, Debug)]
pub(crate) struct DbfField {
    pub(crate) column: ColumnDescriptor,
    pub(crate) offset: usize,
}

/// Reader for DBF tables
/// Holds one record buffer; field values are decoded on demand from the current record
pub(crate) struct DbfReader<R: Read + Seek> {
    reader: R,
    pub(crate) header: DbfHeader,
    pub(crate) fields: Vec<DbfField>,
    pub(crate) encoding: &'static Encoding,
    pub(crate) include_deleted: bool,
    /// Code page named by the language driver but decoded with the fallback encoding
    pub(crate) unsupported_code_page: Option<u16>,
    memo: Option<RefCell<MemoReader<R>>>,
    buffer: Vec<u8>,
    position: u32, // Number of physical records consumed
    has_record: bool,
}

impl DbfReader<BufReader<File>> {
    /// Opens a table file from disk, with its memo file when the table has memo columns
    pub(crate) fn open(path: &Path, encoding: Option<&'static Encoding>) -> Result<Self, LegacyError> {
        let file = File::open(path)?;
        let reader = Self::new(BufReader::new(file), encoding)?;
        if !reader.has_memo_columns() {
            return Ok(reader);
        }
        match MemoReader::open_beside(path)? {
            Some((memo_path, memo)) => {
                debug!(
                    path = %memo_path.display(),
                    format = ?memo.format,
                    block_size = memo.block_size,
                    "opened memo file"
                );
                Ok(reader.with_memo(memo))
            }
            None => Ok(reader),
        }
    }
}

impl<R: Read + Seek> DbfReader<R> {
    /// Reads the header and field descriptors, leaving the reader at the first record
    /// An explicit `encoding` overrides the code page named by the header language driver
    pub(crate) fn new(mut reader: R, encoding: Option<&'static Encoding>) -> Result<Self, LegacyError> {
        let mut data = [0u8; HEADER_SIZE];
        reader.read_exact(&mut data).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => LegacyError::from(DbfError::HeaderTruncated(HEADER_SIZE)),
            _ => LegacyError::from(e),
        })?;
        let header = DbfHeader::new(&data);
        let fields = Self::load_fields(&mut reader, &header)?;
        let mut unsupported_code_page = None;
        let encoding = match (encoding, language_driver_code_page(header.language_driver)) {
            (Some(encoding), _) => encoding,
            (None, Some(code_page)) => codepage::to_encoding(code_page).unwrap_or_else(|| {
                warn!(
                    language_driver = header.language_driver,
                    code_page,
                    fallback = encoding_rs::WINDOWS_1252.name(),
                    "code page not supported, set an explicit encoding"
                );
                unsupported_code_page = Some(code_page);
                encoding_rs::WINDOWS_1252
            }),
            (None, None) => encoding_rs::WINDOWS_1252,
        };
        reader.seek(SeekFrom::Start(header.header_length as u64))?;
        let buffer = vec![0u8; header.record_length as usize];

        Ok(DbfReader {
            reader,
            header,
            fields,
            encoding,
            include_deleted: false,
            unsupported_code_page,
            memo: None,
            buffer,
            position: 0,
            has_record: false,
        })
    }

    /// Resolves memo columns against `memo`
    pub(crate) fn with_memo(mut self, memo: MemoReader<R>) -> Self {
        self.memo = Some(RefCell::new(memo));
        self
    }

    pub(crate) fn has_memo_columns(&self) -> bool {
        self.fields.iter().any(|field| field.column.kind == ColumnType::Memo)
    }

    /// Conditions that make some values of the table unreliable or unreadable
    pub(crate) fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if let Some(code_page) = self.unsupported_code_page {
            warnings.push(format!(
                "Code page {code_page} named by the language driver is not supported, text is decoded as {}",
                self.encoding.name()
            ));
        }
        if self.memo.is_none() && self.has_memo_columns() {
            let columns = self
                .fields
                .iter()
                .filter(|field| field.column.kind == ColumnType::Memo)
                .map(|field| field.column.name.as_str())
                .collect::<Vec<_>>();
            warnings.push(format!(
                "No memo file beside the table, memo columns cannot be read: {}",
                columns.join(", ")
            ));
        }
        warnings
    }

    /// Loads the field descriptor array up to the header terminator
    /// System columns (e.g. `_NullFlags`) occupy record bytes but are not exposed
    fn load_fields(reader: &mut R, header: &DbfHeader) -> Result<Vec<DbfField>, LegacyError> {
        let mut fields = Vec::new();
        let mut offset = 1usize; // Deletion flag
        let mut count = 0usize;
        let mut descriptor = [0u8; DESCRIPTOR_SIZE];
        loop {
            match reader.read_exact(&mut descriptor[..1]) {
                Ok(()) => (),
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(DbfError::MissingTerminator)?,
                Err(e) => Err(e)?,
            }
            if descriptor[0] == HEADER_TERMINATOR {
                break;
            }
            match reader.read_exact(&mut descriptor[1..]) {
                Ok(()) => (),
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(DbfError::MissingTerminator)?,
                Err(e) => Err(e)?,
            }

            let length = descriptor[16] as usize;
            if descriptor[18] & SYSTEM_COLUMN == 0 {
                let name = to_ascii_name(&descriptor[..11]);
                let kind = ColumnType::from_code(descriptor[11]);
                fields.push(DbfField {
                    column: ColumnDescriptor::new(&name, kind, length, descriptor[17]),
                    offset,
                });
            }
            offset += length;
            count += 1;

            if HEADER_SIZE + count * DESCRIPTOR_SIZE >= header.header_length as usize {
                Err(DbfError::MissingTerminator)?
            }
        }

        if offset > header.record_length as usize {
            Err(DbfError::RecordLengthMismatch(header.record_length as usize, offset))?
        }
        Ok(fields)
    }

    /// Moves to the next live record
    /// Returns false at the end of the table, at the end-of-file marker or at a truncated trailing record
    pub(crate) fn next(&mut self) -> Result<bool, LegacyError> {
        loop {
            self.has_record = false;
            if self.position >= self.header.record_count {
                return Ok(false);
            }
            match self.reader.read_exact(&mut self.buffer) {
                Ok(()) => (),
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(false),
                Err(e) => Err(e)?,
            }
            self.position += 1;
            match self.buffer.first() {
                None | Some(&END_OF_FILE) => return Ok(false),
                Some(&DELETED) if !self.include_deleted => continue,
                Some(_) => {
                    self.has_record = true;
                    return Ok(true);
                }
            }
        }
    }

    /// Returns true if the current record carries the deletion flag
    pub(crate) fn is_deleted(&self) -> bool {
        self.has_record && self.buffer[0] == DELETED
    }

    /// Decodes one field of the current record
    pub(crate) fn decode(&self, index: usize) -> Result<FieldValue, DbfError> {
        if !self.has_record {
            Err(DbfError::NoCurrentRecord)?
        }
        let field = self.fields.get(index).ok_or(DbfError::ColumnOutOfRange(index))?;
        let bytes = &self.buffer[field.offset..field.offset + field.column.length];
        match field.column.kind {
            ColumnType::Character | ColumnType::Other(_) => {
                let (text, _, _) = self.encoding.decode(bytes);
                Ok(FieldValue::Text(text.trim_end_matches([' ', '\0']).to_owned()))
            }
            ColumnType::Numeric | ColumnType::Float => decode_number(bytes, field.column.decimals),
            ColumnType::Date => decode_date(bytes),
            ColumnType::Logical => decode_logical(bytes),
            ColumnType::Integer if bytes.len() >= 4 => Ok(FieldValue::Integer(to_i32(bytes) as i64)),
            ColumnType::Currency if bytes.len() >= 8 => Ok(FieldValue::Number(to_i64(bytes) as f64 / 10_000f64)),
            ColumnType::Double if bytes.len() >= 8 => Ok(FieldValue::Number(to_f64(bytes))),
            ColumnType::DateTime if bytes.len() >= 8 => decode_datetime(bytes),
            ColumnType::Integer | ColumnType::Currency | ColumnType::Double | ColumnType::DateTime => {
                Err(DbfError::InvalidNumber(format!("{} byte binary field", bytes.len())))
            }
            ColumnType::Memo => self.decode_memo(bytes),
        }
    }

    /// Resolves a memo pointer; blank or zero pointers are null
    fn decode_memo(&self, bytes: &[u8]) -> Result<FieldValue, DbfError> {
        let Some(block) = memo_block(bytes)? else {
            return Ok(FieldValue::Null);
        };
        let memo = self.memo.as_ref().ok_or(DbfError::MemoFileMissing(block))?;
        let text = memo.borrow_mut().read(block, self.encoding)?;
        Ok(text.map_or(FieldValue::Null, FieldValue::Text))
    }
}

/// Reads a memo pointer: 4-byte binary in Visual FoxPro tables, ASCII digits otherwise
fn memo_block(bytes: &[u8]) -> Result<Option<u32>, DbfError> {
    let block = if bytes.len() == 4 {
        if bytes == b"    " {
            return Ok(None);
        }
        to_u32(bytes)
    } else {
        let text = String::from_utf8_lossy(bytes);
        let text = text.trim_matches([' ', '\0']);
        if text.is_empty() {
            return Ok(None);
        }
        text.parse::<u32>()
            .map_err(|_| DbfError::InvalidNumber(text.to_owned()))?
    };
    Ok((block != 0).then_some(block))
}

/// Decodes ASCII numbers; blank cells are null
fn decode_number(bytes: &[u8], decimals: u8) -> Result<FieldValue, DbfError> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_matches([' ', '\0']);
    if text.is_empty() {
        return Ok(FieldValue::Null);
    }
    if decimals == 0 {
        if let Ok(integer) = text.parse::<i64>() {
            return Ok(FieldValue::Integer(integer));
        }
    }
    text.parse::<f64>()
        .map(FieldValue::Number)
        .map_err(|_| DbfError::InvalidNumber(text.to_owned()))
}

/// Decodes `YYYYMMDD` dates; blank or zeroed cells are null
fn decode_date(bytes: &[u8]) -> Result<FieldValue, DbfError> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_matches([' ', '\0']);
    if text.is_empty() || text.chars().all(|c| c == '0') {
        return Ok(FieldValue::Null);
    }
    NaiveDate::parse_from_str(text, "%Y%m%d")
        .map(FieldValue::Date)
        .map_err(|_| DbfError::InvalidDate(text.to_owned()))
}

fn decode_logical(bytes: &[u8]) -> Result<FieldValue, DbfError> {
    match bytes.first().copied().unwrap_or(b' ') {
        b'T' | b't' | b'Y' | b'y' => Ok(FieldValue::Logical(true)),
        b'F' | b'f' | b'N' | b'n' => Ok(FieldValue::Logical(false)),
        b'?' | b' ' | 0 => Ok(FieldValue::Null),
        other => Err(DbfError::InvalidLogical(other as char)),
    }
}

/// Decodes a Julian day number followed by milliseconds since midnight
fn decode_datetime(bytes: &[u8]) -> Result<FieldValue, DbfError> {
    let julian = to_u32(&bytes[0..4]) as i64;
    let milliseconds = to_u32(&bytes[4..8]);
    if julian == 0 {
        return Ok(FieldValue::Null);
    }
    let date = i32::try_from(julian - JULIAN_DAY_BEFORE_CE)
        .ok()
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or_else(|| DbfError::InvalidDate(format!("julian day {julian}")))?;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(milliseconds / 1000, (milliseconds % 1000) * 1_000_000)
        .ok_or_else(|| DbfError::InvalidDate(format!("{milliseconds} ms after midnight")))?;
    Ok(FieldValue::DateTime(date.and_time(time)))
}

/// Maps the header language driver byte to the code page the table was written in
/// Not every code page has an `encoding_rs` encoding (DOS 437, 850, 852)
pub(crate) fn language_driver_code_page(language_driver: u8) -> Option<u16> {
    let code_page: u16 = match language_driver {
        0x01 | 0x09 | 0x0B | 0x0D | 0x0F | 0x11 | 0x15 | 0x18 | 0x19 | 0x1B => 437,
        0x02 | 0x0A | 0x0E | 0x10 | 0x12 | 0x14 | 0x16 | 0x1A | 0x1D | 0x25 | 0x37 => 850,
        0x03 | 0x57 | 0x58 | 0x59 => 1252,
        0x04 => 10000,
        0x13 | 0x7B => 932,
        0x1F | 0x22 | 0x23 | 0x40 | 0x64 => 852,
        0x26 | 0x65 => 866,
        0x4D | 0x7A => 936,
        0x4E | 0x79 => 949,
        0x4F | 0x78 => 950,
        0x50 | 0x7C => 874,
        0x7D => 1255,
        0x7E => 1256,
        0x96 => 10007,
        0xC8 => 1250,
        0xC9 => 1251,
        0xCA => 1254,
        0xCB => 1253,
        0xCC => 1257,
        _ => return None,
    };
    Some(code_page)
}

/// Builds DBF files for tests
#[cfg(test)]
pub(crate) struct DbfBuilder {
    fields: Vec<(String, u8, u8, u8)>,
    records: Vec<(bool, Vec<Vec<u8>>)>,
    language_driver: u8,
    declared_records: Option<u32>,
}

#[cfg(test)]
impl DbfBuilder {
    pub(crate) fn new() -> Self {
        Self {
            fields: Vec::new(),
            records: Vec::new(),
            language_driver: 0x03,
            declared_records: None,
        }
    }

    pub(crate) fn field(mut self, name: &str, code: u8, length: u8, decimals: u8) -> Self {
        self.fields.push((name.to_owned(), code, length, decimals));
        self
    }

    pub(crate) fn language_driver(mut self, language_driver: u8) -> Self {
        self.language_driver = language_driver;
        self
    }

    pub(crate) fn declared_records(mut self, count: u32) -> Self {
        self.declared_records = Some(count);
        self
    }

    /// Appends a live record; numbers are right-aligned, everything else left-aligned
    pub(crate) fn record(mut self, values: &[&str]) -> Self {
        let values = self.pad(values);
        self.records.push((false, values));
        self
    }

    /// Appends a record carrying the deletion flag
    pub(crate) fn deleted(mut self, values: &[&str]) -> Self {
        let values = self.pad(values);
        self.records.push((true, values));
        self
    }

    /// Appends a record from raw field bytes
    pub(crate) fn raw_record(mut self, values: Vec<Vec<u8>>) -> Self {
        self.records.push((false, values));
        self
    }

    fn pad(&self, values: &[&str]) -> Vec<Vec<u8>> {
        self.fields
            .iter()
            .zip(values)
            .map(|((_, code, length, _), value)| {
                let length = *length as usize;
                let value = &value.as_bytes()[..value.len().min(length)];
                if *code == b'N' || *code == b'F' {
                    let mut bytes = vec![b' '; length - value.len()];
                    bytes.extend_from_slice(value);
                    bytes
                } else {
                    let mut bytes = value.to_vec();
                    bytes.resize(length, b' ');
                    bytes
                }
            })
            .collect()
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let header_length = HEADER_SIZE + self.fields.len() * DESCRIPTOR_SIZE + 1;
        let record_length = 1 + self.fields.iter().map(|field| field.2 as usize).sum::<usize>();
        let record_count = self.declared_records.unwrap_or(self.records.len() as u32);

        let mut data = vec![0u8; HEADER_SIZE];
        data[0] = 0x03;
        data[1] = 124;
        data[2] = 1;
        data[3] = 15;
        data[4..8].copy_from_slice(&record_count.to_le_bytes());
        data[8..10].copy_from_slice(&(header_length as u16).to_le_bytes());
        data[10..12].copy_from_slice(&(record_length as u16).to_le_bytes());
        data[29] = self.language_driver;
        for (name, code, length, decimals) in &self.fields {
            let mut descriptor = vec![0u8; DESCRIPTOR_SIZE];
            descriptor[..name.len().min(11)].copy_from_slice(&name.as_bytes()[..name.len().min(11)]);
            descriptor[11] = *code;
            descriptor[16] = *length;
            descriptor[17] = *decimals;
            data.extend(descriptor);
        }
        data.push(HEADER_TERMINATOR);
        for (deleted, values) in &self.records {
            data.push(if *deleted { DELETED } else { b' ' });
            for ((_, _, length, _), value) in self.fields.iter().zip(values) {
                let mut value = value.clone();
                value.resize(*length as usize, b' ');
                data.extend(value);
            }
        }
        data.push(END_OF_FILE);
        data
    }

    pub(crate) fn write_to(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.build())
    }
}
