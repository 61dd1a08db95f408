//! Memo files (.fpt / .dbt)
//! Memo columns store only a block number in the table record; the text lives in a
//! block-addressed file next to the table with the same stem

use crate::error::LegacyError;
use crate::helpers::dbf::DbfError;
use crate::helpers::string::to_u16;
use crate::helpers::string::to_u16_be;
use crate::helpers::string::to_u32;
use crate::helpers::string::to_u32_be;
use encoding_rs::Encoding;
use std::fs::File;
use std::io::BufReader;
use std::io::ErrorKind;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;
use std::path::PathBuf;

const MEMO_HEADER_SIZE: usize = 512;
const DBASE_BLOCK_SIZE: u64 = 512;
const DBASE4_MARKER: [u8; 4] = [0xFF, 0xFF, 0x08, 0x00];
const BLOCK_HEADER_SIZE: usize = 8;
const FOXPRO_TEXT: u32 = 1;
const MEMO_TERMINATOR: u8 = 0x1A;
const MAX_MEMO_LENGTH: u32 = 16 * 1024 * 1024;

/// Block layout of a memo file, chosen by its extension
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum MemoFormat {
    /// `.fpt`: big-endian block size in the header, typed and sized blocks
    FoxPro,
    /// `.dbt`: dBase III text runs ended by 0x1A, or dBase IV sized blocks
    DBase,
}

impl MemoFormat {
    fn extensions(&self) -> [&'static str; 2] {
        match self {
            Self::FoxPro => ["fpt", "FPT"],
            Self::DBase => ["dbt", "DBT"],
        }
    }
}

/// Reader for memo blocks
pub(crate) struct MemoReader<R: Read + Seek> {
    reader: R,
    pub(crate) format: MemoFormat,
    pub(crate) block_size: u64,
}

impl MemoReader<BufReader<File>> {
    /// Opens the memo file stored beside `table`, if there is one
    pub(crate) fn open_beside(table: &Path) -> Result<Option<(PathBuf, Self)>, LegacyError> {
        for format in [MemoFormat::FoxPro, MemoFormat::DBase] {
            for extension in format.extensions() {
                let path = table.with_extension(extension);
                if path.is_file() {
                    let file = File::open(&path)?;
                    let memo = Self::new(BufReader::new(file), format)?;
                    return Ok(Some((path, memo)));
                }
            }
        }
        Ok(None)
    }
}

impl<R: Read + Seek> MemoReader<R> {
    /// Reads the 512-byte file header to learn the block size
    pub(crate) fn new(mut reader: R, format: MemoFormat) -> Result<Self, LegacyError> {
        let mut header = [0u8; MEMO_HEADER_SIZE];
        reader.seek(SeekFrom::Start(0))?;
        reader.read_exact(&mut header).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => LegacyError::from(DbfError::HeaderTruncated(MEMO_HEADER_SIZE)),
            _ => LegacyError::from(e),
        })?;
        let block_size = match format {
            MemoFormat::FoxPro => match to_u16_be(&header[6..8]) {
                0 => Err(DbfError::InvalidMemoBlockSize(0))?,
                size => size as u64,
            },
            MemoFormat::DBase => match to_u16(&header[20..22]) {
                0 => DBASE_BLOCK_SIZE,
                size => size as u64,
            },
        };
        Ok(MemoReader {
            reader,
            format,
            block_size,
        })
    }

    /// Reads the memo starting at `block` as text
    /// Returns None for binary blocks (pictures, OLE objects)
    pub(crate) fn read(&mut self, block: u32, encoding: &'static Encoding) -> Result<Option<String>, DbfError> {
        let bytes = match self.format {
            MemoFormat::FoxPro => self.read_foxpro(block)?,
            MemoFormat::DBase => Some(self.read_dbase(block)?),
        };
        Ok(bytes.map(|bytes| {
            let (text, _, _) = encoding.decode(&bytes);
            text.trim_end_matches([' ', '\0', '\u{1A}']).to_owned()
        }))
    }

    fn seek_block(&mut self, block: u32) -> Result<(), DbfError> {
        self.reader
            .seek(SeekFrom::Start(block as u64 * self.block_size))
            .map_err(|source| DbfError::MemoBlock { block, source })?;
        Ok(())
    }

    fn read_foxpro(&mut self, block: u32) -> Result<Option<Vec<u8>>, DbfError> {
        let io = |source| DbfError::MemoBlock { block, source };
        self.seek_block(block)?;
        let mut head = [0u8; BLOCK_HEADER_SIZE];
        self.reader.read_exact(&mut head).map_err(io)?;
        let kind = to_u32_be(&head[0..4]);
        let length = to_u32_be(&head[4..8]);
        if kind != FOXPRO_TEXT {
            return Ok(None);
        }
        if length > MAX_MEMO_LENGTH {
            Err(DbfError::MemoTooLarge(length))?
        }
        let mut data = vec![0u8; length as usize];
        self.reader.read_exact(&mut data).map_err(io)?;
        Ok(Some(data))
    }

    fn read_dbase(&mut self, block: u32) -> Result<Vec<u8>, DbfError> {
        let io = |source| DbfError::MemoBlock { block, source };
        self.seek_block(block)?;
        let mut data = Vec::new();
        (&mut self.reader)
            .take(BLOCK_HEADER_SIZE as u64)
            .read_to_end(&mut data)
            .map_err(io)?;

        // dBase IV: marker, then the length including the block header
        if data.len() == BLOCK_HEADER_SIZE && data[..4] == DBASE4_MARKER {
            let length = to_u32(&data[4..8]).saturating_sub(BLOCK_HEADER_SIZE as u32);
            if length > MAX_MEMO_LENGTH {
                Err(DbfError::MemoTooLarge(length))?
            }
            let mut data = vec![0u8; length as usize];
            self.reader.read_exact(&mut data).map_err(io)?;
            return Ok(data);
        }

        // dBase III: text runs across blocks until the terminator
        loop {
            if let Some(end) = data.iter().position(|byte| *byte == MEMO_TERMINATOR) {
                data.truncate(end);
                return Ok(data);
            }
            if data.len() as u64 > MAX_MEMO_LENGTH as u64 {
                Err(DbfError::MemoTooLarge(data.len() as u32))?
            }
            let read = (&mut self.reader)
                .take(self.block_size)
                .read_to_end(&mut data)
                .map_err(io)?;
            if read == 0 {
                return Ok(data);
            }
        }
    }
}

/// Memo file layouts produced by [`build_memo_file`]
#[cfg(test)]
#[derive(Copy, Clone, Debug)]
pub(crate) enum MemoLayout {
    FoxPro { block_size: u16 },
    DBase3,
    DBase4,
}

/// Builds a memo file holding `memos` as text; returns the file and each memo's block number
#[cfg(test)]
pub(crate) fn build_memo_file(layout: MemoLayout, memos: &[&[u8]]) -> (Vec<u8>, Vec<u32>) {
    let block_size = match layout {
        MemoLayout::FoxPro { block_size } => block_size as usize,
        MemoLayout::DBase3 | MemoLayout::DBase4 => DBASE_BLOCK_SIZE as usize,
    };
    let mut data = vec![0u8; MEMO_HEADER_SIZE];
    match layout {
        MemoLayout::FoxPro { block_size } => data[6..8].copy_from_slice(&block_size.to_be_bytes()),
        MemoLayout::DBase4 => data[20..22].copy_from_slice(&(block_size as u16).to_le_bytes()),
        MemoLayout::DBase3 => (),
    }
    data.resize(MEMO_HEADER_SIZE.div_ceil(block_size) * block_size, 0);

    let mut blocks = Vec::new();
    for memo in memos {
        blocks.push((data.len() / block_size) as u32);
        match layout {
            MemoLayout::FoxPro { .. } => {
                data.extend(FOXPRO_TEXT.to_be_bytes());
                data.extend((memo.len() as u32).to_be_bytes());
                data.extend_from_slice(memo);
            }
            MemoLayout::DBase3 => {
                data.extend_from_slice(memo);
                data.extend([MEMO_TERMINATOR, MEMO_TERMINATOR]);
            }
            MemoLayout::DBase4 => {
                data.extend(DBASE4_MARKER);
                data.extend((memo.len() as u32 + BLOCK_HEADER_SIZE as u32).to_le_bytes());
                data.extend_from_slice(memo);
            }
        }
        data.resize(data.len().div_ceil(block_size) * block_size, 0);
    }
    let next_block = (data.len() / block_size) as u32;
    match layout {
        MemoLayout::FoxPro { .. } => data[0..4].copy_from_slice(&next_block.to_be_bytes()),
        MemoLayout::DBase3 | MemoLayout::DBase4 => data[0..4].copy_from_slice(&next_block.to_le_bytes()),
    }
    (data, blocks)
}
