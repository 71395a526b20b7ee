//! EnCase hash sets.
//!
//! A binary format: an 8-byte signature, a fixed-size header holding the
//! set name (UTF-16LE), then fixed-size records of a 16-byte MD5 followed by
//! two bytes of flags. Records carry no file names.

use super::{EmitFn, TextFormat, TextRecord};
use crate::detect::DbType;
use crate::error::{HashDbError, Result};
use crate::hash::HashAlgorithm;
use crate::path::display_name_from_path;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

pub const SIGNATURE: &[u8; 8] = b"HASH\r\n\xff\x00";
pub const HEADER_LEN: u64 = 1152;
pub const NAME_OFFSET: u64 = 1032;
pub const NAME_LEN: usize = 80;
pub const RECORD_LEN: usize = 18;

#[derive(Debug)]
pub struct EnCase {
    set_name: Option<String>,
}

fn read_set_name(reader: &mut BufReader<File>) -> Result<Option<String>> {
    let mut raw = [0u8; NAME_LEN];
    reader
        .seek(SeekFrom::Start(NAME_OFFSET))
        .map_err(HashDbError::io("open"))?;
    match reader.read_exact(&mut raw) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(HashDbError::io("open")(e)),
    }
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&unit| unit != 0)
        .collect();
    let name = String::from_utf16_lossy(&units).trim().to_string();
    Ok((!name.is_empty()).then_some(name))
}

impl TextFormat for EnCase {
    const DB_TYPE: DbType = DbType::EnCase;
    const INDEX_HINTS: &'static [(&'static str, HashAlgorithm)] = &[("encase", HashAlgorithm::Md5)];

    fn sniff(reader: &mut dyn BufRead) -> bool {
        let mut sig = [0u8; 8];
        reader.read_exact(&mut sig).is_ok() && sig == *SIGNATURE
    }

    fn load(reader: &mut BufReader<File>, _db_path: &Path) -> Result<Self> {
        let set_name = read_set_name(reader)?;
        reader
            .seek(SeekFrom::Start(0))
            .map_err(HashDbError::io("open"))?;
        Ok(Self { set_name })
    }

    fn display_name(&self, db_path: &Path) -> String {
        self.set_name
            .clone()
            .unwrap_or_else(|| display_name_from_path(db_path))
    }

    fn scan(
        &self,
        reader: &mut BufReader<File>,
        _algorithm: HashAlgorithm,
        emit: &mut EmitFn<'_>,
    ) -> Result<u64> {
        reader
            .seek(SeekFrom::Start(HEADER_LEN))
            .map_err(HashDbError::io("make_index"))?;
        let mut record = [0u8; RECORD_LEN];
        let mut offset = HEADER_LEN;
        loop {
            match reader.read_exact(&mut record) {
                Ok(()) => {}
                // A trailing partial record is ignored.
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(0),
                Err(e) => return Err(HashDbError::io("make_index")(e)),
            }
            emit(record[..16].to_vec(), offset)?;
            offset += RECORD_LEN as u64;
        }
    }

    fn record_at(&self, reader: &mut BufReader<File>, offset: u64) -> Result<Option<TextRecord>> {
        if offset < HEADER_LEN {
            return Ok(None);
        }
        reader
            .seek(SeekFrom::Start(offset))
            .map_err(HashDbError::io("lookup"))?;
        let mut record = [0u8; RECORD_LEN];
        match reader.read_exact(&mut record) {
            Ok(()) => Ok(Some(TextRecord {
                md5: Some(record[..16].to_vec()),
                ..TextRecord::default()
            })),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(HashDbError::io("lookup")(e)),
        }
    }
}
