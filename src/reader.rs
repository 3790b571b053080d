//! Reading MARC records from binary streams.
//!
//! This module provides [`MarcReader`] for reading ISO 2709 formatted MARC records
//! from any source that implements [`std::io::Read`]. Fields are returned in
//! directory order. The converter uses it to carry previously written records
//! forward when appending to an existing file.
//!
//! # Examples
//!
//! ```no_run
//! use sierra_marc::MarcReader;
//! use std::fs::File;
//!
//! let file = File::open("records.mrc")?;
//! let mut reader = MarcReader::new(file);
//!
//! while let Some(record) = reader.read_record()? {
//!     println!("{} fields", record.fields.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::error::{MarcError, Result};
use crate::leader::{Leader, LEADER_LEN};
use crate::record::{is_control_tag, Field, Record, Subfield};
use crate::writer::{FIELD_TERMINATOR, SUBFIELD_DELIMITER};
use std::io::Read;

/// Reader for ISO 2709 binary MARC format.
#[derive(Debug)]
pub struct MarcReader<R: Read> {
    reader: R,
    records_read: usize,
}

impl<R: Read> MarcReader<R> {
    /// Create a new MARC reader.
    pub fn new(reader: R) -> Self {
        MarcReader {
            reader,
            records_read: 0,
        }
    }

    /// Read the next record, or `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The binary data is malformed or truncated
    /// - The record structure is invalid
    /// - An I/O error occurs
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        let mut leader_bytes = [0u8; LEADER_LEN];
        match self.reader.read_exact(&mut leader_bytes) {
            Ok(()) => {},
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(MarcError::IoError(e)),
        }

        let leader = Leader::from_bytes(&leader_bytes)?;
        leader.validate_for_reading()?;

        let record_length = leader.record_length as usize;
        let base_address = leader.data_base_address as usize;

        let mut record_data = vec![0u8; record_length - LEADER_LEN];
        self.reader.read_exact(&mut record_data).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                MarcError::InvalidRecord(
                    "Unexpected end of file while reading record data".to_string(),
                )
            } else {
                MarcError::IoError(e)
            }
        })?;

        let (directory, data) = record_data.split_at(base_address - LEADER_LEN);
        let mut record = Record::new(leader);

        // Directory entries are 12 bytes: tag(3) + length(4) + start position(5)
        let mut pos = 0;
        while pos < directory.len() && directory[pos] != FIELD_TERMINATOR {
            let entry = directory
                .get(pos..pos + 12)
                .ok_or_else(|| MarcError::InvalidRecord("Incomplete directory entry".to_string()))?;
            pos += 12;

            let tag = String::from_utf8_lossy(&entry[0..3]).to_string();
            let field_length = parse_ascii_number(&entry[3..7])?;
            let start_position = parse_ascii_number(&entry[7..12])?;
            let field_data = data
                .get(start_position..start_position + field_length)
                .ok_or_else(|| {
                    MarcError::InvalidRecord(format!("Field {tag} exceeds data area"))
                })?;
            let body = field_data
                .strip_suffix(&[FIELD_TERMINATOR])
                .unwrap_or(field_data);

            let field = if is_control_tag(&tag) {
                Field::control(tag, String::from_utf8_lossy(body).to_string())?
            } else {
                parse_data_field(body, tag)?
            };
            record.add_field(field);
        }

        self.records_read += 1;
        Ok(Some(record))
    }

    /// Returns the number of records read so far.
    #[must_use]
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    /// Read every remaining record.
    ///
    /// # Errors
    ///
    /// Returns the first read error encountered.
    pub fn read_all(&mut self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(record) = self.read_record()? {
            records.push(record);
        }
        Ok(records)
    }
}

/// Parse a data field body (indicators plus subfields, no terminator).
fn parse_data_field(data: &[u8], tag: String) -> Result<Field> {
    let text = String::from_utf8_lossy(data);
    let mut chars = text.chars();
    let (Some(indicator1), Some(indicator2)) = (chars.next(), chars.next()) else {
        return Err(MarcError::InvalidField(format!(
            "Data field {tag} too short (needs indicators)"
        )));
    };

    let rest = chars.as_str();
    let delimiter = char::from(SUBFIELD_DELIMITER);
    if !rest.is_empty() && !rest.starts_with(delimiter) {
        return Err(MarcError::InvalidField(format!(
            "Field {tag}: expected subfield delimiter"
        )));
    }

    let subfields = rest.split(delimiter).skip(1).filter_map(|chunk| {
        let mut sf_chars = chunk.chars();
        sf_chars
            .next()
            .map(|code| Subfield::new(code, sf_chars.as_str()))
    });
    Field::data(tag, [indicator1, indicator2], subfields)
}

/// Parse a fixed-width ASCII number from a directory entry.
fn parse_ascii_number(bytes: &[u8]) -> Result<usize> {
    let mut result = 0usize;
    for &byte in bytes {
        if byte.is_ascii_digit() {
            result = result * 10 + (byte - b'0') as usize;
        } else {
            return Err(MarcError::InvalidRecord(format!(
                "Invalid numeric field: expected digits, got byte {}",
                byte as char
            )));
        }
    }
    Ok(result)
}
