//! Writing MARC records to binary format.
//!
//! This module provides [`MarcWriter`] for serializing [`Record`] instances
//! to ISO 2709 binary format that can be written to any destination implementing
//! [`std::io::Write`].
//!
//! Fields are written in record order; control and data fields are not
//! regrouped. A record is fully serialized and size-checked before any of its
//! bytes reach the destination, so a rejected record never leaves a partial
//! write behind.
//!
//! # Examples
//!
//! ```
//! use sierra_marc::{Field, Leader, MarcWriter, Record, Subfield};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut record = Record::new(Leader::default());
//! record.add_field(Field::data("245", ['1', '0'], vec![Subfield::new('a', "Title")])?);
//!
//! let mut buffer = Vec::new();
//! {
//!     let mut writer = MarcWriter::new(&mut buffer).with_force_utf8(true);
//!     writer.write_record(&record)?;
//! }
//! assert_eq!(buffer[9], b'a');
//! # Ok(())
//! # }
//! ```

use crate::error::{MarcError, Result};
use crate::leader::LEADER_LEN;
use crate::record::{FieldContent, Record};
use std::io::Write;

pub(crate) const FIELD_TERMINATOR: u8 = 0x1E;
pub(crate) const SUBFIELD_DELIMITER: u8 = 0x1F;
pub(crate) const RECORD_TERMINATOR: u8 = 0x1D;

/// Largest field length a 4-digit directory entry can express.
pub const MAX_FIELD_LEN: usize = 9_999;
/// Largest record length a 5-digit leader can express.
pub const MAX_RECORD_LEN: usize = 99_999;

/// Writer for ISO 2709 binary MARC format.
#[derive(Debug)]
pub struct MarcWriter<W: Write> {
    writer: W,
    records_written: usize,
    force_utf8: bool,
    finished: bool,
}

impl<W: Write> MarcWriter<W> {
    /// Create a new MARC writer.
    pub fn new(writer: W) -> Self {
        MarcWriter {
            writer,
            records_written: 0,
            force_utf8: false,
            finished: false,
        }
    }

    /// Mark every written record as Unicode (leader position 9 = `a`).
    #[must_use]
    pub fn with_force_utf8(mut self, force_utf8: bool) -> Self {
        self.force_utf8 = force_utf8;
        self
    }

    /// Write a single MARC record.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The writer was already finished
    /// - A field or the whole record exceeds the ISO 2709 length limits
    /// - The leader holds values that can't be serialized
    /// - An I/O error occurs during writing
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        if self.finished {
            return Err(MarcError::InvalidRecord(
                "Cannot write to a finished writer".to_string(),
            ));
        }
        let bytes = record_to_bytes(record, self.force_utf8)?;
        self.writer.write_all(&bytes)?;
        self.records_written += 1;
        Ok(())
    }

    /// Flush the writer and mark it as finished.
    ///
    /// After calling `finish`, no more records can be written.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing the underlying writer fails.
    pub fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.finished = true;
        Ok(())
    }

    /// Returns the number of records written so far.
    #[must_use]
    pub fn records_written(&self) -> usize {
        self.records_written
    }
}

fn field_bytes(content: &FieldContent) -> Vec<u8> {
    let mut field_data = Vec::new();
    match content {
        FieldContent::Control(data) => field_data.extend_from_slice(data.as_bytes()),
        FieldContent::Data {
            indicators,
            subfields,
        } => {
            let mut buf = [0u8; 4];
            for ind in indicators {
                field_data.extend_from_slice(ind.encode_utf8(&mut buf).as_bytes());
            }
            for subfield in subfields {
                field_data.push(SUBFIELD_DELIMITER);
                field_data.extend_from_slice(subfield.code.encode_utf8(&mut buf).as_bytes());
                field_data.extend_from_slice(subfield.value.as_bytes());
            }
        },
    }
    field_data.push(FIELD_TERMINATOR);
    field_data
}

/// Serialize one record to ISO 2709 bytes.
///
/// The leader's record length and base address are recomputed; all other
/// leader positions are taken from the record (position 9 is forced to `a`
/// when `force_utf8` is set).
///
/// # Errors
///
/// Returns an error if a field is longer than [`MAX_FIELD_LEN`], the record
/// is longer than [`MAX_RECORD_LEN`], or the leader can't be serialized.
pub fn record_to_bytes(record: &Record, force_utf8: bool) -> Result<Vec<u8>> {
    let mut data_area = Vec::new();
    let mut directory = Vec::with_capacity(record.fields.len() * 12 + 1);

    for field in &record.fields {
        let field_data = field_bytes(field.content());
        let field_length = field_data.len();
        if field_length > MAX_FIELD_LEN {
            return Err(MarcError::InvalidField(format!(
                "Field {} is {field_length} bytes; the limit is {MAX_FIELD_LEN}",
                field.tag()
            )));
        }

        directory.extend_from_slice(field.tag().as_bytes());
        directory.extend_from_slice(format!("{field_length:04}").as_bytes());
        directory.extend_from_slice(format!("{:05}", data_area.len()).as_bytes());
        data_area.extend_from_slice(&field_data);
    }
    directory.push(FIELD_TERMINATOR);

    let base_address = LEADER_LEN + directory.len();
    let record_length = base_address + data_area.len() + 1;
    if record_length > MAX_RECORD_LEN {
        return Err(MarcError::InvalidRecord(format!(
            "Record is {record_length} bytes; the limit is {MAX_RECORD_LEN}"
        )));
    }

    let mut leader = record.leader.clone();
    leader.record_length = u32::try_from(record_length)
        .map_err(|_| MarcError::InvalidRecord("Record length overflow".to_string()))?;
    leader.data_base_address = u32::try_from(base_address)
        .map_err(|_| MarcError::InvalidRecord("Base address overflow".to_string()))?;
    if force_utf8 {
        leader.character_coding = 'a';
    }

    let mut bytes = leader.as_bytes()?;
    bytes.reserve(record_length - LEADER_LEN);
    bytes.extend_from_slice(&directory);
    bytes.extend_from_slice(&data_area);
    bytes.push(RECORD_TERMINATOR);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leader::Leader;
    use crate::record::{Field, Subfield};

    fn make_test_leader() -> Leader {
        "00000nam a2200000 a 4500".parse().unwrap()
    }

    #[test]
    fn test_write_simple_record() {
        let mut record = Record::new(make_test_leader());
        record.add_field(
            Field::data("245", ['1', '0'], vec![Subfield::new('a', "Test title")]).unwrap(),
        );

        let mut buffer = Vec::new();
        let mut writer = MarcWriter::new(&mut buffer);
        writer.write_record(&record).unwrap();
        assert_eq!(writer.records_written(), 1);

        // 24 leader + 13 directory + 15 field data + 1 record terminator
        assert_eq!(&buffer[0..5], b"00053");
        assert_eq!(&buffer[12..17], b"00037");
        assert_eq!(&buffer[24..36], b"245001500000");
        assert_eq!(buffer.last(), Some(&RECORD_TERMINATOR));
    }

    #[test]
    fn test_fields_written_in_record_order() {
        let mut record = Record::new(make_test_leader());
        record.add_field(Field::data("500", [' ', ' '], vec![Subfield::new('a', "n")]).unwrap());
        record.add_field(Field::control("001", "x").unwrap());

        let bytes = record_to_bytes(&record, false).unwrap();
        assert_eq!(&bytes[24..27], b"500");
        assert_eq!(&bytes[36..39], b"001");
    }

    #[test]
    fn test_force_utf8_sets_position_9() {
        let mut leader = make_test_leader();
        leader.character_coding = ' ';
        let record = Record::new(leader);
        assert_eq!(record_to_bytes(&record, false).unwrap()[9], b' ');
        assert_eq!(record_to_bytes(&record, true).unwrap()[9], b'a');
    }

    #[test]
    fn test_oversized_field_rejected_before_write() {
        let mut record = Record::new(make_test_leader());
        record.add_field(
            Field::data("520", [' ', ' '], vec![Subfield::new('a', "x".repeat(10_000))]).unwrap(),
        );
        let mut buffer = Vec::new();
        let mut writer = MarcWriter::new(&mut buffer);
        assert!(writer.write_record(&record).is_err());
        assert_eq!(writer.records_written(), 0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_oversized_record_rejected() {
        let mut record = Record::new(make_test_leader());
        for _ in 0..12 {
            record.add_field(
                Field::data("520", [' ', ' '], vec![Subfield::new('a', "x".repeat(9_000))])
                    .unwrap(),
            );
        }
        assert!(matches!(
            record_to_bytes(&record, false),
            Err(MarcError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_finished_writer_rejects_records() {
        let mut buffer = Vec::new();
        let mut writer = MarcWriter::new(&mut buffer);
        writer.finish().unwrap();
        assert!(writer.write_record(&Record::new(make_test_leader())).is_err());
    }
}
