//! MARC record leader parsing and manipulation.
//!
//! The MARC leader is a 24-byte fixed-length field at the start of every MARC record.
//! It contains metadata describing the record's structure, content type, and encoding.
//!
//! # Structure
//!
//! - Positions 0-4: Record length (5 digits)
//! - Position 5: Record status
//! - Position 6: Record type (a = language material, c = music, etc.)
//! - Position 7: Bibliographic level (m = monograph, s = serial, etc.)
//! - Position 8: Control record type
//! - Position 9: Character coding (space = MARC-8, a = UTF-8)
//! - Position 10: Indicator count (usually 2)
//! - Position 11: Subfield code count (usually 2)
//! - Positions 12-16: Base address of data (5 digits)
//! - Positions 17-19: Encoding level, cataloging form, multipart level
//! - Positions 20-23: Reserved (usually "4500")
//!
//! Sierra stores positions 5-9 and 17-19 in a leader-field row; the compiler
//! overlays those onto a [`Leader::default`] and the writer fills in the
//! two numeric fields when the record is serialized.

use crate::error::{MarcError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of a serialized leader, in bytes.
pub const LEADER_LEN: usize = 24;

/// MARC Leader - 24 bytes at the start of every MARC record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leader {
    /// Record length (5 digits) - positions 0-4
    pub record_length: u32,
    /// Record status (1 char) - position 5
    pub record_status: char,
    /// Type of record (1 char) - position 6
    pub record_type: char,
    /// Bibliographic level (1 char) - position 7
    pub bibliographic_level: char,
    /// Type of control record (1 char) - position 8
    pub control_record_type: char,
    /// Character coding scheme (1 char) - position 9
    pub character_coding: char,
    /// Indicator count (1 digit) - position 10 (usually 2)
    pub indicator_count: u8,
    /// Subfield code count (1 digit) - position 11 (usually 2)
    pub subfield_code_count: u8,
    /// Base address of data (5 digits) - positions 12-16
    pub data_base_address: u32,
    /// Encoding level (1 char) - position 17
    pub encoding_level: char,
    /// Cataloging form (1 char) - position 18
    pub cataloging_form: char,
    /// Multipart resource record level (1 char) - position 19
    pub multipart_level: char,
    /// Reserved (4 chars) - positions 20-23
    pub reserved: String,
}

impl Default for Leader {
    /// A blank leader: every coded position is a space, counts are 2/2 and
    /// the entry map is `4500`. Lengths are computed on write.
    fn default() -> Self {
        Leader {
            record_length: 0,
            record_status: ' ',
            record_type: ' ',
            bibliographic_level: ' ',
            control_record_type: ' ',
            character_coding: ' ',
            indicator_count: 2,
            subfield_code_count: 2,
            data_base_address: 0,
            encoding_level: ' ',
            cataloging_form: ' ',
            multipart_level: ' ',
            reserved: "4500".to_string(),
        }
    }
}

impl Leader {
    /// Parse leader from a 24-byte slice.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are invalid or too short.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < LEADER_LEN {
            return Err(MarcError::InvalidLeader(format!(
                "Leader must be at least 24 bytes, got {}",
                bytes.len()
            )));
        }

        Ok(Leader {
            record_length: parse_digits(&bytes[0..5])?,
            record_status: bytes[5] as char,
            record_type: bytes[6] as char,
            bibliographic_level: bytes[7] as char,
            control_record_type: bytes[8] as char,
            character_coding: bytes[9] as char,
            indicator_count: parse_count(bytes[10], 10)?,
            subfield_code_count: parse_count(bytes[11], 11)?,
            data_base_address: parse_digits(&bytes[12..17])?,
            encoding_level: bytes[17] as char,
            cataloging_form: bytes[18] as char,
            multipart_level: bytes[19] as char,
            reserved: String::from_utf8_lossy(&bytes[20..24]).to_string(),
        })
    }

    /// Validate that the leader is suitable for binary record reading.
    ///
    /// Checks that `record_length` and `data_base_address` are at least 24
    /// and that the base address falls inside the record.
    ///
    /// # Errors
    ///
    /// Returns an error if either numeric field is out of range.
    pub fn validate_for_reading(&self) -> Result<()> {
        if self.record_length < 24 {
            return Err(MarcError::InvalidLeader(format!(
                "Record length must be at least 24, got {}",
                self.record_length
            )));
        }
        if self.data_base_address < 24 || self.data_base_address > self.record_length {
            return Err(MarcError::InvalidLeader(format!(
                "Base address of data out of range: {}",
                self.data_base_address
            )));
        }
        Ok(())
    }

    /// Serialize leader to a 24-byte array.
    ///
    /// # Errors
    ///
    /// Returns an error if a coded position holds a non-ASCII character, if
    /// a numeric field overflows five digits, or if the reserved field is not
    /// exactly 4 bytes.
    pub fn as_bytes(&self) -> Result<Vec<u8>> {
        if self.record_length > 99_999 || self.data_base_address > 99_999 {
            return Err(MarcError::InvalidLeader(format!(
                "Numeric leader fields must fit in 5 digits, got {} and {}",
                self.record_length, self.data_base_address
            )));
        }
        if self.indicator_count > 9 || self.subfield_code_count > 9 {
            return Err(MarcError::InvalidLeader(
                "Indicator and subfield code counts must be single digits".to_string(),
            ));
        }

        let mut bytes = Vec::with_capacity(LEADER_LEN);
        bytes.extend_from_slice(format!("{:05}", self.record_length).as_bytes());
        for (pos, c) in [
            (5, self.record_status),
            (6, self.record_type),
            (7, self.bibliographic_level),
            (8, self.control_record_type),
            (9, self.character_coding),
        ] {
            bytes.push(ascii_byte(pos, c)?);
        }
        bytes.push(b'0' + self.indicator_count);
        bytes.push(b'0' + self.subfield_code_count);
        bytes.extend_from_slice(format!("{:05}", self.data_base_address).as_bytes());
        for (pos, c) in [
            (17, self.encoding_level),
            (18, self.cataloging_form),
            (19, self.multipart_level),
        ] {
            bytes.push(ascii_byte(pos, c)?);
        }

        let reserved_bytes = self.reserved.as_bytes();
        if reserved_bytes.len() != 4 {
            return Err(MarcError::InvalidLeader(format!(
                "Reserved field must be 4 characters, got {}",
                reserved_bytes.len()
            )));
        }
        bytes.extend_from_slice(reserved_bytes);

        Ok(bytes)
    }
}

impl fmt::Display for Leader {
    /// Renders the 24-character leader. Numeric fields are zero-padded.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:05}{}{}{}{}{}{}{}{:05}{}{}{}{}",
            self.record_length,
            self.record_status,
            self.record_type,
            self.bibliographic_level,
            self.control_record_type,
            self.character_coding,
            self.indicator_count,
            self.subfield_code_count,
            self.data_base_address,
            self.encoding_level,
            self.cataloging_form,
            self.multipart_level,
            self.reserved
        )
    }
}

impl FromStr for Leader {
    type Err = MarcError;

    /// Parses a 24-character leader string. Blank numeric fields (as in
    /// `"     nam a22     8a 4500"`) read as zero.
    fn from_str(s: &str) -> Result<Self> {
        if s.len() != LEADER_LEN || !s.is_ascii() {
            return Err(MarcError::InvalidLeader(format!(
                "Leader must be 24 ASCII characters, got {s:?}"
            )));
        }
        let mut bytes = s.as_bytes().to_vec();
        for pos in (0..5).chain(12..17) {
            if bytes[pos] == b' ' {
                bytes[pos] = b'0';
            }
        }
        Leader::from_bytes(&bytes)
    }
}

fn ascii_byte(position: usize, c: char) -> Result<u8> {
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(MarcError::InvalidLeader(format!(
            "Non-ASCII value {c:?} at position {position}"
        )))
    }
}

fn parse_count(byte: u8, position: usize) -> Result<u8> {
    if byte.is_ascii_digit() {
        Ok(byte - b'0')
    } else {
        Err(MarcError::InvalidLeader(format!(
            "Invalid count at position {position}: {}",
            byte as char
        )))
    }
}

/// Parse 5-digit ASCII number from bytes
fn parse_digits(bytes: &[u8]) -> Result<u32> {
    if bytes.len() != 5 {
        return Err(MarcError::InvalidLeader(format!(
            "Expected 5-digit field, got {} bytes",
            bytes.len()
        )));
    }

    let s = String::from_utf8_lossy(bytes);
    s.parse::<u32>()
        .map_err(|_| MarcError::InvalidLeader(format!("Invalid numeric field: '{s}'")))
}
