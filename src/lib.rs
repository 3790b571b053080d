#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! ## Modules
//!
//! - [`record`] - MARC fields and records (`Record`, `Field`, `Subfield`)
//! - [`leader`] - MARC record leader (24-byte header)
//! - [`reader`] / [`writer`] - ISO 2709 binary input and output
//! - [`field_string`] - Human-authored field strings (`100 1#$aSmith, J.`)
//! - [`sierra`] - Sierra source rows, record sources and JSON fixtures
//! - [`converter`] - Compiling Sierra records to MARC
//! - [`text`] - Catalog text normalization (`clean`, years, punctuation)
//! - [`call_number`] - Call number sort keys and search shingles
//! - [`names`] - Personal, organization and event name parsing
//! - [`ruleset`] - Rule-based lookups for local business rules
//! - [`export`] - Chunked, batched export jobs
//! - [`config`] - TOML settings for conversion and export
//! - [`error`] - Error types and result aliases

pub mod call_number;
pub mod config;
pub mod converter;
pub mod error;
pub mod export;
pub mod field_string;
pub mod leader;
pub mod marcdata;
pub mod names;
pub mod reader;
/// Core MARC record structures (`Record`, `Field`, `Subfield`)
pub mod record;
pub mod ruleset;
pub mod sierra;
pub mod text;
pub mod writer;

pub use call_number::CallNumberKind;
pub use config::ExportSettings;
pub use converter::SierraToMarcConverter;
pub use error::{CompileError, ExportError, ExportResult, MarcError, Result, SourceError};
pub use field_string::parse_from_string;
pub use leader::Leader;
pub use reader::MarcReader;
pub use record::{Field, Record, Subfield};
pub use writer::MarcWriter;
