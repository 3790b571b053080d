//! Error types for MARC compilation and export operations.
//!
//! This module provides [`MarcError`] for the record model and binary
//! layout, [`CompileError`] for per-record compilation failures,
//! [`SourceError`] for the relational data source, and [`ExportError`] for
//! the export job planner. Each family has its own `Result` alias.

use thiserror::Error;

/// Error type for MARC record, field, and leader operations.
///
/// Represents the conditions that can occur while building, parsing,
/// reading or writing MARC records.
#[derive(Error, Debug)]
pub enum MarcError {
    /// Error indicating an invalid or malformed MARC record.
    #[error("Invalid MARC record: {0}")]
    InvalidRecord(String),

    /// Error indicating an invalid leader (24-byte header).
    #[error("Invalid leader: {0}")]
    InvalidLeader(String),

    /// Error indicating an invalid field structure.
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// Error during parsing of human-authored field strings.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// IO error from the underlying source/destination.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Convenience type alias for [`std::result::Result`] with [`MarcError`].
pub type Result<T> = std::result::Result<T, MarcError>;

/// Error raised by a relational record source when rows can't be retrieved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct SourceError(pub String);

/// A record-level compilation failure.
///
/// Ties a message to the identifier of the source record that could not be
/// compiled or written. Collected by the converter rather than raised.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Record {record_id}: {message}")]
pub struct CompileError {
    /// Identifier of the source record (its record number when known).
    pub record_id: String,
    /// Human-readable description of what went wrong.
    pub message: String,
}

impl CompileError {
    /// Create a new compile error for the given record.
    pub fn new(record_id: impl Into<String>, message: impl Into<String>) -> Self {
        CompileError {
            record_id: record_id.into(),
            message: message.into(),
        }
    }
}

/// Error type for export job planning and execution.
#[derive(Error, Debug)]
pub enum ExportError {
    /// A plan was generated while the job's registry still held entries.
    #[error("Job plan already registered for instance {0}")]
    AlreadyRegistered(String),

    /// A chunk id string could not be parsed.
    #[error("Invalid chunk id: {0}")]
    InvalidChunkId(String),

    /// A chunk id was not found in the registry.
    #[error("Unknown chunk: {0}")]
    UnknownChunk(String),

    /// The record source failed.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// The document store rejected an operation.
    #[error("Store error: {0}")]
    Store(String),

    /// MARC-level failure while exporting.
    #[error("MARC error: {0}")]
    Marc(#[from] MarcError),

    /// A record could not be compiled.
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    /// A chunk task failed or panicked.
    #[error("Task failed: {0}")]
    Task(String),

    /// Invalid job configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience type alias for export operations.
pub type ExportResult<T> = std::result::Result<T, ExportError>;
