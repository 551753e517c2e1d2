//! Error types for ISMRMRD dataset operations
//!
//! This module defines every condition a caller can observe while opening a
//! container, encoding records, or reading the metadata document back.

use crate::io::SessionState;
use thiserror::Error;

/// ISMRMRD dataset error types
///
/// All operations in this library return `Result<T, IsmrmrdError>`. Each
/// variant is a distinct, inspectable condition; none is swallowed.
#[derive(Error, Debug)]
pub enum IsmrmrdError {
    /// Container, working group, or stored element is absent
    ///
    /// This error occurs when:
    /// - Opening a container path that does not exist
    /// - Opening a working group that was never created
    /// - Reading the metadata document before one was written
    ///
    /// # Example
    /// ```no_run
    /// # use ismrmrd_rust::error::IsmrmrdError;
    /// let err = IsmrmrdError::NotFound("dataset/xml".to_string());
    /// ```
    #[error("Not found: {0}")]
    NotFound(String),

    /// Create was called over a path that already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Binary record does not match its declared layout
    ///
    /// This error occurs when:
    /// - A header byte sequence is not exactly the width of its format version
    /// - The format version field names an unknown layout
    /// - Payload lengths disagree with the header fields that size them
    /// - Header invariants are violated (e.g. more active than available channels)
    ///
    /// # Example
    /// ```no_run
    /// # use ismrmrd_rust::error::IsmrmrdError;
    /// let err = IsmrmrdError::MalformedRecord("expected 340 bytes, got 338".to_string());
    /// ```
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// Metadata document text is not well-formed
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// Stored element is not of the expected kind
    ///
    /// This error occurs when:
    /// - The metadata path holds a record collection instead of text
    /// - A collection holds a different record kind than requested
    /// - Stored text is not valid UTF-8
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// Record index is past the end of its collection
    #[error("Index {index} out of range (count: {count})")]
    OutOfRange {
        /// Requested zero-based position
        index: u64,
        /// Number of records currently in the collection
        count: u64,
    },

    /// Operation attempted while the session is not open
    ///
    /// # Example
    /// ```no_run
    /// # use ismrmrd_rust::error::IsmrmrdError;
    /// # use ismrmrd_rust::io::SessionState;
    /// let err = IsmrmrdError::InvalidState {
    ///     operation: "count",
    ///     state: SessionState::Closed,
    /// };
    /// ```
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        /// Name of the rejected operation
        operation: &'static str,
        /// Session state at the time of the call
        state: SessionState,
    },

    /// Container file is not a readable ISMRMRD container
    ///
    /// This error occurs when:
    /// - The file signature matches no supported storage format
    /// - The container version is newer than this library understands
    /// - A frame before the tail fails its checksum
    /// - A checksummed frame holds an undecodable operation
    /// - The HDF5 library reports an error
    #[error("Invalid container: {0}")]
    InvalidContainer(String),

    /// Write attempted on a container opened read-only
    #[error("Container is read-only: {0}")]
    ReadOnly(String),

    /// Collection path names no collection
    ///
    /// Image and array paths must name a sub-path of the working group; an
    /// empty path would alias the working group's own datasets.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// I/O error from the underlying container file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for ISMRMRD operations
pub type Result<T> = std::result::Result<T, IsmrmrdError>;
