//! Storage backends for dataset sessions
//!
//! A [`Dataset`](crate::io::Dataset) reads and appends through the
//! [`Storage`] trait and never sees how values are laid out on disk. Two
//! backends exist:
//!
//! - [`StorageFormat::Hdf5`] stores groups as HDF5 groups, every record
//!   collection as an extensible one-dimensional dataset and the metadata
//!   document as a string dataset. Requires the `hdf5` feature.
//! - [`StorageFormat::FrameLog`] is the checksummed single-file log of
//!   [`ContainerFile`], with no native dependencies.
//!
//! Opening detects the format from the file signature.

use crate::error::{IsmrmrdError, Result};
use crate::io::builder::DatasetOptions;
use crate::io::container::{self, ContainerFile};
use crate::record::RecordKind;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use tracing::debug;

/// Signature at the start of every HDF5 file
pub const HDF5_SIGNATURE: &[u8; 8] = b"\x89HDF\r\n\x1a\n";

/// On-disk layout of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageFormat {
    /// HDF5 file with groups and extensible datasets
    Hdf5,
    /// Checksummed append-only frame log
    FrameLog,
}

impl Default for StorageFormat {
    #[cfg(feature = "hdf5")]
    fn default() -> Self {
        StorageFormat::Hdf5
    }

    #[cfg(not(feature = "hdf5"))]
    fn default() -> Self {
        StorageFormat::FrameLog
    }
}

impl fmt::Display for StorageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageFormat::Hdf5 => write!(f, "HDF5"),
            StorageFormat::FrameLog => write!(f, "frame log"),
        }
    }
}

impl StorageFormat {
    /// Identify the format of the file at `path` from its first bytes
    ///
    /// Fails with `NotFound` if nothing exists at `path` and with
    /// `InvalidContainer` if the signature is neither format's.
    pub fn detect(path: &Path) -> Result<Self> {
        let mut file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => IsmrmrdError::NotFound(path.display().to_string()),
            _ => IsmrmrdError::Io(e),
        })?;

        let mut signature = [0u8; 8];
        let mut filled = 0;
        while filled < signature.len() {
            match file.read(&mut signature[filled..])? {
                0 => break,
                n => filled += n,
            }
        }

        if &signature == HDF5_SIGNATURE {
            Ok(StorageFormat::Hdf5)
        } else if &signature == container::MAGIC {
            Ok(StorageFormat::FrameLog)
        } else {
            Err(IsmrmrdError::InvalidContainer(format!(
                "Unrecognized signature in {}",
                path.display()
            )))
        }
    }
}

/// Kind of value stored at a dataset path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Text,
    Records(RecordKind),
}

/// One operation of an atomic commit
#[derive(Debug, Clone, Copy)]
pub enum Op<'a> {
    CreateGroup(&'a str),
    PutText {
        path: &'a str,
        text: &'a [u8],
    },
    AppendRecord {
        path: &'a str,
        kind: RecordKind,
        data: &'a [u8],
    },
}

impl Op<'_> {
    pub(crate) fn path(&self) -> &str {
        match self {
            Op::CreateGroup(path) => path,
            Op::PutText { path, .. } => path,
            Op::AppendRecord { path, .. } => path,
        }
    }
}

/// Container backend behind a dataset session
///
/// Paths are `/`-separated and relative to the container root. A record
/// collection is created by its first append and holds one record kind.
pub trait Storage: fmt::Debug {
    /// Path of the container file
    fn path(&self) -> &Path;

    fn format(&self) -> StorageFormat;

    /// True if the container was opened without write access
    fn is_read_only(&self) -> bool;

    fn has_group(&self, name: &str) -> bool;

    /// Kind of value stored at `path`, if any
    fn slot(&self, path: &str) -> Option<Slot>;

    /// Declared extent of a dataset
    ///
    /// Zero for an absent dataset, one for a text dataset, and the number of
    /// records for a record dataset.
    fn extent(&self, path: &str) -> u64;

    /// Read the text stored at `path`
    fn read_text(&self, path: &str) -> Result<Vec<u8>>;

    /// Read the record at `index` of the dataset at `path`
    fn read_record(&self, path: &str, kind: RecordKind, index: u64) -> Result<Vec<u8>>;

    /// Apply several operations so that either all or none become visible
    fn commit(&mut self, ops: &[Op<'_>]) -> Result<()>;

    /// Flush and release the container
    fn close(self: Box<Self>) -> Result<()>;

    fn create_group(&mut self, name: &str) -> Result<()> {
        self.commit(&[Op::CreateGroup(name)])
    }

    /// Store `text` at `path`, replacing any previous text
    fn put_text(&mut self, path: &str, text: &[u8]) -> Result<()> {
        self.commit(&[Op::PutText { path, text }])
    }

    /// Append one record and return the new extent of its dataset
    fn append_record(&mut self, path: &str, kind: RecordKind, data: &[u8]) -> Result<u64> {
        self.commit(&[Op::AppendRecord { path, kind, data }])?;
        Ok(self.extent(path))
    }
}

/// Reject operations on a read-only container
pub(crate) fn check_writable(storage: &dyn Storage) -> Result<()> {
    if storage.is_read_only() {
        return Err(IsmrmrdError::ReadOnly(storage.path().display().to_string()));
    }
    Ok(())
}

/// Check a batch against the stored layout and against itself
///
/// Nothing is written; a batch that passes can only fail on I/O.
pub(crate) fn check_ops(storage: &dyn Storage, ops: &[Op<'_>]) -> Result<()> {
    let mut staged: HashMap<&str, Slot> = HashMap::new();

    for op in ops {
        if op.path().is_empty() {
            return Err(IsmrmrdError::InvalidContainer(
                "Empty dataset path".to_string(),
            ));
        }

        match *op {
            Op::CreateGroup(name) => {
                if storage.has_group(name) {
                    return Err(IsmrmrdError::AlreadyExists(name.to_string()));
                }
            }
            Op::PutText { path, .. } => {
                let existing = staged.get(path).copied().or_else(|| storage.slot(path));
                if let Some(Slot::Records(kind)) = existing {
                    return Err(IsmrmrdError::TypeMismatch(format!(
                        "{} holds {} records, not text",
                        path,
                        kind.name()
                    )));
                }
                staged.insert(path, Slot::Text);
            }
            Op::AppendRecord { path, kind, .. } => {
                let existing = staged.get(path).copied().or_else(|| storage.slot(path));
                match existing {
                    Some(Slot::Text) => {
                        return Err(IsmrmrdError::TypeMismatch(format!(
                            "{} holds text, not {} records",
                            path,
                            kind.name()
                        )));
                    }
                    Some(Slot::Records(stored)) if stored != kind => {
                        return Err(IsmrmrdError::TypeMismatch(format!(
                            "{} holds {} records, not {} records",
                            path,
                            stored.name(),
                            kind.name()
                        )));
                    }
                    _ => {}
                }
                staged.insert(path, Slot::Records(kind));
            }
        }
    }
    Ok(())
}

/// Create a new container in the configured format
pub fn create(path: &Path, options: &DatasetOptions) -> Result<Box<dyn Storage>> {
    debug!(path = %path.display(), format = %options.format, "Creating storage");
    match options.format {
        StorageFormat::FrameLog => Ok(Box::new(ContainerFile::create(path, options)?)),
        StorageFormat::Hdf5 => create_hdf5(path, options),
    }
}

/// Open an existing container in whichever format it was written
pub fn open(path: &Path, options: &DatasetOptions) -> Result<Box<dyn Storage>> {
    let format = StorageFormat::detect(path)?;
    debug!(path = %path.display(), format = %format, "Opening storage");
    match format {
        StorageFormat::FrameLog => Ok(Box::new(ContainerFile::open(path, options)?)),
        StorageFormat::Hdf5 => open_hdf5(path, options),
    }
}

#[cfg(feature = "hdf5")]
fn create_hdf5(path: &Path, options: &DatasetOptions) -> Result<Box<dyn Storage>> {
    Ok(Box::new(crate::io::hdf5::Hdf5Container::create(
        path, options,
    )?))
}

#[cfg(feature = "hdf5")]
fn open_hdf5(path: &Path, options: &DatasetOptions) -> Result<Box<dyn Storage>> {
    Ok(Box::new(crate::io::hdf5::Hdf5Container::open(
        path, options,
    )?))
}

#[cfg(not(feature = "hdf5"))]
fn create_hdf5(path: &Path, _options: &DatasetOptions) -> Result<Box<dyn Storage>> {
    Err(hdf5_disabled(path))
}

#[cfg(not(feature = "hdf5"))]
fn open_hdf5(path: &Path, _options: &DatasetOptions) -> Result<Box<dyn Storage>> {
    Err(hdf5_disabled(path))
}

#[cfg(not(feature = "hdf5"))]
fn hdf5_disabled(path: &Path) -> IsmrmrdError {
    IsmrmrdError::InvalidContainer(format!(
        "{}: HDF5 containers need the `hdf5` feature",
        path.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format() {
        let dir = tempfile::tempdir().unwrap();

        let log = dir.path().join("log.h5c");
        ContainerFile::create(&log, &DatasetOptions::default()).unwrap();
        assert_eq!(StorageFormat::detect(&log).unwrap(), StorageFormat::FrameLog);

        let hdf = dir.path().join("file.h5");
        std::fs::write(&hdf, HDF5_SIGNATURE).unwrap();
        assert_eq!(StorageFormat::detect(&hdf).unwrap(), StorageFormat::Hdf5);

        let short = dir.path().join("short");
        std::fs::write(&short, b"\x89HD").unwrap();
        assert!(matches!(
            StorageFormat::detect(&short),
            Err(IsmrmrdError::InvalidContainer(_))
        ));

        assert!(matches!(
            StorageFormat::detect(&dir.path().join("missing")),
            Err(IsmrmrdError::NotFound(_))
        ));
    }

    #[cfg(not(feature = "hdf5"))]
    #[test]
    fn test_hdf5_needs_feature() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.h5");
        let options = DatasetOptions {
            format: StorageFormat::Hdf5,
            ..DatasetOptions::default()
        };

        assert!(matches!(
            create(&path, &options),
            Err(IsmrmrdError::InvalidContainer(_))
        ));
        assert!(!path.exists());

        std::fs::write(&path, HDF5_SIGNATURE).unwrap();
        assert!(matches!(
            open(&path, &options),
            Err(IsmrmrdError::InvalidContainer(_))
        ));
    }
}
