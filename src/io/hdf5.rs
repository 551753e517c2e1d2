//! HDF5 container backend
//!
//! Layout inside the file:
//!
//! ```text
//! /<group>                       HDF5 group
//! /<group>/xml                   scalar variable-length UTF-8 string
//! /<group>/data                  extensible 1-D dataset, one row per record
//! /<group>/<image>/header|data|attributes
//! /<group>/<array>
//! ```
//!
//! Every record dataset holds variable-length byte rows with the encoded
//! record and carries a `record_kind` attribute naming the record kind.
//! Datasets are chunked along their single dimension so appends only
//! resize and write the new row.

use crate::error::{IsmrmrdError, Result};
use crate::io::builder::DatasetOptions;
use crate::io::storage::{check_ops, check_writable, Op, Slot, Storage, StorageFormat};
use crate::record::RecordKind;
use ::hdf5::types::{VarLenArray, VarLenUnicode};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

/// Attribute holding the `RecordKind` tag of a record dataset
const KIND_ATTR: &str = "record_kind";
/// Rows per chunk of a record dataset
const CHUNK_ROWS: usize = 16;

type Row = VarLenArray<u8>;

fn h5_error(e: ::hdf5::Error) -> IsmrmrdError {
    IsmrmrdError::InvalidContainer(e.to_string())
}

/// Undo step for one applied operation
#[derive(Debug)]
enum Undo {
    Unlink(String),
    RestoreText(String, String),
    Shrink(String, usize),
}

/// Open HDF5 container file
#[derive(Debug)]
pub struct Hdf5Container {
    file: ::hdf5::File,
    path: PathBuf,
    sync_writes: bool,
    read_only: bool,
}

impl Hdf5Container {
    /// Create a new, empty HDF5 file
    ///
    /// Fails with `AlreadyExists` if anything exists at `path`.
    pub fn create(path: &Path, options: &DatasetOptions) -> Result<Self> {
        if path.exists() {
            return Err(IsmrmrdError::AlreadyExists(path.display().to_string()));
        }
        let file = ::hdf5::File::create_excl(path).map_err(h5_error)?;

        info!(path = %path.display(), "Created HDF5 container");

        Ok(Hdf5Container {
            file,
            path: path.to_path_buf(),
            sync_writes: options.sync_writes,
            read_only: false,
        })
    }

    /// Open an existing HDF5 file, read-only if `options.read_only` is set
    pub fn open(path: &Path, options: &DatasetOptions) -> Result<Self> {
        if !path.exists() {
            return Err(IsmrmrdError::NotFound(path.display().to_string()));
        }
        let file = if options.read_only {
            ::hdf5::File::open(path)
        } else {
            ::hdf5::File::open_rw(path)
        }
        .map_err(h5_error)?;

        info!(
            path = %path.display(),
            read_only = options.read_only,
            "Opened HDF5 container"
        );

        Ok(Hdf5Container {
            file,
            path: path.to_path_buf(),
            sync_writes: options.sync_writes,
            read_only: options.read_only,
        })
    }

    /// True if every component of `path` exists as a link
    fn exists(&self, path: &str) -> bool {
        let mut prefix = String::with_capacity(path.len());
        for part in path.split('/').filter(|p| !p.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(part);
            if !self.file.link_exists(&prefix) {
                return false;
            }
        }
        !prefix.is_empty()
    }

    fn dataset(&self, path: &str) -> Result<::hdf5::Dataset> {
        self.file.dataset(path).map_err(|_| {
            IsmrmrdError::TypeMismatch(format!("{} is a group, not a dataset", path))
        })
    }

    /// Create the groups leading up to `path`
    fn ensure_parents(&self, path: &str, undo: &mut Vec<Undo>) -> Result<()> {
        let mut parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        parts.pop();

        let mut prefix = String::with_capacity(path.len());
        for part in parts {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(part);
            if !self.file.link_exists(&prefix) {
                self.file.create_group(&prefix).map_err(h5_error)?;
                undo.push(Undo::Unlink(prefix.clone()));
            } else if self.file.group(&prefix).is_err() {
                return Err(IsmrmrdError::TypeMismatch(format!(
                    "{} is a dataset, not a group",
                    prefix
                )));
            }
        }
        Ok(())
    }

    fn write_text(&self, path: &str, text: &str) -> Result<()> {
        let value: VarLenUnicode = text.parse().map_err(|e| {
            IsmrmrdError::TypeMismatch(format!("{} cannot be stored as text: {}", path, e))
        })?;
        let dataset = self
            .file
            .new_dataset::<VarLenUnicode>()
            .shape(())
            .create(path)
            .map_err(h5_error)?;
        dataset.write_scalar(&value).map_err(h5_error)
    }

    fn apply(&self, op: &Op<'_>, undo: &mut Vec<Undo>) -> Result<()> {
        match *op {
            Op::CreateGroup(name) => {
                self.ensure_parents(name, undo)?;
                self.file.create_group(name).map_err(h5_error)?;
                undo.push(Undo::Unlink(name.to_string()));
            }
            Op::PutText { path, text } => {
                let text = std::str::from_utf8(text).map_err(|e| {
                    IsmrmrdError::TypeMismatch(format!("{} text is not UTF-8: {}", path, e))
                })?;
                if self.exists(path) {
                    let previous = String::from_utf8(self.read_text(path)?).map_err(|e| {
                        IsmrmrdError::TypeMismatch(format!("{} is not UTF-8: {}", path, e))
                    })?;
                    self.file.unlink(path).map_err(h5_error)?;
                    undo.push(Undo::RestoreText(path.to_string(), previous));
                } else {
                    self.ensure_parents(path, undo)?;
                    undo.push(Undo::Unlink(path.to_string()));
                }
                self.write_text(path, text)?;
            }
            Op::AppendRecord { path, kind, data } => {
                let dataset = if self.exists(path) {
                    self.dataset(path)?
                } else {
                    self.ensure_parents(path, undo)?;
                    let dataset = self
                        .file
                        .new_dataset::<Row>()
                        .chunk(CHUNK_ROWS)
                        .shape(0..)
                        .create(path)
                        .map_err(h5_error)?;
                    undo.push(Undo::Unlink(path.to_string()));
                    dataset
                        .new_attr::<u8>()
                        .shape(1)
                        .create(KIND_ATTR)
                        .and_then(|attr| attr.write_raw(&[kind as u8][..]))
                        .map_err(h5_error)?;
                    dataset
                };

                let len = dataset.size();
                dataset.resize(len + 1).map_err(h5_error)?;
                undo.push(Undo::Shrink(path.to_string(), len));
                let row = Row::from_slice(data);
                dataset
                    .write_slice(std::slice::from_ref(&row), len..len + 1)
                    .map_err(h5_error)?;
            }
        }
        Ok(())
    }

    fn rollback(&self, undo: Vec<Undo>) {
        for step in undo.into_iter().rev() {
            let result = match &step {
                Undo::Unlink(path) => self.file.unlink(path).map_err(h5_error),
                Undo::RestoreText(path, text) => self
                    .file
                    .unlink(path)
                    .map_err(h5_error)
                    .and_then(|_| self.write_text(path, text)),
                Undo::Shrink(path, len) => self
                    .file
                    .dataset(path)
                    .and_then(|d| d.resize(*len))
                    .map_err(h5_error),
            };
            if let Err(e) = result {
                warn!(
                    path = %self.path.display(),
                    step = ?step,
                    error = %e,
                    "Rollback step failed"
                );
            }
        }
    }
}

impl Storage for Hdf5Container {
    fn path(&self) -> &Path {
        &self.path
    }

    fn format(&self) -> StorageFormat {
        StorageFormat::Hdf5
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn has_group(&self, name: &str) -> bool {
        self.exists(name) && self.file.group(name).is_ok()
    }

    fn slot(&self, path: &str) -> Option<Slot> {
        if !self.exists(path) {
            return None;
        }
        let dataset = self.file.dataset(path).ok()?;
        if !dataset.attr_names().ok()?.iter().any(|n| n == KIND_ATTR) {
            return Some(Slot::Text);
        }
        let tag = dataset
            .attr(KIND_ATTR)
            .and_then(|attr| attr.read_raw::<u8>())
            .ok()?;
        let kind = RecordKind::from_u8(*tag.first()?).ok()?;
        Some(Slot::Records(kind))
    }

    fn extent(&self, path: &str) -> u64 {
        match self.slot(path) {
            None => 0,
            Some(Slot::Text) => 1,
            Some(Slot::Records(_)) => self
                .file
                .dataset(path)
                .map(|d| d.size() as u64)
                .unwrap_or(0),
        }
    }

    fn read_text(&self, path: &str) -> Result<Vec<u8>> {
        match self.slot(path) {
            None => Err(IsmrmrdError::NotFound(path.to_string())),
            Some(Slot::Records(kind)) => Err(IsmrmrdError::TypeMismatch(format!(
                "{} holds {} records, not text",
                path,
                kind.name()
            ))),
            Some(Slot::Text) => {
                let values = self
                    .dataset(path)?
                    .read_raw::<VarLenUnicode>()
                    .map_err(|e| {
                        IsmrmrdError::TypeMismatch(format!("{} is not a string: {}", path, e))
                    })?;
                let text = values
                    .first()
                    .ok_or_else(|| IsmrmrdError::NotFound(path.to_string()))?;
                Ok(text.as_str().as_bytes().to_vec())
            }
        }
    }

    fn read_record(&self, path: &str, kind: RecordKind, index: u64) -> Result<Vec<u8>> {
        match self.slot(path) {
            None => return Err(IsmrmrdError::OutOfRange { index, count: 0 }),
            Some(Slot::Text) => {
                return Err(IsmrmrdError::TypeMismatch(format!(
                    "{} holds text, not {} records",
                    path,
                    kind.name()
                )))
            }
            Some(Slot::Records(stored)) if stored != kind => {
                return Err(IsmrmrdError::TypeMismatch(format!(
                    "{} holds {} records, not {} records",
                    path,
                    stored.name(),
                    kind.name()
                )))
            }
            Some(Slot::Records(_)) => {}
        }

        let dataset = self.dataset(path)?;
        let count = dataset.size();
        let row = usize::try_from(index)
            .ok()
            .filter(|&i| i < count)
            .ok_or(IsmrmrdError::OutOfRange {
                index,
                count: count as u64,
            })?;

        trace!(path = path, index = index, "Reading record");
        let rows = dataset
            .read_slice_1d::<Row, _>(row..row + 1)
            .map_err(h5_error)?;
        rows.iter()
            .next()
            .map(|r| r.as_slice().to_vec())
            .ok_or(IsmrmrdError::OutOfRange {
                index,
                count: count as u64,
            })
    }

    fn commit(&mut self, ops: &[Op<'_>]) -> Result<()> {
        check_writable(&*self)?;
        check_ops(&*self, ops)?;

        let mut undo = Vec::new();
        for op in ops {
            if let Err(e) = self.apply(op, &mut undo) {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "HDF5 commit failed, rolling back"
                );
                self.rollback(undo);
                return Err(e);
            }
        }

        if self.sync_writes {
            self.file.flush().map_err(h5_error)?;
        }
        debug!(ops = ops.len(), "Committed to HDF5 container");
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        if !self.read_only {
            self.file.flush().map_err(h5_error)?;
        }
        debug!(path = %self.path.display(), "Closed HDF5 container");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scratch() -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.h5");
        (dir, path)
    }

    #[test]
    fn test_create_and_reopen() {
        let (_dir, path) = scratch();
        {
            let mut container = Hdf5Container::create(&path, &DatasetOptions::default()).unwrap();
            container.create_group("dataset").unwrap();
            container.put_text("dataset/xml", b"  <doc/> ").unwrap();
            container
                .append_record("dataset/data", RecordKind::Acquisition, b"first")
                .unwrap();
            let count = container
                .append_record("dataset/data", RecordKind::Acquisition, b"second")
                .unwrap();
            assert_eq!(count, 2);
            Box::new(container).close().unwrap();
        }

        let mut signature = [0u8; 8];
        signature.copy_from_slice(&std::fs::read(&path).unwrap()[..8]);
        assert_eq!(&signature, crate::io::storage::HDF5_SIGNATURE);

        let container = Hdf5Container::open(&path, &DatasetOptions::default()).unwrap();
        assert!(container.has_group("dataset"));
        assert!(!container.has_group("dataset/data"));
        assert_eq!(container.read_text("dataset/xml").unwrap(), b"  <doc/> ");
        assert_eq!(container.extent("dataset/data"), 2);
        assert_eq!(
            container
                .read_record("dataset/data", RecordKind::Acquisition, 1)
                .unwrap(),
            b"second"
        );
        assert!(matches!(
            container.read_record("dataset/data", RecordKind::Acquisition, 2),
            Err(IsmrmrdError::OutOfRange { index: 2, count: 2 })
        ));
    }

    #[test]
    fn test_nested_collections_and_kinds() {
        let (_dir, path) = scratch();
        let mut container = Hdf5Container::create(&path, &DatasetOptions::default()).unwrap();
        container
            .commit(&[
                Op::AppendRecord {
                    path: "g/images/header",
                    kind: RecordKind::ImageHeader,
                    data: b"h",
                },
                Op::AppendRecord {
                    path: "g/images/data",
                    kind: RecordKind::ImageData,
                    data: b"d",
                },
            ])
            .unwrap();

        assert_eq!(
            container.slot("g/images/header"),
            Some(Slot::Records(RecordKind::ImageHeader))
        );
        assert_eq!(container.extent("g/images/data"), 1);
        assert!(matches!(
            container.append_record("g/images/data", RecordKind::Array, b"x"),
            Err(IsmrmrdError::TypeMismatch(_))
        ));
        assert!(matches!(
            container.read_text("g/images/data"),
            Err(IsmrmrdError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_text_overwrite() {
        let (_dir, path) = scratch();
        let mut container = Hdf5Container::create(&path, &DatasetOptions::default()).unwrap();
        container.put_text("g/xml", b"one").unwrap();
        container.put_text("g/xml", b"two").unwrap();
        assert_eq!(container.read_text("g/xml").unwrap(), b"two");
        assert_eq!(container.extent("g/xml"), 1);
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let (_dir, path) = scratch();
        {
            let mut container = Hdf5Container::create(&path, &DatasetOptions::default()).unwrap();
            container.create_group("dataset").unwrap();
        }

        let options = DatasetOptions {
            read_only: true,
            ..DatasetOptions::default()
        };
        let mut container = Hdf5Container::open(&path, &options).unwrap();
        assert!(container.has_group("dataset"));
        assert!(matches!(
            container.put_text("dataset/xml", b"x"),
            Err(IsmrmrdError::ReadOnly(_))
        ));
    }
}
