//! Single-file container for groups, text datasets and record datasets
//!
//! The container is an append-only log of checksummed frames behind a
//! fixed superblock. Opening a container scans the frames once and keeps an
//! in-memory index; every record is then located by its own offset and
//! length, so reading one record never touches another.
//!
//! # File Structure
//! ```text
//! Superblock (12 bytes): MAGIC "ISMRMRDC" | VERSION u16 | RESERVED u16
//! Frame:                 PAYLOAD_LEN u64 | CRC32 u32 | PAYLOAD
//! Payload:               OP_COUNT u32 | OP*
//! Op:                    TAG u8 | PATH_LEN u16 | PATH | op data
//!   CreateGroup (1):     no data
//!   PutText (2):         LEN u64 | BYTES
//!   AppendRecord (3):    KIND u8 | LEN u64 | BYTES
//! ```
//!
//! All integers are little-endian. A frame is published to the index only
//! after it has been written completely. A frame that is torn or fails its
//! checksum at the tail of the file is ignored on open and cut off before
//! the next commit; a checksum failure anywhere else rejects the file.

use crate::error::{IsmrmrdError, Result};
use crate::io::builder::DatasetOptions;
use crate::io::storage::{check_ops, check_writable, Op, Slot, Storage, StorageFormat};
use crate::record::RecordKind;
use bytes::{Buf, BufMut};
use std::collections::{BTreeSet, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

/// Superblock magic
pub const MAGIC: &[u8; 8] = b"ISMRMRDC";
/// Container layout version written by this library
pub const CONTAINER_VERSION: u16 = 1;

const SUPERBLOCK_SIZE: u64 = 12;
const FRAME_HEADER_SIZE: u64 = 12;

const TAG_CREATE_GROUP: u8 = 1;
const TAG_PUT_TEXT: u8 = 2;
const TAG_APPEND_RECORD: u8 = 3;

/// Location of one stored value inside the container file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Extent {
    offset: u64,
    len: u64,
}

#[derive(Debug)]
enum Node {
    Text(Extent),
    Records {
        kind: RecordKind,
        extents: Vec<Extent>,
    },
}

/// Index change produced by one decoded or freshly written operation
#[derive(Debug)]
enum IndexOp {
    CreateGroup(String),
    PutText(String, Extent),
    AppendRecord(String, RecordKind, Extent),
}

/// Open container file with its in-memory index
#[derive(Debug)]
pub struct ContainerFile {
    file: File,
    path: PathBuf,
    groups: BTreeSet<String>,
    datasets: HashMap<String, Node>,
    tail: u64,
    /// Bytes past `tail` that did not form a valid frame when scanned
    stale_tail: bool,
    sync_writes: bool,
    read_only: bool,
}

impl ContainerFile {
    /// Create a new, empty container
    ///
    /// Fails with `AlreadyExists` if anything exists at `path`.
    pub fn create(path: &Path, options: &DatasetOptions) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => {
                    IsmrmrdError::AlreadyExists(path.display().to_string())
                }
                _ => IsmrmrdError::Io(e),
            })?;

        let mut superblock = Vec::with_capacity(SUPERBLOCK_SIZE as usize);
        superblock.extend_from_slice(MAGIC);
        superblock.put_u16_le(CONTAINER_VERSION);
        superblock.put_u16_le(0);
        file.write_all(&superblock)?;
        file.flush()?;
        if options.sync_writes {
            file.sync_all()?;
        }

        info!(path = %path.display(), "Created container");

        Ok(ContainerFile {
            file,
            path: path.to_path_buf(),
            groups: BTreeSet::new(),
            datasets: HashMap::new(),
            tail: SUPERBLOCK_SIZE,
            stale_tail: false,
            sync_writes: options.sync_writes,
            read_only: false,
        })
    }

    /// Open an existing container and rebuild its index
    ///
    /// Fails with `NotFound` if nothing exists at `path`. A torn or
    /// checksum-failing frame at the tail is left out of the index; opening
    /// never modifies the file. With `options.read_only` the file is opened
    /// without write access and every commit fails with `ReadOnly`.
    pub fn open(path: &Path, options: &DatasetOptions) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(!options.read_only)
            .open(path)
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => IsmrmrdError::NotFound(path.display().to_string()),
                _ => IsmrmrdError::Io(e),
            })?;

        let mut container = ContainerFile {
            file,
            path: path.to_path_buf(),
            groups: BTreeSet::new(),
            datasets: HashMap::new(),
            tail: SUPERBLOCK_SIZE,
            stale_tail: false,
            sync_writes: options.sync_writes,
            read_only: options.read_only,
        };
        container.read_superblock()?;
        container.scan(options.verify_checksums)?;

        info!(
            path = %path.display(),
            groups = container.groups.len(),
            datasets = container.datasets.len(),
            size = container.tail,
            read_only = container.read_only,
            "Opened container"
        );

        Ok(container)
    }

    /// Size in bytes of the committed container
    pub fn len(&self) -> u64 {
        self.tail
    }

    /// True if nothing but the superblock has been written
    pub fn is_empty(&self) -> bool {
        self.tail == SUPERBLOCK_SIZE
    }

    /// Names of all groups, sorted
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(String::as_str)
    }

    /// Write several operations as one frame
    ///
    /// Either every operation becomes visible or none does. Operations are
    /// checked against the index before anything is written; a failed write
    /// truncates the file back to its previous tail.
    pub fn commit(&mut self, ops: &[Op<'_>]) -> Result<()> {
        check_writable(&*self)?;
        if let Some(op) = ops.iter().find(|op| op.path().len() > u16::MAX as usize) {
            return Err(IsmrmrdError::InvalidContainer(format!(
                "Dataset path of {} bytes is too long",
                op.path().len()
            )));
        }
        check_ops(&*self, ops)?;

        let start = self.tail;
        if self.stale_tail {
            warn!(
                path = %self.path.display(),
                offset = start,
                "Truncating incomplete tail before commit"
            );
            self.file.set_len(start)?;
            self.stale_tail = false;
        }
        let (frame, index_ops) = encode_frame(ops, start)?;

        if let Err(e) = self.write_frame(start, &frame) {
            warn!(
                path = %self.path.display(),
                offset = start,
                error = %e,
                "Frame write failed, truncating to previous tail"
            );
            if let Err(truncate_err) = self.file.set_len(start) {
                warn!(error = %truncate_err, "Failed to truncate container");
            }
            return Err(e);
        }

        self.tail = start + frame.len() as u64;
        for op in index_ops {
            self.apply(op)?;
        }

        debug!(
            offset = start,
            size = frame.len(),
            ops = ops.len(),
            "Committed frame"
        );
        Ok(())
    }

    /// Flush and sync the file to storage
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Sync and release the file handle
    pub fn close(mut self) -> Result<()> {
        if !self.read_only {
            self.sync()?;
        }
        debug!(path = %self.path.display(), "Closed container");
        Ok(())
    }

    fn write_frame(&mut self, start: u64, frame: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(start))?;
        self.file.write_all(frame)?;
        self.file.flush()?;
        if self.sync_writes {
            self.file.sync_data()?;
        }
        Ok(())
    }

    fn read_extent(&self, extent: Extent) -> Result<Vec<u8>> {
        let len = usize::try_from(extent.len).map_err(|_| {
            IsmrmrdError::InvalidContainer(format!("Extent of {} bytes too large", extent.len))
        })?;
        let mut buf = vec![0u8; len];
        let mut file = &self.file;
        file.seek(SeekFrom::Start(extent.offset))?;
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_superblock(&mut self) -> Result<()> {
        let mut superblock = [0u8; SUPERBLOCK_SIZE as usize];
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_exact(&mut superblock).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => {
                IsmrmrdError::InvalidContainer("File too short for superblock".to_string())
            }
            _ => IsmrmrdError::Io(e),
        })?;

        if &superblock[..8] != MAGIC {
            return Err(IsmrmrdError::InvalidContainer(format!(
                "Bad magic in {}",
                self.path.display()
            )));
        }
        let version = u16::from_le_bytes([superblock[8], superblock[9]]);
        if version > CONTAINER_VERSION {
            return Err(IsmrmrdError::InvalidContainer(format!(
                "Unsupported container version: {}",
                version
            )));
        }
        Ok(())
    }

    fn scan(&mut self, verify_checksums: bool) -> Result<()> {
        let file_len = self.file.metadata()?.len();
        let mut pos = SUPERBLOCK_SIZE;
        let mut frames = 0u64;

        while pos < file_len {
            let remaining = file_len - pos;
            if remaining < FRAME_HEADER_SIZE {
                warn!(offset = pos, "Torn frame header at container tail");
                break;
            }

            let mut header = [0u8; FRAME_HEADER_SIZE as usize];
            self.file.seek(SeekFrom::Start(pos))?;
            self.file.read_exact(&mut header)?;
            let mut buf = &header[..];
            let payload_len = buf.get_u64_le();
            let checksum = buf.get_u32_le();

            if payload_len > remaining - FRAME_HEADER_SIZE {
                warn!(
                    offset = pos,
                    payload_len = payload_len,
                    "Torn frame at container tail"
                );
                break;
            }

            let mut payload = vec![0u8; payload_len as usize];
            self.file.read_exact(&mut payload)?;

            if verify_checksums && crc32fast::hash(&payload) != checksum {
                if pos + FRAME_HEADER_SIZE + payload_len != file_len {
                    return Err(IsmrmrdError::InvalidContainer(format!(
                        "Frame at {} in {} fails its checksum",
                        pos,
                        self.path.display()
                    )));
                }
                warn!(offset = pos, "Frame checksum mismatch at container tail");
                break;
            }

            for op in decode_payload(&payload, pos + FRAME_HEADER_SIZE)? {
                self.apply(op).map_err(|e| {
                    IsmrmrdError::InvalidContainer(format!("Frame at {}: {}", pos, e))
                })?;
            }

            pos += FRAME_HEADER_SIZE + payload_len;
            frames += 1;
        }

        if pos < file_len {
            warn!(
                path = %self.path.display(),
                ignored = file_len - pos,
                "Ignoring incomplete tail"
            );
            self.stale_tail = true;
        }

        self.tail = pos;
        debug!(frames = frames, "Scanned container");
        Ok(())
    }

    fn apply(&mut self, op: IndexOp) -> Result<()> {
        match op {
            IndexOp::CreateGroup(name) => {
                self.groups.insert(name);
            }
            IndexOp::PutText(path, extent) => {
                if let Some(Node::Records { kind, .. }) = self.datasets.get(&path) {
                    return Err(IsmrmrdError::TypeMismatch(format!(
                        "{} holds {} records, not text",
                        path,
                        kind.name()
                    )));
                }
                self.datasets.insert(path, Node::Text(extent));
            }
            IndexOp::AppendRecord(path, kind, extent) => match self.datasets.get_mut(&path) {
                Some(Node::Records {
                    kind: stored,
                    extents,
                }) if *stored == kind => extents.push(extent),
                Some(_) => {
                    return Err(IsmrmrdError::TypeMismatch(format!(
                        "{} cannot hold {} records",
                        path,
                        kind.name()
                    )));
                }
                None => {
                    self.datasets.insert(
                        path,
                        Node::Records {
                            kind,
                            extents: vec![extent],
                        },
                    );
                }
            },
        }
        Ok(())
    }
}

impl Storage for ContainerFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn format(&self) -> StorageFormat {
        StorageFormat::FrameLog
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn has_group(&self, name: &str) -> bool {
        self.groups.contains(name)
    }

    fn slot(&self, path: &str) -> Option<Slot> {
        self.datasets.get(path).map(|node| match node {
            Node::Text(_) => Slot::Text,
            Node::Records { kind, .. } => Slot::Records(*kind),
        })
    }

    fn extent(&self, path: &str) -> u64 {
        match self.datasets.get(path) {
            None => 0,
            Some(Node::Text(_)) => 1,
            Some(Node::Records { extents, .. }) => extents.len() as u64,
        }
    }

    fn read_text(&self, path: &str) -> Result<Vec<u8>> {
        match self.datasets.get(path) {
            None => Err(IsmrmrdError::NotFound(path.to_string())),
            Some(Node::Text(extent)) => self.read_extent(*extent),
            Some(Node::Records { kind, .. }) => Err(IsmrmrdError::TypeMismatch(format!(
                "{} holds {} records, not text",
                path,
                kind.name()
            ))),
        }
    }

    fn read_record(&self, path: &str, kind: RecordKind, index: u64) -> Result<Vec<u8>> {
        let extents = match self.datasets.get(path) {
            None => return Err(IsmrmrdError::OutOfRange { index, count: 0 }),
            Some(Node::Text(_)) => {
                return Err(IsmrmrdError::TypeMismatch(format!(
                    "{} holds text, not {} records",
                    path,
                    kind.name()
                )))
            }
            Some(Node::Records {
                kind: stored,
                extents,
            }) => {
                if *stored != kind {
                    return Err(IsmrmrdError::TypeMismatch(format!(
                        "{} holds {} records, not {} records",
                        path,
                        stored.name(),
                        kind.name()
                    )));
                }
                extents
            }
        };

        let extent = usize::try_from(index)
            .ok()
            .and_then(|i| extents.get(i))
            .ok_or(IsmrmrdError::OutOfRange {
                index,
                count: extents.len() as u64,
            })?;

        trace!(path = path, index = index, len = extent.len, "Reading record");
        self.read_extent(*extent)
    }

    fn commit(&mut self, ops: &[Op<'_>]) -> Result<()> {
        ContainerFile::commit(self, ops)
    }

    fn close(self: Box<Self>) -> Result<()> {
        ContainerFile::close(*self)
    }
}

/// Encode operations into one frame starting at file offset `start`
fn encode_frame(ops: &[Op<'_>], start: u64) -> Result<(Vec<u8>, Vec<IndexOp>)> {
    let data_size: usize = ops
        .iter()
        .map(|op| {
            3 + op.path().len()
                + match op {
                    Op::CreateGroup(_) => 0,
                    Op::PutText { text, .. } => 8 + text.len(),
                    Op::AppendRecord { data, .. } => 9 + data.len(),
                }
        })
        .sum();

    let op_count = u32::try_from(ops.len())
        .map_err(|_| IsmrmrdError::InvalidContainer("Too many operations".to_string()))?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE as usize + 4 + data_size);
    // Header is filled in once the payload is complete
    frame.put_u64_le(0);
    frame.put_u32_le(0);
    frame.put_u32_le(op_count);

    let mut index_ops = Vec::with_capacity(ops.len());
    for op in ops {
        let path = op.path();
        match op {
            Op::CreateGroup(_) => {
                frame.put_u8(TAG_CREATE_GROUP);
                put_path(&mut frame, path);
                index_ops.push(IndexOp::CreateGroup(path.to_string()));
            }
            Op::PutText { text, .. } => {
                frame.put_u8(TAG_PUT_TEXT);
                put_path(&mut frame, path);
                frame.put_u64_le(text.len() as u64);
                let extent = Extent {
                    offset: start + frame.len() as u64,
                    len: text.len() as u64,
                };
                frame.extend_from_slice(text);
                index_ops.push(IndexOp::PutText(path.to_string(), extent));
            }
            Op::AppendRecord { kind, data, .. } => {
                frame.put_u8(TAG_APPEND_RECORD);
                put_path(&mut frame, path);
                frame.put_u8(*kind as u8);
                frame.put_u64_le(data.len() as u64);
                let extent = Extent {
                    offset: start + frame.len() as u64,
                    len: data.len() as u64,
                };
                frame.extend_from_slice(data);
                index_ops.push(IndexOp::AppendRecord(path.to_string(), *kind, extent));
            }
        }
    }

    let payload_len = (frame.len() - FRAME_HEADER_SIZE as usize) as u64;
    let checksum = crc32fast::hash(&frame[FRAME_HEADER_SIZE as usize..]);
    frame[0..8].copy_from_slice(&payload_len.to_le_bytes());
    frame[8..12].copy_from_slice(&checksum.to_le_bytes());

    Ok((frame, index_ops))
}

fn put_path(buf: &mut Vec<u8>, path: &str) {
    buf.put_u16_le(path.len() as u16);
    buf.extend_from_slice(path.as_bytes());
}

/// Decode a frame payload whose first byte sits at file offset `base`
fn decode_payload(payload: &[u8], base: u64) -> Result<Vec<IndexOp>> {
    let truncated = || IsmrmrdError::InvalidContainer(format!("Truncated frame at {}", base));

    let mut buf = payload;
    if buf.remaining() < 4 {
        return Err(truncated());
    }
    let op_count = buf.get_u32_le();
    let mut ops = Vec::new();

    for _ in 0..op_count {
        if buf.remaining() < 3 {
            return Err(truncated());
        }
        let tag = buf.get_u8();
        let path_len = buf.get_u16_le() as usize;
        if buf.remaining() < path_len {
            return Err(truncated());
        }
        let path = std::str::from_utf8(&buf[..path_len])
            .map_err(|_| IsmrmrdError::InvalidContainer("Dataset path is not UTF-8".to_string()))?
            .to_string();
        buf.advance(path_len);

        let op = match tag {
            TAG_CREATE_GROUP => IndexOp::CreateGroup(path),
            TAG_PUT_TEXT | TAG_APPEND_RECORD => {
                let kind = if tag == TAG_APPEND_RECORD {
                    if buf.remaining() < 1 {
                        return Err(truncated());
                    }
                    Some(RecordKind::from_u8(buf.get_u8())?)
                } else {
                    None
                };
                if buf.remaining() < 8 {
                    return Err(truncated());
                }
                let len = buf.get_u64_le();
                if (buf.remaining() as u64) < len {
                    return Err(truncated());
                }
                let extent = Extent {
                    offset: base + (payload.len() - buf.remaining()) as u64,
                    len,
                };
                buf.advance(len as usize);
                match kind {
                    Some(kind) => IndexOp::AppendRecord(path, kind, extent),
                    None => IndexOp::PutText(path, extent),
                }
            }
            _ => {
                return Err(IsmrmrdError::InvalidContainer(format!(
                    "Unknown operation tag: {}",
                    tag
                )))
            }
        };
        ops.push(op);
    }

    Ok(ops)
}
