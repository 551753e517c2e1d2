//! Dataset session
//!
//! A [`Dataset`] owns one open container and one working group inside it.
//! The container is reached through the [`Storage`] trait, so a session
//! behaves the same over every storage format. Every collection path is
//! resolved relative to the working group:
//!
//! | Collection | Stored at |
//! |---|---|
//! | Metadata document | `<group>/xml` |
//! | Acquisitions | `<group>/data` |
//! | Images | `<group>/<path>/header`, `/data`, `/attributes` |
//! | Arrays | `<group>/<path>` |
//!
//! # Examples
//!
//! ```no_run
//! use ismrmrd_rust::io::Dataset;
//! use ismrmrd_rust::record::{Acquisition, AcquisitionHeader};
//!
//! let mut dataset = Dataset::create("scan.h5c", "dataset")?;
//!
//! let head = AcquisitionHeader {
//!     number_of_samples: 256,
//!     available_channels: 4,
//!     active_channels: 4,
//!     ..Default::default()
//! };
//! dataset.append_acquisition(&Acquisition::zeroed(head))?;
//! assert_eq!(dataset.number_of_acquisitions()?, 1);
//!
//! dataset.close()?;
//! # Ok::<(), ismrmrd_rust::IsmrmrdError>(())
//! ```

use crate::error::{IsmrmrdError, Result};
use crate::io::builder::DatasetOptions;
use crate::io::storage::{self, Op, Storage};
use crate::record::{Acquisition, Image, NdArray, Record, RecordKind};
use crate::xml::{self, IsmrmrdHeader};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, trace, warn};

const XML_PATH: &str = "xml";
const ACQUISITION_PATH: &str = "data";
const IMAGE_HEADER: &str = "header";
const IMAGE_DATA: &str = "data";
const IMAGE_ATTRIBUTES: &str = "attributes";

/// Lifecycle state of a dataset session
///
/// `Closed` is terminal; a closed session cannot be reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Open => write!(f, "open"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// Handle on the working group
#[derive(Debug)]
struct GroupHandle {
    name: String,
}

impl GroupHandle {
    fn join(&self, path: &str) -> String {
        format!("{}/{}", self.name, path.trim_matches('/'))
    }
}

/// Open session on one working group of a container
#[derive(Debug)]
pub struct Dataset {
    container: Option<Box<dyn Storage>>,
    group: Option<GroupHandle>,
    state: SessionState,
}

fn normalize_group(name: &str) -> Result<String> {
    let name = name.trim_matches('/');
    if name.is_empty() {
        return Err(IsmrmrdError::NotFound(
            "Working group name is empty".to_string(),
        ));
    }
    Ok(name.to_string())
}

impl Dataset {
    /// Create a new container at `path` with working group `group`
    ///
    /// Shorthand for `DatasetBuilder::new(path).group(group).create()`.
    pub fn create(path: impl AsRef<Path>, group: &str) -> Result<Self> {
        Self::create_with(
            path.as_ref(),
            DatasetOptions {
                group: group.to_string(),
                ..DatasetOptions::default()
            },
        )
    }

    /// Open working group `group` of the existing container at `path`
    ///
    /// Shorthand for `DatasetBuilder::new(path).group(group).open()`.
    pub fn open(path: impl AsRef<Path>, group: &str) -> Result<Self> {
        Self::open_with(
            path.as_ref(),
            DatasetOptions {
                group: group.to_string(),
                ..DatasetOptions::default()
            },
        )
    }

    pub(crate) fn create_with(path: &Path, options: DatasetOptions) -> Result<Self> {
        let group = normalize_group(&options.group)?;
        let mut container = storage::create(path, &options)?;
        if let Err(e) = container.create_group(&group) {
            drop(container);
            if let Err(remove_err) = std::fs::remove_file(path) {
                warn!(
                    path = %path.display(),
                    error = %remove_err,
                    "Failed to remove container after failed create"
                );
            }
            return Err(e);
        }

        info!(
            path = %path.display(),
            group = %group,
            format = %options.format,
            "Dataset created"
        );

        Ok(Dataset {
            container: Some(container),
            group: Some(GroupHandle { name: group }),
            state: SessionState::Open,
        })
    }

    pub(crate) fn open_with(path: &Path, options: DatasetOptions) -> Result<Self> {
        let group = normalize_group(&options.group)?;
        let container = storage::open(path, &options)?;
        if !container.has_group(&group) {
            return Err(IsmrmrdError::NotFound(format!(
                "Group {} in {}",
                group,
                path.display()
            )));
        }

        info!(
            path = %path.display(),
            group = %group,
            format = %container.format(),
            read_only = container.is_read_only(),
            "Dataset opened"
        );

        Ok(Dataset {
            container: Some(container),
            group: Some(GroupHandle { name: group }),
            state: SessionState::Open,
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Working group name, while the session is open
    pub fn group_name(&self) -> Option<&str> {
        self.group.as_ref().map(|g| g.name.as_str())
    }

    fn session(&self, operation: &'static str) -> Result<(&dyn Storage, &GroupHandle)> {
        match (&self.container, &self.group) {
            (Some(container), Some(group)) => Ok((container.as_ref(), group)),
            _ => Err(IsmrmrdError::InvalidState {
                operation,
                state: self.state,
            }),
        }
    }

    fn session_mut(
        &mut self,
        operation: &'static str,
    ) -> Result<(&mut dyn Storage, &GroupHandle)> {
        match (&mut self.container, &self.group) {
            (Some(container), Some(group)) => Ok((container.as_mut(), group)),
            _ => Err(IsmrmrdError::InvalidState {
                operation,
                state: self.state,
            }),
        }
    }

    // ========================================================================
    // Metadata document
    // ========================================================================

    /// Store raw metadata text, replacing any previous document
    pub fn write_xml_header(&mut self, text: &str) -> Result<()> {
        let (container, group) = self.session_mut("write metadata")?;
        container.put_text(&group.join(XML_PATH), text.as_bytes())?;
        debug!(len = text.len(), "Metadata document written");
        Ok(())
    }

    /// Read the raw metadata text
    ///
    /// # Errors
    ///
    /// - `NotFound` if no document was written
    /// - `TypeMismatch` if the metadata path holds something other than text
    pub fn read_xml_header(&self) -> Result<String> {
        let (container, group) = self.session("read metadata")?;
        let bytes = container.read_text(&group.join(XML_PATH))?;
        String::from_utf8(bytes).map_err(|e| {
            IsmrmrdError::TypeMismatch(format!("Metadata document is not UTF-8: {}", e))
        })
    }

    /// Serialize and store the metadata document
    pub fn write_header(&mut self, header: &IsmrmrdHeader) -> Result<()> {
        self.session("write metadata")?;
        let text = xml::serialize(header)?;
        self.write_xml_header(&text)
    }

    /// Read and parse the metadata document
    pub fn read_header(&self) -> Result<IsmrmrdHeader> {
        xml::deserialize(&self.read_xml_header()?)
    }

    // ========================================================================
    // Counts
    // ========================================================================

    /// Number of records in the collection at `path`
    ///
    /// A collection that was never created counts as empty.
    pub fn count(&self, path: &str) -> Result<u64> {
        let (container, group) = self.session("count")?;
        Ok(container.extent(&group.join(path)))
    }

    pub fn number_of_acquisitions(&self) -> Result<u64> {
        self.count(ACQUISITION_PATH)
    }

    pub fn number_of_images(&self, path: &str) -> Result<u64> {
        self.count(&image_part(path, IMAGE_HEADER)?)
    }

    pub fn number_of_arrays(&self, path: &str) -> Result<u64> {
        self.count(collection_path(path)?)
    }

    // ========================================================================
    // Records
    // ========================================================================

    fn append_record<R: Record>(
        &mut self,
        operation: &'static str,
        path: &str,
        record: &R,
    ) -> Result<u64> {
        let (container, group) = self.session_mut(operation)?;
        let data = record.encode_record()?;
        let full_path = group.join(path);
        let count = container.append_record(&full_path, R::record_kind(), &data)?;
        debug!(
            path = %full_path,
            index = count - 1,
            size = data.len(),
            "Appended {}",
            R::record_kind().name()
        );
        Ok(count)
    }

    fn read_record<R: Record>(&self, operation: &'static str, path: &str, index: u64) -> Result<R> {
        let (container, group) = self.session(operation)?;
        let full_path = group.join(path);
        let data = container.read_record(&full_path, R::record_kind(), index)?;
        trace!(path = %full_path, index = index, "Read {}", R::record_kind().name());
        R::decode_record(&data)
    }

    /// Append one acquisition to the `data` collection
    pub fn append_acquisition(&mut self, acquisition: &Acquisition) -> Result<()> {
        self.append_record("append acquisition", ACQUISITION_PATH, acquisition)?;
        Ok(())
    }

    /// Read the acquisition at zero-based `index`
    pub fn read_acquisition(&self, index: u64) -> Result<Acquisition> {
        self.read_record("read acquisition", ACQUISITION_PATH, index)
    }

    /// Append one image to the image collection at `path`
    ///
    /// The header, pixel data and attribute string are committed together,
    /// so the three collections never disagree on their count.
    pub fn append_image(&mut self, path: &str, image: &Image) -> Result<()> {
        let (container, group) = self.session_mut("append image")?;
        image.validate()?;

        let header = image.header.encode();
        let header_path = group.join(&image_part(path, IMAGE_HEADER)?);
        let data_path = group.join(&image_part(path, IMAGE_DATA)?);
        let attributes_path = group.join(&image_part(path, IMAGE_ATTRIBUTES)?);

        container.commit(&[
            Op::AppendRecord {
                path: &header_path,
                kind: RecordKind::ImageHeader,
                data: &header,
            },
            Op::AppendRecord {
                path: &data_path,
                kind: RecordKind::ImageData,
                data: &image.data,
            },
            Op::AppendRecord {
                path: &attributes_path,
                kind: RecordKind::ImageAttributes,
                data: image.attribute_string.as_bytes(),
            },
        ])?;

        debug!(
            path = %header_path,
            index = container.extent(&header_path) - 1,
            version = image.header.version(),
            size = image.data.len(),
            "Appended image"
        );
        Ok(())
    }

    /// Read the image at zero-based `index` of the collection at `path`
    pub fn read_image(&self, path: &str, index: u64) -> Result<Image> {
        let (container, group) = self.session("read image")?;

        let header = container.read_record(
            &group.join(&image_part(path, IMAGE_HEADER)?),
            RecordKind::ImageHeader,
            index,
        )?;
        let data = container.read_record(
            &group.join(&image_part(path, IMAGE_DATA)?),
            RecordKind::ImageData,
            index,
        )?;
        let attributes = container.read_record(
            &group.join(&image_part(path, IMAGE_ATTRIBUTES)?),
            RecordKind::ImageAttributes,
            index,
        )?;

        trace!(path = path, index = index, "Read image");
        Image::from_parts(&header, data, attributes)
    }

    /// Append one array to the collection at `path`
    pub fn append_array(&mut self, path: &str, array: &NdArray) -> Result<()> {
        self.append_record("append array", collection_path(path)?, array)?;
        Ok(())
    }

    /// Read the array at zero-based `index` of the collection at `path`
    pub fn read_array(&self, path: &str, index: u64) -> Result<NdArray> {
        self.read_record("read array", collection_path(path)?, index)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Close the session
    ///
    /// Releases the working group, then syncs and releases the container.
    /// Closing an already closed session does nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.state = SessionState::Closed;

        if let Some(group) = self.group.take() {
            debug!(group = %group.name, "Released working group");
        }
        if let Some(container) = self.container.take() {
            let path = container.path().display().to_string();
            container.close()?;
            info!(path = %path, "Dataset closed");
        }
        Ok(())
    }
}

impl Drop for Dataset {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "Failed to close dataset on drop");
        }
    }
}

/// Image or array collection path with surrounding `/` removed
///
/// Empty paths are rejected; they would resolve to the working group itself.
fn collection_path(path: &str) -> Result<&str> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Err(IsmrmrdError::InvalidPath(format!(
            "Collection path {:?} is empty",
            path
        )));
    }
    Ok(trimmed)
}

fn image_part(path: &str, part: &str) -> Result<String> {
    Ok(format!("{}/{}", collection_path(path)?, part))
}
