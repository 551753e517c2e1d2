//! Builder for opening and creating datasets
//!
//! Collects the container path, working group and storage options before a
//! [`Dataset`] is created or opened. The builder itself is the unopened
//! stage of a session: nothing touches the filesystem until
//! [`create`](DatasetBuilder::create) or [`open`](DatasetBuilder::open).
//!
//! # Examples
//!
//! ```no_run
//! use ismrmrd_rust::io::DatasetBuilder;
//!
//! // New container with a custom working group
//! let dataset = DatasetBuilder::new("scan.h5c")
//!     .group("scan42")
//!     .sync_writes(true)
//!     .create()?;
//!
//! // Existing container, default working group "dataset", no write access
//! let dataset = DatasetBuilder::new("other.h5c").read_only(true).open()?;
//! # Ok::<(), ismrmrd_rust::IsmrmrdError>(())
//! ```

use crate::error::Result;
use crate::io::dataset::Dataset;
use crate::io::storage::StorageFormat;
use std::path::PathBuf;
use tracing::{info, warn};

/// Working group used when none is configured
pub const DEFAULT_GROUP: &str = "dataset";

/// Settings shared by a dataset session and its container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetOptions {
    /// Working group all dataset paths are resolved under
    pub group: String,
    /// Verify frame checksums while scanning the container on open
    pub verify_checksums: bool,
    /// Sync file data to storage after every committed frame
    pub sync_writes: bool,
    /// Open without write access; ignored by create
    pub read_only: bool,
    /// Layout of newly created containers; open detects the layout
    pub format: StorageFormat,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        DatasetOptions {
            group: DEFAULT_GROUP.to_string(),
            verify_checksums: true,
            sync_writes: false,
            read_only: false,
            format: StorageFormat::default(),
        }
    }
}

/// Builder for [`Dataset`] sessions
///
/// # Examples
///
/// ```no_run
/// use ismrmrd_rust::io::DatasetBuilder;
///
/// let mut dataset = DatasetBuilder::new("scan.h5c").create()?;
/// dataset.write_xml_header("<ismrmrdHeader/>")?;
/// dataset.close()?;
/// # Ok::<(), ismrmrd_rust::IsmrmrdError>(())
/// ```
#[derive(Debug, Clone)]
pub struct DatasetBuilder {
    path: PathBuf,
    options: DatasetOptions,
}

impl DatasetBuilder {
    /// Start configuring a dataset at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DatasetBuilder {
            path: path.into(),
            options: DatasetOptions::default(),
        }
    }

    /// Set the working group name
    ///
    /// Leading and trailing `/` are ignored.
    pub fn group(mut self, name: impl Into<String>) -> Self {
        self.options.group = name.into();
        self
    }

    /// Enable or disable checksum verification on open
    ///
    /// With verification disabled a corrupted tail frame is indexed as if
    /// it were intact.
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        if !verify {
            warn!("Checksum verification disabled - use only for trusted containers");
        }
        self.options.verify_checksums = verify;
        self
    }

    /// Sync every committed frame to storage before returning
    pub fn sync_writes(mut self, sync: bool) -> Self {
        self.options.sync_writes = sync;
        self
    }

    /// Open the container without write access
    ///
    /// Writes through a read-only session fail with `ReadOnly`, and the
    /// file is never modified.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.options.read_only = read_only;
        self
    }

    /// Storage layout used by [`create`](DatasetBuilder::create)
    pub fn format(mut self, format: StorageFormat) -> Self {
        self.options.format = format;
        self
    }

    /// Current settings
    pub fn options(&self) -> &DatasetOptions {
        &self.options
    }

    /// Create a new container and its working group
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` if anything exists at the path
    pub fn create(self) -> Result<Dataset> {
        info!(
            path = %self.path.display(),
            group = %self.options.group,
            "Creating dataset"
        );
        Dataset::create_with(&self.path, self.options)
    }

    /// Open an existing container and working group
    ///
    /// # Errors
    ///
    /// - `NotFound` if the container or the working group is absent
    /// - `InvalidContainer` if the file is not a readable container
    pub fn open(self) -> Result<Dataset> {
        info!(
            path = %self.path.display(),
            group = %self.options.group,
            "Opening dataset"
        );
        Dataset::open_with(&self.path, self.options)
    }
}
