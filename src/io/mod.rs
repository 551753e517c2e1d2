//! Dataset storage
//!
//! [`Storage`] is the container seam with two backends: [`Hdf5Container`]
//! (feature `hdf5`) and the frame-log [`ContainerFile`]. [`Dataset`] is the
//! session that reads and appends records under one working group of a
//! container.

pub mod builder;
pub mod container;
pub mod dataset;
#[cfg(feature = "hdf5")]
pub mod hdf5;
pub mod storage;

pub use builder::{DatasetBuilder, DatasetOptions, DEFAULT_GROUP};
pub use container::ContainerFile;
pub use dataset::{Dataset, SessionState};
#[cfg(feature = "hdf5")]
pub use self::hdf5::Hdf5Container;
pub use storage::{Op, Slot, Storage, StorageFormat};
