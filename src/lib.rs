//! ISMRMRD raw data container in Rust
//!
//! This library stores magnetic resonance raw data in the ISMRMRD model:
//! per-readout acquisitions, reconstructed images and generic arrays, plus one
//! structured XML metadata document describing the experiment.
//!
//! # Features
//!
//! - **Exact binary layouts** - Acquisition and image headers match the
//!   packed little-endian layouts shared with other ISMRMRD readers
//! - **Versioned image headers** - Legacy and current layouts decoded into
//!   distinct variants, never mixed
//! - **Typed metadata document** - Every optional block round-trips as
//!   present or absent
//! - **Atomic appends** - A reader never sees a partially appended record
//! - **HDF5 storage** - Groups and extensible datasets via `hdf5-metno`
//!   (feature `hdf5`, needs the native HDF5 library)
//! - **Checksummed frame log** - Dependency-free fallback format; torn
//!   tails are ignored on open, corruption elsewhere is reported
//! - **Read-only sessions** - Open a container without write access
//!
//! # Quick Start
//!
//! ```no_run
//! use ismrmrd_rust::io::Dataset;
//! use ismrmrd_rust::record::{Acquisition, AcquisitionFlag, AcquisitionHeader};
//! use ismrmrd_rust::xml::{Encoding, IsmrmrdHeader, Limit};
//!
//! let mut dataset = Dataset::create("scan.h5c", "dataset")?;
//!
//! // Metadata document
//! let mut header = IsmrmrdHeader::default();
//! let mut encoding = Encoding {
//!     trajectory: "cartesian".to_string(),
//!     ..Default::default()
//! };
//! encoding.encoding_limits.kspace_encoding_step_1 = Some(Limit::new(0, 127, 64));
//! header.encoding.push(encoding);
//! dataset.write_header(&header)?;
//!
//! // Raw readouts
//! for line in 0..128u16 {
//!     let mut head = AcquisitionHeader {
//!         scan_counter: line as u32,
//!         number_of_samples: 256,
//!         available_channels: 8,
//!         active_channels: 8,
//!         ..Default::default()
//!     };
//!     head.idx.kspace_encode_step_1 = line;
//!     if line == 127 {
//!         head.set_flag(AcquisitionFlag::LastInSlice);
//!     }
//!     dataset.append_acquisition(&Acquisition::zeroed(head))?;
//! }
//!
//! assert_eq!(dataset.number_of_acquisitions()?, 128);
//! dataset.close()?;
//! # Ok::<(), ismrmrd_rust::IsmrmrdError>(())
//! ```
//!
//! # Architecture
//!
//! ## Module Structure
//!
//! - **`record`** - Fixed-layout binary records
//!   - `AcquisitionHeader` (340 bytes) and `Acquisition`
//!   - `ImageHeader` (198 bytes), `LegacyImageHeader` (192 bytes) and `Image`
//!   - `NdArray` - generic arrays of up to seven dimensions
//!   - `flags` - named flag bits
//!
//! - **`xml`** - Metadata document
//!   - `IsmrmrdHeader` and its nested blocks
//!   - `serialize` / `deserialize`
//!
//! - **`io`** - Storage
//!   - `Dataset` - session on one working group
//!   - `DatasetBuilder` - configuration
//!   - `Storage` - container seam, `StorageFormat` selects the backend
//!   - `Hdf5Container` - HDF5 backend (feature `hdf5`)
//!   - `ContainerFile` - single-file checksummed frame log
//!
//! - **`error`** - Error handling
//!   - `IsmrmrdError` - Unified error type for all operations
//!   - `Result<T>` - Type alias for `Result<T, IsmrmrdError>`
//!
//! # Error Handling
//!
//! All operations return `Result<T, IsmrmrdError>`. Each failure is a
//! distinct variant:
//!
//! ```no_run
//! use ismrmrd_rust::io::Dataset;
//! use ismrmrd_rust::IsmrmrdError;
//!
//! let dataset = Dataset::open("scan.h5c", "dataset")?;
//! match dataset.read_acquisition(1000) {
//!     Ok(acq) => println!("scan counter {}", acq.head.scan_counter),
//!     Err(IsmrmrdError::OutOfRange { index, count }) => {
//!         eprintln!("only {} acquisitions, asked for {}", count, index)
//!     }
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! # Ok::<(), ismrmrd_rust::IsmrmrdError>(())
//! ```

pub mod error;
pub mod io;
pub mod record;
pub mod xml;

// Re-export commonly used types
pub use error::{IsmrmrdError, Result};
pub use io::{Dataset, DatasetBuilder};
