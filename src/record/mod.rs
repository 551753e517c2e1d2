//! Fixed-layout binary records
//!
//! This module contains the header codec for acquisitions, images and
//! generic arrays. Every layout is little-endian and packed; field order is
//! part of the on-disk contract shared with other ISMRMRD implementations.

pub mod acquisition;
pub mod counters;
pub mod flags;
pub mod image;
pub mod ndarray;

use crate::error::{IsmrmrdError, Result};

pub use acquisition::{Acquisition, AcquisitionHeader};
pub use counters::EncodingCounters;
pub use flags::{clear_flag, is_flag_set, set_flag, AcquisitionFlag, ImageFlag};
pub use image::{Image, ImageHeader, LegacyImageHeader, VersionedImageHeader};
pub use ndarray::NdArray;
pub use num_complex::Complex32;

/// Format version written into every new header (ISMRMRD major version)
pub const FORMAT_VERSION: u16 = 1;
/// Format version of pre-1.0 datasets
pub const LEGACY_FORMAT_VERSION: u16 = 0;

pub const POSITION_LENGTH: usize = 3;
pub const DIRECTION_LENGTH: usize = 3;
pub const USER_INTS: usize = 8;
pub const USER_FLOATS: usize = 8;
pub const PHYS_STAMPS: usize = 3;
pub const CHANNEL_MASKS: usize = 16;
pub const NDARRAY_MAXDIM: usize = 7;

/// Common interface for everything stored in a record collection
///
/// Each record type (acquisition, image header, array) implements this trait
/// to provide its byte encoding and the collection kind it lives in.
pub trait Record: Sized {
    /// Returns the collection kind this record is stored as
    fn record_kind() -> RecordKind;

    /// Encode the record to bytes
    ///
    /// Encoding validates the record first, so an invalid record never
    /// reaches the container.
    fn encode_record(&self) -> Result<Vec<u8>>;

    /// Decode a record from exactly the bytes produced by `encode_record`
    fn decode_record(data: &[u8]) -> Result<Self>;
}

/// Kind tag carried by every record collection in a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RecordKind {
    Acquisition = 1,
    ImageHeader = 2,
    ImageData = 3,
    ImageAttributes = 4,
    Array = 5,
}

impl RecordKind {
    /// Create from the stored tag value
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            1 => Ok(RecordKind::Acquisition),
            2 => Ok(RecordKind::ImageHeader),
            3 => Ok(RecordKind::ImageData),
            4 => Ok(RecordKind::ImageAttributes),
            5 => Ok(RecordKind::Array),
            _ => Err(IsmrmrdError::InvalidContainer(format!(
                "Unknown record kind: {}",
                value
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RecordKind::Acquisition => "acquisition",
            RecordKind::ImageHeader => "image header",
            RecordKind::ImageData => "image data",
            RecordKind::ImageAttributes => "image attributes",
            RecordKind::Array => "array",
        }
    }
}

/// Element datatype tag shared by images and arrays
///
/// Sample values are never reinterpreted; the tag only sizes payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum DataType {
    /// unsigned short
    Ushort = 1,
    /// short
    Short = 2,
    /// unsigned int
    Uint = 3,
    /// int
    Int = 4,
    /// float
    Float = 5,
    /// double
    Double = 6,
    /// complex float
    CxFloat = 7,
    /// complex double
    CxDouble = 8,
}

impl DataType {
    /// Create from the stored tag value
    pub fn from_u16(value: u16) -> Result<Self> {
        match value {
            1 => Ok(DataType::Ushort),
            2 => Ok(DataType::Short),
            3 => Ok(DataType::Uint),
            4 => Ok(DataType::Int),
            5 => Ok(DataType::Float),
            6 => Ok(DataType::Double),
            7 => Ok(DataType::CxFloat),
            8 => Ok(DataType::CxDouble),
            _ => Err(IsmrmrdError::MalformedRecord(format!(
                "Unknown data type: {}",
                value
            ))),
        }
    }

    /// Get size in bytes of one element
    pub fn size(&self) -> usize {
        match self {
            DataType::Ushort | DataType::Short => 2,
            DataType::Uint | DataType::Int | DataType::Float => 4,
            DataType::Double | DataType::CxFloat => 8,
            DataType::CxDouble => 16,
        }
    }
}

/// Read `N` consecutive values with the given getter
pub(crate) fn get_array<T, const N: usize>(
    buf: &mut &[u8],
    get: impl Fn(&mut &[u8]) -> T,
) -> [T; N]
where
    T: Copy + Default,
{
    let mut out = [T::default(); N];
    for value in &mut out {
        *value = get(buf);
    }
    out
}

/// Reject a buffer whose length differs from a fixed layout width
pub(crate) fn check_exact_size(what: &str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(IsmrmrdError::MalformedRecord(format!(
            "{}: expected {} bytes, got {}",
            what, expected, actual
        )));
    }
    Ok(())
}
