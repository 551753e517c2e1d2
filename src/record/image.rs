//! Reconstructed image records
//!
//! Two image header layouts exist across dataset versions. The current
//! layout (format version 1, 198 bytes) carries an element datatype and the
//! length of a free-form attribute string; the legacy layout (format version
//! 0, 192 bytes) has neither. Decoding reads the version field, selects the
//! matching layout and then requires that layout's exact width, so fields of
//! the two layouts are never mixed.
//!
//! An image collection stores three parallel record collections:
//! `<path>/header`, `<path>/data` and `<path>/attributes`.

use crate::error::{IsmrmrdError, Result};
use crate::record::flags::{self, ImageFlag};
use crate::record::{
    check_exact_size, get_array, DataType, Record, RecordKind, DIRECTION_LENGTH, FORMAT_VERSION,
    LEGACY_FORMAT_VERSION, PHYS_STAMPS, POSITION_LENGTH, USER_FLOATS, USER_INTS,
};
use bytes::{Buf, BufMut};

/// Image header, current layout (198 bytes fixed size)
///
/// # Header Structure (little-endian, packed)
/// - VERSION: u16, DATA_TYPE: u16, FLAGS: u64, MEASUREMENT_UID: u32
/// - MATRIX_SIZE: `u16[3]`, FIELD_OF_VIEW: `f32[3]`, CHANNELS: u16
/// - POSITION, READ_DIR, PHASE_DIR, SLICE_DIR, PATIENT_TABLE_POSITION: `f32[3]`
/// - AVERAGE, SLICE, CONTRAST, PHASE, REPETITION, SET: u16
/// - ACQUISITION_TIME_STAMP: u32, PHYSIOLOGY_TIME_STAMP: `u32[3]`
/// - IMAGE_TYPE, IMAGE_INDEX, IMAGE_SERIES_INDEX: u16
/// - USER_INT: `i32[8]`, USER_FLOAT: `f32[8]`
/// - ATTRIBUTE_STRING_LEN: u32
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageHeader {
    pub version: u16,
    /// Element datatype tag, see `DataType`
    pub data_type: u16,
    /// Bit field of `ImageFlag`s
    pub flags: u64,
    pub measurement_uid: u32,
    /// Number of pixels in each dimension
    pub matrix_size: [u16; 3],
    /// Physical size (in mm) in each of the three dimensions
    pub field_of_view: [f32; 3],
    /// Number of receive channels
    pub channels: u16,
    pub position: [f32; POSITION_LENGTH],
    pub read_dir: [f32; DIRECTION_LENGTH],
    pub phase_dir: [f32; DIRECTION_LENGTH],
    pub slice_dir: [f32; DIRECTION_LENGTH],
    pub patient_table_position: [f32; POSITION_LENGTH],
    pub average: u16,
    pub slice: u16,
    pub contrast: u16,
    pub phase: u16,
    pub repetition: u16,
    pub set: u16,
    pub acquisition_time_stamp: u32,
    pub physiology_time_stamp: [u32; PHYS_STAMPS],
    /// Magnitude, phase, real, imaginary or complex
    pub image_type: u16,
    pub image_index: u16,
    pub image_series_index: u16,
    pub user_int: [i32; USER_INTS],
    pub user_float: [f32; USER_FLOATS],
    /// Length in bytes of the attribute string stored with the image
    pub attribute_string_len: u32,
}

/// Image header, legacy layout (192 bytes fixed size)
///
/// Same field order as `ImageHeader` without DATA_TYPE and
/// ATTRIBUTE_STRING_LEN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegacyImageHeader {
    pub version: u16,
    pub flags: u64,
    pub measurement_uid: u32,
    pub matrix_size: [u16; 3],
    pub field_of_view: [f32; 3],
    pub channels: u16,
    pub position: [f32; POSITION_LENGTH],
    pub read_dir: [f32; DIRECTION_LENGTH],
    pub phase_dir: [f32; DIRECTION_LENGTH],
    pub slice_dir: [f32; DIRECTION_LENGTH],
    pub patient_table_position: [f32; POSITION_LENGTH],
    pub average: u16,
    pub slice: u16,
    pub contrast: u16,
    pub phase: u16,
    pub repetition: u16,
    pub set: u16,
    pub acquisition_time_stamp: u32,
    pub physiology_time_stamp: [u32; PHYS_STAMPS],
    pub image_type: u16,
    pub image_index: u16,
    pub image_series_index: u16,
    pub user_int: [i32; USER_INTS],
    pub user_float: [f32; USER_FLOATS],
}

impl Default for ImageHeader {
    fn default() -> Self {
        ImageHeader {
            version: FORMAT_VERSION,
            data_type: DataType::Float as u16,
            flags: 0,
            measurement_uid: 0,
            matrix_size: [0; 3],
            field_of_view: [0.0; 3],
            channels: 1,
            position: [0.0; POSITION_LENGTH],
            read_dir: [0.0; DIRECTION_LENGTH],
            phase_dir: [0.0; DIRECTION_LENGTH],
            slice_dir: [0.0; DIRECTION_LENGTH],
            patient_table_position: [0.0; POSITION_LENGTH],
            average: 0,
            slice: 0,
            contrast: 0,
            phase: 0,
            repetition: 0,
            set: 0,
            acquisition_time_stamp: 0,
            physiology_time_stamp: [0; PHYS_STAMPS],
            image_type: 0,
            image_index: 0,
            image_series_index: 0,
            user_int: [0; USER_INTS],
            user_float: [0.0; USER_FLOATS],
            attribute_string_len: 0,
        }
    }
}

impl Default for LegacyImageHeader {
    fn default() -> Self {
        let current = ImageHeader::default();
        LegacyImageHeader {
            version: LEGACY_FORMAT_VERSION,
            flags: current.flags,
            measurement_uid: current.measurement_uid,
            matrix_size: current.matrix_size,
            field_of_view: current.field_of_view,
            channels: current.channels,
            position: current.position,
            read_dir: current.read_dir,
            phase_dir: current.phase_dir,
            slice_dir: current.slice_dir,
            patient_table_position: current.patient_table_position,
            average: current.average,
            slice: current.slice,
            contrast: current.contrast,
            phase: current.phase,
            repetition: current.repetition,
            set: current.set,
            acquisition_time_stamp: current.acquisition_time_stamp,
            physiology_time_stamp: current.physiology_time_stamp,
            image_type: current.image_type,
            image_index: current.image_index,
            image_series_index: current.image_series_index,
            user_int: current.user_int,
            user_float: current.user_float,
        }
    }
}

fn element_count(matrix_size: &[u16; 3], channels: u16) -> Result<usize> {
    matrix_size
        .iter()
        .chain(std::iter::once(&channels))
        .try_fold(1usize, |acc, &d| acc.checked_mul(d as usize))
        .ok_or_else(|| IsmrmrdError::MalformedRecord("Image dimensions overflow".to_string()))
}

impl ImageHeader {
    /// Header size in bytes
    pub const SIZE: usize = 198;

    /// Create a header for a `matrix_size` image of the given element type
    pub fn new(data_type: DataType, matrix_size: [u16; 3], channels: u16) -> Self {
        ImageHeader {
            data_type: data_type as u16,
            matrix_size,
            channels,
            ..Default::default()
        }
    }

    pub fn is_flag_set(&self, flag: ImageFlag) -> bool {
        flags::is_flag_set(self.flags, flag.bit())
    }

    pub fn set_flag(&mut self, flag: ImageFlag) {
        self.flags = flags::set_flag(self.flags, flag.bit());
    }

    pub fn clear_flag(&mut self, flag: ImageFlag) {
        self.flags = flags::clear_flag(self.flags, flag.bit());
    }

    pub fn clear_all_flags(&mut self) {
        self.flags = 0;
    }

    /// Expected number of elements in the image payload
    pub fn element_count(&self) -> Result<usize> {
        element_count(&self.matrix_size, self.channels)
    }

    /// Expected payload size in bytes
    pub fn data_size(&self) -> Result<usize> {
        let element_size = DataType::from_u16(self.data_type)?.size();
        self.element_count()?
            .checked_mul(element_size)
            .ok_or_else(|| IsmrmrdError::MalformedRecord("Image size overflow".to_string()))
    }

    /// Encode the header into a 198-byte vector
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.put_u16_le(self.version);
        buf.put_u16_le(self.data_type);
        buf.put_u64_le(self.flags);
        buf.put_u32_le(self.measurement_uid);
        encode_body(
            &mut buf,
            &BodyRef {
                matrix_size: &self.matrix_size,
                field_of_view: &self.field_of_view,
                channels: self.channels,
                vectors: [
                    &self.position,
                    &self.read_dir,
                    &self.phase_dir,
                    &self.slice_dir,
                    &self.patient_table_position,
                ],
                counters: [
                    self.average,
                    self.slice,
                    self.contrast,
                    self.phase,
                    self.repetition,
                    self.set,
                ],
                acquisition_time_stamp: self.acquisition_time_stamp,
                physiology_time_stamp: &self.physiology_time_stamp,
                image_type: self.image_type,
                image_index: self.image_index,
                image_series_index: self.image_series_index,
                user_int: &self.user_int,
                user_float: &self.user_float,
            },
        );
        buf.put_u32_le(self.attribute_string_len);
        buf
    }

    /// Decode a current-layout header from exactly `SIZE` bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        check_exact_size("Image header", Self::SIZE, data.len())?;

        let mut buf = data;
        let version = buf.get_u16_le();
        if version != FORMAT_VERSION {
            return Err(IsmrmrdError::MalformedRecord(format!(
                "Image header version {} does not use the current layout",
                version
            )));
        }
        let data_type = buf.get_u16_le();
        let flags = buf.get_u64_le();
        let measurement_uid = buf.get_u32_le();
        let body = decode_body(&mut buf);

        Ok(ImageHeader {
            version,
            data_type,
            flags,
            measurement_uid,
            matrix_size: body.matrix_size,
            field_of_view: body.field_of_view,
            channels: body.channels,
            position: body.vectors[0],
            read_dir: body.vectors[1],
            phase_dir: body.vectors[2],
            slice_dir: body.vectors[3],
            patient_table_position: body.vectors[4],
            average: body.counters[0],
            slice: body.counters[1],
            contrast: body.counters[2],
            phase: body.counters[3],
            repetition: body.counters[4],
            set: body.counters[5],
            acquisition_time_stamp: body.acquisition_time_stamp,
            physiology_time_stamp: body.physiology_time_stamp,
            image_type: body.image_type,
            image_index: body.image_index,
            image_series_index: body.image_series_index,
            user_int: body.user_int,
            user_float: body.user_float,
            attribute_string_len: buf.get_u32_le(),
        })
    }
}

impl LegacyImageHeader {
    /// Header size in bytes
    pub const SIZE: usize = 192;

    pub fn is_flag_set(&self, flag: ImageFlag) -> bool {
        flags::is_flag_set(self.flags, flag.bit())
    }

    pub fn element_count(&self) -> Result<usize> {
        element_count(&self.matrix_size, self.channels)
    }

    /// Convert to the current layout
    ///
    /// The legacy layout records no element type, so the caller must supply
    /// it. The attribute string length of the result is zero.
    pub fn upgrade(&self, data_type: DataType) -> ImageHeader {
        ImageHeader {
            version: FORMAT_VERSION,
            data_type: data_type as u16,
            flags: self.flags,
            measurement_uid: self.measurement_uid,
            matrix_size: self.matrix_size,
            field_of_view: self.field_of_view,
            channels: self.channels,
            position: self.position,
            read_dir: self.read_dir,
            phase_dir: self.phase_dir,
            slice_dir: self.slice_dir,
            patient_table_position: self.patient_table_position,
            average: self.average,
            slice: self.slice,
            contrast: self.contrast,
            phase: self.phase,
            repetition: self.repetition,
            set: self.set,
            acquisition_time_stamp: self.acquisition_time_stamp,
            physiology_time_stamp: self.physiology_time_stamp,
            image_type: self.image_type,
            image_index: self.image_index,
            image_series_index: self.image_series_index,
            user_int: self.user_int,
            user_float: self.user_float,
            attribute_string_len: 0,
        }
    }

    /// Encode the header into a 192-byte vector
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.put_u16_le(self.version);
        buf.put_u64_le(self.flags);
        buf.put_u32_le(self.measurement_uid);
        encode_body(
            &mut buf,
            &BodyRef {
                matrix_size: &self.matrix_size,
                field_of_view: &self.field_of_view,
                channels: self.channels,
                vectors: [
                    &self.position,
                    &self.read_dir,
                    &self.phase_dir,
                    &self.slice_dir,
                    &self.patient_table_position,
                ],
                counters: [
                    self.average,
                    self.slice,
                    self.contrast,
                    self.phase,
                    self.repetition,
                    self.set,
                ],
                acquisition_time_stamp: self.acquisition_time_stamp,
                physiology_time_stamp: &self.physiology_time_stamp,
                image_type: self.image_type,
                image_index: self.image_index,
                image_series_index: self.image_series_index,
                user_int: &self.user_int,
                user_float: &self.user_float,
            },
        );
        buf
    }

    /// Decode a legacy-layout header from exactly `SIZE` bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        check_exact_size("Legacy image header", Self::SIZE, data.len())?;

        let mut buf = data;
        let version = buf.get_u16_le();
        if version != LEGACY_FORMAT_VERSION {
            return Err(IsmrmrdError::MalformedRecord(format!(
                "Image header version {} does not use the legacy layout",
                version
            )));
        }
        let flags = buf.get_u64_le();
        let measurement_uid = buf.get_u32_le();
        let body = decode_body(&mut buf);

        Ok(LegacyImageHeader {
            version,
            flags,
            measurement_uid,
            matrix_size: body.matrix_size,
            field_of_view: body.field_of_view,
            channels: body.channels,
            position: body.vectors[0],
            read_dir: body.vectors[1],
            phase_dir: body.vectors[2],
            slice_dir: body.vectors[3],
            patient_table_position: body.vectors[4],
            average: body.counters[0],
            slice: body.counters[1],
            contrast: body.counters[2],
            phase: body.counters[3],
            repetition: body.counters[4],
            set: body.counters[5],
            acquisition_time_stamp: body.acquisition_time_stamp,
            physiology_time_stamp: body.physiology_time_stamp,
            image_type: body.image_type,
            image_index: body.image_index,
            image_series_index: body.image_series_index,
            user_int: body.user_int,
            user_float: body.user_float,
        })
    }
}

// Fields from MATRIX_SIZE through USER_FLOAT, identical in both layouts
struct BodyRef<'a> {
    matrix_size: &'a [u16; 3],
    field_of_view: &'a [f32; 3],
    channels: u16,
    vectors: [&'a [f32; 3]; 5],
    counters: [u16; 6],
    acquisition_time_stamp: u32,
    physiology_time_stamp: &'a [u32; PHYS_STAMPS],
    image_type: u16,
    image_index: u16,
    image_series_index: u16,
    user_int: &'a [i32; USER_INTS],
    user_float: &'a [f32; USER_FLOATS],
}

struct Body {
    matrix_size: [u16; 3],
    field_of_view: [f32; 3],
    channels: u16,
    vectors: [[f32; 3]; 5],
    counters: [u16; 6],
    acquisition_time_stamp: u32,
    physiology_time_stamp: [u32; PHYS_STAMPS],
    image_type: u16,
    image_index: u16,
    image_series_index: u16,
    user_int: [i32; USER_INTS],
    user_float: [f32; USER_FLOATS],
}

fn encode_body(buf: &mut Vec<u8>, body: &BodyRef<'_>) {
    for &m in body.matrix_size {
        buf.put_u16_le(m);
    }
    for &f in body.field_of_view {
        buf.put_f32_le(f);
    }
    buf.put_u16_le(body.channels);
    for vector in body.vectors {
        for &v in vector {
            buf.put_f32_le(v);
        }
    }
    for counter in body.counters {
        buf.put_u16_le(counter);
    }
    buf.put_u32_le(body.acquisition_time_stamp);
    for &stamp in body.physiology_time_stamp {
        buf.put_u32_le(stamp);
    }
    buf.put_u16_le(body.image_type);
    buf.put_u16_le(body.image_index);
    buf.put_u16_le(body.image_series_index);
    for &v in body.user_int {
        buf.put_i32_le(v);
    }
    for &v in body.user_float {
        buf.put_f32_le(v);
    }
}

fn decode_body(buf: &mut &[u8]) -> Body {
    Body {
        matrix_size: get_array(buf, |b| b.get_u16_le()),
        field_of_view: get_array(buf, |b| b.get_f32_le()),
        channels: buf.get_u16_le(),
        vectors: [
            get_array(buf, |b| b.get_f32_le()),
            get_array(buf, |b| b.get_f32_le()),
            get_array(buf, |b| b.get_f32_le()),
            get_array(buf, |b| b.get_f32_le()),
            get_array(buf, |b| b.get_f32_le()),
        ],
        counters: get_array(buf, |b| b.get_u16_le()),
        acquisition_time_stamp: buf.get_u32_le(),
        physiology_time_stamp: get_array(buf, |b| b.get_u32_le()),
        image_type: buf.get_u16_le(),
        image_index: buf.get_u16_le(),
        image_series_index: buf.get_u16_le(),
        user_int: get_array(buf, |b| b.get_i32_le()),
        user_float: get_array(buf, |b| b.get_f32_le()),
    }
}

/// Image header tagged with the layout it was stored in
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VersionedImageHeader {
    /// Pre-1.0 layout, format version 0
    Legacy(LegacyImageHeader),
    /// Current layout, format version 1
    Current(ImageHeader),
}

impl VersionedImageHeader {
    /// Stored format version
    pub fn version(&self) -> u16 {
        match self {
            VersionedImageHeader::Legacy(h) => h.version,
            VersionedImageHeader::Current(h) => h.version,
        }
    }

    pub fn matrix_size(&self) -> [u16; 3] {
        match self {
            VersionedImageHeader::Legacy(h) => h.matrix_size,
            VersionedImageHeader::Current(h) => h.matrix_size,
        }
    }

    pub fn channels(&self) -> u16 {
        match self {
            VersionedImageHeader::Legacy(h) => h.channels,
            VersionedImageHeader::Current(h) => h.channels,
        }
    }

    pub fn element_count(&self) -> Result<usize> {
        element_count(&self.matrix_size(), self.channels())
    }

    /// The current-layout header, if this is one
    pub fn as_current(&self) -> Option<&ImageHeader> {
        match self {
            VersionedImageHeader::Current(h) => Some(h),
            VersionedImageHeader::Legacy(_) => None,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            VersionedImageHeader::Legacy(h) => h.encode(),
            VersionedImageHeader::Current(h) => h.encode(),
        }
    }

    /// Decode a header of either layout, selected by its version field
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 2 {
            return Err(IsmrmrdError::MalformedRecord(format!(
                "Image header: expected at least 2 bytes, got {}",
                data.len()
            )));
        }

        let version = u16::from_le_bytes([data[0], data[1]]);
        match version {
            FORMAT_VERSION => Ok(VersionedImageHeader::Current(ImageHeader::decode(data)?)),
            LEGACY_FORMAT_VERSION => Ok(VersionedImageHeader::Legacy(LegacyImageHeader::decode(
                data,
            )?)),
            _ => Err(IsmrmrdError::MalformedRecord(format!(
                "Unsupported image header version: {}",
                version
            ))),
        }
    }
}

impl From<ImageHeader> for VersionedImageHeader {
    fn from(header: ImageHeader) -> Self {
        VersionedImageHeader::Current(header)
    }
}

impl From<LegacyImageHeader> for VersionedImageHeader {
    fn from(header: LegacyImageHeader) -> Self {
        VersionedImageHeader::Legacy(header)
    }
}

impl Record for VersionedImageHeader {
    fn record_kind() -> RecordKind {
        RecordKind::ImageHeader
    }

    fn encode_record(&self) -> Result<Vec<u8>> {
        Ok(self.encode())
    }

    fn decode_record(data: &[u8]) -> Result<Self> {
        Self::decode(data)
    }
}

/// Reconstructed image: header, attribute string and raw pixel data
///
/// Pixel data is kept as raw little-endian bytes of the header's element
/// type; it is sized but never reinterpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub header: VersionedImageHeader,
    /// Free-form per-image attributes (current layout only)
    pub attribute_string: String,
    pub data: Vec<u8>,
}

impl Image {
    /// Create an image, checking the payload size against the header
    pub fn new(header: ImageHeader, data: Vec<u8>) -> Result<Self> {
        let image = Image {
            header: VersionedImageHeader::Current(ImageHeader {
                attribute_string_len: 0,
                ..header
            }),
            attribute_string: String::new(),
            data,
        };
        image.validate()?;
        Ok(image)
    }

    /// Create a legacy-layout image
    pub fn legacy(header: LegacyImageHeader, data: Vec<u8>) -> Result<Self> {
        let image = Image {
            header: VersionedImageHeader::Legacy(header),
            attribute_string: String::new(),
            data,
        };
        image.validate()?;
        Ok(image)
    }

    /// Attach an attribute string, updating the header's recorded length
    pub fn with_attributes(mut self, attributes: impl Into<String>) -> Result<Self> {
        let attributes = attributes.into();
        match &mut self.header {
            VersionedImageHeader::Current(h) => {
                h.attribute_string_len = u32::try_from(attributes.len()).map_err(|_| {
                    IsmrmrdError::MalformedRecord(format!(
                        "Attribute string too long: {} bytes",
                        attributes.len()
                    ))
                })?;
            }
            VersionedImageHeader::Legacy(_) => {
                return Err(IsmrmrdError::MalformedRecord(
                    "Legacy image headers cannot carry attributes".to_string(),
                ));
            }
        }
        self.attribute_string = attributes;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        match &self.header {
            VersionedImageHeader::Current(h) => {
                check_exact_size("Image data", h.data_size()?, self.data.len())?;
                check_exact_size(
                    "Image attributes",
                    h.attribute_string_len as usize,
                    self.attribute_string.len(),
                )?;
            }
            VersionedImageHeader::Legacy(h) => {
                // Element type is unknown, only whole elements can be checked
                let elements = h.element_count()?;
                if (elements == 0 && !self.data.is_empty())
                    || (elements != 0 && self.data.len() % elements != 0)
                {
                    return Err(IsmrmrdError::MalformedRecord(format!(
                        "Image data: {} bytes is not a whole number of {} elements",
                        self.data.len(),
                        elements
                    )));
                }
                if !self.attribute_string.is_empty() {
                    return Err(IsmrmrdError::MalformedRecord(
                        "Legacy image headers cannot carry attributes".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Reassemble an image from its three stored records
    pub(crate) fn from_parts(header: &[u8], data: Vec<u8>, attributes: Vec<u8>) -> Result<Self> {
        let header = VersionedImageHeader::decode(header)?;
        let attribute_string = String::from_utf8(attributes).map_err(|e| {
            IsmrmrdError::TypeMismatch(format!("Image attributes are not UTF-8: {}", e))
        })?;
        let image = Image {
            header,
            attribute_string,
            data,
        };
        image.validate()?;
        Ok(image)
    }
}
