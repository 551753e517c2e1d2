//! Binary layout compatibility tests
//!
//! These tests pin the byte offsets of header fields so records written by
//! this library can be read by other ISMRMRD implementations and vice versa.
//! All layouts are packed and little-endian.

use ismrmrd_rust::record::{
    Acquisition, AcquisitionFlag, AcquisitionHeader, Complex32, DataType, ImageFlag, ImageHeader,
    LegacyImageHeader, NdArray, Record,
};

fn u16_at(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

fn u32_at(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
}

fn u64_at(buf: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(buf[offset..offset + 8].try_into().unwrap())
}

fn f32_at(buf: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
}

/// Test acquisition header field offsets
#[test]
fn test_acquisition_header_offsets() {
    let mut head = AcquisitionHeader {
        measurement_uid: 0x1122_3344,
        scan_counter: 7,
        acquisition_time_stamp: 0xDEAD_BEEF,
        physiology_time_stamp: [1, 2, 3],
        number_of_samples: 256,
        available_channels: 32,
        active_channels: 16,
        discard_pre: 4,
        discard_post: 5,
        center_sample: 128,
        encoding_space_ref: 1,
        trajectory_dimensions: 2,
        sample_time_us: 2.5,
        position: [1.0, 2.0, 3.0],
        patient_table_position: [-1.0, -2.0, -3.0],
        user_int: [0, 0, 0, 0, 0, 0, 0, -9],
        user_float: [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 8.5],
        ..Default::default()
    };
    head.set_flag(AcquisitionFlag::FirstInSlice);
    head.set_channel_active(0);
    head.set_channel_active(65);
    head.idx.kspace_encode_step_1 = 42;
    head.idx.segment = 3;

    let buf = head.encode();
    assert_eq!(buf.len(), 340, "Acquisition header must be exactly 340 bytes");

    assert_eq!(u16_at(&buf, 0), 1, "version");
    assert_eq!(u64_at(&buf, 2), 1 << 6, "flags");
    assert_eq!(u32_at(&buf, 10), 0x1122_3344, "measurement_uid");
    assert_eq!(u32_at(&buf, 14), 7, "scan_counter");
    assert_eq!(u32_at(&buf, 18), 0xDEAD_BEEF, "acquisition_time_stamp");
    assert_eq!(u32_at(&buf, 30), 3, "physiology_time_stamp[2]");
    assert_eq!(u16_at(&buf, 34), 256, "number_of_samples");
    assert_eq!(u16_at(&buf, 36), 32, "available_channels");
    assert_eq!(u16_at(&buf, 38), 16, "active_channels");
    assert_eq!(u64_at(&buf, 40), 1, "channel_mask[0]");
    assert_eq!(u64_at(&buf, 48), 1 << 1, "channel_mask[1]");
    assert_eq!(u16_at(&buf, 168), 4, "discard_pre");
    assert_eq!(u16_at(&buf, 170), 5, "discard_post");
    assert_eq!(u16_at(&buf, 172), 128, "center_sample");
    assert_eq!(u16_at(&buf, 174), 1, "encoding_space_ref");
    assert_eq!(u16_at(&buf, 176), 2, "trajectory_dimensions");
    assert_eq!(f32_at(&buf, 178), 2.5, "sample_time_us");
    assert_eq!(f32_at(&buf, 182), 1.0, "position[0]");
    assert_eq!(f32_at(&buf, 190), 3.0, "position[2]");
    assert_eq!(f32_at(&buf, 230), -1.0, "patient_table_position[0]");
    assert_eq!(u16_at(&buf, 242), 42, "idx.kspace_encode_step_1");
    assert_eq!(u16_at(&buf, 258), 3, "idx.segment");
    assert_eq!(u32_at(&buf, 304) as i32, -9, "user_int[7]");
    assert_eq!(f32_at(&buf, 336), 8.5, "user_float[7]");
}

/// Test current image header field offsets
#[test]
fn test_image_header_offsets() {
    let mut header = ImageHeader {
        measurement_uid: 99,
        field_of_view: [300.0, 200.0, 10.0],
        slice: 6,
        set: 2,
        acquisition_time_stamp: 5000,
        image_type: 1,
        image_index: 12,
        image_series_index: 3,
        user_float: [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.5],
        attribute_string_len: 77,
        ..ImageHeader::new(DataType::CxFloat, [256, 128, 1], 4)
    };
    header.set_flag(ImageFlag::User1);

    let buf = header.encode();
    assert_eq!(buf.len(), 198, "Image header must be exactly 198 bytes");

    assert_eq!(u16_at(&buf, 0), 1, "version");
    assert_eq!(u16_at(&buf, 2), DataType::CxFloat as u16, "data_type");
    assert_eq!(u64_at(&buf, 4), 1 << 56, "flags");
    assert_eq!(u32_at(&buf, 12), 99, "measurement_uid");
    assert_eq!(u16_at(&buf, 16), 256, "matrix_size[0]");
    assert_eq!(u16_at(&buf, 18), 128, "matrix_size[1]");
    assert_eq!(f32_at(&buf, 22), 300.0, "field_of_view[0]");
    assert_eq!(u16_at(&buf, 34), 4, "channels");
    assert_eq!(u16_at(&buf, 98), 6, "slice");
    assert_eq!(u16_at(&buf, 106), 2, "set");
    assert_eq!(u32_at(&buf, 108), 5000, "acquisition_time_stamp");
    assert_eq!(u16_at(&buf, 124), 1, "image_type");
    assert_eq!(u16_at(&buf, 126), 12, "image_index");
    assert_eq!(u16_at(&buf, 128), 3, "image_series_index");
    assert_eq!(f32_at(&buf, 190), 1.5, "user_float[7]");
    assert_eq!(u32_at(&buf, 194), 77, "attribute_string_len");
}

/// Test legacy image header field offsets
#[test]
fn test_legacy_image_header_offsets() {
    let header = LegacyImageHeader {
        flags: 1,
        measurement_uid: 99,
        matrix_size: [64, 32, 1],
        channels: 2,
        slice: 6,
        image_index: 12,
        user_float: [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.5],
        ..Default::default()
    };

    let buf = header.encode();
    assert_eq!(buf.len(), 192, "Legacy image header must be exactly 192 bytes");

    assert_eq!(u16_at(&buf, 0), 0, "version");
    assert_eq!(u64_at(&buf, 2), 1, "flags");
    assert_eq!(u32_at(&buf, 10), 99, "measurement_uid");
    assert_eq!(u16_at(&buf, 14), 64, "matrix_size[0]");
    assert_eq!(u16_at(&buf, 32), 2, "channels");
    assert_eq!(u16_at(&buf, 96), 6, "slice");
    assert_eq!(u16_at(&buf, 124), 12, "image_index");
    assert_eq!(f32_at(&buf, 188), 1.5, "user_float[7]");
}

/// Test acquisition payload order: header, trajectory, interleaved samples
#[test]
fn test_acquisition_payload_layout() {
    let head = AcquisitionHeader {
        number_of_samples: 2,
        available_channels: 1,
        active_channels: 1,
        trajectory_dimensions: 1,
        ..Default::default()
    };
    let mut acq = Acquisition::zeroed(head);
    acq.traj = vec![0.25, 0.75];
    acq.data[1] = Complex32::new(3.0, -4.0);

    let buf = acq.encode_record().unwrap();
    assert_eq!(buf.len(), 340 + 2 * 4 + 2 * 8);

    assert_eq!(f32_at(&buf, 340), 0.25, "traj[0]");
    assert_eq!(f32_at(&buf, 344), 0.75, "traj[1]");
    assert_eq!(f32_at(&buf, 348), 0.0, "data[0].re");
    assert_eq!(f32_at(&buf, 356), 3.0, "data[1].re");
    assert_eq!(f32_at(&buf, 360), -4.0, "data[1].im");
}

/// Test array record prefix
#[test]
fn test_array_layout() {
    let array = NdArray::zeroed(DataType::Double, vec![3, 2]).unwrap();
    let buf = array.encode_record().unwrap();

    assert_eq!(u16_at(&buf, 0), 1, "version");
    assert_eq!(u16_at(&buf, 2), DataType::Double as u16, "data_type");
    assert_eq!(u16_at(&buf, 4), 2, "ndim");
    assert_eq!(u64_at(&buf, 6), 3, "dims[0]");
    assert_eq!(u64_at(&buf, 14), 2, "dims[1]");
    assert_eq!(buf.len(), 22 + 6 * 8);
}

/// Test flag bit positions against the numeric contract
#[test]
fn test_flag_bit_positions() {
    assert_eq!(AcquisitionFlag::FirstInEncodeStep1 as u8, 1);
    assert_eq!(AcquisitionFlag::LastInSlice as u8, 8);
    assert_eq!(AcquisitionFlag::IsNoiseMeasurement as u8, 19);
    assert_eq!(AcquisitionFlag::IsNavigationData as u8, 23);
    assert_eq!(AcquisitionFlag::LastInMeasurement as u8, 25);
    assert_eq!(AcquisitionFlag::IsSurfacecoilcorrectionscanData as u8, 29);
    assert_eq!(AcquisitionFlag::User1 as u8, 57);
    assert_eq!(ImageFlag::IsNavigationData as u8, 1);
    assert_eq!(ImageFlag::User8 as u8, 64);
}
