//! Raw acquisition records
//!
//! An acquisition is one readout event: a fixed 340-byte header followed by
//! a trajectory array and complex sample data whose lengths are derived from
//! the header alone.
//!
//! # Examples
//!
//! ```
//! use ismrmrd_rust::record::{Acquisition, AcquisitionFlag, AcquisitionHeader, Record};
//! use num_complex::Complex32;
//!
//! let mut head = AcquisitionHeader::default();
//! head.number_of_samples = 4;
//! head.available_channels = 2;
//! head.active_channels = 2;
//! head.set_flag(AcquisitionFlag::FirstInSlice);
//!
//! let acq = Acquisition::new(head, Vec::new(), vec![Complex32::new(1.0, -1.0); 8])?;
//! let bytes = acq.encode_record()?;
//! let decoded = Acquisition::decode_record(&bytes)?;
//! assert!(decoded.head.is_flag_set(AcquisitionFlag::FirstInSlice));
//! # Ok::<(), ismrmrd_rust::IsmrmrdError>(())
//! ```

use crate::error::{IsmrmrdError, Result};
use crate::record::counters::EncodingCounters;
use crate::record::flags::{self, AcquisitionFlag};
use crate::record::{
    check_exact_size, get_array, Record, RecordKind, CHANNEL_MASKS, DIRECTION_LENGTH,
    FORMAT_VERSION, LEGACY_FORMAT_VERSION, PHYS_STAMPS, POSITION_LENGTH, USER_FLOATS, USER_INTS,
};
use bytes::{Buf, BufMut};
use num_complex::Complex32;

/// Acquisition header (340 bytes fixed size)
///
/// # Header Structure (little-endian, packed)
/// - VERSION: u16, FLAGS: u64, MEASUREMENT_UID: u32, SCAN_COUNTER: u32
/// - ACQUISITION_TIME_STAMP: u32, PHYSIOLOGY_TIME_STAMP: `u32[3]`
/// - NUMBER_OF_SAMPLES, AVAILABLE_CHANNELS, ACTIVE_CHANNELS: u16
/// - CHANNEL_MASK: `u64[16]`
/// - DISCARD_PRE, DISCARD_POST, CENTER_SAMPLE, ENCODING_SPACE_REF,
///   TRAJECTORY_DIMENSIONS: u16
/// - SAMPLE_TIME_US: f32
/// - POSITION, READ_DIR, PHASE_DIR, SLICE_DIR, PATIENT_TABLE_POSITION: `f32[3]`
/// - IDX: EncodingCounters (34 bytes)
/// - USER_INT: `i32[8]`, USER_FLOAT: `f32[8]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcquisitionHeader {
    /// Format version of this layout
    pub version: u16,
    /// Bit field of `AcquisitionFlag`s
    pub flags: u64,
    /// Unique ID for the measurement
    pub measurement_uid: u32,
    /// Current acquisition number in the measurement
    pub scan_counter: u32,
    /// Acquisition clock
    pub acquisition_time_stamp: u32,
    /// Physiology time stamps, e.g. ECG, breathing
    pub physiology_time_stamp: [u32; PHYS_STAMPS],
    /// Number of samples per channel
    pub number_of_samples: u16,
    /// Available coils
    pub available_channels: u16,
    /// Active coils on current acquisition
    pub active_channels: u16,
    /// Mask to indicate which channels are active, one bit per channel
    pub channel_mask: [u64; CHANNEL_MASKS],
    /// Samples to be discarded at the beginning of the acquisition
    pub discard_pre: u16,
    /// Samples to be discarded at the end of the acquisition
    pub discard_post: u16,
    /// Sample at the center of k-space
    pub center_sample: u16,
    /// Reference to an encoding space, typically only one per acquisition
    pub encoding_space_ref: u16,
    /// Indicates the dimensionality of the trajectory vector (0 means no trajectory)
    pub trajectory_dimensions: u16,
    /// Time between samples in microseconds
    pub sample_time_us: f32,
    /// Three-dimensional spatial offsets from isocenter
    pub position: [f32; POSITION_LENGTH],
    /// Directional cosines of the readout/frequency encoding
    pub read_dir: [f32; DIRECTION_LENGTH],
    /// Directional cosines of the phase encoding
    pub phase_dir: [f32; DIRECTION_LENGTH],
    /// Directional cosines of the slice direction
    pub slice_dir: [f32; DIRECTION_LENGTH],
    /// Patient table off-center
    pub patient_table_position: [f32; POSITION_LENGTH],
    /// Encoding loop counters
    pub idx: EncodingCounters,
    /// Free user parameters
    pub user_int: [i32; USER_INTS],
    /// Free user parameters
    pub user_float: [f32; USER_FLOATS],
}

impl Default for AcquisitionHeader {
    fn default() -> Self {
        AcquisitionHeader {
            version: FORMAT_VERSION,
            flags: 0,
            measurement_uid: 0,
            scan_counter: 0,
            acquisition_time_stamp: 0,
            physiology_time_stamp: [0; PHYS_STAMPS],
            number_of_samples: 0,
            available_channels: 0,
            active_channels: 0,
            channel_mask: [0; CHANNEL_MASKS],
            discard_pre: 0,
            discard_post: 0,
            center_sample: 0,
            encoding_space_ref: 0,
            trajectory_dimensions: 0,
            sample_time_us: 0.0,
            position: [0.0; POSITION_LENGTH],
            read_dir: [0.0; DIRECTION_LENGTH],
            phase_dir: [0.0; DIRECTION_LENGTH],
            slice_dir: [0.0; DIRECTION_LENGTH],
            patient_table_position: [0.0; POSITION_LENGTH],
            idx: EncodingCounters::default(),
            user_int: [0; USER_INTS],
            user_float: [0.0; USER_FLOATS],
        }
    }
}

impl AcquisitionHeader {
    /// Header size in bytes
    pub const SIZE: usize = 340;

    pub fn is_flag_set(&self, flag: AcquisitionFlag) -> bool {
        flags::is_flag_set(self.flags, flag.bit())
    }

    pub fn set_flag(&mut self, flag: AcquisitionFlag) {
        self.flags = flags::set_flag(self.flags, flag.bit());
    }

    pub fn clear_flag(&mut self, flag: AcquisitionFlag) {
        self.flags = flags::clear_flag(self.flags, flag.bit());
    }

    pub fn clear_all_flags(&mut self) {
        self.flags = 0;
    }

    /// Check whether a receiver channel is marked active in the channel mask
    pub fn is_channel_active(&self, channel: u16) -> bool {
        let word = (channel / 64) as usize;
        word < CHANNEL_MASKS && (self.channel_mask[word] >> (channel % 64)) & 1 == 1
    }

    /// Mark a receiver channel active; channels past the mask width are ignored
    pub fn set_channel_active(&mut self, channel: u16) {
        let word = (channel / 64) as usize;
        if word < CHANNEL_MASKS {
            self.channel_mask[word] |= 1u64 << (channel % 64);
        }
    }

    pub fn set_channel_inactive(&mut self, channel: u16) {
        let word = (channel / 64) as usize;
        if word < CHANNEL_MASKS {
            self.channel_mask[word] &= !(1u64 << (channel % 64));
        }
    }

    /// Number of trajectory values carried by an acquisition with this header
    pub fn trajectory_len(&self) -> usize {
        self.number_of_samples as usize * self.trajectory_dimensions as usize
    }

    /// Number of complex samples carried by an acquisition with this header
    pub fn data_len(&self) -> usize {
        self.number_of_samples as usize * self.active_channels as usize
    }

    /// Check the header invariants
    pub fn validate(&self) -> Result<()> {
        if self.active_channels > self.available_channels {
            return Err(IsmrmrdError::MalformedRecord(format!(
                "Active channels ({}) exceed available channels ({})",
                self.active_channels, self.available_channels
            )));
        }
        if self.discard_pre as u32 + self.discard_post as u32 > self.number_of_samples as u32 {
            return Err(IsmrmrdError::MalformedRecord(format!(
                "Discarded samples ({} + {}) exceed number of samples ({})",
                self.discard_pre, self.discard_post, self.number_of_samples
            )));
        }
        Ok(())
    }

    /// Encode the header into a 340-byte vector
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        self.encode_into(&mut buf);
        buf
    }

    pub(crate) fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.put_u16_le(self.version);
        buf.put_u64_le(self.flags);
        buf.put_u32_le(self.measurement_uid);
        buf.put_u32_le(self.scan_counter);
        buf.put_u32_le(self.acquisition_time_stamp);
        for &stamp in &self.physiology_time_stamp {
            buf.put_u32_le(stamp);
        }
        buf.put_u16_le(self.number_of_samples);
        buf.put_u16_le(self.available_channels);
        buf.put_u16_le(self.active_channels);
        for &mask in &self.channel_mask {
            buf.put_u64_le(mask);
        }
        buf.put_u16_le(self.discard_pre);
        buf.put_u16_le(self.discard_post);
        buf.put_u16_le(self.center_sample);
        buf.put_u16_le(self.encoding_space_ref);
        buf.put_u16_le(self.trajectory_dimensions);
        buf.put_f32_le(self.sample_time_us);
        for vector in [
            &self.position,
            &self.read_dir,
            &self.phase_dir,
            &self.slice_dir,
            &self.patient_table_position,
        ] {
            for &v in vector {
                buf.put_f32_le(v);
            }
        }
        self.idx.encode_into(buf);
        for &v in &self.user_int {
            buf.put_i32_le(v);
        }
        for &v in &self.user_float {
            buf.put_f32_le(v);
        }
    }

    /// Decode a header from exactly `SIZE` bytes
    ///
    /// Both known format versions share this layout; any other version value
    /// is rejected.
    pub fn decode(data: &[u8]) -> Result<Self> {
        check_exact_size("Acquisition header", Self::SIZE, data.len())?;

        let mut buf = data;
        let version = buf.get_u16_le();
        if version != FORMAT_VERSION && version != LEGACY_FORMAT_VERSION {
            return Err(IsmrmrdError::MalformedRecord(format!(
                "Unsupported acquisition header version: {}",
                version
            )));
        }

        Ok(AcquisitionHeader {
            version,
            flags: buf.get_u64_le(),
            measurement_uid: buf.get_u32_le(),
            scan_counter: buf.get_u32_le(),
            acquisition_time_stamp: buf.get_u32_le(),
            physiology_time_stamp: get_array(&mut buf, |b| b.get_u32_le()),
            number_of_samples: buf.get_u16_le(),
            available_channels: buf.get_u16_le(),
            active_channels: buf.get_u16_le(),
            channel_mask: get_array(&mut buf, |b| b.get_u64_le()),
            discard_pre: buf.get_u16_le(),
            discard_post: buf.get_u16_le(),
            center_sample: buf.get_u16_le(),
            encoding_space_ref: buf.get_u16_le(),
            trajectory_dimensions: buf.get_u16_le(),
            sample_time_us: buf.get_f32_le(),
            position: get_array(&mut buf, |b| b.get_f32_le()),
            read_dir: get_array(&mut buf, |b| b.get_f32_le()),
            phase_dir: get_array(&mut buf, |b| b.get_f32_le()),
            slice_dir: get_array(&mut buf, |b| b.get_f32_le()),
            patient_table_position: get_array(&mut buf, |b| b.get_f32_le()),
            idx: EncodingCounters::decode_from(&mut buf),
            user_int: get_array(&mut buf, |b| b.get_i32_le()),
            user_float: get_array(&mut buf, |b| b.get_f32_le()),
        })
    }
}

/// One readout: header, trajectory and complex sample data
///
/// `traj` holds `number_of_samples × trajectory_dimensions` values and
/// `data` holds `number_of_samples × active_channels` complex samples,
/// channel-major.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Acquisition {
    pub head: AcquisitionHeader,
    pub traj: Vec<f32>,
    pub data: Vec<Complex32>,
}

impl Acquisition {
    /// Assemble an acquisition, checking payload lengths against the header
    pub fn new(head: AcquisitionHeader, traj: Vec<f32>, data: Vec<Complex32>) -> Result<Self> {
        let acq = Acquisition { head, traj, data };
        acq.validate()?;
        Ok(acq)
    }

    /// Create an acquisition with zero-filled payloads sized from the header
    pub fn zeroed(head: AcquisitionHeader) -> Self {
        Acquisition {
            traj: vec![0.0; head.trajectory_len()],
            data: vec![Complex32::new(0.0, 0.0); head.data_len()],
            head,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.head.validate()?;
        if self.traj.len() != self.head.trajectory_len() {
            return Err(IsmrmrdError::MalformedRecord(format!(
                "Trajectory length: expected {}, got {}",
                self.head.trajectory_len(),
                self.traj.len()
            )));
        }
        if self.data.len() != self.head.data_len() {
            return Err(IsmrmrdError::MalformedRecord(format!(
                "Data length: expected {}, got {}",
                self.head.data_len(),
                self.data.len()
            )));
        }
        Ok(())
    }

    /// Samples of one active channel
    pub fn channel(&self, channel: u16) -> Option<&[Complex32]> {
        if channel >= self.head.active_channels {
            return None;
        }
        let samples = self.head.number_of_samples as usize;
        let start = channel as usize * samples;
        self.data.get(start..start + samples)
    }
}

impl Record for Acquisition {
    fn record_kind() -> RecordKind {
        RecordKind::Acquisition
    }

    fn encode_record(&self) -> Result<Vec<u8>> {
        self.validate()?;

        let mut buf = Vec::with_capacity(
            AcquisitionHeader::SIZE + self.traj.len() * 4 + self.data.len() * 8,
        );
        self.head.encode_into(&mut buf);
        for &t in &self.traj {
            buf.put_f32_le(t);
        }
        // Complex samples are stored as interleaved real/imaginary pairs
        for sample in &self.data {
            buf.put_f32_le(sample.re);
            buf.put_f32_le(sample.im);
        }

        Ok(buf)
    }

    fn decode_record(data: &[u8]) -> Result<Self> {
        if data.len() < AcquisitionHeader::SIZE {
            return Err(IsmrmrdError::MalformedRecord(format!(
                "Acquisition record: expected at least {} bytes, got {}",
                AcquisitionHeader::SIZE,
                data.len()
            )));
        }

        let head = AcquisitionHeader::decode(&data[..AcquisitionHeader::SIZE])?;
        let mut body = &data[AcquisitionHeader::SIZE..];

        let traj_len = head.trajectory_len();
        let data_len = head.data_len();
        check_exact_size("Acquisition payload", traj_len * 4 + data_len * 8, body.len())?;

        let mut traj = Vec::with_capacity(traj_len);
        for _ in 0..traj_len {
            traj.push(body.get_f32_le());
        }
        let mut samples = Vec::with_capacity(data_len);
        for _ in 0..data_len {
            let re = body.get_f32_le();
            let im = body.get_f32_le();
            samples.push(Complex32::new(re, im));
        }

        Ok(Acquisition {
            head,
            traj,
            data: samples,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> AcquisitionHeader {
        AcquisitionHeader {
            measurement_uid: 42,
            scan_counter: 7,
            acquisition_time_stamp: 123456,
            physiology_time_stamp: [1, 2, 3],
            number_of_samples: 8,
            available_channels: 4,
            active_channels: 2,
            discard_pre: 1,
            discard_post: 1,
            center_sample: 4,
            trajectory_dimensions: 2,
            sample_time_us: 2.5,
            position: [1.0, -2.0, 3.5],
            read_dir: [1.0, 0.0, 0.0],
            phase_dir: [0.0, 1.0, 0.0],
            slice_dir: [0.0, 0.0, 1.0],
            patient_table_position: [0.0, 0.0, -100.25],
            user_int: [1, -2, 3, -4, 5, -6, 7, -8],
            user_float: [0.5; USER_FLOATS],
            ..Default::default()
        }
    }

    #[test]
    fn test_header_size() {
        assert_eq!(AcquisitionHeader::SIZE, 340);
        assert_eq!(AcquisitionHeader::default().encode().len(), 340);
    }

    #[test]
    fn test_header_roundtrip() {
        let mut original = sample_header();
        original.idx.kspace_encode_step_1 = 17;
        original.idx.slice = 3;
        original.set_channel_active(0);
        original.set_channel_active(1);

        let encoded = original.encode();
        let decoded = AcquisitionHeader::decode(&encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_all_flags_and_full_channels_roundtrip() {
        let mut head = sample_header();
        head.active_channels = head.available_channels;
        for flag in AcquisitionFlag::ALL {
            head.set_flag(flag);
        }
        head.flags = u64::MAX;

        let decoded = AcquisitionHeader::decode(&head.encode()).unwrap();
        assert_eq!(decoded, head);
        for flag in AcquisitionFlag::ALL {
            assert!(decoded.is_flag_set(flag), "{:?} should be set", flag);
        }
    }

    #[test]
    fn test_decode_wrong_size() {
        let short = vec![0u8; AcquisitionHeader::SIZE - 2];
        assert!(matches!(
            AcquisitionHeader::decode(&short),
            Err(IsmrmrdError::MalformedRecord(_))
        ));

        let long = vec![0u8; AcquisitionHeader::SIZE + 1];
        assert!(matches!(
            AcquisitionHeader::decode(&long),
            Err(IsmrmrdError::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_decode_unknown_version() {
        let mut encoded = AcquisitionHeader::default().encode();
        encoded[0] = 9;
        assert!(matches!(
            AcquisitionHeader::decode(&encoded),
            Err(IsmrmrdError::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_legacy_version_preserved() {
        let head = AcquisitionHeader {
            version: LEGACY_FORMAT_VERSION,
            ..Default::default()
        };
        let decoded = AcquisitionHeader::decode(&head.encode()).unwrap();
        assert_eq!(decoded.version, LEGACY_FORMAT_VERSION);
    }

    #[test]
    fn test_flags_are_independent() {
        let mut head = AcquisitionHeader::default();
        head.set_flag(AcquisitionFlag::FirstInSlice);
        head.set_flag(AcquisitionFlag::LastInSlice);
        assert!(head.is_flag_set(AcquisitionFlag::FirstInSlice));
        assert!(head.is_flag_set(AcquisitionFlag::LastInSlice));

        head.clear_flag(AcquisitionFlag::FirstInSlice);
        assert!(!head.is_flag_set(AcquisitionFlag::FirstInSlice));
        assert!(head.is_flag_set(AcquisitionFlag::LastInSlice));

        head.clear_all_flags();
        assert_eq!(head.flags, 0);
    }

    #[test]
    fn test_channel_mask() {
        let mut head = AcquisitionHeader::default();
        head.set_channel_active(0);
        head.set_channel_active(65);
        assert!(head.is_channel_active(0));
        assert!(head.is_channel_active(65));
        assert!(!head.is_channel_active(64));
        assert_eq!(head.channel_mask[1], 0b10);

        head.set_channel_inactive(65);
        assert!(!head.is_channel_active(65));
        assert!(!head.is_channel_active(5000));
    }

    #[test]
    fn test_invariants() {
        let mut head = sample_header();
        head.active_channels = head.available_channels + 1;
        assert!(matches!(
            head.validate(),
            Err(IsmrmrdError::MalformedRecord(_))
        ));

        let mut head = sample_header();
        head.discard_pre = 5;
        head.discard_post = 4;
        assert!(head.validate().is_err());
    }

    #[test]
    fn test_acquisition_roundtrip() {
        let head = sample_header();
        let traj: Vec<f32> = (0..head.trajectory_len()).map(|i| i as f32 * 0.25).collect();
        let data: Vec<Complex32> = (0..head.data_len())
            .map(|i| Complex32::new(i as f32, -(i as f32)))
            .collect();

        let original = Acquisition::new(head, traj, data).unwrap();
        let encoded = original.encode_record().unwrap();
        assert_eq!(
            encoded.len(),
            AcquisitionHeader::SIZE + 16 * 4 + 16 * 8
        );

        let decoded = Acquisition::decode_record(&encoded).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(decoded.channel(1).unwrap()[0], Complex32::new(8.0, -8.0));
        assert!(decoded.channel(2).is_none());
    }

    #[test]
    fn test_payload_length_mismatch() {
        let head = sample_header();
        let result = Acquisition::new(head, vec![0.0; 3], Vec::new());
        assert!(matches!(result, Err(IsmrmrdError::MalformedRecord(_))));

        let acq = Acquisition::zeroed(head);
        let mut encoded = acq.encode_record().unwrap();
        encoded.truncate(encoded.len() - 4);
        assert!(matches!(
            Acquisition::decode_record(&encoded),
            Err(IsmrmrdError::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_zeroed_sizes() {
        let acq = Acquisition::zeroed(sample_header());
        assert_eq!(acq.traj.len(), 16);
        assert_eq!(acq.data.len(), 16);
        assert!(acq.validate().is_ok());
    }
}
