//! Encoding counters shared by acquisition headers

use crate::record::{get_array, USER_INTS};
use bytes::{Buf, BufMut};

/// Position of one readout within the encoding loops
///
/// # Layout (34 bytes, little-endian)
/// - KSPACE_ENCODE_STEP_1, KSPACE_ENCODE_STEP_2, AVERAGE, SLICE, CONTRAST,
///   PHASE, REPETITION, SET, SEGMENT: u16 each
/// - USER: `u16[8]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodingCounters {
    /// Phase encoding line number
    pub kspace_encode_step_1: u16,
    /// Partition encoding number
    pub kspace_encode_step_2: u16,
    pub average: u16,
    pub slice: u16,
    pub contrast: u16,
    pub phase: u16,
    pub repetition: u16,
    pub set: u16,
    pub segment: u16,
    /// Free user parameters
    pub user: [u16; USER_INTS],
}

impl EncodingCounters {
    /// Encoded size in bytes
    pub const SIZE: usize = 9 * 2 + USER_INTS * 2;

    pub(crate) fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.put_u16_le(self.kspace_encode_step_1);
        buf.put_u16_le(self.kspace_encode_step_2);
        buf.put_u16_le(self.average);
        buf.put_u16_le(self.slice);
        buf.put_u16_le(self.contrast);
        buf.put_u16_le(self.phase);
        buf.put_u16_le(self.repetition);
        buf.put_u16_le(self.set);
        buf.put_u16_le(self.segment);
        for &u in &self.user {
            buf.put_u16_le(u);
        }
    }

    /// Caller guarantees at least `SIZE` bytes remain
    pub(crate) fn decode_from(buf: &mut &[u8]) -> Self {
        EncodingCounters {
            kspace_encode_step_1: buf.get_u16_le(),
            kspace_encode_step_2: buf.get_u16_le(),
            average: buf.get_u16_le(),
            slice: buf.get_u16_le(),
            contrast: buf.get_u16_le(),
            phase: buf.get_u16_le(),
            repetition: buf.get_u16_le(),
            set: buf.get_u16_le(),
            segment: buf.get_u16_le(),
            user: get_array(buf, |b| b.get_u16_le()),
        }
    }
}
