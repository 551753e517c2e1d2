//! Acquisition and image flag bits
//!
//! Flags are a 64-bit bitmask where bit `n` (1-based) is tested as
//! `(flags >> (n - 1)) & 1`. Several bits are usually set at once, so a flag
//! is never compared by equality against the whole mask.

/// Test a 1-based flag bit
pub fn is_flag_set(flags: u64, bit: u8) -> bool {
    debug_assert!((1..=64).contains(&bit));
    (flags >> (bit - 1)) & 1 == 1
}

/// Set a 1-based flag bit
pub fn set_flag(flags: u64, bit: u8) -> u64 {
    debug_assert!((1..=64).contains(&bit));
    flags | (1u64 << (bit - 1))
}

/// Clear a 1-based flag bit
pub fn clear_flag(flags: u64, bit: u8) -> u64 {
    debug_assert!((1..=64).contains(&bit));
    flags & !(1u64 << (bit - 1))
}

/// Named acquisition flag bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AcquisitionFlag {
    FirstInEncodeStep1 = 1,
    LastInEncodeStep1 = 2,
    FirstInEncodeStep2 = 3,
    LastInEncodeStep2 = 4,
    FirstInAverage = 5,
    LastInAverage = 6,
    FirstInSlice = 7,
    LastInSlice = 8,
    FirstInContrast = 9,
    LastInContrast = 10,
    FirstInPhase = 11,
    LastInPhase = 12,
    FirstInRepetition = 13,
    LastInRepetition = 14,
    FirstInSet = 15,
    LastInSet = 16,
    FirstInSegment = 17,
    LastInSegment = 18,
    IsNoiseMeasurement = 19,
    IsParallelCalibration = 20,
    IsParallelCalibrationAndImaging = 21,
    IsReverse = 22,
    IsNavigationData = 23,
    IsPhasecorrData = 24,
    LastInMeasurement = 25,
    IsHpfeedbackData = 26,
    IsDummyscanData = 27,
    IsRtfeedbackData = 28,
    IsSurfacecoilcorrectionscanData = 29,
    User1 = 57,
    User2 = 58,
    User3 = 59,
    User4 = 60,
    User5 = 61,
    User6 = 62,
    User7 = 63,
    User8 = 64,
}

impl AcquisitionFlag {
    /// Every named acquisition flag, in bit order
    pub const ALL: [AcquisitionFlag; 37] = [
        AcquisitionFlag::FirstInEncodeStep1,
        AcquisitionFlag::LastInEncodeStep1,
        AcquisitionFlag::FirstInEncodeStep2,
        AcquisitionFlag::LastInEncodeStep2,
        AcquisitionFlag::FirstInAverage,
        AcquisitionFlag::LastInAverage,
        AcquisitionFlag::FirstInSlice,
        AcquisitionFlag::LastInSlice,
        AcquisitionFlag::FirstInContrast,
        AcquisitionFlag::LastInContrast,
        AcquisitionFlag::FirstInPhase,
        AcquisitionFlag::LastInPhase,
        AcquisitionFlag::FirstInRepetition,
        AcquisitionFlag::LastInRepetition,
        AcquisitionFlag::FirstInSet,
        AcquisitionFlag::LastInSet,
        AcquisitionFlag::FirstInSegment,
        AcquisitionFlag::LastInSegment,
        AcquisitionFlag::IsNoiseMeasurement,
        AcquisitionFlag::IsParallelCalibration,
        AcquisitionFlag::IsParallelCalibrationAndImaging,
        AcquisitionFlag::IsReverse,
        AcquisitionFlag::IsNavigationData,
        AcquisitionFlag::IsPhasecorrData,
        AcquisitionFlag::LastInMeasurement,
        AcquisitionFlag::IsHpfeedbackData,
        AcquisitionFlag::IsDummyscanData,
        AcquisitionFlag::IsRtfeedbackData,
        AcquisitionFlag::IsSurfacecoilcorrectionscanData,
        AcquisitionFlag::User1,
        AcquisitionFlag::User2,
        AcquisitionFlag::User3,
        AcquisitionFlag::User4,
        AcquisitionFlag::User5,
        AcquisitionFlag::User6,
        AcquisitionFlag::User7,
        AcquisitionFlag::User8,
    ];

    /// 1-based bit position
    pub fn bit(self) -> u8 {
        self as u8
    }

    /// Single-bit mask for this flag
    pub fn mask(self) -> u64 {
        1u64 << (self.bit() - 1)
    }
}

/// Named image flag bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ImageFlag {
    IsNavigationData = 1,
    User1 = 57,
    User2 = 58,
    User3 = 59,
    User4 = 60,
    User5 = 61,
    User6 = 62,
    User7 = 63,
    User8 = 64,
}

impl ImageFlag {
    /// Every named image flag, in bit order
    pub const ALL: [ImageFlag; 9] = [
        ImageFlag::IsNavigationData,
        ImageFlag::User1,
        ImageFlag::User2,
        ImageFlag::User3,
        ImageFlag::User4,
        ImageFlag::User5,
        ImageFlag::User6,
        ImageFlag::User7,
        ImageFlag::User8,
    ];

    /// 1-based bit position
    pub fn bit(self) -> u8 {
        self as u8
    }

    /// Single-bit mask for this flag
    pub fn mask(self) -> u64 {
        1u64 << (self.bit() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_positions() {
        assert_eq!(AcquisitionFlag::FirstInEncodeStep1.mask(), 1);
        assert_eq!(AcquisitionFlag::FirstInSlice.mask(), 1 << 6);
        assert_eq!(AcquisitionFlag::LastInSlice.mask(), 1 << 7);
        assert_eq!(AcquisitionFlag::IsNoiseMeasurement.bit(), 19);
        assert_eq!(AcquisitionFlag::User8.mask(), 1 << 63);
        assert_eq!(ImageFlag::User1.bit(), 57);
    }

    #[test]
    fn test_set_and_clear() {
        let mut flags = 0u64;
        flags = set_flag(flags, AcquisitionFlag::FirstInSlice.bit());
        flags = set_flag(flags, AcquisitionFlag::IsNoiseMeasurement.bit());

        assert!(is_flag_set(flags, AcquisitionFlag::FirstInSlice.bit()));
        assert!(is_flag_set(flags, AcquisitionFlag::IsNoiseMeasurement.bit()));
        assert!(!is_flag_set(flags, AcquisitionFlag::LastInSlice.bit()));

        flags = clear_flag(flags, AcquisitionFlag::FirstInSlice.bit());
        assert!(!is_flag_set(flags, AcquisitionFlag::FirstInSlice.bit()));
        assert!(is_flag_set(flags, AcquisitionFlag::IsNoiseMeasurement.bit()));
    }

    #[test]
    fn test_all_flags_distinct() {
        let combined = AcquisitionFlag::ALL
            .iter()
            .fold(0u64, |acc, flag| acc | flag.mask());
        assert_eq!(combined.count_ones() as usize, AcquisitionFlag::ALL.len());
    }

    #[test]
    fn test_highest_bit() {
        let flags = set_flag(0, 64);
        assert_eq!(flags, 0x8000_0000_0000_0000);
        assert!(is_flag_set(flags, 64));
        assert!(!is_flag_set(flags, 63));
    }
}
