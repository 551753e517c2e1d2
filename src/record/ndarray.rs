//! Generic N-dimensional arrays
//!
//! # Layout (little-endian)
//! - VERSION: u16, DATA_TYPE: u16, NDIM: u16
//! - DIMS: `u64[NDIM]`
//! - DATA: product(DIMS) elements of DATA_TYPE, raw bytes

use crate::error::{IsmrmrdError, Result};
use crate::record::{DataType, Record, RecordKind, FORMAT_VERSION, NDARRAY_MAXDIM};
use bytes::{Buf, BufMut};

/// Array of up to seven dimensions with a typed element tag
#[derive(Debug, Clone, PartialEq)]
pub struct NdArray {
    pub version: u16,
    pub data_type: DataType,
    /// Extent of each dimension, fastest varying first
    pub dims: Vec<u64>,
    pub data: Vec<u8>,
}

impl NdArray {
    /// Fixed part of the encoded array, before the dimensions
    const PREFIX_SIZE: usize = 6;

    /// Create an array, checking dimensions and payload size
    pub fn new(data_type: DataType, dims: Vec<u64>, data: Vec<u8>) -> Result<Self> {
        let array = NdArray {
            version: FORMAT_VERSION,
            data_type,
            dims,
            data,
        };
        array.validate()?;
        Ok(array)
    }

    /// Create a zero-filled array
    pub fn zeroed(data_type: DataType, dims: Vec<u64>) -> Result<Self> {
        let size = data_size(data_type, &dims)?;
        Self::new(data_type, dims, vec![0; size])
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements
    pub fn element_count(&self) -> Result<u64> {
        element_count(&self.dims)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dims.len() > NDARRAY_MAXDIM {
            return Err(IsmrmrdError::MalformedRecord(format!(
                "Array has {} dimensions, at most {} allowed",
                self.dims.len(),
                NDARRAY_MAXDIM
            )));
        }
        let expected = data_size(self.data_type, &self.dims)?;
        if self.data.len() != expected {
            return Err(IsmrmrdError::MalformedRecord(format!(
                "Array data: expected {} bytes, got {}",
                expected,
                self.data.len()
            )));
        }
        Ok(())
    }
}

fn element_count(dims: &[u64]) -> Result<u64> {
    dims.iter()
        .try_fold(1u64, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| IsmrmrdError::MalformedRecord("Array dimensions overflow".to_string()))
}

fn data_size(data_type: DataType, dims: &[u64]) -> Result<usize> {
    element_count(dims)?
        .checked_mul(data_type.size() as u64)
        .and_then(|size| usize::try_from(size).ok())
        .ok_or_else(|| IsmrmrdError::MalformedRecord("Array size overflow".to_string()))
}

impl Record for NdArray {
    fn record_kind() -> RecordKind {
        RecordKind::Array
    }

    fn encode_record(&self) -> Result<Vec<u8>> {
        self.validate()?;

        let mut buf =
            Vec::with_capacity(Self::PREFIX_SIZE + self.dims.len() * 8 + self.data.len());
        buf.put_u16_le(self.version);
        buf.put_u16_le(self.data_type as u16);
        buf.put_u16_le(self.dims.len() as u16);
        for &d in &self.dims {
            buf.put_u64_le(d);
        }
        buf.extend_from_slice(&self.data);
        Ok(buf)
    }

    fn decode_record(data: &[u8]) -> Result<Self> {
        if data.len() < Self::PREFIX_SIZE {
            return Err(IsmrmrdError::MalformedRecord(format!(
                "Array: expected at least {} bytes, got {}",
                Self::PREFIX_SIZE,
                data.len()
            )));
        }

        let mut buf = data;
        let version = buf.get_u16_le();
        let data_type = DataType::from_u16(buf.get_u16_le())?;
        let ndim = buf.get_u16_le() as usize;
        if ndim > NDARRAY_MAXDIM {
            return Err(IsmrmrdError::MalformedRecord(format!(
                "Array has {} dimensions, at most {} allowed",
                ndim, NDARRAY_MAXDIM
            )));
        }
        if buf.remaining() < ndim * 8 {
            return Err(IsmrmrdError::MalformedRecord(
                "Array dimensions truncated".to_string(),
            ));
        }

        let dims: Vec<u64> = (0..ndim).map(|_| buf.get_u64_le()).collect();
        let array = NdArray {
            version,
            data_type,
            dims,
            data: buf.to_vec(),
        };
        array.validate()?;
        Ok(array)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let data: Vec<u8> = (0..48).collect();
        let array = NdArray::new(DataType::Short, vec![4, 3, 2], data).unwrap();
        assert_eq!(array.element_count().unwrap(), 24);

        let encoded = array.encode_record().unwrap();
        assert_eq!(encoded.len(), 6 + 3 * 8 + 48);
        assert_eq!(&encoded[4..6], &[3, 0]);

        let decoded = NdArray::decode_record(&encoded).unwrap();
        assert_eq!(decoded, array);
    }

    #[test]
    fn test_too_many_dimensions() {
        let result = NdArray::zeroed(DataType::Float, vec![1; 8]);
        assert!(matches!(result, Err(IsmrmrdError::MalformedRecord(_))));

        assert!(NdArray::zeroed(DataType::Float, vec![1; 7]).is_ok());
    }

    #[test]
    fn test_size_mismatch() {
        let result = NdArray::new(DataType::CxDouble, vec![2], vec![0; 16]);
        assert!(matches!(result, Err(IsmrmrdError::MalformedRecord(_))));
    }

    #[test]
    fn test_truncated_decode() {
        let array = NdArray::zeroed(DataType::Int, vec![5, 5]).unwrap();
        let encoded = array.encode_record().unwrap();

        assert!(NdArray::decode_record(&encoded[..4]).is_err());
        assert!(NdArray::decode_record(&encoded[..10]).is_err());
        assert!(NdArray::decode_record(&encoded[..encoded.len() - 1]).is_err());
    }

    #[test]
    fn test_scalar_array() {
        // No dimensions means a single element
        let array = NdArray::zeroed(DataType::Double, Vec::new()).unwrap();
        assert_eq!(array.ndim(), 0);
        assert_eq!(array.data.len(), 8);
    }
}
