use half::f16;
use std::fmt;

/// Supported element types for tensor storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// 32-bit floating point.
    F32,
    /// 16-bit floating point (IEEE 754 half-precision, via the `half` crate).
    F16,
}

impl DType {
    /// Size in bytes of a single element.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::F32 => 4,
            DType::F16 => 2,
        }
    }

    /// Reads the element starting at `byte_offset` as f32.
    ///
    /// F16 elements are widened; every kernel and accessor computes in f32
    /// and converts at the storage boundary.
    ///
    /// # Panics
    /// Panics if the element extends past the end of `bytes`.
    pub fn load(&self, bytes: &[u8], byte_offset: usize) -> f32 {
        match self {
            DType::F32 => f32::from_le_bytes(
                bytes[byte_offset..byte_offset + 4]
                    .try_into()
                    .expect("element range is 4 bytes"),
            ),
            DType::F16 => f16::from_le_bytes(
                bytes[byte_offset..byte_offset + 2]
                    .try_into()
                    .expect("element range is 2 bytes"),
            )
            .to_f32(),
        }
    }

    /// Writes `value` as one element starting at `byte_offset`, converting
    /// to this dtype (F16 rounds to nearest-even).
    ///
    /// # Panics
    /// Panics if the element extends past the end of `bytes`.
    pub fn store(&self, bytes: &mut [u8], byte_offset: usize, value: f32) {
        match self {
            DType::F32 => {
                bytes[byte_offset..byte_offset + 4].copy_from_slice(&value.to_le_bytes());
            }
            DType::F16 => {
                bytes[byte_offset..byte_offset + 2]
                    .copy_from_slice(&f16::from_f32(value).to_le_bytes());
            }
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::F32 => write!(f, "f32"),
            DType::F16 => write!(f, "f16"),
        }
    }
}
