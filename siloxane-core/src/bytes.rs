use std::fmt;
use std::str::FromStr;

/// A fixed-width byte array.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FixedBytes<const N: usize>(pub [u8; N]);

pub type Bytes20 = FixedBytes<20>;
pub type Bytes32 = FixedBytes<32>;
pub type Bytes48 = FixedBytes<48>;

impl<const N: usize> FixedBytes<N> {
    pub const ZERO: Self = FixedBytes([0u8; N]);

    pub const fn new(bytes: [u8; N]) -> Self {
        FixedBytes(bytes)
    }

    /// Copies a slice of exactly `N` bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; N]>::try_from(bytes).ok().map(FixedBytes)
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl<const N: usize> Default for FixedBytes<N> {
    fn default() -> Self {
        Self::ZERO
    }
}

impl<const N: usize> From<[u8; N]> for FixedBytes<N> {
    fn from(bytes: [u8; N]) -> Self {
        FixedBytes(bytes)
    }
}

impl<const N: usize> AsRef<[u8]> for FixedBytes<N> {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Error parsing a hex string into fixed-width bytes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseBytesError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
}

impl<const N: usize> FromStr for FixedBytes<N> {
    type Err = ParseBytesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits)?;
        FixedBytes::from_slice(&bytes).ok_or(ParseBytesError::Length {
            expected: N,
            actual: bytes.len(),
        })
    }
}

impl<const N: usize> fmt::Debug for FixedBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bytes{N}(0x{})", hex::encode(self.0))
    }
}

impl<const N: usize> fmt::Display for FixedBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// An unsigned 256-bit integer, stored as 32 little-endian bytes.
///
/// Only construction and byte conversion are provided; arithmetic is the
/// caller's concern.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Uint256([u8; 32]);

impl Uint256 {
    pub const ZERO: Uint256 = Uint256([0u8; 32]);
    pub const MAX: Uint256 = Uint256([0xff; 32]);

    pub const fn from_le_bytes(bytes: [u8; 32]) -> Self {
        Uint256(bytes)
    }

    pub fn from_be_bytes(mut bytes: [u8; 32]) -> Self {
        bytes.reverse();
        Uint256(bytes)
    }

    pub fn to_le_bytes(self) -> [u8; 32] {
        self.0
    }

    pub fn to_be_bytes(self) -> [u8; 32] {
        let mut bytes = self.0;
        bytes.reverse();
        bytes
    }

    /// Returns the value if it fits in a `u64`.
    pub fn to_u64(self) -> Option<u64> {
        if self.0[8..].iter().any(|&b| b != 0) {
            return None;
        }
        let mut low = [0u8; 8];
        low.copy_from_slice(&self.0[..8]);
        Some(u64::from_le_bytes(low))
    }
}

impl From<u64> for Uint256 {
    fn from(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&value.to_le_bytes());
        Uint256(bytes)
    }
}

impl From<u128> for Uint256 {
    fn from(value: u128) -> Self {
        let mut bytes = [0u8; 32];
        bytes[..16].copy_from_slice(&value.to_le_bytes());
        Uint256(bytes)
    }
}

impl fmt::Debug for Uint256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uint256({self})")
    }
}

impl fmt::Display for Uint256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let be = self.to_be_bytes();
        let digits = hex::encode(be);
        let trimmed = digits.trim_start_matches('0');
        if trimmed.is_empty() {
            f.write_str("0x0")
        } else {
            write!(f, "0x{trimmed}")
        }
    }
}
