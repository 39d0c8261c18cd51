//! Fixed-width key types.

use bytemuck::Pod;
use byteorder::{LittleEndian, WriteBytesExt};
use std::fmt::{Debug, Display};
use std::io::Write;
use std::str::FromStr;

/// Width of the keys stored in a data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyWidth {
    /// 4-byte unsigned keys
    U32,
    /// 8-byte unsigned keys
    U64,
}

impl KeyWidth {
    /// Size of one key in bytes.
    pub const fn bytes(self) -> usize {
        match self {
            Self::U32 => 4,
            Self::U64 => 8,
        }
    }

    /// Infer the key width from a data file name.
    ///
    /// Benchmark datasets carry their type in the name (`books_200M_uint32`).
    /// Anything without a `uint32` marker is treated as 64-bit.
    pub fn from_file_name(name: &str) -> Self {
        if name.contains("uint32") {
            Self::U32
        } else {
            Self::U64
        }
    }
}

impl Display for KeyWidth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::U32 => f.write_str("uint32"),
            Self::U64 => f.write_str("uint64"),
        }
    }
}

/// An unsigned integer key that can live in a [`KeyStore`](crate::KeyStore).
pub trait Key:
    Pod + Ord + Copy + Debug + Display + FromStr + Send + Sync + 'static
{
    /// Width tag for this key type.
    const WIDTH: KeyWidth;

    /// Widen to `u64`, the input type of position oracles.
    fn to_u64(self) -> u64;

    /// Narrow from `u64`, failing if the value does not fit.
    fn from_u64(value: u64) -> Option<Self>;

    /// Write the key in little-endian byte order.
    fn write_le<W: Write>(self, writer: &mut W) -> std::io::Result<()>;
}

impl Key for u32 {
    const WIDTH: KeyWidth = KeyWidth::U32;

    #[inline]
    fn to_u64(self) -> u64 {
        u64::from(self)
    }

    fn from_u64(value: u64) -> Option<Self> {
        Self::try_from(value).ok()
    }

    fn write_le<W: Write>(self, writer: &mut W) -> std::io::Result<()> {
        writer.write_u32::<LittleEndian>(self)
    }
}

impl Key for u64 {
    const WIDTH: KeyWidth = KeyWidth::U64;

    #[inline]
    fn to_u64(self) -> u64 {
        self
    }

    fn from_u64(value: u64) -> Option<Self> {
        Some(value)
    }

    fn write_le<W: Write>(self, writer: &mut W) -> std::io::Result<()> {
        writer.write_u64::<LittleEndian>(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_from_file_name() {
        assert_eq!(KeyWidth::from_file_name("books_200M_uint32"), KeyWidth::U32);
        assert_eq!(KeyWidth::from_file_name("osm_cellids_800M_uint64"), KeyWidth::U64);
        assert_eq!(KeyWidth::from_file_name("keys.bin"), KeyWidth::U64);
    }

    #[test]
    fn test_write_le() {
        let mut buf = Vec::new();
        0x0102_0304u32.write_le(&mut buf).unwrap();
        assert_eq!(buf, [4, 3, 2, 1]);

        buf.clear();
        1u64.write_le(&mut buf).unwrap();
        assert_eq!(buf, [1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(<u64 as Key>::WIDTH.bytes(), 8);
    }

    #[test]
    fn test_from_u64() {
        assert_eq!(u32::from_u64(7), Some(7));
        assert_eq!(u32::from_u64(u64::from(u32::MAX) + 1), None);
        assert_eq!(u64::from_u64(u64::MAX), Some(u64::MAX));
    }
}
