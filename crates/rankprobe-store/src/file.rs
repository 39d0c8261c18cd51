//! Data file writer.

use crate::{Key, Result, StoreError};
use byteorder::{LittleEndian, WriteBytesExt};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Size of the leading key count in the counted layout.
pub const HEADER_LEN: usize = 8;

/// On-disk arrangement of a data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `[count: u64][keys...]`
    Counted,
    /// `[keys...]`, the reader supplies the count
    Headerless,
}

/// Write `keys` to `path` in the given layout.
///
/// # Errors
///
/// Returns `StoreError::Unsorted` if the keys are not non-decreasing and
/// `StoreError::Io` if the file cannot be written.
pub fn write_key_file<K: Key>(path: impl AsRef<Path>, keys: &[K], layout: Layout) -> Result<()> {
    let path = path.as_ref();

    if let Some(index) = keys.windows(2).position(|w| w[1] < w[0]) {
        return Err(StoreError::Unsorted { index: index + 1 });
    }

    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);

    if layout == Layout::Counted {
        writer
            .write_u64::<LittleEndian>(keys.len() as u64)
            .map_err(io_err)?;
    }
    for key in keys {
        key.write_le(&mut writer).map_err(io_err)?;
    }
    writer.flush().map_err(io_err)?;

    debug!(
        "Wrote {} {} keys to {} ({:?})",
        keys.len(),
        K::WIDTH,
        path.display(),
        layout
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_counted_file_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys_uint32");
        write_key_file(&path, &[1u32, 2, 2], Layout::Counted).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + 3 * 4);
        assert_eq!(&bytes[..8], &3u64.to_le_bytes());
        assert_eq!(&bytes[8..12], &1u32.to_le_bytes());
    }

    #[test]
    fn test_headerless_file_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys_uint64");
        write_key_file(&path, &[5u64, 9], Layout::Headerless).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[8..], &9u64.to_le_bytes());
    }

    #[test]
    fn test_rejects_unsorted() {
        let dir = tempdir().unwrap();
        let err = write_key_file(dir.path().join("bad"), &[3u64, 1], Layout::Counted).unwrap_err();
        assert!(matches!(err, StoreError::Unsorted { index: 1 }));
    }
}
