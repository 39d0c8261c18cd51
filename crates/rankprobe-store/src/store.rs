//! Key store and rank queries.

use crate::file::HEADER_LEN;
use crate::{Key, Result, StoreError};
use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Outcome of a rank query.
///
/// The raw benchmark output encodes a miss as the store length. Use
/// [`RankResult::to_sentinel`] and [`RankResult::from_sentinel`] to convert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RankResult {
    /// The key is stored at this index, and it is the first occurrence within
    /// the searched range.
    Found(usize),
    /// The key is not present in the searched range.
    NotFound,
}

impl RankResult {
    /// Index of the match, if any.
    #[inline]
    pub const fn index(self) -> Option<usize> {
        match self {
            Self::Found(i) => Some(i),
            Self::NotFound => None,
        }
    }

    /// Whether the key was found.
    #[inline]
    pub const fn is_found(self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Encode as a raw rank where `len` means "not found".
    #[inline]
    pub const fn to_sentinel(self, len: usize) -> usize {
        match self {
            Self::Found(i) => i,
            Self::NotFound => len,
        }
    }

    /// Decode a raw rank where any value `>= len` means "not found".
    #[inline]
    pub const fn from_sentinel(raw: usize, len: usize) -> Self {
        if raw < len {
            Self::Found(raw)
        } else {
            Self::NotFound
        }
    }
}

/// Storage behind a key store.
enum Backing<K: Key> {
    Owned(Vec<K>),
    Mapped {
        map: Mmap,
        /// Kept open for the lifetime of the mapping and closed with it
        _file: File,
        /// Byte offset of the first key
        offset: usize,
    },
    Released,
}

/// An immutable, sorted array of keys.
///
/// The keys never change after construction. A mapped store holds both the
/// mapping and the file descriptor; both are released together by
/// [`KeyStore::close`] or on drop, on every path out of the constructors.
///
/// Query methods take `&self` and perform no system calls, so one store can
/// be shared across threads.
pub struct KeyStore<K: Key> {
    backing: Backing<K>,
    len: usize,
    source: Option<PathBuf>,
}

impl<K: Key> KeyStore<K> {
    /// Wrap an in-memory key vector.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unsorted` if the keys are not non-decreasing.
    pub fn from_vec(keys: Vec<K>) -> Result<Self> {
        if let Some(index) = keys.windows(2).position(|w| w[1] < w[0]) {
            return Err(StoreError::Unsorted { index: index + 1 });
        }

        Ok(Self {
            len: keys.len(),
            backing: Backing::Owned(keys),
            source: None,
        })
    }

    /// Map a counted data file (`[count: u64][keys...]`) read-only.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the file cannot be opened, inspected or
    /// mapped, and `StoreError::Format` if the header disagrees with the
    /// file size.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let (file, map) = map_file(path)?;

        if map.len() < HEADER_LEN {
            return Err(format_error(
                path,
                format!("{} bytes is too short for the key count header", map.len()),
            ));
        }

        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&map[..HEADER_LEN]);
        let declared = u64::from_le_bytes(header);
        let len = usize::try_from(declared).map_err(|_| {
            format_error(path, format!("key count {declared} does not fit in memory"))
        })?;

        Self::from_mapping(path, file, map, HEADER_LEN, len)
    }

    /// Map a headerless data file whose key count is known out of band.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the file cannot be mapped and
    /// `StoreError::Format` if fewer than `len` keys fit in the file.
    pub fn open_headerless(path: impl AsRef<Path>, len: usize) -> Result<Self> {
        let path = path.as_ref();
        let (file, map) = map_file(path)?;
        Self::from_mapping(path, file, map, 0, len)
    }

    fn from_mapping(path: &Path, file: File, map: Mmap, offset: usize, len: usize) -> Result<Self> {
        let width = K::WIDTH.bytes();
        let end = len
            .checked_mul(width)
            .and_then(|bytes| bytes.checked_add(offset))
            .ok_or_else(|| format_error(path, format!("{len} keys overflow the address space")))?;

        if end > map.len() {
            return Err(format_error(
                path,
                format!(
                    "{len} {} keys need {end} bytes but the file has {}",
                    K::WIDTH,
                    map.len()
                ),
            ));
        }

        if let Err(e) = bytemuck::try_cast_slice::<u8, K>(&map[offset..end]) {
            return Err(format_error(path, format!("key array is not castable: {e:?}")));
        }

        info!(
            "Mapped {} {} keys from {} ({} bytes)",
            len,
            K::WIDTH,
            path.display(),
            map.len()
        );

        Ok(Self {
            backing: Backing::Mapped {
                map,
                _file: file,
                offset,
            },
            len,
            source: Some(path.to_path_buf()),
        })
    }

    /// Number of keys. Zero once the store has been closed.
    #[inline]
    pub const fn size(&self) -> usize {
        self.len
    }

    /// Whether the store holds no keys.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// File the store was mapped from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Whether the backing memory is a file mapping.
    pub const fn is_mapped(&self) -> bool {
        matches!(self.backing, Backing::Mapped { .. })
    }

    /// The full key slice.
    #[inline]
    pub fn keys(&self) -> &[K] {
        match &self.backing {
            Backing::Owned(keys) => keys,
            Backing::Mapped { map, offset, .. } => {
                let end = offset + self.len * K::WIDTH.bytes();
                // Length and alignment were checked when the mapping was created.
                bytemuck::cast_slice(&map[*offset..end])
            }
            Backing::Released => &[],
        }
    }

    /// Key at `index`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::OutOfRange` if `index >= size()`. Debug builds also
    /// log the violation, since index arithmetic in the search paths is
    /// clamped and should never reach this.
    #[inline]
    pub fn at(&self, index: usize) -> Result<K> {
        if let Some(key) = self.keys().get(index) {
            return Ok(*key);
        }

        #[cfg(debug_assertions)]
        tracing::error!(index, len = self.len, "key store index out of range");

        Err(StoreError::OutOfRange {
            index,
            len: self.len,
        })
    }

    /// First index holding `key`, searching the whole store.
    #[inline]
    pub fn rank(&self, key: K) -> RankResult {
        self.rank_within(key, 0, self.len)
    }

    /// First index in `[lo, min(hi, size()))` holding `key`.
    ///
    /// This is a lower-bound search: it locates the first index in the window
    /// whose key is `>= key` and reports it only on equality. Matches outside
    /// the window are never reported. Inverted or out-of-range windows are
    /// clamped to an empty range.
    #[inline]
    pub fn rank_within(&self, key: K, lo: usize, hi: usize) -> RankResult {
        let keys = self.keys();
        let hi = hi.min(keys.len());
        let lo = lo.min(hi);

        let idx = lo + keys[lo..hi].partition_point(|k| *k < key);
        if idx < hi && keys[idx] == key {
            RankResult::Found(idx)
        } else {
            RankResult::NotFound
        }
    }

    /// Whether the keys are non-decreasing. Runs in `O(n)`.
    pub fn is_sorted(&self) -> bool {
        self.keys().windows(2).all(|w| w[0] <= w[1])
    }

    /// Release the mapping and file descriptor.
    ///
    /// Afterwards the store is empty. Calling this again is a no-op.
    pub fn close(&mut self) {
        if matches!(self.backing, Backing::Released) {
            return;
        }

        if let Some(path) = &self.source {
            debug!("Releasing key store mapped from {}", path.display());
        }
        self.backing = Backing::Released;
        self.len = 0;
    }

    /// Whether [`KeyStore::close`] has been called.
    pub const fn is_closed(&self) -> bool {
        matches!(self.backing, Backing::Released)
    }
}

impl<K: Key> std::fmt::Debug for KeyStore<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("width", &K::WIDTH)
            .field("len", &self.len)
            .field("mapped", &self.is_mapped())
            .field("source", &self.source)
            .finish()
    }
}

fn map_file(path: &Path) -> Result<(File, Mmap)> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_err)?;
    let file_len = file.metadata().map_err(io_err)?.len();
    debug!("Mapping {} ({} bytes)", path.display(), file_len);

    // The descriptor is dropped on the error path before the error propagates.
    #[allow(unsafe_code)]
    let map = unsafe { MmapOptions::new().map(&file) }.map_err(io_err)?;

    Ok((file, map))
}

fn format_error(path: &Path, reason: String) -> StoreError {
    StoreError::Format {
        path: path.to_path_buf(),
        reason,
    }
}
