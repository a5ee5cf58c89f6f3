//! Fixed-size shared byte regions
//!
//! Every frame-store field that is exported is backed by a [`Region`]. The
//! capture path and any number of external readers/writers access a region
//! concurrently with no lock: each byte is an `AtomicU8` accessed with
//! relaxed ordering, so access is memory safe but a multi-byte value (an
//! array element, a frame) can be observed half-written.

use std::sync::atomic::{AtomicU8, Ordering};

use bytes::Bytes;

use crate::error::{DebugfsError, Result};

/// A fixed-size, unsynchronized, shareable byte region
pub struct Region {
    bytes: Box<[AtomicU8]>,
}

impl Region {
    /// Allocate a zeroed region, reporting allocation failure
    pub fn try_zeroed(what: &'static str, size: usize) -> Result<Self> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(size)
            .map_err(|_| DebugfsError::AllocationFailure { what, size })?;
        bytes.resize_with(size, || AtomicU8::new(0));

        Ok(Self {
            bytes: bytes.into_boxed_slice(),
        })
    }

    /// Allocate a small zeroed region (fixed-size metadata fields)
    pub(crate) fn zeroed(size: usize) -> Self {
        Self {
            bytes: (0..size).map(|_| AtomicU8::new(0)).collect(),
        }
    }

    /// Declared size of the region in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the region is zero-sized
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Copy bytes starting at `offset` into `buf`
    ///
    /// Returns the number of bytes copied, `min(buf.len(), len - offset)`,
    /// or 0 when `offset` is at or past the end.
    pub fn read_into(&self, offset: usize, buf: &mut [u8]) -> usize {
        let Some(src) = self.bytes.get(offset..) else {
            return 0;
        };
        let n = buf.len().min(src.len());
        for (dst, byte) in buf[..n].iter_mut().zip(src) {
            *dst = byte.load(Ordering::Relaxed);
        }
        n
    }

    /// Read up to `len` bytes starting at `offset`
    pub fn read_at(&self, offset: usize, len: usize) -> Bytes {
        let available = self.len().saturating_sub(offset);
        let mut buf = vec![0u8; len.min(available)];
        let n = self.read_into(offset, &mut buf);
        buf.truncate(n);
        Bytes::from(buf)
    }

    /// Overwrite bytes starting at `offset` with `data`
    ///
    /// Copies `min(data.len(), len - offset)` bytes; everything outside the
    /// written range keeps its previous contents.
    pub fn write_at(&self, offset: usize, data: &[u8]) -> usize {
        let Some(dst) = self.bytes.get(offset..) else {
            return 0;
        };
        let n = data.len().min(dst.len());
        for (byte, value) in dst[..n].iter().zip(data) {
            byte.store(*value, Ordering::Relaxed);
        }
        n
    }

    /// Copy the whole region out
    pub fn to_bytes(&self) -> Bytes {
        self.read_at(0, self.len())
    }

    /// Load a single byte
    pub fn load_u8(&self, offset: usize) -> Option<u8> {
        self.bytes.get(offset).map(|b| b.load(Ordering::Relaxed))
    }

    /// Store a single byte
    pub fn store_u8(&self, offset: usize, value: u8) -> bool {
        match self.bytes.get(offset) {
            Some(b) => {
                b.store(value, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Load the native-endian u16 at element `index`
    pub fn load_u16(&self, index: usize) -> Option<u16> {
        let offset = index.checked_mul(2)?;
        let mut raw = [0u8; 2];
        (self.read_into(offset, &mut raw) == 2).then(|| u16::from_ne_bytes(raw))
    }

    /// Store a native-endian u16 at element `index`
    pub fn store_u16(&self, index: usize, value: u16) -> bool {
        match index.checked_mul(2) {
            Some(offset) if offset + 2 <= self.len() => {
                self.write_at(offset, &value.to_ne_bytes());
                true
            }
            _ => false,
        }
    }

    /// Load the native-endian u32 at element `index`
    pub fn load_u32(&self, index: usize) -> Option<u32> {
        let offset = index.checked_mul(4)?;
        let mut raw = [0u8; 4];
        (self.read_into(offset, &mut raw) == 4).then(|| u32::from_ne_bytes(raw))
    }

    /// Store a native-endian u32 at element `index`
    pub fn store_u32(&self, index: usize, value: u32) -> bool {
        match index.checked_mul(4) {
            Some(offset) if offset + 4 <= self.len() => {
                self.write_at(offset, &value.to_ne_bytes());
                true
            }
            _ => false,
        }
    }

    /// Zero the whole region
    pub fn clear(&self) {
        for byte in self.bytes.iter() {
            byte.store(0, Ordering::Relaxed);
        }
    }
}

impl std::fmt::Debug for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Region").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_zeroed() {
        let region = Region::try_zeroed("test", 16).unwrap();
        assert_eq!(region.len(), 16);
        assert!(region.to_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_try_zeroed_reports_allocation_failure() {
        let result = Region::try_zeroed("huge", usize::MAX);
        assert_eq!(
            result.unwrap_err(),
            DebugfsError::AllocationFailure {
                what: "huge",
                size: usize::MAX
            }
        );
    }

    #[test]
    fn test_short_write_leaves_remainder() {
        let region = Region::zeroed(8);
        region.write_at(0, &[0xAA; 8]);

        let written = region.write_at(0, &[1, 2, 3]);

        assert_eq!(written, 3);
        assert_eq!(&region.to_bytes()[..], &[1, 2, 3, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA]);
    }

    #[test]
    fn test_write_clamped_to_size() {
        let region = Region::zeroed(4);

        assert_eq!(region.write_at(2, &[9, 9, 9, 9]), 2);
        assert_eq!(&region.to_bytes()[..], &[0, 0, 9, 9]);
        assert_eq!(region.write_at(4, &[1]), 0);
        assert_eq!(region.write_at(100, &[1]), 0);
    }

    #[test]
    fn test_read_clamped_to_size() {
        let region = Region::zeroed(4);
        region.write_at(0, &[1, 2, 3, 4]);

        assert_eq!(&region.read_at(0, 100)[..], &[1, 2, 3, 4]);
        assert_eq!(&region.read_at(3, 100)[..], &[4]);
        assert!(region.read_at(4, 10).is_empty());
        assert!(region.read_at(usize::MAX, 10).is_empty());
    }

    #[test]
    fn test_u32_elements() {
        let region = Region::zeroed(8);

        assert!(region.store_u32(1, 0xDEADBEEF));
        assert_eq!(region.load_u32(1), Some(0xDEADBEEF));
        assert_eq!(region.load_u32(0), Some(0));
        assert!(!region.store_u32(2, 1));
        assert_eq!(region.load_u32(2), None);
    }

    #[test]
    fn test_u16_elements() {
        let region = Region::zeroed(5);

        assert!(region.store_u16(1, 0xBEEF));
        assert_eq!(region.load_u16(1), Some(0xBEEF));
        assert_eq!(&region.read_at(2, 2)[..], &0xBEEFu16.to_ne_bytes());
        assert!(!region.store_u16(2, 1));
        assert_eq!(region.load_u16(2), None);
    }

    #[test]
    fn test_clear() {
        let region = Region::zeroed(3);
        region.write_at(0, &[7, 7, 7]);
        region.clear();
        assert_eq!(&region.to_bytes()[..], &[0, 0, 0]);
    }
}
