//! Segment layout
//!
//! Frames of one segment share a format and occupy fixed-size slots in the
//! payload buffer:
//!
//! ```text
//! frameData   | seg 0: n0 slots of max(fmt0) | seg 1: n1 slots of max(fmt1) | ...
//!             ^ dataOffset[0]                ^ dataOffset[1]
//! frameSizes  | seg 0: n0 u32 sizes | seg 1: n1 u32 sizes | ...
//!             ^ sizeOffset[0]       ^ sizeOffset[1]
//! ```
//!
//! The per-segment arrays have different element widths: formats are one
//! ASCII byte, frame counts and size offsets are u16, data offsets are u32.
//! All multi-byte elements are native-endian.

/// Maximum size of one MJPEG frame
pub const MJPEG_FRAME_SIZE_MAX: usize = 0x80000;

/// Size of one 640x480 YUYV frame
pub const YUYV_FRAME_SIZE: usize = 614_400;

/// Pixel format of a segment, stored as an ASCII code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentFormat {
    /// Motion JPEG, variable frame size up to [`MJPEG_FRAME_SIZE_MAX`]
    Mjpeg,
    /// Packed YUV 4:2:2, fixed frame size [`YUYV_FRAME_SIZE`]
    Yuyv,
}

impl SegmentFormat {
    /// Code stored in the `segmentFormats` array
    pub fn code(self) -> u8 {
        match self {
            SegmentFormat::Mjpeg => b'M',
            SegmentFormat::Yuyv => b'Y',
        }
    }

    /// Decode a `segmentFormats` entry
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            b'M' => Some(SegmentFormat::Mjpeg),
            b'Y' => Some(SegmentFormat::Yuyv),
            _ => None,
        }
    }

    /// Size of one frame slot in the payload buffer
    pub fn max_frame_size(self) -> usize {
        match self {
            SegmentFormat::Mjpeg => MJPEG_FRAME_SIZE_MAX,
            SegmentFormat::Yuyv => YUYV_FRAME_SIZE,
        }
    }

    /// Conventional file extension for frames of this format
    pub fn extension(self) -> &'static str {
        match self {
            SegmentFormat::Mjpeg => "mjpg",
            SegmentFormat::Yuyv => "yuyv",
        }
    }
}

impl std::fmt::Display for SegmentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Decoded metadata of one segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentInfo {
    /// Segment index
    pub index: usize,
    /// Raw ASCII format code
    pub format_code: u8,
    /// Number of frames in the segment
    pub frame_count: u16,
    /// Byte offset of the first frame slot in `frameData`
    pub data_offset: u32,
    /// Element offset of the first size in `frameSizes`
    pub size_offset: u16,
}

impl SegmentInfo {
    /// Decoded format, if the code is known
    pub fn format(&self) -> Option<SegmentFormat> {
        SegmentFormat::from_code(self.format_code)
    }

    /// Offsets where the segment following this one begins
    ///
    /// Returns `None` if the format is unknown or the offsets overflow.
    pub fn next_offsets(&self) -> Option<(usize, usize)> {
        let slot = self.format()?.max_frame_size();
        let frames = self.frame_count as usize;
        let data = (self.data_offset as usize).checked_add(frames.checked_mul(slot)?)?;
        let sizes = (self.size_offset as usize).checked_add(frames)?;
        Some((data, sizes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_codes() {
        assert_eq!(SegmentFormat::Mjpeg.code(), 0x4D);
        assert_eq!(SegmentFormat::Yuyv.code(), 0x59);
        assert_eq!(SegmentFormat::from_code(0x4D), Some(SegmentFormat::Mjpeg));
        assert_eq!(SegmentFormat::from_code(0x59), Some(SegmentFormat::Yuyv));
        assert_eq!(SegmentFormat::from_code(0), None);
        assert_eq!(SegmentFormat::from_code(b'm'), None);
    }

    #[test]
    fn test_next_offsets() {
        let info = SegmentInfo {
            index: 0,
            format_code: SegmentFormat::Mjpeg.code(),
            frame_count: 3,
            data_offset: 0,
            size_offset: 0,
        };
        assert_eq!(info.next_offsets(), Some((3 * MJPEG_FRAME_SIZE_MAX, 3)));

        let info = SegmentInfo {
            index: 1,
            format_code: SegmentFormat::Yuyv.code(),
            frame_count: 2,
            data_offset: 100,
            size_offset: 3,
        };
        assert_eq!(info.next_offsets(), Some((100 + 2 * YUYV_FRAME_SIZE, 5)));
    }

    #[test]
    fn test_next_offsets_unknown_format() {
        let info = SegmentInfo {
            index: 0,
            format_code: 0,
            frame_count: 1,
            data_offset: 0,
            size_offset: 0,
        };
        assert_eq!(info.next_offsets(), None);
    }
}
