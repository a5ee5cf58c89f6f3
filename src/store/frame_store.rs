//! Frame store
//!
//! Holds segmented capture metadata and the two payload buffers. Every
//! field lives in its own [`Region`] so it can be exported as-is; the
//! store never takes a lock, writers on the capture path and external
//! writers through exported entries race freely.

use std::sync::Arc;

use bytes::Bytes;

use crate::config::MAX_SEGMENTS;
use crate::error::{DebugfsError, Result};

use super::layout::{SegmentFormat, SegmentInfo};
use super::region::Region;

/// Mode selector value for normal capture
pub const MODE_NORMAL: u8 = 0;

/// Exported frame-store fields, in registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreField {
    /// Number of valid segments (u8)
    SegmentCount,
    /// Per-segment ASCII format codes (u8 array)
    SegmentFormats,
    /// Per-segment frame counts (u16 array)
    SegmentFrameCounts,
    /// Per-segment byte offsets into `frameData` (u32 array)
    FrameDataOffsets,
    /// Per-segment element offsets into `frameSizes` (u16 array)
    FrameSizeOffsets,
    /// Raw frame payloads
    FrameData,
    /// Per-frame byte sizes (u32 array)
    FrameSizes,
    /// Segment currently being written (u8)
    CurrentSegmentIndex,
    /// Capture mode selector (u8)
    ModeSwitch,
}

impl StoreField {
    /// All fields in registration order
    pub const ALL: [StoreField; 9] = [
        StoreField::SegmentCount,
        StoreField::SegmentFormats,
        StoreField::SegmentFrameCounts,
        StoreField::FrameDataOffsets,
        StoreField::FrameSizeOffsets,
        StoreField::FrameData,
        StoreField::FrameSizes,
        StoreField::CurrentSegmentIndex,
        StoreField::ModeSwitch,
    ];

    /// Name of the exported entry
    pub fn name(self) -> &'static str {
        match self {
            StoreField::SegmentCount => "segmentCount",
            StoreField::SegmentFormats => "segmentFormats",
            StoreField::SegmentFrameCounts => "segmentFrameCounts",
            StoreField::FrameDataOffsets => "frameDataOffsets",
            StoreField::FrameSizeOffsets => "frameSizeOffsets",
            StoreField::FrameData => "frameData",
            StoreField::FrameSizes => "frameSizes",
            StoreField::CurrentSegmentIndex => "currentSegmentIndex",
            StoreField::ModeSwitch => "modeSwitch",
        }
    }

    /// Whether the field is one of the payload buffers allocated at init
    pub fn is_payload(self) -> bool {
        matches!(self, StoreField::FrameData | StoreField::FrameSizes)
    }

    /// Size in bytes of a metadata field, `None` for the payload buffers
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            StoreField::SegmentCount | StoreField::CurrentSegmentIndex | StoreField::ModeSwitch => {
                Some(1)
            }
            StoreField::SegmentFormats => Some(MAX_SEGMENTS),
            StoreField::SegmentFrameCounts | StoreField::FrameSizeOffsets => Some(MAX_SEGMENTS * 2),
            StoreField::FrameDataOffsets => Some(MAX_SEGMENTS * 4),
            StoreField::FrameData | StoreField::FrameSizes => None,
        }
    }

    fn zeroed_region(self) -> Arc<Region> {
        Arc::new(Region::zeroed(self.fixed_size().unwrap_or(0)))
    }
}

/// Segmented capture metadata plus raw frame payloads
#[derive(Debug)]
pub struct FrameStore {
    segment_count: Arc<Region>,
    segment_formats: Arc<Region>,
    segment_frame_counts: Arc<Region>,
    frame_data_offsets: Arc<Region>,
    frame_size_offsets: Arc<Region>,
    frame_data: Option<Arc<Region>>,
    frame_sizes: Option<Arc<Region>>,
    current_segment_index: Arc<Region>,
    mode_switch: Arc<Region>,
}

impl FrameStore {
    /// Create a store with zeroed metadata and no payload buffers
    pub fn new() -> Self {
        Self {
            segment_count: StoreField::SegmentCount.zeroed_region(),
            segment_formats: StoreField::SegmentFormats.zeroed_region(),
            segment_frame_counts: StoreField::SegmentFrameCounts.zeroed_region(),
            frame_data_offsets: StoreField::FrameDataOffsets.zeroed_region(),
            frame_size_offsets: StoreField::FrameSizeOffsets.zeroed_region(),
            frame_data: None,
            frame_sizes: None,
            current_segment_index: StoreField::CurrentSegmentIndex.zeroed_region(),
            mode_switch: StoreField::ModeSwitch.zeroed_region(),
        }
    }

    /// Allocate both payload buffers
    ///
    /// Either both buffers are allocated or neither is.
    pub fn initialize(&mut self, frame_data_capacity: usize, frame_sizes_capacity: usize) -> Result<()> {
        if self.is_allocated() {
            return Err(DebugfsError::StoreAlreadyAllocated);
        }

        let frame_data = Region::try_zeroed("frameData", frame_data_capacity)?;
        let frame_sizes = Region::try_zeroed("frameSizes", frame_sizes_capacity)?;

        self.frame_data = Some(Arc::new(frame_data));
        self.frame_sizes = Some(Arc::new(frame_sizes));

        tracing::debug!(
            frame_data = frame_data_capacity,
            frame_sizes = frame_sizes_capacity,
            "Frame store buffers allocated"
        );

        Ok(())
    }

    /// Free both payload buffers
    ///
    /// Releasing a store that was never initialized, or releasing twice, is
    /// rejected with [`DebugfsError::StoreNotAllocated`].
    pub fn release(&mut self) -> Result<()> {
        let (Some(_), Some(_)) = (self.frame_data.take(), self.frame_sizes.take()) else {
            tracing::error!("Frame store release without allocated buffers");
            return Err(DebugfsError::StoreNotAllocated);
        };

        tracing::debug!("Frame store buffers released");
        Ok(())
    }

    /// Whether the payload buffers are allocated
    pub fn is_allocated(&self) -> bool {
        self.frame_data.is_some() && self.frame_sizes.is_some()
    }

    /// Region backing an exported field, `None` for unallocated payloads
    pub fn region(&self, field: StoreField) -> Option<&Arc<Region>> {
        match field {
            StoreField::SegmentCount => Some(&self.segment_count),
            StoreField::SegmentFormats => Some(&self.segment_formats),
            StoreField::SegmentFrameCounts => Some(&self.segment_frame_counts),
            StoreField::FrameDataOffsets => Some(&self.frame_data_offsets),
            StoreField::FrameSizeOffsets => Some(&self.frame_size_offsets),
            StoreField::FrameData => self.frame_data.as_ref(),
            StoreField::FrameSizes => self.frame_sizes.as_ref(),
            StoreField::CurrentSegmentIndex => Some(&self.current_segment_index),
            StoreField::ModeSwitch => Some(&self.mode_switch),
        }
    }

    /// Capacity of the frame payload buffer (0 when unallocated)
    pub fn frame_data_capacity(&self) -> usize {
        self.frame_data.as_ref().map_or(0, |r| r.len())
    }

    /// Capacity of the frame size table in bytes (0 when unallocated)
    pub fn frame_sizes_capacity(&self) -> usize {
        self.frame_sizes.as_ref().map_or(0, |r| r.len())
    }

    pub fn segment_count(&self) -> u8 {
        self.segment_count.load_u8(0).unwrap_or(0)
    }

    pub fn current_segment_index(&self) -> u8 {
        self.current_segment_index.load_u8(0).unwrap_or(0)
    }

    pub fn set_current_segment_index(&self, index: u8) {
        self.current_segment_index.store_u8(0, index);
    }

    pub fn mode_switch(&self) -> u8 {
        self.mode_switch.load_u8(0).unwrap_or(MODE_NORMAL)
    }

    pub fn set_mode_switch(&self, mode: u8) {
        self.mode_switch.store_u8(0, mode);
    }

    /// Metadata of segment `index`, if `index < segmentCount`
    pub fn segment(&self, index: usize) -> Option<SegmentInfo> {
        if index >= self.segment_count() as usize || index >= MAX_SEGMENTS {
            return None;
        }

        Some(SegmentInfo {
            index,
            format_code: self.segment_formats.load_u8(index)?,
            frame_count: self.segment_frame_counts.load_u16(index)?,
            data_offset: self.frame_data_offsets.load_u32(index)?,
            size_offset: self.frame_size_offsets.load_u16(index)?,
        })
    }

    /// Metadata of all valid segments
    pub fn segments(&self) -> Vec<SegmentInfo> {
        (0..self.segment_count() as usize)
            .map_while(|i| self.segment(i))
            .collect()
    }

    /// Append a segment of frames after the last valid segment
    ///
    /// Frames are placed in fixed slots of the format's maximum frame size.
    /// Nothing is written unless the whole segment fits and both of its
    /// start offsets lie inside the payload buffers, empty segments included.
    pub fn append_segment(&self, format: SegmentFormat, frames: &[&[u8]]) -> Result<SegmentInfo> {
        let index = self.segment_count() as usize;
        if index >= MAX_SEGMENTS {
            return Err(DebugfsError::SegmentsFull {
                capacity: MAX_SEGMENTS,
            });
        }

        let frame_data = self.frame_data.as_ref().ok_or(DebugfsError::StoreNotAllocated)?;
        let frame_sizes = self.frame_sizes.as_ref().ok_or(DebugfsError::StoreNotAllocated)?;

        let (data_offset, size_offset) = match index.checked_sub(1) {
            None => (0, 0),
            Some(prev) => self
                .segment(prev)
                .and_then(|info| info.next_offsets())
                .ok_or(DebugfsError::LayoutViolation {
                    segment: prev,
                    reason: "unknown format or offset overflow",
                })?,
        };

        let slot = format.max_frame_size();
        if let Some(frame) = frames.iter().find(|f| f.len() > slot) {
            return Err(DebugfsError::PayloadFull {
                what: "frame slot",
                needed: frame.len(),
                capacity: slot,
            });
        }

        // The start offset must be a valid position even for an empty
        // segment, so the end is measured as at least one byte past it
        let data_end = frames
            .len()
            .checked_mul(slot)
            .and_then(|n| n.checked_add(data_offset))
            .map(|end| end.max(data_offset.saturating_add(1)));
        match data_end {
            Some(end) if end <= frame_data.len() => {}
            _ => {
                return Err(DebugfsError::PayloadFull {
                    what: "frameData",
                    needed: data_end.unwrap_or(usize::MAX),
                    capacity: frame_data.len(),
                })
            }
        }

        let sizes_end = size_offset
            .checked_add(frames.len().max(1))
            .and_then(|n| n.checked_mul(4));
        match sizes_end {
            Some(end) if end <= frame_sizes.len() => {}
            _ => {
                return Err(DebugfsError::PayloadFull {
                    what: "frameSizes",
                    needed: sizes_end.unwrap_or(usize::MAX),
                    capacity: frame_sizes.len(),
                })
            }
        }

        let too_wide = |reason| DebugfsError::LayoutViolation {
            segment: index,
            reason,
        };
        let info = SegmentInfo {
            index,
            format_code: format.code(),
            frame_count: u16::try_from(frames.len()).map_err(|_| too_wide("frame count exceeds u16"))?,
            data_offset: u32::try_from(data_offset).map_err(|_| too_wide("data offset exceeds u32"))?,
            size_offset: u16::try_from(size_offset).map_err(|_| too_wide("size offset exceeds u16"))?,
        };

        for (i, frame) in frames.iter().enumerate() {
            frame_data.write_at(data_offset + i * slot, frame);
            // Fits: every frame is at most `slot` bytes
            frame_sizes.store_u32(size_offset + i, frame.len() as u32);
        }

        self.segment_formats.store_u8(index, info.format_code);
        self.segment_frame_counts.store_u16(index, info.frame_count);
        self.frame_data_offsets.store_u32(index, info.data_offset);
        self.frame_size_offsets.store_u16(index, info.size_offset);
        self.segment_count.store_u8(0, (index + 1) as u8);
        self.current_segment_index.store_u8(0, index as u8);

        tracing::debug!(
            segment = index,
            format = %format,
            frames = frames.len(),
            data_offset,
            size_offset,
            "Segment appended"
        );

        Ok(info)
    }

    /// Copy out frame `frame` of segment `segment`
    ///
    /// The recorded size is clamped to the format's slot size.
    pub fn frame(&self, segment: usize, frame: usize) -> Option<Bytes> {
        let info = self.segment(segment)?;
        if frame >= info.frame_count as usize {
            return None;
        }

        let slot = info.format()?.max_frame_size();
        let size = self
            .frame_sizes
            .as_ref()?
            .load_u32(info.size_offset as usize + frame)? as usize;
        let start = (info.data_offset as usize).checked_add(frame.checked_mul(slot)?)?;

        Some(self.frame_data.as_ref()?.read_at(start, size.min(slot)))
    }

    /// Validate segment metadata against the payload capacities
    ///
    /// The arrays are externally writable, so this may fail at any time.
    pub fn check_layout(&self) -> Result<()> {
        let count = self.segment_count() as usize;
        if count > MAX_SEGMENTS {
            return Err(DebugfsError::LayoutViolation {
                segment: count,
                reason: "segment count exceeds capacity",
            });
        }

        let data_capacity = self.frame_data_capacity();
        let sizes_capacity = self.frame_sizes_capacity() / 4;
        let mut prev: Option<SegmentInfo> = None;

        for info in self.segments() {
            let segment = info.index;
            if info.data_offset as usize >= data_capacity {
                return Err(DebugfsError::LayoutViolation {
                    segment,
                    reason: "frame data offset out of bounds",
                });
            }
            if info.size_offset as usize >= sizes_capacity {
                return Err(DebugfsError::LayoutViolation {
                    segment,
                    reason: "frame size offset out of bounds",
                });
            }
            if let Some(prev) = prev {
                if info.data_offset < prev.data_offset || info.size_offset < prev.size_offset {
                    return Err(DebugfsError::LayoutViolation {
                        segment,
                        reason: "offsets decrease",
                    });
                }
            }
            prev = Some(info);
        }

        if count > 0 && self.current_segment_index() as usize >= count {
            return Err(DebugfsError::LayoutViolation {
                segment: self.current_segment_index() as usize,
                reason: "current segment index past segment count",
            });
        }

        Ok(())
    }

    /// Zero all segment metadata; payload contents are left in place
    pub fn reset(&self) {
        self.segment_count.clear();
        self.segment_formats.clear();
        self.segment_frame_counts.clear();
        self.frame_data_offsets.clear();
        self.frame_size_offsets.clear();
        self.current_segment_index.clear();
    }
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new()
    }
}
