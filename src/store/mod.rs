//! Frame store
//!
//! The frame store holds segmented capture metadata and raw frame
//! payloads. It is written by the capture pipeline and exported field by
//! field through the diagnostic tree.
//!
//! # Layout
//!
//! ```text
//!   FrameStore
//!   ├── segmentCount          u8
//!   ├── segmentFormats        [u8; 20]    'M' / 'Y'
//!   ├── segmentFrameCounts    [u16; 20]
//!   ├── frameDataOffsets      [u32; 20]   ──► frameData  (bytes)
//!   ├── frameSizeOffsets      [u16; 20]   ──► frameSizes (u32 per frame)
//!   ├── currentSegmentIndex   u8
//!   └── modeSwitch            u8
//! ```
//!
//! The two payload buffers are allocated once by [`FrameStore::initialize`]
//! and freed once by [`FrameStore::release`].

pub mod frame_store;
pub mod layout;
pub mod region;

pub use frame_store::{FrameStore, StoreField, MODE_NORMAL};
pub use layout::{SegmentFormat, SegmentInfo, MJPEG_FRAME_SIZE_MAX, YUYV_FRAME_SIZE};
pub use region::Region;
