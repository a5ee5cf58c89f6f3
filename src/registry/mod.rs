//! Export registry
//!
//! The registry maps names to borrowed frame-store regions. Each entry
//! carries the size fixed at registration and an access mode; reads and
//! writes through an entry go straight to the backing memory.
//!
//! # Ownership
//!
//! ```text
//!     FrameStore ──owns──► Arc<Region> ◄──weak── ExportEntry ◄── ExportRegistry
//!                                                     ▲
//!                                                     └── host filesystem node
//! ```
//!
//! Entries never keep a region alive. After the store releases its payload
//! buffers, any entry still held by a reader reads as empty.

pub mod entry;
pub mod store;

pub use entry::{AccessMode, ExportEntry};
pub use store::ExportRegistry;
