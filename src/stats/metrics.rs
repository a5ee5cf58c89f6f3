//! Statistics and metrics for capture streams

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Source of a stream's statistics text
///
/// Implemented by whatever owns a stream's counters. Called once per
/// session open; the output is truncated to the session capacity.
pub trait StatsProvider: Send + Sync {
    /// Write the current statistics as text
    fn write_stats(&self, out: &mut dyn fmt::Write) -> fmt::Result;
}

/// Live per-stream counters updated by the capture path
#[derive(Debug)]
pub struct StreamCounters {
    started_at: Instant,
    frames: AtomicU64,
    packets: AtomicU64,
    empty_packets: AtomicU64,
    errors: AtomicU64,
    invalid_packets: AtomicU64,
    bytes_received: AtomicU64,
    last_frame_size: AtomicU64,
}

impl StreamCounters {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            frames: AtomicU64::new(0),
            packets: AtomicU64::new(0),
            empty_packets: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            invalid_packets: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            last_frame_size: AtomicU64::new(0),
        }
    }

    /// Count a received packet with `payload` bytes
    pub fn record_packet(&self, payload: usize) {
        self.packets.fetch_add(1, Ordering::Relaxed);
        if payload == 0 {
            self.empty_packets.fetch_add(1, Ordering::Relaxed);
        } else {
            self.bytes_received
                .fetch_add(payload as u64, Ordering::Relaxed);
        }
    }

    /// Count a completed frame of `size` bytes
    pub fn record_frame(&self, size: usize) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.last_frame_size.store(size as u64, Ordering::Relaxed);
    }

    /// Count a packet flagged with a transfer error
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a packet with an invalid header
    pub fn record_invalid(&self) {
        self.invalid_packets.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of the counters
    pub fn snapshot(&self) -> StreamStats {
        StreamStats {
            duration: self.started_at.elapsed(),
            frames: self.frames.load(Ordering::Relaxed),
            packets: self.packets.load(Ordering::Relaxed),
            empty_packets: self.empty_packets.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            invalid_packets: self.invalid_packets.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            last_frame_size: self.last_frame_size.load(Ordering::Relaxed),
        }
    }
}

impl Default for StreamCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsProvider for StreamCounters {
    fn write_stats(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        self.snapshot().dump(out)
    }
}

/// Stream-level statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Time since the stream started
    pub duration: Duration,
    /// Completed frames
    pub frames: u64,
    /// Packets received
    pub packets: u64,
    /// Packets without payload
    pub empty_packets: u64,
    /// Packets flagged with an error
    pub errors: u64,
    /// Packets with an invalid header
    pub invalid_packets: u64,
    /// Payload bytes received
    pub bytes_received: u64,
    /// Size of the most recent frame
    pub last_frame_size: u64,
}

impl StreamStats {
    /// Calculate bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.duration.as_secs();
        if secs > 0 {
            (self.bytes_received * 8) / secs
        } else {
            0
        }
    }

    /// Calculate frame rate
    pub fn framerate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }

    /// Write the line-oriented text form
    pub fn dump(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(out, "frames:  {}", self.frames)?;
        writeln!(
            out,
            "packets: {}\nempty:   {}\nerrors:  {}\ninvalid: {}",
            self.packets, self.empty_packets, self.errors, self.invalid_packets
        )?;
        writeln!(out, "bytes:   {}", self.bytes_received)?;
        writeln!(out, "last frame size: {}", self.last_frame_size)?;
        writeln!(
            out,
            "duration: {}ms\nbitrate: {} bps\nfps: {:.2}",
            self.duration.as_millis(),
            self.bitrate(),
            self.framerate()
        )
    }
}

/// `fmt::Write` sink that silently drops output past its limit
pub(crate) struct BoundedWriter<'a> {
    buf: &'a mut Vec<u8>,
    limit: usize,
}

impl<'a> BoundedWriter<'a> {
    pub(crate) fn new(buf: &'a mut Vec<u8>, limit: usize) -> Self {
        Self { buf, limit }
    }
}

impl fmt::Write for BoundedWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = self.limit.saturating_sub(self.buf.len());
        let n = s.len().min(room);
        self.buf.extend_from_slice(&s.as_bytes()[..n]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write;

    #[test]
    fn test_counters_new() {
        let counters = StreamCounters::new();
        let stats = counters.snapshot();

        assert_eq!(stats.frames, 0);
        assert_eq!(stats.packets, 0);
        assert_eq!(stats.errors, 0);
        assert_eq!(stats.bytes_received, 0);
    }

    #[test]
    fn test_counters_record() {
        let counters = StreamCounters::new();
        counters.record_packet(1000);
        counters.record_packet(0);
        counters.record_frame(1000);
        counters.record_error();
        counters.record_invalid();

        let stats = counters.snapshot();
        assert_eq!(stats.packets, 2);
        assert_eq!(stats.empty_packets, 1);
        assert_eq!(stats.bytes_received, 1000);
        assert_eq!(stats.frames, 1);
        assert_eq!(stats.last_frame_size, 1000);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.invalid_packets, 1);
    }

    #[test]
    fn test_bitrate() {
        let stats = StreamStats {
            bytes_received: 1_000_000,
            duration: Duration::from_secs(10),
            ..Default::default()
        };

        // 1,000,000 bytes * 8 bits / 10 seconds = 800,000 bps
        assert_eq!(stats.bitrate(), 800_000);
    }

    #[test]
    fn test_bitrate_zero_duration() {
        let stats = StreamStats {
            bytes_received: 1_000_000,
            ..Default::default()
        };
        assert_eq!(stats.bitrate(), 0);
        assert_eq!(stats.framerate(), 0.0);
    }

    #[test]
    fn test_dump() {
        let stats = StreamStats {
            frames: 30,
            packets: 120,
            duration: Duration::from_secs(1),
            ..Default::default()
        };
        let mut text = String::new();
        stats.dump(&mut text).unwrap();

        assert!(text.starts_with("frames:  30\npackets: 120\n"));
        assert!(text.contains("fps: 30.00"));
    }

    #[test]
    fn test_bounded_writer_truncates() {
        let mut buf = Vec::new();
        let mut writer = BoundedWriter::new(&mut buf, 5);

        write!(writer, "hello world").unwrap();
        write!(writer, "more").unwrap();

        assert_eq!(buf, b"hello");
    }
}
