//! Statistics snapshot sessions
//!
//! Each open of a stream's stats entry materializes an immutable snapshot
//! that lives until the matching close:
//!
//! ```text
//!   Closed ──open()──► Open/Readable ──read()*──► ... ──close()──► Closed
//! ```
//!
//! Sessions never share storage, so concurrent readers each see the
//! counters as they were at their own open.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};

use crate::error::{DebugfsError, Result};

use super::metrics::{BoundedWriter, StatsProvider};

/// Identifier of an open stats session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub fn as_raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Default)]
struct EndpointState {
    /// Open sessions and their snapshots
    sessions: HashMap<SessionId, Bytes>,
    /// Next session ID to hand out
    next_id: u64,
    /// No new sessions once set
    retired: bool,
}

/// Read-only statistics entry for one stream
///
/// Produces one snapshot per open, bounded by `capacity` bytes.
pub struct StatsEndpoint {
    /// Path of the entry, for diagnostics
    path: String,

    /// Formatter of the stream's counters
    provider: Arc<dyn StatsProvider>,

    /// Snapshot capacity in bytes
    capacity: usize,

    state: Mutex<EndpointState>,

    /// Signalled when the last session closes
    drained: Condvar,
}

impl StatsEndpoint {
    /// Create an endpoint producing snapshots of at most `capacity` bytes
    pub fn new(path: impl Into<String>, provider: Arc<dyn StatsProvider>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            provider,
            capacity,
            state: Mutex::new(EndpointState::default()),
            drained: Condvar::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Open a session and capture a snapshot
    ///
    /// The provider runs without the endpoint lock held, so a slow
    /// formatter never stalls reads or closes of other sessions.
    pub fn open(&self) -> Result<SessionId> {
        if self.is_retired() {
            return Err(DebugfsError::EndpointRetired);
        }

        let mut buf = Vec::new();
        if buf.try_reserve_exact(self.capacity).is_err() {
            tracing::warn!(
                entry = %self.path,
                size = self.capacity,
                "Stats session allocation failed"
            );
            return Err(DebugfsError::AllocationFailure {
                what: "stats session",
                size: self.capacity,
            });
        }

        let mut writer = BoundedWriter::new(&mut buf, self.capacity);
        if self.provider.write_stats(&mut writer).is_err() {
            tracing::debug!(entry = %self.path, "Stats formatter reported an error, keeping partial output");
        }

        let mut state = self.state.lock();
        // Retired while formatting; the snapshot is dropped
        if state.retired {
            return Err(DebugfsError::EndpointRetired);
        }

        let id = SessionId(state.next_id);
        state.next_id += 1;
        let len = buf.len();
        state.sessions.insert(id, Bytes::from(buf));

        tracing::debug!(entry = %self.path, session = %id, len, "Stats session opened");
        Ok(id)
    }

    /// Read up to `len` bytes of the snapshot at `offset`
    ///
    /// Reading at or past the end of the snapshot returns no bytes.
    pub fn read(&self, id: SessionId, offset: usize, len: usize) -> Result<Bytes> {
        let state = self.state.lock();
        let Some(snapshot) = state.sessions.get(&id) else {
            tracing::error!(entry = %self.path, session = %id, "Read on invalid stats session");
            return Err(DebugfsError::InvalidSession(id));
        };

        let start = offset.min(snapshot.len());
        let end = start + len.min(snapshot.len() - start);
        Ok(snapshot.slice(start..end))
    }

    /// Length of a session's snapshot
    pub fn valid_length(&self, id: SessionId) -> Result<usize> {
        let state = self.state.lock();
        state
            .sessions
            .get(&id)
            .map(|s| s.len())
            .ok_or(DebugfsError::InvalidSession(id))
    }

    /// Close a session and free its snapshot
    pub fn close(&self, id: SessionId) -> Result<()> {
        let mut state = self.state.lock();
        if state.sessions.remove(&id).is_none() {
            tracing::error!(entry = %self.path, session = %id, "Close on invalid stats session");
            return Err(DebugfsError::InvalidSession(id));
        }

        if state.sessions.is_empty() {
            self.drained.notify_all();
        }

        tracing::debug!(entry = %self.path, session = %id, "Stats session closed");
        Ok(())
    }

    /// Number of sessions currently open
    pub fn open_sessions(&self) -> usize {
        self.state.lock().sessions.len()
    }

    pub fn is_retired(&self) -> bool {
        self.state.lock().retired
    }

    /// Refuse new opens, then block until every open session is closed
    pub fn retire(&self) {
        let mut state = self.state.lock();
        state.retired = true;

        if !state.sessions.is_empty() {
            tracing::debug!(
                entry = %self.path,
                sessions = state.sessions.len(),
                "Waiting for stats sessions to close"
            );
        }
        while !state.sessions.is_empty() {
            self.drained.wait(&mut state);
        }
    }
}

impl std::fmt::Debug for StatsEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsEndpoint")
            .field("path", &self.path)
            .field("capacity", &self.capacity)
            .field("open_sessions", &self.open_sessions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::time::Duration;

    use tokio_test::{assert_err, assert_ok};

    use super::*;

    /// Provider printing a counter the test can change between opens
    struct Counter(AtomicU64);

    impl StatsProvider for Counter {
        fn write_stats(&self, out: &mut dyn fmt::Write) -> fmt::Result {
            writeln!(out, "index: {}", self.0.load(Ordering::Relaxed))
        }
    }

    struct Chatty;

    impl StatsProvider for Chatty {
        fn write_stats(&self, out: &mut dyn fmt::Write) -> fmt::Result {
            for i in 0..500 {
                writeln!(out, "line {}", i)?;
            }
            Ok(())
        }
    }

    /// Provider that stalls once `stall` is set
    #[derive(Default)]
    struct Stalling {
        stall: AtomicBool,
        entered: AtomicBool,
    }

    impl StatsProvider for Stalling {
        fn write_stats(&self, out: &mut dyn fmt::Write) -> fmt::Result {
            if self.stall.load(Ordering::SeqCst) {
                self.entered.store(true, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(300));
            }
            writeln!(out, "ok")
        }
    }

    fn endpoint(provider: Arc<dyn StatsProvider>) -> StatsEndpoint {
        StatsEndpoint::new("/capture-debug/streams/1-2-0/stats", provider, 1024)
    }

    #[test]
    fn test_open_read_close() {
        let ep = endpoint(Arc::new(Counter(AtomicU64::new(4))));

        let id = assert_ok!(ep.open());
        assert_eq!(ep.open_sessions(), 1);
        assert_eq!(&assert_ok!(ep.read(id, 0, 100))[..], b"index: 4\n");

        assert_ok!(ep.close(id));
        assert_eq!(ep.open_sessions(), 0);
    }

    #[test]
    fn test_partial_reads() {
        let ep = endpoint(Arc::new(Counter(AtomicU64::new(12))));
        let id = ep.open().unwrap();

        let mut out = Vec::new();
        let mut offset = 0;
        loop {
            let chunk = ep.read(id, offset, 3).unwrap();
            if chunk.is_empty() {
                break;
            }
            offset += chunk.len();
            out.extend_from_slice(&chunk);
        }

        assert_eq!(out, b"index: 12\n");
    }

    #[test]
    fn test_read_past_end_is_empty() {
        let ep = endpoint(Arc::new(Counter(AtomicU64::new(1))));
        let id = ep.open().unwrap();
        let len = ep.valid_length(id).unwrap();

        assert!(ep.read(id, len, 10).unwrap().is_empty());
        assert!(ep.read(id, len + 1000, 10).unwrap().is_empty());
        assert!(ep.read(id, usize::MAX, usize::MAX).unwrap().is_empty());
    }

    #[test]
    fn test_output_truncated_to_capacity() {
        let ep = endpoint(Arc::new(Chatty));
        let id = ep.open().unwrap();

        assert_eq!(ep.valid_length(id).unwrap(), 1024);
        assert_eq!(ep.read(id, 0, 4096).unwrap().len(), 1024);
    }

    #[test]
    fn test_snapshot_stable_across_reads() {
        let counter = Arc::new(Counter(AtomicU64::new(1)));
        let ep = endpoint(counter.clone());

        let first = ep.open().unwrap();
        counter.0.store(2, Ordering::Relaxed);
        let second = ep.open().unwrap();
        counter.0.store(3, Ordering::Relaxed);

        assert_eq!(&ep.read(first, 0, 100).unwrap()[..], b"index: 1\n");
        assert_eq!(&ep.read(second, 0, 100).unwrap()[..], b"index: 2\n");
        assert_eq!(&ep.read(first, 0, 100).unwrap()[..], b"index: 1\n");
        assert_ne!(first, second);
    }

    #[test]
    fn test_invalid_session() {
        let ep = endpoint(Arc::new(Counter(AtomicU64::new(0))));
        let bogus = SessionId::from_raw(99);

        assert_eq!(ep.read(bogus, 0, 1), Err(DebugfsError::InvalidSession(bogus)));
        assert_eq!(ep.close(bogus), Err(DebugfsError::InvalidSession(bogus)));

        let id = ep.open().unwrap();
        ep.close(id).unwrap();
        assert_err!(ep.read(id, 0, 1));
        assert_eq!(ep.close(id), Err(DebugfsError::InvalidSession(id)));
    }

    #[test]
    fn test_allocation_failure_holds_nothing() {
        let ep = StatsEndpoint::new("stats", Arc::new(Chatty), usize::MAX);

        assert!(matches!(
            ep.open(),
            Err(DebugfsError::AllocationFailure {
                what: "stats session",
                ..
            })
        ));
        assert_eq!(ep.open_sessions(), 0);
    }

    #[test]
    fn test_retire_refuses_new_opens() {
        let ep = endpoint(Arc::new(Counter(AtomicU64::new(0))));
        ep.retire();

        assert!(ep.is_retired());
        assert_eq!(ep.open(), Err(DebugfsError::EndpointRetired));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_retire_waits_for_open_sessions() {
        let ep = Arc::new(endpoint(Arc::new(Counter(AtomicU64::new(0)))));
        let id = ep.open().unwrap();

        let retiring = Arc::clone(&ep);
        let handle = tokio::task::spawn_blocking(move || retiring.retire());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        assert_eq!(&ep.read(id, 0, 100).unwrap()[..], b"index: 0\n");

        ep.close(id).unwrap();
        handle.await.unwrap();
        assert_eq!(ep.open_sessions(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_slow_formatter_does_not_block_other_sessions() {
        let provider = Arc::new(Stalling::default());
        let ep = Arc::new(endpoint(provider.clone()));
        let first = ep.open().unwrap();

        provider.stall.store(true, Ordering::SeqCst);
        let opening = Arc::clone(&ep);
        let handle = tokio::task::spawn_blocking(move || opening.open());
        while !provider.entered.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        // Formatter is mid-sleep; other sessions and retire proceed
        assert_eq!(&ep.read(first, 0, 100).unwrap()[..], b"ok\n");
        ep.close(first).unwrap();
        ep.retire();
        assert!(!handle.is_finished());

        assert_eq!(handle.await.unwrap(), Err(DebugfsError::EndpointRetired));
        assert_eq!(ep.open_sessions(), 0);
    }
}
