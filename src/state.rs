//! Run session state
//!
//! Counters and flags that would otherwise be process globals. One session
//! is shared (via `Arc`) by the orchestrator, the scheduler and the
//! background observation writer.

use crate::run::RunState;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Session shared across runs of one process
#[derive(Debug, Default)]
pub struct RunSession {
    /// Response bytes read from upstream APIs, for reporting only
    bytes_used: AtomicU64,

    /// Same counter, never reset
    total_bytes: AtomicU64,

    /// Advisory busy flag checked by the scheduler before each tick
    running: AtomicBool,

    /// Last state entered by the orchestrator
    state: RwLock<RunState>,

    /// Delta of the most recent successful run
    last_delta: RwLock<Option<f64>>,
}

/// Clears the busy flag when dropped
pub struct RunningGuard<'a> {
    session: &'a RunSession,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.session.running.store(false, Ordering::SeqCst);
    }
}

impl RunSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bytes(&self, bytes: usize) {
        self.bytes_used.fetch_add(bytes as u64, Ordering::Relaxed);
        self.total_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn bytes_used(&self) -> u64 {
        self.bytes_used.load(Ordering::Relaxed)
    }

    /// Bytes read over the lifetime of the session
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes.load(Ordering::Relaxed)
    }

    /// Read and reset the byte counter
    pub fn take_bytes(&self) -> u64 {
        self.bytes_used.swap(0, Ordering::Relaxed)
    }

    /// Check if a run is currently executing
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Mark a run as started, `None` when one is already executing
    pub fn try_begin(&self) -> Option<RunningGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| RunningGuard { session: self })
    }

    pub fn state(&self) -> RunState {
        *self.state.read()
    }

    pub fn set_state(&self, state: RunState) {
        *self.state.write() = state;
    }

    pub fn last_delta(&self) -> Option<f64> {
        *self.last_delta.read()
    }

    pub fn set_last_delta(&self, delta: f64) {
        *self.last_delta.write() = Some(delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_flag_is_exclusive() {
        let session = RunSession::new();
        let guard = session.try_begin();
        assert!(guard.is_some());
        assert!(session.is_running());
        assert!(session.try_begin().is_none());

        drop(guard);
        assert!(!session.is_running());
        assert!(session.try_begin().is_some());
    }

    #[test]
    fn test_byte_counter() {
        let session = RunSession::new();
        session.add_bytes(100);
        session.add_bytes(24);
        assert_eq!(session.bytes_used(), 124);
        assert_eq!(session.take_bytes(), 124);
        assert_eq!(session.bytes_used(), 0);
        assert_eq!(session.total_bytes(), 124);
    }

    #[test]
    fn test_sessions_do_not_share_state() {
        let a = RunSession::new();
        let b = RunSession::new();
        a.add_bytes(10);
        a.set_state(RunState::Fetching);
        assert_eq!(b.bytes_used(), 0);
        assert_eq!(b.state(), RunState::Idle);
    }
}
