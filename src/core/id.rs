/*!
 * Worker Identity
 * Sequence numbers and names for preemptive timeout workers
 */

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Prefix of every preemptive worker thread name
pub const WORKER_NAME_PREFIX: &str = "assert-timeout-worker";

// ============================================================================
// Sequence Generator
// ============================================================================

/// Monotonic atomic counter; values are never recycled
///
/// # Performance
/// - Cache-line aligned to prevent false sharing
/// - Lock-free atomic operations
#[repr(C, align(64))]
pub struct SequenceGenerator {
    counter: AtomicU64,
}

impl SequenceGenerator {
    /// Create new generator starting at given value
    #[inline]
    pub const fn new(start: u64) -> Self {
        Self {
            counter: AtomicU64::new(start),
        }
    }

    /// Generate next value
    #[inline]
    pub fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Value the next call will return (for debugging)
    #[inline]
    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

/// Process-wide worker sequence, starting at 1
static WORKER_SEQUENCE: SequenceGenerator = SequenceGenerator::new(1);

// ============================================================================
// Worker Names
// ============================================================================

/// Name of a preemptive worker thread: `assert-timeout-worker-<n>`
///
/// Names exist for log and diagnostic inspection only; nothing keys on them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerName {
    sequence: u64,
    name: String,
}

impl WorkerName {
    /// Allocate the next name from the process-wide sequence
    pub fn next() -> Self {
        Self::with_sequence(WORKER_SEQUENCE.next())
    }

    fn with_sequence(sequence: u64) -> Self {
        Self {
            sequence,
            name: format!("{WORKER_NAME_PREFIX}-{sequence}"),
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Parse the sequence number out of a worker thread name
    pub fn parse_sequence(name: &str) -> Option<u64> {
        name.strip_prefix(WORKER_NAME_PREFIX)?
            .strip_prefix('-')?
            .parse()
            .ok()
    }
}

impl fmt::Display for WorkerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<WorkerName> for String {
    fn from(name: WorkerName) -> Self {
        name.name
    }
}

// ============================================================================
// Tests
// ============================================================================
