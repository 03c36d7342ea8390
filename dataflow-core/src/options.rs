//! Queue configuration options.
//!
//! Mirrors the high-water-mark style configuration of a ZeroMQ-descended
//! socket (`ZMQ_SNDHWM`/`ZMQ_RCVHWM`): a queue's usable capacity is
//! configured once, up front, and never changes for the lifetime of the
//! queue (migration restores into a queue configured with the same
//! capacity — see spec §6's snapshot rejection rule).

/// Configuration for a `FanoutFifo` or `RoundRobinFifo`.
///
/// # Examples
///
/// ```
/// use dataflow_core::options::QueueOptions;
///
/// let opts = QueueOptions::default().with_capacity(16);
/// assert_eq!(opts.capacity, 16);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueOptions {
    /// Number of tokens the queue can hold before the slowest reader
    /// blocks new writes. The ring buffer itself allocates one extra slot
    /// internally to distinguish full from empty (spec §3).
    pub capacity: usize,
}

impl QueueOptions {
    /// Default capacity used when a port does not specify one, matching
    /// the Python original's `queue_length` default of 4.
    pub const DEFAULT_CAPACITY: usize = 4;

    #[must_use]
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            capacity: Self::DEFAULT_CAPACITY,
        }
    }
}
