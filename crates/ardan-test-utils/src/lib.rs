//! Test utilities and mock sinks for Ardan development.
//!
//! Provides recording [`Sink`] implementations ([`MemorySink`],
//! [`FlakySink`]) and small state builders in [`fixtures`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::sync::{Arc, Mutex, MutexGuard};

use ardan_core::{PublishError, Sink, Source};

pub use fixtures::{duty_update, recorded_fleet, state_at};

/// Every payload a [`MemorySink`] has accepted, in publish order.
pub type Published = Vec<(Source, Vec<u8>)>;

/// Sink that records every publish into shared memory.
///
/// Clones share the same log, so a test can keep one handle while the
/// forwarder thread owns the other.
#[derive(Clone, Default)]
pub struct MemorySink {
    log: Arc<Mutex<Published>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of everything published so far.
    pub fn published(&self) -> Published {
        self.lock().clone()
    }

    /// Number of payloads published so far.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Published> {
        // A panicking test thread must not hide what was published.
        self.log.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Sink for MemorySink {
    fn publish(&mut self, source: Source, payload: &[u8]) -> Result<(), PublishError> {
        self.lock().push((source, payload.to_vec()));
        Ok(())
    }
}

/// Sink that fails the first `failures` publishes, then records like
/// [`MemorySink`].
#[derive(Clone)]
pub struct FlakySink {
    remaining_failures: Arc<Mutex<usize>>,
    inner: MemorySink,
}

impl FlakySink {
    pub fn new(failures: usize) -> Self {
        Self {
            remaining_failures: Arc::new(Mutex::new(failures)),
            inner: MemorySink::new(),
        }
    }

    /// A sink that never accepts anything.
    pub fn always_failing() -> Self {
        Self::new(usize::MAX)
    }

    /// Handle onto the payloads that eventually got through.
    pub fn delivered(&self) -> MemorySink {
        self.inner.clone()
    }
}

impl Sink for FlakySink {
    fn publish(&mut self, source: Source, payload: &[u8]) -> Result<(), PublishError> {
        {
            let mut left = self
                .remaining_failures
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            if *left > 0 {
                *left -= 1;
                return Err(PublishError::SinkUnavailable {
                    reason: "flaky sink refused payload".into(),
                });
            }
        }
        self.inner.publish(source, payload)
    }
}
