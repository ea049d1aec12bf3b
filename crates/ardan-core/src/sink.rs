//! The publish seam between the forwarder and an external event sink.

use crate::error::PublishError;
use crate::id::EntityId;

/// Which logical sink channel a payload is addressed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Source {
    /// The per-entity channel, keyed by the entity that produced the update.
    Entity(EntityId),
    /// The fleet-wide channel.
    Fleet,
}

/// A best-effort, at-most-once event sink.
///
/// Implementations receive already-encoded packet bytes. A returned error
/// is counted and retried by the forwarder; it never reaches the ingestion
/// path.
pub trait Sink: Send {
    /// Publish one encoded packet on the channel named by `source`.
    fn publish(&mut self, source: Source, payload: &[u8]) -> Result<(), PublishError>;
}

/// A sink that accepts and discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl Sink for NullSink {
    fn publish(&mut self, _source: Source, _payload: &[u8]) -> Result<(), PublishError> {
        Ok(())
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn publish(&mut self, source: Source, payload: &[u8]) -> Result<(), PublishError> {
        (**self).publish(source, payload)
    }
}
