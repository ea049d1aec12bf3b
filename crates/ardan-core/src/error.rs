//! Error types for the Ardan engine, organized by subsystem: wire codec,
//! network channel, timeline/registry, and forwarder.
//!
//! Codec and network errors are handled where they occur and never reach
//! the registry. Timeline errors are surfaced to the registry caller.
//! Publish errors are counted and logged, never propagated.

use thiserror::Error;

use crate::id::{BranchIndex, EntityId};

/// Errors from decoding a wire packet.
///
/// All variants are local and non-fatal: the receive loop counts the
/// failure and moves on to the next datagram.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Header present but the body is truncated, oversized for its kind,
    /// or carries an invalid value.
    #[error("malformed packet: {detail}")]
    Malformed {
        /// Human-readable description of what went wrong.
        detail: String,
    },
    /// The type tag is not recognized. Forward-compatible: drop the packet.
    #[error("unknown packet type tag {tag:#04x}")]
    UnknownType {
        /// The unrecognized tag.
        tag: u8,
    },
    /// The declared packet size exceeds the datagram bound.
    #[error("declared packet size {declared} exceeds datagram bound {max}")]
    SizeMismatch {
        /// Total packet size implied by the length prefix.
        declared: usize,
        /// The configured datagram bound.
        max: usize,
    },
}

/// Errors from the datagram socket.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// The listening socket could not be bound. Fatal at startup.
    #[error("failed to bind {addr}: {reason}")]
    BindFailed {
        /// The address that was requested.
        addr: String,
        /// The underlying OS error.
        reason: String,
    },
    /// A send failed after exhausting its retries; the packet was dropped.
    #[error("send failed after {attempts} attempts: {reason}")]
    SendFailed {
        /// Number of attempts made, including the first.
        attempts: u32,
        /// The last underlying OS error.
        reason: String,
    },
    /// The outbound command queue is full; the command was dropped.
    #[error("outbound command queue full")]
    OutboundFull,
}

/// Errors from timeline and registry operations.
///
/// Surfaced to the caller of the registry operation. Never silently
/// ignored, never fatal.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum TimelineError {
    /// An appended entry does not come strictly after the last entry.
    #[error("timestamp {attempted} does not follow last recorded timestamp {last}")]
    InvalidOrder {
        /// Timestamp of the last entry in the branch.
        last: f64,
        /// The rejected timestamp.
        attempted: f64,
    },
    /// A fleet snapshot timestamp does not follow an entity's last entry.
    #[error("entity {entity}: snapshot at {attempted} does not follow {last}")]
    NonMonotonicTimestamp {
        /// The entity whose snapshot was rejected.
        entity: EntityId,
        /// Timestamp of that entity's last entry in the active branch.
        last: f64,
        /// The rejected timestamp.
        attempted: f64,
    },
    /// A branch index is out of range, or branch sets disagree in length.
    #[error("branch index {index} invalid for branch count {branch_count}")]
    InvalidBranchIndex {
        /// The offending index.
        index: BranchIndex,
        /// Number of branches available where the check failed.
        branch_count: usize,
    },
    /// The operation needs at least one recorded entry.
    #[error("timeline has no recorded entries")]
    EmptyHistory,
    /// A cursor position is past the end of its timeline.
    #[error("cursor {cursor} out of range for timeline of {len} entries")]
    CursorOutOfRange {
        /// The requested cursor.
        cursor: usize,
        /// Number of entries in the timeline.
        len: usize,
    },
    /// No entity with this id is registered.
    #[error("entity {0} is not registered")]
    UnknownEntity(EntityId),
    /// An entity with this id is already registered.
    #[error("entity {0} is already registered")]
    DuplicateEntity(EntityId),
}

/// Errors from publishing to the external sink. Always non-fatal.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PublishError {
    /// The sink rejected or could not accept the payload.
    #[error("sink unavailable: {reason}")]
    SinkUnavailable {
        /// Description of the failure.
        reason: String,
    },
    /// The forwarder's buffer is full; the payload was dropped.
    #[error("publish buffer full")]
    BufferFull,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_carry_context() {
        let e = DecodeError::UnknownType { tag: 0x7f };
        assert_eq!(e.to_string(), "unknown packet type tag 0x7f");

        let e = TimelineError::InvalidBranchIndex {
            index: BranchIndex(3),
            branch_count: 2,
        };
        assert_eq!(e.to_string(), "branch index 3 invalid for branch count 2");

        let e = TimelineError::UnknownEntity(EntityId(9));
        assert_eq!(e.to_string(), "entity 9 is not registered");
    }
}
