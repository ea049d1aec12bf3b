//! Core types for the Ardan sensor history engine.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by every other crate in the workspace: entity
//! and branch identifiers, the immutable [`State`] value and its partial
//! update form [`StateFields`], decoded [`PacketEnvelope`]s, the
//! [`Sink`] publish seam, and the error taxonomy.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod packet;
pub mod sink;
pub mod state;

pub use error::{DecodeError, NetworkError, PublishError, TimelineError};
pub use id::{BranchIndex, EntityId};
pub use packet::{Command, PacketEnvelope, StateUpdate};
pub use sink::{NullSink, Sink, Source};
pub use state::{Rgb, State, StateFields};
