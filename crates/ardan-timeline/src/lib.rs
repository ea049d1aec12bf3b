//! Branching time series of sensor states.
//!
//! - [`Timeline`] is one ordered, append-only series of [`State`]s with a
//!   read cursor. Timestamps strictly increase with index.
//! - [`BranchSet`] is an entity's list of alternative timelines with one
//!   active branch, created by forking a prefix of an existing branch.
//! - [`FleetHistory`] is the plain-data form of every entity's history,
//!   used to copy a registry out to (and back in from) persistence.
//!
//! Nothing here knows about other entities: keeping branch indices in
//! lockstep across a fleet is the registry's job.
//!
//! [`State`]: ardan_core::State

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod branch;
pub mod history;
pub mod timeline;

pub use branch::BranchSet;
pub use history::{EntityHistory, FleetHistory};
pub use timeline::Timeline;
