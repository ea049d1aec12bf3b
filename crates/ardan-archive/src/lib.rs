//! Binary persistence of recorded fleet history.
//!
//! The engine keeps history in memory only. This crate is the explicit
//! persistence collaborator: it writes a [`FleetHistory`] copied out of
//! the registry to any `Write` sink and reads it back.
//!
//! # Format
//!
//! ```text
//! [MAGIC "ARDN"] [VERSION u8]
//! [active_branch u32] [branch_count u32] [entity_count u32]
//! [Entity 1] [Entity 2] ... [Entity N]
//! ```
//!
//! Each entity record is its id, its live state, a presence-flagged
//! baseline state, then `branch_count` branches of
//! `[cursor flag u8 (+ u32)] [entry_count u32] [State...]`.
//! A state is `r g b` bytes followed by five `f64`s (duty, tx, rx, ix,
//! timestamp). All integers and floats are little-endian.
//!
//! [`FleetHistory`]: ardan_timeline::FleetHistory

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use error::ArchiveError;
pub use reader::{load_from_path, read_history};
pub use writer::{save_to_path, write_history};

/// Magic bytes at the start of every archive.
pub const MAGIC: [u8; 4] = *b"ARDN";

/// Current binary format version.
pub const FORMAT_VERSION: u8 = 1;
