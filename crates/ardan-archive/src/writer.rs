//! Archive writing.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use ardan_timeline::FleetHistory;

use crate::codec::encode_history;
use crate::error::ArchiveError;

/// Write `history` to `w` and flush it.
///
/// Generic over `W: Write` so tests can use `Vec<u8>` and production
/// code can use `BufWriter<File>`.
///
/// # Examples
///
/// ```
/// use ardan_archive::{read_history, write_history};
/// use ardan_core::{BranchIndex, EntityId, State};
/// use ardan_timeline::{BranchSet, EntityHistory, FleetHistory};
///
/// let mut branches = BranchSet::new();
/// branches.append(State { radio_duty: 0.5, timestamp: 1.0, ..State::default() }).unwrap();
/// let history = FleetHistory {
///     active_branch: BranchIndex(0),
///     branch_count: 1,
///     entities: vec![EntityHistory { entity: EntityId(3), live: State::default(), branches }],
/// };
///
/// let mut buf = Vec::new();
/// write_history(&mut buf, &history).unwrap();
/// assert_eq!(read_history(buf.as_slice()).unwrap(), history);
/// ```
pub fn write_history<W: Write>(mut w: W, history: &FleetHistory) -> Result<(), ArchiveError> {
    encode_history(&mut w, history)?;
    w.flush()?;
    Ok(())
}

/// Write `history` to a file at `path`, replacing any existing file.
pub fn save_to_path(path: impl AsRef<Path>, history: &FleetHistory) -> Result<(), ArchiveError> {
    let path = path.as_ref();
    let file = File::create(path)?;
    write_history(BufWriter::new(file), history)?;
    log::info!(
        "saved {} entities ({} entries) to {}",
        history.entities.len(),
        history.entry_count(),
        path.display()
    );
    Ok(())
}
