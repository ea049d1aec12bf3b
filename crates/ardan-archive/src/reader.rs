//! Archive reading.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use ardan_timeline::FleetHistory;

use crate::codec::decode_history;
use crate::error::ArchiveError;

/// Read a whole archive from `r` and validate it.
///
/// The input is buffered in full first so every declared count can be
/// checked against what is actually there.
pub fn read_history<R: Read>(mut r: R) -> Result<FleetHistory, ArchiveError> {
    let mut buf = Vec::new();
    r.read_to_end(&mut buf)?;
    decode_history(&buf)
}

/// Read an archive from the file at `path`.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<FleetHistory, ArchiveError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let history = read_history(BufReader::new(file))?;
    log::info!(
        "loaded {} entities ({} entries) from {}",
        history.entities.len(),
        history.entry_count(),
        path.display()
    );
    Ok(history)
}
