//! Binary encode/decode for the archive format.
//!
//! Writers stream to any `Write`. Decoding works on an in-memory slice so
//! that every declared count can be checked against the bytes actually
//! remaining before anything is allocated.

use std::io::Write;

use ardan_core::{BranchIndex, EntityId, Rgb, State};
use ardan_timeline::{BranchSet, EntityHistory, FleetHistory, Timeline};

use crate::error::ArchiveError;
use crate::{FORMAT_VERSION, MAGIC};

/// Encoded size of one [`State`].
pub const STATE_LEN: usize = 3 + 5 * 8;

/// Smallest possible encoded branch: cursor flag plus entry count.
const MIN_BRANCH_LEN: usize = 1 + 4;

// ── Primitive writers ───────────────────────────────────────────

/// Write a single byte.
pub fn write_u8(w: &mut dyn Write, v: u8) -> Result<(), ArchiveError> {
    w.write_all(&[v])?;
    Ok(())
}

/// Write a little-endian u32.
pub fn write_u32_le(w: &mut dyn Write, v: u32) -> Result<(), ArchiveError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian f64.
pub fn write_f64_le(w: &mut dyn Write, v: f64) -> Result<(), ArchiveError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a count or index as u32, rejecting values that do not fit.
fn write_len(w: &mut dyn Write, v: usize, what: &str) -> Result<(), ArchiveError> {
    let v = u32::try_from(v).map_err(|_| ArchiveError::Malformed {
        detail: format!("{what} {v} does not fit in u32"),
    })?;
    write_u32_le(w, v)
}

/// Write one state.
pub fn write_state(w: &mut dyn Write, s: &State) -> Result<(), ArchiveError> {
    w.write_all(&[s.color.r, s.color.g, s.color.b])?;
    write_f64_le(w, s.radio_duty)?;
    write_f64_le(w, s.radio_tx_ratio)?;
    write_f64_le(w, s.radio_rx_ratio)?;
    write_f64_le(w, s.radio_ix_ratio)?;
    write_f64_le(w, s.timestamp)
}

// ── Slice reader ────────────────────────────────────────────────

/// Bounds-checked little-endian reader over a byte slice.
pub struct SliceReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> SliceReader<'a> {
    /// Start reading at the beginning of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take<const N: usize>(&mut self, what: &str) -> Result<[u8; N], ArchiveError> {
        let end = self.pos.checked_add(N).filter(|&e| e <= self.buf.len());
        let Some(end) = end else {
            return Err(ArchiveError::Malformed {
                detail: format!(
                    "truncated {what}: need {N} bytes at offset {}, have {}",
                    self.pos,
                    self.remaining()
                ),
            });
        };
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..end]);
        self.pos = end;
        Ok(out)
    }

    /// Read a single byte.
    pub fn u8(&mut self, what: &str) -> Result<u8, ArchiveError> {
        Ok(self.take::<1>(what)?[0])
    }

    /// Read a little-endian u32.
    pub fn u32(&mut self, what: &str) -> Result<u32, ArchiveError> {
        Ok(u32::from_le_bytes(self.take(what)?))
    }

    /// Read a little-endian f64.
    pub fn f64(&mut self, what: &str) -> Result<f64, ArchiveError> {
        Ok(f64::from_le_bytes(self.take(what)?))
    }

    /// Read a presence flag (0 or 1).
    pub fn flag(&mut self, what: &str) -> Result<bool, ArchiveError> {
        match self.u8(what)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ArchiveError::Malformed {
                detail: format!("{what} flag must be 0 or 1, got {other}"),
            }),
        }
    }

    /// Read a count of items each at least `min_item` bytes long,
    /// rejecting counts the remaining input cannot possibly hold.
    pub fn count(&mut self, what: &str, min_item: usize) -> Result<usize, ArchiveError> {
        let n = self.u32(what)? as usize;
        if n.saturating_mul(min_item) > self.remaining() {
            return Err(ArchiveError::Malformed {
                detail: format!(
                    "{what} {n} needs at least {} bytes, only {} remain",
                    n.saturating_mul(min_item),
                    self.remaining()
                ),
            });
        }
        Ok(n)
    }

    /// Read one state.
    pub fn state(&mut self) -> Result<State, ArchiveError> {
        let [r, g, b] = self.take::<3>("state colour")?;
        Ok(State {
            color: Rgb::new(r, g, b),
            radio_duty: self.f64("radio_duty")?,
            radio_tx_ratio: self.f64("radio_tx_ratio")?,
            radio_rx_ratio: self.f64("radio_rx_ratio")?,
            radio_ix_ratio: self.f64("radio_ix_ratio")?,
            timestamp: self.f64("timestamp")?,
        })
    }
}

// ── History encode/decode ───────────────────────────────────────

/// Encode a whole fleet history, header included.
pub fn encode_history(w: &mut dyn Write, history: &FleetHistory) -> Result<(), ArchiveError> {
    history.validate()?;

    w.write_all(&MAGIC)?;
    write_u8(w, FORMAT_VERSION)?;
    write_len(w, history.active_branch.0, "active branch")?;
    write_len(w, history.branch_count, "branch count")?;
    write_len(w, history.entities.len(), "entity count")?;

    for e in &history.entities {
        write_u32_le(w, e.entity.0)?;
        write_state(w, &e.live)?;
        match e.branches.baseline() {
            Some(base) => {
                write_u8(w, 1)?;
                write_state(w, base)?;
            }
            None => write_u8(w, 0)?,
        }
        for tl in e.branches.branches() {
            match tl.cursor() {
                Some(c) => {
                    write_u8(w, 1)?;
                    write_len(w, c, "cursor")?;
                }
                None => write_u8(w, 0)?,
            }
            write_len(w, tl.len(), "entry count")?;
            for s in tl.entries() {
                write_state(w, s)?;
            }
        }
    }
    Ok(())
}

/// Decode and validate a whole fleet history.
///
/// Trailing bytes after the last entity are rejected.
pub fn decode_history(bytes: &[u8]) -> Result<FleetHistory, ArchiveError> {
    let mut r = SliceReader::new(bytes);

    if r.take::<4>("magic").map_err(|_| ArchiveError::InvalidMagic)? != MAGIC {
        return Err(ArchiveError::InvalidMagic);
    }
    let version = r.u8("version")?;
    if version != FORMAT_VERSION {
        return Err(ArchiveError::UnsupportedVersion { found: version });
    }

    let active = BranchIndex(r.u32("active branch")? as usize);
    let branch_count = r.u32("branch count")? as usize;
    let min_entity = 4 + STATE_LEN + 1 + branch_count.saturating_mul(MIN_BRANCH_LEN);
    let entity_count = r.count("entity count", min_entity)?;

    let mut entities = Vec::with_capacity(entity_count);
    for _ in 0..entity_count {
        let entity = EntityId(r.u32("entity id")?);
        let live = r.state()?;
        let baseline = if r.flag("baseline")? {
            Some(r.state()?)
        } else {
            None
        };

        let mut timelines = Vec::with_capacity(branch_count);
        for _ in 0..branch_count {
            let cursor = if r.flag("cursor")? {
                Some(r.u32("cursor")? as usize)
            } else {
                None
            };
            let n = r.count("entry count", STATE_LEN)?;
            let mut entries = Vec::with_capacity(n);
            for _ in 0..n {
                entries.push(r.state()?);
            }
            timelines.push(Timeline::from_entries(entries, cursor)?);
        }

        entities.push(EntityHistory {
            entity,
            live,
            branches: BranchSet::from_parts(timelines, active, baseline)?,
        });
    }

    if r.remaining() != 0 {
        return Err(ArchiveError::Malformed {
            detail: format!("{} trailing bytes after last entity", r.remaining()),
        });
    }

    let history = FleetHistory {
        active_branch: active,
        branch_count,
        entities,
    };
    history.validate()?;
    Ok(history)
}
