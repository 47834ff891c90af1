//! Capacity-bounded undo history of patches over a read-only byte source.
//!
//! The history is a single-writer, synchronous structure: an ordered
//! sequence of [`Patch`] entries, oldest first, where each entry's offsets
//! are relative to the document state left by its predecessor. Adding and
//! undoing are pure offset arithmetic; the backing [`BinarySource`] is read
//! only when capacity pressure forces two entries with a genuine byte gap
//! between them to be consolidated into one.

use anyhow::{bail, Context, Result};
use tracing::{debug, trace};

use crate::event::{ChangeCallback, HistoryEvent};
use crate::patch::Patch;
use crate::source::BinarySource;

/// Undo depth used by [`PatchHistory::new`].
pub const DEFAULT_UNDO_CAPACITY: usize = 100;

/// Bounded undo stack over a borrowed binary source.
///
/// The source reference lives as long as the history; the history never
/// writes through it. In a concurrent setting the whole history must sit
/// behind one exclusive lock per document, since consolidation rewrites
/// arbitrary prefixes of the sequence.
pub struct PatchHistory<'a> {
    /// Oldest first. Entry `k` is relative to the document produced by
    /// entries `0..k`; entry 0 is relative to the source itself.
    patches: Vec<Patch>,
    undo_capacity: usize,
    granular_undo: bool,
    source: &'a dyn BinarySource,
    on_change: Option<ChangeCallback<'a>>,
}

impl<'a> PatchHistory<'a> {
    pub fn new(source: &'a dyn BinarySource) -> PatchHistory<'a> {
        PatchHistory {
            patches: Vec::new(),
            undo_capacity: DEFAULT_UNDO_CAPACITY,
            granular_undo: false,
            source,
            on_change: None,
        }
    }

    /// Like [`PatchHistory::new`] with an explicit undo depth; `capacity`
    /// below 1 is rejected.
    pub fn with_capacity(source: &'a dyn BinarySource, capacity: usize) -> Result<PatchHistory<'a>> {
        if capacity < 1 {
            bail!("undo capacity must be at least 1, got {}", capacity);
        }
        let mut history = PatchHistory::new(source);
        history.undo_capacity = capacity;
        Ok(history)
    }

    /// Subscribe to [`HistoryEvent`] notifications. Events fire
    /// synchronously after the mutation commits.
    pub fn set_on_change(&mut self, callback: impl FnMut(HistoryEvent) + 'a) {
        self.on_change = Some(Box::new(callback));
    }

    /// Number of entries currently recorded.
    pub fn undo_level(&self) -> usize {
        self.patches.len()
    }

    pub fn undo_capacity(&self) -> usize {
        self.undo_capacity
    }

    pub fn granular_undo(&self) -> bool {
        self.granular_undo
    }

    /// The recorded entries, oldest first. Each entry's offsets are
    /// relative to its predecessor's output, not to the original file.
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn oldest(&self) -> Option<&Patch> {
        self.patches.first()
    }

    pub fn newest(&self) -> Option<&Patch> {
        self.patches.last()
    }

    /// Record one edit. In non-granular mode the edit is first offered to
    /// the newest entry for an arithmetic merge and produces no new entry
    /// on success. At capacity, the oldest entries are consolidated to keep
    /// the level within bounds.
    pub fn add(&mut self, patch: Patch) -> Result<()> {
        if !self.granular_undo {
            if let Some(newest) = self.patches.last_mut() {
                if let Some(combined) = newest.merged(&patch) {
                    trace!(?patch, "fused edit into newest history entry");
                    *newest = combined;
                    return Ok(());
                }
            }
        }

        let before = self.patches.len();
        if before == self.undo_capacity {
            if self.undo_capacity == 1 {
                // Single-slot history: the incoming edit folds straight
                // into the only entry, arithmetically or via the source.
                let oldest = &self.patches[0];
                let combined = match oldest.merged(&patch) {
                    Some(combined) => combined,
                    None => self.combine_patches(oldest, &patch)?,
                };
                self.patches[0] = combined;
                return Ok(());
            }
            self.combine_earliest(1)?;
        }
        self.patches.push(patch);
        if self.patches.len() != before {
            self.emit(HistoryEvent::LevelChanged);
        }
        Ok(())
    }

    /// Discard the `count` newest entries. Pure truncation: there is no
    /// redo, discarded entries are gone.
    pub fn undo(&mut self, count: usize) -> Result<()> {
        let level = self.patches.len();
        if count < 1 {
            bail!("undo count must be at least 1, got {}", count);
        }
        if count > level {
            bail!("cannot undo {} steps: only {} recorded", count, level);
        }
        self.patches.truncate(level - count);
        self.emit(HistoryEvent::LevelChanged);
        Ok(())
    }

    /// Change the maximum undo depth. Lowering below the current level
    /// first consolidates the oldest entries down to the new capacity.
    pub fn set_undo_capacity(&mut self, capacity: usize) -> Result<()> {
        if capacity < 1 {
            bail!("undo capacity must be at least 1, got {}", capacity);
        }
        let before = self.patches.len();
        if before > capacity {
            self.combine_earliest(before - capacity)?;
        }
        if self.patches.len() != before {
            self.emit(HistoryEvent::LevelChanged);
        }
        if capacity != self.undo_capacity {
            self.undo_capacity = capacity;
            self.patches.shrink_to_fit();
            self.emit(HistoryEvent::CapacityChanged);
        }
        Ok(())
    }

    /// Lower the undo level by consolidating the oldest entries. Raising
    /// the level is impossible (entries cannot be synthesized) and the base
    /// entry can never be erased, so `level` must stay within
    /// `1..=undo_level`.
    pub fn set_undo_level(&mut self, level: usize) -> Result<()> {
        let current = self.patches.len();
        if level > current {
            bail!(
                "cannot raise undo level to {}: only {} entries recorded",
                level,
                current
            );
        }
        if level < 1 {
            bail!("undo level must stay at least 1, got {}", level);
        }
        if level == current {
            return Ok(());
        }
        self.combine_earliest(current - level)?;
        self.emit(HistoryEvent::LevelChanged);
        Ok(())
    }

    pub fn set_granular_undo(&mut self, granular: bool) {
        if self.granular_undo != granular {
            self.granular_undo = granular;
            self.emit(HistoryEvent::GranularityChanged);
        }
    }

    /// Fold the oldest `count + 1` entries into one entry with the same
    /// cumulative effect, then shift the rest down. Adjacent pairs merge
    /// arithmetically where possible; pairs separated by untouched bytes
    /// are replayed over the source instead.
    fn combine_earliest(&mut self, count: usize) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let level = self.patches.len();
        assert!(
            count < level,
            "combine_earliest({}) with only {} entries",
            count,
            level
        );
        debug!(count, level, "consolidating earliest history entries");

        let mut combined = self.patches[0].clone();
        for later in &self.patches[1..=count] {
            combined = match combined.merged(later) {
                Some(combined) => combined,
                None => self.combine_patches(&combined, later)?,
            };
        }
        self.patches.drain(..count);
        self.patches[0] = combined;
        Ok(())
    }

    /// Synthesize one patch equivalent to `earlier` followed by `later`
    /// when no arithmetic merge exists, by replaying both over the exact
    /// source range their combined effect covers.
    ///
    /// Only this path ever reads the source, and only over the minimal
    /// range: from `earlier`'s start to where `later` ends (mapped back
    /// through `earlier`'s shift), or from `later`'s start when it precedes
    /// `earlier` entirely.
    fn combine_patches(&self, earlier: &Patch, later: &Patch) -> Result<Patch> {
        let shifted = earlier.shifted_end();
        let (range_start, range_end) = if later.start_offset() > shifted {
            let end = (later.end_offset() as i64 - earlier.end_move()) as u64;
            (earlier.start_offset(), end)
        } else if later.end_offset() < earlier.start_offset() {
            (later.start_offset(), earlier.end_offset())
        } else {
            // Touching patches always merge arithmetically; reaching this
            // point means a Patch invariant is broken somewhere upstream.
            panic!(
                "combine_patches on a pair that should have merged: {:?} then {:?}",
                earlier, later
            );
        };

        let range_len = (range_end - range_start) as usize;
        let headroom = (earlier.end_move().max(0) + later.end_move().max(0)) as usize;
        let mut buf = vec![0u8; range_len + headroom];
        debug!(
            range_start,
            range_len, "consolidation replaying patch pair over source bytes"
        );
        self.source
            .read_into(range_start, &mut buf[..range_len])
            .with_context(|| {
                format!(
                    "consolidation read of [{}, {}) from binary source failed",
                    range_start, range_end
                )
            })?;

        let mut active = range_len;
        active = (active as i64 + apply_patch(&mut buf, earlier, range_start, active)) as usize;
        active = (active as i64 + apply_patch(&mut buf, later, range_start, active)) as usize;
        buf.truncate(active);

        Ok(Patch::replacement(range_start, range_len as u64, buf))
    }

    fn emit(&mut self, event: HistoryEvent) {
        if let Some(callback) = self.on_change.as_mut() {
            callback(event);
        }
    }
}

/// Splice `patch` into `buf` in place. `coord_offset` is the document
/// offset of `buf[0]` in the patch's coordinate space; `active_len` is the
/// occupied prefix of `buf`. Returns the patch's `end_move` for the caller
/// to accumulate into its running length.
fn apply_patch(buf: &mut [u8], patch: &Patch, coord_offset: u64, active_len: usize) -> i64 {
    let rel_start = (patch.start_offset() - coord_offset) as usize;
    let rel_end = (patch.end_offset() - coord_offset) as usize;
    let end_move = patch.end_move();
    assert!(
        rel_start <= rel_end && rel_end <= active_len,
        "patch {:?} lies outside the working buffer (coord_offset {}, active {})",
        patch,
        coord_offset,
        active_len
    );

    if end_move != 0 {
        let shifted_end = (rel_end as i64 + end_move) as usize;
        let new_len = (active_len as i64 + end_move) as usize;
        assert!(
            new_len <= buf.len(),
            "tail shift of {:?} does not fit the working buffer (active {}, capacity {})",
            patch,
            active_len,
            buf.len()
        );
        // copy_within is memmove: safe for overlapping source and target
        // ranges in either direction.
        buf.copy_within(rel_end..active_len, shifted_end);
    }

    let data = patch.bytes();
    buf[rel_start..rel_start + data.len()].copy_from_slice(data);
    end_move
}
