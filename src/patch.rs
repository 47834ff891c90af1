//! Patch records for incremental binary editing.
//!
//! A [`Patch`] describes one edit as the byte range it overwrites in the
//! document *as it existed immediately before the patch*, plus the signed
//! displacement of every offset at or after that range. Insert, delete and
//! replace are all the same record with different degenerate shapes.
//!
//! Two patches applied back to back can often be folded into one equivalent
//! patch with pure offset arithmetic; [`Patch::merged`] does so whenever no
//! gap of untouched bytes separates the two edits. When a gap does exist the
//! history falls back to replaying both patches over source bytes (see
//! `history::PatchHistory`).

use serde::{Deserialize, Serialize};

/// Classification of a patch, derived from its offsets and payload.
///
/// Never stored: always recomputed from the numeric invariants, so a patch
/// can collapse from `Replace` to `Insert` or `Delete` through merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchKind {
    /// No original bytes consumed (`start_offset == end_offset`).
    Insert,
    /// Original bytes consumed, nothing inserted (`data` empty).
    Delete,
    /// Original bytes consumed and substituted.
    Replace,
}

/// One edit over a binary document.
///
/// `start_offset..end_offset` is the consumed range in the pre-edit
/// coordinate space; `data` is what replaces it; `end_move` is the resulting
/// shift of everything at or after `end_offset`. The invariant
/// `end_move == data.len() - (end_offset - start_offset)` holds for every
/// constructed patch and is preserved by merging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    start_offset: u64,
    end_offset: u64,
    end_move: i64,
    data: Vec<u8>,
}

impl Patch {
    /// Pure insertion of `data` at `offset`; consumes no original bytes.
    pub fn insertion(offset: u64, data: impl Into<Vec<u8>>) -> Patch {
        Patch::from_parts(offset, offset, data.into())
    }

    /// Pure deletion of `span` bytes starting at `offset`.
    ///
    /// A zero-length span is accepted and yields a degenerate no-op patch.
    pub fn deletion(offset: u64, span: u64) -> Patch {
        Patch::from_parts(offset, offset + span, Vec::new())
    }

    /// Replacement of `span` bytes at `offset` with `data`.
    ///
    /// The derived kind collapses to `Insert` when `span == 0` and to
    /// `Delete` when `data` is empty.
    pub fn replacement(offset: u64, span: u64, data: impl Into<Vec<u8>>) -> Patch {
        Patch::from_parts(offset, offset + span, data.into())
    }

    /// Build a patch with `end_move` derived from the invariant, so every
    /// patch is consistent by construction.
    fn from_parts(start_offset: u64, end_offset: u64, data: Vec<u8>) -> Patch {
        debug_assert!(end_offset >= start_offset);
        let end_move = data.len() as i64 - (end_offset - start_offset) as i64;
        Patch {
            start_offset,
            end_offset,
            end_move,
            data,
        }
    }

    /// First consumed offset, in the coordinates of the document state this
    /// patch was made against.
    pub fn start_offset(&self) -> u64 {
        self.start_offset
    }

    /// One past the last consumed offset, same coordinate space as
    /// [`Patch::start_offset`].
    pub fn end_offset(&self) -> u64 {
        self.end_offset
    }

    /// Signed shift applied to every offset at or after `end_offset` once
    /// the patch is applied.
    pub fn end_move(&self) -> i64 {
        self.end_move
    }

    /// Number of original bytes this patch consumes.
    pub fn span(&self) -> u64 {
        self.end_offset - self.start_offset
    }

    /// The inserted/substituted bytes, as a defensive copy. History state
    /// can never be mutated through a returned buffer.
    pub fn data(&self) -> Vec<u8> {
        self.data.clone()
    }

    /// Borrow of the payload for in-crate buffer surgery.
    pub(crate) fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Where the affected region ends in this patch's *post-apply*
    /// coordinate space. Equals `start_offset + data.len()`, so it never
    /// underflows.
    pub fn shifted_end(&self) -> u64 {
        (self.end_offset as i64 + self.end_move) as u64
    }

    /// The derived classification. `Insert` iff no original bytes are
    /// consumed; a degenerate patch consuming and inserting nothing also
    /// reads as `Insert`.
    pub fn kind(&self) -> PatchKind {
        if self.start_offset == self.end_offset {
            PatchKind::Insert
        } else if self.data.is_empty() {
            PatchKind::Delete
        } else {
            PatchKind::Replace
        }
    }

    /// Fold `later` (applied strictly after `self`, with offsets in `self`'s
    /// post-apply coordinate space) into a single equivalent patch.
    ///
    /// Returns `None`, leaving both inputs untouched, when a gap of
    /// untouched bytes lies between the two edits; such a pair can only be
    /// combined by replaying it over source bytes.
    pub fn merged(&self, later: &Patch) -> Option<Patch> {
        let new_end = self.shifted_end();

        // A representable merge needs the edits to touch: `later` must not
        // end before our start nor begin past the end of our inserted data.
        if later.end_offset < self.start_offset || later.start_offset > new_end {
            return None;
        }

        let combined = if later.start_offset == new_end {
            // Later edit begins exactly where our inserted data ends.
            let mut data = self.data.clone();
            data.extend_from_slice(&later.data);
            Patch::from_parts(self.start_offset, self.end_offset + later.span(), data)
        } else if later.end_offset == self.start_offset {
            // Later edit sits immediately before us; offsets below our start
            // are untouched by us, so they line up with original coordinates.
            let mut data = later.data.clone();
            data.extend_from_slice(&self.data);
            Patch::from_parts(later.start_offset, self.end_offset, data)
        } else if later.start_offset <= self.start_offset {
            // Later edit overwrites our front, possibly past our end.
            let eaten = ((later.end_offset - self.start_offset) as usize).min(self.data.len());
            let overshoot = later.end_offset.saturating_sub(new_end);
            let mut data = Vec::with_capacity(later.data.len() + self.data.len() - eaten);
            data.extend_from_slice(&later.data);
            data.extend_from_slice(&self.data[eaten..]);
            Patch::from_parts(later.start_offset, self.end_offset + overshoot, data)
        } else {
            // Later edit lands inside our inserted data, possibly running
            // past its end into original bytes.
            let own = (later.start_offset - self.start_offset) as usize;
            let suffix_from = (later.end_offset.min(new_end) - self.start_offset) as usize;
            let overshoot = later.end_offset.saturating_sub(new_end);
            let mut data =
                Vec::with_capacity(own + later.data.len() + self.data.len() - suffix_from);
            data.extend_from_slice(&self.data[..own]);
            data.extend_from_slice(&later.data);
            data.extend_from_slice(&self.data[suffix_from..]);
            Patch::from_parts(self.start_offset, self.end_offset + overshoot, data)
        };

        Some(combined)
    }
}
