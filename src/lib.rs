//! Incremental editing of large binary files without rewriting them.
//!
//! Edits are recorded as small [`Patch`] records layered over a read-only
//! [`BinarySource`]; a [`PatchHistory`] keeps a bounded undo stack of those
//! records, folding adjacent edits together arithmetically and replaying
//! over source bytes only when capacity pressure meets a genuine gap.

pub mod event;
pub mod history;
pub mod patch;
pub mod source;

pub use event::HistoryEvent;
pub use history::{PatchHistory, DEFAULT_UNDO_CAPACITY};
pub use patch::{Patch, PatchKind};
pub use source::{BinarySource, FileSource, MemorySource};
