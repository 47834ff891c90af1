//! Domain events emitted by the patch history.
//!
//! A presentation layer subscribes through
//! `PatchHistory::set_on_change`; events are delivered synchronously after
//! the mutation commits and name which observable property changed value.

use serde::{Deserialize, Serialize};

/// Observable state change of a `PatchHistory`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryEvent {
    /// `undo_capacity` changed value.
    CapacityChanged,
    /// `undo_level` changed value (an entry was added, undone away, or
    /// consolidated into an older one).
    LevelChanged,
    /// `granular_undo` was toggled.
    GranularityChanged,
}

/// Callback receiving history events. Subscribers must not assume delivery
/// is idempotent.
pub type ChangeCallback<'a> = Box<dyn FnMut(HistoryEvent) + 'a>;
