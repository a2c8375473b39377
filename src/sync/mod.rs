//! Synchronization engine: data slot, controller, cursor pagination and
//! sparse page placement.

mod controller;
mod cursor;
mod event;
mod slot;
mod sparse;

pub use controller::{SyncConfig, SyncController};
pub use cursor::{CursorPage, CursorPaginatedSync, CursorState, Direction, NEXT_KEY, PREVIOUS_KEY};
pub use event::SyncEvent;
pub use slot::{DataSlot, SlotState};
pub use sparse::{create_sparse_array, materialize_page};
