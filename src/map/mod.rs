//! Slab-grid map query surface and room registry

pub mod grid;
pub mod rooms;

pub use grid::{MapGrid, Slab, SlabKind};
pub use rooms::{Room, RoomKind, RoomRegistry};
