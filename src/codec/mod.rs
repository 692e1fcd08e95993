//! Low-level binary codec helpers shared by the frame and handshake layers.

pub mod wire;

pub use wire::{ByteOrder, put_u16, put_u64, read_exactly, read_u16, read_u64};
