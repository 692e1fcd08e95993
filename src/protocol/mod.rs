//! Wire-level protocol: opcodes, masking, framing, and the HTTP upgrade.

pub mod frame;
pub mod handshake;
pub mod mask;
pub mod opcode;

pub use frame::{Frame, FrameReader, FrameWriter, MAX_PAYLOAD_LEN};
pub use handshake::{UpgradeRequest, WS_GUID, WS_VERSION, compute_accept_key};
pub use mask::apply_mask;
pub use opcode::OpCode;
