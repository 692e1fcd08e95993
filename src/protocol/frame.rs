//! Frame-level reader and writer for the RFC 6455 wire format.
//!
//! A frame starts with two header bytes: fin bit + opcode, then mask bit +
//! a 7-bit length selector. Selector values 126 and 127 switch to 16-bit and
//! 64-bit big-endian extended lengths. Masked frames carry a 4-byte key
//! before the payload.

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::codec::wire::{self, ByteOrder};
use crate::connection::Role;
use crate::error::{Error, Result};
use crate::protocol::mask::apply_mask;
use crate::protocol::opcode::OpCode;

/// Largest payload length accepted from the wire: 2 GiB.
///
/// The 64-bit length field could name far more, but nothing legitimate
/// sends it and capping here keeps allocation sizes sane.
pub const MAX_PAYLOAD_LEN: u64 = 2 * 1024 * 1024 * 1024;

const FIN_BIT: u8 = 0x80;
const MASK_BIT: u8 = 0x80;
const LEN_U16_MARKER: u8 = 126;
const LEN_U64_MARKER: u8 = 127;

/// A single decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Whether this is the final frame of a message.
    pub fin: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    /// Payload, already unmasked.
    pub payload: Vec<u8>,
    /// Whether the frame arrived masked.
    pub masked: bool,
}

/// Reads frames from the owned half of a stream.
pub struct FrameReader<R> {
    stream: R,
}

impl<R> FrameReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Wrap a readable stream half.
    pub fn new(stream: R) -> Self {
        Self { stream }
    }

    /// Borrow the underlying stream, for the pre-upgrade HTTP exchange.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.stream
    }

    /// Read one frame.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly before the first
    /// header byte. EOF in the middle of a frame is
    /// [`Error::UnexpectedEof`]; a 64-bit length above [`MAX_PAYLOAD_LEN`]
    /// is [`Error::PayloadOutOfRange`]; reserved opcodes are
    /// [`Error::ReservedOpcode`].
    pub async fn read_frame(&mut self) -> Result<Option<Frame>> {
        let byte1 = match self.read_first_byte().await? {
            Some(byte) => byte,
            None => return Ok(None),
        };
        let byte2 = wire::read_exactly(&mut self.stream, 1).await?[0];

        let fin = byte1 & FIN_BIT != 0;
        let opcode = OpCode::from_u8(byte1 & 0x0F)?;
        let masked = byte2 & MASK_BIT != 0;

        let len = match byte2 & 0x7F {
            LEN_U16_MARKER => u64::from(wire::read_u16(&mut self.stream, ByteOrder::Big).await?),
            LEN_U64_MARKER => {
                let len = wire::read_u64(&mut self.stream, ByteOrder::Big).await?;
                if len > MAX_PAYLOAD_LEN {
                    return Err(Error::PayloadOutOfRange {
                        len,
                        max: MAX_PAYLOAD_LEN,
                    });
                }
                len
            }
            literal => u64::from(literal),
        };

        let key = if masked {
            let bytes = wire::read_exactly(&mut self.stream, 4).await?;
            Some([bytes[0], bytes[1], bytes[2], bytes[3]])
        } else {
            None
        };

        let mut payload = wire::read_exactly(&mut self.stream, len as usize).await?;
        if let Some(key) = key {
            apply_mask(&mut payload, key);
        }

        Ok(Some(Frame {
            fin,
            opcode,
            payload,
            masked,
        }))
    }

    /// Read one frame, degrading malformed input to "no frame".
    ///
    /// Frame-level failures (reserved opcode, out-of-range length, EOF
    /// mid-frame) are logged and turned into `Ok(None)` so the receive path
    /// can close cleanly instead of tearing the connection down with an
    /// error. Genuine I/O failures still propagate.
    pub async fn read_frame_or_null(&mut self) -> Result<Option<Frame>> {
        match self.read_frame().await {
            Ok(frame) => Ok(frame),
            Err(err @ Error::Io(_)) => Err(err),
            Err(err) => {
                debug!(error = %err, "discarding malformed frame");
                Ok(None)
            }
        }
    }

    /// Read the first header byte, distinguishing clean EOF from data.
    async fn read_first_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.stream.read(&mut byte).await? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }
}

/// Writes frames to the owned half of a stream.
///
/// A client-role writer masks every frame with a fresh key; a server-role
/// writer never masks.
pub struct FrameWriter<W> {
    stream: W,
    role: Role,
    mask_counter: u32,
}

impl<W> FrameWriter<W>
where
    W: AsyncWrite + Unpin,
{
    /// Wrap a writable stream half.
    pub fn new(stream: W, role: Role) -> Self {
        Self {
            stream,
            role,
            mask_counter: random_mask_seed(),
        }
    }

    /// Serialize one frame into a single buffer and write it out.
    pub async fn write_frame(&mut self, opcode: OpCode, payload: &[u8], fin: bool) -> Result<()> {
        let key = self.role.must_mask().then(|| self.next_mask());

        let mut buf = BytesMut::with_capacity(payload.len() + 14);
        let mut byte1 = opcode.as_u8();
        if fin {
            byte1 |= FIN_BIT;
        }
        buf.put_u8(byte1);

        let mask_bit = if key.is_some() { MASK_BIT } else { 0 };
        if payload.len() < usize::from(LEN_U16_MARKER) {
            buf.put_u8(mask_bit | payload.len() as u8);
        } else if payload.len() <= usize::from(u16::MAX) {
            buf.put_u8(mask_bit | LEN_U16_MARKER);
            wire::put_u16(&mut buf, payload.len() as u16, ByteOrder::Big);
        } else {
            buf.put_u8(mask_bit | LEN_U64_MARKER);
            wire::put_u64(&mut buf, payload.len() as u64, ByteOrder::Big);
        }

        match key {
            Some(key) => {
                buf.put_slice(&key);
                let start = buf.len();
                buf.put_slice(payload);
                apply_mask(&mut buf[start..], key);
            }
            None => buf.put_slice(payload),
        }

        self.stream.write_all(&buf).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Write raw bytes, for the pre-upgrade HTTP exchange.
    pub async fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Flush buffered output.
    pub async fn flush(&mut self) -> Result<()> {
        self.stream.flush().await?;
        Ok(())
    }

    /// Shut down the write direction of the stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }

    /// Derive the next 4-byte mask key from the per-writer counter.
    fn next_mask(&mut self) -> [u8; 4] {
        self.mask_counter = self.mask_counter.wrapping_add(0x9E37_79B9);
        let mut x = self.mask_counter;
        x ^= x >> 16;
        x = x.wrapping_mul(0x85EB_CA6B);
        x ^= x >> 13;
        x = x.wrapping_mul(0xC2B2_AE35);
        x ^= x >> 16;
        x.to_be_bytes()
    }
}

/// Seed for the mask counter: OS entropy, or the clock if that fails.
fn random_mask_seed() -> u32 {
    let mut seed = [0u8; 4];
    if getrandom::getrandom(&mut seed).is_ok() {
        u32::from_ne_bytes(seed)
    } else {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0x5EED_5EED);
        nanos ^ 0x9E37_79B9
    }
}
