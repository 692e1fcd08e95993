//! Exact-length reads and endian-aware integer codec over async streams.
//!
//! WebSocket length fields are big-endian on the wire, but the helpers take
//! an explicit [`ByteOrder`] so callers state the direction at the call site.

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};

/// Byte order for multi-byte integer fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Most significant byte first (network order).
    Big,
    /// Least significant byte first.
    Little,
}

/// Read exactly `n` bytes from the stream.
///
/// Loops until the full count has arrived. Never returns a short buffer: if
/// the stream ends early this fails with [`Error::UnexpectedEof`] carrying
/// the number of bytes still outstanding.
pub async fn read_exactly<R>(stream: &mut R, n: usize) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; n];
    let mut filled = 0;
    while filled < n {
        let read = stream.read(&mut buf[filled..]).await?;
        if read == 0 {
            return Err(Error::UnexpectedEof { wanted: n - filled });
        }
        filled += read;
    }
    Ok(buf)
}

/// Read a `u16` in the given byte order.
pub async fn read_u16<R>(stream: &mut R, order: ByteOrder) -> Result<u16>
where
    R: AsyncRead + Unpin,
{
    let bytes = read_exactly(stream, 2).await?;
    let raw = [bytes[0], bytes[1]];
    Ok(match order {
        ByteOrder::Big => u16::from_be_bytes(raw),
        ByteOrder::Little => u16::from_le_bytes(raw),
    })
}

/// Read a `u64` in the given byte order.
pub async fn read_u64<R>(stream: &mut R, order: ByteOrder) -> Result<u64>
where
    R: AsyncRead + Unpin,
{
    let bytes = read_exactly(stream, 8).await?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes);
    Ok(match order {
        ByteOrder::Big => u64::from_be_bytes(raw),
        ByteOrder::Little => u64::from_le_bytes(raw),
    })
}

/// Append a `u16` to the buffer in the given byte order.
pub fn put_u16(buf: &mut BytesMut, value: u16, order: ByteOrder) {
    match order {
        ByteOrder::Big => buf.put_u16(value),
        ByteOrder::Little => buf.put_u16_le(value),
    }
}

/// Append a `u64` to the buffer in the given byte order.
pub fn put_u64(buf: &mut BytesMut, value: u64, order: ByteOrder) {
    match order {
        ByteOrder::Big => buf.put_u64(value),
        ByteOrder::Little => buf.put_u64_le(value),
    }
}
