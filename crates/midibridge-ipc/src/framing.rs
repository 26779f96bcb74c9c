//! Length-prefixed bincode frames.
//!
//! Each frame is a big-endian `u32` byte count followed by the bincode body.

use crate::{IpcError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Serialize `msg` into a complete frame.
pub fn encode_frame<T: Serialize>(msg: &T, max_len: usize) -> Result<Vec<u8>> {
    let body = bincode::serialize(msg)?;
    if body.len() > max_len {
        return Err(IpcError::FrameTooLarge {
            len: body.len(),
            max: max_len,
        });
    }

    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

pub async fn write_frame<W, T>(writer: &mut W, msg: &T, max_len: usize) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = encode_frame(msg, max_len)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame. Returns `Ok(None)` if the stream ends cleanly between frames.
pub async fn read_frame<R, T>(reader: &mut R, max_len: usize) -> Result<Option<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if len > max_len {
        return Err(IpcError::FrameTooLarge { len, max: max_len });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    let msg = bincode::deserialize(&body)?;
    Ok(Some(msg))
}
