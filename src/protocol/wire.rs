//! Length-prefixed message reader and writer
//!
//! Every frame on the wire is a little-endian `u16` length followed by
//! that many payload bytes. Inside a payload, multi-byte integers are
//! little-endian and strings carry a `u16` length prefix. Reads are
//! checked; running past the end of a message is an error, never a
//! panic.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::constants::MAX_MESSAGE_LEN;
use crate::error::{Error, Result, WireError};

/// Checked reader over one inbound payload
pub struct InputMessage {
    buf: Bytes,
}

impl InputMessage {
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn get_u8(&mut self) -> std::result::Result<u8, WireError> {
        if self.buf.remaining() < 1 {
            return Err(WireError::UnexpectedEnd);
        }
        Ok(self.buf.get_u8())
    }

    pub fn get_u16(&mut self) -> std::result::Result<u16, WireError> {
        if self.buf.remaining() < 2 {
            return Err(WireError::UnexpectedEnd);
        }
        Ok(self.buf.get_u16_le())
    }

    pub fn get_u32(&mut self) -> std::result::Result<u32, WireError> {
        if self.buf.remaining() < 4 {
            return Err(WireError::UnexpectedEnd);
        }
        Ok(self.buf.get_u32_le())
    }

    /// Skip `n` bytes
    pub fn skip(&mut self, n: usize) -> std::result::Result<(), WireError> {
        if self.buf.remaining() < n {
            return Err(WireError::UnexpectedEnd);
        }
        self.buf.advance(n);
        Ok(())
    }

    /// Read a length-prefixed string
    pub fn get_string(&mut self) -> std::result::Result<String, WireError> {
        let len = self.get_u16()? as usize;
        if self.buf.remaining() < len {
            return Err(WireError::UnexpectedEnd);
        }
        let raw = self.buf.copy_to_bytes(len);
        String::from_utf8(raw.to_vec()).map_err(|_| WireError::InvalidString)
    }

    /// Take `n` raw bytes as an owned block
    ///
    /// Used for the sealed handshake blocks, which are decrypted in
    /// place before being parsed as a nested message.
    pub fn take_block(&mut self, n: usize) -> std::result::Result<Vec<u8>, WireError> {
        if self.buf.remaining() < n {
            return Err(WireError::UnexpectedEnd);
        }
        let mut block = vec![0u8; n];
        self.buf.copy_to_slice(&mut block);
        Ok(block)
    }
}

/// Builder for one outbound payload
#[derive(Default)]
pub struct OutputMessage {
    buf: BytesMut,
}

impl OutputMessage {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
        }
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn put_u16(&mut self, value: u16) {
        self.buf.put_u16_le(value);
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.put_u32_le(value);
    }

    /// Append raw bytes without a length prefix
    pub fn put_slice(&mut self, value: &[u8]) {
        self.buf.put_slice(value);
    }

    /// Append a length-prefixed string
    pub fn put_string(&mut self, value: &str) {
        let len = value.len().min(u16::MAX as usize);
        self.buf.put_u16_le(len as u16);
        self.buf.put_slice(&value.as_bytes()[..len]);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Finish the payload; framing happens at the write site
    pub fn into_payload(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Read one frame from the peer
///
/// A clean EOF at the length prefix maps to `ConnectionClosed`.
pub async fn read_frame<R>(reader: &mut R) -> Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut len_bytes = [0u8; 2];
    match reader.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(Error::ConnectionClosed)
        }
        Err(e) => return Err(e.into()),
    }

    let len = u16::from_le_bytes(len_bytes) as usize;
    if len > MAX_MESSAGE_LEN {
        return Err(WireError::Oversized(len).into());
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Bytes::from(payload))
}

/// Write one frame to the peer
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > u16::MAX as usize {
        return Err(WireError::Oversized(payload.len()).into());
    }

    writer
        .write_all(&(payload.len() as u16).to_le_bytes())
        .await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}
