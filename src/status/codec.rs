//! VarInt length-prefixed framing for the server-list-ping exchange.
//!
//! Every packet on the wire is `VarInt(length) ++ payload`, where the
//! payload starts with a VarInt packet id. [`PingFrameCodec`] handles only
//! the outer length prefix; packet bodies are built and read with the
//! helpers below.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::{AppError, Result};

/// Largest frame accepted from a server: 1 MiB.
pub const MAX_FRAME_BYTES: usize = 1_048_576;

/// A VarInt never spans more than five bytes.
const MAX_VARINT_BYTES: usize = 5;

/// Append `value` as a VarInt.
pub fn put_varint(dst: &mut impl BufMut, value: i32) {
    #[allow(clippy::cast_sign_loss)]
    let mut raw = value as u32;
    loop {
        #[allow(clippy::cast_possible_truncation)]
        let byte = (raw & 0x7f) as u8;
        raw >>= 7;
        if raw == 0 {
            dst.put_u8(byte);
            return;
        }
        dst.put_u8(byte | 0x80);
    }
}

/// Read a VarInt from the front of `src` without consuming it.
///
/// Returns `Ok(None)` when `src` ends mid-VarInt, otherwise the value and
/// the number of bytes it occupied.
///
/// # Errors
///
/// Returns `AppError::Status` if the VarInt is longer than five bytes.
pub fn peek_varint(src: &[u8]) -> Result<Option<(i32, usize)>> {
    let mut value: u32 = 0;
    for (index, byte) in src.iter().enumerate() {
        if index >= MAX_VARINT_BYTES {
            return Err(AppError::Status("varint too long".into()));
        }
        value |= u32::from(byte & 0x7f) << (7 * index);
        if byte & 0x80 == 0 {
            #[allow(clippy::cast_possible_wrap)]
            return Ok(Some((value as i32, index + 1)));
        }
    }
    if src.len() >= MAX_VARINT_BYTES {
        return Err(AppError::Status("varint too long".into()));
    }
    Ok(None)
}

/// Consume a VarInt from a complete packet body.
///
/// # Errors
///
/// Returns `AppError::Status` if the body ends mid-VarInt or the VarInt is
/// malformed.
pub fn get_varint(src: &mut impl Buf) -> Result<i32> {
    let (value, len) = peek_varint(src.chunk())?
        .ok_or_else(|| AppError::Status("truncated varint".into()))?;
    src.advance(len);
    Ok(value)
}

/// Append a VarInt length-prefixed UTF-8 string.
pub fn put_string(dst: &mut impl BufMut, value: &str) {
    put_varint(dst, i32::try_from(value.len()).unwrap_or(i32::MAX));
    dst.put_slice(value.as_bytes());
}

/// Consume a VarInt length-prefixed UTF-8 string.
///
/// # Errors
///
/// Returns `AppError::Status` on a negative or overlong length or invalid
/// UTF-8.
pub fn get_string(src: &mut impl Buf) -> Result<String> {
    let len = usize::try_from(get_varint(src)?)
        .map_err(|_| AppError::Status("negative string length".into()))?;
    if len > src.remaining() {
        return Err(AppError::Status(format!(
            "string length {len} exceeds packet ({} bytes left)",
            src.remaining()
        )));
    }
    let raw = src.copy_to_bytes(len);
    String::from_utf8(raw.to_vec()).map_err(|e| AppError::Status(format!("invalid utf-8: {e}")))
}

/// Length-prefix framing codec.
#[derive(Debug, Default)]
pub struct PingFrameCodec;

impl PingFrameCodec {
    /// Create a codec.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for PingFrameCodec {
    type Item = Bytes;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let Some((declared, header)) = peek_varint(src)? else {
            return Ok(None);
        };
        let len = usize::try_from(declared)
            .map_err(|_| AppError::Status(format!("negative frame length {declared}")))?;
        if len > MAX_FRAME_BYTES {
            return Err(AppError::Status(format!(
                "frame too long: {len} bytes exceeds {MAX_FRAME_BYTES}"
            )));
        }
        if src.len() < header + len {
            src.reserve(header + len - src.len());
            return Ok(None);
        }
        src.advance(header);
        Ok(Some(src.split_to(len).freeze()))
    }
}

impl Encoder<Bytes> for PingFrameCodec {
    type Error = AppError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        let len = i32::try_from(item.len())
            .map_err(|_| AppError::Status("frame too large to encode".into()))?;
        dst.reserve(MAX_VARINT_BYTES + item.len());
        put_varint(dst, len);
        dst.put_slice(&item);
        Ok(())
    }
}
