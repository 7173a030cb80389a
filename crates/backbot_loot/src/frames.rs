//! # Back Frame Stream
//!
//! A back file is a sequence of length-prefixed frames:
//!
//! ```text
//! ┌──────────────┬─────────────────────┬──────────────┬─────
//! │ len: i16 LE  │ payload (len bytes) │ len: i16 LE  │ ...
//! └──────────────┴─────────────────────┴──────────────┴─────
//! ```
//!
//! Running out of bytes where a length is expected ends the stream cleanly.
//! Running out inside a payload is corruption.

use crate::error::{LootError, LootResult};

/// Size of the frame length prefix.
pub const FRAME_HEADER_SIZE: usize = 2;

/// Splits a back file into its frame payloads.
///
/// # Errors
///
/// Returns [`LootError::FrameDecode`] on a negative length or a truncated
/// payload.
pub fn decode_frames(bytes: &[u8]) -> LootResult<Vec<Vec<u8>>> {
    let mut frames = Vec::new();
    let mut offset = 0;

    while let Some(header) = bytes.get(offset..offset + FRAME_HEADER_SIZE) {
        let len = i16::from_le_bytes([header[0], header[1]]);
        let len = usize::try_from(len).map_err(|_| {
            LootError::FrameDecode(format!("negative frame length {len} at offset {offset}"))
        })?;
        offset += FRAME_HEADER_SIZE;

        let payload = bytes.get(offset..offset + len).ok_or_else(|| {
            LootError::FrameDecode(format!(
                "frame at offset {} wants {len} bytes, only {} remain",
                offset - FRAME_HEADER_SIZE,
                bytes.len() - offset
            ))
        })?;
        frames.push(payload.to_vec());
        offset += len;
    }

    if offset < bytes.len() {
        tracing::debug!(trailing = bytes.len() - offset, "ignoring partial frame header");
    }

    Ok(frames)
}

/// Encodes payloads as a frame stream. Payloads longer than `i16::MAX`
/// bytes are rejected.
///
/// # Errors
///
/// Returns [`LootError::FrameDecode`] if a payload does not fit a frame.
pub fn encode_frames<P: AsRef<[u8]>>(payloads: &[P]) -> LootResult<Vec<u8>> {
    let mut out = Vec::new();
    for payload in payloads {
        let payload = payload.as_ref();
        let len = i16::try_from(payload.len()).map_err(|_| {
            LootError::FrameDecode(format!("payload of {} bytes exceeds a frame", payload.len()))
        })?;
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(payload);
    }
    Ok(out)
}
