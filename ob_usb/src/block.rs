//! The wire layout of one audio block inside a USB transfer, and the
//! big-endian sample codec that converts between it and host-native floats.
//!
//! Per the collaborator's note on raw framed blocks: this is an explicit
//! header struct plus a length-parameterized slice view over the sample
//! data, never a single `#[repr(C)]` record that would embed a variable-
//! length payload. Endianness is made explicit at every field boundary.

use byteorder::{BigEndian, ByteOrder};

/// Fixed value written into every outgoing block's `header` field. Never
/// mutated after the transfer buffers are built.
pub const HEADER_MAGIC: u16 = 0x07ff;

/// Opaque alignment padding following the header/frames fields. The device
/// class expects this region present and zeroed; the engine never inspects
/// its contents.
pub const PADDING_SIZE: usize = 2;

/// Bytes occupied by `header + frames + padding`, before the sample data.
pub const HEADER_SIZE: usize = 2 + 2 + PADDING_SIZE;

/// Bytes per sample on the wire (32-bit signed integer).
pub const SAMPLE_SIZE: usize = 4;

/// The fixed-size prelude of one block: magic header and running frame
/// counter. `padding` is always zero and is written but never read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockHeader {
    pub frames: u16,
}

impl BlockHeader {
    /// Writes `header = HEADER_MAGIC`, `frames = self.frames`, and zeroed
    /// padding into `buf[..HEADER_SIZE]`.
    pub fn write_to(self, buf: &mut [u8]) {
        assert!(buf.len() >= HEADER_SIZE);
        BigEndian::write_u16(&mut buf[0..2], HEADER_MAGIC);
        BigEndian::write_u16(&mut buf[2..4], self.frames);
        for b in &mut buf[4..HEADER_SIZE] {
            *b = 0;
        }
    }

    /// Updates only the `frames` field in place, leaving `header` and
    /// `padding` untouched. Outgoing block headers are written once, at
    /// allocation time, via [`write_to`](Self::write_to); every cycle after
    /// that only `frames` (this method) and the sample data change.
    pub fn write_frames(buf: &mut [u8], frames: u16) {
        assert!(buf.len() >= HEADER_SIZE);
        BigEndian::write_u16(&mut buf[2..4], frames);
    }

    /// Reads the `frames` field out of an incoming block. Incoming blocks'
    /// `header`/`frames` fields are otherwise ignored by the engine.
    pub fn read_from(buf: &[u8]) -> Self {
        assert!(buf.len() >= HEADER_SIZE);
        Self { frames: BigEndian::read_u16(&buf[2..4]) }
    }

    /// Reads the raw `header` field, for callers that want to assert the
    /// magic value is still present on the wire (see the header-invariance
    /// property).
    pub fn magic_on_wire(buf: &[u8]) -> u16 {
        assert!(buf.len() >= 2);
        BigEndian::read_u16(&buf[0..2])
    }
}

/// Size in bytes of one block carrying `frames_per_block` frames of
/// `channels`-channel audio.
pub fn block_len(frames_per_block: usize, channels: usize) -> usize {
    HEADER_SIZE + frames_per_block * channels * SAMPLE_SIZE
}

/// Encodes `samples` (one block's worth of interleaved float samples, in
/// `[-1.0, 1.0)`) as big-endian 32-bit integers into `out`.
///
/// `out.len()` must equal `samples.len() * SAMPLE_SIZE`.
pub fn encode_samples(samples: &[f32], out: &mut [u8]) {
    assert_eq!(out.len(), samples.len() * SAMPLE_SIZE);
    for (i, &s) in samples.iter().enumerate() {
        let v = (s.clamp(-1.0, 1.0) * i32::MAX as f32) as i32;
        BigEndian::write_i32(&mut out[i * SAMPLE_SIZE..(i + 1) * SAMPLE_SIZE], v);
    }
}

/// Decodes a block's big-endian 32-bit integer samples in `bytes` into
/// `out` as floats in `[-1.0, 1.0)`.
///
/// `bytes.len()` must equal `out.len() * SAMPLE_SIZE`.
pub fn decode_samples(bytes: &[u8], out: &mut [f32]) {
    assert_eq!(bytes.len(), out.len() * SAMPLE_SIZE);
    for (i, chunk) in bytes.chunks_exact(SAMPLE_SIZE).enumerate() {
        let v = BigEndian::read_i32(chunk);
        out[i] = v as f32 / i32::MAX as f32;
    }
}
