//! The two audio conversion paths: device→host ("o2p") and host→device
//! ("p2o"). These are pure functions over plain buffers so they can be
//! exercised without a USB transport or host rings; `engine.rs` wires them
//! to the transfer buffers and the status machine.

use ob_usb::block::{self, BlockHeader};

/// Decodes one incoming audio transfer's raw big-endian blocks into an
/// interleaved float buffer. `raw` is `blocks_per_transfer` blocks back to
/// back; `out` receives `blocks_per_transfer * frames_per_block * channels`
/// floats.
pub fn decode_o2p_transfer(
    raw: &[u8],
    blocks_per_transfer: usize,
    frames_per_block: usize,
    channels: usize,
    out: &mut [f32],
) {
    let blk_len = block::block_len(frames_per_block, channels);
    let samples_per_block = frames_per_block * channels;

    for b in 0..blocks_per_transfer {
        let block_bytes = &raw[b * blk_len..(b + 1) * blk_len];
        let data = &block_bytes[block::HEADER_SIZE..];
        let out_slice = &mut out[b * samples_per_block..(b + 1) * samples_per_block];
        block::decode_samples(data, out_slice);
    }
}

/// Encodes an interleaved float buffer into a raw outgoing audio transfer,
/// advancing `frames_counter` by `frames_per_block` once per block and
/// writing it big-endian into that block's `frames` field. Per the
/// header-invariance invariant, only `frames` and the sample data are
/// written here — `header` and `padding` must already be in place from
/// [`init_transfer_headers`].
pub fn encode_p2o_transfer(
    floats: &[f32],
    blocks_per_transfer: usize,
    frames_per_block: usize,
    channels: usize,
    frames_counter: &mut u32,
    raw: &mut [u8],
) {
    let blk_len = block::block_len(frames_per_block, channels);
    let samples_per_block = frames_per_block * channels;

    for b in 0..blocks_per_transfer {
        *frames_counter = frames_counter.wrapping_add(frames_per_block as u32);

        let block_bytes = &mut raw[b * blk_len..(b + 1) * blk_len];
        BlockHeader::write_frames(block_bytes, *frames_counter as u16);

        let data = &mut block_bytes[block::HEADER_SIZE..];
        let in_slice = &floats[b * samples_per_block..(b + 1) * samples_per_block];
        block::encode_samples(in_slice, data);
    }
}

/// Writes the fixed `header = 0x07ff` magic and zeroed padding into every
/// block of a freshly allocated outgoing transfer buffer. Called once at
/// allocation time; never again for the life of the engine.
pub fn init_transfer_headers(raw: &mut [u8], blocks_per_transfer: usize, frames_per_block: usize, channels: usize) {
    let blk_len = block::block_len(frames_per_block, channels);
    for b in 0..blocks_per_transfer {
        let block_bytes = &mut raw[b * blk_len..(b + 1) * blk_len];
        BlockHeader { frames: 0 }.write_to(block_bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAMES_PER_BLOCK: usize = 7;
    const BLOCKS_PER_TRANSFER: usize = 8;
    const CHANNELS: usize = 4;

    fn transfer_len() -> usize {
        block::block_len(FRAMES_PER_BLOCK, CHANNELS) * BLOCKS_PER_TRANSFER
    }

    #[test]
    fn round_trip_sample_encoding_through_a_full_transfer() {
        let samples_per_transfer = FRAMES_PER_BLOCK * BLOCKS_PER_TRANSFER * CHANNELS;
        let floats: Vec<f32> = (0..samples_per_transfer)
            .map(|i| (i as f32 / samples_per_transfer as f32) * 2.0 - 1.0)
            .collect();

        let mut raw = vec![0u8; transfer_len()];
        init_transfer_headers(&mut raw, BLOCKS_PER_TRANSFER, FRAMES_PER_BLOCK, CHANNELS);
        let mut counter = 0u32;
        encode_p2o_transfer(&floats, BLOCKS_PER_TRANSFER, FRAMES_PER_BLOCK, CHANNELS, &mut counter, &mut raw);

        let mut decoded = vec![0.0f32; samples_per_transfer];
        decode_o2p_transfer(&raw, BLOCKS_PER_TRANSFER, FRAMES_PER_BLOCK, CHANNELS, &mut decoded);

        for (original, round_tripped) in floats.iter().zip(decoded.iter()) {
            assert!((original - round_tripped).abs() < 1.0 / i32::MAX as f32);
        }
    }

    #[test]
    fn block_counter_is_an_arithmetic_progression() {
        let samples_per_transfer = FRAMES_PER_BLOCK * BLOCKS_PER_TRANSFER * CHANNELS;
        let floats = vec![0.0f32; samples_per_transfer];
        let mut raw = vec![0u8; transfer_len()];
        init_transfer_headers(&mut raw, BLOCKS_PER_TRANSFER, FRAMES_PER_BLOCK, CHANNELS);

        let mut counter = 0u32;
        encode_p2o_transfer(&floats, BLOCKS_PER_TRANSFER, FRAMES_PER_BLOCK, CHANNELS, &mut counter, &mut raw);

        let blk_len = block::block_len(FRAMES_PER_BLOCK, CHANNELS);
        for b in 0..BLOCKS_PER_TRANSFER {
            let header = BlockHeader::read_from(&raw[b * blk_len..(b + 1) * blk_len]);
            assert_eq!(header.frames as u32, (b as u32 + 1) * FRAMES_PER_BLOCK as u32);
        }
    }

    #[test]
    fn header_magic_survives_many_cycles() {
        let samples_per_transfer = FRAMES_PER_BLOCK * BLOCKS_PER_TRANSFER * CHANNELS;
        let floats = vec![0.0f32; samples_per_transfer];
        let mut raw = vec![0u8; transfer_len()];
        init_transfer_headers(&mut raw, BLOCKS_PER_TRANSFER, FRAMES_PER_BLOCK, CHANNELS);

        let mut counter = 0u32;
        let blk_len = block::block_len(FRAMES_PER_BLOCK, CHANNELS);
        for _ in 0..500 {
            encode_p2o_transfer(&floats, BLOCKS_PER_TRANSFER, FRAMES_PER_BLOCK, CHANNELS, &mut counter, &mut raw);
            for b in 0..BLOCKS_PER_TRANSFER {
                let block_bytes = &raw[b * blk_len..(b + 1) * blk_len];
                assert_eq!(BlockHeader::magic_on_wire(block_bytes), block::HEADER_MAGIC);
            }
        }
    }

    #[test]
    fn ring_reads_are_always_frame_aligned() {
        let frame_size = CHANNELS * block::SAMPLE_SIZE;
        let transfer_size = FRAMES_PER_BLOCK * BLOCKS_PER_TRANSFER * frame_size;
        assert_eq!(transfer_size % frame_size, 0);
    }
}
