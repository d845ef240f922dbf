//! S3 — o2p overflow: the host never reads the o2p ring. Once it fills,
//! every subsequent in-cycle must drop its whole transfer rather than
//! partially writing it, and the ring's contents must never change again.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{wait_for_status_at_least, ArcReadRing, ArcWriteRing, MockTransport, QueueRing};
use ob_engine::{Engine, IoBuffers, Status};
use ob_usb::{block, DeviceDescriptor};

const INPUTS: usize = 2;
const OUTPUTS: usize = 2;
const FRAMES_PER_BLOCK: usize = 7;
const BLOCKS_PER_TRANSFER: usize = 4;

/// One audio-in transfer whose every sample equals `value`, so distinct
/// transfers can be told apart after decoding.
fn value_transfer(value: f32) -> Vec<u8> {
    let blk_len = block::block_len(FRAMES_PER_BLOCK, OUTPUTS);
    let mut raw = vec![0u8; blk_len * BLOCKS_PER_TRANSFER];
    let samples = vec![value; FRAMES_PER_BLOCK * OUTPUTS];
    for b in 0..BLOCKS_PER_TRANSFER {
        let block_bytes = &mut raw[b * blk_len..(b + 1) * blk_len];
        block::BlockHeader { frames: 0 }.write_to(block_bytes);
        block::encode_samples(&samples, &mut block_bytes[block::HEADER_SIZE..]);
    }
    raw
}

#[test]
fn ring_never_exceeds_capacity_or_tears_once_full() {
    let frames_per_transfer = FRAMES_PER_BLOCK * BLOCKS_PER_TRANSFER;
    let o2p_transfer_size = frames_per_transfer * OUTPUTS * block::SAMPLE_SIZE;

    let transport = Arc::new(MockTransport::new());
    let device = DeviceDescriptor {
        name: "Test",
        vendor_id: 0,
        product_id: 0,
        inputs: INPUTS as u8,
        outputs: OUTPUTS as u8,
        frames_per_block: FRAMES_PER_BLOCK as u16,
    };

    let engine = Engine::from_transport(transport.clone(), device, BLOCKS_PER_TRANSFER).expect("engine init");

    // Exactly one transfer's worth of capacity: the host here never reads,
    // so after the first write the ring stays permanently full.
    let o2p_ring = QueueRing::new(o2p_transfer_size);
    let p2o_ring = QueueRing::new(o2p_transfer_size * 4);

    let io = IoBuffers {
        p2o_audio: Some(Box::new(ArcReadRing(p2o_ring))),
        o2p_audio: Some(Box::new(ArcWriteRing(o2p_ring.clone()))),
        ..Default::default()
    };
    engine.activate(io).expect("activate");
    assert!(
        wait_for_status_at_least(&engine, Status::Wait, Duration::from_secs(1)),
        "engine should reach WAIT before the host raises RUN"
    );
    engine.set_status(Status::Run);

    let stop_feeding = Arc::new(AtomicBool::new(false));
    let feeder_stop = stop_feeding.clone();
    let feeder_transport = transport.clone();
    let feeder = std::thread::spawn(move || {
        // The very first transfer is distinguishable (value 0.125); every
        // one after it carries a different value so the test can tell
        // whether a later transfer ever clobbered the ring.
        feeder_transport.push_audio_in(value_transfer(0.125));
        let mut n = 1u32;
        while !feeder_stop.load(Ordering::Acquire) {
            feeder_transport.push_audio_in(value_transfer(0.001 * (n as f32 % 97.0) + 0.25));
            n += 1;
            std::thread::sleep(Duration::from_micros(100));
        }
    });

    std::thread::sleep(Duration::from_millis(150));

    stop_feeding.store(true, Ordering::Release);
    feeder.join().unwrap();
    transport.request_stop();
    engine.stop();
    engine.wait();

    assert_eq!(o2p_ring.len(), o2p_transfer_size, "ring should sit permanently at capacity once full");

    // The host-side o2p ring carries native float, not the USB wire's
    // big-endian int32 (spec.md §4.2, §6) — no wire block headers either,
    // those are only present on the USB transfer itself.
    let bytes = o2p_ring.drain_all();
    let decoded: &[f32] = bytemuck::cast_slice(&bytes);

    assert!(
        decoded.iter().all(|&s| (s - 0.125).abs() < 1e-3),
        "the ring should still hold exactly the first transfer's samples, untouched by later overflowing writes"
    );
}
