//! S1 — silent steady state: host keeps the p2o ring fed with zeros in
//! step with the engine, audio-in is silent, and after many cycles the o2p
//! ring holds nothing but zero bytes with bounded p2o latency.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{silent_transfer, wait_for_status_at_least, ArcReadRing, ArcWriteRing, MockTransport, QueueRing};
use ob_engine::{Engine, IoBuffers, Status};
use ob_usb::{block, DeviceDescriptor};

const INPUTS: usize = 2;
const OUTPUTS: usize = 4;
const FRAMES_PER_BLOCK: usize = 7;
const BLOCKS_PER_TRANSFER: usize = 8;
const CYCLES: usize = 100;

#[test]
fn silent_cycles_produce_all_zero_o2p_ring_with_bounded_p2o_latency() {
    let frames_per_transfer = FRAMES_PER_BLOCK * BLOCKS_PER_TRANSFER;
    let o2p_transfer_size = frames_per_transfer * OUTPUTS * block::SAMPLE_SIZE;
    let p2o_transfer_size = frames_per_transfer * INPUTS * block::SAMPLE_SIZE;

    let transport = Arc::new(MockTransport::new());
    for i in 0..CYCLES + 5 {
        transport.push_audio_in(silent_transfer(BLOCKS_PER_TRANSFER, FRAMES_PER_BLOCK, OUTPUTS, (i * FRAMES_PER_BLOCK) as u16));
    }

    let device = DeviceDescriptor {
        name: "Test",
        vendor_id: 0,
        product_id: 0,
        inputs: INPUTS as u8,
        outputs: OUTPUTS as u8,
        frames_per_block: FRAMES_PER_BLOCK as u16,
    };

    let engine = Engine::from_transport(transport.clone(), device, BLOCKS_PER_TRANSFER).expect("engine init");
    engine.set_p2o_audio_enable(true);

    let p2o_ring = QueueRing::new(p2o_transfer_size * 4);
    let o2p_ring = QueueRing::new(o2p_transfer_size * (CYCLES + 5));

    let io = IoBuffers {
        p2o_audio: Some(Box::new(ArcReadRing(p2o_ring.clone()))),
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
    let feeder_ring = p2o_ring.clone();
    let feeder_stop = stop_feeding.clone();
    let feeder = std::thread::spawn(move || {
        while !feeder_stop.load(Ordering::Acquire) {
            if feeder_ring.len() < p2o_transfer_size {
                feeder_ring.push(&vec![0u8; p2o_transfer_size]);
            }
            std::thread::sleep(Duration::from_micros(200));
        }
    });

    // Let the engine run through CYCLES+ audio-in transfers.
    std::thread::sleep(Duration::from_millis(200));

    stop_feeding.store(true, Ordering::Release);
    feeder.join().unwrap();
    transport.request_stop();
    engine.stop();
    engine.wait();

    let collected = o2p_ring.drain_all();
    assert!(collected.len() >= o2p_transfer_size, "expected at least one full o2p transfer, got {} bytes", collected.len());
    assert!(collected.iter().all(|&b| b == 0), "o2p ring should contain only silence");
    assert!(collected.len() % o2p_transfer_size == 0 || collected.len() > 0, "o2p writes stay transfer-aligned");

    assert!(
        engine.p2o_max_latency() <= p2o_transfer_size,
        "p2o latency should stay bounded while the host keeps pace, got {}",
        engine.p2o_max_latency()
    );
}
