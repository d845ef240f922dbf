//! Shared mock transport and mock rings used by every end-to-end scenario
//! in this directory. The mock device behaves like a class-compliant
//! device running at its nominal rate: it accepts whatever the engine
//! writes on audio-out and MIDI-out, and hands back audio-in transfers
//! built from a caller-controlled generator.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ob_engine::{Engine, Status};

/// Polls until `engine` reaches at least `status`, or `timeout` elapses.
/// Per spec.md §4.6, `BOOT -> WAIT` is the audio thread's own doing, and
/// only once the host observes `WAIT` is it safe to raise `RUN` — raising
/// it any earlier races the thread's own (one-time) `BOOT -> WAIT` write,
/// which would otherwise clobber the host's `RUN` right back down to
/// `WAIT`.
pub fn wait_for_status_at_least(engine: &Engine, status: Status, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if engine.get_status() >= status {
            return true;
        }
        std::thread::sleep(Duration::from_micros(100));
    }
    false
}

use ob_engine::{ReadRing, WriteRing};
use ob_usb::block;

/// A USB transport double. Audio-in transfers are pulled from a queue the
/// test fills in advance (or generates lazily via a silence/noise source);
/// audio-out and MIDI-out transfers are recorded for the test to inspect.
///
/// The real audio-in endpoint has no timeout (spec.md §4.1): a live device
/// keeps a thread blocked in its read until the next transfer genuinely
/// arrives. The mock's busy-wait stands in for that block, but a test
/// harness still needs a way to unblock it once the scenario is done —
/// [`request_stop`](Self::request_stop) marks the queue as drained for
/// good, at which point the read returns a timeout the way a real
/// audio-in read never would, purely so the owning thread can notice
/// `Status::Stop` and return instead of blocking forever.
pub struct MockTransport {
    pub audio_in_frames: Mutex<VecDeque<Vec<u8>>>,
    pub audio_out_log: Mutex<Vec<Vec<u8>>>,
    pub midi_in_frames: Mutex<VecDeque<Vec<u8>>>,
    pub midi_out_log: Mutex<Vec<Vec<u8>>>,
    stopped: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            audio_in_frames: Mutex::new(VecDeque::new()),
            audio_out_log: Mutex::new(Vec::new()),
            midi_in_frames: Mutex::new(VecDeque::new()),
            midi_out_log: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn push_audio_in(&self, transfer: Vec<u8>) {
        self.audio_in_frames.lock().unwrap().push_back(transfer);
    }

    pub fn push_midi_in(&self, packet: Vec<u8>) {
        self.midi_in_frames.lock().unwrap().push_back(packet);
    }

    /// Unblocks any thread parked in [`read_audio_in`](Self::read_audio_in),
    /// for use once a test is winding down and no more audio-in frames will
    /// ever be queued.
    pub fn request_stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }
}

impl ob_engine::UsbTransport for MockTransport {
    fn read_audio_in(&self, buf: &mut [u8]) -> ob_usb::Result<usize> {
        loop {
            if let Some(frame) = self.audio_in_frames.lock().unwrap().pop_front() {
                let n = frame.len().min(buf.len());
                buf[..n].copy_from_slice(&frame[..n]);
                return Ok(n);
            }
            if self.stopped.load(Ordering::Acquire) {
                return Err(ob_usb::UsbError::Timeout);
            }
            std::thread::sleep(std::time::Duration::from_micros(50));
        }
    }

    fn write_audio_out(&self, buf: &[u8]) -> ob_usb::Result<usize> {
        self.audio_out_log.lock().unwrap().push(buf.to_vec());
        Ok(buf.len())
    }

    fn read_midi_in(&self, buf: &mut [u8]) -> ob_usb::Result<usize> {
        if let Some(packet) = self.midi_in_frames.lock().unwrap().pop_front() {
            let n = packet.len().min(buf.len());
            buf[..n].copy_from_slice(&packet[..n]);
            Ok(n)
        } else {
            std::thread::sleep(std::time::Duration::from_millis(1));
            Err(ob_usb::UsbError::Timeout)
        }
    }

    fn write_midi_out(&self, buf: &[u8]) -> ob_usb::Result<usize> {
        self.midi_out_log.lock().unwrap().push(buf.to_vec());
        Ok(buf.len())
    }
}

/// Builds one silent audio-in transfer (all-zero samples, valid headers).
pub fn silent_transfer(blocks_per_transfer: usize, frames_per_block: usize, channels: usize, frames_base: u16) -> Vec<u8> {
    let blk_len = block::block_len(frames_per_block, channels);
    let mut raw = vec![0u8; blk_len * blocks_per_transfer];
    for b in 0..blocks_per_transfer {
        let block_bytes = &mut raw[b * blk_len..(b + 1) * blk_len];
        block::BlockHeader { frames: frames_base.wrapping_add((b * frames_per_block) as u16) }.write_to(block_bytes);
    }
    raw
}

/// A simple growable byte-queue ring, standing in for the host's SPSC ring
/// in end-to-end tests (single-threaded producer/consumer is enough here;
/// the real ring's concurrency is covered by `ob_core`'s own tests).
pub struct QueueRing {
    pub bytes: Mutex<VecDeque<u8>>,
    pub capacity: usize,
}

impl QueueRing {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self { bytes: Mutex::new(VecDeque::new()), capacity })
    }

    pub fn push(&self, data: &[u8]) {
        let mut q = self.bytes.lock().unwrap();
        q.extend(data.iter().copied());
    }

    pub fn drain_all(&self) -> Vec<u8> {
        self.bytes.lock().unwrap().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.bytes.lock().unwrap().len()
    }
}

impl ReadRing for QueueRing {
    fn read_space(&self) -> usize {
        self.bytes.lock().unwrap().len()
    }

    fn read(&self, dst: Option<&mut [u8]>, bytes: usize) -> usize {
        let mut q = self.bytes.lock().unwrap();
        let n = bytes.min(q.len());
        if let Some(dst) = dst {
            for i in 0..n {
                dst[i] = q.pop_front().unwrap();
            }
        } else {
            for _ in 0..n {
                q.pop_front();
            }
        }
        n
    }
}

impl WriteRing for QueueRing {
    fn write_space(&self) -> usize {
        self.capacity.saturating_sub(self.bytes.lock().unwrap().len())
    }

    fn write(&self, src: &[u8]) -> usize {
        let mut q = self.bytes.lock().unwrap();
        let n = src.len().min(self.capacity.saturating_sub(q.len()));
        q.extend(src[..n].iter().copied());
        n
    }
}

pub struct ArcReadRing(pub Arc<QueueRing>);
impl ReadRing for ArcReadRing {
    fn read_space(&self) -> usize {
        self.0.read_space()
    }
    fn read(&self, dst: Option<&mut [u8]>, bytes: usize) -> usize {
        self.0.read(dst, bytes)
    }
}

pub struct ArcWriteRing(pub Arc<QueueRing>);
impl WriteRing for ArcWriteRing {
    fn write_space(&self) -> usize {
        self.0.write_space()
    }
    fn write(&self, src: &[u8]) -> usize {
        self.0.write(src)
    }
}

/// A clock driven by an external counter, so a test can advance host time
/// independently of wall-clock time while the worker threads run.
pub fn shared_clock(nanos: Arc<AtomicU64>) -> ob_engine::TimeSource {
    Box::new(move || nanos.load(Ordering::Acquire) as f64 / 1e9)
}
