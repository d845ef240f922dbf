//! Wires a mock host and a synthetic device together and prints frame
//! counts for a few seconds. Manual smoke-testing only, not part of the
//! test suite.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ob_engine::{Engine, IoBuffers, ReadRing, Status, WriteRing};
use ob_usb::{block, DeviceDescriptor};

struct SilentDevice;

impl ob_engine::UsbTransport for SilentDevice {
    fn read_audio_in(&self, buf: &mut [u8]) -> ob_usb::Result<usize> {
        buf.iter_mut().for_each(|b| *b = 0);
        std::thread::sleep(Duration::from_millis(1));
        Ok(buf.len())
    }

    fn write_audio_out(&self, buf: &[u8]) -> ob_usb::Result<usize> {
        Ok(buf.len())
    }

    fn read_midi_in(&self, _buf: &mut [u8]) -> ob_usb::Result<usize> {
        std::thread::sleep(Duration::from_millis(1));
        Err(ob_usb::UsbError::Timeout)
    }

    fn write_midi_out(&self, buf: &[u8]) -> ob_usb::Result<usize> {
        Ok(buf.len())
    }
}

struct VecRing {
    bytes: Mutex<VecDeque<u8>>,
    capacity: usize,
    bytes_seen: AtomicUsize,
}

impl VecRing {
    fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self { bytes: Mutex::new(VecDeque::new()), capacity, bytes_seen: AtomicUsize::new(0) })
    }
}

impl ReadRing for VecRing {
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

impl WriteRing for VecRing {
    fn write_space(&self) -> usize {
        self.capacity.saturating_sub(self.bytes.lock().unwrap().len())
    }

    fn write(&self, src: &[u8]) -> usize {
        let mut q = self.bytes.lock().unwrap();
        let n = src.len().min(self.capacity.saturating_sub(q.len()));
        q.extend(src[..n].iter().copied());
        self.bytes_seen.fetch_add(n, Ordering::Relaxed);
        n
    }
}

struct ArcRead(Arc<VecRing>);
impl ReadRing for ArcRead {
    fn read_space(&self) -> usize {
        self.0.read_space()
    }
    fn read(&self, dst: Option<&mut [u8]>, bytes: usize) -> usize {
        self.0.read(dst, bytes)
    }
}

struct ArcWrite(Arc<VecRing>);
impl WriteRing for ArcWrite {
    fn write_space(&self) -> usize {
        self.0.write_space()
    }
    fn write(&self, src: &[u8]) -> usize {
        self.0.write(src)
    }
}

fn main() -> ob_engine::Result<()> {
    let device = DeviceDescriptor { name: "Smoke", vendor_id: 0, product_id: 0, inputs: 2, outputs: 2, frames_per_block: 7 };
    let frames_per_transfer = device.frames_per_block as usize * 8;
    let transfer_size = frames_per_transfer * device.outputs as usize * block::SAMPLE_SIZE;

    let engine = Engine::from_transport(Arc::new(SilentDevice), device, 8)?;

    let p2o_audio = VecRing::new(transfer_size * 4);
    let o2p_audio = VecRing::new(transfer_size * 4);

    let io = IoBuffers {
        p2o_audio: Some(Box::new(ArcRead(p2o_audio))),
        o2p_audio: Some(Box::new(ArcWrite(o2p_audio.clone()))),
        ..Default::default()
    };
    engine.activate(io)?;

    // BOOT -> WAIT is the audio thread's own (one-time) transition; raising
    // RUN before it happens would just get overwritten back to WAIT.
    while engine.get_status() < Status::Wait {
        std::thread::sleep(Duration::from_micros(100));
    }
    engine.set_status(Status::Run);

    std::thread::sleep(Duration::from_secs(2));

    engine.stop();
    engine.wait();

    println!("o2p bytes written: {}", o2p_audio.bytes_seen.load(Ordering::Relaxed));
    Ok(())
}
