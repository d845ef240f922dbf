//! The engine proper: transfer buffer allocation, the four endpoint-owning
//! worker threads, and the lifecycle API (`init`/`activate`/`wait`/`stop`/
//! `destroy`) that wires them to a host-supplied [`IoBuffers`].
//!
//! The original multiplexes audio-in, audio-out, and MIDI-in completion
//! callbacks onto one "USB driver thread" blocked in `libusb_handle_events`.
//! `rusb`'s safe API exposes only blocking transfers, not that async
//! completion queue, so here each of those three plus the p2o MIDI pacer
//! gets its own thread doing `blocking transfer -> process -> transfer`.
//! Each thread still owns exactly one buffer and one ring, so the "one
//! transfer in flight per endpoint" and "no cross-thread buffer sharing"
//! properties hold by construction rather than by a shared lock.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use ob_dll::DllOverwitch;
use ob_usb::block;
use ob_usb::{DeviceDescriptor, UsbDevice};

use crate::codec::{decode_o2p_transfer, encode_p2o_transfer, init_transfer_headers};
use crate::error::{EngineError, Result};
use crate::io_buffers::{self, ActiveIo, IoBuffers, O2pAudioIo, O2pMidiIo, P2oAudioIo, PacerIo, ReadRing, WriteRing};
use crate::midi::{MidiPacer, filter_o2p_midi};
use crate::status::{Status, StatusCell};

/// Nominal sample rate every known device runs at; feeds the DLL and the
/// p2o MIDI pacer's idle sleep. The original reads this from the device's
/// USB audio descriptor, but every descriptor in [`ob_usb::DEVICE_DESCS`]
/// advertises the same class-compliant 48 kHz, so it's a constant here.
pub const NOMINAL_SAMPLE_RATE_HZ: f64 = 48_000.0;

/// Abstraction over the USB transport the worker threads drive, so tests
/// can substitute a mock device instead of a real `rusb` handle.
pub trait UsbTransport: Send + Sync {
    fn read_audio_in(&self, buf: &mut [u8]) -> ob_usb::Result<usize>;
    fn write_audio_out(&self, buf: &[u8]) -> ob_usb::Result<usize>;
    fn read_midi_in(&self, buf: &mut [u8]) -> ob_usb::Result<usize>;
    fn write_midi_out(&self, buf: &[u8]) -> ob_usb::Result<usize>;
}

impl UsbTransport for UsbDevice {
    fn read_audio_in(&self, buf: &mut [u8]) -> ob_usb::Result<usize> {
        UsbDevice::read_audio_in(self, buf)
    }

    fn write_audio_out(&self, buf: &[u8]) -> ob_usb::Result<usize> {
        UsbDevice::write_audio_out(self, buf)
    }

    fn read_midi_in(&self, buf: &mut [u8]) -> ob_usb::Result<usize> {
        UsbDevice::read_midi_in(self, buf)
    }

    fn write_midi_out(&self, buf: &[u8]) -> ob_usb::Result<usize> {
        UsbDevice::write_midi_out(self, buf)
    }
}

/// State shared across the engine's worker threads: the status machine,
/// the re-arm generation counter, the p2o MIDI ready flag, and the latency
/// counters the host never sees outside of tests.
struct Shared {
    status: StatusCell,
    /// Bumped by the o2p audio thread on every BOOT; the p2o audio thread
    /// compares this against its own last-seen value to know when to reset
    /// `reading_at_p2o_end`, drain its ring, and zero its transfer buffer,
    /// without the two threads ever touching each other's buffers directly.
    rearm_generation: AtomicU64,
    p2o_audio_enabled: AtomicBool,
    p2o_latency: AtomicUsize,
    p2o_max_latency: AtomicUsize,
    p2o_midi_ready: Mutex<bool>,
    dll: Mutex<Option<DllOverwitch>>,
}

struct Threads {
    o2p_audio: JoinHandle<()>,
    p2o_audio: JoinHandle<()>,
    o2p_midi: Option<JoinHandle<()>>,
    p2o_midi: Option<JoinHandle<()>>,
}

/// A realtime USB audio/MIDI bridge for one class-compliant device.
///
/// Owns nothing about the host's rings until [`activate`](Self::activate)
/// is called; before that, `init` has only opened and configured the
/// device. Dropping the engine stops and joins every worker thread before
/// the underlying device handle is released.
pub struct Engine {
    shared: Arc<Shared>,
    transport: Arc<dyn UsbTransport>,
    device: DeviceDescriptor,
    blocks_per_transfer: usize,
    threads: Mutex<Option<Threads>>,
}

impl Engine {
    /// Opens and configures the device at `(bus, address)`. `blocks_per_transfer`
    /// sets how many wire blocks each USB transfer carries; the original
    /// hardcodes this per firmware revision, so callers choose it once and
    /// it never changes for the life of the engine.
    pub fn init(bus: u8, address: u8, blocks_per_transfer: usize) -> Result<Self> {
        let (usb, device) = UsbDevice::open(bus, address)?;
        Self::from_transport(Arc::new(usb), device, blocks_per_transfer)
    }

    /// Builds an engine around an already-open transport. Exposed so tests
    /// can substitute a mock [`UsbTransport`] for a real device.
    pub fn from_transport(
        transport: Arc<dyn UsbTransport>,
        device: DeviceDescriptor,
        blocks_per_transfer: usize,
    ) -> Result<Self> {
        let shared = Arc::new(Shared {
            status: StatusCell::new(Status::Stop),
            rearm_generation: AtomicU64::new(0),
            p2o_audio_enabled: AtomicBool::new(false),
            p2o_latency: AtomicUsize::new(0),
            p2o_max_latency: AtomicUsize::new(0),
            p2o_midi_ready: Mutex::new(true),
            dll: Mutex::new(None),
        });

        Ok(Self { shared, transport, device, blocks_per_transfer, threads: Mutex::new(None) })
    }

    /// Activates without requesting a DLL clock estimate.
    pub fn activate(&self, io: IoBuffers) -> Result<()> {
        self.activate_with_dll(io, false)
    }

    /// Validates `io`, spawns the worker threads, and raises status to
    /// `READY`. Per the stricter DLL/`get_time` reading: requesting a DLL
    /// without a host clock (and therefore without MIDI) is rejected before
    /// any thread starts.
    pub fn activate_with_dll(&self, io: IoBuffers, with_dll: bool) -> Result<()> {
        let active: ActiveIo = io_buffers::activate(io, with_dll)?;

        if with_dll {
            *self.shared.dll.lock().expect("dll mutex poisoned") = Some(DllOverwitch::new(NOMINAL_SAMPLE_RATE_HZ));
        }

        let (o2p_audio_io, p2o_audio_io, o2p_midi_io, pacer_io) = active.split();

        self.shared.status.set(Status::Ready);

        let o2p_audio = self.spawn_o2p_audio_thread(o2p_audio_io);
        let p2o_audio = self.spawn_p2o_audio_thread(p2o_audio_io);
        let o2p_midi = o2p_midi_io.map(|io| self.spawn_o2p_midi_thread(io));
        let p2o_midi = pacer_io.map(|io| self.spawn_p2o_midi_thread(io));

        *self.threads.lock().expect("threads mutex poisoned") =
            Some(Threads { o2p_audio, p2o_audio, o2p_midi, p2o_midi });

        Ok(())
    }

    fn frames_per_transfer(&self) -> usize {
        self.device.frames_per_block as usize * self.blocks_per_transfer
    }

    fn spawn_o2p_audio_thread(&self, io: O2pAudioIo) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        let transport = Arc::clone(&self.transport);
        let outputs = self.device.outputs as usize;
        let frames_per_block = self.device.frames_per_block as usize;
        let blocks_per_transfer = self.blocks_per_transfer;
        let frames_per_transfer = self.frames_per_transfer();

        thread::spawn(move || {
            run_o2p_audio(shared, transport, io, outputs, frames_per_block, blocks_per_transfer, frames_per_transfer);
        })
    }

    fn spawn_p2o_audio_thread(&self, io: P2oAudioIo) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        let transport = Arc::clone(&self.transport);
        let inputs = self.device.inputs as usize;
        let frames_per_block = self.device.frames_per_block as usize;
        let blocks_per_transfer = self.blocks_per_transfer;
        let frames_per_transfer = self.frames_per_transfer();

        thread::spawn(move || {
            run_p2o_audio(shared, transport, io, inputs, frames_per_block, blocks_per_transfer, frames_per_transfer);
        })
    }

    fn spawn_o2p_midi_thread(&self, io: O2pMidiIo) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        let transport = Arc::clone(&self.transport);

        thread::spawn(move || {
            run_o2p_midi(shared, transport, io);
        })
    }

    fn spawn_p2o_midi_thread(&self, io: PacerIo) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        let transport = Arc::clone(&self.transport);

        thread::spawn(move || {
            run_p2o_midi(shared, transport, io);
        })
    }

    /// Blocks until every worker thread has exited, e.g. after `stop()`.
    pub fn wait(&self) {
        if let Some(threads) = self.threads.lock().expect("threads mutex poisoned").take() {
            let _ = threads.o2p_audio.join();
            let _ = threads.p2o_audio.join();
            if let Some(h) = threads.o2p_midi {
                let _ = h.join();
            }
            if let Some(h) = threads.p2o_midi {
                let _ = h.join();
            }
        }
    }

    /// Requests a clean shutdown. Threads observe this at the top of their
    /// next cycle and return; call [`wait`](Self::wait) to block until they
    /// have, or rely on [`Drop`] to do both before the device handle closes.
    pub fn stop(&self) {
        self.shared.status.set(Status::Stop);
    }

    /// Releases the device and every engine resource. Equivalent to
    /// dropping the engine; spelled out because the original exposes
    /// `destroy` as an explicit lifecycle step.
    pub fn destroy(self) {}

    pub fn get_status(&self) -> Status {
        self.shared.status.get()
    }

    /// Requests a new run cycle. Only meaningful from `WAIT`/`RUN`, where
    /// the o2p audio thread notices it and re-arms.
    pub fn set_status(&self, status: Status) {
        self.shared.status.set(status);
    }

    pub fn is_p2o_audio_enable(&self) -> bool {
        self.shared.p2o_audio_enabled.load(Ordering::Acquire)
    }

    pub fn set_p2o_audio_enable(&self, enabled: bool) {
        self.shared.p2o_audio_enabled.store(enabled, Ordering::Release);
    }

    pub fn get_device_desc(&self) -> DeviceDescriptor {
        self.device
    }

    pub fn get_err_str(err: EngineError) -> &'static str {
        err.err_str()
    }

    /// Rounds `bytes` down to the nearest whole frame for `channels`
    /// channels of 32-bit samples; mirrors the original's
    /// `ow_bytes_to_frame_bytes` helper used when sizing ring reads.
    pub fn bytes_to_frame_bytes(&self, bytes: usize, channels: usize) -> usize {
        let frame_size = channels * block::SAMPLE_SIZE;
        (bytes / frame_size) * frame_size
    }

    /// Current p2o ring fill level as of the last audio-out cycle, in
    /// bytes. Not part of the original's public surface, but the S1
    /// end-to-end scenario needs to observe it.
    pub fn p2o_latency(&self) -> usize {
        self.shared.p2o_latency.load(Ordering::Relaxed)
    }

    pub fn p2o_max_latency(&self) -> usize {
        self.shared.p2o_max_latency.load(Ordering::Relaxed)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
        self.wait();
    }
}

#[allow(clippy::too_many_arguments)]
fn run_o2p_audio(
    shared: Arc<Shared>,
    transport: Arc<dyn UsbTransport>,
    io: O2pAudioIo,
    outputs: usize,
    frames_per_block: usize,
    blocks_per_transfer: usize,
    frames_per_transfer: usize,
) {
    let transfer_bytes = block::block_len(frames_per_block, outputs) * blocks_per_transfer;
    let frame_size = outputs * block::SAMPLE_SIZE;
    let o2p_transfer_size = frames_per_transfer * frame_size;

    let mut raw_in = vec![0u8; transfer_bytes];
    let mut floats = vec![0.0f32; frames_per_transfer * outputs];
    debug_assert_eq!(o2p_transfer_size, floats.len() * std::mem::size_of::<f32>());

    'outer: loop {
        // READY -> BOOT: the thread itself observes READY and proceeds
        // (spec.md §4.6); it never waits to be told.
        loop {
            let current = shared.status.get();
            if current <= Status::Stop {
                return;
            }
            if current >= Status::Ready {
                break;
            }
            thread::yield_now();
        }

        // BOOT: (re)arm. Reset the counters the p2o thread also resets on
        // its side, bump the generation it watches for, and re-seed the DLL.
        shared.p2o_latency.store(0, Ordering::Relaxed);
        shared.p2o_max_latency.store(0, Ordering::Relaxed);
        shared.rearm_generation.fetch_add(1, Ordering::AcqRel);

        if let Some(dll) = shared.dll.lock().expect("dll mutex poisoned").as_mut() {
            if let Some(get_time) = &io.get_time {
                dll.init(frames_per_transfer as u32, get_time());
            }
        }

        shared.status.set(Status::Wait);

        loop {
            match transport.read_audio_in(&mut raw_in) {
                Ok(_) => {}
                // Real audio-in transfers carry no timeout (spec.md §4.1) and a
                // live device never produces one; only a test harness winding
                // down does. Treat it like the MIDI-in path's benign timeout:
                // loop back around so the top-of-loop status checks can
                // observe `Stop` instead of tearing the stream down as an error.
                Err(e) if e.is_timeout() => {
                    if shared.status.get() <= Status::Stop {
                        return;
                    }
                    continue;
                }
                Err(_) => {
                    shared.status.set(Status::Error);
                    return;
                }
            }

            if let Some(get_time) = &io.get_time {
                let now = get_time();
                if let Some(dll) = shared.dll.lock().expect("dll mutex poisoned").as_mut() {
                    dll.update(frames_per_transfer as u32, now);
                }
            }

            decode_o2p_transfer(&raw_in, blocks_per_transfer, frames_per_block, outputs, &mut floats);

            let current = shared.status.get();
            if current >= Status::Run {
                if io.o2p_audio.write_space() >= o2p_transfer_size {
                    // The host ring carries native float, not the USB wire's
                    // big-endian int32 (spec.md §4.2 step 2, §6 "float ring
                    // buffers"); the int32 codec belongs only at the wire
                    // boundary, already applied by `decode_o2p_transfer` above.
                    io.o2p_audio.write(bytemuck::cast_slice(&floats));
                } else {
                    eprintln!("o2p audio ring overflow, dropping transfer");
                }
            }

            let current = shared.status.get();
            if current <= Status::Stop {
                return;
            }
            if current == Status::Boot {
                continue 'outer;
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_p2o_audio(
    shared: Arc<Shared>,
    transport: Arc<dyn UsbTransport>,
    io: P2oAudioIo,
    inputs: usize,
    frames_per_block: usize,
    blocks_per_transfer: usize,
    frames_per_transfer: usize,
) {
    let transfer_bytes = block::block_len(frames_per_block, inputs) * blocks_per_transfer;
    let frame_size = inputs * block::SAMPLE_SIZE;
    let p2o_transfer_size = frames_per_transfer * frame_size;

    let mut raw_out = vec![0u8; transfer_bytes];
    init_transfer_headers(&mut raw_out, blocks_per_transfer, frames_per_block, inputs);
    let mut frames_counter: u32 = 0;

    let mut floats = vec![0.0f32; frames_per_transfer * inputs];
    debug_assert_eq!(p2o_transfer_size, floats.len() * std::mem::size_of::<f32>());

    let mut reading_at_p2o_end = false;
    let mut last_seen_generation = shared.rearm_generation.load(Ordering::Acquire);
    let mut underflow_warned = false;

    loop {
        let current = shared.status.get();
        if current <= Status::Stop {
            return;
        }

        let generation = shared.rearm_generation.load(Ordering::Acquire);
        if generation != last_seen_generation {
            last_seen_generation = generation;
            reading_at_p2o_end = false;
            underflow_warned = false;
            let backlog = io.p2o_audio.read_space();
            let aligned = (backlog / frame_size) * frame_size;
            io.p2o_audio.read(None, aligned);
            floats.iter_mut().for_each(|f| *f = 0.0);
        }

        if !reading_at_p2o_end {
            floats.iter_mut().for_each(|f| *f = 0.0);
            if shared.p2o_audio_enabled.load(Ordering::Acquire) && io.p2o_audio.read_space() >= p2o_transfer_size {
                // Catch up: the host has been filling the ring since before
                // the device started pulling. Discard the accumulated
                // backlog down to a frame boundary so the first real read
                // below starts at the tail, not the head, minimizing
                // latency (spec.md §4.3 Phase A).
                let backlog = io.p2o_audio.read_space();
                let aligned = (backlog / frame_size) * frame_size;
                io.p2o_audio.read(None, aligned);
                reading_at_p2o_end = true;
            }
        } else if !shared.p2o_audio_enabled.load(Ordering::Acquire) {
            floats.iter_mut().for_each(|f| *f = 0.0);
            reading_at_p2o_end = false;
        } else {
            let level = io.p2o_audio.read_space();
            shared.p2o_latency.store(level, Ordering::Relaxed);
            shared.p2o_max_latency.fetch_max(level, Ordering::Relaxed);

            if level >= p2o_transfer_size {
                // The host ring carries native float (spec.md §4.3 Phase B,
                // §6); read straight into `floats`' byte representation,
                // no int32 codec at this boundary.
                io.p2o_audio.read(Some(bytemuck::cast_slice_mut(&mut floats)), p2o_transfer_size);
            } else {
                let available_frames = level / frame_size;
                if available_frames == 0 {
                    floats.iter_mut().for_each(|f| *f = 0.0);
                } else {
                    let mut scratch_floats = vec![0.0f32; available_frames * inputs];
                    io.p2o_audio.read(Some(bytemuck::cast_slice_mut(&mut scratch_floats)), available_frames * frame_size);

                    match ob_resample::resample_interleaved(&scratch_floats, inputs, available_frames, frames_per_transfer)
                    {
                        Ok(resampled) => {
                            floats.copy_from_slice(&resampled);
                            if !underflow_warned {
                                eprintln!("p2o audio ring underflow, falling back to resampler");
                                underflow_warned = true;
                            }
                        }
                        Err(e) => {
                            eprintln!("p2o audio resample fallback failed: {e}");
                            floats.iter_mut().for_each(|f| *f = 0.0);
                        }
                    }
                }
            }
        }

        encode_p2o_transfer(&floats, blocks_per_transfer, frames_per_block, inputs, &mut frames_counter, &mut raw_out);

        if transport.write_audio_out(&raw_out).is_err() {
            shared.status.set(Status::Error);
            return;
        }
    }
}

fn run_o2p_midi(shared: Arc<Shared>, transport: Arc<dyn UsbTransport>, io: O2pMidiIo) {
    let mut raw = [0u8; ob_usb::MIDI_MAX_TRANSFER];

    loop {
        if shared.status.get() <= Status::Stop {
            return;
        }

        match transport.read_midi_in(&mut raw) {
            Ok(n) => {
                if shared.status.get() >= Status::Run {
                    let time = (io.get_time)();
                    let result = filter_o2p_midi(&raw, n, time);
                    for event in result.forwarded {
                        let record = event.to_record();
                        if io.o2p_midi.write_space() >= ob_midi::MIDI_EVENT_RECORD_SIZE {
                            io.o2p_midi.write(&record);
                        } else {
                            eprintln!("o2p midi ring overflow, dropping event");
                        }
                    }
                }
            }
            Err(e) if e.is_timeout() => {}
            Err(_) => {
                shared.status.set(Status::Error);
                return;
            }
        }
    }
}

fn run_p2o_midi(shared: Arc<Shared>, transport: Arc<dyn UsbTransport>, io: PacerIo) {
    let mut pacer = MidiPacer::new(NOMINAL_SAMPLE_RATE_HZ);

    loop {
        if shared.status.get() <= Status::Stop {
            return;
        }

        let outcome = pacer.next_outcome(&*io.p2o_midi);

        if let Some((buf, _len)) = outcome.batch {
            // Submit the whole fixed-size buffer, not just the filled
            // prefix: MIDI transfers are always 512-byte bulk buffers with
            // zeroed trailing bytes (spec.md §6), never a short write.
            *shared.p2o_midi_ready.lock().expect("p2o_midi_ready mutex poisoned") = false;
            match transport.write_midi_out(&buf) {
                Ok(_) => {
                    *shared.p2o_midi_ready.lock().expect("p2o_midi_ready mutex poisoned") = true;
                }
                Err(_) => {
                    shared.status.set(Status::Error);
                    return;
                }
            }
        }

        thread::sleep(outcome.sleep);
    }
}
