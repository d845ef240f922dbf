//! The contract the host fulfills to supply the engine with rings and a
//! clock. This is the Rust shape of the original's host-supplied function
//! pointers and opaque ring handles: each ring is a trait object bound to
//! one direction (the engine only ever reads `p2o_*` rings and writes
//! `o2p_*` rings), and the clock is a single optional closure.

use crate::error::{EngineError, Result};

/// A ring the engine reads from: `p2o_audio`, `p2o_midi`.
pub trait ReadRing: Send {
    fn read_space(&self) -> usize;
    /// `dst = None` means discard — consume the bytes without copying them
    /// anywhere, matching the host contract's `dst == null` convention.
    fn read(&self, dst: Option<&mut [u8]>, bytes: usize) -> usize;
}

/// A ring the engine writes into: `o2p_audio`, `o2p_midi`.
pub trait WriteRing: Send {
    fn write_space(&self) -> usize;
    fn write(&self, src: &[u8]) -> usize;
}

impl ReadRing for ob_core::RingConsumer {
    fn read_space(&self) -> usize {
        ob_core::RingConsumer::read_space(self)
    }

    fn read(&self, dst: Option<&mut [u8]>, bytes: usize) -> usize {
        ob_core::RingConsumer::read(self, dst, bytes)
    }
}

impl WriteRing for ob_core::RingProducer {
    fn write_space(&self) -> usize {
        ob_core::RingProducer::write_space(self)
    }

    fn write(&self, src: &[u8]) -> usize {
        ob_core::RingProducer::write(self, src)
    }
}

/// Monotonic seconds-valued host clock, stable across all engine calls.
pub type TimeSource = Box<dyn Fn() -> f64 + Send + Sync>;

/// Everything the host may supply. Audio rings are required for the
/// engine to run at all; the MIDI rings and the clock are jointly
/// optional — supply all three or none.
#[derive(Default)]
pub struct IoBuffers {
    pub p2o_audio: Option<Box<dyn ReadRing>>,
    pub o2p_audio: Option<Box<dyn WriteRing>>,
    pub p2o_midi: Option<Box<dyn ReadRing>>,
    pub o2p_midi: Option<Box<dyn WriteRing>>,
    pub get_time: Option<TimeSource>,
}

/// The validated, activation-ready form of [`IoBuffers`]: audio rings are
/// always present, and MIDI is either fully wired or fully absent.
pub struct ActiveIo {
    pub p2o_audio: Box<dyn ReadRing>,
    pub o2p_audio: Box<dyn WriteRing>,
    pub midi: Option<ActiveMidiIo>,
}

pub struct ActiveMidiIo {
    pub p2o_midi: Box<dyn ReadRing>,
    pub o2p_midi: Box<dyn WriteRing>,
    pub get_time: TimeSource,
}

impl ActiveIo {
    pub fn get_time(&self) -> Option<f64> {
        self.midi.as_ref().map(|m| (m.get_time)())
    }

    /// Splits validated I/O into the four pieces each own-endpoint thread
    /// drives. No ring is ever touched from more than one thread after this
    /// point; `get_time` is the one resource two threads (o2p audio and o2p
    /// MIDI) read concurrently, so it's promoted to an `Arc`.
    pub fn split(self) -> (O2pAudioIo, P2oAudioIo, Option<O2pMidiIo>, Option<PacerIo>) {
        let o2p_audio_io = O2pAudioIo { o2p_audio: self.o2p_audio, get_time: None };
        let p2o_audio_io = P2oAudioIo { p2o_audio: self.p2o_audio };

        match self.midi {
            Some(m) => {
                let get_time: std::sync::Arc<TimeSource> = std::sync::Arc::new(m.get_time);
                let o2p_audio_io = O2pAudioIo { get_time: Some(get_time.clone()), ..o2p_audio_io };
                let o2p_midi_io = O2pMidiIo { o2p_midi: m.o2p_midi, get_time };
                (o2p_audio_io, p2o_audio_io, Some(o2p_midi_io), Some(PacerIo { p2o_midi: m.p2o_midi }))
            }
            None => (o2p_audio_io, p2o_audio_io, None, None),
        }
    }
}

/// Rings and clock owned by the audio-in (o2p) thread.
pub struct O2pAudioIo {
    pub o2p_audio: Box<dyn WriteRing>,
    pub get_time: Option<std::sync::Arc<TimeSource>>,
}

/// The ring owned by the audio-out (p2o) thread.
pub struct P2oAudioIo {
    pub p2o_audio: Box<dyn ReadRing>,
}

/// The ring and clock owned by the MIDI-in (o2p) thread.
pub struct O2pMidiIo {
    pub o2p_midi: Box<dyn WriteRing>,
    pub get_time: std::sync::Arc<TimeSource>,
}

/// The ring owned by the p2o MIDI pacing thread.
pub struct PacerIo {
    pub p2o_midi: Box<dyn ReadRing>,
}

/// Validates a host-supplied [`IoBuffers`], producing the distinct
/// activation error kind for whichever piece is missing.
///
/// The original checked five function pointers (`read_space`/`write_space`/
/// `read`/`write`/`get_time`) and four ring handles individually for null.
/// In Rust a ring trait object's methods always exist once the object
/// exists, so the five function-pointer checks collapse into: did the host
/// provide this ring at all, and did it provide a clock. Per the stricter
/// reading of the DLL/get_time redundancy (dll requires get_time; MIDI
/// requires get_time): requesting the DLL without a clock is also an error,
/// even though only MIDI otherwise requires one.
pub fn activate(io: IoBuffers, dll_requested: bool) -> Result<ActiveIo> {
    let p2o_audio = io.p2o_audio.ok_or(EngineError::NoP2oAudioBuf)?;
    let o2p_audio = io.o2p_audio.ok_or(EngineError::NoO2pAudioBuf)?;

    let midi_requested = io.p2o_midi.is_some() || io.o2p_midi.is_some() || io.get_time.is_some();

    let midi = if midi_requested {
        let p2o_midi = io.p2o_midi.ok_or(EngineError::NoP2oMidiBuf)?;
        let o2p_midi = io.o2p_midi.ok_or(EngineError::NoO2pMidiBuf)?;
        let get_time = io.get_time.ok_or(EngineError::NoGetTime)?;
        Some(ActiveMidiIo { p2o_midi, o2p_midi, get_time })
    } else if dll_requested {
        return Err(EngineError::NoGetTime);
    } else {
        None
    };

    Ok(ActiveIo { p2o_audio, o2p_audio, midi })
}
