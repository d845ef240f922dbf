//! # ob_engine
//!
//! The realtime USB audio/MIDI bridge engine: transfer codecs, MIDI
//! forwarding and pacing, the status machine, the host I/O contract, and
//! the worker threads that drive a class-compliant device against a
//! host-supplied set of rings.
//!
//! Most of this crate is deliberately pure and I/O-free — [`codec`] and
//! [`midi`] convert buffers with no notion of a device or a ring, so they
//! are exercised directly in unit tests. [`engine`] is the only module that
//! spawns threads and touches a real or mocked [`UsbTransport`](engine::UsbTransport).

pub mod codec;
pub mod engine;
pub mod error;
pub mod io_buffers;
pub mod midi;
pub mod status;

pub use engine::{Engine, NOMINAL_SAMPLE_RATE_HZ, UsbTransport};
pub use error::{EngineError, Result};
pub use io_buffers::{ActiveIo, IoBuffers, O2pAudioIo, O2pMidiIo, P2oAudioIo, PacerIo, ReadRing, TimeSource, WriteRing};
pub use status::{Status, StatusCell};
