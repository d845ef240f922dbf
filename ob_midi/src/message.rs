//! The USB-MIDI event the engine forwards between the device's MIDI
//! endpoints and the host's MIDI rings.
//!
//! On the wire the device groups MIDI data into fixed 4-byte packets
//! (`OB_MIDI_EVENT_SIZE` in the original protocol): a Cable-Number/Code-
//! Index byte followed by up to three MIDI data bytes. [`MidiEvent`] pairs
//! one such packet with the host timestamp it was read (o2p) or should be
//! sent (p2o) at.

use byteorder::{ByteOrder, LittleEndian};

/// Size in bytes of one USB-MIDI packet on the wire.
pub const MIDI_EVENT_SIZE: usize = 4;

/// Size in bytes of a [`MidiEvent`] once a timestamp is attached, i.e. the
/// unit the p2o/o2p MIDI rings are read and written in.
pub const MIDI_EVENT_RECORD_SIZE: usize = MIDI_EVENT_SIZE + 8;

/// A single USB-MIDI packet plus the host-clock time it is associated with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MidiEvent {
    /// Raw 4-byte USB-MIDI packet: `[cable_cin, data0, data1, data2]`.
    pub bytes: [u8; MIDI_EVENT_SIZE],
    /// Host monotonic time (seconds) this event was captured (o2p) or is
    /// scheduled for (p2o).
    pub time: f64,
}

impl MidiEvent {
    pub fn new(bytes: [u8; MIDI_EVENT_SIZE], time: f64) -> Self {
        Self { bytes, time }
    }

    /// Whether `bytes[0]` is a Code Index Number the engine forwards:
    /// Note-off, Note-on, Poly-KeyPress, Control Change, Program Change,
    /// Channel Pressure, PitchBend Change, or Single Byte (`0x08..=0x0F`).
    /// Reserved/unused code indices (`0x00..=0x07`) are dropped.
    #[inline]
    pub fn is_forwardable(&self) -> bool {
        is_forwardable_code_index(self.bytes[0])
    }

    /// Serializes this event into the fixed [`MIDI_EVENT_RECORD_SIZE`]-byte
    /// record the MIDI rings carry: the 4 packet bytes followed by the
    /// little-endian `f64` timestamp.
    pub fn to_record(self) -> [u8; MIDI_EVENT_RECORD_SIZE] {
        let mut out = [0u8; MIDI_EVENT_RECORD_SIZE];
        out[..MIDI_EVENT_SIZE].copy_from_slice(&self.bytes);
        LittleEndian::write_f64(&mut out[MIDI_EVENT_SIZE..], self.time);
        out
    }

    /// Parses a record previously produced by [`MidiEvent::to_record`].
    pub fn from_record(record: &[u8; MIDI_EVENT_RECORD_SIZE]) -> Self {
        let mut bytes = [0u8; MIDI_EVENT_SIZE];
        bytes.copy_from_slice(&record[..MIDI_EVENT_SIZE]);
        let time = LittleEndian::read_f64(&record[MIDI_EVENT_SIZE..]);
        Self { bytes, time }
    }
}

/// Whether a USB-MIDI Cable-Number/Code-Index byte denotes a channel or
/// system message the engine should forward (`0x08..=0x0F`).
#[inline]
pub fn is_forwardable_code_index(byte0: u8) -> bool {
    (0x08..=0x0F).contains(&byte0)
}
