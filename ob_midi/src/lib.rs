//! # ob_midi
//!
//! USB-MIDI event types and the wire record format shared between the
//! device's MIDI endpoints and the host's MIDI rings.
//!
//! This crate provides:
//! - [`MidiEvent`] - a USB-MIDI packet paired with a host timestamp
//! - [`is_forwardable_code_index`] - the Cable-Number/Code-Index filter the
//!   engine applies to decide which packets cross the bridge

pub mod message;

pub use message::{MIDI_EVENT_RECORD_SIZE, MIDI_EVENT_SIZE, MidiEvent, is_forwardable_code_index};
