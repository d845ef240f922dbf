//! # ob_core
//!
//! Foundational, dependency-free building blocks shared by the overbridge
//! engine crates: a lock-free SPSC byte ring buffer used as the in-process
//! default for the host-supplied audio/MIDI rings.

pub mod ring;

pub use ring::{RingConsumer, RingProducer, byte_ring};
