//! # ob_usb
//!
//! The known-device table, the big-endian block wire codec, and the
//! blocking `rusb` device handle the engine's worker threads drive.

pub mod block;
pub mod device;
pub mod error;
pub mod handle;

pub use block::{
    BlockHeader, HEADER_MAGIC, HEADER_SIZE, PADDING_SIZE, SAMPLE_SIZE, block_len, decode_samples, encode_samples,
};
pub use device::{DEVICE_DESCS, DeviceDescriptor, find_descriptor};
pub use error::{Result, UsbError};
pub use handle::{
    AUDIO_IN_ENDPOINT, AUDIO_OUT_ENDPOINT, MIDI_IN_ENDPOINT, MIDI_MAX_TRANSFER, MIDI_OUT_ENDPOINT, UsbDevice,
};
