//! The open/configured USB device handle and its blocking transfer
//! primitives.
//!
//! Each of the four endpoints is driven by exactly one owning thread doing
//! `blocking transfer -> process -> blocking transfer -> ...`; because only
//! that thread ever touches the corresponding buffer, at most one transfer
//! of each kind is ever outstanding, the same guarantee the original's
//! resubmit-from-callback chain provided.

use std::time::Duration;

use rusb::{Context, DeviceHandle, UsbContext};

use crate::device::{DeviceDescriptor, find_descriptor};
use crate::error::{Result, UsbError};

pub const AUDIO_OUT_ENDPOINT: u8 = 0x03;
pub const AUDIO_IN_ENDPOINT: u8 = 0x83;
pub const MIDI_OUT_ENDPOINT: u8 = 0x01;
pub const MIDI_IN_ENDPOINT: u8 = 0x81;

/// Largest bulk transfer the MIDI endpoints will carry.
pub const MIDI_MAX_TRANSFER: usize = 512;

const CONFIGURATION: u8 = 1;
const AUDIO_OUT_INTERFACE: u8 = 1;
const AUDIO_OUT_ALT_SETTING: u8 = 3;
const AUDIO_IN_INTERFACE: u8 = 2;
const AUDIO_IN_ALT_SETTING: u8 = 2;
const MIDI_INTERFACE: u8 = 3;
const MIDI_ALT_SETTING: u8 = 0;

/// `Duration::ZERO` tells `rusb` to block with no timeout. Audio transfers
/// arrive at a fixed cadence set by the device's sample clock, so blocking
/// forever here only ever means "waiting for the next scheduled transfer."
const NO_TIMEOUT: Duration = Duration::ZERO;

/// MIDI-in has no fixed cadence — a quiet device may not send a packet for
/// minutes. A bounded timeout lets the owning thread wake periodically and
/// notice the engine has been asked to stop, instead of blocking forever.
const MIDI_IN_TIMEOUT: Duration = Duration::from_millis(100);

/// An open, configured device handle. Interfaces claimed during `open` are
/// released on drop; nothing else needs explicit teardown since `rusb`'s
/// blocking calls have no in-flight state to cancel.
pub struct UsbDevice {
    handle: DeviceHandle<Context>,
    claimed_interfaces: Vec<u8>,
}

impl UsbDevice {
    /// Opens the device at `(bus, address)`, verifies it is in the known
    /// device table, and fully configures it: sets configuration 1, claims
    /// interfaces 1/2/3 at alt settings 3/2/0, and clears halt on all four
    /// endpoints. On any failure, interfaces claimed so far are released
    /// before the error is returned.
    pub fn open(bus: u8, address: u8) -> Result<(Self, DeviceDescriptor)> {
        let context = Context::new().map_err(|_| UsbError::LibusbInitFailed)?;
        let devices = context.devices().map_err(|_| UsbError::CantFindDevice)?;

        let mut found = None;
        for device in devices.iter() {
            if device.bus_number() != bus || device.address() != address {
                continue;
            }
            let Ok(desc) = device.device_descriptor() else { continue };
            if let Some(known) = find_descriptor(desc.vendor_id(), desc.product_id()) {
                found = Some((device, *known));
                break;
            }
        }

        let (device, descriptor) = found.ok_or(UsbError::CantFindDevice)?;
        let handle = device.open().map_err(|_| UsbError::CantFindDevice)?;

        let mut usb = UsbDevice { handle, claimed_interfaces: Vec::new() };
        usb.configure()?;

        Ok((usb, descriptor))
    }

    fn configure(&mut self) -> Result<()> {
        self.handle
            .set_active_configuration(CONFIGURATION)
            .map_err(|_| UsbError::CantSetUsbConfig)?;

        self.claim_and_set_alt(AUDIO_OUT_INTERFACE, AUDIO_OUT_ALT_SETTING)?;
        self.claim_and_set_alt(AUDIO_IN_INTERFACE, AUDIO_IN_ALT_SETTING)?;
        self.claim_and_set_alt(MIDI_INTERFACE, MIDI_ALT_SETTING)?;

        for endpoint in [AUDIO_IN_ENDPOINT, AUDIO_OUT_ENDPOINT, MIDI_IN_ENDPOINT, MIDI_OUT_ENDPOINT] {
            self.handle.clear_halt(endpoint).map_err(|_| UsbError::CantClearEndpoint)?;
        }

        Ok(())
    }

    fn claim_and_set_alt(&mut self, interface: u8, alt_setting: u8) -> Result<()> {
        self.handle.claim_interface(interface).map_err(|_| UsbError::CantClaimInterface)?;
        self.claimed_interfaces.push(interface);
        self.handle
            .set_alternate_setting(interface, alt_setting)
            .map_err(|_| UsbError::CantSetAltSetting)?;
        Ok(())
    }

    /// Blocking interrupt-in read on the audio-in endpoint. No timeout.
    pub fn read_audio_in(&self, buf: &mut [u8]) -> Result<usize> {
        self.handle.read_interrupt(AUDIO_IN_ENDPOINT, buf, NO_TIMEOUT).map_err(UsbError::from)
    }

    /// Blocking interrupt-out write on the audio-out endpoint. No timeout.
    pub fn write_audio_out(&self, buf: &[u8]) -> Result<usize> {
        self.handle.write_interrupt(AUDIO_OUT_ENDPOINT, buf, NO_TIMEOUT).map_err(UsbError::from)
    }

    /// Blocking bulk read on the MIDI-in endpoint. `buf` must be at most
    /// [`MIDI_MAX_TRANSFER`] bytes. A [`UsbError::Timeout`] here is expected
    /// and benign whenever the device has nothing to send; callers must not
    /// treat it as a transport failure.
    pub fn read_midi_in(&self, buf: &mut [u8]) -> Result<usize> {
        debug_assert!(buf.len() <= MIDI_MAX_TRANSFER);
        self.handle.read_bulk(MIDI_IN_ENDPOINT, buf, MIDI_IN_TIMEOUT).map_err(UsbError::from)
    }

    /// Blocking bulk write on the MIDI-out endpoint. `buf` must be at most
    /// [`MIDI_MAX_TRANSFER`] bytes.
    pub fn write_midi_out(&self, buf: &[u8]) -> Result<usize> {
        debug_assert!(buf.len() <= MIDI_MAX_TRANSFER);
        self.handle.write_bulk(MIDI_OUT_ENDPOINT, buf, NO_TIMEOUT).map_err(UsbError::from)
    }
}

impl Drop for UsbDevice {
    fn drop(&mut self) {
        for &interface in &self.claimed_interfaces {
            let _ = self.handle.release_interface(interface);
        }
    }
}
