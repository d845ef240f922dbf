//! USB-layer error kinds, one per distinct initialization failure step.

use std::fmt;

/// A failure raised while opening, configuring, or driving the USB device.
/// Each init-time step maps to its own kind so a caller can tell a
/// configuration problem from a missing device from a transfer failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsbError {
    LibusbInitFailed,
    CantFindDevice,
    CantSetUsbConfig,
    CantClaimInterface,
    CantSetAltSetting,
    CantClearEndpoint,
    CantPrepareTransfer,
    TransferFailed,
    /// The transfer timed out. Benign and expected on the MIDI-in endpoint
    /// when the device has nothing to send; callers should not log this one.
    Timeout,
}

impl UsbError {
    pub fn err_str(self) -> &'static str {
        match self {
            UsbError::LibusbInitFailed => "could not initialize libusb",
            UsbError::CantFindDevice => "could not find a matching device",
            UsbError::CantSetUsbConfig => "could not set USB configuration",
            UsbError::CantClaimInterface => "could not claim USB interface",
            UsbError::CantSetAltSetting => "could not set interface alt setting",
            UsbError::CantClearEndpoint => "could not clear halt on endpoint",
            UsbError::CantPrepareTransfer => "could not prepare USB transfer",
            UsbError::TransferFailed => "USB transfer failed",
            UsbError::Timeout => "USB transfer timed out",
        }
    }

    pub fn is_timeout(self) -> bool {
        matches!(self, UsbError::Timeout)
    }
}

impl fmt::Display for UsbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.err_str())
    }
}

impl std::error::Error for UsbError {}

impl From<rusb::Error> for UsbError {
    fn from(e: rusb::Error) -> Self {
        match e {
            rusb::Error::Timeout => UsbError::Timeout,
            _ => UsbError::TransferFailed,
        }
    }
}

pub type Result<T> = std::result::Result<T, UsbError>;
