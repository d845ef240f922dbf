//! The engine's error surface: every distinct way `init`/`activate` can
//! fail, plus the human-readable strings behind `get_err_str`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    LibusbInitFailed,
    CantFindDevice,
    CantSetUsbConfig,
    CantClaimInterface,
    CantSetAltSetting,
    CantClearEndpoint,
    CantPrepareTransfer,
    NoReadSpace,
    NoWriteSpace,
    NoRead,
    NoWrite,
    NoGetTime,
    NoP2oAudioBuf,
    NoO2pAudioBuf,
    NoP2oMidiBuf,
    NoO2pMidiBuf,
    /// Catch-all for failures with no dedicated kind, e.g. thread creation.
    Generic,
}

impl EngineError {
    pub fn err_str(self) -> &'static str {
        match self {
            EngineError::LibusbInitFailed => "could not initialize libusb",
            EngineError::CantFindDevice => "could not find a matching device",
            EngineError::CantSetUsbConfig => "could not set USB configuration",
            EngineError::CantClaimInterface => "could not claim USB interface",
            EngineError::CantSetAltSetting => "could not set interface alt setting",
            EngineError::CantClearEndpoint => "could not clear halt on endpoint",
            EngineError::CantPrepareTransfer => "could not prepare USB transfer",
            EngineError::NoReadSpace => "host did not supply a read_space ring",
            EngineError::NoWriteSpace => "host did not supply a write_space ring",
            EngineError::NoRead => "host did not supply a readable ring",
            EngineError::NoWrite => "host did not supply a writable ring",
            EngineError::NoGetTime => "host did not supply a time source",
            EngineError::NoP2oAudioBuf => "host did not supply the p2o audio ring",
            EngineError::NoO2pAudioBuf => "host did not supply the o2p audio ring",
            EngineError::NoP2oMidiBuf => "host did not supply the p2o MIDI ring",
            EngineError::NoO2pMidiBuf => "host did not supply the o2p MIDI ring",
            EngineError::Generic => "an unspecified error occurred",
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.err_str())
    }
}

impl std::error::Error for EngineError {}

impl From<ob_usb::UsbError> for EngineError {
    fn from(e: ob_usb::UsbError) -> Self {
        match e {
            ob_usb::UsbError::LibusbInitFailed => EngineError::LibusbInitFailed,
            ob_usb::UsbError::CantFindDevice => EngineError::CantFindDevice,
            ob_usb::UsbError::CantSetUsbConfig => EngineError::CantSetUsbConfig,
            ob_usb::UsbError::CantClaimInterface => EngineError::CantClaimInterface,
            ob_usb::UsbError::CantSetAltSetting => EngineError::CantSetAltSetting,
            ob_usb::UsbError::CantClearEndpoint => EngineError::CantClearEndpoint,
            ob_usb::UsbError::CantPrepareTransfer => EngineError::CantPrepareTransfer,
            ob_usb::UsbError::TransferFailed | ob_usb::UsbError::Timeout => EngineError::Generic,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
