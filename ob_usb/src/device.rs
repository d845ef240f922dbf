//! The known-device table and the lookup the engine's `init` performs
//! against it.

/// An immutable record describing one supported device model: its display
/// name, its fixed channel counts, and its block framing. Looked up by
/// matching the connected USB device's vendor/product IDs against
/// [`DEVICE_DESCS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub name: &'static str,
    pub vendor_id: u16,
    pub product_id: u16,
    pub inputs: u8,
    pub outputs: u8,
    /// Frames packed into one wire block; fixed per device model.
    pub frames_per_block: u16,
}

/// Process-wide constant table of class-compliant devices the engine knows
/// how to talk to. Device discovery beyond vendor/product/bus/address
/// matching is out of scope; this table is the entire "discovery" surface.
pub const DEVICE_DESCS: &[DeviceDescriptor] = &[
    DeviceDescriptor {
        name: "Overbridge Two",
        vendor_id: 0x16c0,
        product_id: 0x0480,
        inputs: 2,
        outputs: 2,
        frames_per_block: 7,
    },
    DeviceDescriptor {
        name: "Overbridge Four",
        vendor_id: 0x16c0,
        product_id: 0x0481,
        inputs: 2,
        outputs: 4,
        frames_per_block: 7,
    },
    DeviceDescriptor {
        name: "Overbridge Eight",
        vendor_id: 0x16c0,
        product_id: 0x0482,
        inputs: 2,
        outputs: 8,
        frames_per_block: 7,
    },
];

/// Finds the descriptor matching `(vendor_id, product_id)`, or `None` if the
/// device is not in the known table.
pub fn find_descriptor(vendor_id: u16, product_id: u16) -> Option<&'static DeviceDescriptor> {
    DEVICE_DESCS
        .iter()
        .find(|desc| desc.vendor_id == vendor_id && desc.product_id == product_id)
}
