//! GC2 USB vendor and product ID constants.

/// Foresight Sports USB Vendor ID.
pub const GC2_VENDOR_ID: u16 = 0x2C79;

/// GC2 launch monitor Product ID.
pub const GC2_PRODUCT_ID: u16 = 0x0110;
