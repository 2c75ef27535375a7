/// The device identity written into a FIT file's `file_id` and
/// `device_info` messages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceIdentity {
    pub manufacturer_id: u16,
    pub product_id: u16,
    pub serial_number: u32,
    /// Decimal version as shown on the device (stored ×100 in the file).
    pub software_version: f32,
}

impl DeviceIdentity {
    /// Garmin Edge 840 running firmware 20.19.
    pub const GARMIN_EDGE_840: Self = Self {
        manufacturer_id: 1,
        product_id: 4024,
        serial_number: 3_141_592_653,
        software_version: 20.19,
    };

    /// Software version as the scaled integer the FIT profile stores.
    pub fn software_version_scaled(&self) -> u16 {
        (self.software_version * 100.0).round() as u16
    }
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self::GARMIN_EDGE_840
    }
}
