use crate::types::DeviceVariant;

/// Errors that can occur when interacting with a TEMPer device.
#[derive(Debug, thiserror::Error)]
pub enum TemperError {
    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    #[error("Device not found (VID:PID 1130:660C or 0C45:7401)")]
    DeviceNotFound,

    #[error("Unsupported device {vendor_id:04x}:{product_id:04x}")]
    UnsupportedDevice { vendor_id: u16, product_id: u16 },

    #[error("Could not set configuration: {0}")]
    Configuration(#[source] rusb::Error),

    #[error("Could not claim interface {interface}: {source}")]
    InterfaceClaim {
        interface: u8,
        #[source]
        source: rusb::Error,
    },

    #[error("Could not release interface {interface}: {source}")]
    Release {
        interface: u8,
        #[source]
        source: rusb::Error,
    },

    #[error("{step} failed: {source}")]
    Transfer {
        step: &'static str,
        #[source]
        source: rusb::Error,
    },

    #[error("{step} transferred {actual} bytes, expected {expected}")]
    ShortTransfer {
        step: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{variant} initialization failed: {source}")]
    Initialization {
        variant: DeviceVariant,
        #[source]
        source: Box<TemperError>,
    },

    #[error("{variant} reading unavailable: {source}")]
    ReadingUnavailable {
        variant: DeviceVariant,
        #[source]
        source: Box<TemperError>,
    },

    #[error("Session is closed")]
    SessionClosed,

    #[error("Monitor stopped")]
    StreamStopped,

    #[error("Could not start monitor thread: {0}")]
    MonitorSpawn(#[source] std::io::Error),

    #[error("Timeout waiting for a reading")]
    Timeout,
}

impl TemperError {
    /// Whether retrying the same operation on the same session may succeed.
    ///
    /// Only failed reads and monitor timeouts qualify. Everything else either ends the
    /// session or means there never was one.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TemperError::ReadingUnavailable { .. } | TemperError::Timeout
        )
    }
}
