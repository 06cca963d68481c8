use std::fmt;
use std::time::Instant;

/// TEMPer hardware revision, resolved once from the USB descriptor at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceVariant {
    /// RDing/PCsensor TEMPer (1130:660c). Data is fetched with a GET_REPORT
    /// control read after a frame sequence on the control pipe.
    RDing,
    /// Microdia TEMPer (0c45:7401). Data arrives on interrupt endpoint 0x82.
    Microdia,
}

impl fmt::Display for DeviceVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceVariant::RDing => f.write_str("RDing"),
            DeviceVariant::Microdia => f.write_str("Microdia"),
        }
    }
}

/// Raw response carrying a temperature code, as returned by the device.
///
/// The two revisions put the code in different places and disagree on whether the
/// calibration offset applies, so both shapes are kept distinct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawSample {
    /// 8-byte interrupt report. Bytes `[2..4]` are a big-endian i16 code.
    Interrupt([u8; 8]),
    /// GET_REPORT buffer. Bytes `[0..2]` are a big-endian i16 code.
    ControlBulk(Vec<u8>),
}

/// A decoded temperature sample.
#[derive(Debug, Clone, Copy)]
pub struct TemperatureReading {
    /// Temperature in degrees Celsius, calibration included.
    pub celsius: f32,
    /// Signed code reported by the sensor, before calibration and scaling.
    pub raw_code: i16,
    /// Host instant the sample was decoded.
    pub taken_at: Instant,
}

impl TemperatureReading {
    pub fn fahrenheit(&self) -> f32 {
        self.celsius * 9.0 / 5.0 + 32.0
    }
}

impl fmt::Display for TemperatureReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}°C", self.celsius)
    }
}

/// A supported device found on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub bus_number: u8,
    pub address: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub variant: DeviceVariant,
}
