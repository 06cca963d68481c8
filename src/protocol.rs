use crate::types::{DeviceVariant, RawSample, TemperatureReading};
use crate::{Result, TemperError};
use std::time::{Duration, Instant};

// -- USB identifiers --
pub const RDING_VID: u16 = 0x1130;
pub const RDING_PID: u16 = 0x660C;
pub const MICRODIA_VID: u16 = 0x0C45;
pub const MICRODIA_PID: u16 = 0x7401;

/// Support table, checked in order. First match wins.
pub const SUPPORTED_DEVICES: [(u16, u16, DeviceVariant); 2] = [
    (RDING_VID, RDING_PID, DeviceVariant::RDing),
    (MICRODIA_VID, MICRODIA_PID, DeviceVariant::Microdia),
];

pub const CONFIGURATION: u8 = 1;
pub const INTERFACES: [u8; 2] = [0x00, 0x01];
pub const INTERRUPT_ENDPOINT: u8 = 0x82;
pub const TIMEOUT: Duration = Duration::from_millis(5000);

// -- Control transfer shapes --
pub const REQUEST_TYPE_OUT: u8 = 0x21;
pub const REQUEST_TYPE_IN: u8 = 0xA1;
pub const HID_SET_REPORT: u8 = 0x09;
pub const HID_GET_REPORT: u8 = 0x01;

pub const HANDSHAKE_VALUE: u16 = 0x0201;
pub const HANDSHAKE_INDEX: u16 = 0x00;
pub const FRAME_VALUE: u16 = 0x0200;
pub const FRAME_INDEX: u16 = 0x01;
pub const DATA_VALUE: u16 = 0x0300;
pub const DATA_INDEX: u16 = 0x01;

// -- Packet geometry --
pub const FRAME_SIZE: usize = 8;
pub const DATA_BUFFER_SIZE: usize = 256;
/// Smallest GET_REPORT response that still holds a temperature code.
pub const MIN_DATA_LEN: usize = 2;

/// Celsius per raw code unit: 125 / 32000.
pub const SCALE: f32 = 125.0 / 32000.0;

pub const HANDSHAKE: [u8; 2] = [0x01, 0x01];

/// A named 8-byte command written with SET_REPORT.
#[derive(Debug, PartialEq, Eq)]
pub struct Frame {
    pub name: &'static str,
    pub bytes: [u8; FRAME_SIZE],
}

// -- Microdia frames --
pub const SELECT_TEMPERATURE: Frame = Frame {
    name: "select temperature",
    bytes: [0x01, 0x80, 0x33, 0x01, 0x00, 0x00, 0x00, 0x00],
};
pub const INIT_STEP_1: Frame = Frame {
    name: "init step 1",
    bytes: [0x01, 0x82, 0x77, 0x01, 0x00, 0x00, 0x00, 0x00],
};
pub const INIT_STEP_2: Frame = Frame {
    name: "init step 2",
    bytes: [0x01, 0x86, 0xFF, 0x01, 0x00, 0x00, 0x00, 0x00],
};

// -- RDing frames --
pub const SELECT_REGISTER: Frame = Frame {
    name: "select temperature register",
    bytes: [0x0A, 0x0B, 0x0C, 0x0D, 0x00, 0x00, 0x02, 0x00],
};
pub const CONFIRM: Frame = Frame {
    name: "confirm",
    bytes: [0x0A, 0x0B, 0x0C, 0x0D, 0x00, 0x00, 0x01, 0x00],
};
pub const READ_MODEL: Frame = Frame {
    name: "read model",
    bytes: [0x52, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
};
pub const QUERY_TEMPERATURE: Frame = Frame {
    name: "query temperature",
    bytes: [0x54, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
};
pub const NOOP: Frame = Frame {
    name: "no-op",
    bytes: [0x00; FRAME_SIZE],
};

/// One transfer in a variant's command sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Write [`HANDSHAKE`] at value 0x0201, index 0.
    Handshake,
    /// Write a frame at value 0x0200, index 1.
    Send(&'static Frame),
    /// Read 8 bytes from the interrupt endpoint and drop them.
    Drain,
    /// GET_REPORT into a 256-byte buffer; fewer than 2 bytes is a failure.
    Fetch,
}

/// Where a variant's temperature code comes from once the request frames are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleSource {
    Interrupt,
    ControlBulk,
}

/// Per-variant protocol tables.
#[derive(Debug)]
pub struct Profile {
    pub variant: DeviceVariant,
    pub init: &'static [Step],
    pub request: &'static [Step],
    pub sample: SampleSource,
}

static MICRODIA: Profile = Profile {
    variant: DeviceVariant::Microdia,
    init: &[
        Step::Handshake,
        Step::Send(&SELECT_TEMPERATURE),
        Step::Drain,
        Step::Send(&INIT_STEP_1),
        Step::Drain,
        Step::Send(&INIT_STEP_2),
        Step::Drain,
        Step::Drain,
    ],
    request: &[Step::Send(&SELECT_TEMPERATURE)],
    sample: SampleSource::Interrupt,
};

// The seven no-op frames are a settling requirement of the RDing firmware.
static RDING: Profile = Profile {
    variant: DeviceVariant::RDing,
    init: &[
        Step::Send(&SELECT_REGISTER),
        Step::Send(&READ_MODEL),
        Step::Send(&NOOP),
        Step::Send(&NOOP),
        Step::Send(&NOOP),
        Step::Send(&NOOP),
        Step::Send(&NOOP),
        Step::Send(&NOOP),
        Step::Send(&NOOP),
        Step::Send(&CONFIRM),
        Step::Fetch,
    ],
    request: &[
        Step::Send(&SELECT_REGISTER),
        Step::Send(&QUERY_TEMPERATURE),
        Step::Send(&CONFIRM),
    ],
    sample: SampleSource::ControlBulk,
};

/// Protocol tables for a variant.
pub fn profile(variant: DeviceVariant) -> &'static Profile {
    match variant {
        DeviceVariant::Microdia => &MICRODIA,
        DeviceVariant::RDing => &RDING,
    }
}

/// Classify a device by its descriptor ids.
pub fn identify(vendor_id: u16, product_id: u16) -> Result<DeviceVariant> {
    SUPPORTED_DEVICES
        .iter()
        .find(|(vid, pid, _)| *vid == vendor_id && *pid == product_id)
        .map(|(_, _, variant)| *variant)
        .ok_or(TemperError::UnsupportedDevice {
            vendor_id,
            product_id,
        })
}

pub fn is_supported(vendor_id: u16, product_id: u16) -> bool {
    identify(vendor_id, product_id).is_ok()
}

/// Convert a big-endian signed sensor code to Celsius.
///
/// The high byte carries the sign; codes are two's complement i16.
pub fn decode(raw_high: u8, raw_low: u8, calibration: i32) -> f32 {
    let code = i16::from_be_bytes([raw_high, raw_low]) as i32;
    code.saturating_add(calibration) as f32 * SCALE
}

impl RawSample {
    /// Signed temperature code carried by this response.
    pub fn code(&self) -> Result<i16> {
        match self {
            RawSample::Interrupt(report) => Ok(i16::from_be_bytes([report[2], report[3]])),
            RawSample::ControlBulk(data) if data.len() >= MIN_DATA_LEN => {
                Ok(i16::from_be_bytes([data[0], data[1]]))
            }
            RawSample::ControlBulk(data) => Err(TemperError::ShortTransfer {
                step: "data fetch",
                expected: MIN_DATA_LEN,
                actual: data.len(),
            }),
        }
    }

    /// Decode into a reading. Interrupt reports apply `calibration`; control-bulk
    /// responses never do.
    pub fn decode(&self, calibration: i32) -> Result<TemperatureReading> {
        let code = self.code()?;
        let [high, low] = code.to_be_bytes();
        let calibration = match self {
            RawSample::Interrupt(_) => calibration,
            RawSample::ControlBulk(_) => 0,
        };
        Ok(TemperatureReading {
            celsius: decode(high, low, calibration),
            raw_code: code,
            taken_at: Instant::now(),
        })
    }
}

/// Format bytes as space-separated hex for debug dumps.
pub fn hex_dump(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
