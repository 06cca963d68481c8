/// Environment variable enabling transfer dumps and libusb debug output.
pub const ENV_DEBUG: &str = "TEMPER_DEBUG";
/// Environment variable holding the integer calibration offset.
pub const ENV_CALIBRATION: &str = "TEMPER_CALIBRATION";

/// Per-session settings, passed to [`Session::open`](crate::Session::open).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Dump every frame and response at `info` level and raise libusb's log level.
    pub debug: bool,
    /// Added to the raw sensor code before scaling. Only Microdia devices apply it.
    pub calibration_offset: i32,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_calibration(mut self, offset: i32) -> Self {
        self.calibration_offset = offset;
        self
    }

    /// Build a config from `TEMPER_DEBUG` and `TEMPER_CALIBRATION`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let debug = match lookup(ENV_DEBUG) {
            Some(v) => parse_bool(&v).unwrap_or_else(|| {
                log::warn!("Ignoring {}='{}' (expected 1|0|true|false|yes|no|on|off)", ENV_DEBUG, v);
                false
            }),
            None => false,
        };

        let calibration_offset = match lookup(ENV_CALIBRATION) {
            Some(v) => v.trim().parse::<i32>().unwrap_or_else(|_| {
                log::warn!("Ignoring {}='{}' (expected an integer)", ENV_CALIBRATION, v);
                0
            }),
            None => 0,
        };

        Self {
            debug,
            calibration_offset,
        }
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
