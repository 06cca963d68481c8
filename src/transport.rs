use crate::protocol;
use crate::types::DeviceInfo;
use crate::Result;
use rusb::{Context, DeviceHandle, LogLevel, UsbContext};
use std::time::Duration;

/// Raw USB operations the protocol driver needs from an opened device.
///
/// Every method maps one-to-one onto a libusb call. Errors are returned as-is;
/// deciding which ones are fatal is the caller's job.
pub trait Transport {
    /// Vendor and product id from the device descriptor.
    fn device_ids(&self) -> rusb::Result<(u16, u16)>;

    fn detach_kernel_driver(&mut self, interface: u8) -> rusb::Result<()>;

    fn set_configuration(&mut self, config: u8) -> rusb::Result<()>;

    fn claim_interface(&mut self, interface: u8) -> rusb::Result<()>;

    fn release_interface(&mut self, interface: u8) -> rusb::Result<()>;

    fn write_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> rusb::Result<usize>;

    fn read_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize>;

    fn read_interrupt(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize>;
}

/// Device discovery: hands out a [`Transport`] for a supported device.
pub trait Bus {
    type Transport: Transport;

    /// Open the first device, in bus order, whose ids are in the support table.
    fn open_supported(&self) -> Result<Option<Self::Transport>>;

    /// Open the device at a specific bus location.
    fn open_at(&self, info: &DeviceInfo) -> Result<Option<Self::Transport>>;
}

/// libusb transport over a handle from a [`RusbBus`] context.
pub struct RusbTransport {
    handle: DeviceHandle<Context>,
}

impl RusbTransport {
    pub fn new(handle: DeviceHandle<Context>) -> Self {
        Self { handle }
    }
}

impl Transport for RusbTransport {
    fn device_ids(&self) -> rusb::Result<(u16, u16)> {
        let desc = self.handle.device().device_descriptor()?;
        Ok((desc.vendor_id(), desc.product_id()))
    }

    fn detach_kernel_driver(&mut self, interface: u8) -> rusb::Result<()> {
        self.handle.detach_kernel_driver(interface)
    }

    fn set_configuration(&mut self, config: u8) -> rusb::Result<()> {
        self.handle.set_active_configuration(config)
    }

    fn claim_interface(&mut self, interface: u8) -> rusb::Result<()> {
        self.handle.claim_interface(interface)
    }

    fn release_interface(&mut self, interface: u8) -> rusb::Result<()> {
        self.handle.release_interface(interface)
    }

    fn write_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        self.handle
            .write_control(request_type, request, value, index, data, timeout)
    }

    fn read_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        self.handle
            .read_control(request_type, request, value, index, buf, timeout)
    }

    fn read_interrupt(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        self.handle.read_interrupt(endpoint, buf, timeout)
    }
}

/// The host's USB bus, enumerated through a libusb context owned by this bus.
///
/// Each bus has its own context, so libusb's log level is scoped to the sessions
/// opened through it.
pub struct RusbBus {
    context: Context,
}

impl RusbBus {
    pub fn new(debug: bool) -> Result<Self> {
        let mut context = Context::new()?;
        context.set_log_level(usb_log_level(debug));
        Ok(Self { context })
    }

    /// All supported devices currently attached, without opening them.
    pub fn list(&self) -> Result<Vec<DeviceInfo>> {
        let devices = self.context.devices()?;
        let mut found = Vec::new();

        for device in devices.iter() {
            let desc = match device.device_descriptor() {
                Ok(d) => d,
                Err(e) => {
                    log::warn!(
                        "Failed to read descriptor at bus {} addr {}: {}",
                        device.bus_number(),
                        device.address(),
                        e
                    );
                    continue;
                }
            };

            if let Ok(variant) = protocol::identify(desc.vendor_id(), desc.product_id()) {
                found.push(DeviceInfo {
                    bus_number: device.bus_number(),
                    address: device.address(),
                    vendor_id: desc.vendor_id(),
                    product_id: desc.product_id(),
                    variant,
                });
            }
        }

        Ok(found)
    }

    fn open_matching(
        &self,
        matches: impl Fn(&rusb::Device<Context>, &rusb::DeviceDescriptor) -> bool,
    ) -> Result<Option<RusbTransport>> {
        let devices = self.context.devices()?;
        for device in devices.iter() {
            let desc = match device.device_descriptor() {
                Ok(d) => d,
                Err(_) => continue,
            };
            if !matches(&device, &desc) {
                continue;
            }

            log::debug!(
                "Found {:04x}:{:04x} at bus {} addr {}",
                desc.vendor_id(),
                desc.product_id(),
                device.bus_number(),
                device.address()
            );

            // A matching device that refuses to open is reported, not skipped.
            let handle = device.open()?;
            return Ok(Some(RusbTransport::new(handle)));
        }

        Ok(None)
    }
}

impl Bus for RusbBus {
    type Transport = RusbTransport;

    fn open_supported(&self) -> Result<Option<RusbTransport>> {
        self.open_matching(|_, desc| protocol::is_supported(desc.vendor_id(), desc.product_id()))
    }

    fn open_at(&self, info: &DeviceInfo) -> Result<Option<RusbTransport>> {
        self.open_matching(|device, desc| {
            device.bus_number() == info.bus_number
                && device.address() == info.address
                && desc.vendor_id() == info.vendor_id
                && desc.product_id() == info.product_id
        })
    }
}

/// libusb verbosity for a session's debug flag. Always explicit, never inherited.
fn usb_log_level(debug: bool) -> LogLevel {
    if debug {
        LogLevel::Debug
    } else {
        LogLevel::None
    }
}
