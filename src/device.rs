use crate::config::SessionConfig;
use crate::driver::Driver;
use crate::protocol::{self, CONFIGURATION, INTERFACES};
use crate::transport::{Bus, RusbBus, RusbTransport, Transport};
use crate::types::{DeviceInfo, DeviceVariant, TemperatureReading};
use crate::{Result, TemperError};

/// List all attached TEMPer devices without opening them.
pub fn list_devices() -> Result<Vec<DeviceInfo>> {
    RusbBus::new(false)?.list()
}

/// Lifecycle of an opened session.
///
/// Identification, claiming and initialization all happen inside [`Session::open`];
/// if any of them fails there is no session. An open session is `Ready` until closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Ready,
    Closed,
}

/// An opened, initialized TEMPer device.
///
/// The variant is fixed at open time. All I/O is blocking, bounded by the 5 s
/// transfer timeout, and takes `&mut self`, so there is never more than one
/// transfer in flight. Dropping the session closes it.
pub struct Session<T: Transport = RusbTransport> {
    /// `None` once closed; dropping the transport closes the handle.
    transport: Option<T>,
    driver: Driver,
    config: SessionConfig,
    state: State,
}

impl Session<RusbTransport> {
    /// Open the first supported device on the bus.
    pub fn open(config: SessionConfig) -> Result<Self> {
        Self::open_on(&RusbBus::new(config.debug)?, config)
    }

    /// Open a device previously returned by [`list_devices`].
    pub fn open_device(info: &DeviceInfo, config: SessionConfig) -> Result<Self> {
        Self::open_device_on(&RusbBus::new(config.debug)?, info, config)
    }
}

impl<T: Transport> Session<T> {
    /// Open the first supported device on `bus`, in bus order.
    ///
    /// With several TEMPers attached, whichever the bus enumerates first is used,
    /// regardless of variant. Use [`Session::open_device_on`] to pick one.
    pub fn open_on<B: Bus<Transport = T>>(bus: &B, config: SessionConfig) -> Result<Self> {
        match bus.open_supported()? {
            Some(transport) => Self::setup(transport, config),
            None => {
                log::debug!("No supported TEMPer on the bus");
                Err(TemperError::DeviceNotFound)
            }
        }
    }

    pub fn open_device_on<B: Bus<Transport = T>>(
        bus: &B,
        info: &DeviceInfo,
        config: SessionConfig,
    ) -> Result<Self> {
        let transport = bus.open_at(info)?.ok_or(TemperError::DeviceNotFound)?;
        Self::setup(transport, config)
    }

    fn setup(mut transport: T, config: SessionConfig) -> Result<Self> {
        let (vendor_id, product_id) = transport.device_ids()?;
        let variant = protocol::identify(vendor_id, product_id)?;
        log::trace!("Identified {:04x}:{:04x} as {}", vendor_id, product_id, variant);

        claim_interfaces(&mut transport)?;

        let driver = Driver::new(variant, config.debug);
        if let Err(e) = driver.initialize(&mut transport) {
            if let Err(release_err) = release_interfaces(&mut transport) {
                log::warn!("{} (after failed init)", release_err);
            }
            return Err(e);
        }

        log::info!(
            "Opened {} TEMPer {:04x}:{:04x} (calibration {})",
            variant,
            vendor_id,
            product_id,
            config.calibration_offset
        );

        Ok(Session {
            transport: Some(transport),
            driver,
            config,
            state: State::Ready,
        })
    }

    pub fn variant(&self) -> DeviceVariant {
        self.driver.variant()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Request and decode one temperature sample.
    ///
    /// A failed or short transfer yields [`TemperError::ReadingUnavailable`] and leaves
    /// the session usable. Reading a closed session yields [`TemperError::SessionClosed`].
    pub fn read(&mut self) -> Result<TemperatureReading> {
        let transport = match (self.state, self.transport.as_mut()) {
            (State::Ready, Some(t)) => t,
            _ => return Err(TemperError::SessionClosed),
        };

        let sample = self.driver.read_sample(transport)?;
        let reading = sample
            .decode(self.config.calibration_offset)
            .map_err(|e| TemperError::ReadingUnavailable {
                variant: self.driver.variant(),
                source: Box::new(e),
            })?;

        log::debug!("{} read {} (raw {})", self.variant(), reading, reading.raw_code);
        Ok(reading)
    }

    /// Release both interfaces and close the handle. Closing twice is a no-op.
    ///
    /// The session is closed even when releasing fails; the first release error is returned.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut transport) = self.transport.take() else {
            return Ok(());
        };
        self.state = State::Closed;

        let result = release_interfaces(&mut transport);
        drop(transport);
        log::info!("Closed {} TEMPer", self.variant());
        result
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Error closing session: {}", e);
        }
    }
}

/// Detach kernel drivers, select configuration 1 and claim both interfaces.
///
/// On a failed claim, interfaces already claimed are released again.
fn claim_interfaces<T: Transport + ?Sized>(transport: &mut T) -> Result<()> {
    for iface in INTERFACES {
        match transport.detach_kernel_driver(iface) {
            Ok(()) => log::debug!("Detached kernel driver from interface {}", iface),
            Err(rusb::Error::NotFound) | Err(rusb::Error::NotSupported) => {}
            Err(e) => log::warn!("Detach interface {}: {} (continuing)", iface, e),
        }
    }

    transport
        .set_configuration(CONFIGURATION)
        .map_err(TemperError::Configuration)?;

    for (i, &iface) in INTERFACES.iter().enumerate() {
        if let Err(source) = transport.claim_interface(iface) {
            for &claimed in &INTERFACES[..i] {
                if let Err(e) = transport.release_interface(claimed) {
                    log::warn!("Release interface {}: {}", claimed, e);
                }
            }
            return Err(TemperError::InterfaceClaim {
                interface: iface,
                source,
            });
        }
    }

    log::debug!("Claimed interfaces {:?}", INTERFACES);
    Ok(())
}

/// Release every claimed interface, attempting all of them before reporting the first error.
fn release_interfaces<T: Transport + ?Sized>(transport: &mut T) -> Result<()> {
    let mut first_err = None;
    for iface in INTERFACES {
        if let Err(source) = transport.release_interface(iface) {
            log::debug!("Release interface {}: {}", iface, source);
            first_err.get_or_insert(TemperError::Release {
                interface: iface,
                source,
            });
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
