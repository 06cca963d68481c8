use crate::protocol::{self, Frame, Profile, SampleSource, Step};
use crate::transport::Transport;
use crate::types::{DeviceVariant, RawSample};
use crate::{Result, TemperError};

/// Runs a variant's command tables against a transport.
///
/// Both hardware revisions go through this one type; what differs between them lives
/// in the [`Profile`] step tables.
#[derive(Debug, Clone, Copy)]
pub struct Driver {
    profile: &'static Profile,
    debug: bool,
}

impl Driver {
    pub fn new(variant: DeviceVariant, debug: bool) -> Self {
        Self {
            profile: protocol::profile(variant),
            debug,
        }
    }

    pub fn variant(&self) -> DeviceVariant {
        self.profile.variant
    }

    /// Run the init sequence. The first failing step aborts with
    /// [`TemperError::Initialization`].
    pub fn initialize<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<()> {
        log::debug!("Running {} init sequence", self.variant());
        self.run(transport, self.profile.init)
            .map_err(|e| TemperError::Initialization {
                variant: self.variant(),
                source: Box::new(e),
            })
    }

    /// Send the request frames and collect the response holding the temperature code.
    ///
    /// Any failure is reported as [`TemperError::ReadingUnavailable`].
    pub fn read_sample<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<RawSample> {
        self.request(transport)
            .map_err(|e| TemperError::ReadingUnavailable {
                variant: self.variant(),
                source: Box::new(e),
            })
    }

    fn request<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<RawSample> {
        self.run(transport, self.profile.request)?;
        let sample = match self.profile.sample {
            SampleSource::Interrupt => RawSample::Interrupt(self.read_interrupt(transport)?),
            SampleSource::ControlBulk => RawSample::ControlBulk(self.fetch(transport)?),
        };
        Ok(sample)
    }

    fn run<T: Transport + ?Sized>(&self, transport: &mut T, steps: &[Step]) -> Result<()> {
        for step in steps {
            match step {
                Step::Handshake => self.handshake(transport)?,
                Step::Send(frame) => self.send(transport, frame)?,
                Step::Drain => {
                    self.read_interrupt(transport)?;
                }
                Step::Fetch => {
                    self.fetch(transport)?;
                }
            }
        }
        Ok(())
    }

    fn handshake<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<()> {
        self.write(
            transport,
            "handshake",
            protocol::HANDSHAKE_VALUE,
            protocol::HANDSHAKE_INDEX,
            &protocol::HANDSHAKE,
        )
    }

    fn send<T: Transport + ?Sized>(&self, transport: &mut T, frame: &Frame) -> Result<()> {
        self.write(
            transport,
            frame.name,
            protocol::FRAME_VALUE,
            protocol::FRAME_INDEX,
            &frame.bytes,
        )
    }

    fn write<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        step: &'static str,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<()> {
        let n = transport
            .write_control(
                protocol::REQUEST_TYPE_OUT,
                protocol::HID_SET_REPORT,
                value,
                index,
                data,
                protocol::TIMEOUT,
            )
            .map_err(|source| TemperError::Transfer { step, source })?;

        if n < data.len() {
            return Err(TemperError::ShortTransfer {
                step,
                expected: data.len(),
                actual: n,
            });
        }

        self.dump(step, data);
        Ok(())
    }

    fn read_interrupt<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
    ) -> Result<[u8; protocol::FRAME_SIZE]> {
        let step = "interrupt read";
        let mut report = [0u8; protocol::FRAME_SIZE];
        let n = transport
            .read_interrupt(protocol::INTERRUPT_ENDPOINT, &mut report, protocol::TIMEOUT)
            .map_err(|source| TemperError::Transfer { step, source })?;

        if n != protocol::FRAME_SIZE {
            return Err(TemperError::ShortTransfer {
                step,
                expected: protocol::FRAME_SIZE,
                actual: n,
            });
        }

        self.dump(step, &report);
        Ok(report)
    }

    fn fetch<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<Vec<u8>> {
        let step = "data fetch";
        let mut buf = vec![0u8; protocol::DATA_BUFFER_SIZE];
        let n = transport
            .read_control(
                protocol::REQUEST_TYPE_IN,
                protocol::HID_GET_REPORT,
                protocol::DATA_VALUE,
                protocol::DATA_INDEX,
                &mut buf,
                protocol::TIMEOUT,
            )
            .map_err(|source| TemperError::Transfer { step, source })?;

        if n < protocol::MIN_DATA_LEN {
            return Err(TemperError::ShortTransfer {
                step,
                expected: protocol::MIN_DATA_LEN,
                actual: n,
            });
        }

        buf.truncate(n);
        self.dump(step, &buf);
        Ok(buf)
    }

    fn dump(&self, step: &str, data: &[u8]) {
        if self.debug {
            log::info!("{} ({} bytes): {}", step, data.len(), protocol::hex_dump(data));
        } else {
            log::trace!("{} ({} bytes)", step, data.len());
        }
    }
}
