//! Scripted USB transport for exercising the driver and session without hardware.

use crate::protocol::{self, MICRODIA_PID, MICRODIA_VID, RDING_PID, RDING_VID};
use crate::transport::{Bus, Transport};
use crate::types::DeviceInfo;
use crate::Result;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Op {
    Detach(u8),
    SetConfiguration(u8),
    Claim(u8),
    Release(u8),
    WriteControl {
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: Vec<u8>,
    },
    ReadControl {
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        len: usize,
    },
    ReadInterrupt {
        endpoint: u8,
        len: usize,
    },
}

pub(crate) type OpLog = Arc<Mutex<Vec<Op>>>;

/// 0x0c80 = 3200 -> 12.5 °C
const DEFAULT_REPORT: [u8; 8] = [0x80, 0x02, 0x0c, 0x80, 0x00, 0x00, 0x00, 0x00];
const DEFAULT_DATA: [u8; 2] = [0x0c, 0x80];

pub(crate) struct MockTransport {
    ids: (u16, u16),
    descriptor: rusb::Result<(u16, u16)>,
    log: OpLog,
    interrupt: VecDeque<rusb::Result<Vec<u8>>>,
    control: VecDeque<rusb::Result<Vec<u8>>>,
    writes: usize,
    fail_write: Option<(usize, rusb::Error)>,
    short_writes: bool,
    detach_error: Option<rusb::Error>,
    config_error: Option<rusb::Error>,
    claim_error: Option<(u8, rusb::Error)>,
    release_error: Option<rusb::Error>,
}

impl MockTransport {
    pub fn with_ids(vendor_id: u16, product_id: u16) -> Self {
        Self {
            ids: (vendor_id, product_id),
            descriptor: Ok((vendor_id, product_id)),
            log: Arc::new(Mutex::new(Vec::new())),
            interrupt: VecDeque::new(),
            control: VecDeque::new(),
            writes: 0,
            fail_write: None,
            short_writes: false,
            detach_error: None,
            config_error: None,
            claim_error: None,
            release_error: None,
        }
    }

    pub fn microdia() -> Self {
        Self::with_ids(MICRODIA_VID, MICRODIA_PID)
    }

    pub fn rding() -> Self {
        Self::with_ids(RDING_VID, RDING_PID)
    }

    /// Shared handle to the operation log; stays valid after the transport moves.
    pub fn log(&self) -> OpLog {
        self.log.clone()
    }

    pub fn push_interrupt_response(&mut self, response: rusb::Result<Vec<u8>>) {
        self.interrupt.push_back(response);
    }

    pub fn push_control_response(&mut self, response: rusb::Result<Vec<u8>>) {
        self.control.push_back(response);
    }

    /// Fail the `nth` control write (0-based) with `error`.
    pub fn fail_write(&mut self, nth: usize, error: rusb::Error) {
        self.fail_write = Some((nth, error));
    }

    /// Report one byte fewer than requested on every control write.
    pub fn short_writes(&mut self, enabled: bool) {
        self.short_writes = enabled;
    }

    pub fn fail_detach(&mut self, error: rusb::Error) {
        self.detach_error = Some(error);
    }

    pub fn fail_configuration(&mut self, error: rusb::Error) {
        self.config_error = Some(error);
    }

    pub fn fail_claim(&mut self, interface: u8, error: rusb::Error) {
        self.claim_error = Some((interface, error));
    }

    pub fn fail_release(&mut self, error: rusb::Error) {
        self.release_error = Some(error);
    }

    /// Make the descriptor disagree with the ids the bus matched on.
    pub fn report_ids(&mut self, vendor_id: u16, product_id: u16) {
        self.descriptor = Ok((vendor_id, product_id));
    }

    fn record(&self, op: Op) {
        self.log.lock().unwrap().push(op);
    }
}

fn fill(buf: &mut [u8], response: rusb::Result<Vec<u8>>) -> rusb::Result<usize> {
    let data = response?;
    let n = data.len().min(buf.len());
    buf[..n].copy_from_slice(&data[..n]);
    Ok(n)
}

impl Transport for MockTransport {
    fn device_ids(&self) -> rusb::Result<(u16, u16)> {
        self.descriptor
    }

    fn detach_kernel_driver(&mut self, interface: u8) -> rusb::Result<()> {
        self.record(Op::Detach(interface));
        match self.detach_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn set_configuration(&mut self, config: u8) -> rusb::Result<()> {
        self.record(Op::SetConfiguration(config));
        match self.config_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn claim_interface(&mut self, interface: u8) -> rusb::Result<()> {
        self.record(Op::Claim(interface));
        match self.claim_error {
            Some((iface, e)) if iface == interface => Err(e),
            _ => Ok(()),
        }
    }

    fn release_interface(&mut self, interface: u8) -> rusb::Result<()> {
        self.record(Op::Release(interface));
        match self.release_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn write_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        _timeout: Duration,
    ) -> rusb::Result<usize> {
        self.record(Op::WriteControl {
            request_type,
            request,
            value,
            index,
            data: data.to_vec(),
        });
        let nth = self.writes;
        self.writes += 1;
        match self.fail_write {
            Some((fail_at, e)) if fail_at == nth => Err(e),
            _ if self.short_writes => Ok(data.len().saturating_sub(1)),
            _ => Ok(data.len()),
        }
    }

    fn read_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> rusb::Result<usize> {
        self.record(Op::ReadControl {
            request_type,
            request,
            value,
            index,
            len: buf.len(),
        });
        let response = self
            .control
            .pop_front()
            .unwrap_or_else(|| Ok(DEFAULT_DATA.to_vec()));
        fill(buf, response)
    }

    fn read_interrupt(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> rusb::Result<usize> {
        self.record(Op::ReadInterrupt {
            endpoint,
            len: buf.len(),
        });
        let response = self
            .interrupt
            .pop_front()
            .unwrap_or_else(|| Ok(DEFAULT_REPORT.to_vec()));
        fill(buf, response)
    }
}

/// A bus holding devices in enumeration order. Opening a device removes it.
pub(crate) struct MockBus {
    devices: Mutex<Vec<MockTransport>>,
}

impl MockBus {
    pub fn empty() -> Self {
        Self::with_devices(Vec::new())
    }

    pub fn with(device: MockTransport) -> Self {
        Self::with_devices(vec![device])
    }

    pub fn with_devices(devices: Vec<MockTransport>) -> Self {
        Self {
            devices: Mutex::new(devices),
        }
    }

    /// Devices not yet opened.
    pub fn remaining(&self) -> usize {
        self.devices.lock().unwrap().len()
    }

    fn take_first(&self, matches: impl Fn(u16, u16) -> bool) -> Option<MockTransport> {
        let mut devices = self.devices.lock().unwrap();
        let pos = devices.iter().position(|d| matches(d.ids.0, d.ids.1))?;
        Some(devices.remove(pos))
    }
}

impl Bus for MockBus {
    type Transport = MockTransport;

    fn open_supported(&self) -> Result<Option<MockTransport>> {
        Ok(self.take_first(protocol::is_supported))
    }

    fn open_at(&self, info: &DeviceInfo) -> Result<Option<MockTransport>> {
        Ok(self.take_first(|vid, pid| (vid, pid) == (info.vendor_id, info.product_id)))
    }
}
