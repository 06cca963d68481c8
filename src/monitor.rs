use crate::config::SessionConfig;
use crate::device::Session;
use crate::transport::{RusbTransport, Transport};
use crate::types::TemperatureReading;
use crate::{Result, TemperError};
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Granularity at which the poller checks its stop flag while waiting.
const STOP_POLL: Duration = Duration::from_millis(50);
const CHANNEL_CAPACITY: usize = 64;

/// Handle to a background thread polling a [`Session`] at a fixed interval.
///
/// Each poll sends the outcome of [`Session::read`], so recoverable failures reach the
/// receiver too. A non-recoverable error ends the thread after it is delivered.
pub struct Monitor {
    receiver: Receiver<Result<TemperatureReading>>,
    stop_flag: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl Monitor {
    /// Move `session` onto a polling thread. The session is closed when the thread exits.
    pub fn start<T>(session: Session<T>, interval: Duration) -> Result<Monitor>
    where
        T: Transport + Send + 'static,
    {
        let (sender, receiver) = crossbeam_channel::bounded(CHANNEL_CAPACITY);
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_clone = stop_flag.clone();

        let thread = std::thread::Builder::new()
            .name("temper-monitor".into())
            .spawn(move || {
                poll_loop(session, interval, sender, stop_clone);
            })
            .map_err(TemperError::MonitorSpawn)?;

        Ok(Monitor {
            receiver,
            stop_flag,
            thread: Some(thread),
        })
    }

    /// Open the first supported device and start polling it.
    pub fn open(config: SessionConfig, interval: Duration) -> Result<Monitor> {
        let session: Session<RusbTransport> = Session::open(config)?;
        Self::start(session, interval)
    }

    /// Receive the next poll result (blocks until available).
    pub fn recv(&self) -> Result<TemperatureReading> {
        self.receiver
            .recv()
            .map_err(|_| TemperError::StreamStopped)?
    }

    /// Try to receive a poll result without blocking.
    pub fn try_recv(&self) -> Option<Result<TemperatureReading>> {
        self.receiver.try_recv().ok()
    }

    /// Receive a poll result with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<TemperatureReading> {
        self.receiver
            .recv_timeout(timeout)
            .map_err(|e| match e {
                crossbeam_channel::RecvTimeoutError::Timeout => TemperError::Timeout,
                crossbeam_channel::RecvTimeoutError::Disconnected => TemperError::StreamStopped,
            })?
    }

    /// Check if the polling thread is still running.
    pub fn is_active(&self) -> bool {
        !self.stop_flag.load(Ordering::Relaxed)
            && self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop polling and wait for the thread to close the session.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn poll_loop<T: Transport>(
    mut session: Session<T>,
    interval: Duration,
    sender: Sender<Result<TemperatureReading>>,
    stop_flag: Arc<AtomicBool>,
) {
    log::info!("Monitor started ({} every {:?})", session.variant(), interval);

    loop {
        if stop_flag.load(Ordering::Relaxed) {
            log::info!("Monitor stopping (stop flag set)");
            break;
        }

        let result = session.read();
        let fatal = match &result {
            Ok(_) => false,
            Err(e) if e.is_recoverable() => {
                log::warn!("Monitor read failed: {}", e);
                false
            }
            Err(e) => {
                log::warn!("Monitor read failed, stopping: {}", e);
                true
            }
        };

        if let Err(e) = sender.try_send(result) {
            match e {
                crossbeam_channel::TrySendError::Full(_) => {
                    log::trace!("Monitor channel full, dropping reading");
                }
                crossbeam_channel::TrySendError::Disconnected(_) => {
                    log::info!("Monitor channel disconnected, stopping");
                    break;
                }
            }
        }

        if fatal || !sleep_unless_stopped(interval, &stop_flag) {
            break;
        }
    }

    if let Err(e) = session.close() {
        log::warn!("Error closing session from monitor: {}", e);
    }
}

/// Sleep for `interval` in short slices. Returns false if stopped meanwhile.
fn sleep_unless_stopped(interval: Duration, stop_flag: &AtomicBool) -> bool {
    let deadline = Instant::now() + interval;
    loop {
        if stop_flag.load(Ordering::Relaxed) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep((deadline - now).min(STOP_POLL));
    }
}
