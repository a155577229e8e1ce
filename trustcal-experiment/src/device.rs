//! Link to the microcontroller that moves and scans the physical boards.
//!
//! The session only sends commands and polls for completions; whatever sits
//! behind the link (a timer, a serial port on another thread) never touches
//! session state.

use crate::error::{ExperimentError, Result};
use log::{debug, info, warn};
use serial2::SerialPort;
use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use trustcal_timing::{HighPrecisionTimer, Scheduler, Timer};

/// Single-byte commands understood by the device firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanCommand {
    Scan,
    ZoomScan,
    NextItem,
}

impl ScanCommand {
    pub fn byte(&self) -> u8 {
        match self {
            ScanCommand::Scan => b'1',
            ScanCommand::ZoomScan => b'2',
            ScanCommand::NextItem => b'3',
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'1' => Some(ScanCommand::Scan),
            b'2' => Some(ScanCommand::ZoomScan),
            b'3' => Some(ScanCommand::NextItem),
            _ => None,
        }
    }

    /// Scans report back when done; advancing the item does not.
    pub fn expects_reply(&self) -> bool {
        !matches!(self, ScanCommand::NextItem)
    }
}

pub trait ScanDevice {
    fn send(&mut self, command: ScanCommand) -> Result<()>;

    /// Next command the device has finished, if any.
    fn poll(&mut self) -> Option<ScanCommand>;

    /// Timestamp (ns) at which a pending completion is known to arrive, so the
    /// event loop can sleep until then instead of polling.
    fn next_deadline(&self) -> Option<u64> {
        None
    }
}

/// Stands in for the robot: every scan completes after a fixed delay.
#[derive(Debug)]
pub struct SimulatedScanner<T: Timer> {
    timer: T,
    delay: Duration,
    pending: Scheduler<ScanCommand>,
}

impl<T: Timer> SimulatedScanner<T> {
    pub fn new(timer: T, delay: Duration) -> Self {
        Self {
            timer,
            delay,
            pending: Scheduler::new(),
        }
    }
}

impl<T: Timer> ScanDevice for SimulatedScanner<T> {
    fn send(&mut self, command: ScanCommand) -> Result<()> {
        debug!("Simulated scanner received '{}'", command.byte() as char);
        if command.expects_reply() {
            self.pending
                .schedule_after(self.timer.now(), self.delay, command);
        }
        Ok(())
    }

    fn poll(&mut self) -> Option<ScanCommand> {
        self.pending.pop_due(self.timer.now())
    }

    fn next_deadline(&self) -> Option<u64> {
        self.pending.next_deadline()
    }
}

#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub port: PathBuf,
    pub baud_rate: u32,
    /// Wait between failed connection attempts.
    pub retry_backoff: Duration,
    /// Wait after opening the port before the first write.
    pub settle: Duration,
    pub read_timeout: Duration,
}

impl SerialSettings {
    pub fn new(port: impl Into<PathBuf>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            retry_backoff: Duration::from_secs(2),
            settle: Duration::from_secs(2),
            read_timeout: Duration::from_secs(1),
        }
    }
}

/// Opens the port, retrying forever with a fixed backoff.
pub fn connect_with_retry(settings: &SerialSettings, timer: &impl Timer) -> SerialPort {
    loop {
        match open_port(settings) {
            Ok(port) => {
                info!("Connected to {}", settings.port.display());
                timer.sleep(settings.settle);
                return port;
            }
            Err(e) => {
                warn!(
                    "Failed to connect to {}: {}. Retrying...",
                    settings.port.display(),
                    e
                );
                timer.sleep(settings.retry_backoff);
            }
        }
    }
}

pub fn open_port(settings: &SerialSettings) -> io::Result<SerialPort> {
    let mut port = SerialPort::open(&settings.port, settings.baud_rate)?;
    port.set_read_timeout(settings.read_timeout)?;
    Ok(port)
}

pub fn send_command(port: &mut SerialPort, command: ScanCommand) -> io::Result<()> {
    port.write_all(&[command.byte()])?;
    port.flush()
}

/// Reads one newline-terminated reply, waiting through read timeouts.
pub fn read_reply(port: &mut SerialPort) -> io::Result<String> {
    let mut line = Vec::new();
    let mut buffer = [0u8; 64];
    loop {
        match port.read(&mut buffer) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "device closed the link",
                ));
            }
            Ok(n) => {
                for &byte in &buffer[..n] {
                    if byte == b'\n' {
                        return Ok(String::from_utf8_lossy(&line).trim().to_string());
                    }
                    line.push(byte);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Serial link driven by a worker thread. Commands go out over one channel
/// and completions come back over another.
pub struct SerialScanner {
    commands: Sender<ScanCommand>,
    completions: Receiver<ScanCommand>,
    _worker: JoinHandle<()>,
}

impl SerialScanner {
    pub fn spawn(settings: SerialSettings) -> Result<Self> {
        let (command_tx, command_rx) = mpsc::channel::<ScanCommand>();
        let (done_tx, done_rx) = mpsc::channel::<ScanCommand>();
        let worker = thread::Builder::new()
            .name("scan-link".into())
            .spawn(move || run_link(settings, command_rx, done_tx))?;
        Ok(Self {
            commands: command_tx,
            completions: done_rx,
            _worker: worker,
        })
    }
}

fn run_link(settings: SerialSettings, commands: Receiver<ScanCommand>, done: Sender<ScanCommand>) {
    let timer = HighPrecisionTimer::new();
    let mut port = connect_with_retry(&settings, &timer);

    for command in commands {
        loop {
            let result = send_command(&mut port, command).and_then(|()| {
                debug!("Sent '{}' to {}", command.byte() as char, settings.port.display());
                if command.expects_reply() {
                    read_reply(&mut port).map(Some)
                } else {
                    Ok(None)
                }
            });
            match result {
                Ok(reply) => {
                    if let Some(reply) = reply {
                        debug!("Device response: {reply}");
                        if done.send(command).is_err() {
                            return;
                        }
                    }
                    break;
                }
                Err(e) => {
                    warn!("Link error on '{}': {}", command.byte() as char, e);
                    port = connect_with_retry(&settings, &timer);
                }
            }
        }
    }
    info!("Scan link closed");
}

impl ScanDevice for SerialScanner {
    fn send(&mut self, command: ScanCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| ExperimentError::Device("scan link worker has stopped".into()))
    }

    fn poll(&mut self) -> Option<ScanCommand> {
        match self.completions.try_recv() {
            Ok(command) => Some(command),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                warn!("Scan link worker disconnected");
                None
            }
        }
    }
}

impl<D: ScanDevice + ?Sized> ScanDevice for Box<D> {
    fn send(&mut self, command: ScanCommand) -> Result<()> {
        (**self).send(command)
    }

    fn poll(&mut self) -> Option<ScanCommand> {
        (**self).poll()
    }

    fn next_deadline(&self) -> Option<u64> {
        (**self).next_deadline()
    }
}
