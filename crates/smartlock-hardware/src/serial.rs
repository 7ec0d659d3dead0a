//! `serialport`-backed serial link.

use crate::{
    error::{HardwareError, Result},
    traits::{CommandSink, SerialReader},
};
use serialport::SerialPort;
use smartlock_protocol::LockCommand;
use std::{
    io::{ErrorKind, Read, Write},
    sync::Mutex,
    time::Duration,
};
use tracing::{debug, info};

/// Open the serial device and split it into reader and writer halves.
///
/// # Errors
/// Returns `HardwareError::InitializationFailed` if the port cannot be
/// opened or cloned.
pub fn open(
    path: &str,
    baud_rate: u32,
    read_timeout: Duration,
) -> Result<(SerialPortReader, SerialPortWriter)> {
    let port = serialport::new(path, baud_rate)
        .timeout(read_timeout)
        .open()
        .map_err(|e| HardwareError::initialization_failed(format!("{path}: {e}")))?;
    let writer = port
        .try_clone()
        .map_err(|e| HardwareError::initialization_failed(format!("{path}: clone failed: {e}")))?;

    info!(port = %path, baud_rate, "Serial link opened");

    Ok((
        SerialPortReader {
            port,
            name: path.to_string(),
        },
        SerialPortWriter {
            port: Mutex::new(writer),
            name: path.to_string(),
        },
    ))
}

pub struct SerialPortReader {
    port: Box<dyn SerialPort>,
    name: String,
}

impl SerialReader for SerialPortReader {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(0),
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                Err(HardwareError::disconnected(self.name.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for SerialPortReader {
    fn drop(&mut self) {
        debug!(port = %self.name, "Serial reader released");
    }
}

pub struct SerialPortWriter {
    port: Mutex<Box<dyn SerialPort>>,
    name: String,
}

impl CommandSink for SerialPortWriter {
    fn send(&self, command: LockCommand) -> Result<()> {
        let mut port = self
            .port
            .lock()
            .map_err(|_| HardwareError::communication(format!("{}: writer lock poisoned", self.name)))?;
        port.write_all(command.as_bytes())?;
        port.flush()?;
        debug!(port = %self.name, command = %command, "Serial command written");
        Ok(())
    }
}
