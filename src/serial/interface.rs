use std::time::Duration;

use async_trait::async_trait;
use serialport::SerialPortType;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_serial::SerialPortBuilderExt;

use crate::config::MonitorSettings;
use super::{Result, SerialDeviceInfo, SerialError};

const PORT_TIMEOUT_MS: u64 = 1000;

/// Read side of a device link.
#[async_trait]
pub trait ChunkSource: Send {
    /// Suspend until decoded text arrives. `Ok(None)` marks end of stream.
    async fn read_chunk(&mut self) -> Result<Option<String>>;
}

/// Write side of a device link.
#[async_trait]
pub trait FrameSink: Send {
    async fn write_frame(&mut self, text: &str) -> Result<()>;

    /// Release the write side. Calling it again is a no-op.
    async fn close(&mut self) -> Result<()>;
}

pub type DuplexChannel = (Box<dyn ChunkSource>, Box<dyn FrameSink>);

/// Opens a duplex channel to a named port.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, port_name: &str, settings: &MonitorSettings) -> Result<DuplexChannel>;
}

/// Adapts any async byte stream into a text chunk source.
///
/// UTF-8 sequences split across reads are held back until the remaining
/// bytes arrive; bytes that can never form valid UTF-8 decode to U+FFFD.
pub struct StreamSource<R> {
    inner: R,
    buffer: Vec<u8>,
    carry: Vec<u8>,
}

impl<R> StreamSource<R> {
    pub fn new(inner: R, read_buffer_size: usize) -> Self {
        Self {
            inner,
            buffer: vec![0u8; read_buffer_size.max(1)],
            carry: Vec::new(),
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> ChunkSource for StreamSource<R> {
    async fn read_chunk(&mut self) -> Result<Option<String>> {
        loop {
            let bytes_read = self.inner.read(&mut self.buffer).await
                .map_err(|e| SerialError::ReadFailed(e.to_string()))?;

            if bytes_read == 0 {
                if self.carry.is_empty() {
                    return Ok(None);
                }
                // Stream ended mid-sequence; flush what we have
                let tail = String::from_utf8_lossy(&self.carry).into_owned();
                self.carry.clear();
                return Ok(Some(tail));
            }

            self.carry.extend_from_slice(&self.buffer[..bytes_read]);
            let text = take_decoded(&mut self.carry);
            if !text.is_empty() {
                return Ok(Some(text));
            }
        }
    }
}

/// Decode the longest valid prefix of `pending`, leaving an incomplete
/// trailing sequence in place.
fn take_decoded(pending: &mut Vec<u8>) -> String {
    let mut out = String::new();
    loop {
        let err = match std::str::from_utf8(pending) {
            Ok(s) => {
                out.push_str(s);
                pending.clear();
                return out;
            }
            Err(e) => e,
        };

        let valid = err.valid_up_to();
        out.push_str(&String::from_utf8_lossy(&pending[..valid]));
        match err.error_len() {
            Some(len) => {
                out.push(char::REPLACEMENT_CHARACTER);
                pending.drain(..valid + len);
            }
            None => {
                pending.drain(..valid);
                return out;
            }
        }
    }
}

/// Adapts any async byte sink into a frame sink.
pub struct StreamSink<W> {
    inner: Option<W>,
}

impl<W> StreamSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner: Some(inner) }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> FrameSink for StreamSink<W> {
    async fn write_frame(&mut self, text: &str) -> Result<()> {
        let writer = self.inner.as_mut().ok_or(SerialError::NotConnected)?;

        writer.write_all(text.as_bytes()).await
            .map_err(|e| SerialError::WriteFailed(e.to_string()))?;
        writer.flush().await
            .map_err(|e| SerialError::WriteFailed(e.to_string()))?;

        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.inner.take() {
            if let Err(e) = writer.shutdown().await {
                log::debug!("Ignoring shutdown error on close: {}", e);
            }
        }
        Ok(())
    }
}

/// Opens real serial ports through tokio-serial.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialConnector;

#[async_trait]
impl Connector for SerialConnector {
    async fn open(&self, port_name: &str, settings: &MonitorSettings) -> Result<DuplexChannel> {
        let stream = tokio_serial::new(port_name, settings.baud_rate)
            .timeout(Duration::from_millis(PORT_TIMEOUT_MS))
            .open_native_async()
            .map_err(|e| SerialError::ConnectionFailed(format!("{}: {}", port_name, e)))?;

        log::info!("Opened {} at {} baud", port_name, settings.baud_rate);

        let (reader, writer) = tokio::io::split(stream);
        Ok((
            Box::new(StreamSource::new(reader, settings.read_buffer_size)),
            Box::new(StreamSink::new(writer)),
        ))
    }
}

/// Serial port enumeration.
pub struct SerialInterface;

impl SerialInterface {
    /// List available ports, honouring the optional USB VID/PID filter
    pub fn discover_devices(settings: &MonitorSettings) -> Result<Vec<SerialDeviceInfo>> {
        let ports = serialport::available_ports()?;
        let mut devices = Vec::new();

        for port in ports {
            let device = match port.port_type {
                SerialPortType::UsbPort(usb_info) => SerialDeviceInfo {
                    port_name: port.port_name,
                    vid: Some(usb_info.vid),
                    pid: Some(usb_info.pid),
                    serial_number: usb_info.serial_number,
                    manufacturer: usb_info.manufacturer,
                    product: usb_info.product,
                },
                _ => SerialDeviceInfo {
                    port_name: port.port_name,
                    vid: None,
                    pid: None,
                    serial_number: None,
                    manufacturer: None,
                    product: None,
                },
            };

            if settings.matches_usb(device.vid, device.pid) {
                devices.push(device);
            }
        }

        Ok(devices)
    }

    /// Look up a single port by name
    pub fn find_device(port_name: &str, settings: &MonitorSettings) -> Result<SerialDeviceInfo> {
        Self::discover_devices(settings)?
            .into_iter()
            .find(|d| d.port_name == port_name)
            .ok_or_else(|| SerialError::PortNotFound(port_name.to_string()))
    }
}
