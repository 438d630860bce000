#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;

use uartwatch_lib::config::MonitorSettings;
use uartwatch_lib::serial::{self, ChunkSource, Connector, DuplexChannel, SerialError, StreamSink, StreamSource};
use uartwatch_lib::DeviceManager;

/// Hands out in-memory links; the far end of each goes to the test
pub struct DuplexConnector {
    devices: mpsc::UnboundedSender<DuplexStream>,
}

#[async_trait]
impl Connector for DuplexConnector {
    async fn open(&self, _port_name: &str, settings: &MonitorSettings) -> serial::Result<DuplexChannel> {
        let (host, device) = tokio::io::duplex(4096);
        self.devices
            .send(device)
            .map_err(|_| SerialError::ConnectionFailed("test harness gone".to_string()))?;

        let (reader, writer) = tokio::io::split(host);
        Ok((
            Box::new(StreamSource::new(reader, settings.read_buffer_size)),
            Box::new(StreamSink::new(writer)),
        ))
    }
}

/// Always refuses to open
pub struct RefusingConnector;

#[async_trait]
impl Connector for RefusingConnector {
    async fn open(&self, port_name: &str, _settings: &MonitorSettings) -> serial::Result<DuplexChannel> {
        Err(SerialError::PortNotFound(port_name.to_string()))
    }
}

/// Read side that fails on first use
pub struct FailingSource;

#[async_trait]
impl ChunkSource for FailingSource {
    async fn read_chunk(&mut self) -> serial::Result<Option<String>> {
        Err(SerialError::ReadFailed("cable pulled".to_string()))
    }
}

pub struct FaultyConnector;

#[async_trait]
impl Connector for FaultyConnector {
    async fn open(&self, _port_name: &str, _settings: &MonitorSettings) -> serial::Result<DuplexChannel> {
        Ok((Box::new(FailingSource), Box::new(StreamSink::new(tokio::io::sink()))))
    }
}

pub struct Harness {
    pub manager: DeviceManager,
    devices: mpsc::UnboundedReceiver<DuplexStream>,
}

impl Harness {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(DuplexConnector { devices: tx });
        Self {
            manager: DeviceManager::with_connector(connector, MonitorSettings::default()),
            devices: rx,
        }
    }

    /// Connect and return the device end of the link
    pub async fn connect(&mut self) -> DuplexStream {
        self.manager.connect("/dev/ttyTEST0").await.unwrap();
        self.devices.recv().await.unwrap()
    }
}

/// Read one newline-terminated command written by the host
pub async fn read_command(device: &mut DuplexStream) -> String {
    let mut line = Vec::new();
    loop {
        let byte = device.read_u8().await.unwrap();
        if byte == b'\n' {
            return String::from_utf8(line).unwrap();
        }
        line.push(byte);
    }
}

pub async fn send_text(device: &mut DuplexStream, text: &str) {
    device.write_all(text.as_bytes()).await.unwrap();
    device.flush().await.unwrap();
}

pub fn within(elapsed: Duration, expected: Duration) -> bool {
    elapsed >= expected && elapsed < expected + Duration::from_millis(50)
}
