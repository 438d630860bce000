//! One task per connection. Every mutation of the device status happens
//! here, so transport data, clock ticks, operator sends and scheduled
//! queries are applied strictly one after another.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::MonitorSettings;
use crate::frame::{FrameBuffer, MessageKind};
use crate::serial::{self, ChunkSource, DeviceCommand, FrameSink, SerialError};
use crate::status::{DeviceStatus, StatusAggregator, StatusUpdate, NO_NETWORK};
use super::heartbeat::HeartbeatClock;
use super::sequencer::CommandSequencer;
use super::{ConnectionState, DeviceEvent};

pub(crate) enum SessionCommand {
    Send {
        text: String,
        responder: oneshot::Sender<serial::Result<()>>,
    },
}

enum ReadEvent {
    Chunk(String),
    EndOfStream,
    Fault(SerialError),
}

#[derive(Debug)]
enum EndReason {
    Disconnected,
    EndOfStream,
    Fault(String),
}

/// Publishing side shared between the manager and its sessions
#[derive(Clone)]
pub(crate) struct SessionChannels {
    pub status_tx: Arc<watch::Sender<Arc<DeviceStatus>>>,
    pub state_tx: Arc<watch::Sender<ConnectionState>>,
    pub events_tx: broadcast::Sender<DeviceEvent>,
    pub terminal: Arc<RwLock<String>>,
}

pub(crate) struct Session {
    session_id: Uuid,
    sink: Box<dyn FrameSink>,
    frames: FrameBuffer,
    aggregator: StatusAggregator,
    clock: HeartbeatClock,
    sequencer: CommandSequencer,
    connected: bool,
    channels: SessionChannels,
    cancel: CancellationToken,
    reader: Option<JoinHandle<()>>,
}

impl Session {
    /// Start the reader and session tasks for a freshly opened link
    pub(crate) fn spawn(
        session_id: Uuid,
        source: Box<dyn ChunkSource>,
        sink: Box<dyn FrameSink>,
        settings: &MonitorSettings,
        channels: SessionChannels,
        cancel: CancellationToken,
    ) -> (mpsc::Sender<SessionCommand>, JoinHandle<()>) {
        let (read_tx, read_rx) = mpsc::channel(settings.read_channel_capacity);
        let (cmd_tx, cmd_rx) = mpsc::channel(settings.command_capacity);

        let reader = tokio::spawn(read_loop(source, read_tx, cancel.clone()));

        let session = Session {
            session_id,
            sink,
            frames: FrameBuffer::new(),
            aggregator: StatusAggregator::new(),
            clock: HeartbeatClock::new(settings.heartbeat_period()),
            sequencer: CommandSequencer::new(settings),
            connected: true,
            channels,
            cancel,
            reader: Some(reader),
        };

        let task_handle = tokio::spawn(session.run(read_rx, cmd_rx));
        (cmd_tx, task_handle)
    }

    async fn run(
        mut self,
        mut read_rx: mpsc::Receiver<ReadEvent>,
        mut cmd_rx: mpsc::Receiver<SessionCommand>,
    ) {
        log::info!("Session {} started", self.session_id);

        let reason = match self.on_connected().await {
            Err(e) => EndReason::Fault(e.to_string()),
            Ok(()) => loop {
                let deadline = self.sequencer.next_deadline();

                tokio::select! {
                    biased;

                    _ = self.cancel.cancelled() => break EndReason::Disconnected,

                    // Ahead of reads: a heartbeat landing together with a
                    // tick must be applied after it
                    _ = self.clock.wait_tick() => {
                        self.clock.on_tick(self.aggregator.status_mut());
                        self.publish_status();
                    }

                    event = read_rx.recv() => match event {
                        Some(ReadEvent::Chunk(text)) => self.on_chunk(text).await,
                        Some(ReadEvent::EndOfStream) | None => break EndReason::EndOfStream,
                        Some(ReadEvent::Fault(e)) => break EndReason::Fault(e.to_string()),
                    },

                    command = cmd_rx.recv() => match command {
                        Some(SessionCommand::Send { text, responder }) => {
                            let result = self.send_operator(&text).await;
                            let fault = result.as_ref().err().map(|e| e.to_string());
                            let _ = responder.send(result);
                            if let Some(message) = fault {
                                break EndReason::Fault(message);
                            }
                        }
                        None => break EndReason::Disconnected,
                    },

                    _ = sleep_until_deadline(deadline) => {
                        if let Err(e) = self.fire_due().await {
                            break EndReason::Fault(e.to_string());
                        }
                    }
                }
            },
        };

        // Pending sends get their responder dropped
        drop(cmd_rx);
        drop(read_rx);
        self.teardown(reason).await;
    }

    async fn on_connected(&mut self) -> serial::Result<()> {
        self.clock.start();
        self.publish_status();
        let command = self.sequencer.on_connect(Instant::now());
        self.write(&command).await
    }

    async fn on_chunk(&mut self, text: String) {
        self.channels.terminal.write().await.push_str(&text);
        self.frames.append(&text);
        let _ = self.channels.events_tx.send(DeviceEvent::RawText { text });

        let now = Utc::now();
        for frame in self.frames.drain() {
            let kind = self.aggregator.process_frame(&frame, now);
            if kind == Some(MessageKind::Heartbeat) {
                self.clock.on_heartbeat(self.aggregator.status_mut());
            }
            let _ = self.channels.events_tx.send(DeviceEvent::Frame { kind, raw: frame.raw });
        }

        self.publish_status();
    }

    async fn send_operator(&mut self, text: &str) -> serial::Result<()> {
        let command = DeviceCommand::from_operator(text);
        self.write(&command).await?;

        if command.is_reset() {
            log::info!("Manual reset; network query rescheduled");
            self.aggregator.apply(StatusUpdate {
                ssid: Some(NO_NETWORK.to_string()),
                ..Default::default()
            });
            self.sequencer.on_manual_reset(Instant::now());
            self.publish_status();
        }
        Ok(())
    }

    async fn fire_due(&mut self) -> serial::Result<()> {
        for command in self.sequencer.take_due(Instant::now()) {
            if !self.connected {
                log::debug!("Link down, dropping scheduled {}", command.as_str());
                continue;
            }
            log::info!("Sending scheduled {}", command.as_str());
            self.write(&command).await?;
        }
        Ok(())
    }

    async fn write(&mut self, command: &DeviceCommand) -> serial::Result<()> {
        self.sink.write_frame(&command.to_wire()).await?;
        let _ = self.channels.events_tx.send(DeviceEvent::CommandSent {
            command: command.as_str().to_string(),
        });
        Ok(())
    }

    fn publish_status(&self) {
        self.channels.status_tx.send_replace(Arc::new(self.aggregator.status().clone()));
    }

    async fn teardown(mut self, reason: EndReason) {
        self.connected = false;
        self.cancel.cancel();

        let cancelled = self.sequencer.cancel_all();
        if cancelled > 0 {
            log::debug!("Cancelled {} scheduled command(s)", cancelled);
        }
        self.clock.stop(self.aggregator.status_mut());

        if let Err(e) = self.sink.close().await {
            log::warn!("Failed to close write side: {}", e);
        }
        if let Some(reader) = self.reader.take() {
            let _ = reader.await;
        }

        let stats = self.aggregator.stats();
        log::info!(
            "Session {} ended ({:?}): {} frames classified, {} discarded",
            self.session_id,
            reason,
            stats.classified,
            stats.discarded
        );

        self.aggregator.reset();
        self.frames.clear();
        self.publish_status();

        let state = match reason {
            EndReason::Disconnected => ConnectionState::Disconnected,
            EndReason::EndOfStream => {
                let _ = self.channels.events_tx.send(DeviceEvent::Notice {
                    message: "Device closed the link".to_string(),
                });
                ConnectionState::Disconnected
            }
            EndReason::Fault(message) => {
                log::error!("Transport fault: {}", message);
                let _ = self.channels.events_tx.send(DeviceEvent::Notice { message: message.clone() });
                ConnectionState::Error(message)
            }
        };
        self.channels.state_tx.send_replace(state);
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

/// Owns the read side for its whole life and releases it on every exit
async fn read_loop(
    mut source: Box<dyn ChunkSource>,
    tx: mpsc::Sender<ReadEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            result = source.read_chunk() => match result {
                Ok(Some(text)) => ReadEvent::Chunk(text),
                Ok(None) => ReadEvent::EndOfStream,
                Err(e) => {
                    log::warn!("Read failed: {}", e);
                    ReadEvent::Fault(e)
                }
            },
        };

        let last = !matches!(event, ReadEvent::Chunk(_));
        let delivered = tokio::select! {
            _ = cancel.cancelled() => false,
            sent = tx.send(event) => sent.is_ok(),
        };
        if last || !delivered {
            break;
        }
    }

    drop(source);
    log::debug!("Read side released");
}
