use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::MonitorSettings;
use crate::serial::{Connector, SerialConnector, SerialDeviceInfo, SerialInterface};
use crate::status::DeviceStatus;
use super::session::{Session, SessionChannels, SessionCommand};
use super::{ConnectionInfo, ConnectionState, DeviceError, DeviceEvent, Result};

struct ActiveSession {
    info: ConnectionInfo,
    cmd_tx: mpsc::Sender<SessionCommand>,
    cancel: CancellationToken,
    task_handle: JoinHandle<()>,
}

/// Central device management system
/// Owns the single device connection and publishes its status
pub struct DeviceManager {
    connector: Arc<dyn Connector>,
    settings: MonitorSettings,
    active: Mutex<Option<ActiveSession>>,
    channels: SessionChannels,
}

impl DeviceManager {
    pub fn new(settings: MonitorSettings) -> Self {
        Self::with_connector(Arc::new(SerialConnector), settings)
    }

    /// Use a custom transport, e.g. an in-memory link
    pub fn with_connector(connector: Arc<dyn Connector>, settings: MonitorSettings) -> Self {
        let (status_tx, _) = watch::channel(Arc::new(DeviceStatus::default()));
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (events_tx, _) = broadcast::channel(settings.event_capacity);

        Self {
            connector,
            settings,
            active: Mutex::new(None),
            channels: SessionChannels {
                status_tx: Arc::new(status_tx),
                state_tx: Arc::new(state_tx),
                events_tx,
                terminal: Arc::new(RwLock::new(String::new())),
            },
        }
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// List serial ports the device could be on
    pub fn discover_devices(&self) -> Result<Vec<SerialDeviceInfo>> {
        SerialInterface::discover_devices(&self.settings).map_err(DeviceError::SerialError)
    }

    /// Open the link and start a session. Fails if a live session exists.
    pub async fn connect(&self, port_name: &str) -> Result<ConnectionInfo> {
        let mut active = self.active.lock().await;

        if let Some(session) = active.as_ref() {
            if !session.task_handle.is_finished() {
                return Err(DeviceError::AlreadyConnected);
            }
            log::debug!("Clearing ended session {}", session.info.session_id);
        }
        *active = None;

        self.channels.state_tx.send_replace(ConnectionState::Connecting);
        log::info!("Attempting to connect to port: {}", port_name);

        let (source, sink) = match self.connector.open(port_name, &self.settings).await {
            Ok(channel) => channel,
            Err(e) => {
                let error_msg = format!("Connection failed: {}", e);
                log::error!("{}", error_msg);
                self.channels.state_tx.send_replace(ConnectionState::Error(error_msg));
                return Err(DeviceError::SerialError(e));
            }
        };

        self.channels.terminal.write().await.clear();
        self.channels.status_tx.send_replace(Arc::new(DeviceStatus::default()));
        self.channels.state_tx.send_replace(ConnectionState::Connected);

        let info = ConnectionInfo {
            session_id: Uuid::new_v4(),
            port_name: port_name.to_string(),
            connected_at: Utc::now(),
        };
        let cancel = CancellationToken::new();
        let (cmd_tx, task_handle) = Session::spawn(
            info.session_id,
            source,
            sink,
            &self.settings,
            self.channels.clone(),
            cancel.clone(),
        );

        *active = Some(ActiveSession {
            info: info.clone(),
            cmd_tx,
            cancel,
            task_handle,
        });

        log::info!("Successfully connected to device: {}", port_name);
        Ok(info)
    }

    /// Stop the session, release the link and zero the status
    pub async fn disconnect(&self) -> Result<()> {
        let session = self.active.lock().await.take().ok_or(DeviceError::NotConnected)?;
        session.cancel.cancel();

        let mut task_handle = session.task_handle;
        if timeout(self.settings.shutdown_timeout(), &mut task_handle).await.is_err() {
            log::warn!(
                "Session {} did not stop within {:?}, aborting",
                session.info.session_id,
                self.settings.shutdown_timeout()
            );
            task_handle.abort();
        }

        self.channels.status_tx.send_replace(Arc::new(DeviceStatus::default()));
        self.channels.state_tx.send_replace(ConnectionState::Disconnected);

        log::info!("Disconnected from {}", session.info.port_name);
        Ok(())
    }

    /// Send operator text, newline-terminated. `*RST#` also restarts
    /// the network query.
    pub async fn send(&self, text: &str) -> Result<()> {
        let cmd_tx = {
            let active = self.active.lock().await;
            active
                .as_ref()
                .filter(|session| !session.task_handle.is_finished())
                .map(|session| session.cmd_tx.clone())
                .ok_or(DeviceError::NotConnected)?
        };

        let (responder, response) = oneshot::channel();
        cmd_tx
            .send(SessionCommand::Send { text: text.to_string(), responder })
            .await
            .map_err(|_| DeviceError::SessionClosed)?;

        response
            .await
            .map_err(|_| DeviceError::SessionClosed)?
            .map_err(DeviceError::SerialError)
    }

    pub async fn is_connected(&self) -> bool {
        let active = self.active.lock().await;
        active.as_ref().map_or(false, |session| !session.task_handle.is_finished())
    }

    pub async fn connection_info(&self) -> Option<ConnectionInfo> {
        let active = self.active.lock().await;
        active.as_ref().map(|session| session.info.clone())
    }

    /// Latest status snapshot
    pub fn status(&self) -> Arc<DeviceStatus> {
        self.channels.status_tx.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<Arc<DeviceStatus>> {
        self.channels.status_tx.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.channels.state_tx.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.channels.state_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<DeviceEvent> {
        self.channels.events_tx.subscribe()
    }

    /// Everything received on the current (or last) connection, verbatim
    pub async fn terminal_text(&self) -> String {
        self.channels.terminal.read().await.clone()
    }
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new(MonitorSettings::default())
    }
}
