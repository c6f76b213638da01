//! Peer video backend
//!
//! Opens a peer session to the device, asks it to start the live feed and
//! fans out each data chunk received on the video channel. Stopping asks the
//! device to close the feed before the session is dropped.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;

use super::hex_preview;
use crate::error::BackendError;
use crate::worker::SessionBackend;

/// Logical peer channel carrying video data
pub const DEFAULT_VIDEO_CHANNEL: u8 = 1;

/// JSON command sent to the device over the peer session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    /// Start the live video feed
    StartLive {
        /// Stream encryption key
        encrypt_key: String,
        /// Account the stream is opened for
        account_id: String,
    },
    /// Stop the live video feed
    CloseLive,
    /// Turn the camera light on or off
    LightSwitch {
        /// `true` to switch the light on
        open: bool,
    },
}

impl DeviceCommand {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            DeviceCommand::StartLive { .. } => "start_live",
            DeviceCommand::CloseLive => "close_live",
            DeviceCommand::LightSwitch { .. } => "light_switch",
        }
    }
}

/// Live peer session
pub trait PeerClient: Send + 'static {
    /// Send a device command
    fn send_command(
        &mut self,
        command: &DeviceCommand,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Wait up to `timeout` for a data chunk on `channel`
    fn recv(
        &mut self,
        channel: u8,
        timeout: Duration,
    ) -> impl Future<Output = Result<Option<Bytes>, BackendError>> + Send;

    /// Close the session
    fn close(&mut self) -> impl Future<Output = Result<(), BackendError>> + Send;
}

/// Factory for peer sessions
pub trait PeerConnector: Send + 'static {
    /// Session type produced by this connector
    type Client: PeerClient;

    /// Open a new session
    fn connect(&mut self) -> impl Future<Output = Result<Self::Client, BackendError>> + Send;
}

/// Video session options
#[derive(Debug, Clone)]
pub struct VideoConfig {
    /// Peer channel carrying video data
    pub channel: u8,

    /// Encryption key sent with the start command
    pub encrypt_key: String,

    /// Account id sent with the start command
    pub account_id: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            channel: DEFAULT_VIDEO_CHANNEL,
            encrypt_key: "x".to_string(),
            account_id: "y".to_string(),
        }
    }
}

impl VideoConfig {
    /// Set the video channel
    pub fn channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    /// Set the stream credentials sent with the start command
    pub fn credentials(mut self, encrypt_key: impl Into<String>, account_id: impl Into<String>) -> Self {
        self.encrypt_key = encrypt_key.into();
        self.account_id = account_id.into();
        self
    }

    fn start_command(&self) -> DeviceCommand {
        DeviceCommand::StartLive {
            encrypt_key: self.encrypt_key.clone(),
            account_id: self.account_id.clone(),
        }
    }
}

/// Session backend fanning out raw video chunks
pub struct VideoBackend<C: PeerConnector> {
    connector: C,
    config: VideoConfig,
    client: Option<C::Client>,
}

impl<C: PeerConnector> VideoBackend<C> {
    /// Create a backend; nothing is opened until the worker starts it
    pub fn new(connector: C, config: VideoConfig) -> Self {
        Self {
            connector,
            config,
            client: None,
        }
    }

    /// Get the session options
    pub fn config(&self) -> &VideoConfig {
        &self.config
    }

    /// Check if a peer session is open
    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }
}

impl<C: PeerConnector> SessionBackend for VideoBackend<C> {
    type Item = Bytes;
    type Command = DeviceCommand;

    async fn start(&mut self) -> Result<(), BackendError> {
        if let Some(mut stale) = self.client.take() {
            if let Err(e) = stale.close().await {
                tracing::debug!(error = %e, "Discarding stale peer session");
            }
        }

        let mut client = self.connector.connect().await?;

        let start = self.config.start_command();
        if let Err(e) = client.send_command(&start).await {
            if let Err(close_err) = client.close().await {
                tracing::debug!(error = %close_err, "Close after failed start");
            }
            return Err(e);
        }

        self.client = Some(client);
        tracing::info!(channel = self.config.channel, "Live video started");
        Ok(())
    }

    async fn poll(&mut self, timeout: Duration) -> Result<Option<Bytes>, BackendError> {
        let client = self.client.as_mut().ok_or(BackendError::NotConnected)?;

        let Some(data) = client.recv(self.config.channel, timeout).await? else {
            return Ok(None);
        };

        tracing::trace!(len = data.len(), data = %hex_preview(&data), "Video data packet");
        Ok(Some(data))
    }

    async fn stop(&mut self) -> Result<(), BackendError> {
        let Some(mut client) = self.client.take() else {
            return Ok(());
        };

        if let Err(e) = client.send_command(&DeviceCommand::CloseLive).await {
            tracing::warn!(error = %e, "Device did not acknowledge close");
        }

        if let Err(e) = client.close().await {
            self.client = Some(client);
            return Err(e);
        }

        tracing::info!("Live video stopped");
        Ok(())
    }

    async fn control(&mut self, command: DeviceCommand) -> Result<(), BackendError> {
        let client = self.client.as_mut().ok_or(BackendError::NotConnected)?;
        tracing::debug!(command = command.name(), "Sending device command");
        client.send_command(&command).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    #[derive(Default)]
    struct Device {
        log: Mutex<Vec<String>>,
        chunks: Mutex<VecDeque<(u8, Bytes)>>,
        reject_start: AtomicBool,
        fail_close: AtomicBool,
    }

    impl Device {
        fn log(&self) -> Vec<String> {
            self.log.lock().clone()
        }
    }

    struct FakeConnector(Arc<Device>);
    struct FakePeer(Arc<Device>);

    impl PeerConnector for FakeConnector {
        type Client = FakePeer;

        async fn connect(&mut self) -> Result<FakePeer, BackendError> {
            self.0.log.lock().push("connect".into());
            Ok(FakePeer(Arc::clone(&self.0)))
        }
    }

    impl PeerClient for FakePeer {
        async fn send_command(&mut self, command: &DeviceCommand) -> Result<(), BackendError> {
            self.0.log.lock().push(command.name().into());
            if matches!(command, DeviceCommand::StartLive { .. })
                && self.0.reject_start.load(Ordering::SeqCst)
            {
                return Err(BackendError::Command("start rejected".into()));
            }
            Ok(())
        }

        async fn recv(&mut self, channel: u8, _timeout: Duration) -> Result<Option<Bytes>, BackendError> {
            let mut chunks = self.0.chunks.lock();
            match chunks.front() {
                Some((chan, _)) if *chan == channel => Ok(chunks.pop_front().map(|(_, data)| data)),
                _ => Ok(None),
            }
        }

        async fn close(&mut self) -> Result<(), BackendError> {
            self.0.log.lock().push("close".into());
            if self.0.fail_close.swap(false, Ordering::SeqCst) {
                return Err(BackendError::Other("close timed out".into()));
            }
            Ok(())
        }
    }

    fn backend(config: VideoConfig) -> (VideoBackend<FakeConnector>, Arc<Device>) {
        let device = Arc::new(Device::default());
        (VideoBackend::new(FakeConnector(Arc::clone(&device)), config), device)
    }

    const TIMEOUT: Duration = Duration::from_millis(10);

    #[test]
    fn test_default_config() {
        let config = VideoConfig::default();

        assert_eq!(config.channel, DEFAULT_VIDEO_CHANNEL);
        assert_eq!(
            config.start_command(),
            DeviceCommand::StartLive {
                encrypt_key: "x".into(),
                account_id: "y".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_start_sends_start_live() {
        let (mut backend, device) = backend(VideoConfig::default());

        assert_ok!(backend.start().await);

        assert!(backend.is_connected());
        assert_eq!(device.log(), vec!["connect", "start_live"]);
    }

    #[tokio::test]
    async fn test_rejected_start_closes_session() {
        let (mut backend, device) = backend(VideoConfig::default());
        device.reject_start.store(true, Ordering::SeqCst);

        let err = assert_err!(backend.start().await);

        assert!(matches!(err, BackendError::Command(_)));
        assert!(!backend.is_connected());
        assert_eq!(device.log(), vec!["connect", "start_live", "close"]);
    }

    #[tokio::test]
    async fn test_stop_sends_close_live() {
        let (mut backend, device) = backend(VideoConfig::default());

        assert_ok!(backend.start().await);
        assert_ok!(backend.stop().await);

        assert!(!backend.is_connected());
        assert_eq!(
            device.log(),
            vec!["connect", "start_live", "close_live", "close"]
        );

        // nothing left to release
        assert_ok!(backend.stop().await);
        assert_eq!(device.log().len(), 4);
    }

    #[tokio::test]
    async fn test_failed_close_is_retried() {
        let (mut backend, device) = backend(VideoConfig::default());
        device.fail_close.store(true, Ordering::SeqCst);

        assert_ok!(backend.start().await);
        assert_err!(backend.stop().await);
        assert!(backend.is_connected());

        assert_ok!(backend.stop().await);
        assert!(!backend.is_connected());
    }

    #[tokio::test]
    async fn test_poll_reads_configured_channel() {
        let (mut backend, device) = backend(VideoConfig::default().channel(2));
        device
            .chunks
            .lock()
            .push_back((2, Bytes::from_static(b"\x00\x00\x00\x01frame")));

        assert_ok!(backend.start().await);

        let chunk = backend.poll(TIMEOUT).await.unwrap();
        assert_eq!(chunk, Some(Bytes::from_static(b"\x00\x00\x00\x01frame")));
        assert_eq!(backend.poll(TIMEOUT).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_control_requires_session() {
        let (mut backend, device) = backend(VideoConfig::default());
        let light = DeviceCommand::LightSwitch { open: true };

        let err = assert_err!(backend.control(light.clone()).await);
        assert!(matches!(err, BackendError::NotConnected));

        assert_ok!(backend.start().await);
        assert_ok!(backend.control(light).await);
        assert_eq!(device.log().last().map(String::as_str), Some("light_switch"));
    }
}
