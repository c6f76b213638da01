//! Gateway context
//!
//! Holds the two long-lived workers a device gateway needs: one for the
//! broker connection and one for the video session. Request handlers tap
//! the worker they stream from and send control messages through the
//! gateway; nothing is global, the gateway is built at startup and shut
//! down explicitly.
//!
//! # Example
//! ```no_run
//! # use devgate::backend::{MqttConnector, PeerConnector};
//! use devgate::gateway::{shutdown_signal, Gateway, GatewayConfig};
//!
//! # async fn example<M: MqttConnector, V: PeerConnector>(mqtt: M, video: V) -> devgate::Result<()> {
//! let gateway = Gateway::start(GatewayConfig::default(), mqtt, video);
//!
//! let mut feed = gateway.video().tap()?;
//! tokio::spawn(async move {
//!     while let Some(chunk) = feed.recv().await {
//!         // forward chunk to the client
//! #       let _ = chunk;
//!     }
//! });
//!
//! gateway
//!     .run_until(async {
//!         let _ = shutdown_signal().await;
//!     })
//!     .await
//! # }
//! ```

pub mod config;
pub mod control;
pub mod signal;

pub use config::GatewayConfig;
pub use control::ControlMessage;
pub use signal::shutdown_signal;

use std::future::Future;

use crate::backend::{DeviceCommand, MqttBackend, MqttCommand, MqttConnector, PeerConnector, VideoBackend};
use crate::error::Result;
use crate::worker::Supervisor;

/// Broker worker name
pub const MQTT_WORKER: &str = "mqtt";

/// Video worker name
pub const VIDEO_WORKER: &str = "video";

/// Running gateway with its broker and video workers
pub struct Gateway<M: MqttConnector, V: PeerConnector> {
    mqtt: Supervisor<MqttBackend<M>>,
    video: Supervisor<VideoBackend<V>>,
}

impl<M: MqttConnector, V: PeerConnector> Gateway<M, V> {
    /// Spawn both workers on the current tokio runtime
    ///
    /// Neither session is opened until a consumer taps it.
    pub fn start(config: GatewayConfig, mqtt: M, video: V) -> Self {
        let mqtt = Supervisor::spawn(MQTT_WORKER, MqttBackend::new(mqtt), config.mqtt);
        let video = Supervisor::spawn(
            VIDEO_WORKER,
            VideoBackend::new(video, config.video_session),
            config.video,
        );

        tracing::info!("Gateway started");
        Self { mqtt, video }
    }

    /// Broker worker
    pub fn mqtt(&self) -> &Supervisor<MqttBackend<M>> {
        &self.mqtt
    }

    /// Video worker
    pub fn video(&self) -> &Supervisor<VideoBackend<V>> {
        &self.video
    }

    /// Forward a client control message to the video session
    ///
    /// Returns how many device commands were accepted. Commands are dropped
    /// while the video session is not running.
    pub fn handle_control(&self, msg: &ControlMessage) -> usize {
        msg.device_commands()
            .into_iter()
            .map(|cmd| self.send_device_command(cmd))
            .filter(|&accepted| accepted)
            .count()
    }

    /// Switch the camera light
    pub fn set_light(&self, on: bool) -> bool {
        self.send_device_command(DeviceCommand::LightSwitch { open: on })
    }

    /// Ask the device to publish its file list on the broker
    ///
    /// The reply arrives as a regular broker item, so callers tap the MQTT
    /// worker to see it.
    pub fn request_file_list(&self, source: u32) -> bool {
        let accepted = self.mqtt.send_command(MqttCommand::FileListRequest { source });
        if !accepted {
            tracing::debug!(source, "File list request dropped, broker session not running");
        }
        accepted
    }

    fn send_device_command(&self, command: DeviceCommand) -> bool {
        let name = command.name();
        let accepted = self.video.send_command(command);
        if !accepted {
            tracing::debug!(command = name, "Device command dropped, video session not running");
        }
        accepted
    }

    /// Stop both workers and wait for them to exit
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Gateway shutting down");
        let (mqtt, video) = tokio::join!(self.mqtt.shutdown(), self.video.shutdown());
        mqtt.and(video)
    }

    /// Run until `shutdown` completes, then stop both workers
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        shutdown.await;
        tracing::info!("Shutdown signal received");
        self.shutdown().await
    }
}
