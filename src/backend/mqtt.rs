//! MQTT broker backend
//!
//! One fetch cycle on the broker may return several messages, each carrying
//! zero or more decoded bodies. Every body is one fanned-out item; bodies
//! beyond the first are kept in order and handed out by the next polls
//! before the broker is asked again.

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use bytes::Bytes;

use super::hex_preview;
use crate::error::BackendError;
use crate::worker::SessionBackend;

/// Decoded broker message
#[derive(Debug, Clone)]
pub struct MqttMessage<B> {
    /// Topic the message arrived on
    pub topic: String,
    /// Raw payload as received
    pub payload: Bytes,
    /// Decoded bodies, in payload order
    pub bodies: Vec<B>,
}

/// Command published to the device through the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MqttCommand {
    /// Ask the device to publish its stored file list
    FileListRequest {
        /// Storage to list (device-defined, 1 = onboard)
        source: u32,
    },
    /// Any other command, already typed by the caller
    Raw {
        /// Device message type
        command_type: u32,
        /// Command argument
        value: i64,
    },
}

/// Live broker session
pub trait MqttClient: Send + 'static {
    /// Decoded body type fanned out to consumers
    type Body: Clone + Send + 'static;

    /// Wait up to `timeout` for the next batch of messages
    fn fetch(
        &mut self,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<MqttMessage<Self::Body>>, BackendError>> + Send;

    /// Publish a command to the device
    fn command(
        &mut self,
        command: &MqttCommand,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Close the session
    fn disconnect(&mut self) -> impl Future<Output = Result<(), BackendError>> + Send;
}

/// Factory for authenticated broker sessions
pub trait MqttConnector: Send + 'static {
    /// Session type produced by this connector
    type Client: MqttClient;

    /// Open a new session
    fn connect(&mut self) -> impl Future<Output = Result<Self::Client, BackendError>> + Send;
}

/// Session backend fanning out decoded broker bodies
pub struct MqttBackend<C: MqttConnector> {
    connector: C,
    client: Option<C::Client>,
    pending: VecDeque<<C::Client as MqttClient>::Body>,
}

impl<C: MqttConnector> MqttBackend<C> {
    /// Create a backend; nothing is opened until the worker starts it
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            client: None,
            pending: VecDeque::new(),
        }
    }

    /// Check if a broker session is open
    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }
}

impl<C: MqttConnector> SessionBackend for MqttBackend<C> {
    type Item = <C::Client as MqttClient>::Body;
    type Command = MqttCommand;

    async fn start(&mut self) -> Result<(), BackendError> {
        // A retry after a half-open start replaces the old session.
        if let Some(mut stale) = self.client.take() {
            if let Err(e) = stale.disconnect().await {
                tracing::debug!(error = %e, "Discarding stale MQTT session");
            }
        }
        self.pending.clear();

        let client = self.connector.connect().await?;
        self.client = Some(client);
        tracing::info!("MQTT session open");
        Ok(())
    }

    async fn poll(&mut self, timeout: Duration) -> Result<Option<Self::Item>, BackendError> {
        if let Some(body) = self.pending.pop_front() {
            return Ok(Some(body));
        }

        let client = self.client.as_mut().ok_or(BackendError::NotConnected)?;
        let messages = client.fetch(timeout).await?;

        for msg in messages {
            tracing::info!(topic = %msg.topic, bodies = msg.bodies.len(), "MQTT message");
            tracing::debug!(payload = %hex_preview(&msg.payload), "MQTT payload");
            self.pending.extend(msg.bodies);
        }

        Ok(self.pending.pop_front())
    }

    async fn stop(&mut self) -> Result<(), BackendError> {
        self.pending.clear();

        let Some(mut client) = self.client.take() else {
            return Ok(());
        };
        if let Err(e) = client.disconnect().await {
            self.client = Some(client);
            return Err(e);
        }

        tracing::info!("MQTT session closed");
        Ok(())
    }

    async fn control(&mut self, command: MqttCommand) -> Result<(), BackendError> {
        let client = self.client.as_mut().ok_or(BackendError::NotConnected)?;
        tracing::debug!(?command, "Sending MQTT command");
        client.command(&command).await
    }
}
