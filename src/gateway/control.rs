//! Inbound control messages
//!
//! Browser clients send small control messages on the control socket. Each
//! set field maps to one device command on the video session.

use crate::backend::DeviceCommand;

/// Control request from a client
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlMessage {
    /// Switch the camera light on or off
    pub light: Option<bool>,
}

impl ControlMessage {
    /// Message that only switches the light
    pub fn light(on: bool) -> Self {
        Self { light: Some(on) }
    }

    /// Device commands requested by this message
    pub fn device_commands(&self) -> Vec<DeviceCommand> {
        let mut commands = Vec::new();
        if let Some(open) = self.light {
            commands.push(DeviceCommand::LightSwitch { open });
        }
        commands
    }
}
