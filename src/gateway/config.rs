//! Gateway configuration

use std::time::Duration;

use crate::backend::VideoConfig;
use crate::worker::WorkerConfig;

/// Configuration for both gateway workers
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    /// Broker worker timing
    pub mqtt: WorkerConfig,

    /// Video worker timing
    pub video: WorkerConfig,

    /// Video session options
    pub video_session: VideoConfig,
}

impl GatewayConfig {
    /// Set the broker worker timing
    pub fn mqtt(mut self, config: WorkerConfig) -> Self {
        self.mqtt = config;
        self
    }

    /// Set the video worker timing
    pub fn video(mut self, config: WorkerConfig) -> Self {
        self.video = config;
        self
    }

    /// Set the video session options
    pub fn video_session(mut self, config: VideoConfig) -> Self {
        self.video_session = config;
        self
    }

    /// Use the same retry holdoff for both workers
    pub fn holdoff(mut self, holdoff: Duration) -> Self {
        self.mqtt = self.mqtt.holdoff(holdoff);
        self.video = self.video.holdoff(holdoff);
        self
    }
}
