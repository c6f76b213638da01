//! Gateway against a simulated device
//!
//! Run with: cargo run --example simulated_gateway [SECONDS]
//!
//! Starts both workers against an in-process fake device, then lets a few
//! clients come and go so the workers start, fan out and stop on demand.
//! The first video connect is refused to show the retry holdoff.
//! Runs for SECONDS (default 10) or until Ctrl-C.
//!
//! Set `RUST_LOG=devgate=debug` for per-target detail.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use devgate::backend::{
    DeviceCommand, MqttClient, MqttCommand, MqttConnector, MqttMessage, PeerClient, PeerConnector,
};
use devgate::error::BackendError;
use devgate::gateway::shutdown_signal;
use devgate::{ControlMessage, Gateway, GatewayConfig};

/// Broker that reports a status message every poll
struct SimBroker;

struct SimBrokerSession {
    seq: u32,
}

impl MqttConnector for SimBroker {
    type Client = SimBrokerSession;

    async fn connect(&mut self) -> Result<SimBrokerSession, BackendError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(SimBrokerSession { seq: 0 })
    }
}

impl MqttClient for SimBrokerSession {
    type Body = String;

    async fn fetch(&mut self, timeout: Duration) -> Result<Vec<MqttMessage<String>>, BackendError> {
        tokio::time::sleep(timeout).await;
        self.seq += 1;

        let body = format!("{{\"commandType\":1000,\"progress\":{}}}", self.seq);
        Ok(vec![MqttMessage {
            topic: "/phone/maker/sim/notice".to_string(),
            payload: Bytes::from(body.clone()),
            bodies: vec![body],
        }])
    }

    async fn command(&mut self, command: &MqttCommand) -> Result<(), BackendError> {
        println!("[device] broker command: {:?}", command);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Camera whose first connect is refused
struct SimCamera {
    attempts: Arc<AtomicU32>,
}

struct SimCameraSession {
    frame: u32,
}

impl PeerConnector for SimCamera {
    type Client = SimCameraSession;

    async fn connect(&mut self) -> Result<SimCameraSession, BackendError> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(BackendError::Connect("device asleep".to_string()));
        }
        Ok(SimCameraSession { frame: 0 })
    }
}

impl PeerClient for SimCameraSession {
    async fn send_command(&mut self, command: &DeviceCommand) -> Result<(), BackendError> {
        println!("[device] video command: {:?}", command);
        Ok(())
    }

    async fn recv(&mut self, _channel: u8, timeout: Duration) -> Result<Option<Bytes>, BackendError> {
        // ~25 fps
        tokio::time::sleep(timeout.min(Duration::from_millis(40))).await;
        self.frame += 1;
        Ok(Some(Bytes::from(self.frame.to_be_bytes().to_vec())))
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let seconds: u64 = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 10,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("devgate=info".parse()?),
        )
        .init();

    let camera = SimCamera {
        attempts: Arc::new(AtomicU32::new(0)),
    };
    let gateway = Arc::new(Gateway::start(GatewayConfig::default(), SimBroker, camera));

    // Two video viewers with overlapping lifetimes
    for (viewer, delay, watch) in [(1u32, 0u64, 4u64), (2, 2, 4)] {
        let gateway = Arc::clone(&gateway);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(delay)).await;
            let Ok(mut tap) = gateway.video().tap() else {
                return;
            };

            let mut bytes = 0;
            let deadline = tokio::time::sleep(Duration::from_secs(watch));
            tokio::pin!(deadline);
            loop {
                tokio::select! {
                    chunk = tap.recv() => match chunk {
                        Some(chunk) => bytes += chunk.len(),
                        None => break,
                    },
                    _ = &mut deadline => break,
                }
            }
            println!("[viewer {}] left after {} bytes", viewer, bytes);
        });
    }

    // Status listener that also asks for the file list once connected
    {
        let gateway = Arc::clone(&gateway);
        tokio::spawn(async move {
            let Ok(mut tap) = gateway.mqtt().tap() else {
                return;
            };
            let mut asked = false;
            for _ in 0..5 {
                let Some(body) = tap.recv().await else {
                    break;
                };
                println!("[status] {}", body);
                if !asked {
                    asked = gateway.request_file_list(1);
                }
            }
        });
    }

    // Light toggles; dropped whenever no viewer keeps the session up
    {
        let gateway = Arc::clone(&gateway);
        tokio::spawn(async move {
            let mut on = true;
            loop {
                tokio::time::sleep(Duration::from_millis(1500)).await;
                let sent = gateway.handle_control(&ControlMessage::light(on));
                println!("[control] light {} -> {} command(s) sent", on, sent);
                on = !on;
            }
        });
    }

    gateway
        .run_until(async {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
                _ = shutdown_signal() => println!("\nShutting down..."),
            }
        })
        .await?;

    println!("mqtt:  {:?}", gateway.mqtt().stats());
    println!("video: {:?}", gateway.video().stats());
    Ok(())
}
