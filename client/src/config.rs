use shared::{OutboundFraming, MOVE_SPEED, REPORT_EPSILON};
use std::time::Duration;

/// Runtime settings for one client process
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// WebSocket endpoint of the world server
    pub server_url: String,
    /// Distance moved per frame per held direction
    pub move_speed: f32,
    /// Per-axis change below which no report is sent
    pub report_epsilon: f32,
    pub framing: OutboundFraming,
    /// Simulated latency, split evenly between send and receive
    pub fake_ping_ms: u64,
    pub reconnect_delay: Duration,
    pub width: u32,
    pub height: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8080/ws".to_string(),
            move_speed: MOVE_SPEED,
            report_epsilon: REPORT_EPSILON,
            framing: OutboundFraming::Raw,
            fake_ping_ms: 0,
            reconnect_delay: Duration::from_millis(1000),
            width: 800,
            height: 600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.move_speed, 0.1);
        assert_eq!(config.report_epsilon, 1e-4);
        assert_eq!(config.framing, OutboundFraming::Raw);
        assert!(config.server_url.starts_with("ws://"));
    }
}
