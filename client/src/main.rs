use clap::Parser;
use client::config::ClientConfig;
use client::input::InputManager;
use client::network::{Connection, TransportEvent};
use client::rendering::{HudConfig, Renderer};
use client::session::{SyncEvent, SyncSession};
use log::{error, info, warn};
use macroquad::window::{next_frame, Conf};
use shared::OutboundFraming;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket URL of the world server
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:8080/ws")]
    server: String,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Distance moved per frame per held direction
    #[arg(long, default_value = "0.1")]
    move_speed: f32,

    /// Per-axis change below which no position report is sent
    #[arg(long, default_value = "0.0001")]
    epsilon: f32,

    /// Wrap reports as {"msg": ...} form submissions
    #[arg(long)]
    envelope: bool,

    /// Delay before reconnecting after the connection drops, in milliseconds
    #[arg(long, default_value = "1000")]
    reconnect_delay: u64,

    /// Window width
    #[arg(short = 'w', long, default_value = "800")]
    width: u32,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "600")]
    height: u32,
}

impl Args {
    fn into_config(self) -> ClientConfig {
        ClientConfig {
            server_url: self.server,
            move_speed: self.move_speed,
            report_epsilon: self.epsilon,
            framing: if self.envelope {
                OutboundFraming::FormEnvelope
            } else {
                OutboundFraming::Raw
            },
            fake_ping_ms: self.fake_ping,
            reconnect_delay: Duration::from_millis(self.reconnect_delay),
            width: self.width,
            height: self.height,
        }
    }
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "Cube World".to_string(),
        window_width: args.width as i32,
        window_height: args.height as i32,
        window_resizable: true,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = Args::parse().into_config();

    info!("Starting client...");
    info!("Connecting to: {}", config.server_url);
    if config.fake_ping_ms > 0 {
        info!("Simulating {}ms latency", config.fake_ping_ms);
    }
    info!("Controls: WASD/arrows to move, H to toggle HUD, Esc to quit");

    let mut connection = match Connection::spawn(&config) {
        Ok(connection) => connection,
        Err(e) => {
            error!("Failed to start transport: {}", e);
            return;
        }
    };

    let mut session = SyncSession::new(Renderer::new(), &config);
    let mut input = InputManager::new();
    let mut connected = false;
    let mut show_hud = true;

    loop {
        while let Some(event) = connection.try_recv() {
            match event {
                TransportEvent::Connected => connected = true,
                TransportEvent::Message(text) => {
                    for reply in session.handle_inbound(&text) {
                        connection.send(reply);
                    }
                }
                TransportEvent::Disconnected { reason } => {
                    warn!("Disconnected: {}", reason);
                    connected = false;
                    session.reset_connection();
                }
            }
        }

        let frame = input.poll();
        if frame.quit {
            break;
        }
        if frame.toggle_hud {
            show_hud = !show_hud;
        }

        if let Some(report) = session.dispatch(SyncEvent::Tick(frame.keys)) {
            connection.send(report);
        }

        session.sink().render(&HudConfig {
            local_id: session.identity().local_id().cloned(),
            connected,
            entity_count: session.registry().len(),
            fake_ping_ms: config.fake_ping_ms,
            visible: show_hud,
        });

        next_frame().await;
    }

    let renderer = session.shutdown();
    info!("Shut down with {} visuals left", renderer.visual_count());
    connection.shutdown();
}
