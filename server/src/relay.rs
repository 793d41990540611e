//! WebSocket relay: accepts connections, collects reports, broadcasts snapshots

use crate::roster::Roster;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{fragment, UserId};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

pub type ServerError = Box<dyn std::error::Error + Send + Sync>;

/// Snapshots buffered per connection before a slow reader starts skipping
const UPDATE_BUFFER: usize = 16;

/// Relay server owning the listener and the shared roster
///
/// Each connection runs in its own task. A single tick task renders the
/// roster once per tick and fans the fragment out over a broadcast channel.
pub struct RelayServer {
    listener: TcpListener,
    roster: Arc<RwLock<Roster>>,
    tick_duration: Duration,
}

impl RelayServer {
    pub async fn bind(addr: &str, tick_duration: Duration) -> Result<Self, ServerError> {
        if tick_duration.is_zero() {
            return Err("tick duration must be greater than zero".into());
        }

        let listener = TcpListener::bind(addr).await?;
        info!("Relay listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            roster: Arc::new(RwLock::new(Roster::new())),
            tick_duration,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn roster(&self) -> Arc<RwLock<Roster>> {
        Arc::clone(&self.roster)
    }

    /// Accepts connections until the listener fails
    pub async fn run(self) -> Result<(), ServerError> {
        let (updates, _) = broadcast::channel::<String>(UPDATE_BUFFER);

        let ticker = {
            let roster = Arc::clone(&self.roster);
            let updates = updates.clone();
            let tick_duration = self.tick_duration;
            tokio::spawn(async move { broadcast_loop(roster, updates, tick_duration).await })
        };

        let result = loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => break Err(e.into()),
            };

            let roster = Arc::clone(&self.roster);
            let updates = updates.clone();
            tokio::spawn(async move {
                handle_connection(stream, addr, roster, updates).await;
            });
        };

        ticker.abort();
        result
    }
}

async fn broadcast_loop(
    roster: Arc<RwLock<Roster>>,
    updates: broadcast::Sender<String>,
    tick_duration: Duration,
) {
    let mut ticker = interval(tick_duration);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut tick: u64 = 0;

    loop {
        ticker.tick().await;
        tick += 1;

        let rendered = {
            let roster = roster.read().await;
            if tick % 300 == 0 && !roster.is_empty() {
                debug!("Tick {}: {} users", tick, roster.len());
            }
            roster.render_snapshot()
        };

        match rendered {
            Ok(fragment) => {
                // Fails only when nobody is connected
                let _ = updates.send(fragment);
            }
            Err(e) => error!("Failed to render snapshot: {}", e),
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    roster: Arc<RwLock<Roster>>,
    broadcaster: broadcast::Sender<String>,
) {
    let socket = match accept_async(stream).await {
        Ok(socket) => socket,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };

    let id = roster.write().await.add_user();
    info!("Connection from {} assigned {}", addr, id);
    let mut updates = broadcaster.subscribe();
    drop(broadcaster);

    let (mut write, mut read) = socket.split();

    if let Err(e) = write
        .send(Message::Text(fragment::render_identity(&id)))
        .await
    {
        warn!("Failed to send identity to {}: {}", id, e);
        roster.write().await.remove_user(id.as_str());
        return;
    }

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_report(&roster, &id, &text).await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("Read error from {}: {}", id, e);
                    break;
                }
            },

            update = updates.recv() => match update {
                Ok(fragment) => {
                    if let Err(e) = write.send(Message::Text(fragment)).await {
                        debug!("Write error to {}: {}", id, e);
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("{} fell behind, skipped {} snapshots", id, skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    roster.write().await.remove_user(id.as_str());
    info!("Connection from {} ({}) closed", addr, id);
}

async fn handle_report(roster: &RwLock<Roster>, id: &UserId, text: &str) {
    let mut roster = roster.write().await;
    match roster.apply_message(id.as_str(), text) {
        Ok(Some(position)) => debug!(
            "{} moved to ({:.2}, {:.2}, {:.2})",
            id, position.x, position.y, position.z
        ),
        Ok(None) => {}
        Err(e) => debug!("Ignoring message from {}: {}", id, e),
    }
}
