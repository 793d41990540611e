//! WebSocket transport
//!
//! The socket lives on its own thread with a current-thread tokio runtime so
//! the frame loop never blocks on the network. Only owned strings cross the
//! boundary: outbound reports in, [`TransportEvent`]s out. The frame loop
//! drains events with [`Connection::try_recv`] between frames.

use crate::config::ClientConfig;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::thread;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Message(String),
    Disconnected { reason: String },
}

/// Handle to the background transport worker
pub struct Connection {
    outbound: UnboundedSender<String>,
    inbound: UnboundedReceiver<TransportEvent>,
    worker: thread::JoinHandle<()>,
}

impl Connection {
    pub fn spawn(config: &ClientConfig) -> Result<Self, TransportError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let link = Link {
            url: config.server_url.clone(),
            latency: Duration::from_millis(config.fake_ping_ms / 2),
            reconnect_delay: config.reconnect_delay,
            outbound: outbound_rx,
            inbound: inbound_tx,
        };

        let worker = thread::Builder::new()
            .name("transport".to_string())
            .spawn(move || runtime.block_on(link.run()))?;

        Ok(Self {
            outbound: outbound_tx,
            inbound: inbound_rx,
            worker,
        })
    }

    /// Queues a message; dropped silently by the worker while disconnected
    pub fn send(&self, text: String) {
        if self.outbound.send(text).is_err() {
            warn!("Transport worker has stopped, dropping outbound message");
        }
    }

    pub fn try_recv(&mut self) -> Option<TransportEvent> {
        match self.inbound.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Closes the socket and waits for the worker to finish
    pub fn shutdown(self) {
        let Connection {
            outbound, worker, ..
        } = self;
        drop(outbound);

        if worker.join().is_err() {
            error!("Transport worker panicked");
        }
    }
}

enum PumpEnd {
    Closed(String),
    Shutdown,
}

struct Link {
    url: String,
    latency: Duration,
    reconnect_delay: Duration,
    outbound: UnboundedReceiver<String>,
    inbound: UnboundedSender<TransportEvent>,
}

impl Link {
    async fn run(mut self) {
        loop {
            match connect_async(self.url.as_str()).await {
                Ok((stream, _)) => {
                    info!("Connected to {}", self.url);
                    if self.inbound.send(TransportEvent::Connected).is_err() {
                        return;
                    }

                    match self.pump(stream).await {
                        PumpEnd::Shutdown => return,
                        PumpEnd::Closed(reason) => {
                            warn!("Connection to {} lost: {}", self.url, reason);
                            if self
                                .inbound
                                .send(TransportEvent::Disconnected { reason })
                                .is_err()
                            {
                                return;
                            }
                        }
                    }
                }
                Err(e) => warn!("Failed to connect to {}: {}", self.url, e),
            }

            if !self.wait_before_reconnect().await {
                return;
            }
        }
    }

    async fn pump(&mut self, stream: WebSocketStream<MaybeTlsStream<TcpStream>>) -> PumpEnd {
        let (mut write, mut read) = stream.split();

        loop {
            tokio::select! {
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if !self.latency.is_zero() {
                            sleep(self.latency).await;
                        }
                        if self.inbound.send(TransportEvent::Message(text)).is_err() {
                            return PumpEnd::Shutdown;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| f.reason.to_string())
                            .filter(|reason| !reason.is_empty())
                            .unwrap_or_else(|| "closed by server".to_string());
                        return PumpEnd::Closed(reason);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return PumpEnd::Closed(e.to_string()),
                    None => return PumpEnd::Closed("stream ended".to_string()),
                },

                message = self.outbound.recv() => match message {
                    Some(text) => {
                        if !self.latency.is_zero() {
                            sleep(self.latency).await;
                        }
                        if let Err(e) = write.send(Message::Text(text)).await {
                            return PumpEnd::Closed(e.to_string());
                        }
                    }
                    None => {
                        let _ = write.send(Message::Close(None)).await;
                        return PumpEnd::Shutdown;
                    }
                },
            }
        }
    }

    /// Sleeps out the reconnect delay; false if the client shut down meanwhile
    async fn wait_before_reconnect(&mut self) -> bool {
        let delay = sleep(self.reconnect_delay);
        tokio::pin!(delay);

        loop {
            tokio::select! {
                _ = &mut delay => return true,
                message = self.outbound.recv() => match message {
                    Some(text) => debug!("Not connected, dropping {}", text),
                    None => return false,
                },
            }
        }
    }
}
