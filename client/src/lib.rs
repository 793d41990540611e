//! # Cube World Client Library
//!
//! Client-side implementation of the shared cube world: every connected user
//! is a cube on a floor, the server periodically broadcasts where everyone is,
//! and each client moves its own cube locally and reports the result.
//!
//! ## Architecture Overview
//!
//! The client is a state-synchronization engine wrapped around a render sink
//! and a text transport. All connection state lives in one [`session::SyncSession`]
//! that is created per connection and driven by events.
//!
//! ### Identity
//! The server announces the connection's id in an HTML fragment, possibly more
//! than once and through more than one channel. The first id wins; learning it
//! triggers a single initial report from the spawn point.
//!
//! ### Reconciliation
//! Snapshots are complete enumerations. Each one is applied in a single pass:
//! unknown users are created, remote users are moved, users no longer listed
//! are destroyed. The local cube is left alone once bound, so movement stays
//! smooth regardless of round-trip latency.
//!
//! ### Reporting
//! Movement is sampled every frame. A report is sent only when the cube moved
//! past a small epsilon since the last report, so idle frames cost nothing.
//!
//! ## Module Organization
//!
//! ### Session Module (`session`)
//! The per-connection dispatcher:
//! - `SyncEvent` (tick, inbound snapshot, inbound identity)
//! - Decoding of raw transport text into events
//! - Connection reset and teardown
//!
//! ### Registry, Identity, Reporter, Reconciler
//! The pieces the session owns:
//! - `registry`: user id to entity, kept in step with the render sink
//! - `identity`: write-once local id latch
//! - `reporter`: local movement and report policy
//! - `reconciler`: snapshot diff-and-apply
//!
//! ### Input Module (`input`)
//! Polled keyboard state (WASD and arrows) and edge-detected toggles.
//!
//! ### Network Module (`network`)
//! WebSocket connection on a background thread with reconnects and optional
//! simulated latency.
//!
//! ### Rendering Module (`rendering`)
//! The `RenderSink` contract and its macroquad 3D implementation.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::config::ClientConfig;
//! use client::input::InputManager;
//! use client::network::{Connection, TransportEvent};
//! use client::rendering::Renderer;
//! use client::session::{SyncEvent, SyncSession};
//!
//! # fn frame_loop() -> Result<(), client::network::TransportError> {
//! let config = ClientConfig::default();
//! let mut connection = Connection::spawn(&config)?;
//! let mut session = SyncSession::new(Renderer::new(), &config);
//! let mut input = InputManager::new();
//!
//! loop {
//!     // Apply everything the server sent since the last frame
//!     while let Some(event) = connection.try_recv() {
//!         if let TransportEvent::Message(text) = event {
//!             for reply in session.handle_inbound(&text) {
//!                 connection.send(reply);
//!             }
//!         }
//!     }
//!
//!     // Move the local cube and report if it moved
//!     let frame = input.poll();
//!     if let Some(report) = session.dispatch(SyncEvent::Tick(frame.keys)) {
//!         connection.send(report);
//!     }
//!
//!     // draw session.sink() and wait for the next frame
//! }
//! # }
//! ```

pub mod config;
pub mod identity;
pub mod input;
pub mod network;
pub mod reconciler;
pub mod registry;
pub mod rendering;
pub mod reporter;
pub mod session;
