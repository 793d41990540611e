//! # Cube World Relay Library
//!
//! A small development server for the cube world. It does no simulation:
//! clients own their positions and the relay only remembers and repeats
//! what they report.
//!
//! ## Core Responsibilities
//!
//! ### Identity Assignment
//! Every WebSocket connection becomes a user with a fresh id and a random
//! color. The id is announced to that connection as an out-of-band HTML
//! fragment right after the handshake.
//!
//! ### Position Collection
//! Clients send `POS:x,y,z` reports, either raw or wrapped in a `{"msg": ...}`
//! form envelope. The latest report per user is kept; anything else is
//! logged and ignored.
//!
//! ### Snapshot Broadcasting
//! At a fixed tick rate the full roster is serialized to JSON and broadcast
//! to every connection inside a `position-updates` fragment. Users whose
//! connection closed are gone from the next snapshot, which is how clients
//! learn about departures.
//!
//! ## Module Organization
//!
//! ### Roster Module (`roster`)
//! Connected users with their color and last reported position, and the
//! rendering of the snapshot fragment.
//!
//! ### Relay Module (`relay`)
//! Listener, per-connection tasks and the tick task, sharing the roster
//! behind an `RwLock` and fanning snapshots out over a broadcast channel.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::relay::RelayServer;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     // 30Hz snapshots on the default client port
//!     let server = RelayServer::bind("127.0.0.1:8080", Duration::from_millis(33)).await?;
//!     server.run().await
//! }
//! ```

pub mod relay;
pub mod roster;
