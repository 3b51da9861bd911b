//! # Game Server Library
//!
//! Server for a small shared-room harvesting game. Browsers connect over a
//! WebSocket, walk an avatar around a canvas and chop trees or mine stones.
//! Every change is echoed to every connected client.
//!
//! ## Core Responsibilities
//!
//! ### World State
//! A single in-memory world: the connected players keyed by connection id,
//! plus a fixed layout of trees and stones whose yield only ever goes down.
//! Nothing is persisted; a restart resets the layout.
//!
//! ### Session Management
//! Each WebSocket session gets an id, a random color and a spawn point when
//! it connects. Ids and colors come from the game loop's RNG, which can be
//! seeded. The player is removed (and announced) when the socket closes.
//! There is no reconnect path.
//!
//! ### Broadcasting
//! Moves go to everyone but the mover; harvests go to everyone. There is no
//! interest management: the room is small.
//!
//! ## Architecture Design
//!
//! ### Single Owning Task
//! Connection tasks never touch the world. They decode frames and push
//! [`network::ServerMessage`]s onto one queue; the game loop pops them and
//! runs each handler to completion before the next. Two players racing for
//! the last unit of a node are therefore decided by queue order, and the
//! loser's request is a silent no-op.
//!
//! ### Typed Boundary
//! Inbound frames are decoded into [`shared::ClientEvent`]. Frames that do not
//! decode are logged and dropped before they reach the world.
//!
//! ## Module Organization
//!
//! - `game`: world state and the connect/move/collect/disconnect rules
//! - `client_manager`: live sessions, capacity, and event fan-out
//! - `network`: axum router, WebSocket sessions, and the game loop
//! - `http`: static files and the status endpoint on the same port
//! - `utils`: id and color generation
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), server::BoxError> {
//!     let config = ServerConfig {
//!         addr: "127.0.0.1:3000".to_string(),
//!         ..ServerConfig::default()
//!     };
//!     let mut server = Server::new(config).await?;
//!     server.run().await
//! }
//! ```

pub mod client_manager;
pub mod game;
pub mod http;
pub mod network;
pub mod utils;

/// Error type for fallible setup and per-connection I/O
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
