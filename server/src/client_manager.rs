//! Connection registry and event fan-out for the game server
//!
//! This module tracks every live WebSocket session the game loop has admitted:
//! - Session lifecycle (admit, remove) and capacity enforcement
//! - The outbound queue feeding each session's writer task
//! - Routing of game dispatches to one, all, or all-but-one client
//!
//! The registry is owned by the game loop, so it is only ever touched from a
//! single task and needs no locking.

use crate::game::{Dispatch, Recipients};
use axum::extract::ws::Message;
use log::{error, info, warn};
use shared::PlayerId;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Outbound half of a session, drained by its writer task
pub type ClientSender = mpsc::UnboundedSender<Message>;

/// A connected WebSocket session
#[derive(Debug)]
pub struct Client {
    /// Connection-scoped id, doubles as the player id
    pub id: PlayerId,
    /// Peer address, for logging
    pub addr: SocketAddr,
    /// When the session was admitted
    pub connected_at: Instant,
    sender: ClientSender,
}

impl Client {
    pub fn new(id: PlayerId, addr: SocketAddr, sender: ClientSender) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            sender,
        }
    }

    /// Queues a frame for this client. Returns false once the writer is gone.
    pub fn send(&self, message: Message) -> bool {
        self.sender.send(message).is_ok()
    }

    pub fn session_length(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

/// Why a session was not admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    ServerFull,
    DuplicateId,
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Refusal::ServerFull => write!(f, "Server full"),
            Refusal::DuplicateId => write!(f, "Duplicate session id"),
        }
    }
}

pub struct ClientManager {
    clients: HashMap<PlayerId, Client>,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            max_clients,
        }
    }

    /// Admits a session unless the server is at capacity or the id is taken.
    pub fn add_client(
        &mut self,
        id: PlayerId,
        addr: SocketAddr,
        sender: ClientSender,
    ) -> Result<(), Refusal> {
        if self.clients.len() >= self.max_clients {
            return Err(Refusal::ServerFull);
        }
        if self.clients.contains_key(&id) {
            return Err(Refusal::DuplicateId);
        }

        info!("Client {} connected from {}", id, addr);
        self.clients.insert(id.clone(), Client::new(id, addr, sender));
        Ok(())
    }

    /// Returns true if the client was registered.
    pub fn remove_client(&mut self, id: &str) -> bool {
        if let Some(client) = self.clients.remove(id) {
            info!(
                "Client {} disconnected after {:.1}s",
                client.id,
                client.session_length().as_secs_f32()
            );
            true
        } else {
            false
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.clients.contains_key(id)
    }

    pub fn send_to(&self, id: &str, message: &Message) -> bool {
        match self.clients.get(id) {
            Some(client) => {
                let delivered = client.send(message.clone());
                if !delivered {
                    warn!("Outbound queue for client {} is closed", id);
                }
                delivered
            }
            None => false,
        }
    }

    /// Queues a frame for every client except `exclude`. Returns how many
    /// queues accepted it.
    pub fn broadcast(&self, message: &Message, exclude: Option<&str>) -> usize {
        let mut delivered = 0;
        for (id, client) in &self.clients {
            if Some(id.as_str()) == exclude {
                continue;
            }
            if client.send(message.clone()) {
                delivered += 1;
            } else {
                warn!("Outbound queue for client {} is closed", id);
            }
        }
        delivered
    }

    /// Serializes a dispatch once and routes it to its recipients.
    pub fn deliver(&self, dispatch: &Dispatch) -> usize {
        let text = match dispatch.event.to_json() {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to encode {} event: {}", dispatch.event.name(), e);
                return 0;
            }
        };
        let message = Message::Text(text);

        match &dispatch.to {
            Recipients::Only(id) => usize::from(self.send_to(id, &message)),
            Recipients::AllExcept(id) => self.broadcast(&message, Some(id)),
            Recipients::All => self.broadcast(&message, None),
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
