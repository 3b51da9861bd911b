//! Authoritative world state and the event handlers that mutate it
//!
//! Every handler runs to completion on the game loop task and returns the
//! events it wants delivered. Nothing here touches a socket, so the whole
//! rule set can be exercised without networking.

use crate::utils::{generate_player_id, pick_color};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{ClientEvent, Player, PlayerId, ResourceKind, Resources, ServerEvent, WorldSnapshot};
use std::collections::HashMap;

/// Who should receive a server event
#[derive(Debug, Clone, PartialEq)]
pub enum Recipients {
    Only(PlayerId),
    AllExcept(PlayerId),
    All,
}

/// A server event paired with its audience
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub to: Recipients,
    pub event: ServerEvent,
}

impl Dispatch {
    pub fn new(to: Recipients, event: ServerEvent) -> Self {
        Self { to, event }
    }
}

#[derive(Debug)]
pub struct GameState {
    pub players: HashMap<PlayerId, Player>,
    pub resources: Resources,
    rng: StdRng,
}

impl GameState {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic ids and colors, for tests and reproducible sessions.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            players: HashMap::new(),
            resources: Resources::initial(),
            rng,
        }
    }

    /// Draws the id for the next connection from the game's own RNG.
    pub fn next_player_id(&mut self) -> PlayerId {
        generate_player_id(&mut self.rng)
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            players: self.players.clone(),
            resources: self.resources.clone(),
        }
    }

    /// Spawns a player for a new connection.
    ///
    /// The newcomer gets the full snapshot tagged with its own id; everyone
    /// else learns about the newcomer's record.
    pub fn add_player(&mut self, player_id: PlayerId) -> Vec<Dispatch> {
        let color = pick_color(&mut self.rng);
        let player = Player::new(player_id.clone(), color);

        info!(
            "Added player {} ({}) at ({}, {})",
            player.id, player.color, player.x, player.y
        );
        self.players.insert(player_id.clone(), player.clone());

        vec![
            Dispatch::new(
                Recipients::Only(player_id.clone()),
                ServerEvent::GameInit {
                    player_id: player_id.clone(),
                    game_state: self.snapshot(),
                },
            ),
            Dispatch::new(
                Recipients::AllExcept(player_id),
                ServerEvent::PlayerJoined(player),
            ),
        ]
    }

    pub fn remove_player(&mut self, player_id: &str) -> Vec<Dispatch> {
        if self.players.remove(player_id).is_none() {
            return Vec::new();
        }

        info!("Removed player {}", player_id);
        vec![Dispatch::new(
            Recipients::All,
            ServerEvent::PlayerLeft {
                player_id: player_id.to_string(),
            },
        )]
    }

    /// Overwrites the stored position and relays it to everyone but the mover.
    /// Coordinates are trusted as sent.
    pub fn move_player(&mut self, player_id: &str, x: f64, y: f64) -> Vec<Dispatch> {
        let Some(player) = self.players.get_mut(player_id) else {
            return Vec::new();
        };

        player.x = x;
        player.y = y;

        vec![Dispatch::new(
            Recipients::AllExcept(player_id.to_string()),
            ServerEvent::PlayerMoved {
                player_id: player_id.to_string(),
                x,
                y,
            },
        )]
    }

    /// Harvests one unit from a node.
    ///
    /// Unknown players, unknown nodes and depleted nodes are silently
    /// ignored. On success the node's new amount and the collector's totals
    /// go to every client, the collector included.
    pub fn collect_resource(
        &mut self,
        player_id: &str,
        kind: ResourceKind,
        resource_id: u32,
    ) -> Vec<Dispatch> {
        let Some(player) = self.players.get_mut(player_id) else {
            return Vec::new();
        };
        let Some(node) = self.resources.node_mut(kind, resource_id) else {
            debug!("Player {} asked for unknown {:?} {}", player_id, kind, resource_id);
            return Vec::new();
        };
        if !node.take_one() {
            return Vec::new();
        }
        player.credit(kind);

        vec![
            Dispatch::new(
                Recipients::All,
                ServerEvent::ResourceUpdated {
                    resource_id,
                    kind,
                    amount: node.amount,
                },
            ),
            Dispatch::new(
                Recipients::All,
                ServerEvent::PlayerResources {
                    player_id: player_id.to_string(),
                    wood: player.wood,
                    stone: player.stone,
                },
            ),
        ]
    }

    /// Routes a decoded client event to its handler
    pub fn apply(&mut self, player_id: &str, event: ClientEvent) -> Vec<Dispatch> {
        match event {
            ClientEvent::PlayerMove { x, y } => self.move_player(player_id, x, y),
            ClientEvent::CollectResource { resource_id, kind } => {
                self.collect_resource(player_id, kind, resource_id)
            }
        }
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}
