use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const SPAWN_X: f64 = 400.0;
pub const SPAWN_Y: f64 = 300.0;
pub const TREE_YIELD: u32 = 5;
pub const STONE_YIELD: u32 = 3;

/// Display colors handed out at connect time. Players may share a color.
pub const PLAYER_COLORS: [&str; 5] = ["#ff6b35", "#4ecdc4", "#45b7d1", "#96ceb4", "#feca57"];

/// Fixed world layout: (id, x, y)
pub const TREE_LAYOUT: [(u32, f64, f64); 4] = [
    (1, 200.0, 150.0),
    (2, 400.0, 300.0),
    (3, 600.0, 200.0),
    (4, 300.0, 500.0),
];
pub const STONE_LAYOUT: [(u32, f64, f64); 3] = [
    (1, 250.0, 350.0),
    (2, 450.0, 250.0),
    (3, 350.0, 450.0),
];

pub type PlayerId = String;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Tree,
    Stone,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub x: f64,
    pub y: f64,
    pub color: String,
    pub wood: u32,
    pub stone: u32,
    pub name: String,
}

impl Player {
    pub fn new(id: PlayerId, color: &str) -> Self {
        let name = display_name(&id);
        Self {
            id,
            x: SPAWN_X,
            y: SPAWN_Y,
            color: color.to_string(),
            wood: 0,
            stone: 0,
            name,
        }
    }

    /// Credits one unit of the resource a node of `kind` yields.
    pub fn credit(&mut self, kind: ResourceKind) {
        match kind {
            ResourceKind::Tree => self.wood += 1,
            ResourceKind::Stone => self.stone += 1,
        }
    }
}

/// Name shown above an avatar, derived from the first four characters of its id.
pub fn display_name(id: &str) -> String {
    let prefix: String = id.chars().take(4).collect();
    format!("Player_{}", prefix)
}

/// A harvestable tree or stone.
///
/// Both kinds carry their remaining units in `amount`, the same field name
/// `resourceUpdated` uses, rather than a per-kind `wood`/`stone` counter.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ResourceNode {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    /// Units left to harvest. Never replenished.
    pub amount: u32,
}

impl ResourceNode {
    pub fn new(id: u32, x: f64, y: f64, amount: u32) -> Self {
        Self { id, x, y, amount }
    }

    /// Removes one unit if any remain. Returns false on a depleted node.
    pub fn take_one(&mut self) -> bool {
        if self.is_depleted() {
            return false;
        }
        self.amount -= 1;
        true
    }

    pub fn is_depleted(&self) -> bool {
        self.amount == 0
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Resources {
    pub trees: Vec<ResourceNode>,
    pub stones: Vec<ResourceNode>,
}

impl Resources {
    /// The layout every process starts from.
    pub fn initial() -> Self {
        Self {
            trees: TREE_LAYOUT
                .iter()
                .map(|&(id, x, y)| ResourceNode::new(id, x, y, TREE_YIELD))
                .collect(),
            stones: STONE_LAYOUT
                .iter()
                .map(|&(id, x, y)| ResourceNode::new(id, x, y, STONE_YIELD))
                .collect(),
        }
    }

    pub fn nodes(&self, kind: ResourceKind) -> &[ResourceNode] {
        match kind {
            ResourceKind::Tree => &self.trees,
            ResourceKind::Stone => &self.stones,
        }
    }

    pub fn node_mut(&mut self, kind: ResourceKind, id: u32) -> Option<&mut ResourceNode> {
        let nodes = match kind {
            ResourceKind::Tree => &mut self.trees,
            ResourceKind::Stone => &mut self.stones,
        };
        nodes.iter_mut().find(|node| node.id == id)
    }
}

/// Full world state sent once to each client when it joins.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WorldSnapshot {
    pub players: HashMap<PlayerId, Player>,
    pub resources: Resources,
}

/// Events a browser client may send.
///
/// Encoded as `{"event": "<name>", "data": {...}}`. Anything that does not
/// decode into one of these variants is rejected at the connection boundary.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    PlayerMove {
        x: f64,
        y: f64,
    },
    #[serde(rename_all = "camelCase")]
    CollectResource {
        resource_id: u32,
        #[serde(rename = "type")]
        kind: ResourceKind,
    },
}

impl ClientEvent {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Events the server pushes to clients.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    GameInit {
        player_id: PlayerId,
        game_state: WorldSnapshot,
    },
    PlayerJoined(Player),
    #[serde(rename_all = "camelCase")]
    PlayerMoved { player_id: PlayerId, x: f64, y: f64 },
    #[serde(rename_all = "camelCase")]
    PlayerResources {
        player_id: PlayerId,
        wood: u32,
        stone: u32,
    },
    #[serde(rename_all = "camelCase")]
    ResourceUpdated {
        resource_id: u32,
        #[serde(rename = "type")]
        kind: ResourceKind,
        amount: u32,
    },
    #[serde(rename_all = "camelCase")]
    PlayerLeft { player_id: PlayerId },
}

impl ServerEvent {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Wire name of the event, as it appears in the envelope.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::GameInit { .. } => "gameInit",
            ServerEvent::PlayerJoined(_) => "playerJoined",
            ServerEvent::PlayerMoved { .. } => "playerMoved",
            ServerEvent::PlayerResources { .. } => "playerResources",
            ServerEvent::ResourceUpdated { .. } => "resourceUpdated",
            ServerEvent::PlayerLeft { .. } => "playerLeft",
        }
    }
}
