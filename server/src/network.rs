//! Server network layer: WebSocket sessions and game loop coordination

use crate::client_manager::{ClientManager, ClientSender};
use crate::game::{Dispatch, GameState};
use crate::http::{self, HttpConfig};
use crate::BoxError;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Request, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{ClientEvent, PlayerId};
use std::borrow::Cow;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

pub const DEFAULT_PORT: u16 = 3000;

/// Everything the server needs to start
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    pub public_dir: PathBuf,
    pub max_clients: usize,
    /// HTTP-only variant without the game
    pub simple: bool,
    /// Seed for player id and color assignment
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: format!("0.0.0.0:{}", DEFAULT_PORT),
            public_dir: PathBuf::from("public"),
            max_clients: 100,
            simple: false,
            seed: None,
        }
    }
}

/// Messages sent from connection tasks to the game loop
#[derive(Debug)]
pub enum ServerMessage {
    /// A finished handshake. The game loop answers on `reply` with the id
    /// it assigned to the session.
    ClientConnected {
        addr: SocketAddr,
        sender: ClientSender,
        reply: oneshot::Sender<PlayerId>,
    },
    EventReceived {
        client_id: PlayerId,
        event: ClientEvent,
    },
    ClientDisconnected {
        client_id: PlayerId,
    },
    Shutdown,
}

/// Handed to every request handler
#[derive(Clone)]
struct AppState {
    http: Arc<HttpConfig>,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
}

/// Main server: owns the world and serializes every mutation through one queue
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    http: Arc<HttpConfig>,
    clients: ClientManager,
    game_state: GameState,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, BoxError> {
        let listener = TcpListener::bind(&config.addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let game_state = match config.seed {
            Some(seed) => GameState::with_seed(seed),
            None => GameState::new(),
        };

        Ok(Server {
            listener: Some(listener),
            local_addr,
            http: Arc::new(HttpConfig {
                public_dir: config.public_dir,
                simple: config.simple,
            }),
            clients: ClientManager::new(config.max_clients),
            game_state,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle for stopping the game loop from outside
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    fn router(&self) -> Router {
        let state = AppState {
            http: Arc::clone(&self.http),
            server_tx: self.server_tx.clone(),
        };
        http::routes(&self.http)
            .route("/", get(root))
            .with_state(state)
    }

    /// Spawns the axum server that accepts connections on the bound listener
    fn spawn_acceptor(&mut self) -> Result<(), BoxError> {
        let listener = self.listener.take().ok_or("server is already running")?;
        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Error serving connections: {}", e);
            }
        });
        Ok(())
    }

    fn deliver(&self, dispatches: Vec<Dispatch>) {
        for dispatch in &dispatches {
            self.clients.deliver(dispatch);
        }
    }

    /// Draws ids until one is not held by a live session
    fn unused_player_id(&mut self) -> PlayerId {
        loop {
            let id = self.game_state.next_player_id();
            if !self.clients.contains(&id) {
                return id;
            }
        }
    }

    /// Admits a session and spawns its player, or closes it when refused.
    /// Returns the id the session should report its events under.
    fn handle_connect(&mut self, addr: SocketAddr, sender: ClientSender) -> PlayerId {
        let client_id = self.unused_player_id();

        if let Err(refusal) = self.clients.add_client(client_id.clone(), addr, sender.clone()) {
            warn!("Refused client {} from {}: {}", client_id, addr, refusal);
            let frame = CloseFrame {
                code: close_code::AGAIN,
                reason: Cow::Owned(refusal.to_string()),
            };
            let _ = sender.send(Message::Close(Some(frame)));
            return client_id;
        }

        let dispatches = self.game_state.add_player(client_id.clone());
        self.deliver(dispatches);
        client_id
    }

    fn handle_disconnect(&mut self, client_id: &str) {
        if !self.clients.remove_client(client_id) {
            return;
        }
        let dispatches = self.game_state.remove_player(client_id);
        self.deliver(dispatches);
    }

    /// Runs handlers one at a time in queue order
    pub async fn run(&mut self) -> Result<(), BoxError> {
        self.spawn_acceptor()?;
        info!("Server started successfully");

        while let Some(message) = self.server_rx.recv().await {
            match message {
                ServerMessage::ClientConnected {
                    addr,
                    sender,
                    reply,
                } => {
                    let client_id = self.handle_connect(addr, sender);
                    if reply.send(client_id).is_err() {
                        debug!("Session from {} ended before its id was assigned", addr);
                    }
                }
                ServerMessage::EventReceived { client_id, event } => {
                    debug!("Client {} sent {:?}", client_id, event);
                    let dispatches = self.game_state.apply(&client_id, event);
                    self.deliver(dispatches);
                }
                ServerMessage::ClientDisconnected { client_id } => {
                    self.handle_disconnect(&client_id)
                }
                ServerMessage::Shutdown => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// `/` is either a WebSocket upgrade into the game or the landing page
async fn root(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    upgrade: Option<WebSocketUpgrade>,
    request: Request,
) -> Response {
    match upgrade {
        Some(upgrade) if !state.http.simple => {
            let server_tx = state.server_tx;
            upgrade.on_upgrade(move |socket| handle_websocket(socket, addr, server_tx))
        }
        _ => http::index(&state.http, request).await,
    }
}

/// One WebSocket session: a writer task draining the outbound queue, and
/// this task decoding inbound frames into game events.
async fn handle_websocket(
    socket: WebSocket,
    addr: SocketAddr,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    let (mut write, mut read) = socket.split();
    let (sender, mut outbound) = mpsc::unbounded_channel::<Message>();

    tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let closing = matches!(message, Message::Close(_));
            if let Err(e) = write.send(message).await {
                debug!("Write failed: {}", e);
                break;
            }
            if closing {
                break;
            }
        }
    });

    let (reply, assigned) = oneshot::channel();
    let connected = ServerMessage::ClientConnected {
        addr,
        sender,
        reply,
    };
    if server_tx.send(connected).is_err() {
        return;
    }
    let Ok(client_id) = assigned.await else {
        return;
    };
    debug!("WebSocket session from {} has id {}", addr, client_id);

    while let Some(frame) = read.next().await {
        match frame {
            Ok(Message::Text(text)) => match ClientEvent::from_json(&text) {
                Ok(event) => {
                    let received = ServerMessage::EventReceived {
                        client_id: client_id.clone(),
                        event,
                    };
                    if server_tx.send(received).is_err() {
                        return;
                    }
                }
                Err(e) => warn!("Rejected payload from {}: {}", client_id, e),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Read error from {}: {}", client_id, e);
                break;
            }
        }
    }

    let _ = server_tx.send(ServerMessage::ClientDisconnected { client_id });
}
