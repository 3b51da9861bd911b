//! Integration tests for the game server
//!
//! These tests run a real server on an ephemeral port and drive it with
//! WebSocket clients, the way browsers would.

use assert_approx_eq::assert_approx_eq;
use futures_util::{SinkExt, StreamExt};
use server::network::{Server, ServerConfig, ServerMessage};
use shared::{ClientEvent, PlayerId, ResourceKind, ServerEvent, SPAWN_X, SPAWN_Y};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);
const SILENCE: Duration = Duration::from_millis(200);

/// SESSION LIFECYCLE TESTS
mod session_tests {
    use super::*;

    /// A fresh client gets the snapshot with the full layout and its own id
    #[tokio::test]
    async fn join_receives_initial_snapshot() {
        let (addr, _handle) = start_server(test_config()).await;
        let mut ws = connect(addr).await;

        match next_event(&mut ws).await {
            ServerEvent::GameInit {
                player_id,
                game_state,
            } => {
                assert_eq!(game_state.resources.trees.len(), 4);
                assert_eq!(game_state.resources.stones.len(), 3);
                assert!(game_state.resources.trees.iter().all(|t| t.amount == 5));
                assert!(game_state.resources.stones.iter().all(|s| s.amount == 3));

                let me = &game_state.players[&player_id];
                assert_approx_eq!(me.x, SPAWN_X);
                assert_approx_eq!(me.y, SPAWN_Y);
                assert_eq!(me.wood, 0);
                assert_eq!(me.stone, 0);
            }
            other => panic!("Expected gameInit, got {:?}", other),
        }
    }

    /// Existing clients learn about newcomers; newcomers see existing players
    #[tokio::test]
    async fn join_is_announced_to_others() {
        let (addr, _handle) = start_server(test_config()).await;
        let (mut a, a_id) = join(addr).await;

        let mut b = connect(addr).await;
        let b_id = match next_event(&mut b).await {
            ServerEvent::GameInit {
                player_id,
                game_state,
            } => {
                assert_eq!(game_state.players.len(), 2);
                assert!(game_state.players.contains_key(&a_id));
                player_id
            }
            other => panic!("Expected gameInit, got {:?}", other),
        };

        match next_event(&mut a).await {
            ServerEvent::PlayerJoined(player) => {
                assert_eq!(player.id, b_id);
                assert!(player.name.starts_with("Player_"));
            }
            other => panic!("Expected playerJoined, got {:?}", other),
        }
        expect_silence(&mut b).await;
    }

    /// Closing a socket removes the player for everyone else
    #[tokio::test]
    async fn disconnect_is_announced_once() {
        let (addr, _handle) = start_server(test_config()).await;
        let (mut a, a_id) = join(addr).await;
        let (mut b, _) = join(addr).await;
        next_event(&mut a).await; // b joined

        a.close(None).await.unwrap();

        assert_eq!(
            next_event(&mut b).await,
            ServerEvent::PlayerLeft { player_id: a_id }
        );
        expect_silence(&mut b).await;
    }

    /// Sessions beyond capacity are closed without ever getting a player
    #[tokio::test]
    async fn full_server_refuses_session() {
        let config = ServerConfig {
            max_clients: 1,
            ..test_config()
        };
        let (addr, _handle) = start_server(config).await;
        let (mut a, _) = join(addr).await;

        let mut b = connect(addr).await;
        match timeout(RECV_TIMEOUT, b.next()).await {
            Ok(Some(Ok(Message::Close(Some(frame))))) => {
                assert_eq!(frame.code, CloseCode::Again);
                assert_eq!(frame.reason, "Server full");
            }
            other => panic!("Expected close frame, got {:?}", other),
        }

        expect_silence(&mut a).await;
    }
}

/// GAMEPLAY TESTS
mod gameplay_tests {
    use super::*;

    /// Moves are relayed to others and never echoed to the mover
    #[tokio::test]
    async fn move_is_relayed_without_echo() {
        let (addr, _handle) = start_server(test_config()).await;
        let (mut a, a_id) = join(addr).await;
        let (mut b, _) = join(addr).await;
        next_event(&mut a).await; // b joined

        send(&mut a, ClientEvent::PlayerMove { x: 10.0, y: 20.0 }).await;

        match next_event(&mut b).await {
            ServerEvent::PlayerMoved { player_id, x, y } => {
                assert_eq!(player_id, a_id);
                assert_approx_eq!(x, 10.0);
                assert_approx_eq!(y, 20.0);
            }
            other => panic!("Expected playerMoved, got {:?}", other),
        }
        expect_silence(&mut b).await;
        expect_silence(&mut a).await;
    }

    /// Harvesting a tree updates the node and the collector's totals for all
    #[tokio::test]
    async fn collect_tree_broadcasts_to_everyone() {
        let (addr, _handle) = start_server(test_config()).await;
        let (mut a, a_id) = join(addr).await;
        let (mut b, _) = join(addr).await;
        next_event(&mut a).await; // b joined

        send(&mut a, collect(ResourceKind::Tree, 1)).await;

        let expected = vec![
            ServerEvent::ResourceUpdated {
                resource_id: 1,
                kind: ResourceKind::Tree,
                amount: 4,
            },
            ServerEvent::PlayerResources {
                player_id: a_id,
                wood: 1,
                stone: 0,
            },
        ];
        for ws in [&mut a, &mut b] {
            assert_eq!(next_event(ws).await, expected[0]);
            assert_eq!(next_event(ws).await, expected[1]);
        }
    }

    /// A depleted node ignores further requests
    #[tokio::test]
    async fn depleted_stone_is_silent() {
        let (addr, _handle) = start_server(test_config()).await;
        let (mut a, _) = join(addr).await;

        for remaining in (0..3).rev() {
            send(&mut a, collect(ResourceKind::Stone, 2)).await;
            match next_event(&mut a).await {
                ServerEvent::ResourceUpdated { amount, .. } => assert_eq!(amount, remaining),
                other => panic!("Expected resourceUpdated, got {:?}", other),
            }
            next_event(&mut a).await; // totals
        }

        send(&mut a, collect(ResourceKind::Stone, 2)).await;
        send(&mut a, collect(ResourceKind::Stone, 9)).await;
        expect_silence(&mut a).await;
    }

    /// Many clients racing for one node get exactly its yield between them
    #[tokio::test]
    async fn racing_collectors_share_exact_yield() {
        let (addr, _handle) = start_server(test_config()).await;
        let (mut observer, _) = join(addr).await;

        let mut racers = Vec::new();
        for _ in 0..3 {
            let (ws, _) = join(addr).await;
            next_event(&mut observer).await; // racer joined
            racers.push(ws);
        }

        // 9 attempts against 5 units
        for _ in 0..3 {
            for ws in racers.iter_mut() {
                send(ws, collect(ResourceKind::Tree, 3)).await;
            }
        }

        let mut amounts = Vec::new();
        let mut wood_by_player = HashMap::new();
        for _ in 0..10 {
            match next_event(&mut observer).await {
                ServerEvent::ResourceUpdated { amount, .. } => amounts.push(amount),
                ServerEvent::PlayerResources {
                    player_id, wood, ..
                } => {
                    wood_by_player.insert(player_id, wood);
                }
                other => panic!("Unexpected event {:?}", other),
            }
        }

        assert_eq!(amounts, vec![4, 3, 2, 1, 0]);
        assert_eq!(wood_by_player.values().sum::<u32>(), 5);
        expect_silence(&mut observer).await;
    }

    /// Frames that do not decode never reach the world
    #[tokio::test]
    async fn malformed_payloads_are_dropped() {
        let (addr, _handle) = start_server(test_config()).await;
        let (mut a, a_id) = join(addr).await;
        let (mut b, _) = join(addr).await;
        next_event(&mut a).await; // b joined

        let garbage = [
            "not json",
            r#"{"event":"playerMove","data":{"x":"left","y":2}}"#,
            r#"{"event":"collectResource","data":{"resourceId":1,"type":"gold"}}"#,
            r#"{"event":"teleport","data":{}}"#,
        ];
        for text in garbage {
            a.send(Message::Text(text.to_string())).await.unwrap();
        }
        send(&mut a, ClientEvent::PlayerMove { x: 1.0, y: 2.0 }).await;

        assert_eq!(
            next_event(&mut b).await,
            ServerEvent::PlayerMoved {
                player_id: a_id,
                x: 1.0,
                y: 2.0
            }
        );
        expect_silence(&mut b).await;
    }
}

/// HTTP SURFACE TESTS
mod http_tests {
    use super::*;

    #[tokio::test]
    async fn root_serves_browser_client() {
        let (addr, _handle) = start_server(test_config()).await;

        let response = http_get(addr, "/").await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("gameCanvas"));

        let script = http_get(addr, "/game.js").await;
        assert!(script.starts_with("HTTP/1.1 200 OK"));
        assert!(header(&script, "content-type").is_some_and(|v| v.contains("javascript")));

        let missing = http_get(addr, "/nope.txt").await;
        assert!(missing.starts_with("HTTP/1.1 404"));

        let escape = http_get(addr, "/../Cargo.toml").await;
        assert!(escape.starts_with("HTTP/1.1 404"));
    }

    #[tokio::test]
    async fn encoded_paths_and_head_requests() {
        let (addr, _handle) = start_server(test_config()).await;

        let encoded = http_get(addr, "/game%2Ejs").await;
        assert!(encoded.starts_with("HTTP/1.1 200 OK"));
        assert!(body(&encoded).contains("WebSocket"));

        let head_root = http_request(addr, "HEAD", "/").await;
        assert!(head_root.starts_with("HTTP/1.1 200 OK"));
        assert!(header(&head_root, "content-type").is_some_and(|v| v.starts_with("text/html")));
        assert!(body(&head_root).is_empty());

        let head_script = http_request(addr, "HEAD", "/game.js").await;
        assert!(head_script.starts_with("HTTP/1.1 200 OK"));
        assert!(body(&head_script).is_empty());

        let post = http_request(addr, "POST", "/").await;
        assert!(post.starts_with("HTTP/1.1 405"));
    }

    #[tokio::test]
    async fn simple_mode_serves_status() {
        let config = ServerConfig {
            simple: true,
            ..test_config()
        };
        let (addr, _handle) = start_server(config).await;

        let response = http_get(addr, "/api/status").await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));

        let status: serde_json::Value = serde_json::from_str(body(&response)).unwrap();
        assert_eq!(status["version"], "1.0");
        assert_eq!(status["players"], 1);

        // No game in this mode
        assert!(connect_async(format!("ws://{}/", addr)).await.is_err());
    }
}

// HELPER FUNCTIONS

fn test_config() -> ServerConfig {
    ServerConfig {
        addr: "127.0.0.1:0".to_string(),
        public_dir: Path::new(env!("CARGO_MANIFEST_DIR")).join("public"),
        seed: Some(1),
        ..ServerConfig::default()
    }
}

async fn start_server(config: ServerConfig) -> (SocketAddr, UnboundedSender<ServerMessage>) {
    let mut server = Server::new(config).await.unwrap();
    let addr = server.local_addr();
    let handle = server.shutdown_handle();

    tokio::spawn(async move {
        tokio_test::assert_ok!(server.run().await);
    });

    (addr, handle)
}

async fn connect(addr: SocketAddr) -> Ws {
    let (ws, _) = connect_async(format!("ws://{}/", addr)).await.unwrap();
    ws
}

async fn join(addr: SocketAddr) -> (Ws, PlayerId) {
    let mut ws = connect(addr).await;
    match next_event(&mut ws).await {
        ServerEvent::GameInit { player_id, .. } => (ws, player_id),
        other => panic!("Expected gameInit, got {:?}", other),
    }
}

async fn next_event(ws: &mut Ws) -> ServerEvent {
    loop {
        let frame = timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("connection closed")
            .expect("read error");
        if let Message::Text(text) = frame {
            return ServerEvent::from_json(&text).unwrap();
        }
    }
}

async fn expect_silence(ws: &mut Ws) {
    if let Ok(Some(Ok(frame))) = timeout(SILENCE, ws.next()).await {
        panic!("Expected no event, got {:?}", frame);
    }
}

async fn send(ws: &mut Ws, event: ClientEvent) {
    ws.send(Message::Text(event.to_json().unwrap()))
        .await
        .unwrap();
}

fn collect(kind: ResourceKind, resource_id: u32) -> ClientEvent {
    ClientEvent::CollectResource { resource_id, kind }
}

async fn http_get(addr: SocketAddr, path: &str) -> String {
    http_request(addr, "GET", path).await
}

async fn http_request(addr: SocketAddr, method: &str, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "{} {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        method, path, addr
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    timeout(RECV_TIMEOUT, stream.read_to_end(&mut response))
        .await
        .unwrap()
        .unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

fn header<'a>(response: &'a str, name: &str) -> Option<&'a str> {
    let head = response.split("\r\n\r\n").next()?;
    head.lines().skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim())
    })
}

fn body(response: &str) -> &str {
    response.split_once("\r\n\r\n").map_or("", |(_, body)| body)
}
