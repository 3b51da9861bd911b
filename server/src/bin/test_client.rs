use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use server::BoxError;
use shared::{ClientEvent, ResourceKind, ServerEvent};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Headless player: joins, walks to every node and harvests it dry
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket URL of the server
    #[arg(short, long, default_value = "ws://127.0.0.1:3000")]
    server: String,

    /// Pause between actions in milliseconds
    #[arg(short, long, default_value = "250")]
    delay: u64,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    env_logger::init();
    let args = Args::parse();

    info!("Connecting to {}", args.server);
    let (ws_stream, _) = connect_async(args.server.as_str()).await?;
    let (mut write, mut read) = ws_stream.split();

    // The snapshot is always the first event on a fresh session
    let (my_id, snapshot) = loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => match ServerEvent::from_json(&text)? {
                ServerEvent::GameInit {
                    player_id,
                    game_state,
                } => break (player_id, game_state),
                other => warn!("Unexpected event before init: {:?}", other),
            },
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.into()),
            None => return Err("connection closed before init".into()),
        }
    };

    println!("Joined as {} with {} players online", my_id, snapshot.players.len());

    let resources = &snapshot.resources;
    let targets: Vec<_> = [ResourceKind::Tree, ResourceKind::Stone]
        .into_iter()
        .flat_map(move |kind| resources.nodes(kind).iter().map(move |node| (kind, node)))
        .collect();
    for (kind, node) in &targets {
        println!(
            "  {:?} {} at ({}, {}) holds {}",
            kind, node.id, node.x, node.y, node.amount
        );
    }

    for (kind, node) in targets {
        let walk = ClientEvent::PlayerMove {
            x: node.x,
            y: node.y,
        };
        write.send(Message::Text(walk.to_json()?)).await?;

        for _ in 0..node.amount {
            let collect = ClientEvent::CollectResource {
                resource_id: node.id,
                kind,
            };
            write.send(Message::Text(collect.to_json()?)).await?;
            sleep(Duration::from_millis(args.delay)).await;
        }
    }

    // Print whatever the server echoed back, then leave
    while let Ok(Some(Ok(message))) = timeout(Duration::from_secs(1), read.next()).await {
        if let Message::Text(text) = message {
            match ServerEvent::from_json(&text) {
                Ok(ServerEvent::PlayerResources {
                    player_id,
                    wood,
                    stone,
                }) if player_id == my_id => {
                    println!("Now holding {} wood, {} stone", wood, stone);
                }
                Ok(event) => println!("{}: {:?}", event.name(), event),
                Err(e) => warn!("Undecodable event: {}", e),
            }
        }
    }

    write.send(Message::Close(None)).await?;
    println!("Test client finished");
    Ok(())
}
