//! Race Tester CLI Tool
//!
//! Command-line tool for exercising a running paddock server over real
//! WebSocket connections.
//!
//! Usage:
//!   # Start the server first:
//!   cargo run --bin paddock
//!
//!   # Then drive it:
//!   cargo run --bin race-tester -- join --id racer-1
//!   cargo run --bin race-tester -- join --id racer-2 --no-ready
//!   cargo run --bin race-tester -- scenario

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

#[derive(Parser)]
#[command(name = "race-tester")]
#[command(about = "Interactive race testing tool for the paddock matchmaking server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Server base URL
    #[arg(long, default_value = "ws://127.0.0.1:8080")]
    server: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect a single player and print everything the server sends
    Join {
        /// Player ID
        #[arg(short, long)]
        id: String,
        /// Do not automatically send ready when a match is found
        #[arg(long)]
        no_ready: bool,
        /// Seconds after the countdown deadline to report a finish
        #[arg(short, long, default_value = "2.0")]
        finish_after: f64,
        /// Never report a finish
        #[arg(long)]
        no_finish: bool,
    },
    /// Run a two-player happy path: queue, ready, countdown, finish, ranking
    Scenario,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Join {
            id,
            no_ready,
            finish_after,
            no_finish,
        } => {
            let finish = if no_finish { None } else { Some(finish_after) };
            run_player(&cli.server, &id, !no_ready, finish).await?;
        }
        Commands::Scenario => {
            let server_a = cli.server.clone();
            let server_b = cli.server.clone();
            let first = tokio::spawn(async move {
                run_player(&server_a, "racer-1", true, Some(1.0)).await
            });
            let second = tokio::spawn(async move {
                run_player(&server_b, "racer-2", true, Some(3.5)).await
            });

            first.await??;
            second.await??;
            println!("Scenario completed");
        }
    }

    Ok(())
}

/// Drive one player connection until its session ends.
///
/// Reacts to server events: readies up on matchFound (when enabled) and
/// reports a finish the given number of seconds after the countdown
/// deadline passes.
async fn run_player(
    server: &str,
    id: &str,
    auto_ready: bool,
    finish_after: Option<f64>,
) -> Result<()> {
    let url = format!("{}/normal_match/{}", server.trim_end_matches('/'), id);
    println!("[{}] connecting to {}", id, url);

    let (socket, _) = connect_async(url.as_str())
        .await
        .with_context(|| format!("Failed to connect to {}", url))?;
    let (mut sink, mut stream) = socket.split();

    while let Some(frame) = stream.next().await {
        let frame = frame.with_context(|| format!("Connection error for {}", id))?;
        match frame {
            Message::Text(text) => {
                println!("[{}] <- {}", id, text);
                let event: Value = match serde_json::from_str(&text) {
                    Ok(event) => event,
                    Err(e) => {
                        eprintln!("[{}] unparseable frame: {}", id, e);
                        continue;
                    }
                };

                match event["cmd"].as_str() {
                    Some("matchFound") if auto_ready => {
                        sink.send(Message::Text(r#"{"type":"ready"}"#.to_string()))
                            .await?;
                        println!("[{}] -> ready", id);
                    }
                    Some("startCountdown") => {
                        if let Some(delay) = finish_after {
                            let end = event["endTime"].as_i64().unwrap_or(0);
                            let now = chrono::Utc::now().timestamp();
                            let wait = (end - now).max(0) as f64 + delay;
                            println!("[{}] racing, finishing in {:.1}s", id, wait);
                            tokio::time::sleep(Duration::from_secs_f64(wait)).await;
                            sink.send(Message::Text(r#"{"type":"finish"}"#.to_string()))
                                .await?;
                            println!("[{}] -> finish", id);
                        }
                    }
                    // Terminal events for this session
                    Some("raceRanking") | Some("raceTimeout") | Some("matchFailed") => break,
                    _ => {}
                }
            }
            Message::Close(frame) => {
                println!("[{}] connection closed: {:?}", id, frame);
                break;
            }
            _ => {}
        }
    }

    println!("[{}] session over", id);
    Ok(())
}
