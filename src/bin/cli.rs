// Quiz Live CLI
// Talks to a running quiz live server: health checks plus interactive host and player sessions

use clap::{Parser, Subcommand};
use colored::*;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Parser)]
#[command(name = "quiz-cli")]
#[command(about = "Quiz Live Server CLI", long_about = None)]
struct Cli {
    /// Server address (default: 127.0.0.1:8080)
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server health endpoint
    Health,

    /// Get game configuration
    Config,

    /// Create a room and run the game as host
    Host {
        /// Quiz to play
        #[arg(short, long)]
        quiz_id: String,

        /// Host user ID
        #[arg(long)]
        host_id: String,
    },

    /// Join a room as a player
    Play {
        /// Join code shown to the host
        #[arg(short, long)]
        join_code: u32,

        /// Display name
        #[arg(short, long)]
        username: String,

        /// Player user ID, reuse it to reconnect
        #[arg(long)]
        user_id: String,

        /// Avatar URL (optional)
        #[arg(long)]
        avatar: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Health => {
            check_health(&cli.server).await;
        }
        Commands::Config => {
            check_config(&cli.server).await;
        }
        Commands::Host { quiz_id, host_id } => {
            host_game(&cli.server, quiz_id, host_id).await;
        }
        Commands::Play {
            join_code,
            username,
            user_id,
            avatar,
        } => {
            play_game(&cli.server, *join_code, username, user_id, avatar.as_deref()).await;
        }
    }
}

async fn check_health(server: &str) {
    println!("{}", "Checking server health...".cyan());

    let url = format!("http://{}/game/health", server);
    let client = reqwest::Client::new();

    match client.get(&url).send().await {
        Ok(resp) => {
            let status = resp.status();
            if status.is_success() {
                println!("{} Health check passed", "✓".green());

                if let Ok(body) = resp.json::<Value>().await {
                    println!("  Status: {}", body["status"].as_str().unwrap_or("unknown"));
                    println!("  Version: {}", body["version"].as_str().unwrap_or("unknown"));
                    println!("  Lobby sessions: {}", body["lobby_sessions"]);
                    println!("  Active sessions: {}", body["active_sessions"]);
                    println!("  Connections: {}", body["connections"]);
                }
            } else {
                println!("{} Health check failed: {}", "✗".red(), status);
            }
        }
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
            println!("  Make sure the server is running on {}", server);
        }
    }
}

async fn check_config(server: &str) {
    println!("{}", "Fetching game configuration...".cyan());

    let url = format!("http://{}/game/config", server);
    let client = reqwest::Client::new();

    match client.get(&url).send().await {
        Ok(resp) => {
            if resp.status().is_success() {
                println!("{} Config endpoint accessible", "✓".green());

                if let Ok(body) = resp.json::<Value>().await {
                    println!("\nConfiguration:");
                    println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
                }
            } else {
                println!("{} Config fetch failed: {}", "✗".red(), resp.status());
            }
        }
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
        }
    }
}

async fn host_game(server: &str, quiz_id: &str, host_id: &str) {
    println!("{}", "Creating room...".cyan());
    println!("  Quiz: {}", quiz_id);

    let url = format!("ws://{}/game", server);
    let (ws_stream, _) = match connect_async(&url).await {
        Ok(connection) => connection,
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
            return;
        }
    };
    let (mut write, mut read) = ws_stream.split();

    let create = json!({
        "type": "create-room",
        "quiz_id": quiz_id,
        "host_id": host_id,
    });
    if write.send(Message::Text(create.to_string())).await.is_err() {
        println!("{} Failed to send create-room", "✗".red());
        return;
    }

    let join_code = match timeout(Duration::from_secs(5), read.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => {
            let response: Value = serde_json::from_str(&text).unwrap_or_default();
            if response["type"] == "room-created" {
                let code = response["join_code"].as_u64().unwrap_or_default();
                println!("{} Room created!", "✓".green());
                println!("\n{}", "═".repeat(50).green());
                println!("{} {}", "Join code:".bold(), code.to_string().green().bold());
                println!("{}", "═".repeat(50).green());
                code
            } else {
                print_server_message(&response);
                return;
            }
        }
        Ok(Some(Ok(msg))) => {
            println!("{} Unexpected message: {:?}", "✗".yellow(), msg);
            return;
        }
        Ok(Some(Err(e))) => {
            println!("{} Error receiving message: {}", "✗".red(), e);
            return;
        }
        Ok(None) => {
            println!("{} Connection closed by server", "✗".red());
            return;
        }
        Err(_) => {
            println!("{} Timeout waiting for response", "✗".red());
            return;
        }
    };

    println!("\nPress {} to start, then {} again for each next question.", "Enter".bold(), "Enter".bold());
    println!("Type {} to message the room, {} to quit.", "say <text>".cyan(), "quit".cyan());

    let mut started = false;
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            incoming = read.next() => {
                if !handle_incoming(incoming) {
                    break;
                }
            }
            line = stdin.next_line() => {
                let Ok(Some(line)) = line else { break };
                let line = line.trim();

                let outgoing = if line == "quit" {
                    break;
                } else if let Some(text) = line.strip_prefix("say ") {
                    json!({ "type": "host-message", "join_code": join_code, "text": text })
                } else if !started {
                    started = true;
                    json!({ "type": "start-game", "join_code": join_code })
                } else {
                    json!({ "type": "request-next-question", "join_code": join_code })
                };

                if write.send(Message::Text(outgoing.to_string())).await.is_err() {
                    println!("{} Connection lost", "✗".red());
                    break;
                }
            }
        }
    }

    println!("{}", "Disconnected. The room closes with the host.".yellow());
}

async fn play_game(server: &str, join_code: u32, username: &str, user_id: &str, avatar: Option<&str>) {
    println!("{}", "Joining room...".cyan());
    println!("  Join code: {}", join_code);
    println!("  Name: {}", username);

    let url = format!("ws://{}/game", server);
    let (ws_stream, _) = match connect_async(&url).await {
        Ok(connection) => connection,
        Err(e) => {
            println!("{} Cannot connect: {}", "✗".red(), e);
            return;
        }
    };
    let (mut write, mut read) = ws_stream.split();

    let join = json!({
        "type": "join-room",
        "join_code": join_code,
        "username": username,
        "user_id": user_id,
        "user_profile": avatar,
    });
    if write.send(Message::Text(join.to_string())).await.is_err() {
        println!("{} Failed to send join-room", "✗".red());
        return;
    }

    println!("Type an option number to answer, anything else to chat, {} to quit.", "quit".cyan());

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            incoming = read.next() => {
                if !handle_incoming(incoming) {
                    break;
                }
            }
            line = stdin.next_line() => {
                let Ok(Some(line)) = line else { break };
                let line = line.trim();
                if line == "quit" {
                    break;
                }
                if line.is_empty() {
                    continue;
                }

                let outgoing = match line.parse::<usize>() {
                    Ok(option_index) => json!({
                        "type": "submit-answer",
                        "join_code": join_code,
                        "option_index": option_index,
                    }),
                    Err(_) => json!({ "type": "host-message", "join_code": join_code, "text": line }),
                };

                if write.send(Message::Text(outgoing.to_string())).await.is_err() {
                    println!("{} Connection lost", "✗".red());
                    break;
                }
            }
        }
    }

    println!("{}", "Disconnected.".yellow());
}

/// Prints one frame from the server; false once the connection is done
fn handle_incoming(
    incoming: Option<Result<Message, tokio_tungstenite::tungstenite::Error>>,
) -> bool {
    match incoming {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<Value>(&text) {
            Ok(message) => {
                print_server_message(&message);
                message["type"] != "room-closed"
            }
            Err(_) => {
                println!("{} {}", "◀".green(), text.bright_white());
                true
            }
        },
        Some(Ok(Message::Close(_))) => {
            println!("{} Server closed the connection", "✗".yellow());
            false
        }
        // Binary, Ping, Pong, Frame
        Some(Ok(_)) => true,
        Some(Err(e)) => {
            println!("{} Connection error: {}", "✗".red(), e);
            false
        }
        None => {
            println!("{} Connection closed", "✗".yellow());
            false
        }
    }
}

fn print_server_message(message: &Value) {
    match message["type"].as_str() {
        Some("room-created") => {
            println!("{} Room {} created", "✓".green(), message["join_code"]);
        }
        Some("join-successful") => {
            println!("{} Joined room {}", "✓".green(), message["join_code"]);
            print_roster(&message["players"]);
        }
        Some("update-room-state") => {
            print_roster(&message["players"]);
        }
        Some("new-message") => {
            println!(
                "{} {}: {}",
                "💬".cyan(),
                message["from"].as_str().unwrap_or("?").bold(),
                message["text"].as_str().unwrap_or_default()
            );
        }
        Some("game-update") => print_view(&message["view"]),
        Some("error-message") => {
            println!("{} {}", "✗".red(), message["text"].as_str().unwrap_or("unknown error").red());
        }
        Some("room-closed") => {
            println!("{} Room closed: {}", "✗".yellow(), message["reason"].as_str().unwrap_or_default());
        }
        _ => println!("{} {}", "◀".green(), message),
    }
}

fn print_roster(players: &Value) {
    let Some(players) = players.as_array() else {
        return;
    };
    println!("{}", format!("Players ({}):", players.len()).bold());
    for player in players {
        let marker = if player["is_online"] == true { "●".green() } else { "○".red() };
        println!(
            "  {} {} [{}] {} pts",
            marker,
            player["display_name"].as_str().unwrap_or("?"),
            player["role"].as_str().unwrap_or("?"),
            player["score"]
        );
    }
}

fn print_view(view: &Value) {
    let state = view["state"].as_str().unwrap_or("?");
    let index = view["question_index"].as_u64().unwrap_or_default();
    let count = view["question_count"].as_u64().unwrap_or_default();

    match state {
        "question" => {
            let question = &view["question"];
            println!("\n{}", "─".repeat(50));
            println!(
                "{} {}/{} ({} pts, {}s)",
                "Question".bold(),
                index + 1,
                count,
                question["points"],
                question["time_limit_secs"]
            );
            println!("  {}", question["text"].as_str().unwrap_or_default().bold());
            if let Some(options) = question["options"].as_array() {
                for (i, option) in options.iter().enumerate() {
                    // hosts get objects, players get plain text
                    let text = option["text"].as_str().or(option.as_str()).unwrap_or("?");
                    println!("  [{}] {}", i.to_string().cyan(), text);
                }
            }
            println!("  Answered: {}", view["answered_count"]);
        }
        "results" => {
            let correct = view["correct_index"]
                .as_u64()
                .or(view["question"]["correct_index"].as_u64());
            match correct {
                Some(correct) => println!("{} Correct option: {}", "✓".green(), correct),
                None => println!("{}", "Round over".bold()),
            }
            if view["role"] == "player" {
                println!("  Your score: {}", view["your_score"].to_string().green());
            }
        }
        "end" => {
            println!("\n{}", "═".repeat(50).green());
            println!("{}", "Final standings".bold());
            if let Some(standings) = view["standings"].as_array() {
                for standing in standings {
                    println!(
                        "  #{} {} {} pts",
                        standing["rank"],
                        standing["display_name"].as_str().unwrap_or("?"),
                        standing["score"]
                    );
                }
            }
            println!("{}", "═".repeat(50).green());
        }
        _ => println!("{} {}", "State:".bold(), state),
    }
}
