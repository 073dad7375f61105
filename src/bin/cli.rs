// Pulse Server CLI Validation Tool
// Exercises a running server over its WebSocket protocol: room lifecycle,
// rating flows, and failure paths.

use clap::{Parser, Subcommand};
use colored::*;
use futures::{SinkExt, Stream, StreamExt};
use serde_json::json;
use std::io::{self, Write};
use tokio::time::{sleep, timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Parser)]
#[command(name = "pulse-cli")]
#[command(about = "Pulse Server CLI Validation Tool", long_about = None)]
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

    /// Test WebSocket connection
    Connect,

    /// Create a room and print its code
    CreateRoom {
        /// Stay connected and print live room updates (Ctrl+C to exit)
        #[arg(short, long)]
        keep_alive: bool,
    },

    /// Join a room as a participant
    JoinRoom {
        /// Room code to join
        #[arg(short, long)]
        code: String,

        /// Stay connected and print live room updates (Ctrl+C to exit)
        #[arg(short, long)]
        keep_alive: bool,
    },

    /// Join a room and submit a rating
    Rate {
        /// Room code to rate in
        #[arg(short, long)]
        code: String,

        /// Rating value (1-5)
        #[arg(short, long)]
        value: u8,
    },

    /// Run automated validation scenarios
    Validate {
        /// Run all validation tests
        #[arg(short, long)]
        all: bool,

        /// Test specific scenario
        #[arg(short, long)]
        scenario: Option<String>,
    },

    /// Interactive mode - send custom messages
    Interactive,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Health => {
            check_health(&cli.server).await;
        }
        Commands::Connect => {
            test_connection(&cli.server).await;
        }
        Commands::CreateRoom { keep_alive } => {
            create_room(&cli.server, *keep_alive).await;
        }
        Commands::JoinRoom { code, keep_alive } => {
            join_room(&cli.server, code, *keep_alive).await;
        }
        Commands::Rate { code, value } => {
            rate_room(&cli.server, code, *value).await;
        }
        Commands::Validate { all, scenario } => {
            if *all {
                run_all_validations(&cli.server).await;
            } else if let Some(s) = scenario {
                run_scenario(&cli.server, s).await;
            } else {
                println!("{}", "Use --all or --scenario <name>".yellow());
                list_scenarios();
            }
        }
        Commands::Interactive => {
            interactive_mode(&cli.server).await;
        }
    }
}

fn ws_url(server: &str) -> String {
    format!("ws://{}/ws", server)
}

async fn check_health(server: &str) {
    println!("{}", "Checking server health...".cyan());

    let url = format!("http://{}/health", server);
    let client = reqwest::Client::new();

    match client.get(&url).send().await {
        Ok(resp) => {
            let status = resp.status();
            if status.is_success() {
                println!("{} Health check passed", "✓".green());

                if let Ok(body) = resp.json::<serde_json::Value>().await {
                    println!("  Status: {}", body["status"].as_str().unwrap_or("unknown"));
                    println!("  Service: {}", body["service"].as_str().unwrap_or("unknown"));
                    println!("  Version: {}", body["version"].as_str().unwrap_or("unknown"));
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

async fn test_connection(server: &str) {
    println!("{}", "Testing WebSocket connection...".cyan());

    let url = ws_url(server);

    match connect_async(&url).await {
        Ok((ws_stream, _)) => {
            println!("{} WebSocket connection established", "✓".green());
            println!("  URL: {}", url);
            drop(ws_stream);
            println!("{} Connection closed cleanly", "✓".green());
        }
        Err(e) => {
            println!("{} WebSocket connection failed: {}", "✗".red(), e);
        }
    }
}

async fn create_room(server: &str, keep_alive: bool) {
    println!("{}", "Creating room...".cyan());

    let url = ws_url(server);

    match connect_async(&url).await {
        Ok((ws_stream, _)) => {
            let (mut write, mut read) = ws_stream.split();

            let msg = json!({ "type": "create_room" });
            if write.send(Message::Text(msg.to_string())).await.is_err() {
                println!("{} Failed to send create_room message", "✗".red());
                return;
            }

            let code = match timeout(Duration::from_secs(5), read.next()).await {
                Ok(Some(Ok(Message::Text(text)))) => {
                    match serde_json::from_str::<serde_json::Value>(&text) {
                        Ok(ack) if ack["ok"] == true => {
                            let code = ack["code"].as_str().unwrap_or("unknown").to_string();
                            println!("{} Room created!", "✓".green());
                            println!("\n{}", "═".repeat(50).green());
                            println!("{} {}", "Room code:".bold(), code.green().bold());
                            println!("{}", "═".repeat(50).green());
                            Some(code)
                        }
                        Ok(ack) => {
                            println!("{} Server refused: {}", "✗".red(), ack["error"]);
                            None
                        }
                        Err(_) => None,
                    }
                }
                _ => {
                    println!("{} No response from server", "✗".red());
                    None
                }
            };

            if code.is_some() && keep_alive {
                println!("\n{}", "Watching for room updates (Ctrl+C to exit)...".cyan());
                watch_room(&mut read).await;
            }
        }
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
        }
    }
}

async fn join_room(server: &str, code: &str, keep_alive: bool) {
    println!("{}", "Joining room...".cyan());
    println!("  Code: {}", code);

    let url = ws_url(server);

    match connect_async(&url).await {
        Ok((ws_stream, _)) => {
            let (mut write, mut read) = ws_stream.split();

            let msg = json!({ "type": "join_room", "code": code });
            if write.send(Message::Text(msg.to_string())).await.is_err() {
                println!("{} Failed to send join_room message", "✗".red());
                return;
            }

            // Expect the ack, then the private room_update snapshot
            let mut joined = false;
            for _ in 0..2 {
                match timeout(Duration::from_secs(5), read.next()).await {
                    Ok(Some(Ok(Message::Text(text)))) => {
                        let parsed = match serde_json::from_str::<serde_json::Value>(&text) {
                            Ok(parsed) => parsed,
                            Err(_) => continue,
                        };
                        if parsed["type"] == "room_update" {
                            print_room_update(&parsed);
                        } else if parsed["ok"] == true {
                            println!("{} Joined room {}", "✓".green(), parsed["code"]);
                            joined = true;
                        } else if parsed["ok"] == false {
                            println!("{} Join failed: {}", "✗".red(), parsed["error"]);
                            return;
                        }
                    }
                    _ => break,
                }
            }

            if joined && keep_alive {
                println!("\n{}", "Watching for room updates (Ctrl+C to exit)...".cyan());
                watch_room(&mut read).await;
            }
        }
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
        }
    }
}

async fn rate_room(server: &str, code: &str, value: u8) {
    println!("{}", "Submitting rating...".cyan());
    println!("  Code: {}  Value: {}", code, value);

    let url = ws_url(server);

    match connect_async(&url).await {
        Ok((ws_stream, _)) => {
            let (mut write, mut read) = ws_stream.split();

            // Join first so the broadcast with the new stats comes back here
            let msg = json!({ "type": "join_room", "code": code });
            if write.send(Message::Text(msg.to_string())).await.is_err() {
                println!("{} Failed to send join_room message", "✗".red());
                return;
            }

            match timeout(Duration::from_secs(5), read.next()).await {
                Ok(Some(Ok(Message::Text(text)))) => {
                    if let Ok(ack) = serde_json::from_str::<serde_json::Value>(&text) {
                        if ack["ok"] == false {
                            println!("{} Join failed: {}", "✗".red(), ack["error"]);
                            return;
                        }
                    }
                }
                _ => {
                    println!("{} No response from server", "✗".red());
                    return;
                }
            }
            // Skip the private join snapshot
            let _ = timeout(Duration::from_secs(2), read.next()).await;

            let msg = json!({ "type": "submit_rating", "code": code, "value": value });
            if write.send(Message::Text(msg.to_string())).await.is_err() {
                println!("{} Failed to send submit_rating message", "✗".red());
                return;
            }

            // Broadcast arrives first, then the ack
            for _ in 0..2 {
                match timeout(Duration::from_secs(5), read.next()).await {
                    Ok(Some(Ok(Message::Text(text)))) => {
                        let parsed = match serde_json::from_str::<serde_json::Value>(&text) {
                            Ok(parsed) => parsed,
                            Err(_) => continue,
                        };
                        if parsed["type"] == "room_update" {
                            println!("{} Rating recorded", "✓".green());
                            print_room_update(&parsed);
                        } else if parsed["ok"] == false {
                            println!("{} Rating rejected: {}", "✗".red(), parsed["error"]);
                            return;
                        }
                    }
                    _ => break,
                }
            }
        }
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
        }
    }
}

/// Print server pushes until the room ends or the stream closes.
async fn watch_room<S>(read: &mut S)
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(Ok(msg)) = read.next().await {
        if let Message::Text(text) = msg {
            match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(parsed) if parsed["type"] == "room_update" => print_room_update(&parsed),
                Ok(parsed) if parsed["type"] == "room_ended" => {
                    println!("{} Room {} ended by presenter", "●".yellow(), parsed["code"]);
                    break;
                }
                _ => println!("{} {}", "◀".green(), text),
            }
        }
    }
}

fn print_room_update(update: &serde_json::Value) {
    let count = update["count"].as_u64().unwrap_or(0);
    let avg = update["avg"].as_f64().unwrap_or(0.0);
    println!(
        "  {} votes: {}  avg: {}  distribution: {}",
        "↻".cyan(),
        count,
        format!("{:.2}", avg).bold(),
        update["distribution"]
    );
}

// ─── Validation scenarios ───────────────────────────────────────────────────

fn list_scenarios() {
    println!("\n{}", "Available scenarios:".bold());
    println!("  connection         - WebSocket connect/disconnect");
    println!("  create-room        - Room creation returns a 6-char code");
    println!("  join-room          - Participant join + private stats snapshot");
    println!("  rating-flow        - Rating broadcast, resubmit, clear, end");
    println!("  clear-forbidden    - Non-creator clear is rejected");
    println!("  invalid-room       - Join with a dead code fails cleanly");
    println!("  creator-disconnect - Creator drop ends the room for others");
}

async fn run_scenario(server: &str, scenario: &str) {
    let result = match scenario {
        "connection" => validate_connection(server).await,
        "create-room" => validate_create_room(server).await,
        "join-room" => validate_join_room(server).await,
        "rating-flow" => validate_rating_flow(server).await,
        "clear-forbidden" => validate_clear_forbidden(server).await,
        "invalid-room" => validate_invalid_room(server).await,
        "creator-disconnect" => validate_creator_disconnect(server).await,
        _ => {
            println!("{} Unknown scenario: {}", "✗".red(), scenario);
            list_scenarios();
            return;
        }
    };

    if result {
        println!("\n{} Scenario passed", "✓".green().bold());
    } else {
        println!("\n{} Scenario failed", "✗".red().bold());
    }
}

async fn run_all_validations(server: &str) {
    println!("\n{}", "Running All Validation Tests".bold().green());
    println!("{}\n", "═".repeat(60).green());

    let scenarios = vec![
        "connection",
        "create-room",
        "join-room",
        "rating-flow",
        "clear-forbidden",
        "invalid-room",
        "creator-disconnect",
    ];

    let mut passed = 0;
    let mut failed = 0;

    for scenario in scenarios {
        println!("\n{} Testing: {}", "▶".cyan(), scenario.bold());
        println!("{}", "─".repeat(60));

        let result = match scenario {
            "connection" => validate_connection(server).await,
            "create-room" => validate_create_room(server).await,
            "join-room" => validate_join_room(server).await,
            "rating-flow" => validate_rating_flow(server).await,
            "clear-forbidden" => validate_clear_forbidden(server).await,
            "invalid-room" => validate_invalid_room(server).await,
            "creator-disconnect" => validate_creator_disconnect(server).await,
            _ => false,
        };

        if result {
            passed += 1;
        } else {
            failed += 1;
        }

        sleep(Duration::from_millis(500)).await;
    }

    println!("\n{}", "═".repeat(60).green());
    println!("{}", "Validation Summary".bold());
    println!("{}", "═".repeat(60).green());
    println!("  {} Passed: {}", "✓".green(), passed.to_string().green());
    println!("  {} Failed: {}", "✗".red(), failed.to_string().red());
    println!("  Total: {}", passed + failed);

    if failed == 0 {
        println!("\n{}", "All validations passed! 🎉".green().bold());
    } else {
        println!("\n{}", "Some validations failed. Check output above.".yellow());
    }
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn open_socket(server: &str) -> Option<WsStream> {
    match connect_async(&ws_url(server)).await {
        Ok((ws_stream, _)) => Some(ws_stream),
        Err(e) => {
            println!("{} Connection failed: {}", "✗".red(), e);
            None
        }
    }
}

async fn next_text<S>(read: &mut S) -> Option<serde_json::Value>
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    match timeout(Duration::from_secs(3), read.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => serde_json::from_str(&text).ok(),
        _ => None,
    }
}

/// Create a room on a fresh socket; returns the code plus the still-open
/// creator stream halves.
async fn setup_room(
    server: &str,
) -> Option<(
    String,
    futures::stream::SplitSink<WsStream, Message>,
    futures::stream::SplitStream<WsStream>,
)> {
    let socket = open_socket(server).await?;
    let (mut write, mut read) = socket.split();

    let msg = json!({ "type": "create_room" });
    if write.send(Message::Text(msg.to_string())).await.is_err() {
        println!("{} Failed to send create_room", "✗".red());
        return None;
    }

    let ack = next_text(&mut read).await?;
    if ack["ok"] != true {
        println!("{} create_room refused: {}", "✗".red(), ack["error"]);
        return None;
    }

    let code = ack["code"].as_str()?.to_string();
    println!("  {} Room created: {}", "✓".green(), code);
    Some((code, write, read))
}

async fn validate_connection(server: &str) -> bool {
    match open_socket(server).await {
        Some(ws_stream) => {
            println!("{} WebSocket connection successful", "✓".green());
            drop(ws_stream);
            true
        }
        None => false,
    }
}

async fn validate_create_room(server: &str) -> bool {
    let Some((code, _write, _read)) = setup_room(server).await else {
        return false;
    };

    if code.len() == 6 {
        println!("{} Code has canonical shape", "✓".green());
        true
    } else {
        println!("{} Unexpected code shape: {}", "✗".red(), code);
        false
    }
}

async fn validate_join_room(server: &str) -> bool {
    let Some((code, _creator_write, _creator_read)) = setup_room(server).await else {
        return false;
    };

    let Some(socket) = open_socket(server).await else {
        return false;
    };
    let (mut write, mut read) = socket.split();

    let msg = json!({ "type": "join_room", "code": code });
    if write.send(Message::Text(msg.to_string())).await.is_err() {
        return false;
    }

    let Some(ack) = next_text(&mut read).await else {
        println!("{} No join ack", "✗".red());
        return false;
    };
    if ack["ok"] != true {
        println!("{} Join refused: {}", "✗".red(), ack["error"]);
        return false;
    }
    println!("  {} Joined", "✓".green());

    let Some(snapshot) = next_text(&mut read).await else {
        println!("{} No private stats snapshot", "✗".red());
        return false;
    };
    if snapshot["type"] == "room_update" && snapshot["count"] == 0 {
        println!("{} Private stats snapshot received", "✓".green());
        true
    } else {
        println!("{} Unexpected snapshot: {}", "✗".red(), snapshot);
        false
    }
}

async fn validate_rating_flow(server: &str) -> bool {
    let Some((code, mut creator_write, mut creator_read)) = setup_room(server).await else {
        return false;
    };

    let Some(socket) = open_socket(server).await else {
        return false;
    };
    let (mut write, mut read) = socket.split();

    let msg = json!({ "type": "join_room", "code": code });
    if write.send(Message::Text(msg.to_string())).await.is_err() {
        return false;
    }
    let _ = next_text(&mut read).await; // ack
    let _ = next_text(&mut read).await; // snapshot

    // Rate 4: everyone should see count=1 avg=4
    let msg = json!({ "type": "submit_rating", "code": code, "value": 4 });
    if write.send(Message::Text(msg.to_string())).await.is_err() {
        return false;
    }

    let Some(update) = next_text(&mut creator_read).await else {
        println!("{} Creator saw no broadcast", "✗".red());
        return false;
    };
    if update["count"] != 1 || update["avg"] != 4.0 {
        println!("{} Wrong stats after rating: {}", "✗".red(), update);
        return false;
    }
    println!("  {} Broadcast after rating: avg 4.00", "✓".green());
    let _ = next_text(&mut read).await; // participant's copy
    let _ = next_text(&mut read).await; // participant's ack

    // Resubmit 2: count stays 1, buckets shift
    let msg = json!({ "type": "submit_rating", "code": code, "value": 2 });
    if write.send(Message::Text(msg.to_string())).await.is_err() {
        return false;
    }

    let Some(update) = next_text(&mut creator_read).await else {
        return false;
    };
    if update["count"] != 1 || update["avg"] != 2.0 {
        println!("{} Resubmit did not upsert: {}", "✗".red(), update);
        return false;
    }
    println!("  {} Resubmit upserted: avg 2.00, count still 1", "✓".green());
    let _ = next_text(&mut read).await;
    let _ = next_text(&mut read).await;

    // Creator clears: zeroed stats broadcast
    let msg = json!({ "type": "clear_ratings", "code": code });
    if creator_write.send(Message::Text(msg.to_string())).await.is_err() {
        return false;
    }

    let Some(update) = next_text(&mut creator_read).await else {
        return false;
    };
    if update["count"] != 0 {
        println!("{} Clear did not zero stats: {}", "✗".red(), update);
        return false;
    }
    println!("  {} Clear zeroed the stats", "✓".green());
    let _ = next_text(&mut read).await;

    // Creator ends: participant gets room_ended
    let msg = json!({ "type": "end_room", "code": code });
    if creator_write.send(Message::Text(msg.to_string())).await.is_err() {
        return false;
    }

    let Some(ended) = next_text(&mut read).await else {
        println!("{} Participant saw no room_ended", "✗".red());
        return false;
    };
    if ended["type"] != "room_ended" {
        println!("{} Expected room_ended, got: {}", "✗".red(), ended);
        return false;
    }
    println!("  {} Terminal room_ended delivered", "✓".green());
    true
}

async fn validate_clear_forbidden(server: &str) -> bool {
    let Some((code, _creator_write, _creator_read)) = setup_room(server).await else {
        return false;
    };

    let Some(socket) = open_socket(server).await else {
        return false;
    };
    let (mut write, mut read) = socket.split();

    let msg = json!({ "type": "join_room", "code": code });
    if write.send(Message::Text(msg.to_string())).await.is_err() {
        return false;
    }
    let _ = next_text(&mut read).await;
    let _ = next_text(&mut read).await;

    let msg = json!({ "type": "clear_ratings", "code": code });
    if write.send(Message::Text(msg.to_string())).await.is_err() {
        return false;
    }

    let Some(ack) = next_text(&mut read).await else {
        return false;
    };
    if ack["ok"] == false && ack["error"] == "Only creator can clear" {
        println!("{} Non-creator clear rejected", "✓".green());
        true
    } else {
        println!("{} Expected rejection, got: {}", "✗".red(), ack);
        false
    }
}

async fn validate_invalid_room(server: &str) -> bool {
    let Some(socket) = open_socket(server).await else {
        return false;
    };
    let (mut write, mut read) = socket.split();

    let msg = json!({ "type": "join_room", "code": "QQQQQQ" });
    if write.send(Message::Text(msg.to_string())).await.is_err() {
        return false;
    }

    let Some(ack) = next_text(&mut read).await else {
        println!("{} No response for dead code", "✗".red());
        return false;
    };
    if ack["ok"] == false && ack["error"] == "Room not found" {
        println!("{} Dead code rejected cleanly", "✓".green());
        true
    } else {
        println!("{} Unexpected response: {}", "✗".red(), ack);
        false
    }
}

async fn validate_creator_disconnect(server: &str) -> bool {
    let Some((code, creator_write, creator_read)) = setup_room(server).await else {
        return false;
    };

    let Some(socket) = open_socket(server).await else {
        return false;
    };
    let (mut write, mut read) = socket.split();

    let msg = json!({ "type": "join_room", "code": code });
    if write.send(Message::Text(msg.to_string())).await.is_err() {
        return false;
    }
    let _ = next_text(&mut read).await;
    let _ = next_text(&mut read).await;

    // Drop the creator's socket without an explicit end_room
    drop(creator_write);
    drop(creator_read);

    let Some(ended) = next_text(&mut read).await else {
        println!("{} Participant never saw room_ended", "✗".red());
        return false;
    };
    if ended["type"] == "room_ended" && ended["code"] == code.as_str() {
        println!("{} Creator disconnect closed the room", "✓".green());
        true
    } else {
        println!("{} Unexpected message: {}", "✗".red(), ended);
        false
    }
}

// ─── Interactive mode ───────────────────────────────────────────────────────

async fn interactive_mode(server: &str) {
    println!("\n{}", "Interactive Mode".bold().green());
    println!("{}", "═".repeat(60).green());
    println!("Type {} for help, {} to quit\n", "help".cyan(), "quit".cyan());

    let Some(ws_stream) = open_socket(server).await else {
        return;
    };
    println!("{} Connected to server", "✓".green());

    let (mut write, mut read) = ws_stream.split();

    // Spawn task to receive messages
    let receive_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = read.next().await {
            if let Message::Text(text) = msg {
                println!("\n{} {}", "◀".green(), text.bright_white());
            }
        }
    });

    loop {
        print!("{} ", "►".cyan());
        io::stdout().flush().unwrap();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            break;
        }

        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input == "quit" || input == "exit" {
            println!("Goodbye!");
            break;
        }

        if input == "help" {
            print_interactive_help();
            continue;
        }

        if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(input) {
            if write.send(Message::Text(parsed.to_string())).await.is_ok() {
                println!("{} Message sent", "✓".green());
            } else {
                println!("{} Failed to send message", "✗".red());
                break;
            }
        } else {
            println!("{} Invalid JSON. Type 'help' for examples.", "✗".yellow());
        }
    }

    receive_task.abort();
}

fn print_interactive_help() {
    println!("\n{}", "Interactive Mode Commands".bold());
    println!("{}", "─".repeat(60));
    println!("Send JSON messages directly to the server.\n");

    println!("{}", "Example Messages:".bold());
    println!("\n{}:", "Create Room".cyan());
    println!(r#"  {{"type":"create_room"}}"#);

    println!("\n{}:", "Join Room".cyan());
    println!(r#"  {{"type":"join_room","code":"ABQRST"}}"#);

    println!("\n{}:", "Submit Rating".cyan());
    println!(r#"  {{"type":"submit_rating","code":"ABQRST","value":4}}"#);

    println!("\n{}:", "Clear Ratings".cyan());
    println!(r#"  {{"type":"clear_ratings","code":"ABQRST"}}"#);

    println!("\n{}:", "End Room".cyan());
    println!(r#"  {{"type":"end_room","code":"ABQRST"}}"#);

    println!("\n{}: quit, exit", "Commands".bold());
}
