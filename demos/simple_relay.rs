//! Simple live-cast relay with a scripted caster
//!
//! Run with: cargo run --example simple_relay [LOGIN_ADDR] [CAST_ADDR]
//!
//! Examples:
//!   cargo run --example simple_relay                        # 0.0.0.0:7171 / 0.0.0.0:7173
//!   cargo run --example simple_relay localhost              # 127.0.0.1:7171 / 0.0.0.0:7173
//!   cargo run --example simple_relay 0.0.0.0:7180 0.0.0.0:7181
//!
//! The relay starts with one unprotected cast already running, owned by
//! the scripted player "Alice", which broadcasts a chat line every few
//! seconds. A game client can then:
//!
//!   - log in on the login port with account `demo` / password `demo`
//!     to see the character listing, or
//!   - log in with an empty account name to get the cast listing, and
//!   - connect to the cast port with cast name "Alice" to spectate.
//!
//! Handshake blocks are accepted as plaintext here; a real embedding
//! wires `decrypt_handshake` and the frame seal to its ciphers.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use livecast::protocol::frames;
use livecast::protocol::wire;
use livecast::server::{Account, CastServer, LoginProvider};
use livecast::session::{run_session_writer, SessionHandle};
use livecast::types::{BanInfo, GameState, PlayerDirectory, PlayerId};
use livecast::RelayConfig;

/// Two scripted players; only Alice ever casts
struct DemoWorld;

impl PlayerDirectory for DemoWorld {
    fn is_valid(&self, player: PlayerId) -> bool {
        matches!(player.raw(), 1 | 2)
    }

    fn name(&self, player: PlayerId) -> Option<String> {
        match player.raw() {
            1 => Some("Alice".to_string()),
            2 => Some("Bob".to_string()),
            _ => None,
        }
    }
}

/// Accepts the `demo`/`demo` account and nothing else
struct DemoGate;

impl LoginProvider for DemoGate {
    fn game_state(&self) -> GameState {
        GameState::Running
    }

    fn decrypt_handshake(&self, _block: &mut [u8]) -> bool {
        true
    }

    fn derive_token(&self, secret: &str, period_index: i64) -> String {
        format!("{}:{}", secret, period_index)
    }

    fn is_ip_banned(&self, _peer: IpAddr) -> impl Future<Output = Option<BanInfo>> + Send {
        async { None }
    }

    fn authenticate(
        &self,
        account_name: &str,
        password: &str,
    ) -> impl Future<Output = Option<Account>> + Send {
        let hit = account_name == "demo" && password == "demo";
        async move {
            hit.then(|| Account {
                secret: None,
                characters: vec!["Alice".to_string(), "Bob".to_string()],
            })
        }
    }
}

/// Parse a bind address from a command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:<default>
/// - "127.0.0.1" -> 127.0.0.1:<default>
/// - "127.0.0.1:7180" -> 127.0.0.1:7180
fn parse_bind_addr(arg: &str, default_port: u16) -> Result<SocketAddr, String> {
    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = normalized.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, default_port));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: simple_relay [LOGIN_ADDR] [CAST_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  LOGIN_ADDR   Login listener address (default: 0.0.0.0:7171)");
    eprintln!("  CAST_ADDR    Cast listener address (default: 0.0.0.0:7173)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let login_bind = match args.get(1) {
        Some(arg) => match parse_bind_addr(arg, 7171) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => SocketAddr::from(([0, 0, 0, 0], 7171)),
    };
    let cast_bind = match args.get(2) {
        Some(arg) => match parse_bind_addr(arg, 7173) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => SocketAddr::from(([0, 0, 0, 0], 7173)),
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("livecast=debug".parse()?)
                .add_directive("simple_relay=info".parse()?),
        )
        .init();

    let config = RelayConfig::with_addrs(login_bind, cast_bind)
        .server_name("Demo Realm")
        .motd("Welcome to the relay demo!", 1)
        .stats_interval(Duration::from_secs(30));

    println!("Starting live-cast relay");
    println!("  login port: {}", config.login_bind);
    println!("  cast port:  {}", config.cast_bind);
    println!();
    println!("=== Try it ===");
    println!("Account login:   account 'demo', password 'demo' on the login port");
    println!("Cast discovery:  empty account name on the login port");
    println!("Spectate:        cast name 'Alice', no password, on the cast port");
    println!();

    let (server, mut statements) = CastServer::new(config, DemoGate, Arc::new(DemoWorld));

    // A real embedding drains these into its database
    tokio::spawn(async move {
        while let Some(statement) = statements.recv().await {
            tracing::info!(statement, "Persistence");
        }
    });

    start_scripted_cast(&server).await;

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        println!("\nShutting down...");
    };
    if let Err(e) = server.run_until(shutdown).await {
        eprintln!("Relay error: {}", e);
    }

    Ok(())
}

/// Start Alice's cast on a loopback pipe and keep it chatting
///
/// The pipe stands in for the caster's game connection; its far end just
/// discards the mirrored frames.
async fn start_scripted_cast(server: &CastServer<DemoGate>) {
    let (caster_io, mut caster_peer) = tokio::io::duplex(64 * 1024);
    let (handle, commands) = SessionHandle::new(1, SocketAddr::from(([127, 0, 0, 1], 1)));
    tokio::spawn(run_session_writer(caster_io, commands));
    tokio::spawn(async move { while wire::read_frame(&mut caster_peer).await.is_ok() {} });

    let started = server
        .dispatcher()
        .call(move |hub| hub.start_cast(PlayerId(1), handle, String::new()))
        .await;
    match started {
        Ok(Ok(())) => println!("Scripted cast 'Alice' is live"),
        Ok(Err(e)) => eprintln!("Scripted cast refused: {}", e),
        Err(e) => eprintln!("Relay worker unavailable: {}", e),
    }

    let dispatcher = server.dispatcher().clone();
    tokio::spawn(async move {
        let mut beat = 0u64;
        let mut ticker = tokio::time::interval(Duration::from_secs(5));
        loop {
            ticker.tick().await;
            beat += 1;
            let line = frames::cast_channel_message("Alice", &format!("still casting ({})", beat));
            dispatcher.submit(move |hub| {
                hub.caster_write(PlayerId(1), line, true);
            });
        }
    });
}
