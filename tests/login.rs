//! Login listener behavior over real sockets
//!
//! Account logins, authenticator tokens, cast discovery and the
//! handshake timeout, each driven through a `CastServer` bound to
//! ephemeral ports.

use std::collections::HashMap;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use livecast::auth;
use livecast::protocol::constants::{
    HANDSHAKE_BLOCK_LEN, LOGIN_MOTD, LOGIN_SESSION_KEY, LOGIN_TOKEN_ERROR, LOGIN_TOKEN_OK,
    VERSION_EXTENDED_PREAMBLE,
};
use livecast::protocol::OutputMessage;
use livecast::server::{Account, CastServer, LoginProvider};
use livecast::session::{run_session_writer, SessionHandle};
use livecast::types::{BanInfo, GameState, PlayerDirectory, PlayerId};
use livecast::RelayConfig;

struct TestWorld;

impl PlayerDirectory for TestWorld {
    fn is_valid(&self, player: PlayerId) -> bool {
        player == PlayerId(1)
    }

    fn name(&self, player: PlayerId) -> Option<String> {
        (player == PlayerId(1)).then(|| "Alice".to_string())
    }
}

/// Accounts keyed by name: password plus the account payload
struct DirectoryProvider {
    accounts: Mutex<HashMap<String, (String, Account)>>,
}

impl DirectoryProvider {
    fn new() -> Self {
        let mut accounts = HashMap::new();
        accounts.insert(
            "plain".to_string(),
            (
                "letmein".to_string(),
                Account {
                    secret: None,
                    characters: vec!["Alice".to_string(), "Bob".to_string()],
                },
            ),
        );
        accounts.insert(
            "guarded".to_string(),
            (
                "letmein".to_string(),
                Account {
                    secret: Some("s3cret".to_string()),
                    characters: vec!["Carol".to_string()],
                },
            ),
        );
        Self {
            accounts: Mutex::new(accounts),
        }
    }
}

impl LoginProvider for DirectoryProvider {
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
        let hit = self
            .accounts
            .lock()
            .unwrap()
            .get(account_name)
            .filter(|(expected, _)| expected == password)
            .map(|(_, account)| account.clone());
        async move { hit }
    }
}

async fn spawn_login_server(config: RelayConfig) -> (Arc<CastServer<DirectoryProvider>>, SocketAddr) {
    let (server, _statements) = CastServer::new(config, DirectoryProvider::new(), Arc::new(TestWorld));
    let server = Arc::new(server);

    let listeners = server.bind().await.unwrap();
    let login_addr = listeners.login_addr().unwrap();

    let runner = Arc::clone(&server);
    tokio::spawn(async move {
        let _ = runner.serve(listeners, std::future::pending::<()>()).await;
    });

    (server, login_addr)
}

fn test_config() -> RelayConfig {
    RelayConfig::with_addrs(
        "127.0.0.1:0".parse().unwrap(),
        "127.0.0.1:0".parse().unwrap(),
    )
}

fn sealed_block(build: impl FnOnce(&mut OutputMessage)) -> Vec<u8> {
    let mut block = OutputMessage::new();
    build(&mut block);
    let mut raw = block.into_payload().to_vec();
    raw.resize(HANDSHAKE_BLOCK_LEN, 0);
    raw
}

fn login_payload(version: u16, account: &str, password: &str, token: Option<&str>) -> Vec<u8> {
    let mut msg = OutputMessage::new();
    msg.put_u16(0x0102); // operating system
    msg.put_u16(version);
    let preamble = if version >= VERSION_EXTENDED_PREAMBLE { 17 } else { 12 };
    msg.put_slice(&vec![0u8; preamble]);

    msg.put_slice(&sealed_block(|block| {
        block.put_u32(10);
        block.put_u32(20);
        block.put_u32(30);
        block.put_u32(40);
        block.put_string(account);
        block.put_string(password);
    }));

    if let Some(token) = token {
        msg.put_slice(&sealed_block(|block| {
            block.put_string(token);
        }));
    }

    msg.into_payload().to_vec()
}

async fn exchange(addr: SocketAddr, payload: &[u8]) -> Option<Vec<u8>> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(&(payload.len() as u16).to_le_bytes())
        .await
        .unwrap();
    stream.write_all(payload).await.unwrap();
    stream.flush().await.unwrap();

    let mut len = [0u8; 2];
    if stream.read_exact(&mut len).await.is_err() {
        return None;
    }
    let mut reply = vec![0u8; u16::from_le_bytes(len) as usize];
    stream.read_exact(&mut reply).await.unwrap();
    Some(reply)
}

fn reply_text(reply: &[u8]) -> String {
    let len = u16::from_le_bytes([reply[1], reply[2]]) as usize;
    String::from_utf8(reply[3..3 + len].to_vec()).unwrap()
}

#[tokio::test]
async fn test_account_login_returns_characters() {
    let (_server, addr) = spawn_login_server(test_config()).await;

    let reply = exchange(addr, &login_payload(1098, "plain", "letmein", Some("ignored")))
        .await
        .unwrap();

    // No secret on this account: the reply opens with the session key
    assert_eq!(reply[0], LOGIN_SESSION_KEY);
    assert!(reply.windows(13).any(|w| w == b"plain\nletmein"));
    assert!(reply.windows(5).any(|w| w == b"Alice"));
    assert!(reply.windows(3).any(|w| w == b"Bob"));
}

#[tokio::test]
async fn test_wrong_password_refused() {
    let (_server, addr) = spawn_login_server(test_config()).await;

    let reply = exchange(addr, &login_payload(1098, "plain", "wrong", Some("x")))
        .await
        .unwrap();

    assert_eq!(reply_text(&reply), "Account name or password is not correct.");
}

#[tokio::test]
async fn test_unsupported_version_refused() {
    let (_server, addr) = spawn_login_server(test_config()).await;

    let reply = exchange(addr, &login_payload(1099, "plain", "letmein", Some("x")))
        .await
        .unwrap();

    assert_eq!(
        reply_text(&reply),
        "Only clients with protocol 10.97 and 10.98 allowed!"
    );
}

#[tokio::test]
async fn test_authenticator_token_window() {
    let (_server, addr) = spawn_login_server(test_config()).await;
    let period = auth::current_period(RelayConfig::default().auth_token_period);

    // A valid token for the current period passes, and the reply leads
    // with the token status
    let token = format!("s3cret:{}", period);
    let reply = exchange(addr, &login_payload(1098, "guarded", "letmein", Some(&token)))
        .await
        .unwrap();
    assert_eq!(&reply[..2], &[LOGIN_TOKEN_OK, 0x00]);
    assert!(reply.windows(5).any(|w| w == b"Carol"));

    // The neighboring period also passes
    let token = format!("s3cret:{}", period + 1);
    let reply = exchange(addr, &login_payload(1098, "guarded", "letmein", Some(&token)))
        .await
        .unwrap();
    assert_eq!(&reply[..2], &[LOGIN_TOKEN_OK, 0x00]);

    // A stale token gets the two-byte rejection frame
    let token = format!("s3cret:{}", period - 5);
    let reply = exchange(addr, &login_payload(1098, "guarded", "letmein", Some(&token)))
        .await
        .unwrap();
    assert_eq!(reply, vec![LOGIN_TOKEN_ERROR, 0x00]);

    // A missing token block is a text refusal, not the status frame
    let reply = exchange(addr, &login_payload(1098, "guarded", "letmein", None))
        .await
        .unwrap();
    assert_eq!(reply_text(&reply), "Invalid authentication token.");
}

#[tokio::test]
async fn test_discovery_empty_listing_messages() {
    let (_server, addr) = spawn_login_server(test_config()).await;

    let reply = exchange(addr, &login_payload(1098, "", "", None)).await.unwrap();
    assert_eq!(reply_text(&reply), "No cast running right now.");

    let reply = exchange(addr, &login_payload(1098, "", "hunter2", None))
        .await
        .unwrap();
    assert_eq!(reply_text(&reply), "No cast running with this password.");
}

#[tokio::test]
async fn test_discovery_lists_cast_with_viewer_count() {
    let (server, addr) = spawn_login_server(test_config()).await;

    // Run a cast with one attached spectator, both backed by open pipes
    let (caster_io, _caster_peer) = tokio::io::duplex(4096);
    let (caster_handle, commands) = SessionHandle::new(900, "127.0.0.1:1".parse().unwrap());
    tokio::spawn(run_session_writer(caster_io, commands));

    let start_handle = caster_handle.clone();
    server
        .dispatcher()
        .call(move |hub| hub.start_cast(PlayerId(1), start_handle, String::new()))
        .await
        .unwrap()
        .unwrap();

    let (viewer_io, _viewer_peer) = tokio::io::duplex(4096);
    let (viewer_handle, commands) = SessionHandle::new(901, "127.0.0.1:2".parse().unwrap());
    tokio::spawn(run_session_writer(viewer_io, commands));
    server
        .dispatcher()
        .call(move |hub| hub.join_cast("Alice", "", viewer_handle).map(|_| ()))
        .await
        .unwrap()
        .unwrap();

    let reply = exchange(addr, &login_payload(1098, "", "", None)).await.unwrap();

    // Discovery always opens with the MOTD
    assert_eq!(reply[0], LOGIN_MOTD);
    assert!(reply.windows(9).any(|w| w == b"1 viewers"));
    assert!(reply.windows(5).any(|w| w == b"Alice"));
}

#[tokio::test]
async fn test_protected_casts_hidden_from_open_listing() {
    let (server, addr) = spawn_login_server(test_config()).await;

    let (caster_io, _caster_peer) = tokio::io::duplex(4096);
    let (caster_handle, commands) = SessionHandle::new(900, "127.0.0.1:1".parse().unwrap());
    tokio::spawn(run_session_writer(caster_io, commands));

    let start_handle = caster_handle.clone();
    server
        .dispatcher()
        .call(move |hub| hub.start_cast(PlayerId(1), start_handle, "hunter2".to_string()))
        .await
        .unwrap()
        .unwrap();

    // Not in the open listing
    let reply = exchange(addr, &login_payload(1098, "", "", None)).await.unwrap();
    assert_eq!(reply_text(&reply), "No cast running right now.");

    // Visible with the matching filter
    let reply = exchange(addr, &login_payload(1098, "", "hunter2", None))
        .await
        .unwrap();
    assert_eq!(reply[0], LOGIN_MOTD);
    assert!(reply.windows(5).any(|w| w == b"Alice"));

    // Hidden behind a wrong filter
    let reply = exchange(addr, &login_payload(1098, "", "wrong", None))
        .await
        .unwrap();
    assert_eq!(reply_text(&reply), "No cast running with this password.");
}

#[tokio::test]
async fn test_handshake_timeout_closes_connection() {
    let config = test_config().connection_timeout(Duration::from_millis(200));
    let (_server, addr) = spawn_login_server(config).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();

    // Send nothing; the server must give up on its own
    let mut buf = [0u8; 1];
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
        .await
        .expect("server did not close the idle connection");
    assert_eq!(read.unwrap(), 0);
}

#[tokio::test]
async fn test_sealed_discovery_reply() {
    struct XorDirectory(DirectoryProvider);

    impl LoginProvider for XorDirectory {
        fn game_state(&self) -> GameState {
            self.0.game_state()
        }

        fn decrypt_handshake(&self, block: &mut [u8]) -> bool {
            self.0.decrypt_handshake(block)
        }

        fn derive_token(&self, secret: &str, period_index: i64) -> String {
            self.0.derive_token(secret, period_index)
        }

        fn is_ip_banned(&self, peer: IpAddr) -> impl Future<Output = Option<BanInfo>> + Send {
            self.0.is_ip_banned(peer)
        }

        fn authenticate(
            &self,
            account_name: &str,
            password: &str,
        ) -> impl Future<Output = Option<Account>> + Send {
            self.0.authenticate(account_name, password)
        }

        fn seal_frame(&self, _key: &livecast::SymmetricKey, payload: Bytes) -> Bytes {
            payload.iter().map(|b| b ^ 0x33).collect::<Vec<u8>>().into()
        }
    }

    let (server, _statements) = CastServer::new(
        test_config(),
        XorDirectory(DirectoryProvider::new()),
        Arc::new(TestWorld),
    );
    let server = Arc::new(server);
    let listeners = server.bind().await.unwrap();
    let addr = listeners.login_addr().unwrap();
    let runner = Arc::clone(&server);
    tokio::spawn(async move {
        let _ = runner.serve(listeners, std::future::pending::<()>()).await;
    });

    let sealed = exchange(addr, &login_payload(1098, "", "", None)).await.unwrap();
    let opened: Vec<u8> = sealed.iter().map(|b| b ^ 0x33).collect();
    assert_eq!(reply_text(&opened), "No cast running right now.");
}
