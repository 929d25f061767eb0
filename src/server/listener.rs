//! Relay server listeners
//!
//! Two accept loops share one relay worker: the login listener answers
//! one request per connection (account login or cast discovery) and the
//! cast listener turns connections into attached spectators.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::config::RelayConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{Error, LoginError, Result};
use crate::hub::CastHub;
use crate::persist::PersistQueue;
use crate::protocol::{frames, join, login, wire};
use crate::protocol::{JoinFrame, SpectatorFrame};
use crate::server::handler::LoginProvider;
use crate::session::{run_session_writer, SessionHandle, SpectatorSession};
use crate::types::{GameState, PlayerDirectory, SymmetricKey};

/// Live-cast relay server
pub struct CastServer<P: LoginProvider> {
    config: Arc<RelayConfig>,
    provider: Arc<P>,
    dispatcher: Dispatcher<CastHub>,
    next_session_id: AtomicU64,
}

/// The two bound listener sockets
///
/// Produced by [`CastServer::bind`] so callers binding to ephemeral
/// ports can learn the real addresses before serving.
pub struct BoundListeners {
    login: TcpListener,
    cast: TcpListener,
}

impl BoundListeners {
    pub fn login_addr(&self) -> Result<SocketAddr> {
        Ok(self.login.local_addr()?)
    }

    pub fn cast_addr(&self) -> Result<SocketAddr> {
        Ok(self.cast.local_addr()?)
    }
}

impl<P: LoginProvider> CastServer<P> {
    /// Create the server and spawn its relay worker
    ///
    /// Must be called inside a tokio runtime. The returned receiver
    /// yields the persistence statements in order; the embedding server
    /// drains it into its database. Dropping it discards them silently.
    pub fn new(
        config: RelayConfig,
        provider: P,
        players: Arc<dyn PlayerDirectory>,
    ) -> (Self, mpsc::UnboundedReceiver<String>) {
        let config = Arc::new(config);
        let (persist, statements) = PersistQueue::new();
        persist.bootstrap_cleanup();

        let hub = CastHub::new(Arc::clone(&config), players, persist);
        let (dispatcher, _worker) = Dispatcher::spawn(hub);

        let server = Self {
            config,
            provider: Arc::new(provider),
            dispatcher,
            next_session_id: AtomicU64::new(1),
        };
        (server, statements)
    }

    /// The relay worker's dispatcher
    ///
    /// The embedding game server drives caster sessions through this:
    /// `start_cast` / `stop_cast` on cast commands, `caster_write` for
    /// every outbound game frame, `on_caster_packet` for every inbound
    /// one.
    pub fn dispatcher(&self) -> &Dispatcher<CastHub> {
        &self.dispatcher
    }

    /// Bind both listeners without serving yet
    pub async fn bind(&self) -> Result<BoundListeners> {
        let login = TcpListener::bind(self.config.login_bind).await?;
        let cast = TcpListener::bind(self.config.cast_bind).await?;
        tracing::info!(
            login = %login.local_addr()?,
            cast = %cast.local_addr()?,
            "Relay listening"
        );
        Ok(BoundListeners { login, cast })
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        let listeners = self.bind().await?;
        self.serve(listeners, std::future::pending::<()>()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listeners = self.bind().await?;
        self.serve(listeners, shutdown).await
    }

    /// Serve on already-bound listeners until `shutdown` resolves
    pub async fn serve<F>(&self, listeners: BoundListeners, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let reset_task = self.spawn_chat_reset_task();
        let stats_task = self.spawn_stats_task();

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_logins(&listeners.login) => result,
            result = self.accept_spectators(&listeners.cast) => result,
        };

        reset_task.abort();
        stats_task.abort();
        result
    }

    async fn accept_logins(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer)) => self.handle_login_connection(socket, peer),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept login connection");
                }
            }
        }
    }

    async fn accept_spectators(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer)) => self.handle_cast_connection(socket, peer),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept cast connection");
                }
            }
        }
    }

    fn handle_login_connection(&self, socket: TcpStream, peer: SocketAddr) {
        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(session_id, peer = %peer, "New login connection");

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let provider = Arc::clone(&self.provider);
        let config = Arc::clone(&self.config);
        let dispatcher = self.dispatcher.clone();

        tokio::spawn(async move {
            if let Err(e) = drive_login(provider, config, dispatcher, socket, peer).await {
                tracing::debug!(session_id, error = %e, "Login connection error");
            }
            tracing::debug!(session_id, "Login connection closed");
        });
    }

    fn handle_cast_connection(&self, socket: TcpStream, peer: SocketAddr) {
        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(session_id, peer = %peer, "New cast connection");

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let provider = Arc::clone(&self.provider);
        let config = Arc::clone(&self.config);
        let dispatcher = self.dispatcher.clone();

        tokio::spawn(async move {
            if let Err(e) =
                drive_spectator(provider, config, dispatcher, session_id, socket, peer).await
            {
                tracing::debug!(session_id, error = %e, "Cast connection error");
            }
            tracing::debug!(session_id, "Cast connection closed");
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }

    fn spawn_chat_reset_task(&self) -> tokio::task::JoinHandle<()> {
        let dispatcher = self.dispatcher.clone();
        let interval = self.config.chat_reset_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately
            loop {
                ticker.tick().await;
                dispatcher.submit(|hub| hub.reset_chat_windows());
            }
        })
    }

    fn spawn_stats_task(&self) -> tokio::task::JoinHandle<()> {
        let dispatcher = self.dispatcher.clone();
        let interval = self.config.stats_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match dispatcher.call(|hub| hub.snapshot_stats()).await {
                    Ok(stats) => {
                        tracing::info!(
                            active_casts = stats.active_casts,
                            active_spectators = stats.active_spectators,
                            frames_mirrored = stats.frames_mirrored,
                            chat_relayed = stats.chat_relayed,
                            chat_throttled = stats.chat_throttled,
                            "Relay stats"
                        );
                    }
                    Err(_) => break, // worker gone
                }
            }
        })
    }
}

/// Drive one login connection: one frame in, at most one frame out
async fn drive_login<P: LoginProvider>(
    provider: Arc<P>,
    config: Arc<RelayConfig>,
    dispatcher: Dispatcher<CastHub>,
    socket: TcpStream,
    peer: SocketAddr,
) -> Result<()> {
    let (mut reader, mut writer) = socket.into_split();

    let first = tokio::time::timeout(config.connection_timeout, wire::read_frame(&mut reader))
        .await
        .map_err(|_| Error::Timeout)??;

    let reply = login::handle_login(provider.as_ref(), &config, &dispatcher, peer, first).await;
    if let Some(reply) = reply {
        wire::write_frame(&mut writer, &reply).await?;
    }
    Ok(())
}

/// Drive one cast connection from handshake to leave
async fn drive_spectator<P: LoginProvider>(
    provider: Arc<P>,
    config: Arc<RelayConfig>,
    dispatcher: Dispatcher<CastHub>,
    session_id: u64,
    socket: TcpStream,
    peer: SocketAddr,
) -> Result<()> {
    if provider.game_state() == GameState::Shutdown {
        return Ok(());
    }

    let (mut reader, mut writer) = socket.into_split();

    let first = tokio::time::timeout(config.connection_timeout, wire::read_frame(&mut reader))
        .await
        .map_err(|_| Error::Timeout)??;

    let request = match join::parse_join_frame(provider.as_ref(), &config, first)? {
        JoinFrame::Reject { version } => {
            tracing::debug!(session_id, version, "Unsupported spectator version");
            let text = LoginError::VersionUnsupported(config.version_str.clone()).to_string();
            wire::write_frame(&mut writer, &frames::game_error(&text)).await?;
            return Ok(());
        }
        JoinFrame::Join(request) => request,
    };

    let (handle, commands) = SessionHandle::new(session_id, peer);

    // All traffic after the handshake is sealed under the session key,
    // including the join refusal below
    let key = request.key;
    let sealer = Arc::clone(&provider);
    handle.arm(Arc::new(move |payload: Bytes| sealer.seal_frame(&key, payload)));

    let writer_task = tokio::spawn(run_session_writer(writer, commands));

    let cast_name = request.cast_name;
    let password = request.password;
    let attach_handle = handle.clone();
    let joined = dispatcher
        .call(move |hub| hub.join_cast(&cast_name, &password, attach_handle))
        .await?;

    let spectator = match joined {
        Ok(spectator) => spectator,
        Err(err) => {
            tracing::debug!(session_id, peer = %peer, "Join refused: {}", err);
            handle.write(frames::game_error(&err.to_string()));
            handle.disconnect();
            let _ = writer_task.await;
            return Ok(());
        }
    };

    tracing::debug!(
        session_id,
        spectator = %spectator.assigned_name(),
        "Spectator attached"
    );

    let result =
        spectator_read_loop(provider.as_ref(), &dispatcher, &key, &spectator, &mut reader).await;

    let leaving = Arc::clone(&spectator);
    dispatcher.submit(move |hub| {
        hub.leave_cast(&leaving);
    });
    handle.disconnect();
    let _ = writer_task.await;
    result
}

/// Pump inbound spectator frames until logout, EOF or an error
async fn spectator_read_loop<P: LoginProvider>(
    provider: &P,
    dispatcher: &Dispatcher<CastHub>,
    key: &SymmetricKey,
    spectator: &Arc<SpectatorSession>,
    reader: &mut OwnedReadHalf,
) -> Result<()> {
    loop {
        let frame = match wire::read_frame(reader).await {
            Ok(frame) => frame,
            Err(Error::ConnectionClosed) => return Ok(()),
            Err(err) => return Err(err),
        };

        let payload = provider.open_frame(key, frame);
        match join::parse_spectator_frame(payload) {
            Ok(SpectatorFrame::Say(text)) => {
                let speaker = Arc::clone(spectator);
                dispatcher.submit(move |hub| {
                    hub.spectator_chat(&speaker, &text);
                });
            }
            Ok(SpectatorFrame::Logout) => return Ok(()),
            Ok(SpectatorFrame::Other(opcode)) => {
                tracing::trace!(opcode, "Ignoring spectator frame");
            }
            Err(err) => {
                tracing::debug!(error = %err, "Malformed spectator frame, detaching");
                return Ok(());
            }
        }
    }
}
