//! Session write plumbing
//!
//! Relay state never touches a socket. Every connection owns a writer
//! task fed over a command channel, and the relay only ever queues
//! payloads on that channel. Queued writes outlive the operation that
//! queued them; once a session is gone its channel is closed and
//! further writes are silently dropped.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::protocol::wire;

/// Transform applied to outbound payloads once the symmetric key is
/// established
pub type FrameSeal = Arc<dyn Fn(Bytes) -> Bytes + Send + Sync>;

/// Commands consumed by a session writer task
pub enum SessionCommand {
    /// Frame and send a payload
    Write(Bytes),
    /// Apply the seal to every subsequent payload
    Arm(FrameSeal),
    /// Stop writing and close the connection
    Disconnect,
}

impl std::fmt::Debug for SessionCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionCommand::Write(payload) => write!(f, "Write({} bytes)", payload.len()),
            SessionCommand::Arm(_) => write!(f, "Arm"),
            SessionCommand::Disconnect => write!(f, "Disconnect"),
        }
    }
}

/// Cloneable write capability for one connection
///
/// Everything the relay knows about a peer's output path: writes are
/// deferred onto the session's own writer task and can be issued from
/// any context without blocking.
#[derive(Clone)]
pub struct SessionHandle {
    id: u64,
    peer: SocketAddr,
    tx: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    /// Create a handle and the command stream its writer drains
    pub fn new(id: u64, peer: SocketAddr) -> (Self, mpsc::UnboundedReceiver<SessionCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { id, peer, tx }, rx)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Queue a payload; dropped if the session is gone
    pub fn write(&self, payload: Bytes) {
        let _ = self.tx.send(SessionCommand::Write(payload));
    }

    /// Install the frame seal for subsequent writes
    pub fn arm(&self, seal: FrameSeal) {
        let _ = self.tx.send(SessionCommand::Arm(seal));
    }

    /// Ask the writer to close the connection
    pub fn disconnect(&self) {
        let _ = self.tx.send(SessionCommand::Disconnect);
    }

    /// Whether the writer is still draining commands
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .finish()
    }
}

/// Drain a session's command queue into its socket
///
/// Returns when every handle is dropped, a disconnect is requested, or
/// the socket errors.
pub async fn run_session_writer<W>(
    mut sink: W,
    mut rx: mpsc::UnboundedReceiver<SessionCommand>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut seal: Option<FrameSeal> = None;

    while let Some(command) = rx.recv().await {
        match command {
            SessionCommand::Write(payload) => {
                let payload = match &seal {
                    Some(seal) => seal(payload),
                    None => payload,
                };
                wire::write_frame(&mut sink, &payload).await?;
            }
            SessionCommand::Arm(new_seal) => {
                seal = Some(new_seal);
            }
            SessionCommand::Disconnect => break,
        }
    }

    Ok(())
}
