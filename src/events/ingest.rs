//! Datagram socket listener for hook-push events.
//!
//! One JSON event per datagram, no reply channel: oversized, malformed, or
//! invalid frames are dropped with a debug log line and nothing else.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::UnixDatagram;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Event, EventStore};

/// Maximum accepted datagram payload.
pub const MAX_DATAGRAM: usize = 8 * 1024;

/// Per-user socket path: `$XDG_RUNTIME_DIR/paneguard/events.sock`, falling
/// back to a uid-keyed directory under the OS temp dir when XDG is unset.
pub fn default_socket_path() -> PathBuf {
    let dir = match std::env::var_os("XDG_RUNTIME_DIR") {
        Some(runtime) => PathBuf::from(runtime).join("paneguard"),
        None => {
            let uid = unsafe { libc::getuid() };
            std::env::temp_dir().join(format!("paneguard-{}", uid))
        }
    };
    dir.join("events.sock")
}

pub struct EventListener {
    socket: UnixDatagram,
    store: Arc<EventStore>,
    path: PathBuf,
}

impl EventListener {
    /// Creates the socket directory (owner-only), removes any stale socket
    /// file, binds, and restricts the socket file to the owner.
    pub fn bind(path: &Path, store: Arc<EventStore>) -> Result<Self> {
        let dir = path
            .parent()
            .context("socket path has no parent directory")?;
        fs::create_dir_all(dir)
            .with_context(|| format!("create socket directory {}", dir.display()))?;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))
            .with_context(|| format!("restrict socket directory {}", dir.display()))?;

        if path.exists() {
            fs::remove_file(path)
                .with_context(|| format!("remove stale socket {}", path.display()))?;
        }

        let socket = UnixDatagram::bind(path)
            .with_context(|| format!("bind event socket {}", path.display()))?;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("restrict socket file {}", path.display()))?;

        info!(path = %path.display(), "event socket bound");
        Ok(Self {
            socket,
            store,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reader loop: one datagram per event, until cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        // One extra byte so a payload over the limit is distinguishable from
        // one that exactly fills it.
        let mut buf = vec![0u8; MAX_DATAGRAM + 1];
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("event listener cancelled");
                    break;
                }
                received = self.socket.recv(&mut buf) => {
                    match received {
                        Ok(len) => self.ingest_frame(&buf[..len]),
                        Err(e) => {
                            warn!("event socket receive failed: {}", e);
                            break;
                        }
                    }
                }
            }
        }
        let _ = fs::remove_file(&self.path);
    }

    fn ingest_frame(&self, frame: &[u8]) {
        if frame.len() > MAX_DATAGRAM {
            debug!(len = frame.len(), "dropping oversized event datagram");
            return;
        }
        let event: Event = match serde_json::from_slice(frame) {
            Ok(event) => event,
            Err(e) => {
                debug!("dropping malformed event datagram: {}", e);
                return;
            }
        };
        if let Err(e) = event.validate() {
            debug!("dropping invalid event: {}", e);
            return;
        }
        debug!(
            target = %event.target,
            assistant = %event.assistant,
            state = event.state.as_str(),
            "event accepted"
        );
        self.store.upsert(event);
    }
}
