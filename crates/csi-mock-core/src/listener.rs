//! Listener acquisition.
//!
//! Binds a resolved [`Endpoint`] and pairs the listener with a
//! [`SocketCleanup`] guard. For Unix sockets a stale file at the path is
//! removed before binding and the guard removes the file again when it runs
//! or is dropped, so the socket is cleaned up on every exit path. For TCP the
//! guard does nothing.

use std::borrow::Cow;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use tokio::net::{TcpListener, UnixListener};
use tracing::{debug, warn};

use crate::endpoint::{Endpoint, EndpointError, Transport};

/// Errors from acquiring a listener.
#[derive(Debug, thiserror::Error)]
pub enum ListenError {
    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error("{}: failed to remove stale socket: {source}", path.display())]
    RemoveStale { path: PathBuf, source: io::Error },

    #[error("failed to bind {address}: {source}")]
    Bind { address: String, source: io::Error },
}

/// Removes a Unix socket file exactly once.
#[derive(Debug, Default)]
pub struct SocketCleanup {
    path: Option<PathBuf>,
}

impl SocketCleanup {
    /// A guard that has nothing to remove.
    pub fn noop() -> Self {
        Self { path: None }
    }

    fn remove_file(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    /// Remove the socket file. Later calls do nothing; a file that is
    /// already gone is not an error.
    pub fn run(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "Removed socket file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove socket file"),
        }
    }
}

impl Drop for SocketCleanup {
    fn drop(&mut self) {
        self.run();
    }
}

/// An OS listener of either transport.
#[derive(Debug)]
pub enum Listener {
    Unix(UnixListener),
    Tcp(TcpListener),
}

/// Where a bound listener accepts connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalAddr {
    Unix(PathBuf),
    Tcp(SocketAddr),
}

impl fmt::Display for LocalAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalAddr::Unix(path) => write!(f, "unix://{}", path.display()),
            LocalAddr::Tcp(addr) => write!(f, "tcp://{addr}"),
        }
    }
}

/// A bound listener and the cleanup that belongs to it.
#[derive(Debug)]
pub struct BoundListener {
    listener: Listener,
    cleanup: SocketCleanup,
    local_addr: LocalAddr,
}

impl BoundListener {
    /// The address clients should connect to.
    pub fn local_addr(&self) -> &LocalAddr {
        &self.local_addr
    }

    /// Split into the listener to serve on and its cleanup guard.
    pub fn into_parts(self) -> (Listener, SocketCleanup) {
        (self.listener, self.cleanup)
    }
}

/// Map a Unix socket address onto an absolute path.
pub fn socket_path(address: &str) -> PathBuf {
    if address.starts_with('/') {
        PathBuf::from(address)
    } else {
        PathBuf::from(format!("/{address}"))
    }
}

/// Expand a host-less `:port` to every IPv4 interface.
pub fn tcp_bind_address(address: &str) -> Cow<'_, str> {
    if address.starts_with(':') {
        Cow::Owned(format!("0.0.0.0{address}"))
    } else {
        Cow::Borrowed(address)
    }
}

fn remove_stale(path: &Path) -> Result<(), ListenError> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Removed stale socket file");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ListenError::RemoveStale {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Bind a listener for `endpoint`.
pub async fn listen(endpoint: &Endpoint) -> Result<BoundListener, ListenError> {
    match endpoint.transport {
        Transport::Unix => {
            let path = socket_path(&endpoint.address);
            remove_stale(&path)?;
            let listener = UnixListener::bind(&path).map_err(|source| ListenError::Bind {
                address: path.display().to_string(),
                source,
            })?;
            Ok(BoundListener {
                listener: Listener::Unix(listener),
                cleanup: SocketCleanup::remove_file(path.clone()),
                local_addr: LocalAddr::Unix(path),
            })
        }
        Transport::Tcp => {
            let bind_err = |source| ListenError::Bind {
                address: endpoint.address.clone(),
                source,
            };
            let listener = TcpListener::bind(&*tcp_bind_address(&endpoint.address))
                .await
                .map_err(bind_err)?;
            let local = listener.local_addr().map_err(bind_err)?;
            Ok(BoundListener {
                listener: Listener::Tcp(listener),
                cleanup: SocketCleanup::noop(),
                local_addr: LocalAddr::Tcp(local),
            })
        }
    }
}

/// Resolve an endpoint string and bind it.
pub async fn listen_on(endpoint: &str) -> Result<BoundListener, ListenError> {
    listen(&Endpoint::parse(endpoint)?).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn unix_endpoint(path: &Path) -> Endpoint {
        Endpoint {
            transport: Transport::Unix,
            address: path.display().to_string(),
        }
    }

    #[test]
    fn test_socket_path_is_rooted() {
        assert_eq!(socket_path("/tmp/a.sock"), PathBuf::from("/tmp/a.sock"));
        assert_eq!(socket_path("tmp/a.sock"), PathBuf::from("/tmp/a.sock"));
    }

    #[tokio::test]
    async fn test_unix_listener_creates_and_cleans_socket() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("csi.sock");

        let bound = listen(&unix_endpoint(&path)).await.unwrap();
        assert_eq!(bound.local_addr(), &LocalAddr::Unix(path.clone()));
        assert!(path.exists());

        let (listener, mut cleanup) = bound.into_parts();
        drop(listener);
        cleanup.run();
        assert!(!path.exists());

        // Second run is a no-op.
        cleanup.run();
    }

    #[tokio::test]
    async fn test_stale_socket_is_replaced() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("stale.sock");

        // Leave a socket file behind without cleaning it up.
        let stale = std::os::unix::net::UnixListener::bind(&path).unwrap();
        drop(stale);
        assert!(path.exists());

        let bound = listen(&unix_endpoint(&path)).await.unwrap();
        assert!(path.exists());
        drop(bound);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_unremovable_path_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dir.sock");
        std::fs::create_dir(&path).unwrap();

        let err = listen(&unix_endpoint(&path)).await.unwrap_err();
        assert!(matches!(err, ListenError::RemoveStale { .. }));
        assert!(err.to_string().contains("dir.sock"));
        assert!(path.is_dir(), "a failed bind must not remove the directory");
    }

    #[tokio::test]
    async fn test_missing_parent_fails_bind() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing").join("csi.sock");

        let err = listen(&unix_endpoint(&path)).await.unwrap_err();
        assert!(matches!(err, ListenError::Bind { .. }));
    }

    #[tokio::test]
    async fn test_cleanup_tolerates_missing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gone.sock");

        let bound = listen(&unix_endpoint(&path)).await.unwrap();
        std::fs::remove_file(&path).unwrap();
        drop(bound);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_tcp_listener_reports_bound_port() {
        let bound = listen_on("tcp://127.0.0.1:0").await.unwrap();
        match bound.local_addr() {
            LocalAddr::Tcp(addr) => assert_ne!(addr.port(), 0),
            other => panic!("expected tcp address, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_tcp_empty_host_binds_all_interfaces() {
        assert_eq!(tcp_bind_address(":10000"), "0.0.0.0:10000");
        assert_eq!(tcp_bind_address("127.0.0.1:10000"), "127.0.0.1:10000");

        let bound = listen_on("tcp://:0").await.unwrap();
        match bound.local_addr() {
            LocalAddr::Tcp(addr) => {
                assert!(addr.ip().is_unspecified());
                assert_ne!(addr.port(), 0);
            }
            other => panic!("expected tcp address, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_tcp_port_in_use_fails() {
        let first = listen_on("tcp://127.0.0.1:0").await.unwrap();
        let LocalAddr::Tcp(addr) = first.local_addr().clone() else {
            panic!("expected tcp address");
        };

        let err = listen_on(&format!("tcp://{addr}")).await.unwrap_err();
        assert!(matches!(err, ListenError::Bind { .. }));
    }

    #[tokio::test]
    async fn test_invalid_endpoint_propagates() {
        let err = listen_on("tcp://").await.unwrap_err();
        assert!(matches!(err, ListenError::Endpoint(_)));
    }
}
