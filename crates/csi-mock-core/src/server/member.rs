//! A single server bound to one listener.
//!
//! Lifecycle: `Constructed → Listening → Serving → Stopping → Stopped`.
//! Each step is driven by one method ([`listen`], [`start`], [`stop`]) and
//! none may be skipped or repeated.
//!
//! [`listen`]: ServerMember::listen
//! [`start`]: ServerMember::start
//! [`stop`]: ServerMember::stop

use std::io;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::credentials::Credentials;
use super::routes;
use super::{Role, RoleHandlers, ServerError};
use crate::listener::{self, BoundListener, Listener, LocalAddr, SocketCleanup};

/// Where a member is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberState {
    Constructed,
    Listening,
    Serving,
    Stopping,
    Stopped,
}

struct Running {
    /// Dropping the sender also triggers graceful shutdown.
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<io::Result<()>>,
    cleanup: SocketCleanup,
}

/// One protocol server of the group.
pub struct ServerMember {
    name: String,
    endpoint: String,
    handlers: RoleHandlers,
    credentials: Option<Arc<Credentials>>,
    state: MemberState,
    bound: Option<BoundListener>,
    running: Option<Running>,
    local_addr: Option<LocalAddr>,
}

impl ServerMember {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>, handlers: RoleHandlers) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            handlers,
            credentials: None,
            state: MemberState::Constructed,
            bound: None,
            running: None,
            local_addr: None,
        }
    }

    /// Require the default credential set on calls that carry secrets.
    pub fn set_default_creds(&mut self) {
        self.credentials = Some(Arc::new(Credentials::defaults()));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The endpoint string this member binds.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn roles(&self) -> Vec<Role> {
        self.handlers.roles()
    }

    pub fn state(&self) -> MemberState {
        self.state
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// The bound address, once listening.
    pub fn local_addr(&self) -> Option<&LocalAddr> {
        self.local_addr.as_ref()
    }

    fn expect_state(&self, expected: MemberState, action: &'static str) -> Result<(), ServerError> {
        if self.state != expected {
            return Err(ServerError::InvalidTransition {
                member: self.name.clone(),
                action,
                state: self.state,
            });
        }
        Ok(())
    }

    /// Acquire the listener for this member's endpoint.
    pub async fn listen(&mut self) -> Result<(), ServerError> {
        self.expect_state(MemberState::Constructed, "listen")?;
        let bound = listener::listen_on(&self.endpoint)
            .await
            .map_err(|source| ServerError::Listen {
                endpoint: self.endpoint.clone(),
                source,
            })?;
        debug!(member = %self.name, addr = %bound.local_addr(), "Listener bound");
        self.local_addr = Some(bound.local_addr().clone());
        self.bound = Some(bound);
        self.state = MemberState::Listening;
        Ok(())
    }

    /// Begin accepting connections on the bound listener.
    pub async fn start(&mut self) -> Result<(), ServerError> {
        self.expect_state(MemberState::Listening, "start")?;
        let Some(bound) = self.bound.take() else {
            return Err(ServerError::Start {
                member: self.name.clone(),
                reason: "no listener bound".to_string(),
            });
        };
        let (listener, cleanup) = bound.into_parts();
        let app = routes::router(&self.handlers, self.credentials.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let shutdown = async move {
            let _ = shutdown_rx.await;
        };
        let task = match listener {
            Listener::Unix(l) => tokio::spawn(async move {
                axum::serve(l, app).with_graceful_shutdown(shutdown).await
            }),
            Listener::Tcp(l) => tokio::spawn(async move {
                axum::serve(l, app).with_graceful_shutdown(shutdown).await
            }),
        };

        // Catch a server that fails on its first poll.
        tokio::task::yield_now().await;
        if task.is_finished() {
            let reason = match task.await {
                Ok(Ok(())) => "server exited immediately".to_string(),
                Ok(Err(e)) => e.to_string(),
                Err(e) => e.to_string(),
            };
            drop(cleanup);
            return Err(ServerError::Start {
                member: self.name.clone(),
                reason,
            });
        }

        self.running = Some(Running {
            shutdown_tx,
            task,
            cleanup,
        });
        self.state = MemberState::Serving;
        info!(
            member = %self.name,
            roles = ?self.roles(),
            addr = %self.local_addr.as_ref().map(ToString::to_string).unwrap_or_default(),
            "Server started"
        );
        Ok(())
    }

    /// Stop accepting, wait for in-flight calls to finish, and release the
    /// listener. The socket file is removed even if the server errored.
    pub async fn stop(&mut self) -> Result<(), ServerError> {
        self.expect_state(MemberState::Serving, "stop")?;
        self.state = MemberState::Stopping;

        let outcome = match self.running.take() {
            Some(Running {
                shutdown_tx,
                task,
                mut cleanup,
            }) => {
                let _ = shutdown_tx.send(());
                let joined = task.await;
                cleanup.run();
                match joined {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(e) => Err(e.to_string()),
                }
            }
            None => Ok(()),
        };

        self.state = MemberState::Stopped;
        match outcome {
            Ok(()) => {
                info!(member = %self.name, "Server stopped");
                Ok(())
            }
            Err(reason) => Err(ServerError::Stop {
                member: self.name.clone(),
                reason,
            }),
        }
    }
}

impl std::fmt::Debug for ServerMember {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerMember")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("roles", &self.roles())
            .field("state", &self.state)
            .field("credentials", &self.credentials.is_some())
            .finish()
    }
}
