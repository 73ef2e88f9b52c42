//! Process lifecycle: bring the server group up, wait for a termination
//! request, and bring it back down.

use std::io;
use std::sync::Arc;

use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio::sync::broadcast;
use tracing::{info, warn};

use csi_mock_config::EndpointSettings;

use crate::server::{ServerError, ServerMember};
use crate::service::MockService;
use crate::topology::{ServerGroup, Topology};

/// Shutdown request sent over the broadcast channel.
#[derive(Debug, Clone, Copy)]
pub struct ShutdownSignal;

/// What ended the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownCause {
    /// An OS signal, by name.
    Signal(&'static str),
    /// A [`ShutdownHandle::trigger`] call.
    Requested,
}

/// Cloneable trigger for a programmatic shutdown.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: broadcast::Sender<ShutdownSignal>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        let _ = self.tx.send(ShutdownSignal);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("unable to install {name} handler: {source}")]
    Signal {
        name: &'static str,
        source: io::Error,
    },
}

/// Handlers for the termination signals.
struct SignalStreams {
    term: Signal,
    hup: Signal,
    int: Signal,
    quit: Signal,
}

impl SignalStreams {
    fn install() -> Result<Self, LifecycleError> {
        let install = |kind: SignalKind, name: &'static str| {
            signal(kind).map_err(|source| LifecycleError::Signal { name, source })
        };
        Ok(Self {
            term: install(SignalKind::terminate(), "SIGTERM")?,
            hup: install(SignalKind::hangup(), "SIGHUP")?,
            int: install(SignalKind::interrupt(), "SIGINT")?,
            quit: install(SignalKind::quit(), "SIGQUIT")?,
        })
    }

    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.term.recv() => "SIGTERM",
            _ = self.hup.recv() => "SIGHUP",
            _ = self.int.recv() => "SIGINT",
            _ = self.quit.recv() => "SIGQUIT",
        }
    }
}

/// Owns the server group for the lifetime of the process.
pub struct Coordinator {
    topology: Topology,
    group: ServerGroup,
    shutdown_tx: broadcast::Sender<ShutdownSignal>,
    // Held from construction so a trigger before the wait is not lost.
    shutdown_rx: broadcast::Receiver<ShutdownSignal>,
    signals: Option<SignalStreams>,
}

impl Coordinator {
    pub fn new(settings: &EndpointSettings, service: Arc<MockService>) -> Self {
        let topology = Topology::from_settings(settings);
        let group = ServerGroup::build(&topology, &service, settings.enable_creds);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        Self {
            topology,
            group,
            shutdown_tx,
            shutdown_rx,
            signals: None,
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn members(&self) -> &[ServerMember] {
        self.group.members()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Start every member, controller before node in the split topology.
    /// Signal handlers go in first so a termination request that arrives
    /// while sockets are being bound still reaches [`wait_for_shutdown`].
    ///
    /// [`wait_for_shutdown`]: Coordinator::wait_for_shutdown
    pub async fn start(&mut self) -> Result<(), LifecycleError> {
        if self.signals.is_none() {
            self.signals = Some(SignalStreams::install()?);
        }
        self.group.start().await?;
        match &self.topology {
            Topology::Combined { endpoint } => {
                info!(endpoint = %endpoint, "Mock driver started");
            }
            Topology::Split {
                controller_endpoint,
                node_endpoint,
            } => {
                info!(
                    controller = %controller_endpoint,
                    node = %node_endpoint,
                    "Mock controller and node started"
                );
            }
        }
        Ok(())
    }

    /// Block until SIGTERM, SIGHUP, SIGINT or SIGQUIT arrives, or a
    /// [`ShutdownHandle`] fires.
    pub async fn wait_for_shutdown(&mut self) -> Result<ShutdownCause, LifecycleError> {
        let mut signals = match self.signals.take() {
            Some(signals) => signals,
            None => SignalStreams::install()?,
        };
        let cause = tokio::select! {
            name = signals.recv() => ShutdownCause::Signal(name),
            _ = self.shutdown_rx.recv() => ShutdownCause::Requested,
        };
        self.signals = Some(signals);
        info!(cause = ?cause, "Shutdown requested");
        Ok(cause)
    }

    /// Stop every serving member. Failures are logged and returned, never
    /// fatal.
    pub async fn stop(&mut self) -> Vec<ServerError> {
        let errors = self.group.stop().await;
        if errors.is_empty() {
            info!("Mock driver stopped");
        } else {
            warn!(failures = errors.len(), "Mock driver stopped with errors");
        }
        errors
    }

    /// Start, wait, stop. A start failure stops whatever did come up before
    /// returning the error.
    pub async fn run(&mut self) -> Result<ShutdownCause, LifecycleError> {
        if let Err(e) = self.start().await {
            self.stop().await;
            return Err(e);
        }
        let waited = self.wait_for_shutdown().await;
        self.stop().await;
        waited
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("topology", &self.topology)
            .field("group", &self.group)
            .field("signals_installed", &self.signals.is_some())
            .finish()
    }
}
