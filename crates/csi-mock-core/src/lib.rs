#![deny(unsafe_code)]

//! Mock CSI driver runtime.
//!
//! Resolves the endpoints a driver process should serve, builds one server
//! (combined topology) or a controller/node pair (split topology) around a
//! shared in-memory [`MockService`], and runs them until the process is asked
//! to terminate.

/// Compile-time build metadata (version, git hash, profile).
pub mod build_info;
/// Typed client for the role methods.
pub mod client;
/// Endpoint string resolution (`unix://`, `tcp://`, bare paths).
pub mod endpoint;
/// Start/wait/stop orchestration and signal handling.
pub mod lifecycle;
/// Listener acquisition with stale-socket replacement and cleanup.
pub mod listener;
/// Protocol servers and their lifecycle.
pub mod server;
/// The in-memory mock service and its role traits.
pub mod service;
/// Combined-versus-split topology.
pub mod topology;

pub use client::{RpcClient, RpcClientError};
pub use endpoint::{Endpoint, EndpointError, Transport};
pub use lifecycle::{Coordinator, LifecycleError, ShutdownCause, ShutdownHandle};
pub use listener::{ListenError, listen, listen_on};
pub use server::{MemberState, Role, RoleHandlers, ServerError, ServerMember};
pub use service::{Code, MockService, RpcError};
pub use topology::{ServerGroup, Topology};
