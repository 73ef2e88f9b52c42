//! RPC client: dials a member's endpoint and calls its role methods.
//!
//! Speaks the same HTTP/1.1 + JSON framing as the router, over a Unix
//! socket or TCP depending on the endpoint. One connection per call.

use hyper::body::Bytes;
use hyper_util::rt::TokioIo;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::net::{TcpStream, UnixStream};
use tracing::debug;

use crate::endpoint::{Endpoint, EndpointError, Transport};
use crate::listener::socket_path;
use crate::server::routes::paths;
use crate::service::RpcError;
use crate::service::types::*;

/// Errors from the RPC client.
#[derive(Debug, thiserror::Error)]
pub enum RpcClientError {
    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        source: std::io::Error,
    },

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to parse response: {0}")]
    Parse(String),

    /// The server answered with a status code.
    #[error("server returned {0}")]
    Status(#[from] RpcError),
}

/// Client for one member endpoint.
#[derive(Debug, Clone)]
pub struct RpcClient {
    endpoint: Endpoint,
    raw: String,
}

impl RpcClient {
    /// Target `endpoint`, in the same syntax the servers accept.
    pub fn new(endpoint: &str) -> Result<Self, RpcClientError> {
        Ok(Self {
            endpoint: Endpoint::parse(endpoint)?,
            raw: endpoint.to_string(),
        })
    }

    async fn request(&self, path: &str, body: Bytes) -> Result<Bytes, RpcClientError> {
        debug!(endpoint = %self.raw, path, "RPC request");
        match self.endpoint.transport {
            Transport::Unix => {
                let stream = UnixStream::connect(socket_path(&self.endpoint.address))
                    .await
                    .map_err(|source| self.connect_error(source))?;
                exchange(TokioIo::new(stream), path, body).await
            }
            Transport::Tcp => {
                let stream = TcpStream::connect(&self.endpoint.address)
                    .await
                    .map_err(|source| self.connect_error(source))?;
                exchange(TokioIo::new(stream), path, body).await
            }
        }
    }

    fn connect_error(&self, source: std::io::Error) -> RpcClientError {
        RpcClientError::Connect {
            endpoint: self.raw.clone(),
            source,
        }
    }

    /// Call a method that takes a request message.
    pub async fn call<Req, Resp>(&self, path: &str, req: &Req) -> Result<Resp, RpcClientError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let body = serde_json::to_vec(req)
            .map_err(|e| RpcClientError::Parse(format!("failed to serialize request: {e}")))?;
        let resp = self.request(path, Bytes::from(body)).await?;
        serde_json::from_slice(&resp).map_err(|e| RpcClientError::Parse(format!("{path}: {e}")))
    }

    /// Call a method with an empty request.
    pub async fn call_empty<Resp: DeserializeOwned>(&self, path: &str) -> Result<Resp, RpcClientError> {
        let resp = self.request(path, Bytes::new()).await?;
        serde_json::from_slice(&resp).map_err(|e| RpcClientError::Parse(format!("{path}: {e}")))
    }

    // ── Typed API methods ──────────────────────────────────────────────

    pub async fn get_plugin_info(&self) -> Result<GetPluginInfoResponse, RpcClientError> {
        self.call_empty(paths::GET_PLUGIN_INFO).await
    }

    pub async fn get_plugin_capabilities(
        &self,
    ) -> Result<GetPluginCapabilitiesResponse, RpcClientError> {
        self.call_empty(paths::GET_PLUGIN_CAPABILITIES).await
    }

    pub async fn probe(&self) -> Result<ProbeResponse, RpcClientError> {
        self.call_empty(paths::PROBE).await
    }

    pub async fn controller_get_capabilities(
        &self,
    ) -> Result<ControllerGetCapabilitiesResponse, RpcClientError> {
        self.call_empty(paths::CONTROLLER_GET_CAPABILITIES).await
    }

    pub async fn create_volume(
        &self,
        req: &CreateVolumeRequest,
    ) -> Result<CreateVolumeResponse, RpcClientError> {
        self.call(paths::CREATE_VOLUME, req).await
    }

    pub async fn delete_volume(
        &self,
        req: &DeleteVolumeRequest,
    ) -> Result<DeleteVolumeResponse, RpcClientError> {
        self.call(paths::DELETE_VOLUME, req).await
    }

    pub async fn list_volumes(&self) -> Result<ListVolumesResponse, RpcClientError> {
        self.call_empty(paths::LIST_VOLUMES).await
    }

    pub async fn controller_publish_volume(
        &self,
        req: &ControllerPublishVolumeRequest,
    ) -> Result<ControllerPublishVolumeResponse, RpcClientError> {
        self.call(paths::CONTROLLER_PUBLISH_VOLUME, req).await
    }

    pub async fn controller_unpublish_volume(
        &self,
        req: &ControllerUnpublishVolumeRequest,
    ) -> Result<ControllerUnpublishVolumeResponse, RpcClientError> {
        self.call(paths::CONTROLLER_UNPUBLISH_VOLUME, req).await
    }

    pub async fn controller_expand_volume(
        &self,
        req: &ControllerExpandVolumeRequest,
    ) -> Result<ControllerExpandVolumeResponse, RpcClientError> {
        self.call(paths::CONTROLLER_EXPAND_VOLUME, req).await
    }

    pub async fn node_get_capabilities(&self) -> Result<NodeGetCapabilitiesResponse, RpcClientError> {
        self.call_empty(paths::NODE_GET_CAPABILITIES).await
    }

    pub async fn node_get_info(&self) -> Result<NodeGetInfoResponse, RpcClientError> {
        self.call_empty(paths::NODE_GET_INFO).await
    }

    pub async fn node_publish_volume(
        &self,
        req: &NodePublishVolumeRequest,
    ) -> Result<NodePublishVolumeResponse, RpcClientError> {
        self.call(paths::NODE_PUBLISH_VOLUME, req).await
    }

    pub async fn node_unpublish_volume(
        &self,
        req: &NodeUnpublishVolumeRequest,
    ) -> Result<NodeUnpublishVolumeResponse, RpcClientError> {
        self.call(paths::NODE_UNPUBLISH_VOLUME, req).await
    }
}

/// One request/response exchange over an established stream.
async fn exchange<I>(io: I, path: &str, body: Bytes) -> Result<Bytes, RpcClientError>
where
    I: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake::<_, http_body_util::Full<Bytes>>(io)
        .await
        .map_err(|e| RpcClientError::Request(format!("HTTP handshake failed: {e}")))?;

    // Drive the connection in the background
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::warn!(error = %e, "RPC connection error");
        }
    });

    let mut builder = hyper::Request::builder()
        .method(hyper::Method::POST)
        .uri(path)
        .header("host", "localhost");
    if !body.is_empty() {
        builder = builder.header("content-type", "application/json");
    }
    let req = builder
        .body(http_body_util::Full::new(body))
        .map_err(|e| RpcClientError::Request(format!("failed to build request: {e}")))?;

    let resp = sender
        .send_request(req)
        .await
        .map_err(|e| RpcClientError::Request(format!("request failed: {e}")))?;
    let status = resp.status();
    let resp_body = http_body_util::BodyExt::collect(resp.into_body())
        .await
        .map_err(|e| RpcClientError::Request(format!("failed to read response body: {e}")))?
        .to_bytes();

    if !status.is_success() {
        if let Ok(err) = serde_json::from_slice::<RpcError>(&resp_body) {
            return Err(RpcClientError::Status(err));
        }
        return Err(RpcClientError::Request(format!("unexpected status: {status}")));
    }
    Ok(resp_body)
}
