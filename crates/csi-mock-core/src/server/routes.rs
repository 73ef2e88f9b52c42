//! axum router exposing the role methods as JSON over HTTP.
//!
//! Every RPC is a `POST` to `/csi.v1.<Service>/<Method>`. Only the roles a
//! member carries are routed; calls to a missing role get a 404 from the
//! router itself.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;

use super::RoleHandlers;
use super::credentials::{Credentials, SecretOp};
use crate::service::types::*;
use crate::service::{Code, Controller, Identity, Node, RpcError};

/// Route paths, shared with the client.
pub mod paths {
    pub const GET_PLUGIN_INFO: &str = "/csi.v1.Identity/GetPluginInfo";
    pub const GET_PLUGIN_CAPABILITIES: &str = "/csi.v1.Identity/GetPluginCapabilities";
    pub const PROBE: &str = "/csi.v1.Identity/Probe";

    pub const CONTROLLER_GET_CAPABILITIES: &str = "/csi.v1.Controller/ControllerGetCapabilities";
    pub const CREATE_VOLUME: &str = "/csi.v1.Controller/CreateVolume";
    pub const DELETE_VOLUME: &str = "/csi.v1.Controller/DeleteVolume";
    pub const LIST_VOLUMES: &str = "/csi.v1.Controller/ListVolumes";
    pub const CONTROLLER_PUBLISH_VOLUME: &str = "/csi.v1.Controller/ControllerPublishVolume";
    pub const CONTROLLER_UNPUBLISH_VOLUME: &str = "/csi.v1.Controller/ControllerUnpublishVolume";
    pub const CONTROLLER_EXPAND_VOLUME: &str = "/csi.v1.Controller/ControllerExpandVolume";

    pub const NODE_GET_CAPABILITIES: &str = "/csi.v1.Node/NodeGetCapabilities";
    pub const NODE_GET_INFO: &str = "/csi.v1.Node/NodeGetInfo";
    pub const NODE_PUBLISH_VOLUME: &str = "/csi.v1.Node/NodePublishVolume";
    pub const NODE_UNPUBLISH_VOLUME: &str = "/csi.v1.Node/NodeUnpublishVolume";
}

impl Code {
    fn status(self) -> StatusCode {
        match self {
            Code::InvalidArgument => StatusCode::BAD_REQUEST,
            Code::NotFound => StatusCode::NOT_FOUND,
            Code::AlreadyExists => StatusCode::CONFLICT,
            Code::FailedPrecondition => StatusCode::PRECONDITION_FAILED,
            Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
            Code::Unimplemented => StatusCode::NOT_IMPLEMENTED,
            Code::Unauthenticated => StatusCode::UNAUTHORIZED,
            Code::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

type RpcResult<T> = Result<Json<T>, RpcError>;

struct ControllerState {
    controller: Arc<dyn Controller>,
    credentials: Option<Arc<Credentials>>,
}

struct NodeState {
    node: Arc<dyn Node>,
    credentials: Option<Arc<Credentials>>,
}

fn authorize(
    credentials: &Option<Arc<Credentials>>,
    op: SecretOp,
    secrets: &Secrets,
) -> Result<(), RpcError> {
    match credentials {
        Some(creds) => creds.authorize(op, secrets),
        None => Ok(()),
    }
}

/// Build the router for the roles in `handlers`.
pub fn router(handlers: &RoleHandlers, credentials: Option<Arc<Credentials>>) -> axum::Router {
    let mut app = identity_router(Arc::clone(&handlers.identity));
    if let Some(controller) = &handlers.controller {
        app = app.merge(controller_router(Arc::new(ControllerState {
            controller: Arc::clone(controller),
            credentials: credentials.clone(),
        })));
    }
    if let Some(node) = &handlers.node {
        app = app.merge(node_router(Arc::new(NodeState {
            node: Arc::clone(node),
            credentials,
        })));
    }
    app
}

// ── Identity ────────────────────────────────────────────────────────────

fn identity_router(identity: Arc<dyn Identity>) -> axum::Router {
    axum::Router::new()
        .route(paths::GET_PLUGIN_INFO, post(get_plugin_info))
        .route(paths::GET_PLUGIN_CAPABILITIES, post(get_plugin_capabilities))
        .route(paths::PROBE, post(probe))
        .with_state(identity)
}

async fn get_plugin_info(State(identity): State<Arc<dyn Identity>>) -> RpcResult<GetPluginInfoResponse> {
    Ok(Json(identity.get_plugin_info()?))
}

async fn get_plugin_capabilities(
    State(identity): State<Arc<dyn Identity>>,
) -> RpcResult<GetPluginCapabilitiesResponse> {
    Ok(Json(identity.get_plugin_capabilities()?))
}

async fn probe(State(identity): State<Arc<dyn Identity>>) -> RpcResult<ProbeResponse> {
    Ok(Json(identity.probe()?))
}

// ── Controller ──────────────────────────────────────────────────────────

fn controller_router(state: Arc<ControllerState>) -> axum::Router {
    axum::Router::new()
        .route(paths::CONTROLLER_GET_CAPABILITIES, post(controller_get_capabilities))
        .route(paths::CREATE_VOLUME, post(create_volume))
        .route(paths::DELETE_VOLUME, post(delete_volume))
        .route(paths::LIST_VOLUMES, post(list_volumes))
        .route(paths::CONTROLLER_PUBLISH_VOLUME, post(controller_publish_volume))
        .route(paths::CONTROLLER_UNPUBLISH_VOLUME, post(controller_unpublish_volume))
        .route(paths::CONTROLLER_EXPAND_VOLUME, post(controller_expand_volume))
        .with_state(state)
}

async fn controller_get_capabilities(
    State(s): State<Arc<ControllerState>>,
) -> RpcResult<ControllerGetCapabilitiesResponse> {
    Ok(Json(s.controller.controller_get_capabilities()?))
}

async fn create_volume(
    State(s): State<Arc<ControllerState>>,
    Json(req): Json<CreateVolumeRequest>,
) -> RpcResult<CreateVolumeResponse> {
    authorize(&s.credentials, SecretOp::CreateVolume, &req.secrets)?;
    Ok(Json(s.controller.create_volume(req)?))
}

async fn delete_volume(
    State(s): State<Arc<ControllerState>>,
    Json(req): Json<DeleteVolumeRequest>,
) -> RpcResult<DeleteVolumeResponse> {
    authorize(&s.credentials, SecretOp::DeleteVolume, &req.secrets)?;
    Ok(Json(s.controller.delete_volume(req)?))
}

async fn list_volumes(State(s): State<Arc<ControllerState>>) -> RpcResult<ListVolumesResponse> {
    Ok(Json(s.controller.list_volumes()?))
}

async fn controller_publish_volume(
    State(s): State<Arc<ControllerState>>,
    Json(req): Json<ControllerPublishVolumeRequest>,
) -> RpcResult<ControllerPublishVolumeResponse> {
    authorize(&s.credentials, SecretOp::ControllerPublishVolume, &req.secrets)?;
    Ok(Json(s.controller.controller_publish_volume(req)?))
}

async fn controller_unpublish_volume(
    State(s): State<Arc<ControllerState>>,
    Json(req): Json<ControllerUnpublishVolumeRequest>,
) -> RpcResult<ControllerUnpublishVolumeResponse> {
    authorize(&s.credentials, SecretOp::ControllerUnpublishVolume, &req.secrets)?;
    Ok(Json(s.controller.controller_unpublish_volume(req)?))
}

async fn controller_expand_volume(
    State(s): State<Arc<ControllerState>>,
    Json(req): Json<ControllerExpandVolumeRequest>,
) -> RpcResult<ControllerExpandVolumeResponse> {
    authorize(&s.credentials, SecretOp::ControllerExpandVolume, &req.secrets)?;
    Ok(Json(s.controller.controller_expand_volume(req)?))
}

// ── Node ────────────────────────────────────────────────────────────────

fn node_router(state: Arc<NodeState>) -> axum::Router {
    axum::Router::new()
        .route(paths::NODE_GET_CAPABILITIES, post(node_get_capabilities))
        .route(paths::NODE_GET_INFO, post(node_get_info))
        .route(paths::NODE_PUBLISH_VOLUME, post(node_publish_volume))
        .route(paths::NODE_UNPUBLISH_VOLUME, post(node_unpublish_volume))
        .with_state(state)
}

async fn node_get_capabilities(
    State(s): State<Arc<NodeState>>,
) -> RpcResult<NodeGetCapabilitiesResponse> {
    Ok(Json(s.node.node_get_capabilities()?))
}

async fn node_get_info(State(s): State<Arc<NodeState>>) -> RpcResult<NodeGetInfoResponse> {
    Ok(Json(s.node.node_get_info()?))
}

async fn node_publish_volume(
    State(s): State<Arc<NodeState>>,
    Json(req): Json<NodePublishVolumeRequest>,
) -> RpcResult<NodePublishVolumeResponse> {
    authorize(&s.credentials, SecretOp::NodePublishVolume, &req.secrets)?;
    Ok(Json(s.node.node_publish_volume(req)?))
}

async fn node_unpublish_volume(
    State(s): State<Arc<NodeState>>,
    Json(req): Json<NodeUnpublishVolumeRequest>,
) -> RpcResult<NodeUnpublishVolumeResponse> {
    Ok(Json(s.node.node_unpublish_volume(req)?))
}
