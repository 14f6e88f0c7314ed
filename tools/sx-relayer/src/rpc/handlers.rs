use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use sx_client::SxError;
use tracing::{debug, trace, warn, Instrument};

use super::types::{
    json_err, json_ok, ExecuteParams, ExecuteQueuedProposalParams, FinalizeProposalParams, Health, JsonRpcRequest,
    RpcErrorCode, SendParams,
};
use super::RpcState;
use crate::service::RelayError;
use crate::sponsor::SponsorError;

pub async fn handle_health(State(state): State<Arc<RpcState>>) -> impl IntoResponse {
    trace!("health check: ok");
    Json(Health {
        status: "healthy",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.started_at.clone(),
        chains: state.service.chain_ids(),
    })
}

pub async fn handle_rpc(State(state): State<Arc<RpcState>>, Path(chain_id): Path<String>, body: String) -> Response {
    let started = Instant::now();
    let Ok(chain_id) = chain_id.parse::<u64>() else {
        return Json(json_err(serde_json::Value::Null, RpcErrorCode::InvalidRequest, "chain id must be an integer"))
            .into_response();
    };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(&body) else {
        debug!(body_len = body.len(), "rpc parse error");
        return Json(json_err(serde_json::Value::Null, RpcErrorCode::ParseError, "parse error")).into_response();
    };

    let outcome = match serde_json::from_value::<JsonRpcRequest>(value) {
        Ok(req) => Json(handle_single(&state, chain_id, req).await).into_response(),
        Err(err) => Json(json_err(serde_json::Value::Null, RpcErrorCode::InvalidRequest, err.to_string())).into_response(),
    };
    debug!(chain_id, elapsed_ms = started.elapsed().as_millis(), "rpc handled");
    outcome
}

async fn handle_single(state: &RpcState, chain_id: u64, req: JsonRpcRequest) -> serde_json::Value {
    let span = tracing::info_span!("rpc_request", chain_id, method = %req.method, has_id = !req.id.is_null());
    dispatch(state, chain_id, req).instrument(span).await
}

async fn dispatch(state: &RpcState, chain_id: u64, req: JsonRpcRequest) -> serde_json::Value {
    let id = req.id.clone();
    if let Some(version) = req.jsonrpc.as_deref() {
        if version != "2.0" {
            return json_err(id, RpcErrorCode::InvalidRequest, "jsonrpc must be '2.0'");
        }
    }

    let service = &state.service;
    match req.method.as_str() {
        "send" => match params::<SendParams>(req.params) {
            Ok(p) => respond(id, service.send(chain_id, p.envelope).await),
            Err(message) => json_err(id, RpcErrorCode::InvalidParams, message),
        },
        "finalizeProposal" => match params::<FinalizeProposalParams>(req.params) {
            Ok(p) => respond(id, service.finalize_proposal(chain_id, p.space, p.proposal_id).await),
            Err(message) => json_err(id, RpcErrorCode::InvalidParams, message),
        },
        "execute" => match params::<ExecuteParams>(req.params) {
            Ok(p) => respond(id, service.execute(chain_id, p.space, p.proposal_id, &p.execution_params).await),
            Err(message) => json_err(id, RpcErrorCode::InvalidParams, message),
        },
        "executeQueuedProposal" => match params::<ExecuteQueuedProposalParams>(req.params) {
            Ok(p) => respond(
                id,
                service
                    .execute_queued_proposal(chain_id, p.space, p.execution_strategy, &p.execution_params)
                    .await,
            ),
            Err(message) => json_err(id, RpcErrorCode::InvalidParams, message),
        },
        _ => {
            debug!(method = %req.method, "rpc method not found");
            json_err(id, RpcErrorCode::MethodNotFound, "method not found")
        }
    }
}

fn params<T: DeserializeOwned>(raw: Option<serde_json::Value>) -> Result<T, String> {
    let raw = raw.ok_or_else(|| "missing params".to_string())?;
    serde_json::from_value(raw).map_err(|e| e.to_string())
}

fn respond<T: serde::Serialize>(id: serde_json::Value, outcome: Result<T, RelayError>) -> serde_json::Value {
    match outcome {
        Ok(result) => json_ok(id, result),
        Err(err) => {
            let code = error_code(&err);
            warn!(code = (code as i64), error = %err, "rpc request failed");
            json_err(id, code, err.to_string())
        }
    }
}

pub(crate) fn error_code(err: &RelayError) -> RpcErrorCode {
    match err {
        RelayError::InvalidParams(_) => RpcErrorCode::InvalidParams,
        RelayError::Sponsor(SponsorError::Rejected { .. }) => RpcErrorCode::SponsorshipRejected,
        RelayError::Sponsor(SponsorError::Unreachable(_)) => RpcErrorCode::InternalError,
        RelayError::Client(err) => match err {
            SxError::UnsupportedNetwork(_) => RpcErrorCode::UnsupportedNetwork,
            SxError::ExecutionReverted { .. } | SxError::ExecutionHashMismatch { .. } => {
                RpcErrorCode::ExecutionReverted
            }
            SxError::Configuration(_)
            | SxError::UnsupportedAddressSpace(_)
            | SxError::UnsupportedAuthenticator { .. }
            | SxError::InvalidMessage(_) => RpcErrorCode::InvalidParams,
            SxError::Transport(_) | SxError::RelayPending { .. } | SxError::Signing(_) => RpcErrorCode::InternalError,
        },
    }
}
