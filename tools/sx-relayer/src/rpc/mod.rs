//! JSON-RPC 2.0 surface: `POST /rpc/{chainId}` and `GET /health`.

pub mod handlers;
pub mod router;
pub mod types;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::service::RelayService;

pub use router::{build_router, run_json_rpc_server};

pub struct RpcState {
    pub service: RelayService,
    pub started_at: String,
}

impl RpcState {
    pub fn new(service: RelayService) -> Self {
        let started_at = OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
        RpcState { service, started_at }
    }
}
