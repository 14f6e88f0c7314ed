//! Sponsorship service client.
//!
//! A rejection is final: the relayer surfaces it to the caller and never retries.

use std::time::Duration;

use serde::Serialize;
use sx_types::NativeAddress;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SponsorError {
    #[error("sponsorship rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("sponsorship service unreachable: {0}")]
    Unreachable(String),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FeeData<'a> {
    max_fee_per_gas: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SponsorRequest<'a> {
    chain_id: u64,
    space: NativeAddress,
    proposal_id: u64,
    fee_data: FeeData<'a>,
}

#[derive(Clone)]
pub struct SponsorClient {
    url: String,
    max_fee_per_gas: String,
    http: reqwest::Client,
}

impl SponsorClient {
    pub fn new(url: impl Into<String>, max_fee_per_gas: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        SponsorClient { url: url.into(), max_fee_per_gas: max_fee_per_gas.into(), http }
    }

    /// Ask the service to sponsor finalization of a proposal; returns its acknowledgement.
    pub async fn finalize(&self, chain_id: u64, space: NativeAddress, proposal_id: u64) -> Result<String, SponsorError> {
        let request = SponsorRequest {
            chain_id,
            space,
            proposal_id,
            fee_data: FeeData { max_fee_per_gas: &self.max_fee_per_gas },
        };
        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| SponsorError::Unreachable(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| SponsorError::Unreachable(e.to_string()))?;
        if !status.is_success() {
            warn!(chain_id, %space, proposal_id, status = status.as_u16(), "sponsorship rejected");
            return Err(SponsorError::Rejected { status: status.as_u16(), body });
        }
        info!(chain_id, %space, proposal_id, "sponsorship accepted");
        Ok(body)
    }
}
