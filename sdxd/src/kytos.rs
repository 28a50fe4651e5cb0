// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client for the kytos controller: topology snapshots, per-interface
//! VLAN tag ranges, and the mef_eline EVC API the L2VPN veneer forwards
//! to.  No retries anywhere; a timeout or error surfaces to the caller.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use slog::debug;
use slog::warn;

use crate::errors::SdxdError;
use crate::types::SdxdResult;
use crate::types::TopologySnapshot;
use crate::urn;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const EVC_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct TopologyResponse {
    topology: TopologySnapshot,
}

#[derive(Deserialize)]
struct TagRanges {
    tag_ranges: Vec<[u16; 2]>,
}

#[derive(Debug)]
pub struct KytosClient {
    log: slog::Logger,
    topology_url: String,
    tags_url: String,
    evc_url: String,
    client: reqwest::Client,
    evc_client: reqwest::Client,
}

impl KytosClient {
    pub fn new(
        log: &slog::Logger,
        topology_url: String,
        tags_url: String,
        evc_url: String,
    ) -> Self {
        KytosClient {
            log: log.new(slog::o!("unit" => "kytos-client")),
            topology_url,
            tags_url,
            evc_url,
            client: reqwest::Client::builder()
                .timeout(FETCH_TIMEOUT)
                .build()
                .expect("reqwest client construction cannot fail"),
            evc_client: reqwest::Client::builder()
                .timeout(EVC_TIMEOUT)
                .build()
                .expect("reqwest client construction cannot fail"),
        }
    }

    /// Fetch the live topology and merge in the per-interface VLAN tag
    /// ranges.  A failed tag-ranges fetch degrades to the bare snapshot.
    pub async fn fetch_topology(&self) -> SdxdResult<TopologySnapshot> {
        let response: TopologyResponse = self
            .client
            .get(&self.topology_url)
            .send()
            .await
            .map_err(|e| SdxdError::Upstream(e.to_string()))?
            .error_for_status()
            .map_err(|e| SdxdError::Upstream(e.to_string()))?
            .json()
            .await
            .map_err(|e| SdxdError::Upstream(e.to_string()))?;
        let mut topology = response.topology;

        let tags: BTreeMap<String, TagRanges> = match self
            .client
            .get(&self.tags_url)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                resp.json().await.unwrap_or_default()
            }
            Ok(resp) => {
                warn!(self.log, "tag_ranges fetch returned {}", resp.status());
                BTreeMap::new()
            }
            Err(e) => {
                warn!(self.log, "tag_ranges fetch failed: {e}");
                BTreeMap::new()
            }
        };
        for (intf_id, ranges) in tags {
            let sw_id = urn::switch_of_interface(&intf_id);
            if let Some(intf) = topology
                .switches
                .get_mut(sw_id)
                .and_then(|sw| sw.interfaces.get_mut(&intf_id))
            {
                intf.tag_ranges = ranges.tag_ranges;
            }
        }
        debug!(self.log, "fetched topology";
            "switches" => topology.switches.len(),
            "links" => topology.links.len());
        Ok(topology)
    }

    pub async fn create_evc(&self, evc: &Value) -> SdxdResult<Value> {
        let response = self
            .evc_client
            .post(&self.evc_url)
            .json(evc)
            .send()
            .await
            .map_err(|e| SdxdError::Upstream(format!("EVC create: {e}")))?;
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if status != reqwest::StatusCode::CREATED {
            return Err(SdxdError::Upstream(format!(
                "EVC create returned {status}: {body}"
            )));
        }
        Ok(body)
    }

    pub async fn list_evcs(&self) -> SdxdResult<Value> {
        self.evc_get(&self.evc_url).await
    }

    pub async fn get_evc(&self, evc_id: &str) -> SdxdResult<Value> {
        self.evc_get(&format!("{}{evc_id}", self.evc_url)).await
    }

    async fn evc_get(&self, url: &str) -> SdxdResult<Value> {
        self.evc_client
            .get(url)
            .send()
            .await
            .map_err(|e| SdxdError::Upstream(format!("EVC fetch: {e}")))?
            .error_for_status()
            .map_err(|e| SdxdError::Upstream(format!("EVC fetch: {e}")))?
            .json()
            .await
            .map_err(|e| SdxdError::Upstream(format!("EVC fetch: {e}")))
    }

    pub async fn update_evc(&self, evc_id: &str, patch: &Value) -> SdxdResult<Value> {
        let response = self
            .evc_client
            .patch(format!("{}{evc_id}", self.evc_url))
            .json(patch)
            .send()
            .await
            .map_err(|e| SdxdError::Upstream(format!("EVC update: {e}")))?;
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            return Err(SdxdError::Upstream(format!(
                "EVC update returned {status}: {body}"
            )));
        }
        Ok(body)
    }

    pub async fn delete_evc(&self, evc_id: &str) -> SdxdResult<Value> {
        let response = self
            .evc_client
            .delete(format!("{}{evc_id}", self.evc_url))
            .send()
            .await
            .map_err(|e| SdxdError::Upstream(format!("EVC delete: {e}")))?;
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            return Err(SdxdError::Upstream(format!(
                "EVC delete returned {status}: {body}"
            )));
        }
        Ok(body)
    }
}
