// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! L2VPN provisioning veneer: translates point-to-point service requests
//! between SDX port URNs and kytos EVC descriptions using the id maps
//! produced by conversion.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use serde_json::Value;

use crate::errors::SdxdError;
use crate::types::SdxdResult;
use crate::vlan::VlanSpec;

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct L2vpnEndpoint {
    pub port_id: String,
    pub vlan: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct L2vpnRequest {
    pub name: String,
    pub endpoints: Vec<L2vpnEndpoint>,
}

/// Build the mef_eline EVC creation body for a point-to-point request.
/// The configured prefix marks EVCs managed through this API.  Unknown
/// port URNs and malformed VLAN selectors are rejected here, never
/// forwarded to the controller.
pub fn build_evc(
    request: &L2vpnRequest,
    sdx2kytos: &BTreeMap<String, String>,
    name_prefix: &str,
) -> SdxdResult<Value> {
    if request.endpoints.len() != 2 {
        return Err(SdxdError::Invalid(format!(
            "an L2VPN requires exactly 2 endpoints, got {}",
            request.endpoints.len()
        )));
    }
    let mut unis = Vec::with_capacity(2);
    for (idx, endpoint) in request.endpoints.iter().enumerate() {
        let interface_id = sdx2kytos.get(&endpoint.port_id).ok_or_else(|| {
            SdxdError::Invalid(format!(
                "endpoints[{idx}].port_id: unknown port {}",
                endpoint.port_id
            ))
        })?;
        let selector = VlanSpec::parse(&endpoint.vlan).map_err(|e| {
            SdxdError::Invalid(format!("endpoints[{idx}].vlan: {e}"))
        })?;
        let mut uni = json!({ "interface_id": interface_id });
        if let Some(tag) = selector.to_tag() {
            uni["tag"] = tag;
        }
        unis.push(uni);
    }
    let uni_z = unis.pop().unwrap();
    let uni_a = unis.pop().unwrap();
    Ok(json!({
        "name": format!("{name_prefix}{}", request.name),
        "dynamic_backup_path": true,
        "uni_a": uni_a,
        "uni_z": uni_z,
    }))
}

/// Rewrite an EVC description for external consumption: interface ids
/// become SDX port URNs and the internal name prefix is stripped.
pub fn translate_evc(
    evc: &Value,
    kytos2sdx: &BTreeMap<String, String>,
    name_prefix: &str,
) -> Value {
    let mut out = evc.clone();
    if let Some(name) = out.get("name").and_then(Value::as_str) {
        if let Some(stripped) = name.strip_prefix(name_prefix) {
            out["name"] = Value::String(stripped.to_string());
        }
    }
    for uni in ["uni_a", "uni_z"] {
        let Some(id) = out
            .get(uni)
            .and_then(|u| u.get("interface_id"))
            .and_then(Value::as_str)
        else {
            continue;
        };
        if let Some(urn) = kytos2sdx.get(id) {
            out[uni]["interface_id"] = Value::String(urn.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "SDX-L2VPN-";

    fn maps() -> (BTreeMap<String, String>, BTreeMap<String, String>) {
        let kytos_a = "aa:00:00:00:00:00:00:01:1".to_string();
        let kytos_z = "aa:00:00:00:00:00:00:02:1".to_string();
        let sdx_a = "urn:sdx:port:ampath.net:Ampath1:1".to_string();
        let sdx_z = "urn:sdx:port:ampath.net:Ampath2:1".to_string();
        let kytos2sdx = BTreeMap::from([
            (kytos_a.clone(), sdx_a.clone()),
            (kytos_z.clone(), sdx_z.clone()),
        ]);
        let sdx2kytos =
            BTreeMap::from([(sdx_a, kytos_a), (sdx_z, kytos_z)]);
        (kytos2sdx, sdx2kytos)
    }

    fn request(vlan_a: &str, vlan_z: &str) -> L2vpnRequest {
        L2vpnRequest {
            name: "test-vpn".into(),
            endpoints: vec![
                L2vpnEndpoint {
                    port_id: "urn:sdx:port:ampath.net:Ampath1:1".into(),
                    vlan: vlan_a.into(),
                },
                L2vpnEndpoint {
                    port_id: "urn:sdx:port:ampath.net:Ampath2:1".into(),
                    vlan: vlan_z.into(),
                },
            ],
        }
    }

    #[test]
    fn test_build_with_tags() {
        let (_, sdx2kytos) = maps();
        let evc = build_evc(&request("300", "1:100"), &sdx2kytos, PREFIX).unwrap();
        assert_eq!(evc["name"], "SDX-L2VPN-test-vpn");
        assert_eq!(evc["dynamic_backup_path"], true);
        assert_eq!(evc["uni_a"]["interface_id"], "aa:00:00:00:00:00:00:01:1");
        assert_eq!(evc["uni_a"]["tag"]["value"], 300);
        assert_eq!(evc["uni_z"]["tag"]["value"], json!([[1, 100]]));
    }

    #[test]
    fn test_build_with_all_omits_tag() {
        let (_, sdx2kytos) = maps();
        let evc = build_evc(&request("all", "untagged"), &sdx2kytos, PREFIX).unwrap();
        assert!(evc["uni_a"].get("tag").is_none());
        assert_eq!(evc["uni_z"]["tag"]["value"], "untagged");
    }

    #[test]
    fn test_reject_unknown_port() {
        let (_, sdx2kytos) = maps();
        let mut req = request("all", "all");
        req.endpoints[1].port_id = "urn:sdx:port:ampath.net:Nope:9".into();
        let err = build_evc(&req, &sdx2kytos, PREFIX).unwrap_err();
        assert!(err.to_string().contains("endpoints[1].port_id"));
    }

    #[test]
    fn test_reject_bad_vlan() {
        let (_, sdx2kytos) = maps();
        let err = build_evc(&request("9999", "all"), &sdx2kytos, PREFIX).unwrap_err();
        assert!(err.to_string().contains("endpoints[0].vlan"));
    }

    #[test]
    fn test_reject_wrong_endpoint_count() {
        let (_, sdx2kytos) = maps();
        let mut req = request("all", "all");
        req.endpoints.pop();
        assert!(build_evc(&req, &sdx2kytos, PREFIX).is_err());
    }

    #[test]
    fn test_translate_back() {
        let (kytos2sdx, _) = maps();
        let evc = json!({
            "name": "SDX-L2VPN-test-vpn",
            "uni_a": { "interface_id": "aa:00:00:00:00:00:00:01:1" },
            "uni_z": { "interface_id": "aa:00:00:00:00:00:00:02:1" },
        });
        let out = translate_evc(&evc, &kytos2sdx, PREFIX);
        assert_eq!(out["name"], "test-vpn");
        assert_eq!(
            out["uni_a"]["interface_id"],
            "urn:sdx:port:ampath.net:Ampath1:1"
        );
        assert_eq!(
            out["uni_z"]["interface_id"],
            "urn:sdx:port:ampath.net:Ampath2:1"
        );
    }
}
