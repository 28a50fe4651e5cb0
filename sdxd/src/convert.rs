// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The schema converter: a pure mapping from the mirrored topology to the
//! SDX exchange document, together with the bidirectional port-id
//! translation tables the L2VPN veneer consumes.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::errors::SdxdError;
use crate::mirror::Mirror;
use crate::types::Interface;
use crate::types::Metadata;
use crate::types::SdxdResult;
use crate::types::VIRTUAL_PORT_NUMBER;
use crate::urn;

/// Everything the converter needs to know about the local domain.
#[derive(Clone, Debug)]
pub struct ConvertSettings {
    pub oxp_name: String,
    pub oxp_url: String,
    pub model_version: String,
    pub export_switches: bool,
    pub export_interfaces: bool,
    pub export_links: bool,
    pub override_vlan_range: Option<Vec<[u16; 2]>>,
}

/// The document POSTed to the SDX-LC and served over the API.
#[derive(
    Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq,
)]
pub struct TopologyDocument {
    pub id: String,
    pub name: String,
    pub version: u64,
    pub model_version: String,
    pub timestamp: String,
    pub nodes: Vec<Node>,
    pub links: Vec<SdxLink>,
    pub services: Vec<String>,
}

#[derive(
    Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq,
)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub location: Location,
    pub ports: Vec<Port>,
    pub status: String,
    pub state: String,
}

/// Location fields default to empty strings, never null; downstream
/// schema validators reject missing keys.
#[derive(
    Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq,
)]
pub struct Location {
    pub address: String,
    pub latitude: Value,
    pub longitude: Value,
    pub iso3166_2_lvl4: String,
}

#[derive(
    Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq,
)]
pub struct Port {
    pub id: String,
    pub name: String,
    pub node: String,
    #[serde(rename = "type")]
    pub port_type: String,
    pub status: String,
    pub state: String,
    pub mtu: u64,
    pub nni: String,
    pub services: PortServices,
}

#[derive(
    Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq,
)]
pub struct PortServices {
    #[serde(rename = "l2vpn-ptp")]
    pub l2vpn_ptp: L2vpnPtp,
}

#[derive(
    Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq,
)]
pub struct L2vpnPtp {
    pub vlan_range: Vec<[u16; 2]>,
}

#[derive(
    Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq,
)]
pub struct SdxLink {
    pub id: String,
    pub name: String,
    pub ports: Vec<String>,
    #[serde(rename = "type")]
    pub link_type: String,
    pub bandwidth: f64,
    pub residual_bandwidth: f64,
    pub latency: f64,
    pub packet_loss: f64,
    pub availability: f64,
    pub status: String,
    pub state: String,
}

/// A conversion result: the document plus the id maps.  The maps are an
/// explicit output here, not a mutation of converter input.
#[derive(Clone, Debug)]
pub struct Conversion {
    pub document: TopologyDocument,
    pub kytos2sdx: BTreeMap<String, String>,
    pub sdx2kytos: BTreeMap<String, String>,
}

fn metadata_str<'a>(md: &'a Metadata, key: &str) -> Option<&'a str> {
    md.get(key).and_then(|v| v.as_str())
}

fn metadata_f64(md: &Metadata, key: &str, default: f64) -> f64 {
    md.get(key).and_then(|v| v.as_f64()).unwrap_or(default)
}

fn build_location(md: &Metadata) -> Location {
    Location {
        address: metadata_str(md, "address").unwrap_or("").to_string(),
        latitude: md.get("lat").cloned().unwrap_or(Value::String(String::new())),
        longitude: md
            .get("lng")
            .cloned()
            .unwrap_or(Value::String(String::new())),
        iso3166_2_lvl4: metadata_str(md, "iso3166_2_lvl4")
            .unwrap_or("")
            .to_string(),
    }
}

fn build_port(
    node_name: &str,
    intf: &Interface,
    settings: &ConvertSettings,
) -> SdxdResult<Port> {
    let vlan_range = match intf.metadata.get("sdx_vlan_range") {
        Some(v) => serde_json::from_value(v.clone()).map_err(|e| {
            SdxdError::Conversion(format!(
                "interface {}: malformed sdx_vlan_range: {e}",
                intf.id
            ))
        })?,
        None => match &settings.override_vlan_range {
            Some(ovr) => ovr.clone(),
            None => intf.tag_ranges.clone(),
        },
    };
    Ok(Port {
        id: urn::port_urn(&settings.oxp_url, node_name, intf.port_number),
        name: metadata_str(&intf.metadata, "port_name")
            .unwrap_or(&intf.name)
            .to_string(),
        node: urn::node_urn(&settings.oxp_url, node_name),
        port_type: urn::port_type(intf.speed).to_string(),
        status: intf.status.as_sdx().to_string(),
        state: if intf.enabled { "enabled" } else { "disabled" }.to_string(),
        mtu: intf
            .metadata
            .get("mtu")
            .and_then(|v| v.as_u64())
            .unwrap_or(1500),
        nni: metadata_str(&intf.metadata, "nni").unwrap_or("").to_string(),
        services: PortServices {
            l2vpn_ptp: L2vpnPtp { vlan_range },
        },
    })
}

fn set_port_nni(nodes: &mut [Node], port_id: &str, peer: &str) {
    for node in nodes.iter_mut() {
        if let Some(port) = node.ports.iter_mut().find(|p| p.id == port_id) {
            port.nni = peer.to_string();
            return;
        }
    }
}

/// Convert the mirror into an exchange document.  Deterministic for a
/// fixed mirror/version/timestamp; node and link order follows the
/// mirror's key order and carries no meaning.
pub fn convert(
    mirror: &Mirror,
    version: u64,
    timestamp: &str,
    settings: &ConvertSettings,
) -> SdxdResult<Conversion> {
    let mut nodes = Vec::new();
    let mut links = Vec::new();
    let mut kytos2sdx = BTreeMap::new();
    let mut sdx2kytos = BTreeMap::new();

    if settings.export_switches {
        for sw in mirror.switches.values().filter(|s| s.enabled) {
            let node_name = sw.node_name().to_string();
            let mut ports = Vec::new();
            if settings.export_interfaces {
                for intf in sw.interfaces.values().filter(|i| {
                    i.enabled && i.port_number != VIRTUAL_PORT_NUMBER
                }) {
                    let port = build_port(&node_name, intf, settings)?;
                    kytos2sdx.insert(intf.id.clone(), port.id.clone());
                    sdx2kytos.insert(port.id.clone(), intf.id.clone());
                    ports.push(port);
                }
            }
            nodes.push(Node {
                id: urn::node_urn(&settings.oxp_url, &node_name),
                name: node_name,
                location: build_location(&sw.metadata),
                ports,
                status: sw.status.as_sdx().to_string(),
                state: if sw.enabled { "enabled" } else { "disabled" }
                    .to_string(),
            });
        }
    }

    if settings.export_links {
        for link in mirror.links.values().filter(|l| l.enabled) {
            let sw_a = urn::switch_of_interface(&link.endpoint_a.id);
            let sw_b = urn::switch_of_interface(&link.endpoint_b.id);
            if sw_a == sw_b {
                // loopback links have no place in the exchange model
                continue;
            }
            let name_of = |sw_id: &str| -> SdxdResult<String> {
                mirror
                    .switches
                    .get(sw_id)
                    .map(|s| s.node_name().to_string())
                    .ok_or_else(|| {
                        SdxdError::Conversion(format!(
                            "link {} references unknown switch {sw_id}",
                            link.id
                        ))
                    })
            };
            let name_a = name_of(sw_a)?;
            let name_b = name_of(sw_b)?;
            let port_a = link.endpoint_a.port_number;
            let port_b = link.endpoint_b.port_number;
            let name = match metadata_str(&link.metadata, "link_name") {
                Some(n) => n.to_string(),
                None => format!("{name_a}/{port_a}_{name_b}/{port_b}"),
            };
            let urn_a = urn::port_urn(&settings.oxp_url, &name_a, port_a);
            let urn_b = urn::port_urn(&settings.oxp_url, &name_b, port_b);

            set_port_nni(&mut nodes, &urn_a, &urn_b);
            set_port_nni(&mut nodes, &urn_b, &urn_a);

            links.push(SdxLink {
                id: urn::link_urn(&settings.oxp_url, &name),
                name,
                ports: vec![urn_a, urn_b],
                link_type: "intra".to_string(),
                bandwidth: metadata_f64(
                    &link.metadata,
                    "bandwidth",
                    link.endpoint_a.speed,
                ),
                residual_bandwidth: metadata_f64(
                    &link.metadata,
                    "residual_bandwidth",
                    100.0,
                ),
                latency: metadata_f64(&link.metadata, "latency", 0.0),
                packet_loss: metadata_f64(&link.metadata, "packet_loss", 0.0),
                availability: metadata_f64(
                    &link.metadata,
                    "availability",
                    100.0,
                ),
                status: link.status.as_sdx().to_string(),
                state: if link.enabled { "enabled" } else { "disabled" }
                    .to_string(),
            });
        }

        // Synthesize an inter-domain entry for every port whose metadata
        // names a peer in another domain.
        for sw in mirror.switches.values().filter(|s| s.enabled) {
            let node_name = sw.node_name().to_string();
            for intf in sw
                .interfaces
                .values()
                .filter(|i| i.enabled && i.port_number != VIRTUAL_PORT_NUMBER)
            {
                let peer = match metadata_str(&intf.metadata, "nni") {
                    Some(p) if !urn::is_local_urn(p, &settings.oxp_url) => {
                        p.to_string()
                    }
                    _ => continue,
                };
                let name = match metadata_str(&intf.metadata, "link_name") {
                    Some(n) => n.to_string(),
                    None => {
                        format!("NO_NAME_{node_name}/{}", intf.port_number)
                    }
                };
                let local = urn::port_urn(
                    &settings.oxp_url,
                    &node_name,
                    intf.port_number,
                );
                links.push(SdxLink {
                    id: urn::link_urn(&settings.oxp_url, &name),
                    name,
                    ports: vec![local, peer],
                    link_type: "inter".to_string(),
                    bandwidth: metadata_f64(
                        &intf.metadata,
                        "bandwidth",
                        intf.speed,
                    ),
                    residual_bandwidth: 100.0,
                    latency: 0.0,
                    packet_loss: 0.0,
                    availability: 100.0,
                    status: intf.status.as_sdx().to_string(),
                    state: if intf.enabled { "enabled" } else { "disabled" }
                        .to_string(),
                });
            }
        }
    }

    Ok(Conversion {
        document: TopologyDocument {
            id: urn::topology_urn(&settings.oxp_url),
            name: settings.oxp_name.clone(),
            version,
            model_version: settings.model_version.clone(),
            timestamp: timestamp.to_string(),
            nodes,
            links,
            services: vec!["l2vpn-ptp".to_string()],
        },
        kytos2sdx,
        sdx2kytos,
    })
}
