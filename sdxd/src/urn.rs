// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Construction of the SDX identifier strings (topology/node/port/link
//! URNs) and the reverse parsing of kytos interface ids.

/// A kytos interface id is the switch dpid followed by ":<port>"; the
/// dpid itself is eight colon-separated octet pairs, 23 characters.
pub const DPID_LEN: usize = 23;

pub fn topology_urn(oxp_url: &str) -> String {
    format!("urn:sdx:topology:{oxp_url}")
}

pub fn node_urn(oxp_url: &str, node_name: &str) -> String {
    format!("urn:sdx:node:{oxp_url}:{node_name}")
}

pub fn port_urn(oxp_url: &str, node_name: &str, port_number: u64) -> String {
    format!("urn:sdx:port:{oxp_url}:{node_name}:{port_number}")
}

pub fn link_urn(oxp_url: &str, link_name: &str) -> String {
    format!("urn:sdx:link:{oxp_url}:{link_name}")
}

/// The switch (dpid) component of a kytos interface id.
pub fn switch_of_interface(intf_id: &str) -> &str {
    if intf_id.len() > DPID_LEN {
        &intf_id[..DPID_LEN]
    } else {
        intf_id
    }
}

/// True if a peer URN names a port inside the given domain.
pub fn is_local_urn(urn: &str, oxp_url: &str) -> bool {
    urn.contains(oxp_url)
}

/// The marketing name for a port speed, from the set of speeds kytos
/// reports (bytes/sec).  Unrecognized speeds are "Other".
pub fn port_type(speed: f64) -> &'static str {
    const SPEEDS: &[(u64, &str)] = &[
        (125000000, "1GE"),
        (1250000000, "10GE"),
        (3125000000, "25GE"),
        (5000000000, "40GE"),
        (6250000000, "50GE"),
        (12500000000, "100GE"),
        (50000000000, "400GE"),
    ];
    if speed.fract() == 0.0 && speed >= 0.0 {
        let as_int = speed as u64;
        for (value, label) in SPEEDS {
            if *value == as_int {
                return label;
            }
        }
    }
    "Other"
}
