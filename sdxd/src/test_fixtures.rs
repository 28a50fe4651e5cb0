// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared topology fixtures for unit tests: three switches, two
//! intra-domain links, one inter-domain port, one virtual port.

use serde_json::json;

use crate::types::Endpoint;
use crate::types::Interface;
use crate::types::Link;
use crate::types::Status;
use crate::types::Switch;
use crate::types::TopologySnapshot;
use crate::types::VIRTUAL_PORT_NUMBER;

pub const OXP_NAME: &str = "Ampath";
pub const OXP_URL: &str = "ampath.net";

pub fn dpid(n: u8) -> String {
    format!("aa:00:00:00:00:00:00:{n:02}")
}

pub fn interface(sw: &str, port: u64) -> Interface {
    Interface {
        id: format!("{sw}:{port}"),
        name: format!("eth{port}"),
        port_number: port,
        enabled: true,
        status: Status::Up,
        speed: 1250000000.0,
        nni: false,
        link: String::new(),
        metadata: Default::default(),
        tag_ranges: vec![[1, 4095]],
    }
}

pub fn switch(n: u8) -> Switch {
    let id = dpid(n);
    let mut sw = Switch {
        id: id.clone(),
        name: id.clone(),
        data_path: format!("Ampath{n}"),
        enabled: true,
        status: Status::Up,
        status_reason: vec![],
        metadata: Default::default(),
        interfaces: Default::default(),
    };
    sw.metadata.insert("node_name".into(), json!(format!("Ampath{n}")));
    sw.metadata.insert("address".into(), json!("Miami"));
    sw.metadata.insert("lat".into(), json!("25.76"));
    sw.metadata.insert("lng".into(), json!("-80.19"));
    sw.metadata.insert("iso3166_2_lvl4".into(), json!("US-FL"));
    for port in [1, 2] {
        let intf = interface(&id, port);
        sw.interfaces.insert(intf.id.clone(), intf);
    }
    sw
}

pub fn link(name: &str, a: &Interface, b: &Interface) -> Link {
    let endpoint = |i: &Interface| Endpoint {
        id: i.id.clone(),
        port_number: i.port_number,
        speed: i.speed,
        enabled: i.enabled,
        active: i.status.is_up(),
    };
    Link {
        id: name.to_string(),
        enabled: true,
        status: Status::Up,
        metadata: Default::default(),
        endpoint_a: endpoint(a),
        endpoint_b: endpoint(b),
    }
}

/// A 3-switch / 2-link topology.  Switch 1 additionally carries a virtual
/// port (never exported) and switch 3's port 1 declares an inter-domain
/// peer.
pub fn sample_snapshot() -> TopologySnapshot {
    let mut snap = TopologySnapshot::default();
    let mut sw1 = switch(1);
    let sw2 = switch(2);
    let mut sw3 = switch(3);

    let virt = interface(&sw1.id, VIRTUAL_PORT_NUMBER);
    sw1.interfaces.insert(virt.id.clone(), virt);

    {
        let intf = sw3.interfaces.get_mut(&format!("{}:1", sw3.id)).unwrap();
        intf.metadata
            .insert("nni".into(), json!("urn:sdx:port:sax.net:Sax01:41"));
        intf.metadata
            .insert("link_name".into(), json!("ampath-sax"));
    }

    let link1 = link(
        "c8b55359990f89a5849813dc348d30e9e1f991bad1dcb7f0f3cb25f418973bcd",
        &sw1.interfaces[&format!("{}:1", sw1.id)],
        &sw2.interfaces[&format!("{}:1", sw2.id)],
    );
    let link2 = link(
        "52eea7a6f99c4ff52f9b6f1b42b39eeca0a9b2f316bcd2feb9da65cbd1a364b3",
        &sw2.interfaces[&format!("{}:2", sw2.id)],
        &sw3.interfaces[&format!("{}:2", sw3.id)],
    );

    for sw in [sw1, sw2, sw3] {
        snap.switches.insert(sw.id.clone(), sw);
    }
    for l in [link1, link2] {
        snap.links.insert(l.id.clone(), l);
    }
    snap
}
