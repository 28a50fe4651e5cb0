// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types for the mirrored topology.  The same types double as the
//! deserialization target for the kytos topology API, so "copying a live
//! entity into the mirror" is an ordinary clone of an owned value.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

use crate::errors;

pub type SdxdResult<T> = Result<T, errors::SdxdError>;

/// Free-form metadata attached to switches, interfaces and links.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// OpenFlow reserved port number kytos uses for its virtual/local port.
/// Interfaces carrying it are never exported.
pub const VIRTUAL_PORT_NUMBER: u64 = 4294967294;

/// Operational liveness of a switch, interface or link.
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, JsonSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Up,
    Down,
    #[default]
    Other,
}

impl Status {
    pub fn is_up(self) -> bool {
        self == Status::Up
    }

    /// The lowercase rendering used by the SDX data model.
    pub fn as_sdx(self) -> &'static str {
        if self.is_up() {
            "up"
        } else {
            "down"
        }
    }
}

impl From<String> for Status {
    fn from(s: String) -> Self {
        match s.to_uppercase().as_str() {
            "UP" => Status::Up,
            "DOWN" => Status::Down,
            _ => Status::Other,
        }
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(String::deserialize(deserializer)?.into())
    }
}

/// A full topology snapshot: the shape returned by the kytos topology API
/// and the shape the mirror maintains internally.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct TopologySnapshot {
    #[serde(default)]
    pub switches: BTreeMap<String, Switch>,
    #[serde(default)]
    pub links: BTreeMap<String, Link>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct Switch {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub data_path: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub status_reason: Vec<String>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub interfaces: BTreeMap<String, Interface>,
}

impl Switch {
    /// Exported node name: metadata `node_name` wins over the raw
    /// data-path label.
    pub fn node_name(&self) -> &str {
        match self.metadata.get("node_name").and_then(|v| v.as_str()) {
            Some(name) => name,
            None => &self.data_path,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct Interface {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub port_number: u64,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub nni: bool,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub metadata: Metadata,
    /// Allowed VLAN tags, as [low, high] pairs.  Merged in from the kytos
    /// tag_ranges endpoint; never diffed, always taken from the live value.
    #[serde(default)]
    pub tag_ranges: Vec<[u16; 2]>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct Link {
    pub id: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub metadata: Metadata,
    pub endpoint_a: Endpoint,
    pub endpoint_b: Endpoint,
}

/// One side of a link.  The kytos API inlines the full interface object
/// here; we only keep the fields conversion needs.
#[derive(
    Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq,
)]
pub struct Endpoint {
    pub id: String,
    #[serde(default)]
    pub port_number: u64,
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub active: bool,
}

/// Which class of object a metadata-change notification refers to.
#[derive(
    Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, Eq, PartialEq,
)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Switch,
    Interface,
    Link,
}
