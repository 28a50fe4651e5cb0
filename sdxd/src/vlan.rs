// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parsing and validation of VLAN selectors as they appear on L2VPN
//! endpoints.

use serde_json::json;
use serde_json::Value;

use crate::errors::SdxdError;
use crate::types::SdxdResult;

pub const VLAN_MIN: u16 = 1;
pub const VLAN_MAX: u16 = 4095;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VlanSpec {
    All,
    Untagged,
    Tag(u16),
    Range(u16, u16),
}

impl VlanSpec {
    /// Parse a VLAN selector string: "all", "untagged", a single tag,
    /// or a "low:high" range.
    pub fn parse(text: &str) -> SdxdResult<Self> {
        match text {
            "all" => return Ok(VlanSpec::All),
            "untagged" => return Ok(VlanSpec::Untagged),
            _ => {}
        }
        if let Some((low, high)) = text.split_once(':') {
            let low = parse_tag(low)?;
            let high = parse_tag(high)?;
            if low > high {
                return Err(SdxdError::Invalid(format!(
                    "invalid VLAN range {text}: low bound exceeds high bound"
                )));
            }
            return Ok(VlanSpec::Range(low, high));
        }
        Ok(VlanSpec::Tag(parse_tag(text)?))
    }

    /// The tag object expected by the mef_eline UNI description, or
    /// None when any VLAN is acceptable.
    pub fn to_tag(&self) -> Option<Value> {
        match self {
            VlanSpec::All => None,
            VlanSpec::Untagged => Some(json!({
                "tag_type": "vlan",
                "value": "untagged",
            })),
            VlanSpec::Tag(tag) => Some(json!({
                "tag_type": "vlan",
                "value": tag,
            })),
            VlanSpec::Range(low, high) => Some(json!({
                "tag_type": "vlan",
                "value": [[low, high]],
            })),
        }
    }
}

fn parse_tag(text: &str) -> SdxdResult<u16> {
    let tag: u16 = text
        .parse()
        .map_err(|_| SdxdError::Invalid(format!("invalid VLAN tag: {text}")))?;
    if !(VLAN_MIN..=VLAN_MAX).contains(&tag) {
        return Err(SdxdError::Invalid(format!(
            "VLAN tag {tag} outside {VLAN_MIN}-{VLAN_MAX}"
        )));
    }
    Ok(tag)
}
