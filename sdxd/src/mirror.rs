// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The canonical in-memory copy of the controller's topology and the diff
//! engine that keeps it in sync with live snapshots.
//!
//! Each reconcile pass classifies what it finds as administrative (shape
//! or configuration: entity add/remove, enable state, allow-listed
//! attributes and metadata) or operational (liveness only).  The caller
//! uses the classification to decide on version bumps and downstream
//! publication.

use std::collections::BTreeMap;

use crate::types::Interface;
use crate::types::Link;
use crate::types::Metadata;
use crate::types::ObjectType;
use crate::types::Switch;
use crate::types::TopologySnapshot;
use crate::urn;

/// Metadata keys that matter to the exported document, per object class.
/// Changes outside these lists are invisible to the diff.
pub const SWITCH_METADATA: &[&str] =
    &["node_name", "iso3166_2_lvl4", "lng", "lat", "address"];
pub const INTERFACE_METADATA: &[&str] = &[
    "port_name",
    "sdx_vlan_range",
    "sdx_nni",
    "nni",
    "link_name",
    "mtu",
    "entities",
];
pub const LINK_METADATA: &[&str] = &[
    "link_name",
    "availability",
    "packet_loss",
    "latency",
    "residual_bandwidth",
];

/// What a reconcile pass found.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Changes {
    pub admin: bool,
    pub oper: bool,
}

impl Changes {
    pub fn any(&self) -> bool {
        self.admin || self.oper
    }
}

macro_rules! diff_attr {
    // administrative attribute: update on mismatch and flag admin
    ($cur:ident, $live:ident, $changes:ident, $field:ident) => {
        if $cur.$field != $live.$field {
            $cur.$field = $live.$field.clone();
            $changes.admin = true;
        }
    };
}

#[derive(Debug, Default)]
pub struct Mirror {
    pub switches: BTreeMap<String, Switch>,
    pub links: BTreeMap<String, Link>,
}

impl Mirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a live snapshot into the mirror and classify what changed.
    ///
    /// Entities are processed in nesting order (switches, then their
    /// interfaces, then links) and removals are handled in a sweep after
    /// all live entities have been visited.  Calling this twice with the
    /// same snapshot reports no changes on the second pass.
    pub fn reconcile(&mut self, live: &TopologySnapshot) -> Changes {
        let mut changes = Changes::default();

        for (id, live_sw) in &live.switches {
            match self.switches.get_mut(id) {
                None => {
                    self.switches.insert(id.clone(), live_sw.clone());
                    changes.admin = true;
                }
                Some(sw) => diff_switch(sw, live_sw, &mut changes),
            }
        }
        self.switches.retain(|id, _| {
            let keep = live.switches.contains_key(id);
            if !keep {
                changes.admin = true;
            }
            keep
        });

        for (id, live_link) in &live.links {
            match self.links.get_mut(id) {
                None => {
                    self.links.insert(id.clone(), live_link.clone());
                    changes.admin = true;
                }
                Some(link) => diff_link(link, live_link, &mut changes),
            }
        }
        self.links.retain(|id, _| {
            let keep = live.links.contains_key(id);
            if !keep {
                changes.admin = true;
            }
            keep
        });

        changes
    }

    /// Apply a single-object metadata notification.  Returns `None` when
    /// the referenced object is not in the mirror, otherwise whether any
    /// allow-listed key actually changed.
    pub fn apply_metadata(
        &mut self,
        object_type: ObjectType,
        object_id: &str,
        metadata: &Metadata,
    ) -> Option<bool> {
        let mut changes = Changes::default();
        match object_type {
            ObjectType::Switch => {
                let sw = self.switches.get_mut(object_id)?;
                diff_metadata(
                    &mut sw.metadata,
                    metadata,
                    SWITCH_METADATA,
                    &mut changes,
                );
            }
            ObjectType::Interface => {
                let sw_id = urn::switch_of_interface(object_id);
                let intf = self
                    .switches
                    .get_mut(sw_id)?
                    .interfaces
                    .get_mut(object_id)?;
                diff_metadata(
                    &mut intf.metadata,
                    metadata,
                    INTERFACE_METADATA,
                    &mut changes,
                );
            }
            ObjectType::Link => {
                let link = self.links.get_mut(object_id)?;
                diff_metadata(
                    &mut link.metadata,
                    metadata,
                    LINK_METADATA,
                    &mut changes,
                );
            }
        }
        Some(changes.admin)
    }
}

fn diff_switch(cur: &mut Switch, live: &Switch, changes: &mut Changes) {
    if cur.status != live.status {
        cur.status = live.status;
        changes.oper = true;
    }
    diff_attr!(cur, live, changes, enabled);
    diff_attr!(cur, live, changes, name);
    diff_attr!(cur, live, changes, data_path);
    diff_attr!(cur, live, changes, status_reason);
    diff_metadata(&mut cur.metadata, &live.metadata, SWITCH_METADATA, changes);

    for (id, live_intf) in &live.interfaces {
        match cur.interfaces.get_mut(id) {
            None => {
                cur.interfaces.insert(id.clone(), live_intf.clone());
                changes.admin = true;
            }
            Some(intf) => diff_interface(intf, live_intf, changes),
        }
    }
    cur.interfaces.retain(|id, _| {
        let keep = live.interfaces.contains_key(id);
        if !keep {
            changes.admin = true;
        }
        keep
    });
}

fn diff_interface(cur: &mut Interface, live: &Interface, changes: &mut Changes) {
    if cur.status != live.status {
        cur.status = live.status;
        changes.oper = true;
    }
    diff_attr!(cur, live, changes, enabled);
    diff_attr!(cur, live, changes, name);
    diff_attr!(cur, live, changes, nni);
    diff_attr!(cur, live, changes, speed);
    diff_attr!(cur, live, changes, link);
    diff_metadata(
        &mut cur.metadata,
        &live.metadata,
        INTERFACE_METADATA,
        changes,
    );
    // tag_ranges track the live value verbatim and never flag a change
    cur.tag_ranges = live.tag_ranges.clone();
}

fn diff_link(cur: &mut Link, live: &Link, changes: &mut Changes) {
    if cur.status != live.status {
        cur.status = live.status;
        changes.oper = true;
    }
    diff_attr!(cur, live, changes, enabled);
    // an endpoint swap rewires the topology
    diff_attr!(cur, live, changes, endpoint_a);
    diff_attr!(cur, live, changes, endpoint_b);
    diff_metadata(&mut cur.metadata, &live.metadata, LINK_METADATA, changes);
}

/// Compare the allow-listed keys of two metadata maps, copying any added,
/// changed or removed key into `cur` and flagging an administrative change.
fn diff_metadata(
    cur: &mut Metadata,
    live: &Metadata,
    keys: &[&str],
    changes: &mut Changes,
) {
    for key in keys {
        match (cur.get(*key), live.get(*key)) {
            (None, None) => {}
            (Some(a), Some(b)) if a == b => {}
            (_, Some(b)) => {
                cur.insert(key.to_string(), b.clone());
                changes.admin = true;
            }
            (Some(_), None) => {
                cur.remove(*key);
                changes.admin = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::sample_snapshot;
    use crate::types::Status;
    use serde_json::json;

    #[test]
    fn test_first_reconcile_is_administrative() {
        let mut mirror = Mirror::new();
        let snap = sample_snapshot();
        let changes = mirror.reconcile(&snap);
        assert!(changes.admin);
        assert_eq!(mirror.switches.len(), 3);
        assert_eq!(mirror.links.len(), 2);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let mut mirror = Mirror::new();
        let snap = sample_snapshot();
        mirror.reconcile(&snap);
        let changes = mirror.reconcile(&snap);
        assert_eq!(changes, Changes::default());
    }

    #[test]
    fn test_status_toggle_is_operational_only() {
        let mut mirror = Mirror::new();
        let mut snap = sample_snapshot();
        mirror.reconcile(&snap);

        let sw = snap.switches.values_mut().next().unwrap();
        sw.status = Status::Down;
        let changes = mirror.reconcile(&snap);
        assert!(changes.oper);
        assert!(!changes.admin);
    }

    #[test]
    fn test_enable_toggle_is_administrative() {
        let mut mirror = Mirror::new();
        let mut snap = sample_snapshot();
        mirror.reconcile(&snap);

        let link = snap.links.values_mut().next().unwrap();
        link.enabled = false;
        let changes = mirror.reconcile(&snap);
        assert!(changes.admin);
        assert!(!changes.oper);
    }

    #[test]
    fn test_new_switch_with_interfaces_is_one_admin_change() {
        let mut mirror = Mirror::new();
        let mut snap = sample_snapshot();
        mirror.reconcile(&snap);

        let extra = crate::test_fixtures::switch(4);
        snap.switches.insert(extra.id.clone(), extra);
        let changes = mirror.reconcile(&snap);
        assert!(changes.admin);
        assert!(!changes.oper);
        assert_eq!(mirror.switches.len(), 4);
    }

    #[test]
    fn test_removal_is_administrative() {
        let mut mirror = Mirror::new();
        let mut snap = sample_snapshot();
        mirror.reconcile(&snap);

        let gone = snap.links.keys().next().unwrap().clone();
        snap.links.remove(&gone);
        let changes = mirror.reconcile(&snap);
        assert!(changes.admin);
        assert!(!mirror.links.contains_key(&gone));
    }

    #[test]
    fn test_interface_removal_is_administrative() {
        let mut mirror = Mirror::new();
        let mut snap = sample_snapshot();
        mirror.reconcile(&snap);

        let sw = snap.switches.values_mut().next().unwrap();
        let gone = sw.interfaces.keys().next().unwrap().clone();
        sw.interfaces.remove(&gone);
        let changes = mirror.reconcile(&snap);
        assert!(changes.admin);
    }

    #[test]
    fn test_ignored_metadata_key_is_no_change() {
        let mut mirror = Mirror::new();
        let mut snap = sample_snapshot();
        mirror.reconcile(&snap);

        let sw = snap.switches.values_mut().next().unwrap();
        sw.metadata.insert("color".into(), json!("blue"));
        let changes = mirror.reconcile(&snap);
        assert_eq!(changes, Changes::default());
    }

    #[test]
    fn test_allowlisted_metadata_change_is_administrative() {
        let mut mirror = Mirror::new();
        let mut snap = sample_snapshot();
        mirror.reconcile(&snap);

        let sw = snap.switches.values_mut().next().unwrap();
        sw.metadata.insert("lat".into(), json!("25.75"));
        let changes = mirror.reconcile(&snap);
        assert!(changes.admin);
        assert!(!changes.oper);
    }

    #[test]
    fn test_tag_ranges_follow_live_without_flagging() {
        let mut mirror = Mirror::new();
        let mut snap = sample_snapshot();
        mirror.reconcile(&snap);

        let sw = snap.switches.values_mut().next().unwrap();
        let intf = sw.interfaces.values_mut().next().unwrap();
        intf.tag_ranges = vec![[100, 200]];
        let intf_id = intf.id.clone();
        let changes = mirror.reconcile(&snap);
        assert_eq!(changes, Changes::default());
        let sw_id = urn::switch_of_interface(&intf_id).to_string();
        assert_eq!(
            mirror.switches[&sw_id].interfaces[&intf_id].tag_ranges,
            vec![[100, 200]]
        );
    }

    #[test]
    fn test_nni_attached_after_first_reconcile_is_administrative() {
        let mut mirror = Mirror::new();
        let mut snap = sample_snapshot();
        mirror.reconcile(&snap);

        // An operator wiring up an inter-domain port later must surface
        // through the mirror, not just the first observation.
        let sw = snap.switches.values_mut().next().unwrap();
        let intf = sw.interfaces.values_mut().next().unwrap();
        intf.metadata
            .insert("nni".into(), json!("urn:sdx:port:sax.net:Sax01:41"));
        intf.metadata.insert("link_name".into(), json!("ampath-sax"));
        let intf_id = intf.id.clone();
        let changes = mirror.reconcile(&snap);
        assert!(changes.admin);
        assert!(!changes.oper);
        let sw_id = urn::switch_of_interface(&intf_id).to_string();
        let mirrored = &mirror.switches[&sw_id].interfaces[&intf_id];
        assert_eq!(
            mirrored.metadata["nni"],
            json!("urn:sdx:port:sax.net:Sax01:41")
        );
        assert_eq!(mirrored.metadata["link_name"], json!("ampath-sax"));
    }

    #[test]
    fn test_metadata_event_on_known_link() {
        let mut mirror = Mirror::new();
        let snap = sample_snapshot();
        mirror.reconcile(&snap);

        let link_id = snap.links.keys().next().unwrap().clone();
        let mut md = mirror.links[&link_id].metadata.clone();
        md.insert("latency".into(), json!(7));
        assert_eq!(
            mirror.apply_metadata(ObjectType::Link, &link_id, &md),
            Some(true)
        );
        // same payload again: applied but unchanged
        assert_eq!(
            mirror.apply_metadata(ObjectType::Link, &link_id, &md),
            Some(false)
        );
    }

    #[test]
    fn test_metadata_event_on_unknown_object() {
        let mut mirror = Mirror::new();
        mirror.reconcile(&sample_snapshot());
        assert_eq!(
            mirror.apply_metadata(
                ObjectType::Switch,
                "00:00:00:00:00:00:ff:ff",
                &Metadata::new()
            ),
            None
        );
    }
}
