// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Update-cycle orchestration: reconcile a live snapshot into the mirror,
//! bump version/timestamp, reconvert, persist, and publish.

use chrono::DateTime;
use chrono::Utc;
use slog::debug;
use slog::error;
use slog::info;
use slog::warn;

use crate::convert;
use crate::errors::SdxdError;
use crate::types::Metadata;
use crate::types::ObjectType;
use crate::types::SdxdResult;
use crate::types::TopologySnapshot;
use crate::Global;

/// Apply one debounced live snapshot.  The mirror reconcile and the
/// reconversion run under the topology lock; persistence and the
/// downstream publish happen after it is released.
pub async fn update_cycle(
    g: &Global,
    live: TopologySnapshot,
    event_time: DateTime<Utc>,
) {
    let outcome = {
        let mut state = g.topology.lock().unwrap();
        let changes = state.mirror.reconcile(&live);
        if !changes.any() {
            debug!(g.log, "reconcile found no changes");
            None
        } else {
            // Version and timestamp advance only once the conversion
            // succeeds, so a failed cycle never leaves the reported
            // version ahead of the last good document.
            let version = if changes.admin {
                state.version + 1
            } else {
                state.version
            };
            let timestamp = if changes.admin {
                common::timestamp_now()
            } else {
                common::format_timestamp(event_time)
            };
            match convert::convert(
                &state.mirror,
                version,
                &timestamp,
                &g.settings,
            ) {
                Ok(conversion) => {
                    state.version = version;
                    state.timestamp = timestamp;
                    let document = conversion.document.clone();
                    state.latest = Some(conversion);
                    Some((document, changes))
                }
                Err(e) => {
                    error!(g.log, "conversion failed after reconcile: {e}");
                    None
                }
            }
        }
    };

    let Some((document, changes)) = outcome else {
        return;
    };
    info!(g.log, "topology updated";
        "version" => document.version,
        "admin" => changes.admin,
        "oper" => changes.oper);

    if changes.admin {
        if let Err(e) = g.store.upsert(&document) {
            warn!(g.log, "failed to persist topology document: {e}");
        }
    }
    if changes.oper {
        // Best effort: a publish failure must not abort the cycle.
        if let Err(e) = g.publisher.publish(&document).await {
            warn!(g.log, "downstream publish failed: {e}");
        }
    }
}

/// Apply a metadata-change notification for a single object.  Any
/// resulting change is administrative: version bump, persist, and
/// reconvert, but no downstream publish.  Returns false when the
/// referenced object is not in the mirror.
pub async fn metadata_cycle(
    g: &Global,
    object_type: ObjectType,
    object_id: &str,
    metadata: &Metadata,
) -> SdxdResult<bool> {
    let document = {
        let mut state = g.topology.lock().unwrap();
        match state.mirror.apply_metadata(object_type, object_id, metadata) {
            None => {
                warn!(g.log, "metadata event for unknown object";
                    "object_type" => format!("{object_type:?}"),
                    "object_id" => object_id);
                return Ok(false);
            }
            Some(false) => return Ok(true),
            Some(true) => {}
        }
        let version = state.version + 1;
        let timestamp = common::timestamp_now();
        let conversion =
            convert::convert(&state.mirror, version, &timestamp, &g.settings)?;
        state.version = version;
        state.timestamp = timestamp;
        let document = conversion.document.clone();
        state.latest = Some(conversion);
        document
    };
    info!(g.log, "metadata updated";
        "object_id" => object_id,
        "version" => document.version);
    if let Err(e) = g.store.upsert(&document) {
        warn!(g.log, "failed to persist topology document: {e}");
    }
    Ok(true)
}

/// Reconvert the mirror and publish the result on demand, surfacing
/// conversion and publish failures to the caller.
pub async fn force_publish(g: &Global) -> SdxdResult<()> {
    let document = {
        let mut state = g.topology.lock().unwrap();
        if state.mirror.switches.is_empty() && state.latest.is_none() {
            return Err(SdxdError::Conversion(
                "no topology has been observed yet".into(),
            ));
        }
        let conversion = convert::convert(
            &state.mirror,
            state.version,
            &state.timestamp,
            &g.settings,
        )?;
        let document = conversion.document.clone();
        state.latest = Some(conversion);
        document
    };
    g.publisher.publish(&document).await
}
