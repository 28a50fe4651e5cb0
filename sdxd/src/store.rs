// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Persistence for the versioned SDX document: a single JSON file holding
//! the latest converted topology plus upsert bookkeeping.  Single-writer
//! by assumption; there is no cross-process compare-and-swap.

use std::path::Path;
use std::path::PathBuf;

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use slog::debug;

use crate::convert::TopologyDocument;
use crate::types::SdxdResult;

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct StoredDocument {
    #[serde(flatten)]
    pub document: TopologyDocument,
    pub inserted_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug)]
pub struct Store {
    log: slog::Logger,
    path: PathBuf,
}

impl Store {
    pub fn new(log: &slog::Logger, path: impl AsRef<Path>) -> Self {
        Store {
            log: log.new(slog::o!("unit" => "store")),
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Fetch the persisted document, or None when nothing has ever been
    /// stored under this path.
    pub fn get(&self) -> SdxdResult<Option<StoredDocument>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist a freshly converted document, preserving `inserted_at`
    /// across updates.  The write goes through a temp file and rename so a
    /// crash never leaves a torn document behind.
    pub fn upsert(&self, document: &TopologyDocument) -> SdxdResult<StoredDocument> {
        let now = common::timestamp_now();
        let inserted_at = match self.get() {
            Ok(Some(prev)) => prev.inserted_at,
            _ => None,
        };
        let stored = StoredDocument {
            document: document.clone(),
            inserted_at: inserted_at.or_else(|| Some(now.clone())),
            updated_at: Some(now),
        };

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&stored)?)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(self.log, "persisted topology";
            "version" => stored.document.version,
            "timestamp" => &stored.document.timestamp);
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert;
    use crate::mirror::Mirror;
    use crate::test_fixtures;

    fn test_document(version: u64) -> TopologyDocument {
        let mut mirror = Mirror::new();
        mirror.reconcile(&test_fixtures::sample_snapshot());
        let settings = convert::ConvertSettings {
            oxp_name: test_fixtures::OXP_NAME.to_string(),
            oxp_url: test_fixtures::OXP_URL.to_string(),
            model_version: "2.0.0".to_string(),
            export_switches: true,
            export_interfaces: true,
            export_links: true,
            override_vlan_range: None,
        };
        convert::convert(&mirror, version, "2024-07-18T15:33:12Z", &settings)
            .unwrap()
            .document
    }

    fn scratch_store(tag: &str) -> Store {
        let log = slog::Logger::root(slog::Discard, slog::o!());
        let path = std::env::temp_dir()
            .join(format!("sdxd-store-{tag}-{}.json", std::process::id()));
        let _ = std::fs::remove_file(&path);
        Store::new(&log, path)
    }

    #[test]
    fn test_get_on_missing_file() {
        let store = scratch_store("missing");
        assert!(store.get().unwrap().is_none());
    }

    #[test]
    fn test_upsert_roundtrip() {
        let store = scratch_store("roundtrip");
        let doc = test_document(1);
        let stored = store.upsert(&doc).unwrap();
        assert!(stored.inserted_at.is_some());

        let fetched = store.get().unwrap().unwrap();
        assert_eq!(fetched.document, doc);
        assert_eq!(fetched.inserted_at, stored.inserted_at);
    }

    #[test]
    fn test_upsert_preserves_inserted_at() {
        let store = scratch_store("preserve");
        let first = store.upsert(&test_document(1)).unwrap();
        let second = store.upsert(&test_document(2)).unwrap();
        assert_eq!(second.inserted_at, first.inserted_at);
        assert_eq!(store.get().unwrap().unwrap().document.version, 2);
    }
}
