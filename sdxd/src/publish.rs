// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Best-effort delivery of converted documents to the SDX-LC.  Failures
//! here are reported to the caller and never touch mirror or version
//! state.

use std::time::Duration;

use slog::debug;
use slog::info;

use crate::convert::TopologyDocument;
use crate::errors::SdxdError;
use crate::types::SdxdResult;

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct Publisher {
    log: slog::Logger,
    url: Option<String>,
    client: reqwest::Client,
}

impl Publisher {
    /// An empty or missing URL puts the publisher in disabled mode, where
    /// every publish is a silent success.
    pub fn new(log: &slog::Logger, url: Option<String>) -> Self {
        Publisher {
            log: log.new(slog::o!("unit" => "publisher")),
            url: url.filter(|u| !u.is_empty()),
            client: reqwest::Client::builder()
                .timeout(PUBLISH_TIMEOUT)
                .build()
                .expect("reqwest client construction cannot fail"),
        }
    }

    pub fn enabled(&self) -> bool {
        self.url.is_some()
    }

    pub async fn publish(&self, document: &TopologyDocument) -> SdxdResult<()> {
        let Some(url) = &self.url else {
            debug!(self.log, "publish disabled, skipping");
            return Ok(());
        };
        let response = self
            .client
            .post(url)
            .json(document)
            .send()
            .await
            .map_err(|e| SdxdError::Publish(format!("POST {url}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SdxdError::Publish(format!(
                "SDX-LC returned {status}"
            )));
        }
        info!(self.log, "published topology";
            "version" => document.version,
            "timestamp" => &document.timestamp);
        Ok(())
    }
}
