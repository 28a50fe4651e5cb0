// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::convert;

#[derive(Debug, thiserror::Error)]
pub enum SdxdError {
    /// The mirrored topology could not be rendered as an SDX document.
    #[error("conversion failed: {0}")]
    Conversion(String),
    /// The SDX-LC rejected the document, or the POST never reached it.
    #[error("publish failed: {0}")]
    Publish(String),
    /// A request to the kytos controller failed.
    #[error("upstream controller error: {0}")]
    Upstream(String),
    #[error("I/O error: {0:?}")]
    Io(std::io::Error),
    #[error("No such resource: {0}")]
    Missing(String),
    #[error("Invalid argument: {0}")]
    Invalid(String),
    #[error("error: {0}")]
    Other(String),
}

impl convert::From<std::io::Error> for SdxdError {
    fn from(err: std::io::Error) -> Self {
        SdxdError::Io(err)
    }
}

impl convert::From<SdxdError> for dropshot::HttpError {
    fn from(o: SdxdError) -> dropshot::HttpError {
        match o {
            SdxdError::Conversion(e) => dropshot::HttpError::for_status(
                Some(e),
                http::StatusCode::FAILED_DEPENDENCY,
            ),
            SdxdError::Publish(e) => dropshot::HttpError::for_status(
                Some(e),
                http::StatusCode::FAILED_DEPENDENCY,
            ),
            SdxdError::Upstream(e) => dropshot::HttpError::for_status(
                Some(e),
                http::StatusCode::FAILED_DEPENDENCY,
            ),
            SdxdError::Io(e) => {
                dropshot::HttpError::for_internal_error(e.to_string())
            }
            SdxdError::Missing(e) => dropshot::HttpError::for_status(
                Some(e),
                http::StatusCode::NOT_FOUND,
            ),
            SdxdError::Invalid(e) => {
                dropshot::HttpError::for_bad_request(None, e)
            }
            SdxdError::Other(e) => dropshot::HttpError::for_internal_error(e),
        }
    }
}

impl convert::From<String> for SdxdError {
    fn from(err: String) -> Self {
        SdxdError::Other(err)
    }
}

impl convert::From<&str> for SdxdError {
    fn from(err: &str) -> Self {
        SdxdError::Other(err.to_string())
    }
}

impl convert::From<anyhow::Error> for SdxdError {
    fn from(err: anyhow::Error) -> Self {
        SdxdError::Other(err.to_string())
    }
}

impl convert::From<serde_json::Error> for SdxdError {
    fn from(err: serde_json::Error) -> Self {
        SdxdError::Other(err.to_string())
    }
}
