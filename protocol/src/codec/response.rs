//! # Response Unwrapping
//!
//! Every JSON endpoint answers with the same wrapper:
//!
//! ```json
//! { "Status": "SUCCESS", "Message": "...", "Result": <anything> }
//! ```
//!
//! `Result` is polymorphic. Depending on which operation produced it, it is
//! an object, a hex ciphertext, a string that itself contains JSON, or HTML
//! for the 3-D Secure interstitial. The wrapper can't tell which by looking,
//! so it keeps `Result` as a [`serde_json::Value`] and lets the caller pick
//! the projection that matches the operation it just ran.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::envelope::open_json;
use crate::config::{STATUS_3D_VERIFY, STATUS_SUCCESS};
use crate::crypto::keys::MerchantCredentials;
use crate::error::{GatewayError, Result};

/// Status literal from the wrapper, with the two values we act on pulled out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayStatus {
    Success,
    /// The charge needs a 3-D Secure step; `Result` is HTML.
    ThreeDVerify,
    /// Any gateway-defined error code, verbatim.
    Other(String),
}

impl GatewayStatus {
    pub fn as_str(&self) -> &str {
        match self {
            GatewayStatus::Success => STATUS_SUCCESS,
            GatewayStatus::ThreeDVerify => STATUS_3D_VERIFY,
            GatewayStatus::Other(code) => code,
        }
    }
}

impl From<&str> for GatewayStatus {
    fn from(s: &str) -> Self {
        match s {
            STATUS_SUCCESS => GatewayStatus::Success,
            STATUS_3D_VERIFY => GatewayStatus::ThreeDVerify,
            other => GatewayStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for GatewayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The raw `{Status, Message, Result}` wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayResponse {
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Message", default)]
    pub message: String,
    #[serde(rename = "Result", default)]
    pub result: Value,
}

impl GatewayResponse {
    /// Parse a response body.
    ///
    /// # Errors
    ///
    /// [`GatewayError::MalformedResponse`] if the body isn't the wrapper.
    pub fn parse(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| {
            warn!(error = %e, body_len = body.len(), "unparseable gateway response");
            GatewayError::MalformedResponse(e.to_string())
        })
    }

    pub fn status(&self) -> GatewayStatus {
        GatewayStatus::from(self.status.as_str())
    }

    /// True iff `Status == "SUCCESS"`.
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }

    /// `Result` is an object: re-decode it as `T`.
    pub fn project<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.result.clone())
            .map_err(|e| GatewayError::ResultShapeMismatch(e.to_string()))
    }

    /// `Result` is a JSON string whose contents are JSON.
    pub fn project_embedded<T: DeserializeOwned>(&self) -> Result<T> {
        let text = self.result_str()?;
        serde_json::from_str(text).map_err(|e| GatewayError::ResultShapeMismatch(e.to_string()))
    }

    /// `Result` is a hex ciphertext of JSON, sealed with the merchant's keys.
    pub fn project_encrypted<T: DeserializeOwned>(&self, credentials: &MerchantCredentials) -> Result<T> {
        let ciphertext = self.result_str()?;
        open_json(ciphertext, credentials)
    }

    /// `Result` is literal markup (the 3-D Secure interstitial page).
    pub fn markup(&self) -> Result<&str> {
        self.result_str()
    }

    /// Fail with [`GatewayError::RemoteRejected`] unless the status is
    /// `SUCCESS`, then [`project`](Self::project).
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T> {
        self.ensure_success()?;
        self.project()
    }

    /// Typed view that keeps the status and message alongside the result.
    ///
    /// On success the result must project into `T`. On any other status the
    /// gateway usually sends an empty array or string, so the result is kept
    /// only if it is an object that fits. An empty array would otherwise
    /// decode into an all-default record for `#[serde(default)]` types.
    pub fn reply<T: DeserializeOwned>(self) -> Result<GatewayReply<T>> {
        let result = if self.is_success() {
            Some(self.project()?)
        } else if self.result.is_object() {
            serde_json::from_value(self.result).ok()
        } else {
            None
        };
        Ok(GatewayReply {
            status: self.status,
            message: self.message,
            result,
        })
    }

    pub fn ensure_success(&self) -> Result<()> {
        if self.is_success() {
            return Ok(());
        }
        warn!(status = %self.status, message = %self.message, "gateway rejected request");
        Err(GatewayError::RemoteRejected {
            status: self.status.clone(),
            message: self.message.clone(),
        })
    }

    fn result_str(&self) -> Result<&str> {
        self.result.as_str().ok_or_else(|| {
            GatewayError::ResultShapeMismatch(format!(
                "expected a string result, got {}",
                type_name(&self.result)
            ))
        })
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A wrapper whose `Result` has been projected into a known type.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayReply<T> {
    pub status: String,
    pub message: String,
    pub result: Option<T>,
}

impl<T> GatewayReply<T> {
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }

    /// The typed result, or [`GatewayError::RemoteRejected`].
    pub fn into_result(self) -> Result<T> {
        if !self.is_success() {
            return Err(GatewayError::RemoteRejected {
                status: self.status,
                message: self.message,
            });
        }
        self.result
            .ok_or_else(|| GatewayError::ResultShapeMismatch("missing result".into()))
    }
}
