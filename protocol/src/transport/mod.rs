//! # Transport
//!
//! The gateway speaks one verb: an `application/x-www-form-urlencoded` POST
//! that answers with a JSON body. Everything above this module builds a
//! [`FormData`] and hands it to a [`Transport`]; everything below it is HTTP.
//!
//! Keeping the seam this narrow means the settlement engine and the client
//! can be driven end-to-end in tests by a scripted transport, with no
//! sockets involved.

use async_trait::async_trait;
use thiserror::Error;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::HttpTransport;

/// Failure to get a usable body back from the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection, TLS, timeout, or body read failure.
    #[error("request failed: {0}")]
    Request(String),

    /// The gateway answered with a non-2xx HTTP status.
    #[error("unexpected http status {status}")]
    UnexpectedStatus { status: u16 },
}

/// An ordered list of form fields.
///
/// Order is preserved as inserted. The gateway doesn't care about the order
/// of outer form fields, but stable ordering makes recorded requests easy to
/// compare in tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    fields: Vec<(String, String)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field, builder style.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// First value recorded under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Render as a urlencoded body.
    pub fn to_urlencoded(&self) -> String {
        crate::codec::canonical::encode_pairs(self.fields.iter().map(|(k, v)| (k, v)))
    }
}

/// Something that can deliver a form POST and return the response body.
///
/// Implementations must not interpret the body: status handling above HTTP
/// belongs to [`crate::codec::response`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `form` to `url` and return the raw response body.
    ///
    /// # Errors
    ///
    /// [`TransportError`] if no 2xx body could be obtained.
    async fn post_form(&self, url: &str, form: &FormData) -> Result<String, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn post_form(&self, url: &str, form: &FormData) -> Result<String, TransportError> {
        (**self).post_form(url, form).await
    }
}
