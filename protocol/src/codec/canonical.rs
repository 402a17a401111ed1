//! Canonical query-string encoding.
//!
//! Every encrypted payload and every check code is computed over a flat
//! `key=value&key=value` string. Two runs over the same record must produce
//! the same bytes, because the gateway recomputes digests over what it
//! decrypts. So:
//!
//! - keys are emitted in sorted order, never in struct or map order;
//! - absent (`None` / `null`) fields are left out entirely;
//! - integers are plain decimal, strings are form-urlencoded;
//! - anything that isn't a scalar is rejected instead of being flattened
//!   into something the gateway will misread.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Failure to flatten a request record into a query string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("malformed record: {0}")]
    MalformedRecord(String),
}

/// Encode a serializable record as a canonical query string.
///
/// The record must serialize to a flat object. Field names are taken from
/// its serde representation, so `#[serde(rename = "...")]` is how a struct
/// picks its wire names.
///
/// # Example
///
/// ```
/// use newebpay_protocol::codec::canonical::encode;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Close<'a> {
///     #[serde(rename = "MerchantOrderNo")]
///     order_no: &'a str,
///     #[serde(rename = "Amt")]
///     amount: u64,
///     #[serde(rename = "TradeNo")]
///     trade_no: Option<&'a str>,
/// }
///
/// let query = encode(&Close { order_no: "A 1", amount: 500, trade_no: None }).unwrap();
/// assert_eq!(query, "Amt=500&MerchantOrderNo=A+1");
/// ```
pub fn encode<T: Serialize + ?Sized>(record: &T) -> Result<String, EncodeError> {
    let value = serde_json::to_value(record)
        .map_err(|e| EncodeError::MalformedRecord(e.to_string()))?;

    let Value::Object(fields) = value else {
        return Err(EncodeError::MalformedRecord(format!(
            "expected a flat record, got {}",
            kind_of(&value)
        )));
    };

    let mut sorted = BTreeMap::new();
    for (key, value) in fields {
        if let Some(scalar) = scalar_to_string(&key, &value)? {
            sorted.insert(key, scalar);
        }
    }

    Ok(encode_pairs(sorted.iter()))
}

/// Form-urlencode already-ordered pairs. Callers that need a fixed field
/// order (rather than sorted) use this directly.
pub fn encode_pairs<I, K, V>(pairs: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key.as_ref(), value.as_ref());
    }
    serializer.finish()
}

fn scalar_to_string(key: &str, value: &Value) -> Result<Option<String>, EncodeError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Number(n) if n.is_u64() || n.is_i64() => Ok(Some(n.to_string())),
        Value::Number(_) => Err(EncodeError::MalformedRecord(format!(
            "field `{key}` is not an integer"
        ))),
        Value::Array(_) | Value::Object(_) => Err(EncodeError::MalformedRecord(format!(
            "field `{key}` is a {}, not a scalar",
            kind_of(value)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
