//! Handle API response parsing
//!
//! Decodes the JSON envelope returned by `doi.org/api/handles/<doi>` and
//! extracts the redirect URL from its typed value list.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{Error, NoRedirect, Result};

/// Value type that carries the redirect target
const URL_TYPE: &str = "URL";

/// Response from the handle API
///
/// Missing or mistyped fields decode to their zero value; only bytes that are
/// not a JSON object fail to decode.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HandleResponse {
    #[serde(default, deserialize_with = "lenient")]
    pub handle: String,
    #[serde(rename = "responseCode", default, deserialize_with = "lenient")]
    pub response_code: i64,
    /// Value records in resolver order
    #[serde(default, deserialize_with = "lenient_list")]
    pub values: Vec<HandleValue>,
}

/// One typed value record of a handle
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HandleValue {
    #[serde(default, deserialize_with = "lenient")]
    pub index: i64,
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient")]
    pub timestamp: String,
    #[serde(default, deserialize_with = "lenient")]
    pub ttl: i64,
    /// Opaque, type-dependent data; `{"value": "<url>"}` for `URL` records
    #[serde(default)]
    pub data: Value,
}

/// Typed view of a value record, keyed by its `type`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueKind<'a> {
    /// A redirect target record
    Url(&'a Value),
    /// Any other handle value type, passed through untouched
    Other(&'a str, &'a Value),
}

impl HandleValue {
    pub fn typed(&self) -> ValueKind<'_> {
        if self.kind == URL_TYPE {
            ValueKind::Url(&self.data)
        } else {
            ValueKind::Other(&self.kind, &self.data)
        }
    }
}

impl HandleResponse {
    /// Decodes a raw API response body
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(Error::Decode)
    }

    /// Returns the redirect URL carried by the first `URL` record
    ///
    /// Later `URL` records are ignored, even when the first one is unusable.
    pub fn redirect_url(&self) -> Result<String> {
        let data = self
            .values
            .iter()
            .find_map(|value| match value.typed() {
                ValueKind::Url(data) => Some(data),
                ValueKind::Other(..) => None,
            })
            .ok_or(NoRedirect::MissingUrlRecord)?;

        let Value::Object(fields) = data else {
            return Err(Error::UnexpectedUrlData {
                found: json_shape(data),
            });
        };

        match fields.get("value") {
            Some(Value::String(url)) => Ok(url.clone()),
            Some(other) => Ok(other.to_string()),
            None => Err(NoRedirect::MissingValueKey.into()),
        }
    }
}

/// Deserializes `T`, falling back to its default when the JSON has another shape
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Like [`lenient`] but per element, so one bad record keeps its slot as a
/// zero value instead of emptying the whole list
fn lenient_list<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .map(|item| serde_json::from_value(item).unwrap_or_default())
        .collect())
}

fn json_shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
