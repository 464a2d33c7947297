//! Canonical request/response forms used for matching and persistence.
//!
//! A message is turned into a `serde_json::Value` whose objects always have
//! their keys in lexicographic order, whatever map type serde_json was built
//! with and whatever order the message's fields were inserted in. Two calls
//! with the same method and the same field values therefore encode to equal
//! requests and to identical bytes on disk.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::ports::{Field, Message};

/// A captured call: method identifier plus canonical argument payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    method: String,
    payload: Value,
}

impl Request {
    /// Fully-qualified method identifier, e.g. `"/shop.Prices/GetPrice"`.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Canonical argument payload.
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }
}

/// A captured response in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Response {
    payload: Value,
}

impl Response {
    /// Canonical response payload.
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }
}

/// Encodes a call into its canonical [`Request`].
///
/// # Errors
///
/// Returns [`Error::Encoding`] if the message holds a value that has no
/// canonical form (a NaN or infinite double).
pub fn encode_request(method: &str, message: &Message) -> Result<Request> {
    Ok(Request {
        method: method.to_string(),
        payload: canonical_message(message)?,
    })
}

/// Encodes a return value into its canonical [`Response`].
///
/// # Errors
///
/// Returns [`Error::Encoding`] under the same conditions as [`encode_request`].
pub fn encode_response(message: &Message) -> Result<Response> {
    Ok(Response {
        payload: canonical_message(message)?,
    })
}

/// Rebuilds the message a [`Response`] was encoded from.
///
/// # Errors
///
/// Returns [`Error::Encoding`] if the payload is not a valid encoded message,
/// which only happens for hand-edited cassette files.
pub fn decode_response(response: &Response) -> Result<Message> {
    Message::deserialize(&response.payload).map_err(|e| {
        let reason = format!("recorded response does not decode: {e}");
        Error::Encoding(reason)
    })
}

fn canonical_message(message: &Message) -> Result<Value> {
    check_message(message, message.type_name())?;
    let value = serde_json::to_value(message).map_err(encoding)?;
    Ok(sort_keys(value))
}

/// Rejects values serde_json would silently turn into `null`.
fn check_message(message: &Message, path: &str) -> Result<()> {
    for (name, field) in message.fields() {
        check_field(field, &format!("{path}.{name}"))?;
    }
    Ok(())
}

fn check_field(field: &Field, path: &str) -> Result<()> {
    match field {
        Field::Double(v) if !v.is_finite() => {
            let reason = format!("field {path} holds non-finite double {v}");
            Err(Error::Encoding(reason))
        }
        Field::List(items) => {
            for (i, item) in items.iter().enumerate() {
                check_field(item, &format!("{path}[{i}]"))?;
            }
            Ok(())
        }
        Field::Message(nested) => check_message(nested, path),
        _ => Ok(()),
    }
}

fn encoding(err: serde_json::Error) -> Error {
    Error::Encoding(err.to_string())
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let sorted: Map<String, Value> = entries
                .into_iter()
                .map(|(k, v)| (k, sort_keys(v)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}
