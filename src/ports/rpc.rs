//! RPC client port: the call-invocation boundary the harness wraps.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Boxed future type alias used by [`RpcClient`] to keep the trait dyn-compatible.
pub type CallFuture<'a> = Pin<Box<dyn Future<Output = Result<Message, Error>> + Send + 'a>>;

/// A single field value inside a [`Message`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Boolean scalar.
    Bool(bool),
    /// Signed integer scalar.
    Int(i64),
    /// Unsigned integer scalar.
    Uint(u64),
    /// Double precision scalar. Must be finite to be recorded.
    Double(f64),
    /// UTF-8 string.
    String(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Enum value by number.
    Enum(i32),
    /// Repeated field.
    List(Vec<Field>),
    /// Nested message.
    Message(Message),
}

impl Field {
    /// Returns the value as `i64` when it is a signed integer.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as `f64` when it is a double.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as `&str` when it is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the nested message, if any.
    #[must_use]
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Self::Message(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for Field {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Field {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Field {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u64> for Field {
    fn from(v: u64) -> Self {
        Self::Uint(v)
    }
}

impl From<f64> for Field {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Field {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Field {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<u8>> for Field {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<Vec<Field>> for Field {
    fn from(v: Vec<Field>) -> Self {
        Self::List(v)
    }
}

impl From<Message> for Field {
    fn from(v: Message) -> Self {
        Self::Message(v)
    }
}

/// A dynamic RPC message: a type name plus an unordered set of named fields.
///
/// Field storage order is whatever the hash map gives; nothing that compares
/// or persists messages may depend on it. See [`crate::cassette::codec`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    type_name: String,
    fields: HashMap<String, Field>,
}

impl Message {
    /// Creates an empty message of the given fully-qualified type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: HashMap::new(),
        }
    }

    /// Builder-style field setter.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Field>) -> Self {
        self.set(name, value);
        self
    }

    /// Sets (or replaces) a field.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Field>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Returns a field by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// The message's fully-qualified type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Iterates over fields in unspecified order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Issues unary RPC calls.
///
/// Implemented by generated or vendored client stubs, and by
/// [`crate::adapters::InterceptedClient`], which wraps another client.
pub trait RpcClient: Send + Sync {
    /// Sends `request` to `method` and resolves to the response message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`] when the service call fails, or one of the
    /// harness errors when the call is intercepted.
    fn request_response<'a>(&'a self, method: &'a str, request: &'a Message) -> CallFuture<'a>;
}

impl<C: RpcClient + ?Sized> RpcClient for Arc<C> {
    fn request_response<'a>(&'a self, method: &'a str, request: &'a Message) -> CallFuture<'a> {
        (**self).request_response(method, request)
    }
}

impl<C: RpcClient + ?Sized> RpcClient for Box<C> {
    fn request_response<'a>(&'a self, method: &'a str, request: &'a Message) -> CallFuture<'a> {
        (**self).request_response(method, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_and_replaces_fields() {
        let msg = Message::new("shop.GetPriceRequest")
            .with("sku", 42)
            .with("sku", 43);
        assert_eq!(msg.type_name(), "shop.GetPriceRequest");
        assert_eq!(msg.get("sku").and_then(Field::as_i64), Some(43));
        assert_eq!(msg.fields().count(), 1);
    }

    #[test]
    fn equality_ignores_insertion_order() {
        let a = Message::new("m").with("a", 1).with("b", "x");
        let b = Message::new("m").with("b", "x").with("a", 1);
        assert_eq!(a, b);
    }
}
