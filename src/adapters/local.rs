//! In-process RPC client that routes methods to closures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::ports::{CallFuture, Message, RpcClient};

type Handler = Box<dyn Fn(&Message) -> Result<Message> + Send + Sync>;

/// A stand-in service: each method is answered by a handler closure.
///
/// Counts every call it serves, which makes it easy to assert that a replayed
/// session never reached the "live" service.
#[derive(Default)]
pub struct LocalClient {
    routes: HashMap<String, Handler>,
    calls: AtomicUsize,
}

impl LocalClient {
    /// Creates a client with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handler for `method`, replacing any previous one.
    #[must_use]
    pub fn route<F>(mut self, method: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Message) -> Result<Message> + Send + Sync + 'static,
    {
        self.routes.insert(method.into(), Box::new(handler));
        self
    }

    /// Number of calls served so far, including failed ones.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RpcClient for LocalClient {
    fn request_response<'a>(&'a self, method: &'a str, request: &'a Message) -> CallFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let handler = self
                .routes
                .get(method)
                .ok_or_else(|| Error::upstream(format!("unimplemented method {method}")))?;
            handler(request)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::Field;

    #[tokio::test]
    async fn routes_by_method_and_counts_calls() {
        let client = LocalClient::new().route("Double", |req| {
            let x = req.get("x").and_then(Field::as_i64).unwrap_or(0);
            Ok(Message::new("r").with("x", x * 2))
        });

        let request = Message::new("q").with("x", 21);
        let resp = client.request_response("Double", &request).await.unwrap();
        assert_eq!(resp.get("x").and_then(Field::as_i64), Some(42));

        let request = Message::new("q");
        let missing = client.request_response("Missing", &request).await;
        assert!(matches!(missing, Err(Error::Upstream(_))));
        assert_eq!(client.calls(), 2);
    }
}
