//! The call-wrapping decorator and the registry that switches it on and off.

use std::any::type_name;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use super::{recording, replaying};
use crate::cassette::session::{lock, Mode, SessionState};
use crate::error::Error;
use crate::ports::{CallFuture, Message, RpcClient};

/// Install flag for one wrapped client.
#[derive(Debug)]
struct Tap {
    client: &'static str,
    installed: AtomicBool,
}

impl Tap {
    fn is_installed(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }

    /// Returns `true` if the flag actually changed.
    fn set_installed(&self, on: bool) -> bool {
        self.installed.swap(on, Ordering::SeqCst) != on
    }
}

/// An RPC client whose calls are routed through the active cassette session.
///
/// While uninstalled it behaves exactly like the client it wraps.
pub struct InterceptedClient<C> {
    inner: C,
    tap: Arc<Tap>,
    session: Arc<SessionState>,
}

impl<C> InterceptedClient<C> {
    /// The original, unwrapped client.
    #[must_use]
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Whether the interceptor is currently installed on this client.
    #[must_use]
    pub fn is_wrapped(&self) -> bool {
        self.tap.is_installed()
    }
}

impl<C: RpcClient> RpcClient for InterceptedClient<C> {
    fn request_response<'a>(&'a self, method: &'a str, request: &'a Message) -> CallFuture<'a> {
        Box::pin(async move {
            if !self.tap.is_installed() {
                return self.inner.request_response(method, request).await;
            }
            let Some(active) = self.session.current() else {
                tracing::warn!(
                    %method,
                    client = self.tap.client,
                    "intercepted call with no active cassette"
                );
                return Err(Error::NoCassette);
            };
            match active.mode {
                Mode::Recording => {
                    recording::record_call(&self.inner, &self.session, &active, method, request)
                        .await
                }
                Mode::Playing => replaying::replay_call(&self.session, &active, method, request),
                Mode::Idle => Err(Error::NoCassette),
            }
        })
    }
}

/// Registry of wrapped clients for one session controller.
///
/// [`begin`](Self::begin) and [`end`](Self::end) are idempotent: a client is
/// never wrapped twice, and ending twice is harmless.
#[derive(Debug)]
pub struct Interceptor {
    session: Arc<SessionState>,
    registry: Mutex<Registry>,
}

#[derive(Debug, Default)]
struct Registry {
    active: bool,
    taps: Vec<Weak<Tap>>,
}

impl Registry {
    /// Live taps; entries whose client was dropped are pruned.
    fn live(&mut self) -> Vec<Arc<Tap>> {
        self.taps.retain(|tap| tap.strong_count() > 0);
        self.taps.iter().filter_map(Weak::upgrade).collect()
    }
}

impl Interceptor {
    /// Creates an empty registry dispatching on `session`.
    #[must_use]
    pub fn new(session: Arc<SessionState>) -> Self {
        Self {
            session,
            registry: Mutex::new(Registry::default()),
        }
    }

    /// Registers `client` and returns its wrapper.
    ///
    /// If the interceptor is active the wrapper is installed straight away.
    pub fn attach<C: RpcClient>(&self, client: C) -> InterceptedClient<C> {
        let mut registry = lock(&self.registry);
        let tap = Arc::new(Tap {
            client: type_name::<C>(),
            installed: AtomicBool::new(registry.active),
        });
        registry.taps.push(Arc::downgrade(&tap));
        tracing::debug!(
            client = tap.client,
            installed = registry.active,
            "attached client"
        );
        InterceptedClient {
            inner: client,
            tap,
            session: Arc::clone(&self.session),
        }
    }

    /// Installs the wrapper on every attached client not already wrapped.
    ///
    /// Returns how many clients were newly wrapped.
    pub fn begin(&self) -> usize {
        self.switch(true)
    }

    /// Removes the wrapper from every wrapped client.
    ///
    /// Returns how many clients were unwrapped.
    pub fn end(&self) -> usize {
        self.switch(false)
    }

    /// Whether wrappers are currently being installed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        lock(&self.registry).active
    }

    /// Number of attached clients currently wrapped.
    #[must_use]
    pub fn installed(&self) -> usize {
        lock(&self.registry)
            .live()
            .iter()
            .filter(|tap| tap.is_installed())
            .count()
    }

    fn switch(&self, on: bool) -> usize {
        let mut registry = lock(&self.registry);
        registry.active = on;
        let mut changed = 0;
        for tap in registry.live() {
            if tap.set_installed(on) {
                tracing::debug!(client = tap.client, installed = on, "switched interceptor");
                changed += 1;
            }
        }
        changed
    }
}
