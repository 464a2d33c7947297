//! Session state and the controller that scopes record/play sessions.

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use super::config::StoreConfig;
use super::format::Cassette;
use super::store::CassetteStore;
use crate::adapters::{InterceptedClient, Interceptor};
use crate::error::{Error, Result};
use crate::ports::RpcClient;

/// Locks a mutex, recovering the data if a previous holder panicked.
///
/// Every critical section in this crate leaves its data consistent, so a
/// poisoned lock carries no torn state.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cassette owned by the session running anywhere in this process.
///
/// Claimed by [`SessionState::begin`] and released when that session ends, so
/// two controllers can never run sessions at the same time.
static RUNNING: Mutex<Option<String>> = Mutex::new(None);

/// Name of the cassette of the session running in this process, if any.
pub(crate) fn running_cassette() -> Option<String> {
    lock(&RUNNING).clone()
}

/// What intercepted calls currently do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// No session; wrappers are uninstalled and calls pass through.
    Idle,
    /// Calls go to the live client and are captured.
    Recording,
    /// Calls are answered from the loaded cassette.
    Playing,
}

/// The running session as seen by an intercepted call.
#[derive(Debug, Clone)]
pub(crate) struct ActiveSession {
    pub(crate) id: u64,
    pub(crate) mode: Mode,
    pub(crate) name: String,
    pub(crate) cassette: Arc<Mutex<Cassette>>,
}

/// Active cassette and mode, shared by a controller and its wrappers.
///
/// At most one session is active in the whole process: beginning a session
/// claims a process-wide slot that every `SessionState` checks. Lock order is
/// cassette, then state, then the process-wide slot.
#[derive(Debug, Default)]
pub struct SessionState {
    active: Mutex<Option<ActiveSession>>,
    next_id: AtomicU64,
}

impl SessionState {
    /// Current mode; [`Mode::Idle`] when no session is active.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.current().map_or(Mode::Idle, |active| active.mode)
    }

    /// Name of the active cassette, if any.
    #[must_use]
    pub fn cassette_name(&self) -> Option<String> {
        self.current().map(|active| active.name)
    }

    pub(crate) fn current(&self) -> Option<ActiveSession> {
        lock(&self.active).clone()
    }

    pub(crate) fn is_current(&self, id: u64) -> bool {
        lock(&self.active)
            .as_ref()
            .is_some_and(|active| active.id == id)
    }

    pub(crate) fn begin(&self, mode: Mode, cassette: Cassette) -> Result<u64> {
        let mut slot = lock(&self.active);
        let mut running = lock(&RUNNING);
        if let Some(active) = running.as_ref() {
            return Err(Error::SessionAlreadyActive {
                active: active.clone(),
            });
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let name = cassette.name().to_string();
        *running = Some(name.clone());
        *slot = Some(ActiveSession {
            id,
            mode,
            name,
            cassette: Arc::new(Mutex::new(cassette)),
        });
        Ok(id)
    }

    /// Retires session `id`, returning it if it was still the active one.
    pub(crate) fn end(&self, id: u64) -> Option<ActiveSession> {
        let mut slot = lock(&self.active);
        if !slot.as_ref().is_some_and(|active| active.id == id) {
            return None;
        }
        *lock(&RUNNING) = None;
        slot.take()
    }
}

impl Drop for SessionState {
    fn drop(&mut self) {
        if lock(&self.active).take().is_some() {
            *lock(&RUNNING) = None;
        }
    }
}

/// Owns the session state, the interceptor and the store, and scopes
/// recording and playback sessions over them.
///
/// ```no_run
/// # async fn demo(live: rpctape::LocalClient) -> rpctape::Result<()> {
/// use rpctape::{Message, RpcClient, SessionController, StoreConfig};
///
/// let controller = SessionController::new(StoreConfig::new("tests/cassettes"));
/// let client = controller.intercept(live);
/// let request = Message::new("shop.GetPriceRequest").with("sku", 42);
///
/// controller
///     .record("checkout", || async { client.request_response("GetPrice", &request).await })
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SessionController {
    store: CassetteStore,
    session: Arc<SessionState>,
    interceptor: Interceptor,
}

static GLOBAL: OnceLock<SessionController> = OnceLock::new();

impl SessionController {
    /// Creates a controller storing cassettes at `config`'s location.
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        let session = Arc::new(SessionState::default());
        let interceptor = Interceptor::new(Arc::clone(&session));
        Self {
            store: CassetteStore::new(config),
            session,
            interceptor,
        }
    }

    /// The process-wide controller, configured from the environment on first use.
    ///
    /// Falls back to the default cassette location if the environment
    /// configuration is unusable.
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(|| {
            let config = StoreConfig::from_env().unwrap_or_else(|err| {
                tracing::warn!(error = %err, "using default cassette location");
                StoreConfig::default()
            });
            Self::new(config)
        })
    }

    /// The cassette store.
    #[must_use]
    pub fn store(&self) -> &CassetteStore {
        &self.store
    }

    /// The interceptor holding this controller's wrapped clients.
    #[must_use]
    pub fn interceptor(&self) -> &Interceptor {
        &self.interceptor
    }

    /// Current mode of this controller's session.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.session.mode()
    }

    /// Name of the cassette owned by this controller's running session, if any.
    #[must_use]
    pub fn active_cassette(&self) -> Option<String> {
        self.session.cassette_name()
    }

    /// Wraps `client` so its calls follow this controller's sessions.
    pub fn intercept<C: RpcClient>(&self, client: C) -> InterceptedClient<C> {
        self.interceptor.attach(client)
    }

    /// Deletes every persisted cassette.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if a cassette file cannot be removed.
    pub fn delete_all_cassettes(&self) -> Result<usize> {
        self.store.delete_all()
    }

    /// Starts recording into a fresh cassette named `name`.
    ///
    /// The session lasts until the returned guard is finished or dropped; the
    /// cassette is saved at that point.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidName`] if `name` cannot be stored
    /// - [`Error::SessionAlreadyActive`] if a session is running anywhere in
    ///   the process
    pub fn start_recording(&self, name: &str) -> Result<SessionGuard<'_>> {
        self.store.path_for(name)?;
        let id = self.session.begin(Mode::Recording, Cassette::new(name))?;
        Ok(self.activate(id, Mode::Recording, name))
    }

    /// Loads cassette `name` and starts replaying it.
    ///
    /// # Errors
    ///
    /// - [`Error::SessionAlreadyActive`] if a session is running anywhere in
    ///   the process
    /// - [`Error::NotFound`], [`Error::UnsupportedVersion`] or [`Error::Parse`]
    ///   if the cassette cannot be loaded
    pub fn start_playing(&self, name: &str) -> Result<SessionGuard<'_>> {
        if let Some(active) = running_cassette() {
            return Err(Error::SessionAlreadyActive { active });
        }
        let cassette = self.store.load(name)?;
        let id = self.session.begin(Mode::Playing, cassette)?;
        Ok(self.activate(id, Mode::Playing, name))
    }

    /// Records every intercepted call made while `body` runs into cassette
    /// `name`, then saves it.
    ///
    /// Teardown and saving happen whether `body` succeeds, fails, panics or
    /// is dropped. If both `body` and the save fail, the body's error wins and
    /// the save failure is logged.
    ///
    /// # Errors
    ///
    /// Returns `body`'s error, or any error of
    /// [`start_recording`](Self::start_recording) or of saving the cassette.
    pub async fn record<F, Fut, T, E>(&self, name: &str, body: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<Error>,
    {
        let guard = self.start_recording(name)?;
        let outcome = body().await;
        let saved = guard.finish();
        match (outcome, saved) {
            (Ok(value), Ok(_)) => Ok(value),
            (Ok(_), Err(err)) => Err(err.into()),
            (Err(err), Ok(_)) => Err(err),
            (Err(err), Err(save_err)) => {
                tracing::error!(
                    cassette = name,
                    error = %save_err,
                    "failed to save cassette after the session body failed"
                );
                Err(err)
            }
        }
    }

    /// Answers every intercepted call made while `body` runs from cassette
    /// `name`.
    ///
    /// The cassette is loaded before `body` starts; load failures are
    /// returned without running it.
    ///
    /// # Errors
    ///
    /// Returns `body`'s error or any error of [`start_playing`](Self::start_playing).
    pub async fn play<F, Fut, T, E>(&self, name: &str, body: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<Error>,
    {
        let guard = self.start_playing(name)?;
        let outcome = body().await;
        guard.finish()?;
        outcome
    }

    fn activate(&self, id: u64, mode: Mode, name: &str) -> SessionGuard<'_> {
        let wrapped = self.interceptor.begin();
        tracing::info!(cassette = name, ?mode, wrapped, "cassette session started");
        SessionGuard {
            controller: self,
            id,
            mode,
            name: name.to_string(),
            done: false,
        }
    }

    fn teardown(&self, id: u64) -> Result<Option<PathBuf>> {
        let unwrapped = self.interceptor.end();
        let Some(active) = self.session.end(id) else {
            return Ok(None);
        };
        let cassette = lock(&active.cassette).clone();
        tracing::info!(
            cassette = cassette.name(),
            mode = ?active.mode,
            pairs = cassette.len(),
            unwrapped,
            "cassette session finished"
        );
        match active.mode {
            Mode::Recording => self.store.save(&cassette).map(Some),
            Mode::Playing | Mode::Idle => Ok(None),
        }
    }
}

/// Keeps a record/play session alive; ends it on [`finish`](Self::finish) or drop.
#[must_use = "dropping the guard ends the session immediately"]
#[derive(Debug)]
pub struct SessionGuard<'a> {
    controller: &'a SessionController,
    id: u64,
    mode: Mode,
    name: String,
    done: bool,
}

impl SessionGuard<'_> {
    /// Mode of this session.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Name of the cassette this session uses.
    #[must_use]
    pub fn cassette_name(&self) -> &str {
        &self.name
    }

    /// Ends the session: unwraps clients, returns state to idle and, when
    /// recording, saves the cassette.
    ///
    /// Returns the saved path for a recording session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the recorded cassette cannot be saved. The
    /// session is ended regardless.
    pub fn finish(mut self) -> Result<Option<PathBuf>> {
        self.done = true;
        self.controller.teardown(self.id)
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        if let Err(err) = self.controller.teardown(self.id) {
            tracing::error!(
                cassette = %self.name,
                error = %err,
                "failed to save cassette during teardown"
            );
        }
    }
}

/// Serializes tests that start sessions, since only one may run per process.
#[cfg(test)]
pub(crate) fn exclusive() -> MutexGuard<'static, ()> {
    static EXCLUSIVE: Mutex<()> = Mutex::new(());
    lock(&EXCLUSIVE)
}
