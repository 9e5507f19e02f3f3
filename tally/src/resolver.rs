//! Session directory and last-call-wins counter resolution.
//!
//! Every `resolve` call takes a strictly increasing id and cancels the token
//! of the lookup before it. When a lookup finishes, its outcome is applied
//! only if its id is still the latest one issued; anything older is dropped
//! on arrival and its caller sees `Cancelled`.

use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, CounterApi, CounterPath, CounterResponse, CounterSession};
use crate::directory::NamespaceKeyDirectory;

/// Result of looking up one (namespace, key) pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolutionOutcome {
    Exists(i64),
    NotFound,
    /// No lookup was performed (empty input) or the lookup was superseded.
    Cancelled,
    TransportError(String),
}

impl ResolutionOutcome {
    fn from_lookup(result: Result<CounterResponse, ApiError>) -> Self {
        match result {
            Ok(CounterResponse {
                current_value: Some(value),
                ..
            }) => ResolutionOutcome::Exists(value),
            // A counter without a value is reported the same way as a missing one.
            Ok(_) | Err(ApiError::NotFound) => ResolutionOutcome::NotFound,
            Err(ApiError::Cancelled) => ResolutionOutcome::Cancelled,
            Err(e) => ResolutionOutcome::TransportError(e.to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProceedLabel {
    #[default]
    Create,
    Load,
}

impl fmt::Display for ProceedLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProceedLabel::Create => f.write_str("Create"),
            ProceedLabel::Load => f.write_str("Load"),
        }
    }
}

/// Whether the proceed action is available and what it should say.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProceedState {
    pub enabled: bool,
    pub label: ProceedLabel,
}

impl ProceedState {
    fn load() -> Self {
        Self {
            enabled: true,
            label: ProceedLabel::Load,
        }
    }

    fn create() -> Self {
        Self {
            enabled: true,
            label: ProceedLabel::Create,
        }
    }
}

/// Everything the home surface renders.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HomeView {
    pub proceed: ProceedState,
    pub directory: NamespaceKeyDirectory,
    /// Selected (section, row) in the directory list.
    pub selected: Option<(usize, usize)>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProceedError {
    #[error("namespace and key must both be non-empty")]
    EmptyInput,
    #[error("already loading a counter")]
    Busy,
    #[error("superseded by a newer lookup")]
    Superseded,
    #[error("counter service unavailable: {0}")]
    Transport(String),
}

struct InFlight {
    id: u64,
    path: CounterPath,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Inner {
    latest: u64,
    in_flight: Option<InFlight>,
    proceeding: bool,
}

/// Marks a `proceed` as running until dropped, even if its future is.
struct ProceedGuard<'a>(&'a Mutex<Inner>);

impl<'a> ProceedGuard<'a> {
    fn acquire(inner: &'a Mutex<Inner>) -> Option<Self> {
        let mut guard = inner.lock().unwrap();
        if guard.proceeding {
            return None;
        }
        guard.proceeding = true;
        Some(Self(inner))
    }
}

impl Drop for ProceedGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.0.lock() {
            inner.proceeding = false;
        }
    }
}

/// Whether a lookup's outcome drives the published proceed state.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Publish {
    Yes,
    No,
}

/// Owns the namespace/key directory and the single live lookup.
///
/// The mutex is never held across an await; the published [`HomeView`] is
/// only modified while it is held, so watchers never see a partial update.
pub struct SessionResolver {
    api: Arc<dyn CounterApi>,
    inner: Mutex<Inner>,
    view: watch::Sender<HomeView>,
}

impl SessionResolver {
    pub fn new(api: Arc<dyn CounterApi>) -> Self {
        Self::with_directory(api, NamespaceKeyDirectory::new())
    }

    pub fn with_directory(api: Arc<dyn CounterApi>, directory: NamespaceKeyDirectory) -> Self {
        let (view, _) = watch::channel(HomeView {
            directory,
            ..HomeView::default()
        });
        Self {
            api,
            inner: Mutex::new(Inner::default()),
            view,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<HomeView> {
        self.view.subscribe()
    }

    pub fn view(&self) -> HomeView {
        self.view.borrow().clone()
    }

    pub fn proceed_state(&self) -> ProceedState {
        self.view.borrow().proceed
    }

    pub fn directory(&self) -> NamespaceKeyDirectory {
        self.view.borrow().directory.clone()
    }

    /// Session handle for a pair, without any lookup.
    pub fn session(&self, path: CounterPath) -> CounterSession {
        CounterSession::new(Arc::clone(&self.api), path)
    }

    /// Look up whether a counter exists, superseding any lookup in flight.
    ///
    /// Empty input performs no network call and disables the proceed action.
    pub async fn resolve(&self, namespace: &str, key: &str) -> ResolutionOutcome {
        self.lookup(namespace, key, Publish::Yes).await
    }

    async fn lookup(&self, namespace: &str, key: &str, publish: Publish) -> ResolutionOutcome {
        let (id, path, cancel) = {
            let mut inner = self.inner.lock().unwrap();
            inner.latest += 1;
            let id = inner.latest;
            if let Some(prev) = inner.in_flight.take() {
                tracing::debug!("lookup #{} for {} superseded by #{id}", prev.id, prev.path);
                prev.cancel.cancel();
            }
            if namespace.is_empty() || key.is_empty() {
                self.view.send_modify(|v| v.proceed.enabled = false);
                return ResolutionOutcome::Cancelled;
            }
            let path = CounterPath::new(namespace, key);
            let cancel = CancellationToken::new();
            inner.in_flight = Some(InFlight {
                id,
                path: path.clone(),
                cancel: cancel.clone(),
            });
            (id, path, cancel)
        };

        tracing::debug!("lookup #{id} for {path}");
        let result = tokio::select! {
            _ = cancel.cancelled() => Err(ApiError::Cancelled),
            r = self.api.get_counter(&path) => r,
        };
        self.apply(id, &path, ResolutionOutcome::from_lookup(result), publish)
    }

    fn apply(
        &self,
        id: u64,
        path: &CounterPath,
        outcome: ResolutionOutcome,
        publish: Publish,
    ) -> ResolutionOutcome {
        let mut inner = self.inner.lock().unwrap();
        if inner.latest != id {
            tracing::debug!("dropping stale lookup #{id} for {path}: {outcome:?}");
            return ResolutionOutcome::Cancelled;
        }
        inner.in_flight = None;
        match &outcome {
            ResolutionOutcome::Exists(_) if publish == Publish::Yes => {
                self.view.send_modify(|v| v.proceed = ProceedState::load())
            }
            ResolutionOutcome::NotFound if publish == Publish::Yes => {
                self.view.send_modify(|v| v.proceed = ProceedState::create())
            }
            ResolutionOutcome::Exists(_) | ResolutionOutcome::NotFound => {}
            // A cancellation reported by the transport itself says nothing
            // about whether the counter exists.
            ResolutionOutcome::Cancelled => {
                tracing::debug!("lookup #{id} for {path} cancelled by transport");
            }
            ResolutionOutcome::TransportError(cause) => {
                tracing::warn!("lookup for {path} failed: {cause}");
                self.view.send_modify(|v| v.proceed.enabled = false);
            }
        }
        outcome
    }

    /// Resolve the pair and create the counter if it does not exist yet.
    ///
    /// A created counter comes back as `Exists` with the service's starting
    /// value (0 if the service does not report one).
    pub async fn create_if_absent(&self, namespace: &str, key: &str) -> ResolutionOutcome {
        self.ensure_exists(namespace, key, Publish::Yes).await
    }

    async fn ensure_exists(&self, namespace: &str, key: &str, publish: Publish) -> ResolutionOutcome {
        match self.lookup(namespace, key, publish).await {
            ResolutionOutcome::NotFound => {
                let path = CounterPath::new(namespace, key);
                match self.api.create_counter(&path, None).await {
                    Ok(resp) => {
                        tracing::info!("created counter {path}");
                        ResolutionOutcome::Exists(resp.current_value.unwrap_or_default())
                    }
                    Err(e) if e.is_cancelled() => ResolutionOutcome::Cancelled,
                    Err(e) => {
                        tracing::warn!("creating {path} failed: {e}");
                        ResolutionOutcome::TransportError(e.to_string())
                    }
                }
            }
            other => other,
        }
    }

    /// The proceed action: load or create the counter, then remember the
    /// pair and hand back a session for it.
    ///
    /// The action stays disabled until this returns, and a second call while
    /// one is running is refused with [`ProceedError::Busy`].
    pub async fn proceed(&self, namespace: &str, key: &str) -> Result<CounterSession, ProceedError> {
        if namespace.is_empty() || key.is_empty() {
            return Err(ProceedError::EmptyInput);
        }
        let running = ProceedGuard::acquire(&self.inner).ok_or(ProceedError::Busy)?;
        self.view.send_modify(|v| v.proceed.enabled = false);
        let outcome = self.ensure_exists(namespace, key, Publish::No).await;
        drop(running);

        match outcome {
            ResolutionOutcome::Exists(_) => {
                let _inner = self.inner.lock().unwrap();
                self.view.send_modify(|v| {
                    v.directory.commit_selection(namespace, key);
                    v.proceed = ProceedState::load();
                });
                Ok(self.session(CounterPath::new(namespace, key)))
            }
            // ensure_exists never reports NotFound.
            ResolutionOutcome::NotFound | ResolutionOutcome::Cancelled => {
                Err(ProceedError::Superseded)
            }
            ResolutionOutcome::TransportError(cause) => Err(ProceedError::Transport(cause)),
        }
    }

    /// Remember a pair. Returns `false` if it was already known.
    pub fn commit_selection(&self, namespace: &str, key: &str) -> bool {
        let _inner = self.inner.lock().unwrap();
        self.view
            .send_if_modified(|v| v.directory.commit_selection(namespace, key))
    }

    /// Forget a pair. Returns `false` if it was not known.
    pub fn remove_key(&self, namespace: &str, key: &str) -> bool {
        let _inner = self.inner.lock().unwrap();
        self.view.send_if_modified(|v| {
            let removed = v.directory.remove_key(namespace, key);
            if removed {
                v.selected = None;
            }
            removed
        })
    }

    /// Forget the pair at a list index path.
    pub fn remove_at(&self, section: usize, row: usize) -> Option<CounterPath> {
        let _inner = self.inner.lock().unwrap();
        let mut removed = None;
        self.view.send_if_modified(|v| {
            removed = v.directory.remove_at(section, row);
            if removed.is_some() {
                v.selected = None;
            }
            removed.is_some()
        });
        removed
    }

    /// Mark a directory row as selected and return its pair.
    pub fn select(&self, section: usize, row: usize) -> Option<CounterPath> {
        let _inner = self.inner.lock().unwrap();
        let path = self.view.borrow().directory.get(section, row)?;
        self.view.send_modify(|v| v.selected = Some((section, row)));
        Some(path)
    }

    /// Text editing started; any list selection no longer applies.
    pub fn begin_edit(&self) {
        let _inner = self.inner.lock().unwrap();
        self.view.send_if_modified(|v| v.selected.take().is_some());
    }
}
