use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::api::{ApiError, CounterResponse, CounterSession};

/// What the counter panel asks its owner to do. Passed in at construction;
/// a panel cannot exist without one.
#[async_trait::async_trait]
pub trait CounterHandlers: Send + Sync + 'static {
    async fn on_increment_requested(&self) -> Result<CounterResponse, ApiError>;
    async fn on_decrement_requested(&self) -> Result<CounterResponse, ApiError>;
    async fn on_refresh_requested(&self) -> Result<CounterResponse, ApiError>;
}

#[async_trait::async_trait]
impl CounterHandlers for CounterSession {
    async fn on_increment_requested(&self) -> Result<CounterResponse, ApiError> {
        self.increment().await
    }

    async fn on_decrement_requested(&self) -> Result<CounterResponse, ApiError> {
        self.decrement().await
    }

    async fn on_refresh_requested(&self) -> Result<CounterResponse, ApiError> {
        self.value().await
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CounterView {
    /// `"namespace/key"`, empty until known.
    pub title: String,
    pub value: i64,
    /// A request is outstanding; the value should not be trusted yet.
    pub busy: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum CounterPanelError {
    #[error("counter panel built without increment/decrement handlers")]
    MissingHandlers,
}

#[derive(Clone, Copy, Debug)]
enum Step {
    Increment,
    Decrement,
    Refresh,
}

#[derive(Default)]
pub struct CounterPanelBuilder {
    title: Option<String>,
    initial: Option<CounterResponse>,
    handlers: Option<Arc<dyn CounterHandlers>>,
}

impl CounterPanelBuilder {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Counter as last seen, shown until the first refresh lands.
    pub fn initial(mut self, response: CounterResponse) -> Self {
        self.initial = Some(response);
        self
    }

    pub fn handlers(mut self, handlers: Arc<dyn CounterHandlers>) -> Self {
        self.handlers = Some(handlers);
        self
    }

    pub fn build(self) -> Result<CounterPanel, CounterPanelError> {
        let handlers = self.handlers.ok_or(CounterPanelError::MissingHandlers)?;
        let initial = self.initial.unwrap_or_default();
        let title = initial.title().or(self.title).unwrap_or_default();
        let (view, _) = watch::channel(CounterView {
            title,
            value: initial.current_value.unwrap_or_default(),
            busy: false,
        });
        Ok(CounterPanel {
            handlers,
            steps: Mutex::default(),
            view,
        })
    }
}

/// Bookkeeping for requests that may overlap.
#[derive(Default)]
struct Steps {
    outstanding: usize,
    issued: u64,
    /// Id of the newest request whose reply is on screen.
    applied: u64,
}

/// Counts one outstanding request; busy clears once the last one ends.
struct Outstanding<'a>(&'a CounterPanel);

impl Drop for Outstanding<'_> {
    fn drop(&mut self) {
        if let Ok(mut steps) = self.0.steps.lock() {
            steps.outstanding -= 1;
            let busy = steps.outstanding > 0;
            self.0.view.send_if_modified(|v| std::mem::replace(&mut v.busy, busy) != busy);
        }
    }
}

/// Detail surface for one counter: current value plus +/- actions.
pub struct CounterPanel {
    handlers: Arc<dyn CounterHandlers>,
    steps: Mutex<Steps>,
    view: watch::Sender<CounterView>,
}

impl CounterPanel {
    pub fn builder() -> CounterPanelBuilder {
        CounterPanelBuilder::default()
    }

    pub fn for_session(session: CounterSession) -> Self {
        let (view, _) = watch::channel(CounterView {
            title: session.path().to_string(),
            ..CounterView::default()
        });
        Self {
            handlers: Arc::new(session),
            steps: Mutex::default(),
            view,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<CounterView> {
        self.view.subscribe()
    }

    pub fn view(&self) -> CounterView {
        self.view.borrow().clone()
    }

    pub async fn increment(&self) -> Result<i64, ApiError> {
        self.step(Step::Increment).await
    }

    pub async fn decrement(&self) -> Result<i64, ApiError> {
        self.step(Step::Decrement).await
    }

    pub async fn refresh(&self) -> Result<i64, ApiError> {
        self.step(Step::Refresh).await
    }

    /// Run one request. On failure the displayed value is kept, and a reply
    /// older than the one already shown is ignored.
    async fn step(&self, step: Step) -> Result<i64, ApiError> {
        let (id, _outstanding) = {
            let mut steps = self.steps.lock().unwrap();
            steps.outstanding += 1;
            steps.issued += 1;
            self.view.send_modify(|v| v.busy = true);
            (steps.issued, Outstanding(self))
        };
        let result = match step {
            Step::Increment => self.handlers.on_increment_requested().await,
            Step::Decrement => self.handlers.on_decrement_requested().await,
            Step::Refresh => self.handlers.on_refresh_requested().await,
        };
        match result {
            Ok(resp) => {
                let mut steps = self.steps.lock().unwrap();
                if id > steps.applied {
                    steps.applied = id;
                    self.view.send_modify(|v| {
                        if let Some(title) = resp.title() {
                            v.title = title;
                        }
                        if let Some(value) = resp.current_value {
                            v.value = value;
                        }
                    });
                } else {
                    tracing::debug!("{step:?} #{id} superseded by #{}", steps.applied);
                }
                Ok(self.view.borrow().value)
            }
            Err(e) => {
                tracing::warn!("{step:?} failed: {e}");
                Err(e)
            }
        }
    }
}
