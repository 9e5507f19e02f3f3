pub mod api;
pub mod config;
pub mod counter;
pub mod directory;
pub mod http;
pub mod resolver;

// Re-exports
pub use api::{ApiError, CounterApi, CounterPath, CounterResponse, CounterSession};
pub use config::{ConfigError, HistoryEntry, TallyConfig};
pub use counter::{CounterHandlers, CounterPanel, CounterPanelError, CounterView};
pub use directory::NamespaceKeyDirectory;
pub use http::HttpCounterApi;
pub use resolver::{
    HomeView, ProceedError, ProceedLabel, ProceedState, ResolutionOutcome, SessionResolver,
};
