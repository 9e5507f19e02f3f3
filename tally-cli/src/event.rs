use tally_core::{ApiError, CounterPath, CounterSession, HomeView, ProceedError, ResolutionOutcome};

/// Unified event type for the main loop.
pub enum AppEvent {
    Input(String),
    InputClosed,
    Home(HomeView),
    Resolved {
        path: CounterPath,
        outcome: ResolutionOutcome,
    },
    Opened(Result<CounterSession, ProceedError>),
    Stepped(Result<i64, ApiError>),
}
