use std::sync::Arc;

use tally_core::{
    CounterPanel, CounterPath, HomeView, NamespaceKeyDirectory, ProceedState, ResolutionOutcome,
    SessionResolver,
};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::command::{self, COMMANDS, Command};
use crate::event::AppEvent;

#[derive(Clone, Copy)]
enum Step {
    Increment,
    Decrement,
    Refresh,
}

enum Screen {
    Home,
    Counter(Arc<CounterPanel>),
}

pub struct App {
    resolver: Arc<SessionResolver>,
    events: UnboundedSender<AppEvent>,
    namespace: String,
    key: String,
    screen: Screen,
    shown: HomeView,
}

/// Map a 1-based list number to its (section, row).
pub fn index_path(directory: &NamespaceKeyDirectory, number: usize) -> Option<(usize, usize)> {
    let mut remaining = number.checked_sub(1)?;
    for section in 0..directory.section_count() {
        let rows = directory.row_count(section);
        if remaining < rows {
            return Some((section, remaining));
        }
        remaining -= rows;
    }
    None
}

fn proceed_text(state: ProceedState) -> String {
    if state.enabled {
        format!("[{}]", state.label)
    } else {
        format!("[{}] (disabled)", state.label)
    }
}

impl App {
    pub fn new(resolver: Arc<SessionResolver>, events: UnboundedSender<AppEvent>) -> Self {
        let shown = resolver.view();
        Self {
            resolver,
            events,
            namespace: String::new(),
            key: String::new(),
            screen: Screen::Home,
            shown,
        }
    }

    pub async fn run(&mut self, mut rx: UnboundedReceiver<AppEvent>) -> anyhow::Result<()> {
        self.forward_home_view();
        println!("Counters");
        self.print_directory();
        println!("Type `help` for commands.");

        while let Some(event) = rx.recv().await {
            match event {
                AppEvent::Input(line) => {
                    if !self.handle_input(&line) {
                        break;
                    }
                }
                AppEvent::InputClosed => break,
                AppEvent::Home(view) => self.on_home_view(view),
                AppEvent::Resolved { path, outcome } => self.on_resolved(&path, &outcome),
                AppEvent::Opened(Ok(session)) => {
                    let panel = Arc::new(CounterPanel::for_session(session));
                    println!("{}", panel.view().title);
                    self.screen = Screen::Counter(Arc::clone(&panel));
                    self.spawn_step(panel, Step::Refresh);
                }
                AppEvent::Opened(Err(e)) => println!("could not open counter: {e}"),
                AppEvent::Stepped(Ok(value)) => {
                    if let Screen::Counter(panel) = &self.screen {
                        println!("{}: {value}", panel.view().title);
                    }
                }
                AppEvent::Stepped(Err(e)) => println!("request failed: {e}"),
            }
        }
        Ok(())
    }

    /// Returns `false` when the app should exit.
    fn handle_input(&mut self, line: &str) -> bool {
        if line.trim().is_empty() {
            return true;
        }
        let Some(cmd) = command::parse(line) else {
            println!("unknown command: {}", line.trim());
            return true;
        };
        let open = match &self.screen {
            Screen::Counter(panel) => Some(Arc::clone(panel)),
            Screen::Home => None,
        };
        match (cmd, open) {
            (Command::Quit, _) => return false,
            (Command::Help, _) => {
                for (cmd, desc) in COMMANDS {
                    println!("  {cmd:<12} {desc}");
                }
            }
            (Command::List, _) => self.print_directory(),
            (Command::Namespace(text), None) => {
                self.resolver.begin_edit();
                self.namespace = text;
                self.spawn_resolve();
            }
            (Command::Key(text), None) => {
                self.resolver.begin_edit();
                self.key = text;
                self.spawn_resolve();
            }
            (Command::Go, None) => {
                if self.resolver.proceed_state().enabled {
                    self.spawn_proceed(self.namespace.clone(), self.key.clone());
                } else {
                    println!("nothing to load yet");
                }
            }
            (Command::Open(n), None) => {
                let Some((section, row)) = index_path(&self.resolver.directory(), n) else {
                    println!("no entry {n}");
                    return true;
                };
                if let Some(path) = self.resolver.select(section, row) {
                    self.namespace = path.namespace.clone();
                    self.key = path.key.clone();
                    self.spawn_proceed(path.namespace, path.key);
                }
            }
            (Command::Remove(n), None) => {
                match index_path(&self.resolver.directory(), n)
                    .and_then(|(section, row)| self.resolver.remove_at(section, row))
                {
                    Some(path) => println!("forgot {path}"),
                    None => println!("no entry {n}"),
                }
            }
            (Command::Increment, Some(panel)) => self.spawn_step(panel, Step::Increment),
            (Command::Decrement, Some(panel)) => self.spawn_step(panel, Step::Decrement),
            (Command::Refresh, Some(panel)) => self.spawn_step(panel, Step::Refresh),
            (Command::Back, Some(_)) => {
                self.screen = Screen::Home;
                println!("Counters");
                self.print_directory();
                self.spawn_resolve();
            }
            (_, None) => println!("open a counter first"),
            (_, Some(_)) => println!("go `back` first"),
        }
        true
    }

    fn spawn_resolve(&self) {
        let resolver = Arc::clone(&self.resolver);
        let events = self.events.clone();
        let path = CounterPath::new(self.namespace.as_str(), self.key.as_str());
        tokio::spawn(async move {
            let outcome = resolver.resolve(&path.namespace, &path.key).await;
            let _ = events.send(AppEvent::Resolved { path, outcome });
        });
    }

    fn spawn_proceed(&self, namespace: String, key: String) {
        let resolver = Arc::clone(&self.resolver);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = resolver.proceed(&namespace, &key).await;
            let _ = events.send(AppEvent::Opened(result));
        });
    }

    fn spawn_step(&self, panel: Arc<CounterPanel>, step: Step) {
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = match step {
                Step::Increment => panel.increment().await,
                Step::Decrement => panel.decrement().await,
                Step::Refresh => panel.refresh().await,
            };
            let _ = events.send(AppEvent::Stepped(result));
        });
    }

    /// Push every published `HomeView` into the event loop.
    fn forward_home_view(&self) {
        let mut rx = self.resolver.subscribe();
        let events = self.events.clone();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let view = rx.borrow_and_update().clone();
                if events.send(AppEvent::Home(view)).is_err() {
                    break;
                }
            }
        });
    }

    fn on_home_view(&mut self, view: HomeView) {
        if !matches!(self.screen, Screen::Home) {
            self.shown = view;
            return;
        }
        if view.proceed != self.shown.proceed {
            println!("{}", proceed_text(view.proceed));
        }
        let directory_changed = view.directory != self.shown.directory;
        self.shown = view;
        if directory_changed {
            self.print_directory();
        }
    }

    fn on_resolved(&self, path: &CounterPath, outcome: &ResolutionOutcome) {
        match outcome {
            ResolutionOutcome::Exists(value) => println!("{path} exists ({value})"),
            ResolutionOutcome::NotFound => println!("{path} not found"),
            ResolutionOutcome::Cancelled => tracing::debug!("lookup for {path} cancelled"),
            ResolutionOutcome::TransportError(_) => println!("could not reach counter service"),
        }
    }

    fn print_directory(&self) {
        let directory = self.resolver.directory();
        if directory.is_empty() {
            println!("  (no counters yet)");
            return;
        }
        let selected = self.resolver.view().selected;
        let mut number = 1;
        for (section, (namespace, keys)) in directory.iter().enumerate() {
            println!("{namespace}");
            for (row, key) in keys.iter().enumerate() {
                let marker = if selected == Some((section, row)) { '>' } else { ' ' };
                println!(" {marker}{number:>3}. {key}");
                number += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tally_core::HistoryEntry;

    #[test]
    fn index_path_walks_sections() {
        let dir = NamespaceKeyDirectory::from_history(&[
            HistoryEntry {
                namespace: "INFO6350".into(),
                keys: vec!["dan.magnusson".into(), "dan".into()],
            },
            HistoryEntry {
                namespace: "INFO6250".into(),
                keys: vec!["daniel".into()],
            },
        ]);
        assert_eq!(index_path(&dir, 0), None);
        assert_eq!(index_path(&dir, 1), Some((0, 0)));
        assert_eq!(index_path(&dir, 2), Some((0, 1)));
        assert_eq!(index_path(&dir, 3), Some((1, 0)));
        assert_eq!(index_path(&dir, 4), None);
    }

    #[test]
    fn proceed_text_shows_label() {
        assert_eq!(proceed_text(ProceedState::default()), "[Create] (disabled)");
        assert_eq!(
            proceed_text(ProceedState {
                enabled: true,
                label: tally_core::ProceedLabel::Load,
            }),
            "[Load]"
        );
    }
}
