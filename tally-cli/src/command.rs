/// Commands shown by `help` (command, description).
pub const COMMANDS: &[(&str, &str)] = &[
    ("ns <text>", "Set the namespace field"),
    ("key <text>", "Set the key field"),
    ("go", "Load or create the counter for the current fields"),
    ("open <n>", "Open entry n from the history list"),
    ("rm <n>", "Forget entry n from the history list"),
    ("list", "Show the history list"),
    ("+ / inc", "Increment the open counter"),
    ("- / dec", "Decrement the open counter"),
    ("refresh", "Reload the open counter"),
    ("back", "Close the counter and return home"),
    ("help", "Show commands"),
    ("quit", "Exit"),
];

/// Commands recognized by the prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    /// Replace the namespace field (empty clears it)
    Namespace(String),
    /// Replace the key field (empty clears it)
    Key(String),
    Go,
    /// Open a history entry by its 1-based list number
    Open(usize),
    /// Remove a history entry by its 1-based list number
    Remove(usize),
    List,
    Increment,
    Decrement,
    Refresh,
    Back,
    Help,
    Quit,
}

/// Parse one input line. Returns `None` if it is not a recognized command.
pub fn parse(input: &str) -> Option<Command> {
    let trimmed = input.trim();
    let (cmd, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((c, a)) => (c, a.trim()),
        None => (trimmed, ""),
    };
    match cmd {
        "ns" | "namespace" => Some(Command::Namespace(arg.to_string())),
        "key" | "k" => Some(Command::Key(arg.to_string())),
        "go" | "load" | "create" => Some(Command::Go),
        "open" => arg.parse().ok().filter(|n| *n > 0).map(Command::Open),
        "rm" | "delete" => arg.parse().ok().filter(|n| *n > 0).map(Command::Remove),
        "list" | "ls" => Some(Command::List),
        "+" | "inc" => Some(Command::Increment),
        "-" | "dec" => Some(Command::Decrement),
        "refresh" => Some(Command::Refresh),
        "back" => Some(Command::Back),
        "help" | "?" => Some(Command::Help),
        "quit" | "exit" => Some(Command::Quit),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_commands_keep_argument() {
        assert_eq!(
            parse("ns INFO6350"),
            Some(Command::Namespace("INFO6350".into()))
        );
        assert_eq!(
            parse("  key   dan.magnusson "),
            Some(Command::Key("dan.magnusson".into()))
        );
        assert_eq!(parse("key"), Some(Command::Key(String::new())));
    }

    #[test]
    fn numbered_commands_need_positive_index() {
        assert_eq!(parse("open 2"), Some(Command::Open(2)));
        assert_eq!(parse("rm 1"), Some(Command::Remove(1)));
        assert_eq!(parse("open 0"), None);
        assert_eq!(parse("open"), None);
        assert_eq!(parse("rm x"), None);
    }

    #[test]
    fn aliases() {
        assert_eq!(parse("+"), Some(Command::Increment));
        assert_eq!(parse("dec"), Some(Command::Decrement));
        assert_eq!(parse("exit"), Some(Command::Quit));
        assert_eq!(parse("bogus"), None);
    }
}
