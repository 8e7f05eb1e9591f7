//! Routes command text to a registered handler.
//!
//! The first word of the text (its leading letters) names the subcommand and is
//! matched case-insensitively. Whatever follows is handed to the handler as an
//! [`ArgParser`]. Unmatched or empty subcommands go to the unknown-command
//! handler, which is an ordinary reply, not an error.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;

use super::args::ArgParser;
use super::request::SlashCommand;
use super::response::SlackResponse;
use crate::kv::KeyValueStore;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("no command named '{0}' is registered")]
    UnknownCommand(String),
    #[error("command names must be non-empty and alphabetic, got '{0}'")]
    InvalidName(String),
}

/// Everything a handler may look at for one request.
pub struct Invocation<'a> {
    /// The subcommand exactly as typed (not lower-cased).
    pub subcommand: &'a str,
    pub request: &'a SlashCommand,
    pub store: &'a KeyValueStore,
}

pub trait CommandHandler: Send + Sync {
    fn handle(&self, invocation: &Invocation<'_>, parser: ArgParser) -> Result<SlackResponse>;
}

impl<F> CommandHandler for F
where
    F: Fn(&Invocation<'_>, ArgParser) -> Result<SlackResponse> + Send + Sync,
{
    fn handle(&self, invocation: &Invocation<'_>, parser: ArgParser) -> Result<SlackResponse> {
        self(invocation, parser)
    }
}

/// Adapter for handlers that only care about positional arguments.
pub struct Positional<F>(pub F);

impl<F> CommandHandler for Positional<F>
where
    F: Fn(&Invocation<'_>, &[String]) -> Result<SlackResponse> + Send + Sync,
{
    fn handle(&self, invocation: &Invocation<'_>, parser: ArgParser) -> Result<SlackResponse> {
        let parsed = parser.run();
        (self.0)(invocation, parsed.positional())
    }
}

/// Splits command text into `(subcommand, remainder)`.
///
/// The subcommand is the leading run of ASCII letters. The first character
/// after it and any whitespace directly following that character are dropped.
pub fn split_subcommand(text: &str) -> (&str, &str) {
    let Some(end) = text.find(|c: char| !c.is_ascii_alphabetic()) else {
        return (text, "");
    };
    let subcommand = &text[..end];
    let mut rest = text[end..].chars();
    rest.next();
    (subcommand, rest.as_str().trim_start())
}

fn help_not_implemented(_invocation: &Invocation<'_>, _parser: ArgParser) -> Result<SlackResponse> {
    Ok(SlackResponse::text(
        "help functionality is not currently implemented",
    ))
}

fn unknown_command(invocation: &Invocation<'_>, _parser: ArgParser) -> Result<SlackResponse> {
    Ok(SlackResponse::text(format!(
        "unknown subcommand '{}'; try 'help'",
        invocation.subcommand
    )))
}

/// Registry of subcommand handlers.
///
/// The registry is built up front and only read while dispatching; every
/// dispatch gets its own parser and invocation.
#[derive(Clone)]
pub struct Dispatcher {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
    unknown: Arc<dyn CommandHandler>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// A dispatcher that only knows a placeholder `help`.
    pub fn new() -> Self {
        let mut handlers: HashMap<String, Arc<dyn CommandHandler>> = HashMap::new();
        handlers.insert("help".to_string(), Arc::new(help_not_implemented));
        Self {
            handlers,
            unknown: Arc::new(unknown_command),
        }
    }

    /// Registers `handler` under `name`, replacing any previous handler.
    pub fn register(
        &mut self,
        name: &str,
        handler: impl CommandHandler + 'static,
    ) -> Result<&mut Self, DispatchError> {
        let key = command_key(name)?;
        self.handlers.insert(key, Arc::new(handler));
        Ok(self)
    }

    /// Makes `alias` reach the handler currently registered as `original`.
    pub fn alias(&mut self, alias: &str, original: &str) -> Result<&mut Self, DispatchError> {
        let key = command_key(alias)?;
        let handler = self
            .handlers
            .get(&original.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| DispatchError::UnknownCommand(original.to_string()))?;
        self.handlers.insert(key, handler);
        Ok(self)
    }

    /// Replaces the handler used for unmatched subcommands.
    pub fn on_unknown(&mut self, handler: impl CommandHandler + 'static) -> &mut Self {
        self.unknown = Arc::new(handler);
        self
    }

    /// Registered command names, sorted.
    pub fn commands(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn dispatch(&self, request: &SlashCommand, store: &KeyValueStore) -> Result<SlackResponse> {
        let text = request.text()?;
        let (subcommand, remainder) = split_subcommand(text);
        let invocation = Invocation {
            subcommand,
            request,
            store,
        };
        let parser = ArgParser::new(subcommand.to_ascii_lowercase(), remainder);

        let handler = if subcommand.is_empty() {
            None
        } else {
            self.handlers.get(&subcommand.to_ascii_lowercase())
        };

        match handler {
            Some(handler) => {
                tracing::debug!(subcommand, remainder, "Dispatching command");
                handler.handle(&invocation, parser)
            }
            None => {
                tracing::debug!(subcommand, "Unknown subcommand");
                self.unknown.handle(&invocation, parser)
            }
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("commands", &self.commands())
            .finish()
    }
}

fn command_key(name: &str) -> Result<String, DispatchError> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(DispatchError::InvalidName(name.to_string()));
    }
    Ok(name.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::slack::args;

    fn store() -> KeyValueStore {
        let db = Database::open_memory().unwrap();
        db.migrate().unwrap();
        KeyValueStore::new(db)
    }

    fn run_echo(_invocation: &Invocation<'_>, mut parser: ArgParser) -> Result<SlackResponse> {
        parser.arg(args::flag("uppercase").short('u'));
        let parsed = parser.run();
        let mut out = parsed.positional().join("-");
        if parsed.flag("uppercase") {
            out = out.to_uppercase();
        }
        Ok(SlackResponse::text(format!("you said: {}", out)))
    }

    fn run_count(_invocation: &Invocation<'_>, posn: &[String]) -> Result<SlackResponse> {
        Ok(SlackResponse::text(posn.len().to_string()))
    }

    fn dispatcher() -> Dispatcher {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register("echo", run_echo).unwrap();
        dispatcher.register("count", Positional(run_count)).unwrap();
        dispatcher.alias("e", "echo").unwrap();
        dispatcher
    }

    fn reply(dispatcher: &Dispatcher, text: &str) -> String {
        dispatcher
            .dispatch(&SlashCommand::with_text(text), &store())
            .unwrap()
            .text
    }

    #[test]
    fn splits_on_first_non_letter() {
        assert_eq!(split_subcommand("echo -u I say"), ("echo", "-u I say"));
        assert_eq!(split_subcommand("thecmd and remainder"), ("thecmd", "and remainder"));
        assert_eq!(split_subcommand("help"), ("help", ""));
        assert_eq!(split_subcommand(""), ("", ""));
        assert_eq!(split_subcommand("     "), ("", ""));
        assert_eq!(split_subcommand("echo   x"), ("echo", "x"));
    }

    #[test]
    fn routes_case_insensitively() {
        let dispatcher = dispatcher();
        assert_eq!(reply(&dispatcher, "echo I say hello"), "you said: I-say-hello");
        assert_eq!(reply(&dispatcher, "ECHO I say hello"), "you said: I-say-hello");
    }

    #[test]
    fn parses_declared_flags() {
        let dispatcher = dispatcher();
        assert_eq!(reply(&dispatcher, "echo -u I say hello"), "you said: I-SAY-HELLO");
        assert_eq!(
            reply(&dispatcher, "echo --uppercase I say hello"),
            "you said: I-SAY-HELLO"
        );
    }

    #[test]
    fn aliases_share_the_handler() {
        let dispatcher = dispatcher();
        assert_eq!(reply(&dispatcher, "e I say hello"), "you said: I-say-hello");
        assert_eq!(reply(&dispatcher, "E I say hello"), "you said: I-say-hello");
    }

    #[test]
    fn alias_of_unknown_command_fails() {
        let mut dispatcher = Dispatcher::new();
        assert_eq!(
            dispatcher.alias("x", "missing").unwrap_err(),
            DispatchError::UnknownCommand("missing".into())
        );
    }

    #[test]
    fn invalid_names_are_rejected() {
        let mut dispatcher = Dispatcher::new();
        assert!(dispatcher.register("", run_echo).is_err());
        assert!(dispatcher.register("echo2", run_echo).is_err());
    }

    #[test]
    fn unknown_subcommands() {
        let dispatcher = dispatcher();
        assert_eq!(
            reply(&dispatcher, "ECHOO anything"),
            "unknown subcommand 'ECHOO'; try 'help'"
        );
        assert_eq!(reply(&dispatcher, "cmd"), "unknown subcommand 'cmd'; try 'help'");
        assert_eq!(reply(&dispatcher, ""), "unknown subcommand ''; try 'help'");
        assert_eq!(reply(&dispatcher, "     "), "unknown subcommand ''; try 'help'");
    }

    #[test]
    fn unknown_handler_gets_subcommand_and_remainder() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.on_unknown(Positional(
            |invocation: &Invocation<'_>, posn: &[String]| -> Result<SlackResponse> {
                Ok(SlackResponse::text(format!(
                    "{}:{}",
                    invocation.subcommand,
                    posn.len()
                )))
            },
        ));
        assert_eq!(reply(&dispatcher, "nope a b"), "nope:2");
        assert_eq!(reply(&dispatcher, "   "), ":0");
    }

    #[test]
    fn default_help() {
        let dispatcher = Dispatcher::new();
        assert_eq!(
            reply(&dispatcher, "help"),
            "help functionality is not currently implemented"
        );
    }

    #[test]
    fn positional_handler_counts_tokens() {
        let dispatcher = dispatcher();
        assert_eq!(reply(&dispatcher, "count a b c"), "3");
        assert_eq!(reply(&dispatcher, "count"), "0");
    }

    #[test]
    fn missing_text_is_an_error() {
        let dispatcher = dispatcher();
        assert!(dispatcher
            .dispatch(&SlashCommand::default(), &store())
            .is_err());
    }

    #[test]
    fn lists_commands() {
        assert_eq!(dispatcher().commands(), vec!["count", "e", "echo", "help"]);
    }
}
