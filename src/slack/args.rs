//! `--flag` style parsing of the text that follows a subcommand.
//!
//! Handlers declare their options as [`clap::Arg`]s; everything else ends up in
//! the ordered positional list. Parsing never fails outright: problems are
//! reported through [`ParsedArgs::error`] and the parsed fields are left empty.

use std::collections::HashMap;
use std::str::FromStr;

use clap::error::{ContextKind, ErrorKind};
use clap::{ArgAction, ArgMatches, ColorChoice, Command};

pub use clap::Arg;

const POSITIONAL: &str = "posn";

/// A counted flag such as `-u` / `--uppercase`. The long name defaults to `id`.
pub fn flag(id: &'static str) -> Arg {
    Arg::new(id).long(id).action(ArgAction::Count)
}

/// An option taking one value, such as `--limit 5` or `--limit=5`. The long
/// name defaults to `id`; the last occurrence wins.
pub fn value(id: &'static str) -> Arg {
    Arg::new(id).long(id).action(ArgAction::Set)
}

/// Parser bound to the text that follows a subcommand.
///
/// The text is split on single spaces; an empty text yields no tokens. A
/// parser can be run any number of times.
pub struct ArgParser {
    name: String,
    remainder: String,
    args: Vec<Arg>,
}

impl ArgParser {
    pub fn new(name: impl Into<String>, remainder: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remainder: remainder.into(),
            args: Vec::new(),
        }
    }

    pub fn remainder(&self) -> &str {
        &self.remainder
    }

    pub fn tokens(&self) -> Vec<String> {
        if self.remainder.is_empty() {
            return Vec::new();
        }
        self.remainder.split(' ').map(str::to_string).collect()
    }

    pub fn arg(&mut self, arg: Arg) -> &mut Self {
        self.args.push(arg);
        self
    }

    pub fn usage(&self) -> String {
        self.command().render_usage().to_string()
    }

    pub fn run(&self) -> ParsedArgs {
        match self.command().try_get_matches_from(self.tokens()) {
            Ok(matches) => self.collect(&matches),
            Err(err) => {
                let message = self.describe(&err);
                tracing::debug!(error = %message, "Argument parsing failed");
                ParsedArgs::failed(message)
            }
        }
    }

    fn command(&self) -> Command {
        Command::new(self.name.clone())
            .no_binary_name(true)
            .args_override_self(true)
            .color(ColorChoice::Never)
            .args(self.args.iter().cloned())
            .arg(
                Arg::new(POSITIONAL)
                    .action(ArgAction::Append)
                    .allow_negative_numbers(true),
            )
    }

    fn collect(&self, matches: &ArgMatches) -> ParsedArgs {
        let mut parsed = ParsedArgs::default();
        for arg in &self.args {
            let id = arg.get_id().as_str();
            match arg.get_action() {
                ArgAction::Count => {
                    parsed.counts.insert(id.to_string(), matches.get_count(id).into());
                }
                ArgAction::SetTrue => {
                    parsed.counts.insert(id.to_string(), matches.get_flag(id).into());
                }
                _ => {
                    let raw = matches.get_raw(id).and_then(|mut values| values.next());
                    if let Some(raw) = raw {
                        parsed
                            .values
                            .insert(id.to_string(), raw.to_string_lossy().into_owned());
                    }
                }
            }
        }
        parsed.positional = matches
            .get_many::<String>(POSITIONAL)
            .map(|values| values.cloned().collect())
            .unwrap_or_default();
        parsed
    }

    /// One-line description of a parse failure.
    fn describe(&self, err: &clap::Error) -> String {
        match err.kind() {
            ErrorKind::DisplayHelp => return self.usage(),
            ErrorKind::UnknownArgument => {
                if let Some(arg) = err.get(ContextKind::InvalidArg) {
                    return format!("unrecognized arguments: {}", arg);
                }
            }
            _ => {}
        }
        let rendered = err.render().to_string();
        let first = rendered.lines().next().unwrap_or_default();
        first.strip_prefix("error: ").unwrap_or(first).to_string()
    }
}

/// Outcome of [`ArgParser::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedArgs {
    error: Option<String>,
    counts: HashMap<String, u32>,
    values: HashMap<String, String>,
    positional: Vec<String>,
}

impl ParsedArgs {
    fn failed(message: String) -> Self {
        Self {
            error: Some(message),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn count(&self, id: &str) -> u32 {
        self.counts.get(id).copied().unwrap_or(0)
    }

    pub fn flag(&self, id: &str) -> bool {
        self.count(id) > 0
    }

    pub fn value(&self, id: &str) -> Option<&str> {
        self.values.get(id).map(String::as_str)
    }

    pub fn value_as<T: FromStr>(&self, id: &str) -> Option<T> {
        self.value(id).and_then(|v| v.parse().ok())
    }

    /// Every token not consumed by a declared option, in order.
    pub fn positional(&self) -> &[String] {
        &self.positional
    }
}
