//! The command set served at the webhook.
//!
//! `echo`, `echob`, `show` and `version` are small demonstrations of the
//! dispatcher and reply builders. `get`, `set`, `unset` and `keys` expose the
//! key-value store to Slack users.

use std::sync::Arc;

use anyhow::Result;

use crate::kv::{KvError, Segment};
use crate::slack::{
    args, ArgParser, Attachment, CommandHandler, Component, DispatchError, Dispatcher, Invocation,
    Positional, SlackResponse,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Builds the dispatcher used by the server.
///
/// `separator` is the namespace hierarchy separator for store commands.
/// Namespaces at or below `protected` (the access-rule namespace) cannot be
/// read or written from Slack.
pub fn example_dispatcher(
    separator: &str,
    protected: Option<&str>,
) -> Result<Dispatcher, DispatchError> {
    let store_command = |action: KvAction| KvCommand {
        action,
        separator: Arc::from(separator),
        protected: protected.map(Arc::from),
    };

    let mut dispatcher = Dispatcher::new();
    dispatcher
        .register("help", run_help)?
        .register("echo", run_echo)?
        .register("echob", Positional(run_echob))?
        .register("show", run_show)?
        .register("version", run_version)?
        .register("get", store_command(KvAction::Get))?
        .register("set", store_command(KvAction::Set))?
        .register("unset", store_command(KvAction::Unset))?
        .register("keys", store_command(KvAction::Keys))?
        .alias("v", "version")?
        .alias("e", "echo")?;
    Ok(dispatcher)
}

fn run_help(_invocation: &Invocation<'_>, _parser: ArgParser) -> Result<SlackResponse> {
    Ok(SlackResponse::text(
        "try the 'echo', 'show' or 'version' subcommands, \
         or 'get', 'set', 'unset' and 'keys' for stored settings",
    ))
}

fn run_echo(_invocation: &Invocation<'_>, mut parser: ArgParser) -> Result<SlackResponse> {
    parser.arg(args::flag("uppercase").short('u'));
    let parsed = parser.run();
    if let Some(error) = parsed.error() {
        return Ok(SlackResponse::text(format!("error: {}", error)));
    }

    let mut out = parsed.positional().join("-");
    if parsed.flag("uppercase") {
        out = out.to_uppercase();
    }
    Ok(SlackResponse::text(format!("you said: {}", out)))
}

fn run_echob(_invocation: &Invocation<'_>, posn: &[String]) -> Result<SlackResponse> {
    Ok(SlackResponse::text(format!("you said: {}", posn.join(":"))))
}

fn run_show(_invocation: &Invocation<'_>, _parser: ArgParser) -> Result<SlackResponse> {
    let attachment = Attachment::new("that's a show-off attachment")
        .with(Component::author(
            "slashkv",
            "https://api.slack.com/interactivity/slash-commands",
            "https://a.slack-edge.com/80588/img/services/api_36.png",
        ))
        .with(Component::title(
            "Slash commands",
            "https://api.slack.com/interactivity/slash-commands",
        ))
        .with(Component::image(
            "https://a.slack-edge.com/80588/img/services/api_512.png",
            "https://a.slack-edge.com/80588/img/services/api_72.png",
        ))
        .with(Component::text(
            "This text appears within the attachment!",
            Some("This text appears above the attachment!"),
        ));
    Ok(SlackResponse::rich("Just showing off!", [attachment]))
}

fn run_version(_invocation: &Invocation<'_>, _parser: ArgParser) -> Result<SlackResponse> {
    Ok(SlackResponse::text(format!("slashkv version {}", VERSION)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KvAction {
    Get,
    Set,
    Unset,
    Keys,
}

impl KvAction {
    fn usage(&self) -> &'static str {
        match self {
            Self::Get => "usage: get <namespace> <key>",
            Self::Set => "usage: set [-c] <namespace> <key> <value...>",
            Self::Unset => "usage: unset <namespace> <key>",
            Self::Keys => "usage: keys <namespace>",
        }
    }
}

struct KvCommand {
    action: KvAction,
    separator: Arc<str>,
    protected: Option<Arc<str>>,
}

impl KvCommand {
    fn is_protected(&self, namespace: &str) -> bool {
        let Some(protected) = self.protected.as_deref() else {
            return false;
        };
        namespace == protected
            || namespace
                .strip_prefix(protected)
                .is_some_and(|rest| rest.starts_with(&*self.separator))
    }

    /// The segment linked to its ancestors, or a reply naming the first
    /// namespace in the chain that does not exist.
    fn lookup(
        &self,
        invocation: &Invocation<'_>,
        namespace: &str,
    ) -> Result<Result<Segment, SlackResponse>> {
        match invocation.store.get(namespace, Some(&*self.separator), false) {
            Ok(segment) => Ok(Ok(segment)),
            Err(KvError::NamespaceNotFound(missing)) => Ok(Err(no_namespace(&missing))),
            Err(e) => Err(e.into()),
        }
    }

    fn get(
        &self,
        invocation: &Invocation<'_>,
        namespace: &str,
        key: &str,
    ) -> Result<SlackResponse> {
        let segment = match self.lookup(invocation, namespace)? {
            Ok(segment) => segment,
            Err(reply) => return Ok(reply),
        };
        let text = match segment.read(key) {
            Ok(Some(value)) => format!("{} = {}", key, value),
            Ok(None) => format!("{} is set but empty", key),
            Err(KvError::KeyNotFound { .. }) => format!("'{}' is not set in '{}'", key, namespace),
            Err(e) => return Err(e.into()),
        };
        Ok(SlackResponse::text(text))
    }

    fn set(
        &self,
        invocation: &Invocation<'_>,
        namespace: &str,
        key: &str,
        value: &str,
    ) -> Result<SlackResponse> {
        let segment = invocation.store.get(namespace, Some(&*self.separator), true)?;
        segment.write(key, value)?;
        tracing::info!(namespace, key, "Value set from Slack");
        Ok(SlackResponse::text(format!("set {} in '{}'", key, namespace)))
    }

    fn unset(
        &self,
        invocation: &Invocation<'_>,
        namespace: &str,
        key: &str,
    ) -> Result<SlackResponse> {
        if !invocation.store.exists(namespace)? {
            return Ok(no_namespace(namespace));
        }
        let segment = invocation.store.get(namespace, None, false)?;
        let text = match segment.remove(key) {
            Ok(()) => format!("removed {} from '{}'", key, namespace),
            Err(KvError::KeyNotFound { .. }) => format!("'{}' is not set in '{}'", key, namespace),
            Err(e) => return Err(e.into()),
        };
        Ok(SlackResponse::text(text))
    }

    fn keys(&self, invocation: &Invocation<'_>, namespace: &str) -> Result<SlackResponse> {
        let segment = match self.lookup(invocation, namespace)? {
            Ok(segment) => segment,
            Err(reply) => return Ok(reply),
        };
        let snapshot = segment.snapshot()?;
        if snapshot.is_empty() {
            return Ok(SlackResponse::text(format!("no entries in '{}'", namespace)));
        }
        let lines: Vec<String> = snapshot
            .iter()
            .map(|(key, value)| format!("{} = {}", key, value.as_deref().unwrap_or("")))
            .collect();
        Ok(SlackResponse::text(lines.join("\n")))
    }
}

impl CommandHandler for KvCommand {
    fn handle(&self, invocation: &Invocation<'_>, mut parser: ArgParser) -> Result<SlackResponse> {
        if self.action == KvAction::Set {
            parser.arg(args::flag("channel").short('c'));
        }
        let parsed = parser.run();
        if let Some(error) = parsed.error() {
            return Ok(SlackResponse::text(format!("error: {}", error)));
        }

        let posn = parsed.positional();
        if let Some(namespace) = posn.first() {
            if self.is_protected(namespace) {
                tracing::warn!(namespace = %namespace, "Refused access to protected namespace");
                return Ok(SlackResponse::text(format!(
                    "namespace '{}' is not accessible from Slack",
                    namespace
                )));
            }
        }

        let response = match (self.action, posn) {
            (KvAction::Get, [namespace, key]) => self.get(invocation, namespace, key)?,
            (KvAction::Set, [namespace, key, value @ ..]) if !value.is_empty() => {
                let response = self.set(invocation, namespace, key, &value.join(" "))?;
                if parsed.flag("channel") {
                    response.in_channel()
                } else {
                    response
                }
            }
            (KvAction::Unset, [namespace, key]) => self.unset(invocation, namespace, key)?,
            (KvAction::Keys, [namespace]) => self.keys(invocation, namespace)?,
            (action, _) => SlackResponse::text(action.usage()),
        };
        Ok(response)
    }
}

fn no_namespace(namespace: &str) -> SlackResponse {
    SlackResponse::text(format!("namespace '{}' does not exist", namespace))
}
