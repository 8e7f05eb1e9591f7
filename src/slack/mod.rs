//! Slack slash-command protocol: request adapter, access checks, dispatch and
//! replies.
//!
//! - [`request`]: typed view of the form Slack posts.
//! - [`access`]: deny-by-default token/team check, run before anything else.
//! - [`dispatch`]: subcommand routing onto registered handlers.
//! - [`args`]: `--flag` style parsing of the text after the subcommand.
//! - [`response`]: text and attachment replies, serialized to Slack's JSON.

pub mod access;
pub mod args;
pub mod dispatch;
pub mod request;
pub mod response;

pub use access::{AccessDecision, AccessProvider, AccessRule, Authenticator, StaticAccess, StoreAccess};
pub use args::{Arg, ArgParser, ParsedArgs};
pub use dispatch::{CommandHandler, DispatchError, Dispatcher, Invocation, Positional};
pub use request::{RequestError, SlashCommand, SlashCommandForm};
pub use response::{link, Attachment, Component, Field, ResponseType, SlackResponse};
