//! Typed view of an inbound slash-command callback.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("missing field: {0}")]
    MissingField(&'static str),
}

/// The form body exactly as Slack posts it. Every field is optional at this
/// level; presence is checked when a field is accessed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlashCommandForm {
    pub token: Option<String>,
    pub command: Option<String>,
    pub text: Option<String>,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub channel_id: Option<String>,
    pub channel_name: Option<String>,
    pub team_id: Option<String>,
    pub team_domain: Option<String>,
    pub response_url: Option<String>,
}

/// A normalized slash-command request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlashCommand {
    token: Option<String>,
    command: Option<String>,
    text: Option<String>,
    user_id: Option<String>,
    user_name: Option<String>,
    channel_id: Option<String>,
    channel_name: Option<String>,
    team_id: Option<String>,
    team_domain: Option<String>,
    response_url: Option<String>,
}

impl From<SlashCommandForm> for SlashCommand {
    fn from(form: SlashCommandForm) -> Self {
        Self {
            token: form.token,
            command: form.command,
            text: form.text.map(|text| normalize_text(&text)),
            user_id: form.user_id,
            user_name: form.user_name,
            channel_id: form.channel_id,
            channel_name: form.channel_name,
            team_id: form.team_id,
            team_domain: form.team_domain,
            response_url: form.response_url,
        }
    }
}

macro_rules! field_accessors {
    ($($name:ident),* $(,)?) => {
        $(
            pub fn $name(&self) -> Result<&str, RequestError> {
                self.$name
                    .as_deref()
                    .ok_or(RequestError::MissingField(stringify!($name)))
            }
        )*
    };
}

impl SlashCommand {
    /// A request that carries nothing but command text.
    pub fn with_text(text: &str) -> Self {
        Self {
            text: Some(normalize_text(text)),
            ..Self::default()
        }
    }

    field_accessors!(
        token,
        command,
        text,
        user_id,
        user_name,
        channel_id,
        channel_name,
        team_id,
        team_domain,
        response_url,
    );
}

/// Slack's client autocorrects `--` into an em-dash; undo that everywhere.
pub fn normalize_text(text: &str) -> String {
    text.replace('\u{2014}', "--")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_form() -> SlashCommandForm {
        SlashCommandForm {
            token: Some("-token-".into()),
            command: Some("-command-".into()),
            text: Some("-text-".into()),
            user_id: Some("-user_id-".into()),
            user_name: Some("-user_name-".into()),
            channel_id: Some("-channel_id-".into()),
            channel_name: Some("-channel_name-".into()),
            team_id: Some("-team-".into()),
            team_domain: Some("-team_domain-".into()),
            response_url: Some("-response_url-".into()),
        }
    }

    #[test]
    fn exposes_every_field() {
        let request = SlashCommand::from(full_form());
        assert_eq!(request.token(), Ok("-token-"));
        assert_eq!(request.command(), Ok("-command-"));
        assert_eq!(request.text(), Ok("-text-"));
        assert_eq!(request.user_id(), Ok("-user_id-"));
        assert_eq!(request.user_name(), Ok("-user_name-"));
        assert_eq!(request.channel_id(), Ok("-channel_id-"));
        assert_eq!(request.channel_name(), Ok("-channel_name-"));
        assert_eq!(request.team_id(), Ok("-team-"));
        assert_eq!(request.team_domain(), Ok("-team_domain-"));
        assert_eq!(request.response_url(), Ok("-response_url-"));
    }

    #[test]
    fn missing_field_is_reported_on_access() {
        let request = SlashCommand::from(SlashCommandForm {
            token: Some("t".into()),
            ..SlashCommandForm::default()
        });
        assert_eq!(request.token(), Ok("t"));
        assert_eq!(request.user_id(), Err(RequestError::MissingField("user_id")));
        assert_eq!(
            request.user_id().unwrap_err().to_string(),
            "missing field: user_id"
        );
    }

    #[test]
    fn em_dashes_become_double_hyphens() {
        let request = SlashCommand::from(SlashCommandForm {
            text: Some("echo \u{2014}uppercase a\u{2014}b".into()),
            ..SlashCommandForm::default()
        });
        assert_eq!(request.text(), Ok("echo --uppercase a--b"));
    }

    #[test]
    fn with_text_normalizes() {
        let request = SlashCommand::with_text("echo \u{2014}u");
        assert_eq!(request.text(), Ok("echo --u"));
        assert!(request.token().is_err());
    }
}
