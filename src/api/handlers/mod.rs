use axum::{
    extract::{rejection::FormRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Form, Json,
};

use super::AppState;
use crate::commands::VERSION;
use crate::slack::{AccessDecision, RequestError, SlackResponse, SlashCommand, SlashCommandForm};

const ACCESS_DENIED: &str = "access denied";

// ============================================================
// Error Handling
// ============================================================

/// Log a handler failure and return a sanitized response to the client.
/// Missing request fields are the caller's fault and are reported as-is.
fn internal_error(e: anyhow::Error) -> (StatusCode, String) {
    if let Some(missing) = e.downcast_ref::<RequestError>() {
        tracing::warn!("Bad request: {}", missing);
        return (StatusCode::BAD_REQUEST, missing.to_string());
    }

    tracing::error!("Internal error: {:#}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

fn access_denied() -> (StatusCode, String) {
    (StatusCode::FORBIDDEN, ACCESS_DENIED.to_string())
}

// ============================================================
// Health and version
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn version() -> String {
    format!("Slack Library Version {}", VERSION)
}

// ============================================================
// Slash commands
// ============================================================

/// Slack only ever POSTs; anything else at the webhook is refused.
pub async fn reject_get() -> (StatusCode, String) {
    tracing::warn!("Refused GET on the slash-command endpoint");
    access_denied()
}

pub async fn slash_command(
    State(state): State<AppState>,
    form: Result<Form<SlashCommandForm>, FormRejection>,
) -> Result<SlackResponse, (StatusCode, String)> {
    let Form(form) = form.map_err(|rejection| {
        tracing::warn!("Rejected slash-command body: {}", rejection);
        access_denied()
    })?;
    let request = SlashCommand::from(form);

    let decision = state
        .authenticator
        .check(request.token().ok(), request.team_id().ok());
    if let AccessDecision::Denied(reason) = decision {
        tracing::warn!(
            ?reason,
            team_id = request.team_id().unwrap_or_default(),
            "Slash command denied"
        );
        return Err(access_denied());
    }

    let dispatcher = state.dispatcher.clone();
    let store = state.store.clone();
    let response = tokio::task::spawn_blocking(move || dispatcher.dispatch(&request, &store))
        .await
        .map_err(|e| internal_error(e.into()))?
        .map_err(internal_error)?;
    Ok(response)
}
