//! Request/response API in front of the realtime core.
//!
//! - `POST /v1/messages/:to` : send a direct message (same router as WS)
//! - `GET  /v1/presence`     : current online set
//!
//! The caller's identity arrives in the `x-user-id` header, already
//! established by the auth collaborator.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use chatline_core::attachment::Attachment;
use chatline_core::error::{ChatError, ClientCode, Result};
use chatline_core::message::{ChatMessage, RouteOutcome, UserId};

use crate::app_state::AppState;
use crate::transport::USER_HEADER;

/// `ChatError` rendered as `{ code, msg }` with a matching status.
#[derive(Debug)]
pub struct ApiError(pub ChatError);

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.client_code();
        let status = match code {
            ClientCode::BadRequest | ClientCode::InvalidPayload | ClientCode::UnsupportedVersion => {
                StatusCode::BAD_REQUEST
            }
            ClientCode::Unauthenticated => StatusCode::UNAUTHORIZED,
            ClientCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ClientCode::UnsupportedMedia => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ClientCode::TransportFailure | ClientCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "code": code.as_str(), "msg": self.0.to_string() }));
        (status, body).into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendBody {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attachment: Option<Attachment>,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub outcome: RouteOutcome,
}

fn caller(headers: &HeaderMap) -> Result<UserId> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .ok_or(ChatError::Unauthenticated)
}

pub async fn send_message(
    State(app): State<AppState>,
    headers: HeaderMap,
    Path(to): Path<UserId>,
    body: std::result::Result<Json<SendBody>, JsonRejection>,
) -> std::result::Result<Json<SendResponse>, ApiError> {
    let from = caller(&headers)?;
    let Json(body) = body.map_err(|e| ChatError::BadRequest(e.body_text()))?;
    app.attachments().check_opt(body.attachment.as_ref())?;

    let msg = ChatMessage::new(from, to, body.text, body.attachment);
    msg.check_recipient()?;
    let outcome = app.realtime().router.route(msg).await?;
    Ok(Json(SendResponse { outcome }))
}

pub async fn presence(State(app): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "online": app.realtime().registry.snapshot_keys() }))
}
