//! HTTP routes.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post, put};
use axum::{Form, Json, Router};
use chrono::{DateTime, Utc};
use database::{credential, notification_preference, user, validation, CalendarCredential, NotificationPreference, User};
use notifier::handle_inbound;
use orchestrator::{CommandRequest, CommandResponse};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use whatsapp::{InboundMessage, SignatureValidation};

use crate::error::ApiError;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/command", post(command))
        .route("/v1/users/:id", put(put_user))
        .route("/v1/users/:id/preferences", get(get_preferences).put(put_preferences))
        .route("/v1/users/:id/calendar-credentials", put(put_credentials))
        .route("/webhooks/whatsapp", post(whatsapp_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn command(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CommandRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    authorize(&state, &headers)?;
    if request.user_id.trim().is_empty() {
        return Err(ApiError::BadRequest("user_id is required".to_string()));
    }
    let response = state.orchestrator.handle(request).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct UserUpdate {
    name: Option<String>,
    /// Empty string clears the address.
    email: Option<String>,
}

/// Create or update a user's profile.
async fn put_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(update): Json<UserUpdate>,
) -> Result<Json<User>, ApiError> {
    authorize(&state, &headers)?;
    let pool = state.db.pool();
    let existing = match user::get_user(pool, &id).await {
        Ok(found) => Some(found),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e.into()),
    };

    let mut profile = existing.clone().unwrap_or_else(|| User {
        id: id.clone(),
        name: id.clone(),
        email: None,
    });
    if let Some(name) = update.name.filter(|n| !n.trim().is_empty()) {
        profile.name = name.trim().to_string();
    }
    if let Some(email) = update.email {
        let email = email.trim();
        if email.is_empty() {
            profile.email = None;
        } else {
            validation::validate_email(email)?;
            profile.email = Some(email.to_string());
        }
    }

    user::upsert_user(pool, &profile).await?;
    if existing.is_none() {
        info!(user_id = %id, "USER_CREATED");
    }
    Ok(Json(profile))
}

async fn get_preferences(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<NotificationPreference>, ApiError> {
    authorize(&state, &headers)?;
    user::get_user(state.db.pool(), &id).await?;
    let pref = notification_preference::get_or_default(state.db.pool(), &id).await?;
    Ok(Json(pref))
}

/// Partial preference update; absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
struct PreferenceUpdate {
    whatsapp_enabled: Option<bool>,
    /// Empty string clears the number.
    whatsapp_number: Option<String>,
    email_enabled: Option<bool>,
    reminder_lead_time: Option<i64>,
    morning_briefing_enabled: Option<bool>,
    morning_briefing_time: Option<String>,
    user_timezone: Option<String>,
}

impl PreferenceUpdate {
    fn apply(self, pref: &mut NotificationPreference) {
        if let Some(v) = self.whatsapp_enabled {
            pref.whatsapp_enabled = v;
        }
        if let Some(number) = self.whatsapp_number {
            let number = number.trim();
            pref.whatsapp_number = (!number.is_empty()).then(|| number.to_string());
        }
        if let Some(v) = self.email_enabled {
            pref.email_enabled = v;
        }
        if let Some(v) = self.reminder_lead_time {
            pref.reminder_lead_time = v;
        }
        if let Some(v) = self.morning_briefing_enabled {
            pref.morning_briefing_enabled = v;
        }
        if let Some(v) = self.morning_briefing_time {
            pref.morning_briefing_time = v.trim().to_string();
        }
        if let Some(v) = self.user_timezone {
            pref.user_timezone = v.trim().to_string();
        }
    }
}

async fn put_preferences(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(update): Json<PreferenceUpdate>,
) -> Result<Json<NotificationPreference>, ApiError> {
    authorize(&state, &headers)?;
    let pool = state.db.pool();
    user::get_user(pool, &id).await?;

    let mut pref = notification_preference::get_or_default(pool, &id).await?;
    update.apply(&mut pref);
    validation::validate_preference(&pref)?;
    notification_preference::upsert_preference(pool, &pref).await?;
    info!(user_id = %id, "PREFERENCES_UPDATED");
    Ok(Json(pref))
}

/// Tokens obtained by the external OAuth consent flow.
#[derive(Debug, Deserialize)]
struct CredentialUpdate {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

async fn put_credentials(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(update): Json<CredentialUpdate>,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &headers)?;
    if update.access_token.trim().is_empty() {
        return Err(ApiError::BadRequest("access_token is required".to_string()));
    }
    let pool = state.db.pool();
    user::get_user(pool, &id).await?;
    credential::upsert_credential(
        pool,
        &CalendarCredential {
            user_id: id.clone(),
            access_token: update.access_token,
            refresh_token: update.refresh_token,
            expires_at: update.expires_at,
        },
    )
    .await?;
    info!(user_id = %id, "CALENDAR_CONNECTED");
    Ok(StatusCode::NO_CONTENT)
}

/// Twilio inbound webhook; answers with a plain-text acknowledgement.
async fn whatsapp_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(params): Form<Vec<(String, String)>>,
) -> Result<String, ApiError> {
    if let Some(auth) = &state.webhook {
        let signature = headers.get("x-twilio-signature").and_then(|v| v.to_str().ok());
        match auth.verify(signature, &params) {
            SignatureValidation::Valid => {}
            rejected => {
                warn!(validation = ?rejected, "WEBHOOK_SIGNATURE_REJECTED");
                return Err(ApiError::Forbidden);
            }
        }
    }

    let message = inbound_message(&params)?;
    let outcome = handle_inbound(&state.db, &message, Utc::now()).await?;
    Ok(outcome.reply_text().to_string())
}

fn inbound_message(params: &[(String, String)]) -> Result<InboundMessage, ApiError> {
    let field = |name: &str| params.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone());
    let from = field("From")
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("From is required".to_string()))?;
    Ok(InboundMessage {
        from,
        body: field("Body").unwrap_or_default(),
        replied_to: field("OriginalRepliedMessageSid").filter(|v| !v.is_empty()),
    })
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.api_token.as_deref() else {
        return Ok(());
    };

    let Some(value) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Err(ApiError::Unauthorized);
    };

    let Ok(value) = value.to_str() else {
        return Err(ApiError::Unauthorized);
    };

    let token = value.strip_prefix("Bearer ").unwrap_or(value);
    if token != expected {
        return Err(ApiError::Unauthorized);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::WebhookAuth;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use calendar::StaticConnector;
    use database::Database;
    use mock_brain::FailingModel;
    use orchestrator::Orchestrator;
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn state() -> AppState {
        let db = Database::in_memory().await.unwrap();
        let orchestrator = Orchestrator::new(
            db.clone(),
            Arc::new(FailingModel::unavailable()),
            Arc::new(StaticConnector::new()),
        );
        AppState::new(db, Arc::new(orchestrator))
    }

    async fn seed_user(state: &AppState, id: &str) {
        user::create_user(
            state.db.pool(),
            &User {
                id: id.to_string(),
                name: "Ana".to_string(),
                email: None,
            },
        )
        .await
        .unwrap();
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn form_request(body: &str, signature: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/webhooks/whatsapp")
            .header("content-type", "application/x-www-form-urlencoded");
        if let Some(signature) = signature {
            builder = builder.header("x-twilio-signature", signature);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(state().await);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_command_starts_a_conversation() {
        let app = router(state().await);
        let response = app
            .oneshot(json_request("POST", "/v1/command", json!({"user_id": "u1", "text": "hello"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(!body["conversation_id"].as_str().unwrap().is_empty());
        assert!(body["response_text"].is_string());
    }

    #[tokio::test]
    async fn test_command_requires_user() {
        let app = router(state().await);
        let response = app
            .oneshot(json_request("POST", "/v1/command", json!({"text": "hello"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_command_unknown_conversation_is_not_found() {
        let app = router(state().await);
        let response = app
            .oneshot(json_request(
                "POST",
                "/v1/command",
                json!({"user_id": "u1", "text": "hello", "conversation_id": "missing"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_api_token_is_enforced() {
        let app = router(state().await.with_api_token(Some("secret".to_string())));
        let response = app
            .clone()
            .oneshot(json_request("POST", "/v1/command", json!({"user_id": "u1", "text": "hi"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let mut request = json_request("POST", "/v1/command", json!({"user_id": "u1", "text": "hi"}));
        request
            .headers_mut()
            .insert("authorization", "Bearer secret".parse().unwrap());
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_preferences_roundtrip_and_validation() {
        let state = state().await;
        seed_user(&state, "u1").await;
        let app = router(state);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/v1/users/u1/preferences").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["reminder_lead_time"], 30);
        assert_eq!(body["morning_briefing_time"], "08:00");

        let response = app
            .clone()
            .oneshot(json_request("PUT", "/v1/users/u1/preferences", json!({"reminder_lead_time": 0})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(json_request("PUT", "/v1/users/u1/preferences", json!({"whatsapp_enabled": true})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(json_request(
                "PUT",
                "/v1/users/u1/preferences",
                json!({
                    "whatsapp_enabled": true,
                    "whatsapp_number": "+15551234567",
                    "reminder_lead_time": 15,
                    "user_timezone": "Europe/Berlin"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["reminder_lead_time"], 15);
        assert_eq!(body["user_timezone"], "Europe/Berlin");
    }

    #[tokio::test]
    async fn test_preferences_unknown_user() {
        let app = router(state().await);
        let response = app
            .oneshot(Request::builder().uri("/v1/users/nobody/preferences").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_put_user_creates_then_updates() {
        let state = state().await;
        let db = state.db.clone();
        let app = router(state);

        let response = app
            .clone()
            .oneshot(json_request("PUT", "/v1/users/u9", json!({"name": "Bo"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(json_request("PUT", "/v1/users/u9", json!({"email": "not-an-email"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(json_request("PUT", "/v1/users/u9", json!({"email": "bo@example.com"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let stored = user::get_user(db.pool(), "u9").await.unwrap();
        assert_eq!(stored.name, "Bo");
        assert_eq!(stored.email.as_deref(), Some("bo@example.com"));
    }

    #[tokio::test]
    async fn test_put_credentials() {
        let state = state().await;
        seed_user(&state, "u1").await;
        let db = state.db.clone();
        let app = router(state);

        let response = app
            .oneshot(json_request(
                "PUT",
                "/v1/users/u1/calendar-credentials",
                json!({"access_token": "ya29.token", "refresh_token": "1//refresh"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let stored = credential::get_credential(db.pool(), "u1").await.unwrap().unwrap();
        assert_eq!(stored.access_token, "ya29.token");
    }

    #[tokio::test]
    async fn test_webhook_off_and_unknown_sender() {
        let state = state().await;
        seed_user(&state, "u1").await;
        let mut pref = NotificationPreference::defaults_for("u1");
        pref.whatsapp_enabled = true;
        pref.whatsapp_number = Some("+15551234567".to_string());
        notification_preference::upsert_preference(state.db.pool(), &pref).await.unwrap();
        let db = state.db.clone();
        let app = router(state);

        let response = app
            .clone()
            .oneshot(form_request("From=whatsapp%3A%2B15551234567&Body=OFF", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "Disabled");
        let pref = notification_preference::get_or_default(db.pool(), "u1").await.unwrap();
        assert!(!pref.whatsapp_enabled);

        let response = app
            .oneshot(form_request("From=whatsapp%3A%2B4420000000&Body=OFF", None))
            .await
            .unwrap();
        assert_eq!(body_text(response).await, "User not found");
    }

    #[tokio::test]
    async fn test_webhook_signature() {
        let url = "https://example.com/webhooks/whatsapp";
        let state = state()
            .await
            .with_webhook_auth(Some(WebhookAuth::new(SecretString::from("token".to_string()), url)));
        let app = router(state);

        let response = app
            .clone()
            .oneshot(form_request("From=whatsapp%3A%2B15550000000&Body=hi", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let signature = whatsapp::compute_signature("token", url, [("From", "whatsapp:+15550000000"), ("Body", "hi")]);
        let response = app
            .oneshot(form_request("From=whatsapp%3A%2B15550000000&Body=hi", Some(&signature)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "User not found");
    }
}
