use axum::{ extract::{ Path, State }, http::HeaderMap, Json };
use chrono::{ DateTime, Utc };
use serde::{ Deserialize, Serialize };

use crate::chains::evm::wallet::normalize_address;
use crate::db::entity::user;
use crate::error::{ AppError, Result };
use crate::services::Resolution;

use super::auth::authenticated_wallet;
use super::AppState;

#[derive(Deserialize)]
pub struct ConnectRequest {
    pub address: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramSettingsRequest {
    pub enabled: bool,
    #[serde(default)]
    pub chat_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub address: String,
    pub is_paid_user: bool,
    pub subscription_expiry: Option<DateTime<Utc>>,
    pub telegram_notifications_enabled: bool,
    pub telegram_chat_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(user: user::Model) -> Self {
        Self {
            address: user.address,
            is_paid_user: user.is_paid_user,
            subscription_expiry: user.subscription_expiry,
            telegram_notifications_enabled: user.telegram_notifications_enabled,
            telegram_chat_id: user.telegram_chat_id,
            created_at: user.created_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub address: String,
    #[serde(flatten)]
    pub resolution: Resolution,
}

pub async fn connect(
    State(state): State<AppState>,
    Json(request): Json<ConnectRequest>
) -> Result<Json<UserResponse>> {
    let user = state.user_service.connect(&request.address).await?;
    Ok(Json(user.into()))
}

pub async fn get_subscription(
    State(state): State<AppState>,
    Path(address): Path<String>
) -> Result<Json<SubscriptionResponse>> {
    let address = normalize_address(&address)?;
    let resolution = state.subscription_service.resolve(&address).await?;

    Ok(Json(SubscriptionResponse { address, resolution }))
}

/// Only the wallet itself may change where its notifications go.
pub async fn update_telegram(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(address): Path<String>,
    Json(request): Json<TelegramSettingsRequest>
) -> Result<Json<UserResponse>> {
    let address = normalize_address(&address)?;
    match authenticated_wallet(&headers, Utc::now())? {
        Some(caller) if caller == address => {}
        Some(_) => {
            return Err(AppError::Forbidden);
        }
        None => {
            return Err(AppError::Unauthorized("Sign in with this wallet".to_string()));
        }
    }

    let user = state.user_service.update_telegram_settings(
        &address,
        request.enabled,
        request.chat_id
    ).await?;

    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use crate::api::auth::test_support::{ address_of, signed, wallet, ADMIN_KEY, USER_KEY };
    use crate::api::test_support::app;
    use axum::body::{ to_bytes, Body };
    use axum::http::{ Request, StatusCode };
    use tower::ServiceExt;

    const ALICE: &str = "0x742d35cc6634c0532925a3b844bc9e7595f0beb0";

    #[tokio::test]
    async fn test_connect_then_resolve() {
        let (app, _) = app().await;

        let response = app
            .clone()
            .oneshot(
                Request::post("/api/users/connect")
                    .header("content-type", "application/json")
                    .body(Body::from(format!(r#"{{"address":"{}"}}"#, ALICE.to_uppercase().replace("0X", "0x"))))
                    .unwrap()
            ).await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::get(format!("/api/users/{}/subscription", ALICE))
                    .body(Body::empty())
                    .unwrap()
            ).await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["address"], ALICE);
        assert_eq!(json["entitled"], false);
        assert_eq!(json["reason"], "notPaid");
    }

    #[tokio::test]
    async fn test_invalid_address_is_bad_request() {
        let (app, _) = app().await;
        let response = app
            .oneshot(Request::get("/api/users/0x123/subscription").body(Body::empty()).unwrap()).await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_only_the_wallet_can_change_its_telegram_settings() {
        let (app, h) = app().await;
        let alice = wallet(USER_KEY);
        let path = format!("/api/users/{}/telegram", address_of(&alice));
        let body = r#"{"enabled":true,"chatId":"12345"}"#;
        let put = || Request::put(path.as_str()).header("content-type", "application/json");

        let response = app.clone().oneshot(put().body(Body::from(body)).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let someone_else = signed(put(), &wallet(ADMIN_KEY)).await;
        let response = app.clone().oneshot(someone_else.body(Body::from(body)).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        h.users.get_or_create(&address_of(&alice)).await.unwrap();
        let owner = signed(put(), &alice).await;
        let response = app.oneshot(owner.body(Body::from(body)).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let user = h.users.find(&address_of(&alice)).await.unwrap().unwrap();
        assert!(user.telegram_notifications_enabled);
        assert_eq!(user.telegram_chat_id.as_deref(), Some("12345"));
    }
}
