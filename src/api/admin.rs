use axum::{ extract::{ Path, State }, http::{ HeaderMap, StatusCode }, Json };
use chrono::Utc;
use uuid::Uuid;

use crate::db::{ OpportunityInput, OpportunityPatch };
use crate::error::{ AppError, Result };
use crate::services::visibility::Opportunity;

use super::auth::authenticated_wallet;
use super::AppState;

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<()> {
    match authenticated_wallet(headers, Utc::now())? {
        Some(address) if state.user_service.is_admin(&address) => Ok(()),
        Some(address) => {
            tracing::warn!(%address, "Rejected admin request");
            Err(AppError::Forbidden)
        }
        None => Err(AppError::Unauthorized("Sign in with the admin wallet".to_string())),
    }
}

pub async fn list_opportunities(
    State(state): State<AppState>,
    headers: HeaderMap
) -> Result<Json<Vec<Opportunity>>> {
    require_admin(&state, &headers)?;
    Ok(Json(state.opportunity_service.list().await?))
}

pub async fn create_opportunity(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<OpportunityInput>
) -> Result<(StatusCode, Json<Opportunity>)> {
    require_admin(&state, &headers)?;
    let created = state.opportunity_service.create(input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_opportunity(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(patch): Json<OpportunityPatch>
) -> Result<Json<Opportunity>> {
    require_admin(&state, &headers)?;
    Ok(Json(state.opportunity_service.update(id, patch).await?))
}

pub async fn delete_opportunity(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>
) -> Result<StatusCode> {
    require_admin(&state, &headers)?;
    state.opportunity_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::api::auth::test_support::{ address_of, signed, wallet, ADMIN_KEY, USER_KEY };
    use crate::api::test_support::app;
    use axum::body::{ to_bytes, Body };
    use axum::http::{ request::Builder, Request, StatusCode };
    use tower::ServiceExt;

    const BODY: &str =
        r#"{"name":"Aave USDC","network":"Ethereum","link":"https://app.aave.com","estimatedApy":4.5,"tvl":350000000,"relativeRisk":"Low","category":"stablecoin","isBenchmark":true}"#;

    fn create() -> Builder {
        Request::post("/api/admin/opportunities").header("content-type", "application/json")
    }

    async fn as_admin(request: Builder) -> Builder {
        signed(request, &wallet(ADMIN_KEY)).await
    }

    #[tokio::test]
    async fn test_only_admin_can_mutate() {
        let (app, _) = app().await;

        let response = app.clone().oneshot(create().body(Body::from(BODY)).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let user = signed(create(), &wallet(USER_KEY)).await;
        let response = app.clone().oneshot(user.body(Body::from(BODY)).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        // Claiming the admin address without its signature
        let forged = create().header("x-wallet-address", address_of(&wallet(ADMIN_KEY)));
        let response = app.clone().oneshot(forged.body(Body::from(BODY)).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let admin = as_admin(create()).await;
        let response = app.oneshot(admin.body(Body::from(BODY)).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_update_and_delete_round() {
        let (app, _) = app().await;
        let response = app
            .clone()
            .oneshot(as_admin(create()).await.body(Body::from(BODY)).unwrap()).await
            .unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let created: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["formattedTvl"], "$350.00M");

        let update = as_admin(
            Request::put(format!("/api/admin/opportunities/{}", id)).header("content-type", "application/json")
        ).await;
        let response = app
            .clone()
            .oneshot(update.body(Body::from(r#"{"estimatedApy":5.25}"#)).unwrap()).await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let updated: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(updated["estimatedApy"], 5.25);

        let listed = as_admin(Request::get("/api/admin/opportunities")).await;
        let response = app.clone().oneshot(listed.body(Body::empty()).unwrap()).await.unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let all: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(all.as_array().unwrap().len(), 1);

        let path = format!("/api/admin/opportunities/{}", id);
        let delete = as_admin(Request::delete(path.as_str())).await;
        assert_eq!(
            app.clone().oneshot(delete.body(Body::empty()).unwrap()).await.unwrap().status(),
            StatusCode::NO_CONTENT
        );
        let delete = as_admin(Request::delete(path.as_str())).await;
        assert_eq!(app.oneshot(delete.body(Body::empty()).unwrap()).await.unwrap().status(), StatusCode::NOT_FOUND);
    }
}
