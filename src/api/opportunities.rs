use axum::{ extract::{ Query, State }, http::HeaderMap, Json };
use chrono::{ DateTime, Utc };
use serde::{ Deserialize, Serialize };

use crate::enums::{ SortDirection, SortKey };
use crate::error::Result;
use crate::services::visibility::FilteredOpportunities;

use super::auth::authenticated_wallet;
use super::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingQuery {
    #[serde(default)]
    pub sort_key: SortKey,
    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastUpdatedResponse {
    pub yield_last_updated: Option<DateTime<Utc>>,
}

/// Listing for whoever is asking; no signed wallet means the public tier.
pub async fn list_opportunities(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListingQuery>
) -> Result<Json<FilteredOpportunities>> {
    let address = authenticated_wallet(&headers, Utc::now())?;
    let listing = state.opportunity_service.listing(
        address.as_deref(),
        query.sort_key,
        query.direction
    ).await?;

    Ok(Json(listing))
}

pub async fn last_updated(State(state): State<AppState>) -> Result<Json<LastUpdatedResponse>> {
    let yield_last_updated = state.opportunity_service.last_updated().await?;
    Ok(Json(LastUpdatedResponse { yield_last_updated }))
}

#[cfg(test)]
mod tests {
    use crate::api::auth::test_support::{ address_of, signed, wallet, USER_KEY };
    use crate::api::test_support::app;
    use crate::db::{ OpportunityInput, OpportunityRepository, UserRepository };
    use crate::enums::{ Category, RelativeRisk };
    use axum::body::{ to_bytes, Body };
    use axum::http::{ Request, StatusCode };
    use chrono::{ Duration, Utc };
    use crate::db::entity::{ yield_opportunity, YieldOpportunity };
    use sea_orm::{ sea_query::Expr, ColumnTrait, EntityTrait, QueryFilter };
    use ethers::signers::LocalWallet;
    use tower::ServiceExt;

    fn input(name: &str, category: Category) -> OpportunityInput {
        OpportunityInput {
            name: name.to_string(),
            network: "Ethereum".to_string(),
            link: "https://example.com".to_string(),
            notes: String::new(),
            estimated_apy: 5.0,
            tvl: 2_000_000.0,
            relative_risk: RelativeRisk::Low,
            category,
            is_benchmark: false,
        }
    }

    async fn listing(app: axum::Router, caller: Option<&LocalWallet>) -> serde_json::Value {
        let mut request = Request::get("/api/opportunities?sortKey=tvl&direction=asc");
        if let Some(caller) = caller {
            request = signed(request, caller).await;
        }
        let response = app.oneshot(request.body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_listing_follows_the_callers_tier() {
        let (app, h) = app().await;
        let repo = OpportunityRepository::new(h.db.clone());

        repo.create(input("Old stable", Category::Stablecoin)).await.unwrap();
        repo.create(input("New stable", Category::Stablecoin)).await.unwrap();
        repo.create(input("Loop", Category::AdvancedStrategies)).await.unwrap();

        // Age everything but "New stable" past the window
        YieldOpportunity::update_many()
            .col_expr(yield_opportunity::Column::DateAdded, Expr::value(Utc::now() - Duration::days(5)))
            .filter(yield_opportunity::Column::Name.ne("New stable"))
            .exec(&h.db).await
            .unwrap();

        let public = listing(app.clone(), None).await;
        assert_eq!(public["tier"], "public");
        assert_eq!(public["categories"]["stablecoin"]["visible"].as_array().unwrap().len(), 1);
        assert_eq!(public["categories"]["stablecoin"]["hiddenCount"], 1);
        assert_eq!(public["categories"]["advancedStrategies"]["visible"].as_array().unwrap().len(), 0);
        assert_eq!(public["recentCount"], 2);

        let alice = wallet(USER_KEY);
        let unpaid = listing(app.clone(), Some(&alice)).await;
        assert_eq!(unpaid["tier"], "free");

        UserRepository::set_entitlement_in(&h.db, None, &address_of(&alice), Utc::now() + Duration::days(30)).await
            .unwrap();
        let paid = listing(app.clone(), Some(&alice)).await;
        assert_eq!(paid["tier"], "paid");
        assert_eq!(paid["categories"]["stablecoin"]["visible"].as_array().unwrap().len(), 2);
        assert_eq!(paid["recentCount"], 0);
    }

    #[tokio::test]
    async fn test_unsigned_wallet_header_is_unauthorized() {
        let (app, h) = app().await;
        let alice = address_of(&wallet(USER_KEY));
        UserRepository::set_entitlement_in(&h.db, None, &alice, Utc::now() + Duration::days(30)).await.unwrap();

        let request = Request::get("/api/opportunities").header("x-wallet-address", alice).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
