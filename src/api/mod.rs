use axum::{ routing::{ delete, get, post, put }, Router };
use std::sync::Arc;

pub mod auth;
pub mod users;
pub mod payments;
pub mod opportunities;
pub mod admin;

use crate::services::{
    OpportunityService,
    PaymentService,
    ReconciliationService,
    SubscriptionService,
    UserService,
};
use crate::watcher::WatcherRegistry;

#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub subscription_service: Arc<SubscriptionService>,
    pub payment_service: Arc<PaymentService>,
    pub reconciliation_service: Arc<ReconciliationService>,
    pub opportunity_service: Arc<OpportunityService>,
    pub watchers: Arc<WatcherRegistry>,
}

impl AppState {
    pub fn new(
        user_service: Arc<UserService>,
        subscription_service: Arc<SubscriptionService>,
        payment_service: Arc<PaymentService>,
        reconciliation_service: Arc<ReconciliationService>,
        opportunity_service: Arc<OpportunityService>,
        watchers: Arc<WatcherRegistry>
    ) -> Self {
        Self {
            user_service,
            subscription_service,
            payment_service,
            reconciliation_service,
            opportunity_service,
            watchers,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/users/connect", post(users::connect))
        .route("/api/users/{address}/subscription", get(users::get_subscription))
        .route("/api/users/{address}/telegram", put(users::update_telegram))
        .route("/api/payments", post(payments::submit_payment))
        .route("/api/payments/quote", get(payments::get_quote))
        .route("/api/payments/quote/qr", get(payments::get_quote_qr))
        .route("/api/payments/{hash}", get(payments::check_payment))
        .route("/api/payments/{hash}/watch", delete(payments::stop_watching))
        .route("/api/opportunities", get(opportunities::list_opportunities))
        .route("/api/opportunities/last-updated", get(opportunities::last_updated))
        .route(
            "/api/admin/opportunities",
            get(admin::list_opportunities).post(admin::create_opportunity)
        )
        .route(
            "/api/admin/opportunities/{id}",
            put(admin::update_opportunity).delete(admin::delete_opportunity)
        )
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
