pub mod subscription_service;
pub mod payment_service;
pub mod reconciliation_service;
pub mod visibility;
pub mod opportunity_cache;
pub mod opportunity_service;
pub mod user_service;
pub mod notification_service;

pub use subscription_service::{ SubscriptionService, Resolution, ResolutionReason };
pub use payment_service::{ PaymentService, PaymentHandle, PaymentQuote };
pub use reconciliation_service::{ ReconciliationService, ReconcileOutcome, SweepReport };
pub use opportunity_cache::OpportunityCache;
pub use opportunity_service::OpportunityService;
pub use user_service::UserService;
pub use notification_service::NotificationService;
