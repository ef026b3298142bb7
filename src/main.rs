use anyhow::Context;
use migration::MigratorTrait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{ cors::CorsLayer, trace::TraceLayer };
use tracing_subscriber::{ layer::SubscriberExt, util::SubscriberInitExt };
use yield_bearer::{
    api::{ self, AppState },
    chains::evm::LocalSigner,
    db::{ OpportunityRepository, PendingTransactionRepository, UserRepository },
    rpc::RpcManager,
    scheduler::Scheduler,
    services::{
        NotificationService,
        OpportunityCache,
        OpportunityService,
        PaymentService,
        ReconciliationService,
        SubscriptionService,
        UserService,
    },
    watcher::WatcherRegistry,
    Config,
    SubscriptionDuration,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber
        ::registry()
        .with(
            tracing_subscriber::EnvFilter
                ::try_from_default_env()
                .unwrap_or_else(|_| "yield_bearer=debug,tower_http=debug".into())
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    tracing::info!(
        networks = config.networks.iter().count(),
        receiver = %config.payment.receiver_address,
        "Starting yield-bearer"
    );

    // Initialize database connection
    let db = sea_orm::Database
        ::connect(&config.database_url).await
        .context("Failed to connect to database")?;

    tracing::info!("Database connected successfully");

    // Run migrations
    migration::Migrator::up(&db, None).await.context("Failed to run migrations")?;

    tracing::info!("Migrations completed successfully");

    // Initialize RPC manager
    let rpc_manager = Arc::new(RpcManager::new(&config.networks)?);
    tracing::info!("RPC manager initialized");

    // Initialize repositories
    let users = Arc::new(UserRepository::new(db.clone()));
    let pending = Arc::new(PendingTransactionRepository::new(db.clone()));
    let opportunities = Arc::new(OpportunityRepository::new(db.clone()));

    // Initialize services
    let cache = Arc::new(OpportunityCache::new(config.intervals.cache_ttl));
    let notifications = Arc::new(NotificationService::new(config.telegram_bot_token.as_deref()));
    if notifications.is_enabled() {
        tracing::info!("Telegram notifications enabled");
    }

    let subscription_service = Arc::new(SubscriptionService::new(users.clone(), cache.clone()));
    let payment_service = Arc::new(
        PaymentService::new(pending.clone(), config.payment.clone(), config.networks.clone())
    );
    let reconciliation_service = Arc::new(
        ReconciliationService::new(
            db.clone(),
            users.clone(),
            pending.clone(),
            rpc_manager.clone(),
            cache.clone(),
            notifications,
            &config.payment.receiver_address,
            config.intervals.retention
        )
    );

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("pay") {
        return operator_payment(&config, &args[1..], rpc_manager, &payment_service).await;
    }

    let opportunity_service = Arc::new(
        OpportunityService::new(opportunities, subscription_service.clone(), cache.clone())
    );
    if config.admin_address.is_none() {
        tracing::warn!("ADMIN_ADDRESS is not set, admin endpoints are disabled");
    }
    let user_service = Arc::new(UserService::new(users, config.admin_address.as_deref()));

    // Background jobs and session watchers share one shutdown token
    let shutdown = CancellationToken::new();
    let watchers = Arc::new(
        WatcherRegistry::new(
            reconciliation_service.clone(),
            config.intervals.watch_interval,
            config.intervals.watch_lifetime,
            shutdown.child_token()
        )
    );
    let jobs = Scheduler::new(
        reconciliation_service.clone(),
        config.intervals.clone(),
        shutdown.child_token()
    ).start();
    tracing::info!("Scheduler started");

    // Create app state
    let app_state = AppState::new(
        user_service,
        subscription_service,
        payment_service,
        reconciliation_service,
        opportunity_service,
        watchers.clone()
    );

    // Build application router
    let app = api
        ::router(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", config.server_host, config.server_port);
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener
        ::bind(&addr).await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let server_shutdown = shutdown.clone();
    axum
        ::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested");
            server_shutdown.cancel();
        }).await
        .context("Server error")?;

    tracing::info!(active = watchers.active().await, "Stopping payment watchers");
    watchers.shutdown();
    shutdown.cancel();
    for job in jobs {
        let _ = job.await;
    }

    Ok(())
}

/// `pay <month|year> <chain_id>`: subscribes the configured server key's own
/// address, paying from that key. The pending sweep confirms it like any
/// other payment.
async fn operator_payment(
    config: &Config,
    args: &[String],
    rpc_manager: Arc<RpcManager>,
    payment_service: &PaymentService
) -> anyhow::Result<()> {
    let [duration, chain_id] = args else {
        anyhow::bail!("usage: yield-bearer pay <month|year> <chain_id>");
    };

    let duration: SubscriptionDuration = duration.parse()?;
    let chain_id: u64 = chain_id.parse().context("chain_id must be a number")?;

    let private_key = config.payer_private_key
        .as_deref()
        .context("PAYER_PRIVATE_KEY is not set")?;
    let signer = LocalSigner::new(private_key, rpc_manager)?;
    let address = signer.address();

    tracing::info!(%address, %duration, chain_id, "Sending operator payment");

    let handle = payment_service.pay(&address, duration, chain_id, Some(&signer)).await?;

    println!("{}", serde_json::to_string_pretty(&handle)?);
    Ok(())
}
