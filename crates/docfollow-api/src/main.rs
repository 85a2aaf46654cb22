use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use docfollow_api::{build_router, config::Config, state::AppState};
use docfollow_engine::{FollowupEngine, GoogleCalendarBooker, LlmDraftingAgent, ReminderScheduler};
use docfollow_gateway::{HttpMediaExtractor, TwilioGateway};
use docfollow_llm::ClientFactory;
use docfollow_persist::{JobStore, PersistClientBuilder, PersistenceClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    // Initialize logging
    init_logging(&config);

    tracing::info!("Starting DocFollow API server");
    tracing::info!("Config loaded: {}:{}", config.server.host, config.server.port);

    // Persistence
    tracing::info!("Connecting to MongoDB");
    let mongo = PersistClientBuilder::new()
        .mongodb_uri(&config.mongodb_uri)
        .database(&config.mongodb.database)
        .ensure_indexes(config.mongodb.ensure_indexes)
        .build()
        .await?;
    let jobs: Arc<dyn JobStore> = Arc::new(mongo.job_store());
    let store: Arc<dyn PersistenceClient> = Arc::new(mongo);
    tracing::info!("MongoDB connected");

    // Messaging gateway and media extraction
    let gateway = TwilioGateway::new(config.gateway.clone())?;
    if config.gateway.credentials().is_none() {
        tracing::warn!("Twilio credentials missing; outbound messages will fail");
    }
    let mut extractor = HttpMediaExtractor::new(config.media.clone())?;
    if let Some((sid, token)) = config.gateway.credentials() {
        extractor = extractor.with_credentials(sid, token);
    }

    let scheduler = Arc::new(ReminderScheduler::new(
        store.clone(),
        jobs,
        config.scheduler.clone(),
    ));

    let mut engine = FollowupEngine::new(
        store,
        Arc::new(gateway),
        Arc::new(extractor),
        scheduler.clone(),
    );

    // Drafting agent
    match config.llm_provider() {
        Some(provider) => {
            tracing::info!(provider = ?provider.provider_type(), model = %config.llm.model, "Initializing drafting agent");
            let client = ClientFactory::create_chat_client(provider)?;
            let agent = LlmDraftingAgent::new(client, config.llm.model.clone())
                .with_timeout(Duration::from_secs(config.llm.timeout_secs))
                .with_temperature(config.llm.temperature);
            engine = engine.with_agent(Arc::new(agent));
        }
        None => tracing::warn!("No LLM credentials; drafting agent unavailable"),
    }

    // Calendar booking
    if config.calendar.access_token.is_some() {
        let booker = GoogleCalendarBooker::new(config.calendar.clone())?;
        engine = engine.with_booker(Arc::new(booker));
        tracing::info!(calendar_id = %config.calendar.calendar_id, "Calendar booking enabled");
    } else {
        tracing::warn!("GOOGLE_CALENDAR_TOKEN not set; appointment booking unavailable");
    }

    // Reminder scheduler
    let scheduler_handle = scheduler.start(Arc::new(engine.clone()));

    let state = Arc::new(AppState::new(config.clone(), engine));
    let app = build_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check: http://{}/health", addr);
    tracing::info!("API docs: http://{}/api/docs", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Stopping reminder scheduler");
    scheduler_handle.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}
