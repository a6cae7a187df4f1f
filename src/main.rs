use std::sync::{Arc, Mutex};

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use lensbook::config::AppConfig;
use lensbook::db;
use lensbook::handlers;
use lensbook::services::ai::groq::GroqProvider;
use lensbook::services::ai::ollama::OllamaProvider;
use lensbook::services::ai::LlmProvider;
use lensbook::services::calendar::sqlite::SqliteCalendar;
use lensbook::services::clock::SystemClock;
use lensbook::services::messaging::twilio::TwilioWhatsAppProvider;
use lensbook::services::orchestrator::{Collaborators, Orchestrator, Settings};
use lensbook::services::sweeper::Sweeper;
use lensbook::state::AppState;

const IDLE_TIMEOUT_MINUTES: i64 = 30;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    let offset = config.utc_offset();

    let conn = db::init_db(&config.database_url)?;
    let calendar = SqliteCalendar::new(Arc::new(Mutex::new(conn)), offset);

    let llm: Arc<dyn LlmProvider> = match config.llm_provider.as_str() {
        "groq" => {
            anyhow::ensure!(!config.groq_api_key.is_empty(), "GROQ_API_KEY must be set when LLM_PROVIDER=groq");
            tracing::info!("using Groq LLM provider (model: {})", config.groq_model);
            Arc::new(GroqProvider::new(config.groq_api_key.clone(), config.groq_model.clone()))
        }
        _ => {
            tracing::info!("using Ollama LLM provider (url: {}, model: {})", config.ollama_url, config.ollama_model);
            Arc::new(OllamaProvider::new(config.ollama_url.clone(), config.ollama_model.clone()))
        }
    };

    if config.twilio_account_sid.is_empty() {
        tracing::warn!("TWILIO_ACCOUNT_SID not set, outbound WhatsApp messages will fail");
    }
    let messaging = TwilioWhatsAppProvider::new(
        config.twilio_account_sid.clone(),
        config.twilio_auth_token.clone(),
        config.twilio_whatsapp_number.clone(),
    );

    if config.admin_id().is_none() {
        tracing::warn!("ADMIN_PHONE not set, intervention pause and admin notices are disabled");
    }

    let (orchestrator, flush_rx) = Orchestrator::new(
        Collaborators {
            llm,
            messaging: Arc::new(messaging),
            calendar: Arc::new(calendar),
            clock: Arc::new(SystemClock::new(offset)),
        },
        Settings {
            business_name: config.business_name.clone(),
            admin_id: config.admin_id().map(str::to_string),
            pacing: config.pacing.clone(),
            session_minutes: config.session_duration_minutes,
            idle_timeout: chrono::Duration::minutes(IDLE_TIMEOUT_MINUTES),
        },
    );

    tokio::spawn(orchestrator.clone().run_dispatcher(flush_rx));
    let sweeper = Sweeper::start(orchestrator.clone());

    let state = Arc::new(AppState {
        config: config.clone(),
        orchestrator,
    });

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/webhook/whatsapp", post(handlers::webhook::whatsapp_webhook))
        .route("/api/admin/status", get(handlers::admin::get_status))
        .route("/api/admin/resume", post(handlers::admin::resume_agent))
        .route("/api/dev/message", post(handlers::dev::send_message))
        .route("/api/dev/typing", post(handlers::dev::typing))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(business = %config.business_name, "starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    sweeper.stop().await;
    Ok(())
}
