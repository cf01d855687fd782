//! Calendar assistant HTTP server.
//!
//! Serves the command endpoint, settings and the WhatsApp webhook, and runs
//! the reminder and briefing pollers in the background.

mod config;
mod error;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use brain_core::{DisabledModel, LanguageModel};
use calendar::{CalendarConnector, GoogleConfig, GoogleConnector};
use claude_brain::ClaudeBrain;
use database::Database;
use mailer::Mailer;
use notifier::{
    spawn_pollers, BriefingScheduler, Delivery, MessageComposer, NotifierConfig, PollJob, ReminderDispatcher,
    WhatsAppSender,
};
use orchestrator::Orchestrator;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use whatsapp::TwilioClient;

use crate::config::ApiConfig;
use crate::state::{AppState, WebhookAuth};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "API_STARTUP_FAILED");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ApiConfig::from_env();

    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;

    let model = language_model();
    let connector: Arc<dyn CalendarConnector> = Arc::new(GoogleConnector::new(db.clone(), GoogleConfig::from_env())?);
    let orchestrator = Arc::new(Orchestrator::from_env(db.clone(), model.clone(), connector.clone()));

    let twilio = match TwilioClient::from_env() {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!(error = %e, "Twilio not configured; WhatsApp delivery disabled");
            None
        }
    };

    let notifier_config = NotifierConfig::from_env();
    let composer = MessageComposer::new(model, notifier_config.call_timeout);
    let delivery = Delivery::new(
        twilio.clone().map(|c| c as Arc<dyn WhatsAppSender>),
        Mailer::from_env(),
        notifier_config.call_timeout,
    );
    let jobs: Vec<Arc<dyn PollJob>> = vec![
        Arc::new(ReminderDispatcher::new(
            db.clone(),
            connector.clone(),
            composer.clone(),
            delivery.clone(),
            &notifier_config,
        )),
        Arc::new(BriefingScheduler::new(db.clone(), connector, composer, delivery, &notifier_config)),
    ];
    let _pollers = spawn_pollers(&db, jobs, &notifier_config);
    info!(instance = %notifier_config.instance_id, "Notifier pollers started");

    let webhook_auth = match (&twilio, config.webhook_url) {
        (Some(client), Some(url)) => Some(WebhookAuth::new(client.config().auth_token().clone(), url)),
        (Some(_), None) => {
            warn!("TWILIO_WEBHOOK_URL not set; inbound webhook signatures are not checked");
            None
        }
        _ => None,
    };

    let state = AppState::new(db, orchestrator)
        .with_api_token(config.api_token)
        .with_webhook_auth(webhook_auth);
    let app = routes::router(state);

    let addr: SocketAddr = config.addr.parse()?;
    info!(%addr, "Calendar assistant API listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Claude when `CLAUDE_API_KEY` is set; otherwise every model call reports unavailable.
fn language_model() -> Arc<dyn LanguageModel> {
    match ClaudeBrain::from_env() {
        Ok(brain) => {
            info!(model = %brain.config().model, "Using Claude language model");
            Arc::new(brain)
        }
        Err(e) => {
            warn!(error = %e, "Language model not configured; using deterministic fallbacks");
            Arc::new(DisabledModel)
        }
    }
}
