use actix_web::{App, HttpServer, middleware::Logger, web};
use dotenvy::dotenv;
use plantaia::{
    api::{self, AppState, AuthKeys},
    config::{
        database::{create_connection, create_tables, get_database_url},
        env::Secrets,
        settings::{AppConfig, load_config_or_default},
    },
    core::{
        feed::FeedNotifier,
        renewal::{format_renewal_summary, renew_plans_if_due},
        studio::Studio,
    },
    errors::Result,
    gateway::GeminiGateway,
    payment::StripeCheckout,
};
use sea_orm::DatabaseConnection;
use std::{sync::Arc, time::Duration};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const CONFIG_PATH: &str = "config.toml";
const RENEWAL_CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);

async fn run_renewal(db: &DatabaseConnection, config: &AppConfig) {
    match renew_plans_if_due(db, config).await {
        Ok(Some(summary)) => info!("{}", format_renewal_summary(&summary)),
        Ok(None) => {}
        Err(e) => error!("Plan renewal failed: {e}"),
    }
}

#[actix_web::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; variables may also come from the environment
    dotenv().ok();

    // 3. Settings and secrets
    let config = Arc::new(load_config_or_default(CONFIG_PATH)?);
    let secrets = Secrets::from_env()?;
    if secrets.stripe_webhook_secret.is_none() {
        tracing::warn!("STRIPE_WEBHOOK_SECRET is not set; webhooks will not be verified");
    }

    // 4. Database
    let db = create_connection(&get_database_url())
        .await
        .inspect_err(|e| error!("Failed to connect to database: {e}"))?;
    create_tables(&db).await?;

    // 5. Monthly plan renewal, now and then hourly
    run_renewal(&db, &config).await;
    {
        let db = db.clone();
        let config = Arc::clone(&config);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(RENEWAL_CHECK_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                run_renewal(&db, &config).await;
            }
        });
    }

    // 6. Wire the services
    let notifier = FeedNotifier::default();
    let gateway = Arc::new(GeminiGateway::new(secrets.gemini_api_key.clone()));
    let state = AppState {
        studio: Studio::new(db.clone(), gateway, notifier.clone(), &config),
        auth: AuthKeys::new(&secrets.auth_jwt_secret, config.auth.audience.as_deref()),
        checkout: StripeCheckout::new(secrets.stripe_secret_key.clone(), config.checkout.clone()),
        webhook_secret: secrets.stripe_webhook_secret.clone(),
        db,
        notifier,
        config: Arc::clone(&config),
    };

    let address = (config.server.host.clone(), config.server.port);
    info!("Starting server on http://{}:{}", address.0, address.1);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(api::configure)
    })
    .bind(address)?
    .run()
    .await?;

    Ok(())
}
