use actix_web::{middleware, web, App, HttpServer};
use actix_web_httpauth::middleware::HttpAuthentication;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::env;
use std::str::FromStr;

use pooltrack::state::{AppState, MailConfig, SmsConfig};
use pooltrack::{auth, backup::BackupManager, db, routes};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(err) = run().await {
        eprintln!("Startup error: {err}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let db_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./data/pooltrack.db".to_string());
    db::ensure_sqlite_dir(&db_url)?;

    // Client references are checked in the handlers; restored backups may
    // carry orphaned rows, so the database does not enforce them.
    let connect_options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(false);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await?;

    db::run_migrations(&pool).await?;
    db::seed_defaults(&pool).await?;

    let state = AppState {
        db: pool.clone(),
        sms: SmsConfig::from_env(),
        mail: MailConfig::from_env(),
        backup: BackupManager::from_env(),
        cron_secret: env::var("CRON_SECRET").unwrap_or_default(),
    };

    if state.cron_secret.is_empty() {
        log::warn!("CRON_SECRET not set. Cron endpoints are disabled.");
    }

    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8080);

    let address = format!("0.0.0.0:{port}");
    log::info!("Starting PoolTrack on http://{address}");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(middleware::Logger::default())
            .route("/health", web::get().to(routes::health))
            .configure(routes::cron::configure)
            .service(
                web::scope("/api")
                    .wrap(HttpAuthentication::basic(auth::owner_validator))
                    .configure(routes::configure_api),
            )
    })
    .bind(address)?
    .run()
    .await?;

    Ok(())
}
