use actix_web::{App, HttpServer, middleware::Logger, web};
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use chrono::Local;  // timestamp in log lines
use std::sync::Arc;

use lead_intake::{
    config::{Config, VerificationMode},
    external::{
        HttpLeadStore, LeadStore, SmsCodeVerifier, TurnstileGuard, TwilioService,
        TwilioVerifyService, VerificationService,
    },
    handlers,
    middlewares::{AdminAuthMiddleware, create_cors},
    services::*,
    swagger::swagger_config,
    utils::CallPolicy,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    let config = Config::from_toml().expect("Failed to load configuration file");

    // External collaborators
    let verifier: Arc<dyn VerificationService> = match config.twilio.mode {
        VerificationMode::Verify => Arc::new(TwilioVerifyService::new(config.twilio.clone())),
        VerificationMode::Sms => Arc::new(SmsCodeVerifier::new(TwilioService::new(
            config.twilio.clone(),
        ))),
    };
    let human_check = Arc::new(TurnstileGuard::new(config.turnstile.clone()));
    if !human_check.is_enabled() {
        log::warn!("Turnstile secret not configured, anti-automation check disabled");
    }
    let store: Arc<dyn LeadStore> = Arc::new(HttpLeadStore::new(config.lead_store.clone()));

    let policy = CallPolicy::from_config(&config.intake);
    let intake_service = IntakeService::new(
        config.intake.clone(),
        verifier,
        human_check.clone(),
        store.clone(),
    );
    let sessions = IntakeSessions::new(
        intake_service,
        config.intake.session_ttl_secs,
        config.intake.max_sessions,
    );
    let leads_service = LeadsService::new(store, policy);

    // Drop abandoned registration forms once a minute
    {
        let sessions = sessions.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                let removed = sessions.sweep_expired(chrono::Utc::now()).await;
                if removed > 0 {
                    log::info!("Expired {} idle intake sessions", removed);
                }
            }
        });
    }

    if config.admin.api_token.is_empty() {
        log::warn!("ADMIN_API_TOKEN not configured, admin routes are closed");
    }

    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    let admin_token = config.admin.api_token.clone();
    let result = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors())
            .wrap(AdminAuthMiddleware::new(admin_token.clone()))
            .app_data(web::Data::new(sessions.clone()))
            .app_data(web::Data::new(leads_service.clone()))
            .configure(swagger_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::intake_config)
                    .configure(handlers::admin_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await;

    human_check.teardown().await;
    result
}
