use std::time::{Duration, Instant};

use actix_files as fs;
use actix_web::{middleware::Logger, web::Data, App, HttpServer};
use dotenv::dotenv;
use log::{debug, error, info};
use tera::Tera;

use chat_relay::config::Config;
use chat_relay::model::ModelManager;
use chat_relay::web::rate_limit::RateLimiter;
use chat_relay::web::routes;
use chat_relay::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting chat relay");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    let model = match ModelManager::gemini(&config.gemini) {
        Ok(manager) => manager,
        Err(e) => {
            error!("Failed to initialize Gemini client: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize template engine
    let mut tera = match Tera::new("templates/**/*") {
        Ok(t) => t,
        Err(e) => {
            error!("Template parsing error: {}", e);
            std::process::exit(1);
        }
    };
    tera.autoescape_on(vec![".html"]);

    let app_state = Data::new(AppState::new(
        tera,
        model,
        RateLimiter::new(&config.rate_limit),
    ));

    // Expired rate-limit windows are only dropped here
    let sweeper = app_state.clone();
    let period = config.rate_limit.sweep_interval.max(Duration::from_secs(1));
    actix_web::rt::spawn(async move {
        let mut ticker = actix_web::rt::time::interval(period);
        loop {
            ticker.tick().await;
            let removed = sweeper.limiter.sweep_expired(Instant::now());
            if removed > 0 {
                debug!("Swept {} expired rate-limit entries", removed);
            }
        }
    });

    info!("Listening on {}:{}", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(app_state.clone())
            .configure(routes::configure)
            .service(fs::Files::new("/static", "./static"))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
