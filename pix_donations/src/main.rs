mod config;
mod handlers;
mod payments;
mod state;
#[cfg(test)]
mod test_support;

use actix_web::{App, HttpServer, middleware::Logger, web};
use dotenv::dotenv;
use pretty_env_logger::env_logger::{Builder, Env};

use crate::config::AppConfig;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    match cli::run_cli().await {
        Ok(true) => return Ok(()),
        Ok(false) => {}
        Err(e) => {
            eprintln!("{e:#}");
            std::process::exit(1);
        }
    }

    let logger_env = Env::default().default_filter_or("info");
    let mut logger_builder = Builder::from_env(logger_env);
    logger_builder.init();

    let config = AppConfig::from_env().map_err(|e| {
        log::error!("Application initialization failed: {:#}", e);
        std::io::Error::other(e.to_string())
    })?;

    log::info!("Environment: {}", config.environment);

    let state = config.create_app_state().await.map_err(|e| {
        log::error!("Application initialization failed: {:#}", e);
        std::io::Error::other(e.to_string())
    })?;

    log::info!("App state initialized successfully");

    let data = web::Data::new(state);
    let db = data.db.clone();

    log::info!("Listening on {}:{}", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .app_data(handlers::json_config())
            .wrap(Logger::new("%a %t %r %s  %{Referer}i %Dms"))
            .service(handlers::health)
            .service(handlers::create_pix_payment)
            .service(handlers::payment_status)
            .service(handlers::simulate_payment)
            .service(handlers::webhook)
            .service(handlers::get_ranking)
            .service(handlers::get_donations)
            .service(handlers::get_slot_donations)
            .service(handlers::get_stats)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    db.close().await;
    log::info!("Database connection closed");
    Ok(())
}
