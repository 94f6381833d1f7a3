#![warn(clippy::all, clippy::pedantic)]

use std::env;
use std::net::SocketAddr;

use actix_web::{App, HttpServer, web};
use healthbeat_service::config::Config;
use healthbeat_service::database::open_database;
use healthbeat_service::orchestrator::CheckOrchestrator;
use tracing::info;

mod error;
mod routes;

use error::AppError;
use logger::init_tracing;

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_config(env::var_os("HEALTHBEAT_CONFIG"))?;
    let database = open_database(&config.database).await?;
    let orchestrator = CheckOrchestrator::from_config(database, &config.checks)?;

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    run_server(addr, web::Data::new(orchestrator)).await
}

async fn run_server(addr: SocketAddr, orchestrator: web::Data<CheckOrchestrator>) -> Result<(), AppError> {
    info!(%addr, "Starting health check trigger");

    HttpServer::new(move || {
        App::new()
            .app_data(orchestrator.clone())
            .wrap(routes::cors_headers())
            .configure(routes::routes)
    })
    .bind(addr)?
    .run()
    .await?;

    Ok(())
}
