use std::{net::TcpListener, sync::Arc, time::Duration};

use actix_web::{
    dev::Server,
    middleware::Logger,
    web::{self, Data},
    App, HttpServer,
};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use crate::{
    configuration::{DatabaseSettings, Settings},
    domain::{prompt::PromptBuilder, response_parser::HeuristicResponseParser},
    routes::{default_route, duplicate_route, lead_route},
    services::{LeadFinder, OpenaiClient, QueryOrchestrator},
};

pub fn get_connection_pool(configuration: &DatabaseSettings) -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_lazy_with(configuration.connect_options())
}

pub fn build_lead_finder(configuration: &Settings, pool: SqlitePool) -> anyhow::Result<LeadFinder> {
    let prompt_builder = PromptBuilder::from_file(&configuration.search.prompt_template)?;
    let openai_client = OpenaiClient::new(&configuration.completion)?;
    let orchestrator = QueryOrchestrator::new(
        Arc::new(openai_client),
        prompt_builder,
        configuration.completion.max_parts,
    );
    let parser = HeuristicResponseParser::new(configuration.completion.source_label.clone());

    Ok(LeadFinder::new(pool, orchestrator, Arc::new(parser)))
}

pub fn run(listener: TcpListener, lead_finder: LeadFinder) -> Result<Server, std::io::Error> {
    let db_pool = web::Data::new(lead_finder.pool().clone());
    let lead_finder = Data::new(lead_finder);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .service(default_route::default)
            .service(
                web::scope("/lead")
                    .service(lead_route::search_leads)
                    .service(lead_route::get_all_leads)
                    .service(duplicate_route::get_duplicate_summary)
                    .service(duplicate_route::remove_duplicates)
                    .service(lead_route::get_existing_leads),
            )
            .app_data(db_pool.clone())
            .app_data(lead_finder.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
