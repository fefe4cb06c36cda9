use dotenv::dotenv;
use log::{error, info, warn};
use warp::Filter;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

mod handlers;
mod models;
mod services;
mod routes;

use routes::AppState;
use services::blacklist::BlacklistCache;
use services::db::DbStore;
use services::yahoo::YahooClient;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    info!("Logger initialized. Starting the application...");

    let port_str = env::var("PORT").unwrap_or_else(|_| {
        warn!("$PORT not set, defaulting to 3030");
        "3030".to_string()
    });

    let port: u16 = port_str.parse().expect("PORT must be a number");
    info!("Using PORT: {}", port);

    let addr: SocketAddr = ([0, 0, 0, 0], port).into();

    // The database is optional: screening still works without it, only
    // caching and the bulk listing are lost.
    let db = match env::var("DATABASE_URL") {
        Ok(url) => match DbStore::new(&url).await {
            Ok(store) => {
                info!("Connected to database - full features enabled");
                Some(store)
            }
            Err(e) => {
                warn!("Database connection failed ({}). Continuing without it - stock screening still works.", e);
                None
            }
        },
        Err(_) => {
            warn!("$DATABASE_URL not set. Running without database - stock screening still works.");
            None
        }
    };

    let yahoo = match YahooClient::new() {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            return;
        }
    };

    let blacklist = BlacklistCache::new();
    blacklist.initialize(db.as_ref()).await;

    let state = Arc::new(AppState { db, blacklist, yahoo });

    let cors = warp::cors()
        .allow_any_origin()
        .allow_header("content-type")
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE"]);

    let api = routes::routes(state).with(cors);
    info!("Routes configured successfully with CORS.");

    info!("Starting server on {}", addr);
    warp::serve(api)
        .run(addr)
        .await;
}
