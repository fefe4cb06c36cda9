// src/routes.rs
use std::convert::Infallible;
use std::sync::Arc;

use chrono::Utc;
use log::info;
use serde_json::json;
use warp::reject::Rejection;
use warp::{Filter, Reply};

use crate::handlers::error::{ApiError, ErrorKind};
use crate::handlers::{admin, stats, stocks};
use crate::services::blacklist::BlacklistCache;
use crate::services::db::DbStore;
use crate::services::yahoo::YahooClient;

/// Shared application state handed to every handler. The store is optional:
/// without it the API runs in degraded, fetch-only mode.
pub struct AppState {
    pub db: Option<DbStore>,
    pub blacklist: BlacklistCache,
    pub yahoo: YahooClient,
}

// Map our custom errors (and warp's own) to JSON error responses.
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;

    if err.is_not_found() {
        code = warp::http::StatusCode::NOT_FOUND;
        message = "Not Found".to_string();
    } else if let Some(api_error) = err.find::<ApiError>() {
        code = match api_error.kind {
            ErrorKind::NotFound => warp::http::StatusCode::NOT_FOUND,
            ErrorKind::BadRequest => warp::http::StatusCode::BAD_REQUEST,
            ErrorKind::Database => warp::http::StatusCode::SERVICE_UNAVAILABLE,
        };
        message = match api_error.kind {
            // Store failures keep their detail out of the response body.
            ErrorKind::Database => "Internal Server Error".to_string(),
            _ => api_error.message.clone(),
        };
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some() {
        code = warp::http::StatusCode::BAD_REQUEST;
        message = "Invalid request body".to_string();
    } else {
        code = warp::http::StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal Server Error".to_string();
    }

    Ok(warp::reply::with_status(
        warp::reply::json(&json!({
            "error": message,
        })),
        code,
    ))
}

pub fn routes(state: Arc<AppState>) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    info!("Configuring routes...");

    let state_filter = warp::any().map(move || state.clone());

    let list_stocks_route = warp::path!("api" / "v1" / "stocks")
        .and(warp::get())
        .and(warp::query::<stocks::ListQuery>())
        .and(state_filter.clone())
        .and_then(stocks::list_stocks);

    let search_stocks_route = warp::path!("api" / "v1" / "stocks" / "search" / String)
        .and(warp::get())
        .and(state_filter.clone())
        .and_then(stocks::search_stocks);

    let refresh_tracked_route = warp::path!("api" / "v1" / "stocks" / "refresh-tracked")
        .and(warp::post())
        .and(state_filter.clone())
        .and_then(stocks::refresh_tracked);

    let refresh_stock_route = warp::path!("api" / "v1" / "stocks" / "refresh" / String)
        .and(warp::post())
        .and(state_filter.clone())
        .and_then(stocks::refresh_stock);

    let get_stock_route = warp::path!("api" / "v1" / "stocks" / String)
        .and(warp::get())
        .and(state_filter.clone())
        .and_then(stocks::get_stock);

    let stats_route = warp::path!("api" / "v1" / "stats")
        .and(warp::get())
        .and(state_filter.clone())
        .and_then(stats::get_stats);

    let health_route = warp::path!("api" / "v1" / "health")
        .and(warp::get())
        .map(|| {
            warp::reply::json(&json!({
                "status": "OK",
                "message": "Halal Stocks API is running",
                "timestamp": Utc::now().to_rfc3339(),
            }))
        });

    let list_blacklist_route = warp::path!("api" / "v1" / "admin" / "blacklist")
        .and(warp::get())
        .and(warp::query::<admin::BlacklistQuery>())
        .and(state_filter.clone())
        .and_then(admin::list_blacklist);

    let add_blacklist_route = warp::path!("api" / "v1" / "admin" / "blacklist")
        .and(warp::post())
        .and(warp::body::json())
        .and(state_filter.clone())
        .and_then(admin::add_blacklist);

    let refresh_blacklist_route = warp::path!("api" / "v1" / "admin" / "blacklist" / "refresh")
        .and(warp::post())
        .and(state_filter.clone())
        .and_then(admin::refresh_blacklist);

    let initialize_blacklist_route = warp::path!("api" / "v1" / "admin" / "blacklist" / "initialize")
        .and(warp::post())
        .and(state_filter.clone())
        .and_then(admin::initialize_blacklist);

    let remove_blacklist_route = warp::path!("api" / "v1" / "admin" / "blacklist" / String)
        .and(warp::delete())
        .and(warp::query::<admin::RemoveBlacklistQuery>())
        .and(state_filter.clone())
        .and_then(admin::remove_blacklist);

    info!("All routes configured successfully.");

    list_stocks_route
        .or(search_stocks_route)
        .or(refresh_tracked_route)
        .or(refresh_stock_route)
        .or(get_stock_route)
        .or(stats_route)
        .or(health_route)
        .or(list_blacklist_route)
        .or(add_blacklist_route)
        .or(refresh_blacklist_route)
        .or(initialize_blacklist_route)
        .or(remove_blacklist_route)
        .recover(handle_rejection)
}
