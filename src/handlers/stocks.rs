// src/handlers/stocks.rs
use warp::reply::Json;
use warp::Rejection;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use chrono::{Duration, Utc};
use log::{error, info, warn};
use tokio::time::Duration as TokioDuration;

use crate::handlers::error::ApiError;
use crate::models::{Pagination, ScreenedStock, Sector};
use crate::routes::AppState;
use crate::services::ranking::{self, SortKey, DEFAULT_PAGE_LIMIT};
use crate::services::screening;
use crate::services::yahoo::{BATCH_FETCH_DELAY_MS, TRACKED_SYMBOLS};

/// Cached records older than this are re-fetched on lookup.
const STALE_AFTER_HOURS: i64 = 24;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub sector: Option<String>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

pub async fn list_stocks(query: ListQuery, state: Arc<AppState>) -> Result<Json, Rejection> {
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT);

    let db = match &state.db {
        Some(db) => db,
        None => {
            return Ok(warp::reply::json(&json!({
                "stocks": [],
                "message": "Database not connected. Use the search feature to screen individual stocks.",
                "pagination": Pagination::new(page.max(1), limit, 0),
            })));
        }
    };

    // "all" (or no filter) passes every sector; an unknown sector name
    // matches nothing rather than everything.
    let sector = match query.sector.as_deref() {
        None | Some("all") => None,
        Some(s) => match Sector::parse(s) {
            Some(sector) => Some(sector),
            None => {
                return Ok(warp::reply::json(&json!({
                    "stocks": [],
                    "pagination": Pagination::new(page.max(1), limit, 0),
                })));
            }
        },
    };

    let stocks = db.get_compliant_stocks().await.map_err(|e| {
        error!("Database error listing stocks: {}", e);
        warp::reject::custom(ApiError::database_error(e.to_string()))
    })?;

    let key = SortKey::parse(query.sort_by.as_deref());
    let (page_items, pagination) = ranking::rank(stocks, sector, key, page, limit);

    Ok(warp::reply::json(&json!({
        "stocks": page_items,
        "pagination": pagination,
    })))
}

pub async fn get_stock(symbol: String, state: Arc<AppState>) -> Result<Json, Rejection> {
    let symbol = symbol.to_uppercase();
    info!("Fetching stock data for {}", symbol);

    if let Some(db) = &state.db {
        match db.get_stock(&symbol).await {
            Ok(Some(stock)) => {
                if stock.last_updated > Utc::now() - Duration::hours(STALE_AFTER_HOURS) {
                    info!("Using cached data for {}", symbol);
                    return Ok(warp::reply::json(&stock));
                }
                info!("Data for {} is stale, re-fetching", symbol);
            }
            Ok(None) => {}
            Err(e) => {
                // Degraded mode: the screen still runs without the cache.
                warn!("Database unavailable for {}, continuing without cache: {}", symbol, e);
            }
        }
    }

    let stock = fetch_and_screen(&symbol, &state).await?;
    Ok(warp::reply::json(&stock))
}

pub async fn refresh_stock(symbol: String, state: Arc<AppState>) -> Result<Json, Rejection> {
    let symbol = symbol.to_uppercase();
    info!("Manual refresh requested for {}", symbol);

    let stock = fetch_and_screen(&symbol, &state).await?;
    Ok(warp::reply::json(&json!({
        "message": "Stock refreshed successfully",
        "stock": stock,
    })))
}

/// Rate-limited batch refresh of the fixed tracked universe. Failed symbols
/// are skipped; the response reports how many records were updated.
pub async fn refresh_tracked(state: Arc<AppState>) -> Result<Json, Rejection> {
    info!("Starting batch refresh of {} tracked symbols", TRACKED_SYMBOLS.len());

    let results = state
        .yahoo
        .get_multiple_stocks(
            TRACKED_SYMBOLS,
            &state.blacklist,
            TokioDuration::from_millis(BATCH_FETCH_DELAY_MS),
        )
        .await;

    let mut saved = 0usize;
    if let Some(db) = &state.db {
        for stock in &results {
            match db.upsert_stock(stock).await {
                Ok(()) => saved += 1,
                Err(e) => error!("Failed to save {}: {}", stock.metrics.symbol, e),
            }
        }
    }

    Ok(warp::reply::json(&json!({
        "message": "Tracked symbols refreshed",
        "screened": results.len(),
        "saved": saved,
    })))
}

pub async fn search_stocks(query: String, state: Arc<AppState>) -> Result<Json, Rejection> {
    let db = match &state.db {
        Some(db) => db,
        None => return Ok(warp::reply::json(&Vec::<ScreenedStock>::new())),
    };

    let stocks = db.search_stocks(&query, 10).await.map_err(|e| {
        error!("Database error searching stocks: {}", e);
        warp::reject::custom(ApiError::database_error(e.to_string()))
    })?;

    Ok(warp::reply::json(&stocks))
}

/// On-demand normalize + evaluate, with a best-effort upsert. An unknown or
/// unreachable symbol surfaces as a not-found condition, never a generic
/// fault.
async fn fetch_and_screen(symbol: &str, state: &AppState) -> Result<ScreenedStock, Rejection> {
    let metrics = match state.yahoo.get_stock_data(symbol).await {
        Ok(Some(metrics)) => metrics,
        Ok(None) => {
            return Err(warp::reject::custom(ApiError::not_found(format!(
                "Unable to fetch data for \"{}\". Please verify it's a valid ticker.",
                symbol
            ))));
        }
        Err(e) => {
            error!("Error fetching data for {}: {}", symbol, e);
            return Err(warp::reject::custom(ApiError::not_found(format!(
                "Unable to fetch data for \"{}\". Please verify it's a valid ticker.",
                symbol
            ))));
        }
    };

    let stock = screening::screen_stock(&metrics, &state.blacklist);

    if let Some(db) = &state.db {
        if let Err(e) = db.upsert_stock(&stock).await {
            error!("Failed to save {}: {}", symbol, e);
        } else {
            info!("Saved {} to database", symbol);
        }
    }

    Ok(stock)
}
