// src/handlers/stats.rs
use warp::reply::Json;
use warp::Rejection;
use serde_json::json;
use std::sync::Arc;
use chrono::Utc;
use log::error;

use crate::handlers::error::ApiError;
use crate::routes::AppState;

const LEADERBOARD_LIMIT: i64 = 10;

pub async fn get_stats(state: Arc<AppState>) -> Result<Json, Rejection> {
    let db = match &state.db {
        Some(db) => db,
        None => {
            return Ok(warp::reply::json(&json!({
                "stocksAnalyzed": 0,
                "shariahCompliant": 0,
                "ethicallyScreened": 0,
                "message": "Database not connected - stats unavailable",
            })));
        }
    };

    let db_error = |e: crate::BoxError| {
        error!("Database error computing stats: {}", e);
        warp::reject::custom(ApiError::database_error(e.to_string()))
    };

    let stats = db.screening_stats().await.map_err(db_error)?;
    let by_sector = db.sector_counts().await.map_err(db_error)?;
    let top_compliant = db.top_compliant(LEADERBOARD_LIMIT).await.map_err(db_error)?;
    let recently_analyzed = db.recently_analyzed(LEADERBOARD_LIMIT).await.map_err(db_error)?;

    let compliance_rate = if stats.stocks_analyzed > 0 {
        format!(
            "{:.1}",
            stats.shariah_compliant as f64 / stats.stocks_analyzed as f64 * 100.0
        )
    } else {
        "0".to_string()
    };

    Ok(warp::reply::json(&json!({
        "stocksAnalyzed": stats.stocks_analyzed,
        "shariahCompliant": stats.shariah_compliant,
        "nonCompliant": stats.non_compliant,
        "ethicallyScreened": stats.ethically_screened,
        "complianceRate": compliance_rate,
        "bySector": by_sector,
        "topCompliant": top_compliant,
        "recentlyAnalyzed": recently_analyzed,
        "lastUpdated": Utc::now(),
    })))
}
