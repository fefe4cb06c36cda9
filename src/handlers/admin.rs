// src/handlers/admin.rs
//
// Blacklist administration: list/add/deactivate entries and force cache
// rebuilds. Listing and mutation need the durable store; cache rebuilds
// work in store-less mode too.

use warp::reply::Json;
use warp::Rejection;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use chrono::Utc;
use log::{error, info};

use crate::handlers::error::ApiError;
use crate::models::{BlacklistCategory, BlacklistEntry, BlacklistType};
use crate::routes::AppState;
use crate::services::db::DbStore;

#[derive(Debug, Deserialize)]
pub struct BlacklistQuery {
    #[serde(rename = "type")]
    pub entry_type: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AddBlacklistRequest {
    #[serde(rename = "type")]
    pub entry_type: String,
    pub symbol: String,
    pub reason: String,
    pub company: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveBlacklistQuery {
    #[serde(rename = "type")]
    pub entry_type: Option<String>,
}

fn require_db(state: &AppState) -> Result<&DbStore, Rejection> {
    state.db.as_ref().ok_or_else(|| {
        warp::reject::custom(ApiError::database_error("Database not connected"))
    })
}

fn parse_type(s: &str) -> Result<BlacklistType, Rejection> {
    BlacklistType::parse(s).ok_or_else(|| {
        warp::reject::custom(ApiError::bad_request(format!(
            "Unknown blacklist type \"{}\" (expected BDS or ETHICAL)",
            s
        )))
    })
}

pub async fn list_blacklist(query: BlacklistQuery, state: Arc<AppState>) -> Result<Json, Rejection> {
    let db = require_db(&state)?;

    let entry_type = match query.entry_type.as_deref() {
        Some(s) => Some(parse_type(s)?),
        None => None,
    };

    let entries = db
        .get_blacklist_entries(entry_type, query.active)
        .await
        .map_err(|e| {
            error!("Database error listing blacklist: {}", e);
            warp::reject::custom(ApiError::database_error(e.to_string()))
        })?;

    Ok(warp::reply::json(&json!({
        "total": entries.len(),
        "blacklists": entries,
    })))
}

pub async fn add_blacklist(
    body: AddBlacklistRequest,
    state: Arc<AppState>,
) -> Result<Json, Rejection> {
    if body.entry_type.trim().is_empty() || body.symbol.trim().is_empty() || body.reason.trim().is_empty() {
        return Err(warp::reject::custom(ApiError::bad_request(
            "Type, symbol, and reason are required",
        )));
    }

    let db = require_db(&state)?;
    let entry_type = parse_type(&body.entry_type)?;

    let now = Utc::now();
    let entry = BlacklistEntry {
        entry_type,
        symbol: body.symbol.to_uppercase(),
        company: body.company.unwrap_or_default(),
        reason: body.reason,
        category: body
            .category
            .as_deref()
            .map(BlacklistCategory::parse_or_other)
            .unwrap_or(BlacklistCategory::Other),
        source: match entry_type {
            BlacklistType::Bds => "BDS Movement".to_string(),
            BlacklistType::Ethical => "Islamic Finance Standards".to_string(),
        },
        date_added: now,
        last_verified: now,
        active: true,
    };

    db.upsert_blacklist_entry(&entry).await.map_err(|e| {
        error!("Database error adding blacklist entry: {}", e);
        warp::reject::custom(ApiError::database_error(e.to_string()))
    })?;

    state.blacklist.refresh(state.db.as_ref()).await;
    info!("Added {} to {} blacklist", entry.symbol, entry.entry_type.as_str());

    Ok(warp::reply::json(&json!({
        "success": true,
        "message": "Company added to blacklist",
        "blacklist": entry,
    })))
}

pub async fn remove_blacklist(
    symbol: String,
    query: RemoveBlacklistQuery,
    state: Arc<AppState>,
) -> Result<Json, Rejection> {
    let db = require_db(&state)?;

    let entry_type = match query.entry_type.as_deref() {
        Some(s) => Some(parse_type(s)?),
        None => None,
    };

    let symbol = symbol.to_uppercase();
    let deactivated = db
        .deactivate_blacklist_entries(&symbol, entry_type)
        .await
        .map_err(|e| {
            error!("Database error deactivating blacklist entries: {}", e);
            warp::reject::custom(ApiError::database_error(e.to_string()))
        })?;

    state.blacklist.refresh(state.db.as_ref()).await;

    Ok(warp::reply::json(&json!({
        "success": true,
        "message": format!("Deactivated {} entries for {}", deactivated, symbol),
    })))
}

pub async fn refresh_blacklist(state: Arc<AppState>) -> Result<Json, Rejection> {
    state.blacklist.refresh(state.db.as_ref()).await;
    let (bds, ethical) = state.blacklist.counts();

    Ok(warp::reply::json(&json!({
        "success": true,
        "message": "Blacklist cache refreshed",
        "stats": {
            "BDS": bds,
            "ETHICAL": ethical,
            "lastUpdated": state.blacklist.last_updated(),
        },
    })))
}

pub async fn initialize_blacklist(state: Arc<AppState>) -> Result<Json, Rejection> {
    state.blacklist.initialize(state.db.as_ref()).await;
    let (bds, ethical) = state.blacklist.counts();

    Ok(warp::reply::json(&json!({
        "success": true,
        "message": "Blacklist initialized from seed list",
        "stats": {
            "BDS": bds,
            "ETHICAL": ethical,
        },
    })))
}
