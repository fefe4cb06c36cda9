// src/services/db.rs
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{
    BlacklistCategory, BlacklistEntry, BlacklistType, ScreenedStock, Sector, StockMetrics,
};
use crate::BoxError;

/// Counters for the stats endpoint. "Ethically screened" means the record
/// carries no blacklist issue, compliant or not.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningStats {
    pub stocks_analyzed: i64,
    pub shariah_compliant: i64,
    pub non_compliant: i64,
    pub ethically_screened: i64,
}

/// One row of the per-sector breakdown on the stats endpoint.
#[derive(Debug, Serialize)]
pub struct SectorCount {
    pub sector: String,
    pub count: i64,
}

/// Leaderboard row for the stats endpoint, score descending.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopCompliantStock {
    pub symbol: String,
    pub company: String,
    pub compliance_score: i32,
    pub sector: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentlyAnalyzedStock {
    pub symbol: String,
    pub company: String,
    pub is_compliant: bool,
    pub last_updated: DateTime<Utc>,
}

pub struct DbStore {
    pub(crate) pool: PgPool,
}

impl DbStore {
    pub async fn new(database_url: &str) -> Result<Self, BoxError> {
        let pool = PgPool::connect(database_url).await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Idempotent schema bootstrap so a fresh database works without a
    /// separate migration step.
    async fn ensure_schema(&self) -> Result<(), BoxError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS stocks (
                symbol TEXT PRIMARY KEY,
                company TEXT NOT NULL,
                sector TEXT NOT NULL DEFAULT 'other',
                price DOUBLE PRECISION NOT NULL DEFAULT 0,
                change DOUBLE PRECISION NOT NULL DEFAULT 0,
                market_cap DOUBLE PRECISION NOT NULL DEFAULT 0,
                market_cap_display TEXT NOT NULL DEFAULT 'N/A',
                volume DOUBLE PRECISION NOT NULL DEFAULT 0,
                volume_display TEXT NOT NULL DEFAULT 'N/A',
                debt_ratio DOUBLE PRECISION NOT NULL DEFAULT 0,
                liquid_assets_ratio DOUBLE PRECISION NOT NULL DEFAULT 0,
                receivables_ratio DOUBLE PRECISION NOT NULL DEFAULT 0,
                interest_income DOUBLE PRECISION NOT NULL DEFAULT 0,
                prohibited_activities BOOLEAN NOT NULL DEFAULT FALSE,
                is_compliant BOOLEAN NOT NULL DEFAULT FALSE,
                compliance_score INTEGER NOT NULL DEFAULT 0,
                issues TEXT[] NOT NULL DEFAULT '{}',
                methodology TEXT NOT NULL DEFAULT '',
                purification_required BOOLEAN NOT NULL DEFAULT FALSE,
                purification_percentage DOUBLE PRECISION NOT NULL DEFAULT 0,
                last_updated TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_stocks_compliant_score
             ON stocks (is_compliant, compliance_score DESC)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS blacklist (
                type TEXT NOT NULL,
                symbol TEXT NOT NULL,
                company TEXT NOT NULL DEFAULT '',
                reason TEXT NOT NULL,
                category TEXT NOT NULL DEFAULT 'other',
                source TEXT NOT NULL DEFAULT 'BDS Movement',
                date_added TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                last_verified TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                active BOOLEAN NOT NULL DEFAULT TRUE,
                PRIMARY KEY (type, symbol)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_blacklist_active ON blacklist (active)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Replace the stored snapshot for a symbol wholesale.
    pub async fn upsert_stock(&self, stock: &ScreenedStock) -> Result<(), BoxError> {
        let m = &stock.metrics;
        sqlx::query(
            r#"
            INSERT INTO stocks (
                symbol, company, sector, price, change,
                market_cap, market_cap_display, volume, volume_display,
                debt_ratio, liquid_assets_ratio, receivables_ratio, interest_income,
                prohibited_activities, is_compliant, compliance_score, issues,
                methodology, purification_required, purification_percentage, last_updated
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17, $18, $19, $20, $21)
            ON CONFLICT (symbol) DO UPDATE SET
                company = EXCLUDED.company,
                sector = EXCLUDED.sector,
                price = EXCLUDED.price,
                change = EXCLUDED.change,
                market_cap = EXCLUDED.market_cap,
                market_cap_display = EXCLUDED.market_cap_display,
                volume = EXCLUDED.volume,
                volume_display = EXCLUDED.volume_display,
                debt_ratio = EXCLUDED.debt_ratio,
                liquid_assets_ratio = EXCLUDED.liquid_assets_ratio,
                receivables_ratio = EXCLUDED.receivables_ratio,
                interest_income = EXCLUDED.interest_income,
                prohibited_activities = EXCLUDED.prohibited_activities,
                is_compliant = EXCLUDED.is_compliant,
                compliance_score = EXCLUDED.compliance_score,
                issues = EXCLUDED.issues,
                methodology = EXCLUDED.methodology,
                purification_required = EXCLUDED.purification_required,
                purification_percentage = EXCLUDED.purification_percentage,
                last_updated = EXCLUDED.last_updated
            "#,
        )
        .bind(m.symbol.to_uppercase())
        .bind(&m.company)
        .bind(m.sector.as_str())
        .bind(m.price)
        .bind(m.change)
        .bind(m.market_cap)
        .bind(&m.market_cap_display)
        .bind(m.volume)
        .bind(&m.volume_display)
        .bind(m.debt_ratio)
        .bind(m.liquid_assets_ratio)
        .bind(m.receivables_ratio)
        .bind(m.interest_income)
        .bind(m.prohibited_activities)
        .bind(stock.is_compliant)
        .bind(stock.compliance_score as i32)
        .bind(&stock.issues)
        .bind(&stock.methodology)
        .bind(stock.purification_required)
        .bind(stock.purification_percentage)
        .bind(stock.last_updated)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_stock(&self, symbol: &str) -> Result<Option<ScreenedStock>, BoxError> {
        let row = sqlx::query("SELECT * FROM stocks WHERE symbol = $1")
            .bind(symbol.to_uppercase())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_stock(&r)).transpose()
    }

    pub async fn get_compliant_stocks(&self) -> Result<Vec<ScreenedStock>, BoxError> {
        let rows = sqlx::query("SELECT * FROM stocks WHERE is_compliant = TRUE")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_stock).collect()
    }

    /// Case-insensitive substring search over symbol and company.
    pub async fn search_stocks(&self, query: &str, limit: i64) -> Result<Vec<ScreenedStock>, BoxError> {
        let pattern = format!("%{}%", query);
        let rows = sqlx::query(
            "SELECT * FROM stocks WHERE symbol ILIKE $1 OR company ILIKE $1
             ORDER BY symbol LIMIT $2",
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_stock).collect()
    }

    pub async fn screening_stats(&self) -> Result<ScreeningStats, BoxError> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS analyzed,
                COUNT(*) FILTER (WHERE is_compliant) AS compliant,
                COUNT(*) FILTER (WHERE NOT is_compliant) AS non_compliant,
                COUNT(*) FILTER (WHERE NOT EXISTS (
                    SELECT 1 FROM unnest(issues) AS issue WHERE issue ILIKE '%blacklist%'
                )) AS ethically_screened
            FROM stocks
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(ScreeningStats {
            stocks_analyzed: row.try_get("analyzed")?,
            shariah_compliant: row.try_get("compliant")?,
            non_compliant: row.try_get("non_compliant")?,
            ethically_screened: row.try_get("ethically_screened")?,
        })
    }

    /// Per-sector record counts, largest sector first.
    pub async fn sector_counts(&self) -> Result<Vec<SectorCount>, BoxError> {
        let rows = sqlx::query(
            "SELECT sector, COUNT(*) AS count FROM stocks
             GROUP BY sector ORDER BY count DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(SectorCount {
                    sector: row.try_get("sector")?,
                    count: row.try_get("count")?,
                })
            })
            .collect()
    }

    pub async fn top_compliant(&self, limit: i64) -> Result<Vec<TopCompliantStock>, BoxError> {
        let rows = sqlx::query(
            "SELECT symbol, company, compliance_score, sector FROM stocks
             WHERE is_compliant = TRUE
             ORDER BY compliance_score DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(TopCompliantStock {
                    symbol: row.try_get("symbol")?,
                    company: row.try_get("company")?,
                    compliance_score: row.try_get("compliance_score")?,
                    sector: row.try_get("sector")?,
                })
            })
            .collect()
    }

    pub async fn recently_analyzed(&self, limit: i64) -> Result<Vec<RecentlyAnalyzedStock>, BoxError> {
        let rows = sqlx::query(
            "SELECT symbol, company, is_compliant, last_updated FROM stocks
             ORDER BY last_updated DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(RecentlyAnalyzedStock {
                    symbol: row.try_get("symbol")?,
                    company: row.try_get("company")?,
                    is_compliant: row.try_get("is_compliant")?,
                    last_updated: row.try_get("last_updated")?,
                })
            })
            .collect()
    }

    /// Upsert keyed by (type, symbol); re-adding a deactivated entry
    /// reactivates it and refreshes its verification timestamp.
    pub async fn upsert_blacklist_entry(&self, entry: &BlacklistEntry) -> Result<(), BoxError> {
        sqlx::query(
            r#"
            INSERT INTO blacklist (type, symbol, company, reason, category, source,
                                   date_added, last_verified, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE)
            ON CONFLICT (type, symbol) DO UPDATE SET
                company = EXCLUDED.company,
                reason = EXCLUDED.reason,
                category = EXCLUDED.category,
                source = EXCLUDED.source,
                last_verified = EXCLUDED.last_verified,
                active = TRUE
            "#,
        )
        .bind(entry.entry_type.as_str())
        .bind(entry.symbol.to_uppercase())
        .bind(&entry.company)
        .bind(&entry.reason)
        .bind(entry.category.as_str())
        .bind(&entry.source)
        .bind(entry.date_added)
        .bind(entry.last_verified)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_active_blacklist(&self) -> Result<Vec<BlacklistEntry>, BoxError> {
        let rows = sqlx::query("SELECT * FROM blacklist WHERE active = TRUE")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_blacklist_entry).collect()
    }

    pub async fn get_blacklist_entries(
        &self,
        entry_type: Option<BlacklistType>,
        active: Option<bool>,
    ) -> Result<Vec<BlacklistEntry>, BoxError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM blacklist
            WHERE ($1::TEXT IS NULL OR type = $1)
              AND ($2::BOOLEAN IS NULL OR active = $2)
            ORDER BY type, symbol
            "#,
        )
        .bind(entry_type.map(|t| t.as_str()))
        .bind(active)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_blacklist_entry).collect()
    }

    /// Soft delete: flips `active` off for every matching entry, optionally
    /// restricted to one list. Returns the number of entries deactivated.
    pub async fn deactivate_blacklist_entries(
        &self,
        symbol: &str,
        entry_type: Option<BlacklistType>,
    ) -> Result<u64, BoxError> {
        let result = sqlx::query(
            "UPDATE blacklist SET active = FALSE
             WHERE symbol = $1 AND ($2::TEXT IS NULL OR type = $2)",
        )
        .bind(symbol.to_uppercase())
        .bind(entry_type.map(|t| t.as_str()))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

fn row_to_stock(row: &PgRow) -> Result<ScreenedStock, BoxError> {
    let sector: String = row.try_get("sector")?;
    let score: i32 = row.try_get("compliance_score")?;

    Ok(ScreenedStock {
        metrics: StockMetrics {
            symbol: row.try_get("symbol")?,
            company: row.try_get("company")?,
            sector: Sector::parse(&sector).unwrap_or(Sector::Other),
            price: row.try_get("price")?,
            change: row.try_get("change")?,
            market_cap: row.try_get("market_cap")?,
            market_cap_display: row.try_get("market_cap_display")?,
            volume: row.try_get("volume")?,
            volume_display: row.try_get("volume_display")?,
            debt_ratio: row.try_get("debt_ratio")?,
            liquid_assets_ratio: row.try_get("liquid_assets_ratio")?,
            receivables_ratio: row.try_get("receivables_ratio")?,
            interest_income: row.try_get("interest_income")?,
            prohibited_activities: row.try_get("prohibited_activities")?,
        },
        is_compliant: row.try_get("is_compliant")?,
        issues: row.try_get("issues")?,
        compliance_score: score.clamp(0, 100) as u8,
        methodology: row.try_get("methodology")?,
        purification_required: row.try_get("purification_required")?,
        purification_percentage: row.try_get("purification_percentage")?,
        last_updated: row.try_get::<DateTime<Utc>, _>("last_updated")?,
    })
}


fn row_to_blacklist_entry(row: &PgRow) -> Result<BlacklistEntry, BoxError> {
    let entry_type: String = row.try_get("type")?;
    let category: String = row.try_get("category")?;

    Ok(BlacklistEntry {
        entry_type: BlacklistType::parse(&entry_type)
            .ok_or_else(|| format!("unknown blacklist type: {}", entry_type))?,
        symbol: row.try_get("symbol")?,
        company: row.try_get("company")?,
        reason: row.try_get("reason")?,
        category: BlacklistCategory::parse_or_other(&category),
        source: row.try_get("source")?,
        date_added: row.try_get("date_added")?,
        last_verified: row.try_get("last_verified")?,
        active: row.try_get("active")?,
    })
}
