// src/models.rs
use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};

/// Broad sector buckets used by the dashboard filters. Yahoo's finer-grained
/// sector names are folded into these by `services::screening::map_sector`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sector {
    Technology,
    Healthcare,
    Consumer,
    Industrial,
    Energy,
    Other,
}

impl Sector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sector::Technology => "technology",
            Sector::Healthcare => "healthcare",
            Sector::Consumer => "consumer",
            Sector::Industrial => "industrial",
            Sector::Energy => "energy",
            Sector::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Sector> {
        match s {
            "technology" => Some(Sector::Technology),
            "healthcare" => Some(Sector::Healthcare),
            "consumer" => Some(Sector::Consumer),
            "industrial" => Some(Sector::Industrial),
            "energy" => Some(Sector::Energy),
            "other" => Some(Sector::Other),
            _ => None,
        }
    }
}

/// Normalized per-stock metrics, the input shape for compliance screening.
/// All four ratios are fractions (not percentages) and are clamped to be
/// non-negative by the normalizer; missing source data defaults to 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMetrics {
    pub symbol: String,
    pub company: String,
    pub sector: Sector,
    pub price: f64,
    /// Percent change on the day (already scaled to percent, not a fraction).
    pub change: f64,
    /// Raw market capitalization, used for the numeric `market-cap` sort.
    pub market_cap: f64,
    /// Display form, e.g. "2874.3B" or "N/A".
    pub market_cap_display: String,
    pub volume: f64,
    pub volume_display: String,
    pub debt_ratio: f64,
    pub liquid_assets_ratio: f64,
    pub receivables_ratio: f64,
    pub interest_income: f64,
    pub prohibited_activities: bool,
}

/// A stock after compliance screening. This is the record persisted per
/// symbol (fully replaced on refresh) and returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenedStock {
    #[serde(flatten)]
    pub metrics: StockMetrics,
    /// True iff `issues` is empty.
    pub is_compliant: bool,
    /// Violation strings in check order: blacklist, debt, liquidity,
    /// receivables, interest income, prohibited activities.
    pub issues: Vec<String>,
    /// 100 minus 15 per issue, clamped to 0..=100.
    pub compliance_score: u8,
    pub methodology: String,
    /// Only meaningful when compliant: a sliver of income is attributable to
    /// interest and must be donated ("purified").
    pub purification_required: bool,
    pub purification_percentage: f64,
    pub last_updated: DateTime<Utc>,
}

/// Which exclusion list an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlacklistType {
    #[serde(rename = "BDS")]
    Bds,
    #[serde(rename = "ETHICAL")]
    Ethical,
}

impl BlacklistType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlacklistType::Bds => "BDS",
            BlacklistType::Ethical => "ETHICAL",
        }
    }

    /// Case-insensitive, so the admin API accepts "bds" as well as "BDS".
    pub fn parse(s: &str) -> Option<BlacklistType> {
        match s.to_uppercase().as_str() {
            "BDS" => Some(BlacklistType::Bds),
            "ETHICAL" => Some(BlacklistType::Ethical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlacklistCategory {
    Tech,
    Defense,
    Consumer,
    Travel,
    Energy,
    Pharma,
    Machinery,
    Media,
    Other,
}

impl BlacklistCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlacklistCategory::Tech => "tech",
            BlacklistCategory::Defense => "defense",
            BlacklistCategory::Consumer => "consumer",
            BlacklistCategory::Travel => "travel",
            BlacklistCategory::Energy => "energy",
            BlacklistCategory::Pharma => "pharma",
            BlacklistCategory::Machinery => "machinery",
            BlacklistCategory::Media => "media",
            BlacklistCategory::Other => "other",
        }
    }

    /// Unknown categories fall back to `Other` rather than erroring.
    pub fn parse_or_other(s: &str) -> BlacklistCategory {
        match s.to_lowercase().as_str() {
            "tech" => BlacklistCategory::Tech,
            "defense" => BlacklistCategory::Defense,
            "consumer" => BlacklistCategory::Consumer,
            "travel" => BlacklistCategory::Travel,
            "energy" => BlacklistCategory::Energy,
            "pharma" => BlacklistCategory::Pharma,
            "machinery" => BlacklistCategory::Machinery,
            "media" => BlacklistCategory::Media,
            _ => BlacklistCategory::Other,
        }
    }
}

/// A durable blacklist row. (type, symbol) is unique; entries are never
/// hard-deleted, removal flips `active` to false.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlacklistEntry {
    #[serde(rename = "type")]
    pub entry_type: BlacklistType,
    pub symbol: String,
    pub company: String,
    pub reason: String,
    pub category: BlacklistCategory,
    pub source: String,
    pub date_added: DateTime<Utc>,
    pub last_verified: DateTime<Utc>,
    pub active: bool,
}

/// Pagination metadata echoed alongside list responses.
#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: usize,
    pub pages: usize,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: usize) -> Self {
        let pages = if limit == 0 {
            0
        } else {
            (total + limit as usize - 1) / limit as usize
        };
        Pagination { page, limit, total, pages }
    }
}
