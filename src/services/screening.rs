// src/services/screening.rs
//
// Shariah/ethical compliance screening: normalizes raw Yahoo quote-summary
// data into the four-ratio metrics shape, then evaluates the fixed rule set
// against it. Both halves are pure so they can be tested without a network
// or database in sight.

use chrono::Utc;

use crate::models::{ScreenedStock, Sector, StockMetrics};
use crate::services::blacklist::BlacklistCache;
use crate::services::yahoo::QuoteSummary;

/// Interest-bearing debt must stay at or below a third of market cap.
pub const DEBT_RATIO_LIMIT: f64 = 0.33;
/// Likewise for cash and other interest-earning liquid assets.
pub const LIQUID_ASSETS_LIMIT: f64 = 0.33;
pub const RECEIVABLES_LIMIT: f64 = 0.49;
/// Non-permissible income capped at 5% of revenue.
pub const INTEREST_INCOME_LIMIT: f64 = 0.05;

const POINTS_PER_ISSUE: u32 = 15;
pub const METHODOLOGY: &str = "AAOIFI Shariah Standard 21";

/// Broad-market and bond instruments that structurally hold banks, insurers
/// or interest-bearing paper, regardless of what their profile text says.
const NON_COMPLIANT_FUNDS: &[&str] = &[
    "SPY", "VOO", "IVV",
    "VTI", "ITOT", "SCHB",
    "DIA",
    "QQQ", "ONEQ",
    "IWM", "IWB", "IWF", "IWD",
    "VEA", "VWO", "EFA", "IEFA", "ACWI",
    "XLF", "VFH", "KBE", "IAI",
    "AGG", "BND", "LQD", "HYG", "TLT", "SHY", "IEF",
];

const PROHIBITED_INDUSTRY_KEYWORDS: &[&str] = &[
    "alcohol", "tobacco", "gambling", "casino", "gaming",
    "bank", "insurance", "financial services", "adult", "defense",
    "brewery", "distillery", "wine", "beer", "liquor",
];

const PROHIBITED_DESCRIPTION_KEYWORDS: &[&str] = &[
    "alcohol", "alcoholic beverages", "wine", "beer", "liquor",
    "pork", "pork products", "ham", "bacon",
    "gambling", "casino", "lottery",
    "tobacco", "cigarette", "cigar",
];

/// Retailers, wholesalers and processors known to derive material revenue
/// from alcohol or pork even though their sector text looks clean.
const HARAM_PRODUCT_RETAILERS: &[&str] = &[
    "COST", "WMT", "TGT", "KR", "ACI", "SYY", "UNFI", "GO", "INGR",
    "BJ", "VLGEA", "WMK", "SFM", "IMKTA", "TSN", "HRL", "PPC",
];

/// Fold Yahoo's sector names into the dashboard's six buckets.
pub fn map_sector(sector: Option<&str>) -> Sector {
    let sector = match sector {
        Some(s) => s.to_lowercase(),
        None => return Sector::Other,
    };

    if sector.contains("technology") || sector.contains("communication") {
        Sector::Technology
    } else if sector.contains("healthcare") {
        Sector::Healthcare
    } else if sector.contains("consumer") || sector.contains("cyclical") || sector.contains("defensive") {
        Sector::Consumer
    } else if sector.contains("industrial") || sector.contains("basic materials") {
        Sector::Industrial
    } else if sector.contains("energy") || sector.contains("utilities") {
        Sector::Energy
    } else {
        Sector::Other
    }
}

pub fn format_market_cap(value: f64) -> String {
    if value <= 0.0 {
        "N/A".to_string()
    } else {
        format!("{:.1}B", value / 1_000_000_000.0)
    }
}

pub fn format_volume(value: f64) -> String {
    if value <= 0.0 {
        "N/A".to_string()
    } else {
        format!("{:.1}M", value / 1_000_000.0)
    }
}

fn clamp_ratio(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 { value } else { 0.0 }
}

/// True if the instrument cannot be compliant by construction (index/bond
/// funds), its industry or business description mentions a prohibited line
/// of business, or it is a known haram-product retailer.
pub fn check_prohibited_activities(summary: &QuoteSummary, symbol: &str) -> bool {
    if NON_COMPLIANT_FUNDS.contains(&symbol) {
        return true;
    }

    let profile = summary.asset_profile.as_ref();
    let industry = profile
        .map(|p| {
            format!(
                "{} {}",
                p.industry.as_deref().unwrap_or(""),
                p.sector.as_deref().unwrap_or("")
            )
            .to_lowercase()
        })
        .unwrap_or_default();

    if PROHIBITED_INDUSTRY_KEYWORDS.iter().any(|kw| industry.contains(kw)) {
        return true;
    }

    let description = profile
        .and_then(|p| p.long_business_summary.as_deref())
        .unwrap_or("")
        .to_lowercase();

    if PROHIBITED_DESCRIPTION_KEYWORDS.iter().any(|kw| description.contains(kw)) {
        return true;
    }

    HARAM_PRODUCT_RETAILERS.contains(&symbol)
}

/// Build the normalized metrics record from a raw quote summary.
///
/// `exchange_rate` converts currency-denominated figures (debt, cash) into
/// the quote currency when the financials are reported in another one; the
/// caller passes 1.0 when no conversion applies or no rate was obtainable.
/// Missing sub-fields degrade to documented defaults, never an error.
pub fn normalize(symbol: &str, summary: &QuoteSummary, exchange_rate: f64) -> StockMetrics {
    let symbol = symbol.to_uppercase();
    let price = summary.price.as_ref();
    let financials = summary.financial_data.as_ref();
    let key_stats = summary.default_key_statistics.as_ref();
    let detail = summary.summary_detail.as_ref();

    let market_cap = price.and_then(|p| p.market_cap()).unwrap_or(0.0);

    // The debt denominator falls back from market cap to enterprise value
    // to 1; the liquid-assets denominator skips the EV step and goes
    // straight to 1. Neither can be zero.
    let debt_denominator = if market_cap > 0.0 {
        market_cap
    } else {
        key_stats
            .and_then(|k| k.enterprise_value())
            .filter(|v| *v > 0.0)
            .unwrap_or(1.0)
    };
    let cash_denominator = if market_cap > 0.0 { market_cap } else { 1.0 };

    let total_debt = financials.and_then(|f| f.total_debt()).unwrap_or(0.0);
    let total_cash = financials.and_then(|f| f.total_cash()).unwrap_or(0.0);

    let volume = detail.and_then(|d| d.volume()).unwrap_or(0.0);

    StockMetrics {
        company: price
            .and_then(|p| p.long_name.clone())
            .unwrap_or_else(|| symbol.clone()),
        sector: map_sector(
            summary
                .asset_profile
                .as_ref()
                .and_then(|p| p.sector.as_deref()),
        ),
        price: price.and_then(|p| p.regular_market_price()).unwrap_or(0.0),
        // Yahoo reports the change as a decimal fraction.
        change: price
            .and_then(|p| p.regular_market_change_percent())
            .map(|c| c * 100.0)
            .unwrap_or(0.0),
        market_cap,
        market_cap_display: format_market_cap(market_cap),
        volume,
        volume_display: format_volume(volume),
        debt_ratio: clamp_ratio(total_debt * exchange_rate / debt_denominator),
        liquid_assets_ratio: clamp_ratio(total_cash * exchange_rate / cash_denominator),
        // The summary endpoint exposes no reliable receivables figure.
        receivables_ratio: 0.0,
        // No interest-income breakdown either; 1% is a conservative estimate.
        interest_income: 0.01,
        prohibited_activities: check_prohibited_activities(summary, &symbol),
        symbol,
    }
}

/// Evaluate the fixed rule set against a normalized metrics record.
///
/// Deterministic and side-effect-free: each check appends at most one issue,
/// in a fixed order, with strict greater-than threshold semantics. The score
/// is 100 minus 15 per issue, clamped to 0..=100.
pub fn screen_stock(metrics: &StockMetrics, blacklist: &BlacklistCache) -> ScreenedStock {
    let mut issues = Vec::new();

    if blacklist.is_blacklisted(&metrics.symbol, None) {
        issues.push("Company on BDS or ethical blacklist".to_string());
    }

    if metrics.debt_ratio > DEBT_RATIO_LIMIT {
        issues.push("Debt ratio exceeds 33%".to_string());
    }

    if metrics.liquid_assets_ratio > LIQUID_ASSETS_LIMIT {
        issues.push("Liquid assets ratio exceeds 33%".to_string());
    }

    if metrics.receivables_ratio > RECEIVABLES_LIMIT {
        issues.push("Receivables ratio exceeds 49%".to_string());
    }

    if metrics.interest_income > INTEREST_INCOME_LIMIT {
        issues.push("Interest income exceeds 5%".to_string());
    }

    if metrics.prohibited_activities {
        issues.push("Involved in prohibited activities".to_string());
    }

    let is_compliant = issues.is_empty();
    let score = 100u32.saturating_sub(issues.len() as u32 * POINTS_PER_ISSUE);

    ScreenedStock {
        metrics: metrics.clone(),
        is_compliant,
        compliance_score: score.min(100) as u8,
        issues,
        methodology: METHODOLOGY.to_string(),
        purification_required: is_compliant && metrics.interest_income > 0.0,
        purification_percentage: metrics.interest_income,
        last_updated: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::yahoo::{
        AssetProfile, DefaultKeyStatistics, FinancialData, Price, QuoteSummary, RawValue,
    };

    fn raw(value: f64) -> Option<RawValue> {
        Some(RawValue { raw: Some(value) })
    }

    fn metrics(symbol: &str) -> StockMetrics {
        StockMetrics {
            symbol: symbol.to_string(),
            company: format!("{} Inc.", symbol),
            sector: Sector::Technology,
            price: 100.0,
            change: 1.5,
            market_cap: 200_000_000_000.0,
            market_cap_display: "200.0B".to_string(),
            volume: 38_700_000.0,
            volume_display: "38.7M".to_string(),
            debt_ratio: 0.12,
            liquid_assets_ratio: 0.25,
            receivables_ratio: 0.20,
            interest_income: 0.01,
            prohibited_activities: false,
        }
    }

    #[test]
    fn clean_stock_is_compliant_with_full_score() {
        let cache = BlacklistCache::new();
        let result = screen_stock(&metrics("AMD"), &cache);

        assert!(result.is_compliant);
        assert!(result.issues.is_empty());
        assert_eq!(result.compliance_score, 100);
        assert_eq!(result.methodology, METHODOLOGY);
        assert!(result.purification_required);
        assert_eq!(result.purification_percentage, 0.01);
    }

    #[test]
    fn blacklisted_symbol_loses_fifteen_points() {
        let cache = BlacklistCache::new();
        cache.load_from_seed();
        let result = screen_stock(&metrics("CAT"), &cache);

        assert!(!result.is_compliant);
        assert_eq!(result.issues, vec!["Company on BDS or ethical blacklist"]);
        assert_eq!(result.compliance_score, 85);
        assert!(!result.purification_required);
    }

    #[test]
    fn excessive_debt_is_flagged() {
        let cache = BlacklistCache::new();
        let mut m = metrics("XYZ");
        m.debt_ratio = 0.40;
        let result = screen_stock(&m, &cache);

        assert_eq!(result.issues, vec!["Debt ratio exceeds 33%"]);
        assert_eq!(result.compliance_score, 85);
    }

    #[test]
    fn thresholds_are_strictly_greater_than() {
        let cache = BlacklistCache::new();
        let mut m = metrics("XYZ");
        m.debt_ratio = DEBT_RATIO_LIMIT;
        m.liquid_assets_ratio = LIQUID_ASSETS_LIMIT;
        m.receivables_ratio = RECEIVABLES_LIMIT;
        m.interest_income = INTEREST_INCOME_LIMIT;
        assert!(screen_stock(&m, &cache).is_compliant);

        m.debt_ratio = DEBT_RATIO_LIMIT + 1e-9;
        assert!(!screen_stock(&m, &cache).is_compliant);
    }

    #[test]
    fn every_check_can_fire_at_once() {
        let cache = BlacklistCache::new();
        cache.load_from_seed();
        let mut m = metrics("JPM");
        m.debt_ratio = 0.9;
        m.liquid_assets_ratio = 0.9;
        m.receivables_ratio = 0.9;
        m.interest_income = 0.9;
        m.prohibited_activities = true;
        let result = screen_stock(&m, &cache);

        assert_eq!(result.issues.len(), 6);
        assert_eq!(result.compliance_score, 100 - 6 * 15);
    }

    #[test]
    fn issues_follow_the_fixed_check_order() {
        let cache = BlacklistCache::new();
        cache.load_from_seed();
        let mut m = metrics("JPM");
        m.debt_ratio = 0.5;
        m.interest_income = 0.07;
        m.prohibited_activities = true;
        let result = screen_stock(&m, &cache);

        assert_eq!(
            result.issues,
            vec![
                "Company on BDS or ethical blacklist",
                "Debt ratio exceeds 33%",
                "Interest income exceeds 5%",
                "Involved in prohibited activities",
            ]
        );
        assert_eq!(result.compliance_score, 40);
    }

    #[test]
    fn blacklisting_a_symbol_never_removes_issues() {
        let cache = BlacklistCache::new();
        let m = metrics("SBUX");
        let before = screen_stock(&m, &cache);
        assert!(before.issues.is_empty());

        // SBUX is on the seeded BDS list; the same metrics now pick up
        // exactly one extra issue, appended ahead of the ratio checks.
        cache.load_from_seed();
        let after = screen_stock(&m, &cache);

        assert!(after.issues.len() > before.issues.len());
        assert_eq!(after.issues[0], "Company on BDS or ethical blacklist");
        assert_eq!(after.issues.len(), before.issues.len() + 1);
    }

    #[test]
    fn screening_is_idempotent() {
        let cache = BlacklistCache::new();
        cache.load_from_seed();
        let m = metrics("INTC");
        let first = screen_stock(&m, &cache);
        let second = screen_stock(&m, &cache);

        assert_eq!(first.issues, second.issues);
        assert_eq!(first.is_compliant, second.is_compliant);
        assert_eq!(first.compliance_score, second.compliance_score);
    }

    fn summary_with_profile(sector: &str, industry: &str, description: &str) -> QuoteSummary {
        QuoteSummary {
            asset_profile: Some(AssetProfile {
                sector: Some(sector.to_string()),
                industry: Some(industry.to_string()),
                long_business_summary: Some(description.to_string()),
            }),
            ..QuoteSummary::default()
        }
    }

    #[test]
    fn broad_market_funds_are_prohibited() {
        let summary = QuoteSummary::default();
        assert!(check_prohibited_activities(&summary, "SPY"));
        assert!(check_prohibited_activities(&summary, "AGG"));
        assert!(!check_prohibited_activities(&summary, "AAPL"));
    }

    #[test]
    fn prohibited_industry_keywords_match() {
        let summary = summary_with_profile("Financial Services", "Banks - Diversified", "");
        assert!(check_prohibited_activities(&summary, "XXXX"));

        let summary = summary_with_profile("Technology", "Semiconductors", "Designs and sells CPUs.");
        assert!(!check_prohibited_activities(&summary, "XXXX"));
    }

    #[test]
    fn prohibited_description_keywords_match() {
        let summary = summary_with_profile(
            "Consumer Defensive",
            "Packaged Foods",
            "Produces bacon and other pork products.",
        );
        assert!(check_prohibited_activities(&summary, "XXXX"));
    }

    #[test]
    fn known_haram_retailers_are_prohibited() {
        let summary = QuoteSummary::default();
        assert!(check_prohibited_activities(&summary, "TSN"));
        assert!(check_prohibited_activities(&summary, "COST"));
    }

    #[test]
    fn missing_profile_is_not_prohibited() {
        assert!(!check_prohibited_activities(&QuoteSummary::default(), "AAPL"));
    }

    #[test]
    fn sector_mapping_buckets() {
        assert_eq!(map_sector(Some("Technology")), Sector::Technology);
        assert_eq!(map_sector(Some("Communication Services")), Sector::Technology);
        assert_eq!(map_sector(Some("Healthcare")), Sector::Healthcare);
        assert_eq!(map_sector(Some("Consumer Cyclical")), Sector::Consumer);
        assert_eq!(map_sector(Some("Basic Materials")), Sector::Industrial);
        assert_eq!(map_sector(Some("Utilities")), Sector::Energy);
        assert_eq!(map_sector(Some("Real Estate")), Sector::Other);
        assert_eq!(map_sector(None), Sector::Other);
    }

    #[test]
    fn normalize_defaults_when_groups_are_missing() {
        let m = normalize("amd", &QuoteSummary::default(), 1.0);

        assert_eq!(m.symbol, "AMD");
        assert_eq!(m.company, "AMD");
        assert_eq!(m.sector, Sector::Other);
        assert_eq!(m.price, 0.0);
        assert_eq!(m.debt_ratio, 0.0);
        assert_eq!(m.liquid_assets_ratio, 0.0);
        assert_eq!(m.receivables_ratio, 0.0);
        assert_eq!(m.interest_income, 0.01);
        assert_eq!(m.market_cap_display, "N/A");
        assert_eq!(m.volume_display, "N/A");
        assert!(!m.prohibited_activities);
    }

    #[test]
    fn normalize_converts_foreign_currency_financials() {
        // Debt and cash in TWD, quote in USD at 0.05 TWD/USD.
        let summary = QuoteSummary {
            price: Some(Price { market_cap: raw(1000.0), ..Price::default() }),
            financial_data: Some(FinancialData {
                total_debt: raw(6000.0),
                total_cash: raw(2000.0),
                ..FinancialData::default()
            }),
            ..QuoteSummary::default()
        };

        let m = normalize("TSM", &summary, 0.05);
        assert!((m.debt_ratio - 0.3).abs() < 1e-12);
        assert!((m.liquid_assets_ratio - 0.1).abs() < 1e-12);
    }

    #[test]
    fn enterprise_value_fallback_applies_to_debt_only() {
        let summary = QuoteSummary {
            financial_data: Some(FinancialData {
                total_debt: raw(500.0),
                total_cash: raw(300.0),
                ..FinancialData::default()
            }),
            default_key_statistics: Some(DefaultKeyStatistics { enterprise_value: raw(2000.0) }),
            ..QuoteSummary::default()
        };

        let m = normalize("XYZ", &summary, 1.0);
        assert!((m.debt_ratio - 0.25).abs() < 1e-12);
        // Without a market cap the cash denominator is 1, not the EV.
        assert!((m.liquid_assets_ratio - 300.0).abs() < 1e-12);
        assert_eq!(m.market_cap, 0.0);
    }

    #[test]
    fn ratios_never_go_negative() {
        assert_eq!(clamp_ratio(-0.5), 0.0);
        assert_eq!(clamp_ratio(f64::NAN), 0.0);
        assert_eq!(clamp_ratio(0.25), 0.25);
    }

    #[test]
    fn display_formatting() {
        assert_eq!(format_market_cap(2_874_300_000_000.0), "2874.3B");
        assert_eq!(format_market_cap(0.0), "N/A");
        assert_eq!(format_volume(38_700_000.0), "38.7M");
        assert_eq!(format_volume(0.0), "N/A");
    }
}
