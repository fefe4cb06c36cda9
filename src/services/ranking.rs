// src/services/ranking.rs
//
// Presentation-side view over screened stocks: compliant-only filter,
// optional sector restriction, descending sort by a selectable key, and
// slice-based pagination. Pure functions, deterministic for a fixed input
// order.

use crate::models::{Pagination, ScreenedStock, Sector};

pub const DEFAULT_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Score,
    Performance,
    MarketCap,
    Volume,
}

impl SortKey {
    /// Unrecognized keys fall back to `Score`.
    pub fn parse(s: Option<&str>) -> SortKey {
        match s {
            Some("performance") => SortKey::Performance,
            Some("market-cap") => SortKey::MarketCap,
            Some("volume") => SortKey::Volume,
            _ => SortKey::Score,
        }
    }
}

/// Retain compliant entries, then restrict by sector unless it is `None`
/// (the "all" filter).
pub fn filter_stocks(stocks: Vec<ScreenedStock>, sector: Option<Sector>) -> Vec<ScreenedStock> {
    stocks
        .into_iter()
        .filter(|s| s.is_compliant)
        .filter(|s| sector.map_or(true, |wanted| s.metrics.sector == wanted))
        .collect()
}

/// Stable descending sort by the selected key. `total_cmp` keeps the
/// comparator a total order even if a NaN ever slips into the data.
pub fn sort_stocks(stocks: &mut [ScreenedStock], key: SortKey) {
    match key {
        SortKey::Score => stocks.sort_by(|a, b| b.compliance_score.cmp(&a.compliance_score)),
        SortKey::Performance => {
            stocks.sort_by(|a, b| b.metrics.change.total_cmp(&a.metrics.change))
        }
        SortKey::MarketCap => {
            stocks.sort_by(|a, b| b.metrics.market_cap.total_cmp(&a.metrics.market_cap))
        }
        SortKey::Volume => stocks.sort_by(|a, b| b.metrics.volume.total_cmp(&a.metrics.volume)),
    }
}

/// Slice out one page. Page numbers start at 1; out-of-range pages yield an
/// empty slice rather than an error.
pub fn paginate(stocks: &[ScreenedStock], page: u32, limit: u32) -> &[ScreenedStock] {
    let page = page.max(1) as usize;
    let limit = limit as usize;
    let start = (page - 1).saturating_mul(limit).min(stocks.len());
    let end = start.saturating_add(limit).min(stocks.len());
    &stocks[start..end]
}

/// Filter, sort and page in one go, with the metadata the API returns.
pub fn rank(
    stocks: Vec<ScreenedStock>,
    sector: Option<Sector>,
    key: SortKey,
    page: u32,
    limit: u32,
) -> (Vec<ScreenedStock>, Pagination) {
    let mut filtered = filter_stocks(stocks, sector);
    sort_stocks(&mut filtered, key);
    let total = filtered.len();
    let page_items = paginate(&filtered, page, limit).to_vec();
    (page_items, Pagination::new(page.max(1), limit, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StockMetrics;
    use chrono::Utc;

    fn stock(
        symbol: &str,
        sector: Sector,
        compliant: bool,
        score: u8,
        change: f64,
        market_cap: f64,
        volume: f64,
    ) -> ScreenedStock {
        ScreenedStock {
            metrics: StockMetrics {
                symbol: symbol.to_string(),
                company: symbol.to_string(),
                sector,
                price: 10.0,
                change,
                market_cap,
                market_cap_display: String::new(),
                volume,
                volume_display: String::new(),
                debt_ratio: 0.1,
                liquid_assets_ratio: 0.1,
                receivables_ratio: 0.0,
                interest_income: 0.01,
                prohibited_activities: false,
            },
            is_compliant: compliant,
            issues: if compliant { vec![] } else { vec!["Debt ratio exceeds 33%".into()] },
            compliance_score: score,
            methodology: String::new(),
            purification_required: compliant,
            purification_percentage: 0.01,
            last_updated: Utc::now(),
        }
    }

    fn sample() -> Vec<ScreenedStock> {
        vec![
            stock("AAA", Sector::Technology, true, 100, 2.5, 5e9, 1e6),
            stock("BBB", Sector::Technology, true, 85, 7.1, 1e9, 9e6),
            stock("CCC", Sector::Healthcare, true, 95, -1.2, 8e9, 4e6),
            stock("DDD", Sector::Technology, false, 70, 9.9, 3e9, 2e6),
            stock("EEE", Sector::Energy, true, 90, 4.0, 2e9, 7e6),
        ]
    }

    #[test]
    fn filter_drops_non_compliant_then_restricts_sector() {
        let tech = filter_stocks(sample(), Some(Sector::Technology));
        let symbols: Vec<_> = tech.iter().map(|s| s.metrics.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAA", "BBB"]);

        let all = filter_stocks(sample(), None);
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn technology_by_performance_descending() {
        let mut tech = filter_stocks(sample(), Some(Sector::Technology));
        sort_stocks(&mut tech, SortKey::Performance);
        let symbols: Vec<_> = tech.iter().map(|s| s.metrics.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BBB", "AAA"]);
    }

    #[test]
    fn sort_keys_order_descending() {
        let mut all = filter_stocks(sample(), None);

        sort_stocks(&mut all, SortKey::Score);
        assert_eq!(all[0].metrics.symbol, "AAA");

        sort_stocks(&mut all, SortKey::MarketCap);
        assert_eq!(all[0].metrics.symbol, "CCC");

        sort_stocks(&mut all, SortKey::Volume);
        assert_eq!(all[0].metrics.symbol, "BBB");
    }

    #[test]
    fn unknown_sort_key_falls_back_to_score() {
        assert_eq!(SortKey::parse(Some("bogus")), SortKey::Score);
        assert_eq!(SortKey::parse(None), SortKey::Score);
        assert_eq!(SortKey::parse(Some("market-cap")), SortKey::MarketCap);
    }

    #[test]
    fn pagination_slices_and_clamps() {
        let all = filter_stocks(sample(), None);

        assert_eq!(paginate(&all, 1, 2).len(), 2);
        assert_eq!(paginate(&all, 2, 2).len(), 2);
        assert_eq!(paginate(&all, 3, 2).len(), 0);
        assert_eq!(paginate(&all, 99, 10).len(), 0);
        // Page 0 is treated as page 1.
        assert_eq!(paginate(&all, 0, 2).len(), 2);
    }

    #[test]
    fn rank_is_deterministic_for_fixed_input() {
        let (first, meta1) = rank(sample(), None, SortKey::Performance, 1, 3);
        let (second, meta2) = rank(sample(), None, SortKey::Performance, 1, 3);

        let a: Vec<_> = first.iter().map(|s| s.metrics.symbol.clone()).collect();
        let b: Vec<_> = second.iter().map(|s| s.metrics.symbol.clone()).collect();
        assert_eq!(a, b);
        assert_eq!(meta1.total, 4);
        assert_eq!(meta2.pages, 2);
    }

    #[test]
    fn pagination_metadata() {
        let meta = Pagination::new(1, 100, 0);
        assert_eq!(meta.pages, 0);

        let meta = Pagination::new(2, 10, 25);
        assert_eq!(meta.pages, 3);
    }
}
