// src/services/blacklist.rs
//
// In-memory membership cache over the durable blacklist, so screening never
// pays a per-request database lookup. The two symbol sets are rebuilt into a
// fresh value and swapped under the write lock, so readers never observe a
// half-rebuilt set. All store failures are logged and swallowed; the cache
// keeps its last-known contents and the evaluator keeps working.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use log::{error, info};

use crate::models::{BlacklistCategory, BlacklistEntry, BlacklistType};
use crate::services::db::DbStore;

const BDS_SOURCE: &str = "BDS Movement";
const ETHICAL_SOURCE: &str = "Islamic Finance Standards";

// (symbol, company, reason, category)
const BDS_SEED: &[(&str, &str, &str, &str)] = &[
    // Tech & cloud services
    ("GOOGL", "Alphabet Inc.", "Project Nimbus, R&D in Israel", "tech"),
    ("GOOG", "Alphabet Inc.", "Project Nimbus, R&D in Israel", "tech"),
    ("AMZN", "Amazon.com Inc.", "Cloud services to Israeli military", "tech"),
    ("META", "Meta Platforms Inc.", "Support for Israeli operations", "tech"),
    ("MSFT", "Microsoft Corporation", "Significant Israeli operations", "tech"),
    ("INTC", "Intel Corporation", "Major investments in Israel", "tech"),
    ("DELL", "Dell Technologies", "Supplies to Israeli military", "tech"),
    ("HPQ", "HP Inc.", "Systems for movement restrictions", "tech"),
    ("HPE", "Hewlett Packard Enterprise", "Systems for movement restrictions", "tech"),
    ("ORCL", "Oracle Corporation", "Israeli operations", "tech"),
    ("IBM", "IBM", "Israeli operations", "tech"),
    ("CSCO", "Cisco Systems", "Israeli operations", "tech"),
    ("QCOM", "Qualcomm Inc.", "Israeli operations", "tech"),
    ("WIX", "Wix.com Ltd.", "Israeli company", "tech"),
    // Defense & aerospace
    ("BA", "Boeing Company", "Military equipment supplier", "defense"),
    ("LMT", "Lockheed Martin", "Military equipment supplier", "defense"),
    ("RTX", "Raytheon Technologies", "Military equipment supplier", "defense"),
    ("NOC", "Northrop Grumman", "Military equipment supplier", "defense"),
    ("GD", "General Dynamics", "Military equipment supplier", "defense"),
    ("TXT", "Textron Inc.", "Military equipment supplier", "defense"),
    ("HII", "Huntington Ingalls", "Military equipment supplier", "defense"),
    ("PLTR", "Palantir Technologies", "Surveillance tech to Israeli military", "defense"),
    ("ESLT", "Elbit Systems", "Israeli defense company", "defense"),
    // Heavy machinery & construction
    ("CAT", "Caterpillar Inc.", "Bulldozers for demolitions", "machinery"),
    ("GE", "General Electric", "Projects in occupied territories", "machinery"),
    // Consumer brands & food
    ("SBUX", "Starbucks Corporation", "Support for Israeli operations", "consumer"),
    ("MCD", "McDonald's Corporation", "Israeli franchisee supports military", "consumer"),
    ("PEP", "PepsiCo Inc.", "Owns SodaStream", "consumer"),
    ("KO", "Coca-Cola Company", "Factory in settlements", "consumer"),
    ("QSR", "Restaurant Brands Intl", "Israeli franchisee supports military", "consumer"),
    ("YUM", "Yum! Brands", "Israeli operations", "consumer"),
    ("PZZA", "Papa John's", "Israeli operations", "consumer"),
    ("PG", "Procter & Gamble", "R&D in Tel Aviv", "consumer"),
    ("UL", "Unilever PLC", "Israeli operations", "consumer"),
    // Entertainment & media
    ("DIS", "Walt Disney Company", "Investments and ties to Israel", "media"),
    // Travel & hospitality
    ("ABNB", "Airbnb Inc.", "Rentals in settlements", "travel"),
    ("BKNG", "Booking Holdings", "Rentals in settlements", "travel"),
    ("EXPE", "Expedia Group", "Rentals in settlements", "travel"),
    // Energy
    ("CVX", "Chevron Corporation", "Gas extraction in occupied territories", "energy"),
    // Pharmaceuticals
    ("TEVA", "Teva Pharmaceutical", "Israeli pharmaceutical company", "pharma"),
];

const ETHICAL_SEED: &[(&str, &str, &str, &str)] = &[
    ("MO", "Altria Group", "Tobacco", "consumer"),
    ("PM", "Philip Morris Intl", "Tobacco", "consumer"),
    ("BTI", "British American Tobacco", "Tobacco", "consumer"),
    ("BUD", "Anheuser-Busch InBev", "Alcohol", "consumer"),
    ("TAP", "Molson Coors", "Alcohol", "consumer"),
    ("STZ", "Constellation Brands", "Alcohol", "consumer"),
    ("LVS", "Las Vegas Sands", "Gambling", "consumer"),
    ("WYNN", "Wynn Resorts", "Gambling", "consumer"),
    ("MGM", "MGM Resorts", "Gambling", "consumer"),
    ("CZR", "Caesars Entertainment", "Gambling", "consumer"),
    ("JPM", "JPMorgan Chase", "Conventional Banking", "other"),
    ("BAC", "Bank of America", "Conventional Banking", "other"),
    ("C", "Citigroup Inc.", "Conventional Banking", "other"),
    ("WFC", "Wells Fargo", "Conventional Banking", "other"),
    ("GS", "Goldman Sachs", "Conventional Banking", "other"),
    ("MS", "Morgan Stanley", "Conventional Banking", "other"),
    ("AIG", "AIG", "Conventional Insurance", "other"),
    ("PRU", "Prudential Financial", "Conventional Insurance", "other"),
    ("MET", "MetLife Inc.", "Conventional Insurance", "other"),
    ("AFL", "Aflac Inc.", "Conventional Insurance", "other"),
];

/// Immutable snapshot the readers see; replaced wholesale on refresh.
#[derive(Debug, Default)]
struct Sets {
    bds: HashSet<String>,
    ethical: HashSet<String>,
    reasons: HashMap<String, String>,
    last_updated: Option<DateTime<Utc>>,
}

pub struct BlacklistCache {
    sets: RwLock<Sets>,
}

impl Default for BlacklistCache {
    fn default() -> Self {
        Self::new()
    }
}

impl BlacklistCache {
    pub fn new() -> Self {
        BlacklistCache { sets: RwLock::new(Sets::default()) }
    }

    /// The fixed seed list as full entries, ready for upserting.
    pub fn seed_entries() -> Vec<BlacklistEntry> {
        let now = Utc::now();
        let entry = |entry_type: BlacklistType,
                     source: &str,
                     (symbol, company, reason, category): &(&str, &str, &str, &str)| {
            BlacklistEntry {
                entry_type,
                symbol: symbol.to_string(),
                company: company.to_string(),
                reason: reason.to_string(),
                category: BlacklistCategory::parse_or_other(category),
                source: source.to_string(),
                date_added: now,
                last_verified: now,
                active: true,
            }
        };

        BDS_SEED
            .iter()
            .map(|row| entry(BlacklistType::Bds, BDS_SOURCE, row))
            .chain(
                ETHICAL_SEED
                    .iter()
                    .map(|row| entry(BlacklistType::Ethical, ETHICAL_SOURCE, row)),
            )
            .collect()
    }

    /// Upsert the seed list into the store (additive, idempotent), then
    /// refresh. Without a store, the cache is built from the seed directly
    /// so screening still works.
    pub async fn initialize(&self, db: Option<&DbStore>) {
        match db {
            Some(db) => {
                let mut upserted = 0usize;
                for entry in Self::seed_entries() {
                    match db.upsert_blacklist_entry(&entry).await {
                        Ok(()) => upserted += 1,
                        Err(e) => {
                            error!("Error seeding blacklist entry {}: {}", entry.symbol, e);
                        }
                    }
                }
                info!("Blacklist seeded: {} entries upserted", upserted);
                self.refresh(Some(db)).await;
            }
            None => self.load_from_seed(),
        }
    }

    /// Rebuild both sets from active store rows and swap them in. If the
    /// store is unreachable the previous contents are kept.
    pub async fn refresh(&self, db: Option<&DbStore>) {
        let db = match db {
            Some(db) => db,
            None => {
                self.load_from_seed();
                return;
            }
        };

        match db.get_active_blacklist().await {
            Ok(entries) => {
                let mut fresh = Sets::default();
                for entry in entries {
                    let symbol = entry.symbol.to_uppercase();
                    match entry.entry_type {
                        BlacklistType::Bds => fresh.bds.insert(symbol.clone()),
                        BlacklistType::Ethical => fresh.ethical.insert(symbol.clone()),
                    };
                    fresh.reasons.entry(symbol).or_insert(entry.reason);
                }
                fresh.last_updated = Some(Utc::now());

                let (bds, ethical) = (fresh.bds.len(), fresh.ethical.len());
                *self.sets.write().unwrap() = fresh;
                info!("Blacklist cache refreshed: {} BDS, {} ethical", bds, ethical);
            }
            Err(e) => {
                error!("Error refreshing blacklist cache, keeping previous contents: {}", e);
            }
        }
    }

    /// Populate the cache straight from the hardcoded seed (store-less mode).
    pub fn load_from_seed(&self) {
        let mut fresh = Sets::default();
        for entry in Self::seed_entries() {
            let symbol = entry.symbol.to_uppercase();
            match entry.entry_type {
                BlacklistType::Bds => fresh.bds.insert(symbol.clone()),
                BlacklistType::Ethical => fresh.ethical.insert(symbol.clone()),
            };
            fresh.reasons.entry(symbol).or_insert(entry.reason);
        }
        fresh.last_updated = Some(Utc::now());

        let (bds, ethical) = (fresh.bds.len(), fresh.ethical.len());
        *self.sets.write().unwrap() = fresh;
        info!("Blacklist cache loaded from seed: {} BDS, {} ethical", bds, ethical);
    }

    /// Membership test against one set, or either set when `entry_type` is
    /// omitted. Symbols are compared uppercase.
    pub fn is_blacklisted(&self, symbol: &str, entry_type: Option<BlacklistType>) -> bool {
        if symbol.is_empty() {
            return false;
        }

        let symbol = symbol.to_uppercase();
        let sets = self.sets.read().unwrap();
        match entry_type {
            Some(BlacklistType::Bds) => sets.bds.contains(&symbol),
            Some(BlacklistType::Ethical) => sets.ethical.contains(&symbol),
            None => sets.bds.contains(&symbol) || sets.ethical.contains(&symbol),
        }
    }

    /// The stored reason for the first matching active entry, if any.
    pub fn reason_for(&self, symbol: &str) -> Option<String> {
        self.sets
            .read()
            .unwrap()
            .reasons
            .get(&symbol.to_uppercase())
            .cloned()
    }

    /// (BDS count, ethical count) for the admin surface.
    pub fn counts(&self) -> (usize, usize) {
        let sets = self.sets.read().unwrap();
        (sets.bds.len(), sets.ethical.len())
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.sets.read().unwrap().last_updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cache_blacklists_nothing() {
        let cache = BlacklistCache::new();
        assert!(!cache.is_blacklisted("GOOGL", None));
        assert_eq!(cache.counts(), (0, 0));
        assert!(cache.last_updated().is_none());
    }

    #[test]
    fn seed_populates_both_sets() {
        let cache = BlacklistCache::new();
        cache.load_from_seed();

        let (bds, ethical) = cache.counts();
        assert_eq!(bds, BDS_SEED.len());
        assert_eq!(ethical, ETHICAL_SEED.len());
        assert!(cache.last_updated().is_some());
    }

    #[test]
    fn membership_respects_the_type_filter() {
        let cache = BlacklistCache::new();
        cache.load_from_seed();

        assert!(cache.is_blacklisted("CAT", Some(BlacklistType::Bds)));
        assert!(!cache.is_blacklisted("CAT", Some(BlacklistType::Ethical)));
        assert!(cache.is_blacklisted("CAT", None));

        assert!(cache.is_blacklisted("JPM", Some(BlacklistType::Ethical)));
        assert!(!cache.is_blacklisted("JPM", Some(BlacklistType::Bds)));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let cache = BlacklistCache::new();
        cache.load_from_seed();

        assert!(cache.is_blacklisted("googl", None));
        assert!(cache.is_blacklisted("Teva", None));
        assert!(!cache.is_blacklisted("", None));
    }

    #[test]
    fn reason_for_returns_the_stored_reason() {
        let cache = BlacklistCache::new();
        cache.load_from_seed();

        assert_eq!(cache.reason_for("MO").as_deref(), Some("Tobacco"));
        assert_eq!(cache.reason_for("cat").as_deref(), Some("Bulldozers for demolitions"));
        assert!(cache.reason_for("AAPL").is_none());
    }

    #[tokio::test]
    async fn initialize_without_store_falls_back_to_seed() {
        let cache = BlacklistCache::new();
        cache.initialize(None).await;
        assert!(cache.is_blacklisted("LMT", None));
    }

    #[tokio::test]
    async fn refresh_without_store_rebuilds_from_seed() {
        let cache = BlacklistCache::new();
        cache.refresh(None).await;
        assert!(cache.is_blacklisted("WYNN", None));
    }
}
