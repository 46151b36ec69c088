use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::utils::error::{Result, StorefrontError};

// 10^18 * u64::MAX 仍在 u128 範圍內
pub const MAX_DISCOUNT_SCALE: usize = 18;

pub type ServiceId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceCatalog {
    prices: BTreeMap<ServiceId, u64>,
}

impl ServiceCatalog {
    pub fn new(prices: BTreeMap<ServiceId, u64>) -> Self {
        Self { prices }
    }

    pub fn price(&self, id: &str) -> Option<u64> {
        self.prices.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.prices.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.prices.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.prices.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// 大小寫不敏感地找出目錄中的標準名稱
    pub fn canonical_id(&self, id: &str) -> Option<&str> {
        let id = id.trim();
        self.prices
            .keys()
            .find(|k| k.eq_ignore_ascii_case(id))
            .map(String::as_str)
    }
}

impl Default for ServiceCatalog {
    fn default() -> Self {
        let mut prices = BTreeMap::new();
        prices.insert("Banner".to_string(), 50_000);
        prices.insert("Avatar".to_string(), 25_000);
        prices.insert("Preview".to_string(), 100_000);
        Self { prices }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromoRule {
    pub code: String,
    /// Strictly between 0 and 1.
    pub discount: f64,
}

impl PromoRule {
    pub fn new(code: impl Into<String>, discount: f64) -> Result<Self> {
        let rule = Self {
            code: code.into(),
            discount,
        };
        rule.check()?;
        Ok(rule)
    }

    pub fn check(&self) -> Result<()> {
        if self.code.is_empty() {
            return Err(StorefrontError::InvalidConfigValueError {
                field: "promo.code".to_string(),
                value: self.code.clone(),
                reason: "Promo code cannot be empty".to_string(),
            });
        }
        if !(self.discount > 0.0 && self.discount < 1.0) {
            return Err(StorefrontError::InvalidConfigValueError {
                field: "promo.discount".to_string(),
                value: self.discount.to_string(),
                reason: "Discount must be strictly between 0 and 1".to_string(),
            });
        }
        if self.discount_ratio().is_none() {
            return Err(StorefrontError::InvalidConfigValueError {
                field: "promo.discount".to_string(),
                value: self.discount.to_string(),
                reason: format!(
                    "Discount must have at most {} decimal places to be applied exactly",
                    MAX_DISCOUNT_SCALE
                ),
            });
        }
        Ok(())
    }

    /// The configured decimal as `(numerator, 10^scale)`, e.g. 0.25 -> (25, 100).
    pub fn discount_ratio(&self) -> Option<(u64, u64)> {
        if !(self.discount > 0.0 && self.discount < 1.0) {
            return None;
        }
        // f64 的 Display 不用指數表示法，輸出最短可還原的十進位
        let text = self.discount.to_string();
        let digits = text.strip_prefix("0.")?;
        if digits.is_empty() || digits.len() > MAX_DISCOUNT_SCALE {
            return None;
        }
        let numerator = digits.parse::<u64>().ok()?;
        let denominator = 10u64.checked_pow(digits.len() as u32)?;
        Some((numerator, denominator))
    }

    /// Exact, case-sensitive match.
    pub fn matches(&self, entered: &str) -> bool {
        entered == self.code
    }
}

impl Default for PromoRule {
    fn default() -> Self {
        Self {
            code: "Artishok_uz".to_string(),
            discount: 0.25,
        }
    }
}

pub fn base_price<'a, I>(selected: I, catalog: &ServiceCatalog) -> u64
where
    I: IntoIterator<Item = &'a ServiceId>,
{
    selected
        .into_iter()
        .map(|id| catalog.price(id).unwrap_or(0))
        .fold(0u64, u64::saturating_add)
}

/// floor(base * (1 - numerator / denominator))
pub fn apply_discount(base: u64, numerator: u64, denominator: u64) -> u64 {
    if denominator == 0 {
        return base;
    }
    let keep = denominator.saturating_sub(numerator) as u128;
    ((base as u128 * keep) / denominator as u128) as u64
}

pub fn promo_applies(entered: &str, promo_disabled: bool, rule: &PromoRule) -> bool {
    !promo_disabled && rule.matches(entered)
}

/// Unknown ids contribute nothing here; drafts reject them before submission.
/// A rule that fails `PromoRule::check` gives no discount.
pub fn compute_total(
    selected: &BTreeSet<ServiceId>,
    catalog: &ServiceCatalog,
    promo_entered: &str,
    promo_disabled: bool,
    rule: &PromoRule,
) -> u64 {
    let base = base_price(selected, catalog);
    match rule.discount_ratio() {
        Some((numerator, denominator)) if promo_applies(promo_entered, promo_disabled, rule) => {
            apply_discount(base, numerator, denominator)
        }
        _ => base,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuoteLine {
    pub service: ServiceId,
    pub price: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceQuote {
    pub lines: Vec<QuoteLine>,
    pub base: u64,
    pub discount: u64,
    pub total: u64,
    pub promo_applied: bool,
}

pub fn quote(
    selected: &BTreeSet<ServiceId>,
    catalog: &ServiceCatalog,
    promo_entered: &str,
    promo_disabled: bool,
    rule: &PromoRule,
) -> PriceQuote {
    let lines: Vec<QuoteLine> = selected
        .iter()
        .map(|id| QuoteLine {
            service: id.clone(),
            price: catalog.price(id).unwrap_or(0),
        })
        .collect();
    let base = base_price(selected, catalog);
    let total = compute_total(selected, catalog, promo_entered, promo_disabled, rule);

    PriceQuote {
        lines,
        base,
        discount: base - total,
        total,
        promo_applied: promo_applies(promo_entered, promo_disabled, rule),
    }
}

/// 50000 -> "50,000"
pub fn format_amount(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(ids: &[&str]) -> BTreeSet<ServiceId> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_reference_example() {
        let catalog = ServiceCatalog::default();
        let rule = PromoRule::default();
        let total = compute_total(&select(&["Banner", "Avatar"]), &catalog, "Artishok_uz", false, &rule);
        assert_eq!(total, 56_250);
    }

    #[test]
    fn test_promo_is_case_sensitive_and_exact() {
        let catalog = ServiceCatalog::default();
        let rule = PromoRule::default();
        let selected = select(&["Banner"]);
        assert_eq!(compute_total(&selected, &catalog, "artishok_uz", false, &rule), 50_000);
        assert_eq!(compute_total(&selected, &catalog, "Artishok_uz ", false, &rule), 50_000);
        assert_eq!(compute_total(&selected, &catalog, "", false, &rule), 50_000);
        assert_eq!(compute_total(&selected, &catalog, "Artishok_uz", false, &rule), 37_500);
    }

    #[test]
    fn test_override_disables_promo() {
        let catalog = ServiceCatalog::default();
        let rule = PromoRule::default();
        let selected = select(&["Preview"]);
        assert_eq!(compute_total(&selected, &catalog, "Artishok_uz", true, &rule), 100_000);
        assert_eq!(compute_total(&selected, &catalog, "nope", true, &rule), 100_000);
        assert_eq!(compute_total(&selected, &catalog, "nope", false, &rule), 100_000);
    }

    #[test]
    fn test_adding_a_service_never_lowers_the_base() {
        let catalog = ServiceCatalog::default();
        let rule = PromoRule::default();
        let all: Vec<&str> = catalog.ids().collect();
        let mut selected = BTreeSet::new();
        let mut previous = 0;
        for id in all {
            selected.insert(id.to_string());
            let total = compute_total(&selected, &catalog, "", false, &rule);
            assert!(total >= previous);
            previous = total;
        }
    }

    #[test]
    fn test_unknown_ids_price_at_zero() {
        let catalog = ServiceCatalog::default();
        let rule = PromoRule::default();
        assert_eq!(compute_total(&select(&["Logo", "Avatar"]), &catalog, "", false, &rule), 25_000);
    }

    #[test]
    fn test_discount_floors() {
        assert_eq!(apply_discount(10_001, 25, 100), 7_500);
        assert_eq!(apply_discount(0, 25, 100), 0);
        assert_eq!(apply_discount(u64::MAX, 0, 1), u64::MAX);
        assert_eq!(apply_discount(u64::MAX, 1, 1_000_000_000_000_000_000), u64::MAX - 19);
    }

    #[test]
    fn test_fractional_discounts_apply_exactly() {
        let mut prices = BTreeMap::new();
        prices.insert("Logo".to_string(), 300_000);
        let catalog = ServiceCatalog::new(prices);
        let selected = select(&["Logo"]);

        let third = PromoRule::new("THIRD", 0.3333333).unwrap();
        assert_eq!(third.discount_ratio(), Some((3_333_333, 10_000_000)));
        assert_eq!(compute_total(&selected, &catalog, "THIRD", false, &third), 200_000);

        let tiny = PromoRule::new("TINY", 0.00004).unwrap();
        assert_eq!(compute_total(&selected, &catalog, "TINY", false, &tiny), 299_988);
    }

    #[test]
    fn test_promo_rule_rejects_fractions_it_cannot_apply_exactly() {
        let err = PromoRule::new("X_CODE", 1e-19).unwrap_err();
        assert!(err.to_string().contains("decimal places"));
        assert!(PromoRule::new("X_CODE", 1e-18).is_ok());
    }

    #[test]
    fn test_promo_rule_bounds() {
        assert!(PromoRule::new("X_CODE", 0.0).is_err());
        assert!(PromoRule::new("X_CODE", 1.0).is_err());
        assert!(PromoRule::new("", 0.5).is_err());
        assert_eq!(PromoRule::new("X_CODE", 0.1).unwrap().discount_ratio(), Some((1, 10)));
    }

    #[test]
    fn test_quote_breakdown() {
        let q = quote(
            &select(&["Avatar", "Banner"]),
            &ServiceCatalog::default(),
            "Artishok_uz",
            false,
            &PromoRule::default(),
        );
        assert_eq!(q.lines.len(), 2);
        assert_eq!(q.base, 75_000);
        assert_eq!(q.discount, 18_750);
        assert!(q.promo_applied);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0), "0");
        assert_eq!(format_amount(999), "999");
        assert_eq!(format_amount(56_250), "56,250");
        assert_eq!(format_amount(1_000_000), "1,000,000");
    }
}
