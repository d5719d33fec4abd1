//! Registration pricing: promo and couponless tables reduced to one quote.

use crate::client::ApiClient;
use crate::error::{ExpensiveError, ExpensiveResult};
use crate::models::{PriceEntry, PriceQuote};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

const GET_PRICING: &str = "namecheap.users.getPricing";

/// Zones for which the registrar publishes public coupons.
pub const PROMO_ZONES: [&str; 5] = ["com", "net", "org", "info", "biz"];

/// Zone of `domain`: everything after the last dot.
pub fn zone_of(domain: &str) -> ExpensiveResult<&str> {
    match domain.rsplit_once('.') {
        Some((name, zone)) if !name.is_empty() && !zone.is_empty() => Ok(zone),
        _ => Err(ExpensiveError::Validation(format!(
            "{} is not a domain name with a zone",
            domain
        ))),
    }
}

/// What to do about a promo code before pricing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromoDecision {
    /// The caller supplied a code.
    Explicit(String),
    /// No code given but the zone has public coupons worth looking up.
    LookUpCoupon,
    NoPromo,
}

pub fn decide_promo(explicit: Option<&str>, zone: &str) -> PromoDecision {
    match explicit.map(str::trim).filter(|p| !p.is_empty()) {
        Some(code) => PromoDecision::Explicit(code.to_string()),
        None if PROMO_ZONES.contains(&zone.to_ascii_lowercase().as_str()) => {
            PromoDecision::LookUpCoupon
        }
        None => PromoDecision::NoPromo,
    }
}

/// Entry for exactly `years`; anything else is an unsupported length.
pub fn find_product(entries: &[PriceEntry], years: u32) -> ExpensiveResult<&PriceEntry> {
    entries
        .iter()
        .find(|entry| entry.duration == years)
        .ok_or_else(|| {
            ExpensiveError::NotFound(format!("no {}-year registration price", years))
        })
}

/// Fetch the register price table of `zone`, optionally under a promo code.
pub async fn get_pricing(
    client: &ApiClient,
    zone: &str,
    promo: Option<&str>,
) -> ExpensiveResult<Vec<PriceEntry>> {
    let mut params = vec![
        ("ProductType", "DOMAIN".to_string()),
        ("ActionName", "REGISTER".to_string()),
        ("ProductName", zone.to_ascii_uppercase()),
    ];
    if let Some(code) = promo {
        params.push(("PromotionCode", code.to_string()));
    }

    let root = client.query(GET_PRICING, params).await?;
    let product = root
        .extract("ProductCategory")
        .into_iter()
        .filter(|category| {
            category
                .attr("Name")
                .is_some_and(|name| name.eq_ignore_ascii_case("register"))
        })
        .flat_map(|category| category.extract("Product"))
        .find(|product| {
            product
                .attr("Name")
                .is_some_and(|name| name.eq_ignore_ascii_case(zone))
        })
        .ok_or_else(|| ExpensiveError::NotFound(format!("no register pricing for .{}", zone)))?;

    product
        .extract("Price")
        .into_iter()
        .filter(|price| {
            price
                .attr("DurationType")
                .is_none_or(|kind| kind.eq_ignore_ascii_case("YEAR"))
        })
        .map(PriceEntry::from_node)
        .collect()
}

type TableKey = (String, Option<String>);

/// Pricing resolver with a per-invocation table cache
#[derive(Clone)]
pub struct PricingResolver {
    client: ApiClient,
    cache: Cache<TableKey, Arc<Vec<PriceEntry>>>,
}

impl PricingResolver {
    pub fn new(client: ApiClient) -> Self {
        // Prices can change with promotions; keep tables briefly.
        let cache = Cache::builder()
            .max_capacity(64)
            .time_to_live(Duration::from_secs(300))
            .build();

        Self { client, cache }
    }

    async fn table(&self, zone: &str, promo: Option<&str>) -> ExpensiveResult<Arc<Vec<PriceEntry>>> {
        let key = (zone.to_ascii_lowercase(), promo.map(str::to_string));
        if let Some(cached) = self.cache.get(&key).await {
            tracing::debug!(zone, promo, "Pricing cache hit");
            return Ok(cached);
        }

        let table = Arc::new(get_pricing(&self.client, zone, promo).await?);
        self.cache.insert(key, table.clone()).await;
        Ok(table)
    }

    /// Price to register `domain` for `years`, with the couponless price when `promo` is set.
    pub async fn quote(
        &self,
        domain: &str,
        years: u32,
        promo: Option<&str>,
    ) -> ExpensiveResult<PriceQuote> {
        if years == 0 {
            return Err(ExpensiveError::Validation("years must be at least 1".to_string()));
        }
        let zone = zone_of(domain)?;
        tracing::debug!(zone, years, promo, "Resolving price");

        let table = self.table(zone, promo).await?;
        let entry = find_product(&table, years)?;

        let couponless_price = match promo {
            Some(_) => {
                let plain = self.table(zone, None).await?;
                Some(find_product(&plain, years)?.your_price)
            }
            None => None,
        };

        Ok(PriceQuote {
            price: entry.your_price,
            price_type: entry.your_price_type.clone(),
            additional_cost: entry.your_additional_cost,
            additional_cost_type: entry.your_additional_cost_type.clone(),
            currency: entry.currency.clone(),
            couponless_price,
            promo_code: promo.map(str::to_string),
        })
    }
}

/// Warning text when the promo makes the registration more expensive.
pub fn promo_warning(quote: &PriceQuote) -> Option<String> {
    if !quote.is_net_negative() {
        return None;
    }
    Some(format!(
        "[!] Warning: you will pay more with coupon {} than without it.",
        quote.promo_code.as_deref().unwrap_or_default()
    ))
}
