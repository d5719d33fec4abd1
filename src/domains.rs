//! `namecheap.domains.*` commands.

use crate::client::ApiClient;
use crate::error::{ExpensiveError, ExpensiveResult};
use crate::models::{
    amount, CreateRequest, DomainCheckResult, DomainInfo, DomainListItem, DomainListPage,
    ListOptions, RegistrationResult,
};
use crate::parser::TagNode;

const CHECK: &str = "namecheap.domains.check";
const GET_INFO: &str = "namecheap.domains.getInfo";
const GET_LIST: &str = "namecheap.domains.getList";
const CREATE: &str = "namecheap.domains.create";

/// Contact roles the registrar expects on `create`.
const CONTACT_ROLES: [&str; 4] = ["Registrant", "Tech", "Admin", "AuxBilling"];

fn validate_domains<S: AsRef<str>>(domains: &[S]) -> ExpensiveResult<Vec<String>> {
    if domains.is_empty() {
        return Err(ExpensiveError::Validation(
            "at least one domain is required".to_string(),
        ));
    }
    domains
        .iter()
        .map(|d| {
            let d = d.as_ref().trim();
            if d.is_empty() || d.contains(',') || d.contains(char::is_whitespace) {
                Err(ExpensiveError::Validation(format!(
                    "all domains must be plain names, got {:?}",
                    d
                )))
            } else {
                Ok(d.to_string())
            }
        })
        .collect()
}

/// Check availability of `domains`; results come back in request order.
pub async fn check<S: AsRef<str>>(
    client: &ApiClient,
    domains: &[S],
) -> ExpensiveResult<Vec<DomainCheckResult>> {
    let domains = validate_domains(domains)?;
    let root = client
        .query(CHECK, [("DomainList", domains.join(","))])
        .await?;

    let results = root
        .extract("DomainCheckResult")
        .into_iter()
        .map(DomainCheckResult::from_node)
        .collect::<ExpensiveResult<Vec<_>>>()?;

    if results.len() != domains.len() {
        return Err(ExpensiveError::Parse(format!(
            "asked about {} domains, got {} results",
            domains.len(),
            results.len()
        )));
    }

    // The registrar answers in request order; keep the caller's spelling.
    Ok(domains
        .into_iter()
        .zip(results)
        .map(|(domain, mut result)| {
            if result.domain.is_empty() {
                result.domain = domain;
            }
            result
        })
        .collect())
}

/// Zones tried when a bare word is checked.
pub const DEFAULT_ZONES: [&str; 6] = ["com", "net", "org", "io", "co", "app"];

/// A name without a zone, e.g. `rustacean`.
pub fn is_single_word(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && !name.contains('.')
}

/// Expand bare words into one candidate per zone; full names pass through.
pub fn expand_candidates<S: AsRef<str>, Z: AsRef<str>>(names: &[S], zones: &[Z]) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::new();
    for name in names.iter().map(|n| n.as_ref().trim().to_ascii_lowercase()) {
        let expanded: Vec<String> = if is_single_word(&name) {
            zones
                .iter()
                .map(|zone| format!("{}.{}", name, zone.as_ref().trim_start_matches('.')))
                .collect()
        } else {
            vec![name]
        };
        for candidate in expanded {
            if !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }
    }
    candidates
}

/// Share of available results, in percent.
pub fn percent_free(results: &[DomainCheckResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let free = results.iter().filter(|r| r.available).count();
    free as f64 * 100.0 / results.len() as f64
}

/// Fetch the registration record of an owned domain.
pub async fn get_info(client: &ApiClient, domain: &str) -> ExpensiveResult<DomainInfo> {
    let domain = validate_domains(&[domain])?.remove(0);
    let root = client.query(GET_INFO, [("DomainName", domain)]).await?;
    let result = root.require("DomainGetInfoResult")?;

    let details = result.first("DomainDetails");
    let detail = |tag: &str| {
        details
            .and_then(|d| d.first(tag))
            .map(|n| n.text().to_string())
            .unwrap_or_default()
    };
    let dns = result.first("DnsDetails");

    Ok(DomainInfo {
        domain: result.attr("DomainName").unwrap_or_default().to_string(),
        status: result.attr("Status").unwrap_or_default().to_string(),
        owner: result.attr("OwnerName").unwrap_or_default().to_string(),
        is_premium: result.attr_bool("IsPremium"),
        created: detail("CreatedDate"),
        expires: detail("ExpiredDate"),
        dns_provider: dns
            .and_then(|d| d.attr("ProviderType"))
            .unwrap_or_default()
            .to_string(),
        nameservers: dns
            .map(|d| {
                d.extract("Nameserver")
                    .into_iter()
                    .map(|n| n.text().to_string())
                    .collect()
            })
            .unwrap_or_default(),
        whois_guard: result
            .first("Whoisguard")
            .and_then(|w| w.attr("Enabled"))
            .map(|v| v.eq_ignore_ascii_case("true")),
    })
}

fn paging_value(root: &TagNode, tag: &str) -> u32 {
    root.first("Paging")
        .and_then(|p| p.first(tag))
        .and_then(|n| n.text().trim().parse().ok())
        .unwrap_or(0)
}

/// List the account's domains.
pub async fn get_list(client: &ApiClient, options: &ListOptions) -> ExpensiveResult<DomainListPage> {
    let mut params = vec![
        ("ListType", options.list_type_param().to_string()),
        ("SortBy", options.sort_param()),
    ];
    if let Some(search) = options.search.as_deref().filter(|s| !s.is_empty()) {
        params.push(("SearchTerm", search.to_string()));
    }
    if let Some(size) = options.page_size {
        params.push(("PageSize", size.to_string()));
    }
    if let Some(page) = options.page {
        params.push(("Page", page.to_string()));
    }

    let root = client.query(GET_LIST, params).await?;
    let domains = root
        .extract("Domain")
        .into_iter()
        .map(DomainListItem::from_node)
        .collect();

    Ok(DomainListPage {
        domains,
        total_items: paging_value(&root, "TotalItems"),
        current_page: paging_value(&root, "CurrentPage"),
        page_size: paging_value(&root, "PageSize"),
    })
}

/// Parameters of `namecheap.domains.create` for `request`.
pub fn create_params(request: &CreateRequest) -> Vec<(String, String)> {
    let mut params = vec![
        ("DomainName".to_string(), request.domain.clone()),
        ("Years".to_string(), request.years.to_string()),
    ];
    if let Some(promo) = &request.promo {
        params.push(("PromotionCode".to_string(), promo.clone()));
    }
    for role in CONTACT_ROLES {
        params.extend(request.address.contact_params(role));
    }
    if let Some(premium) = &request.premium {
        params.push(("IsPremiumDomain".to_string(), "true".to_string()));
        params.push(("PremiumPrice".to_string(), premium.premium_price.to_string()));
        params.push(("EapFee".to_string(), premium.eap_fee.to_string()));
    }
    params
}

/// Register a domain. Only a `Registered="true"` result counts as success.
pub async fn create(client: &ApiClient, request: &CreateRequest) -> ExpensiveResult<RegistrationResult> {
    validate_domains(&[&request.domain])?;
    if request.years == 0 {
        return Err(ExpensiveError::Validation("years must be at least 1".to_string()));
    }

    tracing::info!(domain = %request.domain, years = request.years, "Registering domain");
    let root = client.query(CREATE, create_params(request)).await?;
    let result = root.require("DomainCreateResult")?;

    if !result.attr_bool("Registered") {
        return Err(ExpensiveError::Parse(format!(
            "Domain {} was not registered",
            request.domain
        )));
    }

    let optional = |key: &str| result.attr(key).map(str::to_string);
    Ok(RegistrationResult {
        domain: result
            .attr("Domain")
            .unwrap_or(request.domain.as_str())
            .to_string(),
        charged_amount: amount(result, "ChargedAmount")?,
        domain_id: optional("DomainID"),
        order_id: optional("OrderID"),
        transaction_id: optional("TransactionID"),
    })
}
