use crate::error::{ExpensiveError, ExpensiveResult};
use crate::parser::TagNode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Registrar environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Production,
    Sandbox,
}

impl Network {
    pub fn from_sandbox_flag(sandbox: bool) -> Self {
        if sandbox {
            Network::Sandbox
        } else {
            Network::Production
        }
    }

    pub fn api_url(&self) -> &'static str {
        match self {
            Network::Production => "https://api.namecheap.com/xml.response",
            Network::Sandbox => "https://api.sandbox.namecheap.com/xml.response",
        }
    }

    /// Base URL of the registrar's website (login, coupons).
    pub fn web_url(&self) -> &'static str {
        match self {
            Network::Production => "https://www.namecheap.com",
            Network::Sandbox => "https://www.sandbox.namecheap.com",
        }
    }
}

/// Parse a money attribute. Missing or empty values count as zero.
pub(crate) fn amount(node: &TagNode, key: &str) -> ExpensiveResult<Decimal> {
    match node.attr(key).map(str::trim) {
        None | Some("") => Ok(Decimal::ZERO),
        Some(raw) => Decimal::from_str(raw).map_err(|e| {
            ExpensiveError::Parse(format!("{}=\"{}\" on <{}>: {}", key, raw, node.name, e))
        }),
    }
}

fn number(node: &TagNode, key: &str) -> ExpensiveResult<u32> {
    match node.attr(key).map(str::trim) {
        None | Some("") => Ok(0),
        Some(raw) => raw.parse().map_err(|_| {
            ExpensiveError::Parse(format!("{}=\"{}\" on <{}> is not a number", key, raw, node.name))
        }),
    }
}

fn string(node: &TagNode, key: &str) -> String {
    node.attr(key).unwrap_or_default().to_string()
}

/// One `DomainCheckResult` of `namecheap.domains.check`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainCheckResult {
    pub domain: String,
    pub available: bool,
    pub is_premium_name: bool,
    pub premium_registration_price: Decimal,
    pub premium_renewal_price: Decimal,
    pub premium_transfer_price: Decimal,
    pub eap_fee: Decimal,
    pub icann_fee: Decimal,
    pub error_no: u32,
    pub description: String,
}

impl DomainCheckResult {
    pub fn from_node(node: &TagNode) -> ExpensiveResult<Self> {
        Ok(Self {
            domain: string(node, "Domain"),
            available: node.attr_bool("Available"),
            is_premium_name: node.attr_bool("IsPremiumName"),
            premium_registration_price: amount(node, "PremiumRegistrationPrice")?,
            premium_renewal_price: amount(node, "PremiumRenewalPrice")?,
            premium_transfer_price: amount(node, "PremiumTransferPrice")?,
            eap_fee: amount(node, "EapFee")?,
            icann_fee: amount(node, "IcannFee")?,
            error_no: number(node, "ErrorNo")?,
            description: string(node, "Description"),
        })
    }
}

/// A `Price` row from `namecheap.users.getPricing`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceEntry {
    pub duration: u32,
    pub your_price: Decimal,
    pub your_price_type: String,
    pub your_additional_cost: Decimal,
    pub your_additional_cost_type: String,
    pub regular_price: Decimal,
    pub currency: String,
}

impl PriceEntry {
    pub fn from_node(node: &TagNode) -> ExpensiveResult<Self> {
        // The registrar spells these "Additonal"; accept the correct spelling too.
        let cost_key = if node.attr("YourAdditonalCost").is_some() {
            "YourAdditonalCost"
        } else {
            "YourAdditionalCost"
        };
        let cost_type = node
            .attr("YourAdditonalCostType")
            .or_else(|| node.attr("YourAdditionalCostType"))
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            duration: number(node, "Duration")?,
            your_price: amount(node, "YourPrice")?,
            your_price_type: string(node, "YourPriceType"),
            your_additional_cost: amount(node, cost_key)?,
            your_additional_cost_type: cost_type,
            regular_price: amount(node, "RegularPrice")?,
            currency: string(node, "Currency"),
        })
    }
}

/// Comparable price for one registration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceQuote {
    pub price: Decimal,
    pub price_type: String,
    pub additional_cost: Decimal,
    pub additional_cost_type: String,
    pub currency: String,
    /// Only set when a promo code was applied.
    pub couponless_price: Option<Decimal>,
    pub promo_code: Option<String>,
}

impl PriceQuote {
    /// True when the promo makes the registration more expensive.
    pub fn is_net_negative(&self) -> bool {
        match (&self.promo_code, self.couponless_price) {
            (Some(_), Some(couponless)) => self.price > couponless,
            _ => false,
        }
    }
}

/// Entry of `namecheap.users.address.getList`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressSummary {
    pub id: String,
    pub name: String,
    pub is_default: bool,
}

impl AddressSummary {
    pub fn from_node(node: &TagNode) -> Self {
        Self {
            id: string(node, "AddressId"),
            name: string(node, "AddressName"),
            is_default: node.attr_bool("IsDefault"),
        }
    }
}

/// Registrant contact record from `namecheap.users.address.getInfo`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressDetail {
    pub first_name: String,
    pub last_name: String,
    pub job_title: String,
    pub organization: String,
    pub address1: String,
    pub address2: String,
    pub city: String,
    pub state_province: String,
    pub state_province_choice: String,
    pub zip: String,
    pub country: String,
    pub phone: String,
    pub phone_ext: String,
    pub email_address: String,
}

impl AddressDetail {
    /// Tag names of the response, in field order.
    pub const TAGS: [&'static str; 14] = [
        "FirstName",
        "LastName",
        "JobTitle",
        "Organization",
        "Address1",
        "Address2",
        "City",
        "StateProvince",
        "StateProvinceChoice",
        "Zip",
        "Country",
        "Phone",
        "PhoneExt",
        "EmailAddress",
    ];

    /// Every tag is required; an absent one fails the whole record.
    pub fn from_node(node: &TagNode) -> ExpensiveResult<Self> {
        let field = |tag: &str| -> ExpensiveResult<String> {
            Ok(node.require(tag)?.text().to_string())
        };

        Ok(Self {
            first_name: field("FirstName")?,
            last_name: field("LastName")?,
            job_title: field("JobTitle")?,
            organization: field("Organization")?,
            address1: field("Address1")?,
            address2: field("Address2")?,
            city: field("City")?,
            state_province: field("StateProvince")?,
            state_province_choice: field("StateProvinceChoice")?,
            zip: field("Zip")?,
            country: field("Country")?,
            phone: field("Phone")?,
            phone_ext: field("PhoneExt")?,
            email_address: field("EmailAddress")?,
        })
    }

    /// Contact parameters for one role of `namecheap.domains.create`.
    pub fn contact_params(&self, role: &str) -> Vec<(String, String)> {
        [
            ("FirstName", &self.first_name),
            ("LastName", &self.last_name),
            ("Address1", &self.address1),
            ("Address2", &self.address2),
            ("City", &self.city),
            ("StateProvince", &self.state_province),
            ("StateProvinceChoice", &self.state_province_choice),
            ("PostalCode", &self.zip),
            ("Country", &self.country),
            ("Phone", &self.phone),
            ("PhoneExt", &self.phone_ext),
            ("EmailAddress", &self.email_address),
            ("OrganizationName", &self.organization),
            ("JobTitle", &self.job_title),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| (format!("{}{}", role, key), value.clone()))
        .collect()
    }
}

impl fmt::Display for AddressDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}, {}", self.first_name, self.last_name, self.email_address)?;
        writeln!(f, " {}", self.address1)?;
        if !self.address2.is_empty() {
            writeln!(f, " {}", self.address2)?;
        }
        writeln!(f, " {}", self.city)?;
        write!(f, " {}, {}", self.zip, self.country)
    }
}

/// Premium fields sent along with `namecheap.domains.create`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PremiumOverride {
    pub premium_price: Decimal,
    pub eap_fee: Decimal,
}

/// Parameters for registering a domain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateRequest {
    pub domain: String,
    pub years: u32,
    pub address: AddressDetail,
    pub promo: Option<String>,
    pub premium: Option<PremiumOverride>,
}

/// Successful `DomainCreateResult`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrationResult {
    pub domain: String,
    pub charged_amount: Decimal,
    pub domain_id: Option<String>,
    pub order_id: Option<String>,
    pub transaction_id: Option<String>,
}

/// Record from `namecheap.domains.getInfo`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainInfo {
    pub domain: String,
    pub status: String,
    pub owner: String,
    pub is_premium: bool,
    pub created: String,
    pub expires: String,
    pub dns_provider: String,
    pub nameservers: Vec<String>,
    pub whois_guard: Option<bool>,
}

/// Row of `namecheap.domains.getList`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainListItem {
    pub id: String,
    pub name: String,
    pub user: String,
    pub created: String,
    pub expires: String,
    pub is_expired: bool,
    pub is_locked: bool,
    pub auto_renew: bool,
    pub whois_guard: String,
}

impl DomainListItem {
    pub fn from_node(node: &TagNode) -> Self {
        Self {
            id: string(node, "ID"),
            name: string(node, "Name"),
            user: string(node, "User"),
            created: string(node, "Created"),
            expires: string(node, "Expires"),
            is_expired: node.attr_bool("IsExpired"),
            is_locked: node.attr_bool("IsLocked"),
            auto_renew: node.attr_bool("AutoRenew"),
            whois_guard: string(node, "WhoisGuard"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainListPage {
    pub domains: Vec<DomainListItem>,
    pub total_items: u32,
    pub current_page: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Name,
    ExpireDate,
    CreateDate,
}

impl FromStr for SortField {
    type Err = ExpensiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "name" => Ok(SortField::Name),
            "expire" | "expiredate" => Ok(SortField::ExpireDate),
            "create" | "createdate" => Ok(SortField::CreateDate),
            other => Err(ExpensiveError::Validation(format!("Unknown sort field: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListType {
    #[default]
    All,
    Expiring,
    Expired,
}

impl FromStr for ListType {
    type Err = ExpensiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(ListType::All),
            "expiring" => Ok(ListType::Expiring),
            "expired" => Ok(ListType::Expired),
            other => Err(ExpensiveError::Validation(format!("Unknown list type: {}", other))),
        }
    }
}

/// Options for `namecheap.domains.getList`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub sort_by: SortField,
    pub descending: bool,
    pub search: Option<String>,
    pub list_type: ListType,
    pub page_size: Option<u32>,
    pub page: Option<u32>,
}

impl ListOptions {
    pub fn sort_param(&self) -> String {
        let field = match self.sort_by {
            SortField::Name => "NAME",
            SortField::ExpireDate => "EXPIREDATE",
            SortField::CreateDate => "CREATEDATE",
        };
        if self.descending {
            format!("{}_DESC", field)
        } else {
            field.to_string()
        }
    }

    pub fn list_type_param(&self) -> &'static str {
        match self.list_type {
            ListType::All => "ALL",
            ListType::Expiring => "EXPIRING",
            ListType::Expired => "EXPIRED",
        }
    }
}
