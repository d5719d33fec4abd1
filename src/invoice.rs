use crate::models::{DomainCheckResult, PriceQuote};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::fmt;

/// One row of the price breakdown shown before registering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceLine {
    pub label: String,
    pub amount: Decimal,
    /// Informational rows (renewal, transfer, couponless) are not charged now.
    pub chargeable: bool,
}

impl InvoiceLine {
    fn charged(label: &str, amount: Decimal) -> Self {
        Self {
            label: label.to_string(),
            amount,
            chargeable: true,
        }
    }

    fn info(label: &str, amount: Decimal) -> Self {
        Self {
            label: label.to_string(),
            amount,
            chargeable: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invoice {
    pub lines: Vec<InvoiceLine>,
    pub currency: String,
}

impl Invoice {
    pub fn compose(check: &DomainCheckResult, quote: &PriceQuote) -> Self {
        let mut lines = Vec::new();

        if check.is_premium_name {
            lines.push(InvoiceLine::charged(
                "Premium Registration Price",
                check.premium_registration_price,
            ));
            lines.push(InvoiceLine::info("Premium Renewal Price", check.premium_renewal_price));
            lines.push(InvoiceLine::info("Premium Transfer Price", check.premium_transfer_price));
        }
        if !check.eap_fee.is_zero() {
            lines.push(InvoiceLine::charged("Eap Fee", check.eap_fee));
        }
        if !check.icann_fee.is_zero() {
            lines.push(InvoiceLine::charged("Icann Fee", check.icann_fee));
        }
        if !quote.additional_cost.is_zero() {
            lines.push(InvoiceLine::charged("Additional Cost", quote.additional_cost));
        }

        lines.push(InvoiceLine::charged("Price", quote.price));
        if let (Some(_), Some(couponless)) = (&quote.promo_code, quote.couponless_price) {
            lines.push(InvoiceLine::info("Without Promo", couponless));
        }

        Self {
            lines,
            currency: quote.currency.clone(),
        }
    }

    /// Sum of the chargeable rows, unrounded.
    pub fn total(&self) -> Decimal {
        self.lines
            .iter()
            .filter(|line| line.chargeable)
            .map(|line| line.amount)
            .sum()
    }
}

/// Two decimal places, half away from zero.
pub fn money(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

impl fmt::Display for Invoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = format!("{} {}", money(self.total()), self.currency);
        let width = self
            .lines
            .iter()
            .map(|line| line.label.len())
            .max()
            .unwrap_or(0)
            .max("Total".len());

        for line in &self.lines {
            let marker = if line.chargeable { "" } else { "  (not charged now)" };
            writeln!(f, "{:<width$}  {}{}", line.label, money(line.amount), marker)?;
        }
        writeln!(f, "{:<width$}  {}", "-----", "-".repeat(total.len()))?;
        write!(f, "{:<width$}  {}", "Total", total)
    }
}
