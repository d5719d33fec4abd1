//! Domain registration workflow.
//!
//! Each step runs only when the previous one succeeded: availability check,
//! promo negotiation, price breakdown, premium and EAP confirmations, default
//! address lookup, final confirmation and finally `namecheap.domains.create`.
//! Nothing that costs money happens before the operator agreed to the address.

use crate::address;
use crate::client::{ApiClient, Context};
use crate::domains;
use crate::error::{
    ApiError, ExpensiveError, ExpensiveResult, DUPLICATE_PREMIUM, PREMIUM_WITH_EAP,
};
use crate::invoice::{money, Invoice};
use crate::models::{CreateRequest, DomainCheckResult, PremiumOverride, RegistrationResult};
use crate::pricing::{decide_promo, promo_warning, zone_of, PricingResolver, PromoDecision};
use crate::prompt::Prompter;
use crate::web::CouponSource;
use serde::Serialize;
use std::sync::Arc;

const NO_FREE_CONNECTIONS: &str = "No free connections to registry.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRequest {
    pub domain: String,
    pub years: u32,
    /// Explicit promo code; when absent a public coupon may be offered.
    pub promo: Option<String>,
}

impl RegistrationRequest {
    pub fn new(domain: impl Into<String>, years: u32) -> Self {
        Self {
            domain: domain.into(),
            years,
            promo: None,
        }
    }

    pub fn with_promo(mut self, promo: impl Into<String>) -> Self {
        self.promo = Some(promo.into());
        self
    }
}

/// Which confirmation the operator declined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AbortReason {
    PremiumPrice,
    EapFee,
    Address,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RegistrationOutcome {
    Registered(RegistrationResult),
    /// The operator said no. Nothing was charged.
    Aborted(AbortReason),
}

/// Attach known-issue context to a failed `create`.
pub fn annotate_create_error(err: ExpensiveError) -> ExpensiveError {
    match err {
        ExpensiveError::Api(api) => match known_issue(&api) {
            Some(hint) => ExpensiveError::Api(api.with_hint(hint)),
            None => ExpensiveError::Api(api),
        },
        other => other,
    }
}

fn known_issue(err: &ApiError) -> Option<&'static str> {
    if err.number == PREMIUM_WITH_EAP {
        Some("Bug: cannot register a premium name together with an EAP fee.")
    } else if err.message.contains(NO_FREE_CONNECTIONS) {
        Some("The registry is busy. Please try again.")
    } else if err.number == DUPLICATE_PREMIUM {
        Some("Possible bug, e.g. after resending a premium registration without the EAP fee.")
    } else {
        None
    }
}

pub struct Registrar {
    client: ApiClient,
    pricing: PricingResolver,
    prompter: Arc<dyn Prompter>,
    coupons: Arc<dyn CouponSource>,
}

impl Registrar {
    pub fn new(ctx: &Context, prompter: Arc<dyn Prompter>, coupons: Arc<dyn CouponSource>) -> Self {
        Self {
            client: ctx.client.clone(),
            pricing: PricingResolver::new(ctx.client.clone()),
            prompter,
            coupons,
        }
    }

    pub async fn register(&self, request: &RegistrationRequest) -> ExpensiveResult<RegistrationOutcome> {
        let check = self.availability(&request.domain).await?;
        let zone = zone_of(&request.domain)?;
        let promo = self.negotiate_promo(request.promo.as_deref(), zone).await?;

        let quote = self
            .pricing
            .quote(&request.domain, request.years, promo.as_deref())
            .await?;
        let invoice = Invoice::compose(&check, &quote);
        self.prompter.show(&format!("\n{}", invoice)).await?;
        if let Some(warning) = promo_warning(&quote) {
            self.prompter.show(&warning).await?;
        }

        if let Some(reason) = self.confirm_surcharges(&check).await? {
            return Ok(RegistrationOutcome::Aborted(reason));
        }

        let address = address::get_default(&self.client).await?;
        self.prompter
            .show(&format!("Registering {} using:\n{}", request.domain, address))
            .await?;
        if !self.prompter.confirm("OK?", false).await? {
            tracing::info!(domain = %request.domain, "Registration declined at address confirmation");
            return Ok(RegistrationOutcome::Aborted(AbortReason::Address));
        }

        let create = CreateRequest {
            domain: request.domain.clone(),
            years: request.years,
            address,
            promo,
            premium: check.is_premium_name.then(|| PremiumOverride {
                premium_price: check.premium_registration_price,
                eap_fee: check.eap_fee,
            }),
        };
        let result = domains::create(&self.client, &create)
            .await
            .map_err(annotate_create_error)?;

        self.prompter
            .show(&format!(
                "Successfully registered {}! Charged amount: ${}.",
                result.domain,
                money(result.charged_amount)
            ))
            .await?;
        Ok(RegistrationOutcome::Registered(result))
    }

    async fn availability(&self, domain: &str) -> ExpensiveResult<DomainCheckResult> {
        let check = domains::check(&self.client, &[domain])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ExpensiveError::Parse(format!("no check result for {}", domain)))?;

        if !check.available {
            return Err(ExpensiveError::DomainUnavailable(domain.to_string()));
        }
        Ok(check)
    }

    async fn negotiate_promo(&self, explicit: Option<&str>, zone: &str) -> ExpensiveResult<Option<String>> {
        match decide_promo(explicit, zone) {
            PromoDecision::Explicit(code) => {
                self.prompter.show(&format!("Using promo {}", code)).await?;
                Ok(Some(code))
            }
            PromoDecision::NoPromo => Ok(None),
            PromoDecision::LookUpCoupon => {
                let coupon = match self.coupons.coupon().await {
                    Ok(Some(coupon)) => coupon,
                    Ok(None) => return Ok(None),
                    Err(err) => {
                        tracing::debug!(zone, "Could not retrieve promo: {}", err);
                        return Ok(None);
                    }
                };
                let apply = self
                    .prompter
                    .confirm(&format!("Apply coupon {}?", coupon), true)
                    .await?;
                Ok(apply.then_some(coupon))
            }
        }
    }

    async fn confirm_surcharges(&self, check: &DomainCheckResult) -> ExpensiveResult<Option<AbortReason>> {
        if check.is_premium_name {
            let question = format!(
                "Continue with the premium registration price of {}?",
                money(check.premium_registration_price)
            );
            if !self.prompter.confirm(&question, false).await? {
                return Ok(Some(AbortReason::PremiumPrice));
            }
        }
        if !check.eap_fee.is_zero() {
            let question = format!("Continue with the early access fee of {}?", money(check.eap_fee));
            if !self.prompter.confirm(&question, false).await? {
                return Ok(Some(AbortReason::EapFee));
            }
        }
        Ok(None)
    }
}
