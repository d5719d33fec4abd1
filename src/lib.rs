//! # expensive
//!
//! A client for the Namecheap XML API: availability checks, domain lists and
//! info, pricing with promo codes, and an interactive registration workflow.
//!
//! ## Quick Start
//!
//! ```no_run
//! use expensive::{domains, ApiClient, Credentials, Network};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let credentials = Credentials::new("alice", "api-key", "203.0.113.7");
//!     let client = ApiClient::new(credentials, Network::Sandbox);
//!
//!     for result in domains::check(&client, &["example.com", "example.io"]).await? {
//!         println!("{}: {}", result.domain, if result.available { "free" } else { "taken" });
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod address;
pub mod auth;
pub mod client;
pub mod config;
pub mod domains;
pub mod error;
pub mod invoice;
pub mod models;
pub mod parser;
pub mod pricing;
pub mod prompt;
pub mod register;
pub mod web;

#[cfg(test)]
mod testing;

// Re-exports
pub use auth::AuthRecovery;
pub use client::{ApiClient, Context, HttpTransport, Transport};
pub use config::{Config, Credentials};
pub use error::{ApiError, ExpensiveError, ExpensiveResult};
pub use invoice::Invoice;
pub use models::{DomainCheckResult, ListOptions, Network, PriceQuote, RegistrationResult};
pub use parser::{extract_tag, TagNode};
pub use pricing::PricingResolver;
pub use register::{Registrar, RegistrationOutcome, RegistrationRequest};
