use anyhow::{bail, Context as _, Result};
use clap::Parser;
use expensive::auth::AuthRecovery;
use expensive::domains::{self, DEFAULT_ZONES};
use expensive::models::{DomainInfo, DomainListPage, ListOptions, ListType, SortField};
use expensive::prompt::{Prompter, StdinPrompter};
use expensive::register::{Registrar, RegistrationOutcome, RegistrationRequest};
use expensive::web::{Browser, CouponSource, HttpBrowser, WebCoupons};
use expensive::{Config, Context, ExpensiveError};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Check, price and register domains through the Namecheap API.
#[derive(Parser, Debug)]
#[command(name = "expensive", version, about)]
struct Cli {
    /// Domains to check. A word without a zone is tried in several zones.
    /// Without domains, the account's domains are listed.
    domains: Vec<String>,

    /// Show registration details of owned domains
    #[arg(short, long)]
    info: bool,

    /// Register the domain
    #[arg(short, long, conflicts_with = "info")]
    register: bool,

    /// Registration length in years
    #[arg(short, long)]
    years: Option<u32>,

    /// Promo code to apply when registering
    #[arg(long)]
    promo: Option<String>,

    /// Only print available domains
    #[arg(short, long)]
    free: bool,

    /// Zones for bare words, comma separated
    #[arg(short, long, value_delimiter = ',')]
    zones: Vec<String>,

    /// Add the configured client IP to the API whitelist
    #[arg(short = 'W', long)]
    whitelist_ip: bool,

    /// Use the sandbox API
    #[arg(long)]
    sandbox: bool,

    /// Print structured errors and debug logs
    #[arg(long)]
    debug: bool,

    /// Sort the domain list by name, expire or create
    #[arg(short, long, default_value = "name")]
    sort: String,

    /// Sort in descending order
    #[arg(short, long)]
    desc: bool,

    /// Only list domains matching this keyword
    #[arg(long)]
    filter: Option<String>,

    /// Domain list type: all, expiring or expired
    #[arg(short = 't', long = "type", default_value = "all")]
    list_type: String,

    /// Domains per page of the list
    #[arg(short, long)]
    page_size: Option<u32>,
}

impl Cli {
    fn list_options(&self) -> Result<ListOptions> {
        Ok(ListOptions {
            sort_by: self.sort.parse::<SortField>()?,
            descending: self.desc,
            search: self.filter.clone(),
            list_type: self.list_type.parse::<ListType>()?,
            page_size: self.page_size,
            page: None,
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let debug = cli.debug || std::env::var("EXPENSIVE_DEBUG").is_ok_and(|v| !v.is_empty());
    init_tracing(debug);

    match run(cli, debug).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err, debug);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(debug: bool) {
    let level = if debug { "expensive=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn report(err: &anyhow::Error, debug: bool) {
    eprintln!("{}", err);
    if !debug {
        return;
    }
    if let Some(api) = err.downcast_ref::<ExpensiveError>().and_then(ExpensiveError::api) {
        if let Some(description) = api.describe() {
            eprintln!("[{}] {}", api.number, description);
        }
        if let Ok(json) = serde_json::to_string_pretty(api) {
            eprintln!("{}", json);
        }
    }
    eprintln!("{:#?}", err);
}

async fn run(cli: Cli, debug: bool) -> Result<()> {
    let mut config = Config::load(cli.sandbox).context("could not load configuration")?;
    config.debug |= debug;
    let years = cli.years.unwrap_or(config.years);

    let ctx = Context::from_config(&config);
    let prompter: Arc<dyn Prompter> = Arc::new(StdinPrompter::new());
    let browser: Arc<dyn Browser> = Arc::new(HttpBrowser::new()?);
    let mut recovery = AuthRecovery::from_config(&config, prompter.clone(), browser);

    if cli.whitelist_ip {
        let ip = config.credentials.client_ip.clone();
        recovery.whitelist(&ip).await?;
        println!("Whitelisted {}", ip);
        return Ok(());
    }

    if cli.domains.is_empty() {
        if cli.register || cli.info {
            bail!("a domain name is required");
        }
        let options = cli.list_options()?;
        let page = recovery
            .run(|| domains::get_list(&ctx.client, &options))
            .await?;
        print_list(&page);
        return Ok(());
    }

    if cli.info {
        for domain in &cli.domains {
            let info = recovery
                .run(|| domains::get_info(&ctx.client, domain))
                .await?;
            print_info(&info);
        }
        return Ok(());
    }

    if cli.register {
        let [domain] = cli.domains.as_slice() else {
            bail!("register one domain at a time");
        };
        let coupons: Arc<dyn CouponSource> = Arc::new(WebCoupons::new(config.coupon_url()));
        let registrar = Registrar::new(&ctx, prompter, coupons);
        let request = RegistrationRequest {
            domain: domain.trim().to_ascii_lowercase(),
            years,
            promo: cli.promo.clone(),
        };

        match recovery.run(|| registrar.register(&request)).await? {
            RegistrationOutcome::Registered(result) => {
                if ctx.debug {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                }
            }
            RegistrationOutcome::Aborted(reason) => {
                println!("Registration of {} cancelled ({:?}).", request.domain, reason);
            }
        }
        return Ok(());
    }

    let zones: Vec<String> = if cli.zones.is_empty() {
        DEFAULT_ZONES.iter().map(|z| z.to_string()).collect()
    } else {
        cli.zones.clone()
    };
    let candidates = domains::expand_candidates(&cli.domains, &zones);
    if candidates.len() > 1 {
        println!("Checking {} domains: {}", candidates.len(), candidates.join(", "));
    }

    let results = recovery
        .run(|| domains::check(&ctx.client, &candidates))
        .await?;
    for result in results.iter().filter(|r| r.available || !cli.free) {
        let state = if result.available { "free" } else { "taken" };
        let premium = if result.is_premium_name { " (premium)" } else { "" };
        println!("{} is {}{}", result.domain, state, premium);
    }
    if results.len() > 1 {
        println!("{:.0}% are free", domains::percent_free(&results));
    }
    Ok(())
}

fn print_list(page: &DomainListPage) {
    if page.domains.is_empty() {
        println!("No domains.");
        return;
    }
    let width = page.domains.iter().map(|d| d.name.len()).max().unwrap_or(0);
    for domain in &page.domains {
        let mut flags = Vec::new();
        if domain.is_expired {
            flags.push("expired");
        }
        if domain.is_locked {
            flags.push("locked");
        }
        if domain.auto_renew {
            flags.push("auto-renew");
        }
        println!(
            "{:<width$}  expires {}  {}",
            domain.name,
            domain.expires,
            flags.join(", ")
        );
    }
    println!(
        "Page {} of {} domains ({} per page)",
        page.current_page, page.total_items, page.page_size
    );
}

fn print_info(info: &DomainInfo) {
    println!("{}", info.domain);
    println!("  Status:      {}", info.status);
    println!("  Owner:       {}", info.owner);
    println!("  Created:     {}", info.created);
    println!("  Expires:     {}", info.expires);
    if info.is_premium {
        println!("  Premium:     yes");
    }
    if let Some(enabled) = info.whois_guard {
        println!("  WhoisGuard:  {}", if enabled { "enabled" } else { "disabled" });
    }
    println!("  DNS:         {}", info.dns_provider);
    for ns in &info.nameservers {
        println!("    {}", ns);
    }
}
