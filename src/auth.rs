//! Recovery from "invalid request IP" failures.
//!
//! The registrar rejects every call from an IP that is not on the account's
//! API whitelist. When that happens the operator's password is read while a
//! browser session opens the login page; the session then signs in, adds the
//! rejected IP to the whitelist, and the original command is retried once.

use crate::config::Config;
use crate::error::{ExpensiveError, ExpensiveResult, INVALID_REQUEST_IP};
use crate::prompt::Prompter;
use crate::web::{Browser, BrowserSession};
use regex::Regex;
use std::future::Future;
use std::sync::{Arc, LazyLock};

static REQUEST_IP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Invalid request IP: (\S+)").expect("valid request IP regex"));

pub const LOGIN_USER_FIELD: &str = "LoginUserName";
pub const LOGIN_PASSWORD_FIELD: &str = "LoginPassword";
pub const WHITELIST_IP_FIELD: &str = "IpAddress";
pub const WHITELIST_NAME_FIELD: &str = "Name";

/// Label stored next to whitelisted IPs.
const WHITELIST_LABEL: &str = "expensive";

/// IP address embedded in an invalid-request-IP message.
pub fn extract_ip(message: &str) -> ExpensiveResult<String> {
    REQUEST_IP
        .captures(message)
        .map(|c| c[1].to_string())
        .ok_or_else(|| {
            ExpensiveError::Parse(format!(
                "Could not extract IP from the error message: {}",
                message
            ))
        })
}

/// How a failed command should be handled.
#[derive(Debug)]
pub enum Failure {
    /// The IP is not whitelisted; whitelist it and retry.
    Recoverable { ip: String },
    Fatal(ExpensiveError),
}

pub fn classify(err: ExpensiveError) -> Failure {
    match err.api() {
        Some(api) if api.number == INVALID_REQUEST_IP => match extract_ip(&api.message) {
            Ok(ip) => Failure::Recoverable { ip },
            Err(parse) => Failure::Fatal(parse),
        },
        _ => Failure::Fatal(err),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    Idle,
    Recovering,
}

pub struct AuthRecovery {
    user: String,
    login_url: String,
    whitelist_url: String,
    prompter: Arc<dyn Prompter>,
    browser: Arc<dyn Browser>,
    state: RecoveryState,
}

impl AuthRecovery {
    pub fn new(
        user: impl Into<String>,
        login_url: impl Into<String>,
        whitelist_url: impl Into<String>,
        prompter: Arc<dyn Prompter>,
        browser: Arc<dyn Browser>,
    ) -> Self {
        Self {
            user: user.into(),
            login_url: login_url.into(),
            whitelist_url: whitelist_url.into(),
            prompter,
            browser,
            state: RecoveryState::Idle,
        }
    }

    pub fn from_config(config: &Config, prompter: Arc<dyn Prompter>, browser: Arc<dyn Browser>) -> Self {
        Self::new(
            config.credentials.user_name.clone(),
            config.login_url(),
            config.whitelist_url(),
            prompter,
            browser,
        )
    }

    pub fn state(&self) -> RecoveryState {
        self.state
    }

    /// Run `op`; after an invalid-IP failure whitelist the IP and run it exactly once more.
    pub async fn run<T, F, Fut>(&mut self, mut op: F) -> ExpensiveResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ExpensiveResult<T>>,
    {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        match classify(err) {
            Failure::Fatal(err) => Err(err),
            Failure::Recoverable { ip } => {
                self.whitelist(&ip).await?;
                tracing::info!(%ip, "IP whitelisted, retrying command");
                op().await
            }
        }
    }

    /// Sign in through the browser and add `ip` to the API whitelist.
    pub async fn whitelist(&mut self, ip: &str) -> ExpensiveResult<()> {
        self.state = RecoveryState::Recovering;
        let outcome = self.sign_in_and_whitelist(ip).await;
        self.state = RecoveryState::Idle;

        outcome.map_err(|err| match err {
            ExpensiveError::AuthRecovery(_) => err,
            other => ExpensiveError::AuthRecovery(other.to_string()),
        })
    }

    async fn sign_in_and_whitelist(&self, ip: &str) -> ExpensiveResult<()> {
        let question = format!("Enter password to white-list {}", ip);
        let (password, mut session) = futures::try_join!(
            self.prompter.ask_secret(&question),
            self.browser.open(&self.login_url),
        )?;

        self.sign_in(session.as_mut(), &password).await?;

        session.goto(&self.whitelist_url).await?;
        if !session.has_field(WHITELIST_IP_FIELD) {
            return Err(ExpensiveError::AuthRecovery(format!(
                "no whitelist form at {}",
                session.url()
            )));
        }
        session.fill(WHITELIST_NAME_FIELD, WHITELIST_LABEL);
        session.fill(WHITELIST_IP_FIELD, ip);
        session.submit().await?;

        if session.has_field(LOGIN_PASSWORD_FIELD) {
            return Err(ExpensiveError::AuthRecovery(format!(
                "signed out before {} was whitelisted",
                ip
            )));
        }

        tracing::debug!(ip, url = session.url(), "Whitelist request submitted");
        Ok(())
    }

    async fn sign_in(&self, session: &mut dyn BrowserSession, password: &str) -> ExpensiveResult<()> {
        if password.is_empty() {
            return Err(ExpensiveError::AuthRecovery("no password given".to_string()));
        }
        session.fill(LOGIN_USER_FIELD, &self.user);
        session.fill(LOGIN_PASSWORD_FIELD, password);
        session.submit().await?;

        // The login form comes back when the password is rejected.
        if session.has_field(LOGIN_PASSWORD_FIELD) {
            return Err(ExpensiveError::AuthRecovery(format!(
                "could not sign in as {}",
                self.user
            )));
        }
        Ok(())
    }
}
