//! Read-only configuration: credentials file plus environment overrides.

use crate::error::{ExpensiveError, ExpensiveResult};
use crate::models::Network;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "expensive";
const CONFIG_FILE_NAME: &str = "config.toml";
const SANDBOX_FILE_NAME: &str = "sandbox.toml";

/// Fixed credential fields sent with every API request.
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    #[serde(default)]
    pub api_user: String,
    #[serde(default)]
    pub api_key: String,
    /// Defaults to `api_user` when empty.
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub client_ip: String,
}

impl Credentials {
    pub fn new(
        api_user: impl Into<String>,
        api_key: impl Into<String>,
        client_ip: impl Into<String>,
    ) -> Self {
        let api_user = api_user.into();
        Self {
            user_name: api_user.clone(),
            api_user,
            api_key: api_key.into(),
            client_ip: client_ip.into(),
        }
    }

    /// Request parameters in the order the registrar documents them.
    pub fn params(&self) -> Vec<(String, String)> {
        vec![
            ("ApiUser".to_string(), self.api_user.clone()),
            ("ApiKey".to_string(), self.api_key.clone()),
            ("UserName".to_string(), self.user_name.clone()),
            ("ClientIp".to_string(), self.client_ip.clone()),
        ]
    }

    fn validate(&mut self) -> ExpensiveResult<()> {
        if self.user_name.is_empty() {
            self.user_name = self.api_user.clone();
        }
        let missing: Vec<&str> = [
            ("api_user", &self.api_user),
            ("api_key", &self.api_key),
            ("client_ip", &self.client_ip),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(key, _)| key)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ExpensiveError::Config(format!(
                "missing credential fields: {}",
                missing.join(", ")
            )))
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_user", &self.api_user)
            .field("api_key", &"<redacted>")
            .field("user_name", &self.user_name)
            .field("client_ip", &self.client_ip)
            .finish()
    }
}

/// Overrides for the registrar website endpoints.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct WebConfig {
    pub login_url: Option<String>,
    pub whitelist_url: Option<String>,
    pub coupon_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub sandbox: bool,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_years")]
    pub years: u32,
    #[serde(default)]
    pub web: WebConfig,
}

fn default_years() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            sandbox: false,
            debug: false,
            years: default_years(),
            web: WebConfig::default(),
        }
    }
}

impl Config {
    pub fn network(&self) -> Network {
        Network::from_sandbox_flag(self.sandbox)
    }

    pub fn login_url(&self) -> String {
        self.web
            .login_url
            .clone()
            .unwrap_or_else(|| format!("{}/myaccount/login.aspx", self.network().web_url()))
    }

    pub fn whitelist_url(&self) -> String {
        self.web.whitelist_url.clone().unwrap_or_else(|| {
            format!("{}/settings/tools/apiaccess/whitelisted-ips", self.network().web_url())
        })
    }

    pub fn coupon_url(&self) -> String {
        self.web
            .coupon_url
            .clone()
            .unwrap_or_else(|| format!("{}/promos/coupons/", self.network().web_url()))
    }

    /// Default location: `<config dir>/expensive/{config,sandbox}.toml`.
    pub fn default_path(sandbox: bool) -> ExpensiveResult<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| ExpensiveError::Config("no configuration directory".to_string()))?;
        let file = if sandbox { SANDBOX_FILE_NAME } else { CONFIG_FILE_NAME };
        Ok(base.join(APP_DIR).join(file))
    }

    pub fn from_toml(text: &str) -> ExpensiveResult<Self> {
        toml::from_str(text).map_err(|e| ExpensiveError::Config(e.to_string()))
    }

    /// Read `path` if it exists; a missing file yields defaults.
    pub fn read(path: &Path) -> ExpensiveResult<Self> {
        if !path.exists() {
            tracing::debug!("No config file at {}", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            ExpensiveError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Apply `EXPENSIVE_*` and `SANDBOX` overrides from `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |target: &mut String, key: &str| {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *target = value;
            }
        };
        set(&mut self.credentials.api_user, "EXPENSIVE_API_USER");
        set(&mut self.credentials.api_key, "EXPENSIVE_API_KEY");
        set(&mut self.credentials.user_name, "EXPENSIVE_USER_NAME");
        set(&mut self.credentials.client_ip, "EXPENSIVE_CLIENT_IP");

        if sandbox_requested(&lookup) {
            self.sandbox = true;
        }
        if lookup("EXPENSIVE_DEBUG").is_some_and(|v| !v.is_empty()) {
            self.debug = true;
        }
    }

    /// Load the configuration for this invocation and check the credentials.
    pub fn load(sandbox: bool) -> ExpensiveResult<Self> {
        let env = |key: &str| std::env::var(key).ok();
        let sandbox = sandbox || sandbox_requested(&env);
        let path = Self::default_path(sandbox)?;
        let mut config = Self::read(&path)?;
        config.sandbox |= sandbox;
        config.apply_env(env);
        config.finish()
    }

    /// Validate and fill derived fields.
    pub fn finish(mut self) -> ExpensiveResult<Self> {
        self.credentials.validate()?;
        if self.years == 0 {
            return Err(ExpensiveError::Config("years must be at least 1".to_string()));
        }
        Ok(self)
    }
}

/// `SANDBOX` selects the sandbox only when set to a non-empty value.
fn sandbox_requested<F>(lookup: &F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup("SANDBOX").is_some_and(|v| !v.is_empty())
}
