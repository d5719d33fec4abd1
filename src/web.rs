//! Registrar website collaborators: a form-driving browser session for the
//! login/whitelist flow and the public coupon page.

use crate::error::{ExpensiveError, ExpensiveResult};
use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, Url};
use std::sync::LazyLock;

static FORM_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<form\b([^>]*)>(.*?)</form\s*>").expect("valid form regex")
});

static INPUT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<input\b[^>]*>").expect("valid input regex"));

static TAG_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z][a-z0-9_:-]*)\s*=\s*["']([^"']*)["']"#).expect("valid attribute regex")
});

static COUPON_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)class\s*=\s*["'][^"']*(?:coupon|promo)-?code[^"']*["'][^>]*>\s*([A-Z0-9]{4,20})\s*<"#)
        .expect("valid coupon regex")
});

/// A page with a form that can be filled in and submitted.
#[async_trait]
pub trait BrowserSession: Send {
    fn url(&self) -> &str;

    /// Whether the current page has an input named `name`.
    fn has_field(&self, name: &str) -> bool;

    fn fill(&mut self, name: &str, value: &str);

    /// Submit the current form and load the resulting page.
    async fn submit(&mut self) -> ExpensiveResult<()>;

    async fn goto(&mut self, url: &str) -> ExpensiveResult<()>;
}

/// Opens browser sessions.
#[async_trait]
pub trait Browser: Send + Sync {
    async fn open(&self, url: &str) -> ExpensiveResult<Box<dyn BrowserSession>>;
}

/// Browser over plain HTTP with a cookie jar.
#[derive(Clone)]
pub struct HttpBrowser {
    client: Client,
}

impl HttpBrowser {
    pub fn new() -> ExpensiveResult<Self> {
        let client = Client::builder().cookie_store(true).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Browser for HttpBrowser {
    async fn open(&self, url: &str) -> ExpensiveResult<Box<dyn BrowserSession>> {
        let mut session = HttpSession {
            client: self.client.clone(),
            url: url.to_string(),
            page: Page::default(),
        };
        session.goto(url).await?;
        Ok(Box::new(session))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form {
    pub action: Option<String>,
    pub fields: Vec<(String, String)>,
}

impl Form {
    /// First form of `html`: its action and the pre-filled inputs.
    pub fn parse(html: &str) -> Self {
        Self::parse_all(html).into_iter().next().unwrap_or_default()
    }

    /// Every form of `html`, in document order. Inputs belong to the form enclosing them.
    pub fn parse_all(html: &str) -> Vec<Self> {
        FORM_BLOCK
            .captures_iter(html)
            .map(|form| {
                let action = TAG_ATTR
                    .captures_iter(&form[1])
                    .find(|attr| attr[1].eq_ignore_ascii_case("action"))
                    .map(|attr| decode_entities(&attr[2]));
                Self {
                    action,
                    fields: parse_inputs(&form[2]),
                }
            })
            .collect()
    }

    pub fn set(&mut self, name: &str, value: &str) {
        match self.fields.iter_mut().find(|(k, _)| k == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.fields.push((name.to_string(), value.to_string())),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == name)
    }
}

fn parse_inputs(html: &str) -> Vec<(String, String)> {
    INPUT_TAG
        .find_iter(html)
        .filter_map(|tag| {
            let mut name = None;
            let mut value = String::new();
            for attr in TAG_ATTR.captures_iter(tag.as_str()) {
                match attr[1].to_ascii_lowercase().as_str() {
                    "name" => name = Some(attr[2].to_string()),
                    "value" => value = decode_entities(&attr[2]),
                    _ => {}
                }
            }
            name.map(|name| (name, value))
        })
        .collect()
}

/// Forms of the current page. The first filled field picks the form that gets submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    forms: Vec<Form>,
    active: Option<usize>,
}

impl Page {
    pub fn parse(html: &str) -> Self {
        Self {
            forms: Form::parse_all(html),
            active: None,
        }
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.forms.iter().any(|form| form.has(name))
    }

    pub fn fill(&mut self, name: &str, value: &str) {
        let index = match self.active {
            Some(index) => index,
            None => {
                if self.forms.is_empty() {
                    self.forms.push(Form::default());
                }
                self.forms.iter().position(|form| form.has(name)).unwrap_or(0)
            }
        };
        self.active = Some(index);
        self.forms[index].set(name, value);
    }

    /// The form to submit.
    pub fn form(&self) -> Option<&Form> {
        self.active
            .and_then(|index| self.forms.get(index))
            .or_else(|| self.forms.first())
    }
}

fn decode_entities(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

struct HttpSession {
    client: Client,
    url: String,
    page: Page,
}

impl HttpSession {
    async fn load(&mut self, response: reqwest::Response) -> ExpensiveResult<()> {
        let status = response.status();
        self.url = response.url().to_string();
        if !status.is_success() {
            return Err(ExpensiveError::AuthRecovery(format!(
                "{} answered HTTP {}",
                self.url, status
            )));
        }
        let body = response.text().await?;
        self.page = Page::parse(&body);
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for HttpSession {
    fn url(&self) -> &str {
        &self.url
    }

    fn has_field(&self, name: &str) -> bool {
        self.page.has_field(name)
    }

    fn fill(&mut self, name: &str, value: &str) {
        self.page.fill(name, value);
    }

    async fn submit(&mut self) -> ExpensiveResult<()> {
        let base = Url::parse(&self.url)
            .map_err(|e| ExpensiveError::AuthRecovery(format!("bad page URL {}: {}", self.url, e)))?;
        let form = self
            .page
            .form()
            .cloned()
            .ok_or_else(|| ExpensiveError::AuthRecovery(format!("no form on {}", self.url)))?;
        let action = match form.action.as_deref() {
            Some(action) if !action.is_empty() => base.join(action).map_err(|e| {
                ExpensiveError::AuthRecovery(format!("bad form action {}: {}", action, e))
            })?,
            _ => base,
        };

        tracing::debug!(%action, "Submitting form");
        let response = self
            .client
            .post(action)
            .form(&form.fields)
            .send()
            .await?;
        self.load(response).await
    }

    async fn goto(&mut self, url: &str) -> ExpensiveResult<()> {
        tracing::debug!(url, "Opening page");
        let response = self.client.get(url).send().await?;
        self.load(response).await
    }
}

/// Where promo coupons come from.
#[async_trait]
pub trait CouponSource: Send + Sync {
    async fn coupon(&self) -> ExpensiveResult<Option<String>>;
}

/// Reads the registrar's public coupon page.
#[derive(Clone)]
pub struct WebCoupons {
    client: Client,
    url: String,
}

impl WebCoupons {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl CouponSource for WebCoupons {
    async fn coupon(&self) -> ExpensiveResult<Option<String>> {
        tracing::debug!(url = %self.url, "Checking coupon online");
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(ExpensiveError::Transport(format!(
                "coupon page answered HTTP {}",
                response.status()
            )));
        }
        Ok(extract_coupon(&response.text().await?))
    }
}

/// First coupon code on a promotions page.
pub fn extract_coupon(html: &str) -> Option<String> {
    COUPON_CODE.captures(html).map(|c| c[1].to_string())
}
