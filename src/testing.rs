//! Stubs shared by the unit tests.

use crate::error::ExpensiveResult;
use crate::prompt::Prompter;
use crate::web::{Browser, BrowserSession};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Answers confirmations from a queue, falling back to the question's default.
#[derive(Default)]
pub struct ScriptedPrompter {
    pub confirms: Mutex<VecDeque<bool>>,
    pub secret: String,
    pub asked: Mutex<Vec<String>>,
    pub shown: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new(confirms: &[bool], secret: &str) -> Self {
        Self {
            confirms: Mutex::new(confirms.iter().copied().collect()),
            secret: secret.to_string(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn confirm(&self, question: &str, default: bool) -> ExpensiveResult<bool> {
        self.asked.lock().unwrap().push(question.to_string());
        Ok(self.confirms.lock().unwrap().pop_front().unwrap_or(default))
    }

    async fn ask(&self, question: &str) -> ExpensiveResult<String> {
        self.asked.lock().unwrap().push(question.to_string());
        Ok(self.secret.clone())
    }

    async fn show(&self, message: &str) -> ExpensiveResult<()> {
        self.shown.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

/// Browser whose login page accepts one password.
pub struct FakeBrowser {
    pub password: String,
    pub whitelist_form: bool,
    pub events: Arc<Mutex<Vec<String>>>,
}

impl FakeBrowser {
    pub fn new(password: &str) -> Self {
        Self {
            password: password.to_string(),
            whitelist_form: true,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The whitelist page shows something other than its form, e.g. a 2FA step.
    pub fn without_whitelist_form(mut self) -> Self {
        self.whitelist_form = false;
        self
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn open(&self, url: &str) -> ExpensiveResult<Box<dyn BrowserSession>> {
        self.events.lock().unwrap().push(format!("open {}", url));
        Ok(Box::new(FakeSession {
            url: url.to_string(),
            password: self.password.clone(),
            whitelist_form: self.whitelist_form,
            typed: Vec::new(),
            logged_in: false,
            events: self.events.clone(),
        }))
    }
}

struct FakeSession {
    url: String,
    password: String,
    whitelist_form: bool,
    typed: Vec<(String, String)>,
    logged_in: bool,
    events: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl BrowserSession for FakeSession {
    fn url(&self) -> &str {
        &self.url
    }

    fn has_field(&self, name: &str) -> bool {
        match name {
            "LoginPassword" => !self.logged_in,
            "Name" | "IpAddress" => {
                self.logged_in && self.whitelist_form && self.url.contains("whitelist")
            }
            _ => false,
        }
    }

    fn fill(&mut self, name: &str, value: &str) {
        self.typed.push((name.to_string(), value.to_string()));
    }

    async fn submit(&mut self) -> ExpensiveResult<()> {
        let typed = std::mem::take(&mut self.typed);
        if let Some((_, password)) = typed.iter().find(|(k, _)| k == "LoginPassword") {
            self.logged_in = *password == self.password;
        }
        let fields: Vec<_> = typed
            .iter()
            .filter(|(k, _)| k != "LoginPassword")
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        self.events
            .lock()
            .unwrap()
            .push(format!("submit {} [{}]", self.url, fields.join(",")));
        Ok(())
    }

    async fn goto(&mut self, url: &str) -> ExpensiveResult<()> {
        self.url = url.to_string();
        self.events.lock().unwrap().push(format!("goto {}", url));
        Ok(())
    }
}
