use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub type ExpensiveResult<T> = Result<T, ExpensiveError>;

/// Registrar error code returned when the caller's IP is not whitelisted.
pub const INVALID_REQUEST_IP: u32 = 1011150;
/// Registrar rejects a premium registration that also carries an EAP fee.
pub const PREMIUM_WITH_EAP: u32 = 2515610;
/// Seen after resubmitting a premium registration.
pub const DUPLICATE_PREMIUM: u32 = 3028166;

#[derive(Error, Debug)]
pub enum ExpensiveError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("{0}")]
    Api(ApiError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IP whitelisting failed: {0}")]
    AuthRecovery(String),

    #[error("Domain {0} is not available.")]
    DomainUnavailable(String),

    #[error("Could not find the default address.")]
    NoDefaultAddress,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Terminal error: {0}")]
    Terminal(String),
}

impl ExpensiveError {
    /// The registrar-reported error, if this is one.
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            ExpensiveError::Api(err) => Some(err),
            _ => None,
        }
    }
}

/// An `<Error Number="...">message</Error>` node from a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub number: u32,
    pub message: String,

    /// Known-bug context attached by the registration flow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ApiError {
    pub fn new(number: u32, message: impl Into<String>) -> Self {
        Self {
            number,
            message: message.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Short description of a well-known code, for the debug channel.
    pub fn describe(&self) -> Option<&'static str> {
        describe_code(self.number)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (error {})", self.message, self.number)?;
        if let Some(hint) = &self.hint {
            write!(f, "\n[!] {}", hint)?;
        }
        Ok(())
    }
}

pub fn describe_code(number: u32) -> Option<&'static str> {
    match number {
        INVALID_REQUEST_IP => Some("Parameter RequestIP is invalid"),
        PREMIUM_WITH_EAP => Some("Premium registration rejected together with EAP fee"),
        DUPLICATE_PREMIUM => Some("Premium registration already submitted"),
        1011102 => Some("Parameter APIKey is invalid"),
        2019166 => Some("Domain not found"),
        2030280 => Some("TLD is not supported in API"),
        3031510 => Some("Error response from Enom"),
        4019337 => Some("Unable to retrieve domain pricing"),
        _ => None,
    }
}

impl From<ApiError> for ExpensiveError {
    fn from(err: ApiError) -> Self {
        ExpensiveError::Api(err)
    }
}

impl From<reqwest::Error> for ExpensiveError {
    fn from(err: reqwest::Error) -> Self {
        ExpensiveError::Transport(err.to_string())
    }
}
