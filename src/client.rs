use crate::config::{Config, Credentials};
use crate::error::{ApiError, ExpensiveError, ExpensiveResult};
use crate::parser::TagNode;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;

pub use crate::models::Network;

/// Issues one request to the registrar endpoint and returns the raw body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, params: &[(String, String)]) -> ExpensiveResult<String>;
}

/// reqwest-backed transport
#[derive(Clone, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, params: &[(String, String)]) -> ExpensiveResult<String> {
        let response = self.client.get(url).query(params).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() && body.trim().is_empty() {
            return Err(ExpensiveError::Transport(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            tracing::debug!("HTTP {} with a body, parsing it anyway", status);
        }

        Ok(body)
    }
}

/// Registrar XML API client
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    credentials: Credentials,
    api_url: String,
    network: Network,
}

impl ApiClient {
    /// Create a new client over HTTP
    pub fn new(credentials: Credentials, network: Network) -> Self {
        Self::with_transport(credentials, network, Arc::new(HttpTransport::new()))
    }

    /// Create with a custom transport
    pub fn with_transport(
        credentials: Credentials,
        network: Network,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            transport,
            credentials,
            api_url: network.api_url().to_string(),
            network,
        }
    }

    /// Point the client at a different endpoint
    pub fn with_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Run `command` and return the parsed response, or the first registrar error.
    pub async fn query<I, K, V>(&self, command: &str, params: I) -> ExpensiveResult<TagNode>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut request = self.credentials.params();
        request.push(("Command".to_string(), command.to_string()));
        request.extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));

        tracing::debug!(command, network = ?self.network, "Querying registrar");

        let body = self.transport.get(&self.api_url, &request).await?;
        let root = TagNode::parse(&body)?;

        let failed = root
            .attr("Status")
            .is_some_and(|status| status.eq_ignore_ascii_case("ERROR"));
        if !failed {
            return Ok(root);
        }

        let mut errors = api_errors(&root).into_iter();
        let primary = errors
            .next()
            .unwrap_or_else(|| ApiError::new(0, "Registrar reported an error without details"));
        for extra in errors {
            tracing::debug!(command, number = extra.number, "Additional error: {}", extra.message);
        }

        tracing::debug!(command, number = primary.number, "Registrar error: {}", primary.message);
        Err(ExpensiveError::Api(primary))
    }
}

/// Every `Errors/Error` node of a response, in document order.
pub fn api_errors(root: &TagNode) -> Vec<ApiError> {
    root.extract("Errors")
        .into_iter()
        .flat_map(|errors| errors.extract("Error"))
        .map(|node| {
            let number = node
                .attr("Number")
                .and_then(|n| n.trim().parse().ok())
                .unwrap_or(0);
            ApiError::new(number, node.text().trim())
        })
        .collect()
}

/// Per-invocation context passed to every operation.
#[derive(Clone)]
pub struct Context {
    pub client: ApiClient,
    pub debug: bool,
}

impl Context {
    pub fn new(client: ApiClient, debug: bool) -> Self {
        Self { client, debug }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            ApiClient::new(config.credentials.clone(), config.network()),
            config.debug,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        body: String,
        seen: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    #[async_trait]
    impl Transport for Recorder {
        async fn get(&self, url: &str, params: &[(String, String)]) -> ExpensiveResult<String> {
            self.seen
                .lock()
                .unwrap()
                .push((url.to_string(), params.to_vec()));
            Ok(self.body.clone())
        }
    }

    fn client(body: &str) -> (ApiClient, Arc<Recorder>) {
        let recorder = Arc::new(Recorder {
            body: body.to_string(),
            seen: Mutex::new(Vec::new()),
        });
        let client = ApiClient::with_transport(
            Credentials::new("user", "key", "1.2.3.4"),
            Network::Sandbox,
            recorder.clone(),
        );
        (client, recorder)
    }

    #[tokio::test]
    async fn test_request_merges_credentials_command_and_params() {
        let (client, recorder) = client(r#"<ApiResponse Status="OK"><CommandResponse/></ApiResponse>"#);
        let root = client
            .query("namecheap.domains.check", [("DomainList", "a.com")])
            .await
            .unwrap();
        assert_eq!(root.name, "ApiResponse");

        let seen = recorder.seen.lock().unwrap();
        let (url, params) = &seen[0];
        assert_eq!(url, "https://api.sandbox.namecheap.com/xml.response");
        let keys: Vec<_> = params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["ApiUser", "ApiKey", "UserName", "ClientIp", "Command", "DomainList"]);
        assert_eq!(params[4].1, "namecheap.domains.check");
    }

    #[tokio::test]
    async fn test_first_error_is_raised() {
        let (client, _) = client(
            r#"<ApiResponse Status="ERROR"><Errors>
                <Error Number="2011170">Validation error</Error>
                <Error Number="1011150">Invalid request IP: 1.2.3.4</Error>
            </Errors></ApiResponse>"#,
        );
        let err = client
            .query("namecheap.domains.check", Vec::<(String, String)>::new())
            .await
            .unwrap_err();
        assert_eq!(
            err.api(),
            Some(&ApiError::new(2011170, "Validation error"))
        );
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let (client, _) = client("<html><body>oops</html>");
        let err = client
            .query("namecheap.domains.check", Vec::<(String, String)>::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExpensiveError::Parse(_)));
    }

    #[test]
    fn test_with_url_overrides_endpoint() {
        let client = ApiClient::new(Credentials::default(), Network::Production).with_url("http://localhost:1");
        assert_eq!(client.api_url, "http://localhost:1");
        assert_eq!(client.network(), Network::Production);
    }
}
