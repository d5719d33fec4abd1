use async_trait::async_trait;
use expensive::auth::AuthRecovery;
use expensive::prompt::Prompter;
use expensive::register::{AbortReason, Registrar, RegistrationOutcome, RegistrationRequest};
use expensive::web::{CouponSource, HttpBrowser};
use expensive::{ApiClient, Context, Credentials, ExpensiveError, ExpensiveResult, Network, Transport};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CHECK: &str = r#"<ApiResponse Status="OK"><CommandResponse Type="namecheap.domains.check">
  <DomainCheckResult Domain="ferris.com" Available="true" ErrorNo="0" Description=""
    IsPremiumName="false" PremiumRegistrationPrice="0" PremiumRenewalPrice="0"
    PremiumRestorePrice="0" PremiumTransferPrice="0" IcannFee="0" EapFee="0.0"/>
</CommandResponse></ApiResponse>"#;

const PRICING: &str = r#"<ApiResponse Status="OK"><CommandResponse Type="namecheap.users.getPricing">
  <UserGetPricingResult><ProductType Name="domains">
    <ProductCategory Name="register"><Product Name="com">
      <Price Duration="1" DurationType="YEAR" Price="13.98" PricingType="MULTIPLE"
        AdditionalCost="0.18" RegularPrice="13.98" YourPrice="12.98" YourPriceType="MULTIPLE"
        YourAdditonalCost="0" YourAdditonalCostType="MULTIPLE" Currency="USD"/>
      <Price Duration="2" DurationType="YEAR" YourPrice="25.96" Currency="USD"/>
    </Product></ProductCategory>
  </ProductType></UserGetPricingResult>
</CommandResponse></ApiResponse>"#;

const ADDRESSES: &str = r#"<ApiResponse Status="OK"><CommandResponse Type="namecheap.users.address.getList">
  <AddressGetListResult>
    <List AddressId="0" AddressName="Primary Address" IsDefault="false"/>
    <List AddressId="4242" AddressName="Home" IsDefault="true"/>
  </AddressGetListResult>
</CommandResponse></ApiResponse>"#;

const ADDRESS: &str = r#"<ApiResponse Status="OK"><CommandResponse Type="namecheap.users.address.getInfo">
  <GetAddressInfoResult>
    <AddressId>4242</AddressId><UserName>alice</UserName><AddressName>Home</AddressName>
    <Default_YN>true</Default_YN><FirstName>Ferris</FirstName><LastName>Crab</LastName>
    <JobTitle></JobTitle><Organization></Organization><Address1>1 Harbour Road</Address1>
    <Address2></Address2><City>Portsmouth</City><StateProvince>Hampshire</StateProvince>
    <StateProvinceChoice>S</StateProvinceChoice><Zip>PO1 3AA</Zip><Country>GB</Country>
    <Phone>+44.2392000000</Phone><PhoneExt></PhoneExt><EmailAddress>ferris@example.com</EmailAddress>
  </GetAddressInfoResult>
</CommandResponse></ApiResponse>"#;

const CREATED: &str = r#"<ApiResponse Status="OK"><CommandResponse Type="namecheap.domains.create">
  <DomainCreateResult Domain="ferris.com" Registered="true" ChargedAmount="12.9800"
    DomainID="9007" OrderID="196074" TransactionID="380716" WhoisguardEnable="false"
    NonRealTimeDomain="false"/>
</CommandResponse></ApiResponse>"#;

/// Registrar stub that counts calls per command.
#[derive(Default)]
struct StubRegistrar {
    calls: Mutex<HashMap<String, usize>>,
    params: Mutex<HashMap<String, Vec<(String, String)>>>,
}

impl StubRegistrar {
    fn calls(&self, command: &str) -> usize {
        self.calls.lock().unwrap().get(command).copied().unwrap_or(0)
    }

    fn param(&self, command: &str, key: &str) -> Option<String> {
        self.params
            .lock()
            .unwrap()
            .get(command)?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }
}

#[async_trait]
impl Transport for StubRegistrar {
    async fn get(&self, _url: &str, params: &[(String, String)]) -> ExpensiveResult<String> {
        let command = params
            .iter()
            .find(|(k, _)| k == "Command")
            .map(|(_, v)| v.clone())
            .unwrap_or_default();
        *self.calls.lock().unwrap().entry(command.clone()).or_default() += 1;
        self.params.lock().unwrap().insert(command.clone(), params.to_vec());

        let body = match command.as_str() {
            "namecheap.domains.check" => CHECK,
            "namecheap.users.getPricing" => PRICING,
            "namecheap.users.address.getList" => ADDRESSES,
            "namecheap.users.address.getInfo" => ADDRESS,
            "namecheap.domains.create" => CREATED,
            other => return Err(ExpensiveError::Transport(format!("unexpected {}", other))),
        };
        Ok(body.to_string())
    }
}

/// Operator who answers from a script; unanswered questions take their default.
struct Operator {
    answers: Mutex<VecDeque<bool>>,
    password: String,
    questions: Mutex<Vec<String>>,
}

impl Operator {
    fn new(answers: &[bool], password: &str) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            password: password.to_string(),
            questions: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Prompter for Operator {
    async fn confirm(&self, question: &str, default: bool) -> ExpensiveResult<bool> {
        self.questions.lock().unwrap().push(question.to_string());
        Ok(self.answers.lock().unwrap().pop_front().unwrap_or(default))
    }

    async fn ask(&self, question: &str) -> ExpensiveResult<String> {
        self.questions.lock().unwrap().push(question.to_string());
        Ok(self.password.clone())
    }

    async fn show(&self, _message: &str) -> ExpensiveResult<()> {
        Ok(())
    }
}

struct NoCoupons;

#[async_trait]
impl CouponSource for NoCoupons {
    async fn coupon(&self) -> ExpensiveResult<Option<String>> {
        Ok(None)
    }
}

fn context(transport: Arc<dyn Transport>) -> Context {
    let client = ApiClient::with_transport(
        Credentials::new("alice", "secret", "203.0.113.7"),
        Network::Sandbox,
        transport,
    );
    Context::new(client, false)
}

#[tokio::test]
async fn test_charged_amount_matches_quote() {
    let stub = Arc::new(StubRegistrar::default());
    let registrar = Registrar::new(&context(stub.clone()), Operator::new(&[true], ""), Arc::new(NoCoupons));

    let outcome = registrar
        .register(&RegistrationRequest::new("ferris.com", 1))
        .await
        .unwrap();

    let RegistrationOutcome::Registered(result) = outcome else {
        panic!("registration did not go through: {:?}", outcome);
    };
    assert_eq!(result.charged_amount, Decimal::new(1298, 2));
    assert_eq!(stub.calls("namecheap.domains.create"), 1);
    assert_eq!(stub.param("namecheap.users.address.getInfo", "AddressId").as_deref(), Some("4242"));
    assert_eq!(stub.param("namecheap.domains.create", "RegistrantFirstName").as_deref(), Some("Ferris"));
    assert_eq!(stub.param("namecheap.domains.create", "AdminPostalCode").as_deref(), Some("PO1 3AA"));
    assert_eq!(stub.param("namecheap.domains.create", "IsPremiumDomain"), None);
    assert_eq!(stub.param("namecheap.domains.create", "PromotionCode"), None);
}

#[tokio::test]
async fn test_declined_confirmation_issues_no_create() {
    let stub = Arc::new(StubRegistrar::default());
    let operator = Operator::new(&[], "");
    let registrar = Registrar::new(&context(stub.clone()), operator.clone(), Arc::new(NoCoupons));

    let outcome = registrar
        .register(&RegistrationRequest::new("ferris.com", 1))
        .await
        .unwrap();

    assert_eq!(outcome, RegistrationOutcome::Aborted(AbortReason::Address));
    assert_eq!(*operator.questions.lock().unwrap(), ["OK?"]);
    assert_eq!(stub.calls("namecheap.domains.check"), 1);
    assert_eq!(stub.calls("namecheap.domains.create"), 0);
}

#[tokio::test]
async fn test_unsupported_years() {
    let stub = Arc::new(StubRegistrar::default());
    let registrar = Registrar::new(&context(stub.clone()), Operator::new(&[true], ""), Arc::new(NoCoupons));

    let err = registrar
        .register(&RegistrationRequest::new("ferris.com", 5))
        .await
        .unwrap_err();

    assert!(matches!(err, ExpensiveError::NotFound(_)));
    assert_eq!(stub.calls("namecheap.users.address.getList"), 0);
}

const LOGIN_PAGE: &str = r#"<html><body><form method="post" action="/myaccount/login.aspx">
  <input type="hidden" name="__RequestVerificationToken" value="tok">
  <input type="text" name="LoginUserName"><input type="password" name="LoginPassword">
</form></body></html>"#;

const WHITELIST_PAGE: &str = r#"<html><body><form method="post" action="/whitelist">
  <input type="text" name="Name"><input type="text" name="IpAddress">
</form></body></html>"#;

#[tokio::test]
async fn test_invalid_ip_is_whitelisted_and_retried() {
    let server = MockServer::start().await;

    // API: the first check is rejected, later ones pass.
    Mock::given(method("GET"))
        .and(path("/xml.response"))
        .and(query_param("Command", "namecheap.domains.check"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<ApiResponse Status="ERROR"><Errors><Error Number="1011150">Invalid request IP: 198.51.100.4</Error></Errors></ApiResponse>"#,
        ))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/xml.response"))
        .and(query_param("Command", "namecheap.domains.check"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CHECK))
        .expect(1)
        .mount(&server)
        .await;

    // Website: login, then whitelist.
    Mock::given(method("GET"))
        .and(path("/myaccount/login.aspx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/myaccount/login.aspx"))
        .and(body_string_contains("LoginPassword=hunter2"))
        .and(body_string_contains("__RequestVerificationToken=tok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>Dashboard</html>"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/whitelist"))
        .respond_with(ResponseTemplate::new(200).set_body_string(WHITELIST_PAGE))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/whitelist"))
        .and(body_string_contains("IpAddress=198.51.100.4"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>Saved</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(Credentials::new("alice", "secret", "198.51.100.4"), Network::Sandbox)
        .with_url(format!("{}/xml.response", server.uri()));
    let operator = Operator::new(&[], "hunter2");
    let mut recovery = AuthRecovery::new(
        "alice",
        format!("{}/myaccount/login.aspx", server.uri()),
        format!("{}/whitelist", server.uri()),
        operator.clone(),
        Arc::new(HttpBrowser::new().unwrap()),
    );

    let results = recovery
        .run(|| expensive::domains::check(&client, &["ferris.com"]))
        .await
        .unwrap();

    assert!(results[0].available);
    assert_eq!(
        *operator.questions.lock().unwrap(),
        ["Enter password to white-list 198.51.100.4"]
    );
}

#[tokio::test]
async fn test_rejected_password_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/xml.response"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<ApiResponse Status="ERROR"><Errors><Error Number="1011150">Invalid request IP: 198.51.100.4</Error></Errors></ApiResponse>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    // The login page comes back after a failed sign in.
    Mock::given(path("/myaccount/login.aspx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(&server)
        .await;

    let client = ApiClient::new(Credentials::new("alice", "secret", "198.51.100.4"), Network::Sandbox)
        .with_url(format!("{}/xml.response", server.uri()));
    let mut recovery = AuthRecovery::new(
        "alice",
        format!("{}/myaccount/login.aspx", server.uri()),
        format!("{}/whitelist", server.uri()),
        Operator::new(&[], "wrong"),
        Arc::new(HttpBrowser::new().unwrap()),
    );

    let err = recovery
        .run(|| expensive::domains::check(&client, &["ferris.com"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ExpensiveError::AuthRecovery(_)));
}

#[tokio::test]
async fn test_whitelist_page_without_form_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/xml.response"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<ApiResponse Status="ERROR"><Errors><Error Number="1011150">Invalid request IP: 198.51.100.4</Error></Errors></ApiResponse>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/myaccount/login.aspx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/myaccount/login.aspx"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>Dashboard</html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/whitelist"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>Please verify your phone</html>"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/whitelist"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = ApiClient::new(Credentials::new("alice", "secret", "198.51.100.4"), Network::Sandbox)
        .with_url(format!("{}/xml.response", server.uri()));
    let mut recovery = AuthRecovery::new(
        "alice",
        format!("{}/myaccount/login.aspx", server.uri()),
        format!("{}/whitelist", server.uri()),
        Operator::new(&[], "hunter2"),
        Arc::new(HttpBrowser::new().unwrap()),
    );

    let err = recovery
        .run(|| expensive::domains::check(&client, &["ferris.com"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ExpensiveError::AuthRecovery(ref m) if m.contains("no whitelist form")));
}
